mod roster;
mod student_detail;

pub use roster::RosterView;
pub use student_detail::StudentDetailView;
