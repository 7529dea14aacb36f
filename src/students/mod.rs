//! Student roster: records and their persistence.

mod model;
mod repository;

pub use model::{NewStudent, Student, StudentChanges};
pub use repository::{RepositoryError, StudentRepository};
