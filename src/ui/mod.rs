pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::TableState;

pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // View
      Constraint::Length(1), // Notices
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let breadcrumb = app.breadcrumb();
  let (context, shortcuts, status) = match app.current_view() {
    Some(view) => (view.context(), view.shortcuts(), app.status()),
    None => (String::new(), Vec::new(), None),
  };

  renderfns::draw_header(frame, chunks[0], &context, &shortcuts);
  if let Some(view) = app.current_view_mut() {
    view.render(frame, chunks[1]);
  }
  app.banner().render(frame, chunks[2]);
  renderfns::draw_footer(frame, chunks[3], &breadcrumb, status.as_deref());
}

/// Keep a table selection inside `len` rows, selecting the first row when
/// nothing is selected.
pub fn ensure_valid_selection(state: &mut TableState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    Some(i) if i >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    Some(_) => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_ensure_valid_selection() {
    let mut state = TableState::default();
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(0));

    state.select(Some(5));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));

    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);
  }
}
