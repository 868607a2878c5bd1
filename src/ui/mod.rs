pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::TableState;

/// Keep a table selection inside `0..len`, selecting the first row when
/// nothing is selected and clearing it when the table is empty.
pub fn ensure_valid_selection(state: &mut TableState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(idx) if idx >= len => state.select(Some(len - 1)),
    Some(_) => {}
    None => state.select(Some(0)),
  }
}

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let header = app.current_view().header();
  renderfns::draw_header(frame, chunks[0], &header);

  app.current_view_mut().render(frame, chunks[1]);

  let screens = app.screen_names();
  renderfns::draw_footer(
    frame,
    chunks[2],
    &screens,
    app.active_index(),
    app.status_message(),
  );

  // Command overlay sits above whatever the view drew
  app.command_input().render_overlay(frame, chunks[1]);
}
