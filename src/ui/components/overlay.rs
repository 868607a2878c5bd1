use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use super::input::TextInput;

/// A bordered one-line prompt drawn over the top-left of `area`, with
/// `extra_rows` free lines under the input for the caller to fill.
pub struct Prompt<'a> {
  pub title: String,
  pub sigil: &'a str,
  pub accent: Color,
  pub extra_rows: u16,
}

impl Prompt<'_> {
  /// Draw the box and the input line; returns the area under the input.
  pub fn draw(&self, frame: &mut Frame, area: Rect, input: &TextInput) -> Rect {
    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let height = 3 + self.extra_rows;
    let boxed = Rect::new(area.x + 1, area.y + 1, width, height).intersection(area);

    frame.render_widget(Clear, boxed);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(self.accent))
      .title(self.title.as_str());
    let inner = block.inner(boxed);
    frame.render_widget(block, boxed);

    if inner.height == 0 {
      return inner;
    }

    let (before, after) = input.split_at_cursor();
    let mut rest = after.chars();
    let under_cursor = rest.next().map(String::from).unwrap_or_else(|| " ".to_string());

    let line = Line::from(vec![
      Span::styled(self.sigil, Style::default().fg(self.accent)),
      Span::raw(before),
      Span::styled(under_cursor, Style::default().add_modifier(Modifier::REVERSED)),
      Span::raw(rest.as_str()),
    ]);
    let [input_row, below] =
      Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(inner);
    frame.render_widget(Paragraph::new(line), input_row);

    below
  }
}
