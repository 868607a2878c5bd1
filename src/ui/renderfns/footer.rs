use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// A message shown in the footer until it expires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
  pub text: String,
  pub is_error: bool,
}

/// Draw the footer bar: screen tabs, then the latest status message
pub fn draw_footer(
  frame: &mut Frame,
  area: Rect,
  screens: &[&'static str],
  active: usize,
  message: Option<&StatusMessage>,
) {
  let mut spans = vec![Span::raw(" ")];

  for (i, name) in screens.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" · ", Style::default().fg(Color::DarkGray)));
    }

    let style = if i == active {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::DarkGray)
    };
    spans.push(Span::styled(*name, style));
  }

  if let Some(message) = message {
    let color = if message.is_error {
      Color::Red
    } else {
      Color::Green
    };
    spans.push(Span::styled("  │ ", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(message.text.clone(), Style::default().fg(color)));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}
