use chrono::{DateTime, Local, Utc};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::ui::view::ShortcutInfo;

/// What the header shows about the active screen
#[derive(Debug, Clone, Default)]
pub struct HeaderInfo {
  pub title: String,
  pub screen: &'static str,
  pub loading: bool,
  /// Showing the stored snapshot instead of live data
  pub stale: bool,
  pub synced_at: Option<DateTime<Utc>>,
  pub page: usize,
  pub total_pages: usize,
  pub total_matching: usize,
  pub shortcuts: Vec<ShortcutInfo>,
}

/// Draw the header bar with logo, context, sync state and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, info: &HeaderInfo) {
  let sep = || Span::styled("│", Style::default().fg(Color::DarkGray));

  let mut spans = vec![
    Span::styled(" adminsync ", Style::default().fg(Color::Cyan).bold()),
    sep(),
    Span::styled(format!(" {} ", info.title), Style::default().fg(Color::White)),
    sep(),
    Span::styled(
      format!(" {} ", info.screen),
      Style::default().fg(Color::Yellow).bold(),
    ),
    sep(),
    Span::styled(
      format!(
        " page {}/{} ({}) ",
        info.page,
        info.total_pages.max(1),
        info.total_matching
      ),
      Style::default().fg(Color::White),
    ),
  ];

  if info.loading {
    spans.push(Span::styled(" ⟳ loading ", Style::default().fg(Color::Cyan)));
  }
  if info.stale {
    let since = info
      .synced_at
      .map(|at| format!(" cached {} ", at.with_timezone(&Local).format("%H:%M")))
      .unwrap_or_else(|| " cached ".to_string());
    spans.push(Span::styled(since, Style::default().fg(Color::Black).bg(Color::Yellow)));
  }

  // Shortcuts - keys and brackets highlighted, descriptions dimmed
  let mut shortcuts = info.shortcuts.clone();
  shortcuts.sort_by_key(|s| s.priority);
  for shortcut in shortcuts {
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Extract host from a backend URL, for the default title
pub fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}
