use super::input::{InputResult, TextInput};
use super::overlay::Prompt;
use super::KeyResult;
use crate::commands::{self, Action, Command};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};

const MAX_SUGGESTIONS: usize = 8;

/// Outcome of the `:` prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
  /// Enter pressed; `None` if the input matched no command
  Submitted(Option<Action>),
  /// Esc pressed
  Cancelled,
}

/// `:` prompt with autocomplete over the screen and app commands
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
  input: TextInput,
  active: bool,
  highlighted: usize,
}

impl CommandInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn value(&self) -> &str {
    self.input.value()
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.reset();
  }

  fn reset(&mut self) {
    self.input.clear();
    self.highlighted = 0;
  }

  /// Commands matching the typed text, best first
  pub fn suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(self.input.value())
  }

  /// Move the highlight by `step`, wrapping at either end
  fn cycle(&mut self, step: isize) {
    let count = self.suggestions().len().min(MAX_SUGGESTIONS);
    if count > 0 {
      self.highlighted = (self.highlighted as isize + step).rem_euclid(count as isize) as usize;
    }
  }

  /// Feed every key here; while closed only `:` is taken.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<CommandEvent> {
    if !self.active {
      if key.code != KeyCode::Char(':') {
        return KeyResult::NotHandled;
      }
      self.activate();
      return KeyResult::Handled;
    }

    match key.code {
      KeyCode::Esc => {
        self.active = false;
        self.reset();
        KeyResult::Event(CommandEvent::Cancelled)
      }
      KeyCode::Enter => {
        self.active = false;
        let action = self
          .suggestions()
          .get(self.highlighted)
          .map(|cmd| cmd.action);
        self.reset();
        KeyResult::Event(CommandEvent::Submitted(action))
      }
      KeyCode::Tab | KeyCode::Down => {
        self.cycle(1);
        KeyResult::Handled
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.cycle(-1);
        KeyResult::Handled
      }
      _ => match self.input.handle_key(key) {
        InputResult::Consumed => {
          // The list changed under the highlight
          self.highlighted = 0;
          KeyResult::Handled
        }
        InputResult::NotHandled => KeyResult::NotHandled,
        InputResult::Submitted(_) | InputResult::Cancelled => KeyResult::Handled,
      },
    }
  }

  /// Draw the prompt and its suggestion list
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let suggestions = self.suggestions();
    let shown = suggestions.len().min(MAX_SUGGESTIONS);
    let prompt = Prompt {
      title: " Command ".to_string(),
      sigil: ":",
      accent: Color::Yellow,
      extra_rows: shown as u16,
    };
    let below = prompt.draw(frame, area, &self.input);

    if shown == 0 || below.height == 0 {
      return;
    }

    let items: Vec<ListItem> = suggestions
      .iter()
      .take(shown)
      .map(|cmd| {
        let mut spans = vec![Span::styled(
          format!("{:<12}", cmd.name),
          Style::default().fg(Color::Cyan),
        )];
        if let Some(alias) = cmd.aliases.first() {
          spans.push(Span::styled(
            format!("{:<5}", alias),
            Style::default().fg(Color::Yellow),
          ));
        }
        spans.push(Span::styled(cmd.description, Style::default().fg(Color::DarkGray)));
        ListItem::new(Line::from(spans))
      })
      .collect();

    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
    let mut state = ListState::default().with_selected(Some(self.highlighted));
    frame.render_stateful_widget(list, below, &mut state);
  }
}
