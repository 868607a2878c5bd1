use super::input::{InputResult, TextInput};
use super::overlay::Prompt;
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;

/// What the owning view should do with the filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// New search text; empty when the search was cleared with Esc
  Changed(String),
  /// Enter pressed; the prompt closes and the search stays applied
  Submitted,
}

/// `/` prompt that edits a list's search term as you type
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn query(&self) -> &str {
    self.input.value()
  }

  /// Open the prompt on `current`, so reopening edits the applied search
  pub fn activate(&mut self, current: &str) {
    self.active = true;
    self.input.set_value(current);
  }

  /// Feed every key here; while closed only `/` is taken.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code != KeyCode::Char('/') {
        return KeyResult::NotHandled;
      }
      let current = self.input.value().to_string();
      self.activate(&current);
      return KeyResult::Handled;
    }

    match self.input.handle_key(key) {
      InputResult::Consumed => KeyResult::Event(SearchEvent::Changed(self.query().to_string())),
      InputResult::Submitted(_) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted)
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(SearchEvent::Changed(String::new()))
      }
      InputResult::NotHandled => KeyResult::NotHandled,
    }
  }

  /// Draw the prompt, titled with how many records match so far
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect, matches: usize) {
    if !self.active {
      return;
    }
    let prompt = Prompt {
      title: format!(" Search ({} found) ", matches),
      sigil: "/",
      accent: Color::Yellow,
      extra_rows: 0,
    };
    prompt.draw(frame, area, &self.input);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_slash_activates_and_keystrokes_emit_changes() {
    let mut search = SearchInput::new();
    assert_eq!(search.handle_key(key(KeyCode::Char('x'))), KeyResult::NotHandled);
    assert_eq!(search.handle_key(key(KeyCode::Char('/'))), KeyResult::Handled);
    assert!(search.is_active());

    assert_eq!(
      search.handle_key(key(KeyCode::Char('d'))),
      KeyResult::Event(SearchEvent::Changed("d".to_string()))
    );
    assert_eq!(
      search.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(SearchEvent::Submitted)
    );
    assert!(!search.is_active());
    assert_eq!(search.query(), "d");
  }

  #[test]
  fn test_reopening_keeps_query_and_escape_clears() {
    let mut search = SearchInput::new();
    search.handle_key(key(KeyCode::Char('/')));
    search.handle_key(key(KeyCode::Char('a')));
    search.handle_key(key(KeyCode::Enter));

    search.handle_key(key(KeyCode::Char('/')));
    assert_eq!(search.query(), "a");
    assert_eq!(
      search.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(SearchEvent::Changed(String::new()))
    );
    assert_eq!(search.query(), "");
  }

  #[test]
  fn test_ctrl_keys_pass_through_while_open() {
    let mut search = SearchInput::new();
    search.handle_key(key(KeyCode::Char('/')));
    let ctrl_x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL);
    assert_eq!(search.handle_key(ctrl_x), KeyResult::NotHandled);
    assert!(search.is_active());
  }
}
