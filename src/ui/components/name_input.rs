use super::input::{InputResult, TextInput};
use super::overlay::Prompt;
use super::KeyResult;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// Which mutation the typed name is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePurpose {
  /// Create a copy of the selected record under the new name
  Copy,
  /// Rename the selected record in place
  Rename,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameEvent {
  Submitted(NamePurpose, String),
  Cancelled,
}

/// One-line name prompt opened by the view for copy and rename
#[derive(Debug, Clone, Default)]
pub struct NameInput {
  input: TextInput,
  purpose: Option<NamePurpose>,
}

impl NameInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.purpose.is_some()
  }

  pub fn open(&mut self, purpose: NamePurpose, initial: &str) {
    self.purpose = Some(purpose);
    self.input.set_value(initial);
  }

  /// While open every key is taken; closed, nothing is.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<NameEvent> {
    let Some(purpose) = self.purpose else {
      return KeyResult::NotHandled;
    };

    match self.input.handle_key(key) {
      InputResult::Submitted(name) => {
        self.close();
        KeyResult::Event(NameEvent::Submitted(purpose, name))
      }
      InputResult::Cancelled => {
        self.close();
        KeyResult::Event(NameEvent::Cancelled)
      }
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  fn close(&mut self) {
    self.purpose = None;
    self.input.clear();
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let Some(purpose) = self.purpose else {
      return;
    };
    let title = match purpose {
      NamePurpose::Copy => " Copy as ",
      NamePurpose::Rename => " Rename to ",
    };
    let prompt = Prompt {
      title: title.to_string(),
      sigil: "> ",
      accent: Color::Green,
      extra_rows: 0,
    };
    prompt.draw(frame, area, &self.input);
  }
}
