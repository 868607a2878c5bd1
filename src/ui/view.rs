use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use super::renderfns::HeaderInfo;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
  /// No action needed
  None,
  /// Show a message in the footer
  Status { text: String, is_error: bool },
  /// Key not used by the view; the app may handle it
  Unhandled,
}

/// Trait for screen behavior
///
/// Views handle their own input modes (search) and return actions for the
/// App to execute: App → View → Components. A view is *active* while it is
/// on screen; only active views refresh in the background.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Screen name, used in the header and footer
  fn name(&self) -> &'static str;

  /// Sync state and paging for the header
  fn header(&self) -> HeaderInfo;

  /// Called when the view comes on screen
  fn activate(&mut self);

  /// Called when the view leaves the screen
  fn deactivate(&mut self);

  /// Request an immediate refresh
  fn refresh(&mut self);

  /// Called on each tick so the view can re-validate its selection
  fn tick(&mut self) {}

  /// Whether the view is capturing text input (search)
  fn is_editing(&self) -> bool {
    false
  }

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
