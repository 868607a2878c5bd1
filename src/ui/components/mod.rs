//! Input widgets shared by the screens.
//!
//! Components own their editing state; views feed them keys first and act on
//! the events they return.

mod command_input;
mod input;
mod name_input;
mod overlay;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use name_input::{NameEvent, NameInput, NamePurpose};
pub use search_input::{SearchEvent, SearchInput};

/// What a component did with a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Taken, nothing for the caller to do
  Handled,
  /// Taken, and the caller should act on `T`
  Event(T),
  /// Not taken; offer it to the next handler
  NotHandled,
}
