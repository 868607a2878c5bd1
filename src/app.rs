use crate::cache::{AnyStorage, NoopStorage, SqliteStorage};
use crate::commands::Action;
use crate::config::{Config, ScreenKind};
use crate::event::{Event, EventHandler};
use crate::remote::types::{AttendanceEntry, Category, Doctor, Role, Supplier};
use crate::remote::{snapshot_key, HttpResourceClient, StatusToggle, Tabular, WithTimeout};
use crate::sync::{Notification, Notifier, ScreenSession};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::{extract_domain, StatusMessage};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::ResourceListView;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const TICK_RATE: Duration = Duration::from_millis(250);
const STATUS_TTL: Duration = Duration::from_secs(5);

/// Main application state
pub struct App {
  /// One view per screen, in `ScreenKind::ALL` order
  views: Vec<Box<dyn View>>,

  /// Index of the screen on display
  active: usize,

  /// Command overlay (after pressing :)
  command: CommandInput,

  /// Latest status line and when it was set
  status: Option<(StatusMessage, Instant)>,

  /// Notifications from cache and mutation tasks, until `run` takes them
  notices: Option<mpsc::UnboundedReceiver<Notification>>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: &Config, no_cache: bool, screen: Option<ScreenKind>) -> Result<Self> {
    let (notifier, notices) = Notifier::channel();
    let store = Arc::new(open_store(config, no_cache));
    let token = Config::get_api_token();
    let title = config
      .title
      .clone()
      .unwrap_or_else(|| extract_domain(&config.backend.url).to_string());

    let ctx = ScreenContext {
      config,
      token,
      store,
      notifier,
      title,
    };

    let views = ScreenKind::ALL
      .iter()
      .map(|kind| ctx.build(*kind))
      .collect::<Result<Vec<_>>>()?;

    let start = screen.unwrap_or(config.view.default_screen);
    let active = ScreenKind::ALL
      .iter()
      .position(|k| *k == start)
      .unwrap_or(0);

    Ok(Self {
      views,
      active,
      command: CommandInput::new(),
      status: None,
      notices: Some(notices),
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let result = self.event_loop().await;

    // Cleanup terminal
    for view in &mut self.views {
      view.deactivate();
    }
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(TICK_RATE);
    if let Some(notices) = self.notices.take() {
      events.forward(notices);
    }

    self.current_view_mut().activate();

    // Main loop
    while !self.should_quit {
      // Draw UI
      terminal.draw(|frame| ui::draw(frame, self))?;

      // Handle events
      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        self.current_view_mut().tick();
        if self
          .status
          .as_ref()
          .is_some_and(|(_, at)| at.elapsed() >= STATUS_TTL)
        {
          self.status = None;
        }
      }
      Event::Notice(notice) => {
        self.set_status(notice.to_string(), notice.is_error());
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    // Global quit
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      self.should_quit = true;
      return;
    }

    // Command overlay owns the keyboard while open, and ':' opens it unless
    // the view is taking text
    if self.command.is_active() || !self.current_view().is_editing() {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(Some(action))) => {
          self.execute(action);
          return;
        }
        KeyResult::Event(CommandEvent::Submitted(None)) => {
          self.set_status("Unknown command".to_string(), true);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled if self.command.is_active() => return,
        KeyResult::NotHandled => {}
      }
    }

    match self.current_view_mut().handle_key(key) {
      ViewAction::None => {}
      ViewAction::Status { text, is_error } => self.set_status(text, is_error),
      ViewAction::Unhandled => match key.code {
        KeyCode::Char('q') => self.should_quit = true,
        KeyCode::Tab => self.switch_to((self.active + 1) % self.views.len()),
        KeyCode::BackTab => {
          self.switch_to((self.active + self.views.len() - 1) % self.views.len())
        }
        _ => {}
      },
    }
  }

  fn execute(&mut self, action: Action) {
    match action {
      Action::Open(kind) => {
        if let Some(idx) = ScreenKind::ALL.iter().position(|k| *k == kind) {
          self.switch_to(idx);
        }
      }
      Action::Refresh => self.current_view_mut().refresh(),
      Action::Quit => self.should_quit = true,
    }
  }

  /// Move to another screen. Only the screen on display keeps refreshing.
  fn switch_to(&mut self, idx: usize) {
    if idx == self.active || idx >= self.views.len() {
      return;
    }
    self.current_view_mut().deactivate();
    self.active = idx;
    self.current_view_mut().activate();
    tracing::debug!(screen = self.current_view().name(), "Switched screen");
  }

  fn set_status(&mut self, text: String, is_error: bool) {
    self.status = Some((StatusMessage { text, is_error }, Instant::now()));
  }

  // Accessors for UI

  pub fn current_view(&self) -> &dyn View {
    self.views[self.active].as_ref()
  }

  pub fn current_view_mut(&mut self) -> &mut dyn View {
    self.views[self.active].as_mut()
  }

  pub fn screen_names(&self) -> Vec<&'static str> {
    self.views.iter().map(|v| v.name()).collect()
  }

  pub fn active_index(&self) -> usize {
    self.active
  }

  pub fn status_message(&self) -> Option<&StatusMessage> {
    self.status.as_ref().map(|(message, _)| message)
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command
  }
}

fn open_store(config: &Config, no_cache: bool) -> AnyStorage {
  if no_cache || !config.cache.enabled {
    tracing::info!("Fallback cache disabled");
    return AnyStorage::Noop(NoopStorage);
  }
  match SqliteStorage::open(config.cache.path.as_deref()) {
    Ok(storage) => AnyStorage::Sqlite(storage),
    Err(e) => {
      tracing::warn!(error = %e, "Fallback cache unavailable, continuing without it");
      AnyStorage::Noop(NoopStorage)
    }
  }
}

/// Everything the screens share
struct ScreenContext<'a> {
  config: &'a Config,
  token: Option<String>,
  store: Arc<AnyStorage>,
  notifier: Notifier,
  title: String,
}

impl ScreenContext<'_> {
  fn build(&self, kind: ScreenKind) -> Result<Box<dyn View>> {
    match kind {
      ScreenKind::Roles => self.list::<Role>(kind),
      ScreenKind::Categories => self.list::<Category>(kind),
      ScreenKind::Suppliers => self.list::<Supplier>(kind),
      ScreenKind::Doctors => self.list::<Doctor>(kind),
      ScreenKind::Attendance => self.list::<AttendanceEntry>(kind),
    }
  }

  fn list<T: StatusToggle + Tabular>(&self, kind: ScreenKind) -> Result<Box<dyn View>> {
    let backend = &self.config.backend;
    let client = WithTimeout::new(
      HttpResourceClient::<T>::new(backend, self.token.clone())?,
      backend.timeout(),
    );
    let session = ScreenSession::new(
      snapshot_key::<T>(&backend.url),
      Arc::new(client),
      self.store.clone(),
      self.notifier.clone(),
      self.config.refresh.interval(),
      self.config.view.page_size,
    );
    Ok(Box::new(ResourceListView::new(
      kind.name(),
      self.title.clone(),
      session,
      self.config.export.dir.clone(),
    )))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_command(app: &mut App, text: &str) {
    app.handle_key(key(KeyCode::Char(':')));
    for c in text.chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));
  }

  fn app() -> App {
    let config = Config::parse("backend:\n  url: http://127.0.0.1:9\n").unwrap();
    App::new(&config, true, None).unwrap()
  }

  #[tokio::test]
  async fn test_command_switches_screen() {
    let mut app = app();
    assert_eq!(app.current_view().name(), "roles");

    type_command(&mut app, "doctors");
    assert_eq!(app.current_view().name(), "doctors");

    type_command(&mut app, "att");
    assert_eq!(app.current_view().name(), "attendance");
  }

  #[tokio::test]
  async fn test_unknown_command_sets_error_status() {
    let mut app = app();
    type_command(&mut app, "zzz");
    let status = app.status_message().unwrap();
    assert!(status.is_error);
    assert_eq!(app.active_index(), 0);
  }

  #[tokio::test]
  async fn test_tab_cycles_and_q_quits() {
    let mut app = app();
    app.handle_key(key(KeyCode::Tab));
    assert_eq!(app.current_view().name(), "categories");
    app.handle_key(key(KeyCode::BackTab));
    app.handle_key(key(KeyCode::BackTab));
    assert_eq!(app.current_view().name(), "attendance");

    assert!(!app.should_quit);
    app.handle_key(key(KeyCode::Char('q')));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_search_keeps_colon_as_text() {
    let mut app = app();
    app.handle_key(key(KeyCode::Char('/')));
    assert!(app.current_view().is_editing());

    app.handle_key(key(KeyCode::Char(':')));
    assert!(!app.command_input().is_active());

    app.handle_key(key(KeyCode::Esc));
    assert!(!app.current_view().is_editing());
  }

  #[tokio::test]
  async fn test_starting_screen_follows_flag() {
    let config = Config::parse("backend:\n  url: http://127.0.0.1:9\n").unwrap();
    let app = App::new(&config, true, Some(ScreenKind::Suppliers)).unwrap();
    assert_eq!(app.current_view().name(), "suppliers");
  }
}
