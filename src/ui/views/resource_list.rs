use chrono::{Local, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use std::path::PathBuf;
use tracing::debug;

use crate::cache::{CacheSource, Record, RecordId, SnapshotStore};
use crate::export::write_export;
use crate::remote::{StatusToggle, Tabular};
use crate::sync::projection::filtered;
use crate::sync::{Intent, ScreenSession, SessionView, StatusFilter};
use crate::ui::components::{KeyResult, NameEvent, NameInput, NamePurpose, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{status_color, truncate, HeaderInfo};
use crate::ui::view::{ShortcutInfo, View, ViewAction};

const MAX_CELL_WIDTH: usize = 40;

/// Paged table of one resource type, kept in sync by its session
pub struct ResourceListView<T: StatusToggle + Tabular, S> {
  name: &'static str,
  title: String,
  session: ScreenSession<T, S>,
  table_state: TableState,
  /// Record the cursor is on, so it survives refreshes and reordering
  selected_id: Option<RecordId>,
  search: SearchInput,
  naming: NameInput,
  export_dir: PathBuf,
}

impl<T: StatusToggle + Tabular, S: SnapshotStore + 'static> ResourceListView<T, S> {
  pub fn new(
    name: &'static str,
    title: String,
    session: ScreenSession<T, S>,
    export_dir: PathBuf,
  ) -> Self {
    Self {
      name,
      title,
      session,
      table_state: TableState::default(),
      selected_id: None,
      search: SearchInput::new(),
      naming: NameInput::new(),
      export_dir,
    }
  }

  /// Re-point the cursor at `selected_id` on the visible page, falling back
  /// to the nearest row when that record is gone.
  fn sync_selection(&mut self, view: &SessionView<T>) {
    let page = view.page();
    let by_id = self
      .selected_id
      .as_ref()
      .and_then(|id| page.rows.iter().position(|r| r.id() == id));

    match by_id {
      Some(idx) => self.table_state.select(Some(idx)),
      None => ensure_valid_selection(&mut self.table_state, page.rows.len()),
    }
    self.selected_id = self
      .table_state
      .selected()
      .and_then(|idx| page.rows.get(idx))
      .map(|r| r.id().clone());
  }

  fn selected_record(&self) -> Option<T> {
    let id = self.selected_id.as_ref()?;
    self
      .session
      .snapshot()
      .records
      .into_iter()
      .find(|r| r.id() == id)
  }

  fn move_selection(&mut self, delta: isize) {
    let view = self.session.view();
    let len = view.page().rows.len();
    if len == 0 {
      return;
    }
    let current = self.table_state.selected().unwrap_or(0) as isize;
    let next = (current + delta).rem_euclid(len as isize) as usize;
    self.table_state.select(Some(next));
    self.selected_id = view.page().rows.get(next).map(|r| r.id().clone());
  }

  fn change_page(&mut self, delta: isize) {
    let total_pages = self.session.view().page().total_pages;
    self.session.update_filter(|f| {
      let next = (f.page as isize + delta).max(1) as usize;
      f.page = next.min(total_pages.max(1));
    });
    self.selected_id = None;
    self.table_state.select(Some(0));
  }

  fn apply(&mut self, intent: Intent<T>) {
    // Rejections and outcomes also arrive as notifications
    if let Err(e) = self.session.apply(intent) {
      debug!(resource = T::resource_name(), error = %e, "intent not applied");
    }
  }

  /// Open the name prompt on the selected record.
  fn open_naming(&mut self, purpose: NamePurpose) -> ViewAction {
    let Some(record) = self.selected_record() else {
      return ViewAction::None;
    };
    if record.with_name("").is_none() {
      return ViewAction::Status {
        text: format!("{} cannot be named here", self.name),
        is_error: true,
      };
    }
    let initial = match purpose {
      NamePurpose::Copy => String::new(),
      NamePurpose::Rename => T::columns()
        .iter()
        .position(|c| *c == "Name")
        .and_then(|col| record.cells().into_iter().nth(col))
        .unwrap_or_default(),
    };
    self.naming.open(purpose, &initial);
    ViewAction::None
  }

  fn submit_name(&mut self, purpose: NamePurpose, name: &str) {
    let Some(named) = self.selected_record().and_then(|r| r.with_name(name)) else {
      return;
    };
    let intent = match purpose {
      NamePurpose::Copy => Intent::Create(named),
      NamePurpose::Rename => Intent::Update(named),
    };
    self.apply(intent);
  }

  fn export(&self) -> ViewAction {
    let view = self.session.view();
    let rows = filtered(&view.snapshot.records, &view.filter);
    match write_export(&self.export_dir, &rows, &view.filter, Local::now().date_naive()) {
      Ok(path) => ViewAction::Status {
        text: format!("Exported {} rows to {}", rows.len(), path.display()),
        is_error: false,
      },
      Err(e) => ViewAction::Status {
        text: e.to_string(),
        is_error: true,
      },
    }
  }

  fn empty_message(view: &SessionView<T>) -> &'static str {
    if view.snapshot.is_loading && view.snapshot.source == CacheSource::Empty {
      "Loading..."
    } else if view.snapshot.is_stale && view.snapshot.records.is_empty() {
      "Backend unreachable and nothing cached yet. Press 'r' to retry."
    } else if view.filter.is_filtered() {
      "No records match the current filter."
    } else {
      "No records."
    }
  }

  /// Draws the visible page and returns how many records match the filter.
  fn render_table(&mut self, frame: &mut Frame, area: Rect) -> usize {
    let view = self.session.view();
    self.sync_selection(&view);
    let page = view.page();

    let mut title = format!(" {} ", self.name);
    if let StatusFilter::Only(_) = view.filter.status {
      title.push_str(&format!("[{}] ", view.filter.status.label()));
    }
    if !view.filter.search.trim().is_empty() {
      title.push_str(&format!("/{} ", view.filter.search.trim()));
    }

    let border = if view.snapshot.is_stale {
      Color::Yellow
    } else {
      Color::Blue
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border));

    if page.rows.is_empty() {
      let paragraph = Paragraph::new(Self::empty_message(&view))
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return page.total_matching;
    }

    let columns = T::columns();
    let status_col = columns.iter().position(|c| *c == "Status");

    let header = Row::new(columns.iter().map(|c| Cell::from(*c)))
      .style(Style::default().fg(Color::Cyan).bold());

    let rows: Vec<Row> = page
      .rows
      .iter()
      .map(|record| {
        let pending = view.snapshot.is_pending(record.id());
        let cells = record.cells().into_iter().enumerate().map(|(i, text)| {
          let style = match status_col {
            Some(col) if col == i => Style::default().fg(status_color(&text)),
            _ => Style::default(),
          };
          Cell::from(truncate(&text, MAX_CELL_WIDTH)).style(style)
        });
        let row = Row::new(cells);
        if pending {
          // Not yet confirmed by the backend
          row.style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))
        } else {
          row
        }
      })
      .collect();

    let widths: Vec<Constraint> = columns.iter().map(|_| Constraint::Fill(1)).collect();
    let table = Table::new(rows, widths)
      .header(header)
      .block(block)
      .row_highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
    page.total_matching
  }
}

impl<T: StatusToggle + Tabular, S: SnapshotStore + 'static> View for ResourceListView<T, S> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.naming.handle_key(key) {
      KeyResult::Event(NameEvent::Submitted(purpose, name)) => {
        self.submit_name(purpose, &name);
        return ViewAction::None;
      }
      KeyResult::Event(NameEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    // Let search component try to handle first
    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(query)) => {
        self.session.update_filter(|f| {
          f.search = query;
          f.page = 1;
        });
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Submitted) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled if self.search.is_active() => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
      KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
      KeyCode::Char('n') | KeyCode::Right => self.change_page(1),
      KeyCode::Char('p') | KeyCode::Left => self.change_page(-1),
      KeyCode::Char('s') => {
        self.session.update_filter(|f| {
          f.status = f.status.next();
          f.page = 1;
        });
      }
      KeyCode::Char('r') => self.session.refresh_now(),
      KeyCode::Char('t') => {
        if let Some(record) = self.selected_record() {
          self.apply(record.toggle_intent(Local::now().date_naive(), Utc::now()));
        }
      }
      KeyCode::Char('x') => {
        if let Some(id) = self.selected_id.clone() {
          self.apply(Intent::Delete(id));
        }
      }
      KeyCode::Char('c') => return self.open_naming(NamePurpose::Copy),
      KeyCode::Char('m') => return self.open_naming(NamePurpose::Rename),
      KeyCode::Char('e') => return self.export(),
      _ => return ViewAction::Unhandled,
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let matches = self.render_table(frame, area);
    self.search.render_overlay(frame, area, matches);
    self.naming.render_overlay(frame, area);
  }

  fn name(&self) -> &'static str {
    self.name
  }

  fn header(&self) -> HeaderInfo {
    let view = self.session.view();
    let page = view.page();
    HeaderInfo {
      title: self.title.clone(),
      screen: self.name,
      loading: view.snapshot.is_loading,
      stale: view.snapshot.is_stale,
      synced_at: view.snapshot.synced_at,
      page: page.page,
      total_pages: page.total_pages,
      total_matching: page.total_matching,
      shortcuts: self.shortcuts(),
    }
  }

  fn activate(&mut self) {
    self.session.activate();
  }

  fn deactivate(&mut self) {
    self.session.deactivate();
  }

  fn refresh(&mut self) {
    self.session.refresh_now();
  }

  fn tick(&mut self) {
    let view = self.session.view();
    self.sync_selection(&view);
  }

  fn is_editing(&self) -> bool {
    self.search.is_active() || self.naming.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("s", "status").with_priority(30),
      ShortcutInfo::new("n/p", "page").with_priority(40),
      ShortcutInfo::new("t", "toggle").with_priority(50),
      ShortcutInfo::new("x", "delete").with_priority(60),
      ShortcutInfo::new("c/m", "copy/rename").with_priority(65),
      ShortcutInfo::new("e", "export").with_priority(70),
      ShortcutInfo::new("r", "refresh").with_priority(80),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::NoopStorage;
  use crate::error::RemoteFailure;
  use crate::remote::types::{ActiveStatus, AttendanceEntry, AttendanceStatus, Role};
  use crate::remote::ResourceClient;
  use crate::sync::testing::{wait_until, ScriptedClient};
  use crate::sync::Notifier;
  use chrono::NaiveDate;
  use crossterm::event::KeyModifiers;
  use std::sync::Arc;
  use std::time::Duration;

  fn role(id: u64, name: &str) -> Role {
    Role {
      id: RecordId::Server(id),
      name: name.to_string(),
      description: String::new(),
      permissions: vec!["read".to_string()],
      status: ActiveStatus::Active,
      created_at: "2024-03-01T09:00:00Z".parse().unwrap(),
    }
  }

  fn press(view: &mut impl View, code: KeyCode) -> ViewAction {
    view.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
  }

  fn type_text(view: &mut impl View, text: &str) {
    for c in text.chars() {
      press(view, KeyCode::Char(c));
    }
  }

  fn scratch_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("adminsync-view-{}-{}", tag, std::process::id()))
  }

  async fn loaded_view<T: StatusToggle + Tabular>(
    records: Vec<T>,
    page_size: usize,
    tag: &str,
  ) -> (ResourceListView<T, NoopStorage>, Arc<ScriptedClient<T>>) {
    let expected = records.len();
    let client = Arc::new(ScriptedClient::new(records));
    let session = ScreenSession::new(
      format!("{}:test", T::resource_name()),
      client.clone() as Arc<dyn ResourceClient<T>>,
      Arc::new(NoopStorage),
      Notifier::silent(),
      Duration::from_secs(30),
      page_size,
    );
    let mut view = ResourceListView::new(T::resource_name(), "Admin".to_string(), session, scratch_dir(tag));
    view.activate();
    wait_until(|| view.session.snapshot().records.len() == expected).await;
    view.tick();
    (view, client)
  }

  fn names(view: &ResourceListView<Role, NoopStorage>) -> Vec<String> {
    view.session.snapshot().records.into_iter().map(|r| r.name).collect()
  }

  #[tokio::test]
  async fn test_selection_moves_off_rejected_temporary_row() {
    let (mut view, client) = loaded_view(vec![role(1, "Admin")], 10, "rejected").await;
    let gate = client.gate_write();

    view.apply(Intent::Create(role(0, "Auditor")));
    view.tick();
    press(&mut view, KeyCode::Char('j'));
    assert_eq!(view.selected_id, Some(RecordId::Temporary(1)));

    gate.send(Err(RemoteFailure::Network("reset".to_string()))).unwrap();
    wait_until(|| view.session.snapshot().records.len() == 1).await;
    view.tick();

    assert_eq!(view.selected_id, Some(RecordId::Server(1)));
    assert_eq!(view.table_state.selected(), Some(0));
  }

  #[tokio::test]
  async fn test_toggle_and_delete_act_on_selected_row() {
    let (mut view, client) =
      loaded_view(vec![role(1, "Admin"), role(2, "Clerk")], 10, "toggle").await;
    press(&mut view, KeyCode::Char('j'));

    press(&mut view, KeyCode::Char('t'));
    let snapshot = view.session.snapshot();
    assert_eq!(snapshot.records[1].status, ActiveStatus::Inactive);
    assert!(snapshot.is_pending(&RecordId::Server(2)));
    wait_until(|| view.session.snapshot().pending.is_empty()).await;
    assert_eq!(view.session.snapshot().records[1].status, ActiveStatus::Inactive);

    press(&mut view, KeyCode::Char('x'));
    assert_eq!(names(&view), vec!["Admin"]);
    wait_until(|| client.write_calls() == 2 && view.session.snapshot().pending.is_empty()).await;

    assert_eq!(client.write_log(), vec!["update 2", "delete 2"]);
    assert_eq!(names(&view), vec!["Admin"]);
  }

  #[tokio::test]
  async fn test_page_keys_clamp_to_available_pages() {
    let roles: Vec<Role> = (1..=5).map(|i| role(i, &format!("Role {}", i))).collect();
    let (mut view, _client) = loaded_view(roles, 2, "paging").await;

    for _ in 0..5 {
      press(&mut view, KeyCode::Char('n'));
    }
    assert_eq!(view.session.filter().page, 3);
    assert_eq!(view.session.view().page().rows.len(), 1);

    for _ in 0..5 {
      press(&mut view, KeyCode::Left);
    }
    assert_eq!(view.session.filter().page, 1);
  }

  #[tokio::test]
  async fn test_export_writes_every_filtered_row_not_just_the_page() {
    let roles = vec![
      role(1, "Admin"),
      role(2, "Ward admin"),
      role(3, "Nurse"),
      role(4, "Pharmacy admin"),
      role(5, "Clerk"),
    ];
    let (mut view, _client) = loaded_view(roles, 2, "export").await;
    view.session.update_filter(|f| f.search = "admin".to_string());
    assert_eq!(view.session.view().page().rows.len(), 2);

    let action = press(&mut view, KeyCode::Char('e'));
    assert!(matches!(
      action,
      ViewAction::Status { ref text, is_error: false } if text.starts_with("Exported 3 rows")
    ));

    let dir = scratch_dir("export");
    let file = std::fs::read_dir(&dir)
      .unwrap()
      .map(|entry| entry.unwrap().path())
      .find(|path| path.to_string_lossy().contains("_q-admin"))
      .unwrap();
    let csv = std::fs::read_to_string(&file).unwrap();
    // Header plus the three matches
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.contains("Pharmacy admin"));
    std::fs::remove_dir_all(&dir).ok();
  }

  #[tokio::test]
  async fn test_copy_prompt_creates_named_record() {
    let (mut view, client) = loaded_view(vec![role(1, "Admin")], 10, "copy").await;

    press(&mut view, KeyCode::Char('c'));
    assert!(view.is_editing());
    // Typed keys go to the prompt, not the list
    type_text(&mut view, "Auditor");
    assert_eq!(client.write_calls(), 0);
    press(&mut view, KeyCode::Enter);
    assert!(!view.is_editing());

    let snapshot = view.session.snapshot();
    assert_eq!(snapshot.records[1].name, "Auditor");
    assert_eq!(snapshot.records[1].id, RecordId::Temporary(1));
    assert_eq!(snapshot.records[1].permissions, vec!["read".to_string()]);

    wait_until(|| view.session.snapshot().pending.is_empty()).await;
    assert_eq!(view.session.snapshot().records[1].id, RecordId::Server(100));
    assert_eq!(client.write_log(), vec!["create"]);
  }

  #[tokio::test]
  async fn test_rename_prompt_updates_selected_record() {
    let (mut view, client) = loaded_view(vec![role(1, "Admin"), role(2, "Clerk")], 10, "rename").await;

    press(&mut view, KeyCode::Char('m'));
    view.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
    type_text(&mut view, "Root");
    press(&mut view, KeyCode::Enter);

    assert_eq!(names(&view), vec!["Root", "Clerk"]);
    wait_until(|| view.session.snapshot().pending.is_empty()).await;
    assert_eq!(client.write_log(), vec!["update 1"]);
  }

  #[tokio::test]
  async fn test_blank_name_is_rejected_without_a_write() {
    let (mut view, client) = loaded_view(vec![role(1, "Admin")], 10, "blank").await;

    press(&mut view, KeyCode::Char('c'));
    type_text(&mut view, "   ");
    press(&mut view, KeyCode::Enter);

    assert_eq!(names(&view), vec!["Admin"]);
    assert_eq!(client.write_calls(), 0);
  }

  #[tokio::test]
  async fn test_attendance_rows_cannot_be_named() {
    let entry = AttendanceEntry {
      id: RecordId::Server(5),
      staff_id: "EMP-1".to_string(),
      staff_name: "Ana".to_string(),
      role: "Nurse".to_string(),
      date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
      status: AttendanceStatus::Present,
      check_in: None,
      check_out: None,
      marked_at: "2024-05-02T08:00:00Z".parse().unwrap(),
    };
    let (mut view, _client) = loaded_view(vec![entry], 10, "attendance").await;

    let action = press(&mut view, KeyCode::Char('c'));
    assert!(matches!(action, ViewAction::Status { is_error: true, .. }));
    assert!(!view.is_editing());
  }
}
