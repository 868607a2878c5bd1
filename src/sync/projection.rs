//! Filtering, ordering and pagination of a cached collection for display.

use std::sync::{Arc, Mutex, PoisonError};

use crate::cache::{Record, StatusValue};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Status filter: everything, or a single status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter<S> {
  All,
  Only(S),
}

impl<S: StatusValue> StatusFilter<S> {
  /// Cycle `All -> first status -> ... -> last status -> All`.
  pub fn next(self) -> Self {
    let variants = S::all_variants();
    match self {
      StatusFilter::All => variants
        .first()
        .map(|s| StatusFilter::Only(*s))
        .unwrap_or(StatusFilter::All),
      StatusFilter::Only(current) => variants
        .iter()
        .position(|s| *s == current)
        .and_then(|idx| variants.get(idx + 1))
        .map(|s| StatusFilter::Only(*s))
        .unwrap_or(StatusFilter::All),
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      StatusFilter::All => "all",
      StatusFilter::Only(status) => status.label(),
    }
  }

  fn matches(&self, status: S) -> bool {
    match self {
      StatusFilter::All => true,
      StatusFilter::Only(wanted) => *wanted == status,
    }
  }
}

/// What the user asked to see. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState<S> {
  pub search: String,
  pub status: StatusFilter<S>,
  pub page: usize,
  pub page_size: usize,
}

impl<S> FilterState<S> {
  pub fn new(page_size: usize) -> Self {
    Self {
      search: String::new(),
      status: StatusFilter::All,
      page: 1,
      page_size: page_size.max(1),
    }
  }

  pub fn is_filtered(&self) -> bool {
    !self.search.trim().is_empty() || !matches!(self.status, StatusFilter::All)
  }
}

impl<S> Default for FilterState<S> {
  fn default() -> Self {
    Self::new(DEFAULT_PAGE_SIZE)
  }
}

/// One page of a projected collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
  pub rows: Vec<&'a T>,
  pub total_matching: usize,
  /// Zero when nothing matches
  pub total_pages: usize,
  /// The page actually shown, after clamping
  pub page: usize,
}

pub fn total_pages(total: usize, page_size: usize) -> usize {
  total.div_ceil(page_size.max(1))
}

/// Clamp a requested 1-based page into `1..=total_pages`.
pub fn clamp_page(page: usize, total_pages: usize) -> usize {
  page.clamp(1, total_pages.max(1))
}

/// Records matching the search and status filter, sorted by id.
pub fn filtered<'a, T: Record>(records: &'a [T], filter: &FilterState<T::Status>) -> Vec<&'a T> {
  let needle = filter.search.trim().to_lowercase();

  let mut matching: Vec<&T> = records
    .iter()
    .filter(|r| filter.status.matches(r.status()))
    .filter(|r| {
      needle.is_empty()
        || r
          .search_fields()
          .iter()
          .any(|field| field.to_lowercase().contains(&needle))
    })
    .collect();

  // Stable, so equal ids keep their collection order
  matching.sort_by(|a, b| a.id().cmp(b.id()));
  matching
}

pub fn project<'a, T: Record>(records: &'a [T], filter: &FilterState<T::Status>) -> Page<'a, T> {
  let matching = filtered(records, filter);
  let page_size = filter.page_size.max(1);
  let total_matching = matching.len();
  let total_pages = total_pages(total_matching, page_size);
  let page = clamp_page(filter.page, total_pages);

  let rows = matching
    .into_iter()
    .skip((page - 1) * page_size)
    .take(page_size)
    .collect();

  Page {
    rows,
    total_matching,
    total_pages,
    page,
  }
}

/// Filter state shared between a screen and its refresh scheduler.
///
/// Every user edit bumps a revision, so a refresh can tell whether the state
/// it snapshotted is still the one the user is looking at.
#[derive(Debug, Clone)]
pub struct SharedFilter<S> {
  inner: Arc<Mutex<(FilterState<S>, u64)>>,
}

impl<S: Clone> SharedFilter<S> {
  pub fn new(state: FilterState<S>) -> Self {
    Self {
      inner: Arc::new(Mutex::new((state, 0))),
    }
  }

  pub fn get(&self) -> FilterState<S> {
    self.lock().0.clone()
  }

  /// Current state together with its revision.
  pub fn snapshot(&self) -> (FilterState<S>, u64) {
    self.lock().clone()
  }

  pub fn update(&self, f: impl FnOnce(&mut FilterState<S>)) {
    let mut guard = self.lock();
    f(&mut guard.0);
    guard.1 += 1;
  }

  /// Put `state` back if nothing changed since `revision`, then clamp the
  /// page to the page count `total_pages` reports for the state in effect.
  pub fn restore(
    &self,
    state: FilterState<S>,
    revision: u64,
    total_pages: impl FnOnce(&FilterState<S>) -> usize,
  ) -> FilterState<S> {
    let mut guard = self.lock();
    if guard.1 == revision {
      guard.0 = state;
    }
    let pages = total_pages(&guard.0);
    guard.0.page = clamp_page(guard.0.page, pages);
    guard.0.clone()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, (FilterState<S>, u64)> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::RecordId;
  use crate::remote::types::{ActiveStatus, Category};

  fn category(id: u64, name: &str, status: ActiveStatus) -> Category {
    Category {
      id: RecordId::Server(id),
      name: name.to_string(),
      description: format!("{} supplies", name),
      status,
      created_at: "2024-03-01T09:00:00Z".parse().unwrap(),
    }
  }

  fn numbered(n: u64) -> Vec<Category> {
    // Reverse order to prove the projection sorts
    (1..=n)
      .rev()
      .map(|i| category(i, &format!("Category {}", i), ActiveStatus::Active))
      .collect()
  }

  fn ids(page: &Page<'_, Category>) -> Vec<RecordId> {
    page.rows.iter().map(|r| r.id.clone()).collect()
  }

  #[test]
  fn test_pagination_boundaries() {
    let records = numbered(23);
    let mut filter = FilterState::new(10);

    let first = project(&records, &filter);
    assert_eq!(first.total_pages, 3);
    assert_eq!(first.total_matching, 23);
    assert_eq!(first.rows.len(), 10);
    assert_eq!(first.rows[0].id, RecordId::Server(1));

    filter.page = 3;
    let last = project(&records, &filter);
    assert_eq!(
      ids(&last),
      vec![RecordId::Server(21), RecordId::Server(22), RecordId::Server(23)]
    );

    filter.page = 4;
    let past = project(&records, &filter);
    assert_eq!(past.page, 3);
    assert_eq!(past.rows.len(), 3);
  }

  #[test]
  fn test_empty_result_has_no_pages() {
    let records: Vec<Category> = Vec::new();
    let mut filter = FilterState::new(10);
    filter.page = 5;

    let page = project(&records, &filter);
    assert_eq!(page.total_pages, 0);
    assert_eq!(page.page, 1);
    assert!(page.rows.is_empty());
  }

  #[test]
  fn test_search_is_case_insensitive_over_fields() {
    let records = vec![
      category(1, "Dental", ActiveStatus::Active),
      category(2, "Optics", ActiveStatus::Active),
    ];
    let mut filter = FilterState::new(10);
    filter.search = "  OPT ".to_string();

    let page = project(&records, &filter);
    assert_eq!(ids(&page), vec![RecordId::Server(2)]);

    // Matches the description field too
    filter.search = "dental sup".to_string();
    assert_eq!(ids(&project(&records, &filter)), vec![RecordId::Server(1)]);
  }

  #[test]
  fn test_status_filter() {
    let records = vec![
      category(1, "A", ActiveStatus::Active),
      category(2, "B", ActiveStatus::Inactive),
    ];
    let mut filter = FilterState::new(10);
    filter.status = StatusFilter::Only(ActiveStatus::Inactive);

    assert_eq!(ids(&project(&records, &filter)), vec![RecordId::Server(2)]);
    assert!(filter.is_filtered());
  }

  #[test]
  fn test_status_filter_cycles() {
    let all = StatusFilter::<ActiveStatus>::All;
    let active = all.next();
    assert_eq!(active, StatusFilter::Only(ActiveStatus::Active));
    assert_eq!(active.next(), StatusFilter::Only(ActiveStatus::Inactive));
    assert_eq!(active.next().next(), StatusFilter::All);
  }

  #[test]
  fn test_temporary_ids_sort_last() {
    let mut pending = category(0, "Pending", ActiveStatus::Active);
    pending.id = RecordId::Temporary(1);
    let records = vec![pending, category(9, "Z", ActiveStatus::Active)];

    let page = project(&records, &FilterState::new(10));
    assert_eq!(ids(&page), vec![RecordId::Server(9), RecordId::Temporary(1)]);
  }

  #[test]
  fn test_shared_filter_restore_respects_user_edits() {
    let mut state = FilterState::<ActiveStatus>::new(10);
    state.page = 4;
    let shared = SharedFilter::new(state);

    let (snapshot, revision) = shared.snapshot();
    let restored = shared.restore(snapshot.clone(), revision, |_| 2);
    assert_eq!(restored.page, 2);

    let (snapshot, revision) = shared.snapshot();
    shared.update(|s| s.search = "dent".to_string());
    let restored = shared.restore(snapshot, revision, |_| 2);
    assert_eq!(restored.search, "dent");
  }
}
