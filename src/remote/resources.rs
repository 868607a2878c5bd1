//! Record implementations for the admin resource types.

use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};

use crate::cache::{Record, RecordId, StatusValue};
use crate::error::ValidationFailure;
use crate::sync::Intent;

use super::types::{
  ActiveStatus, AttendanceEntry, AttendanceStatus, Category, Doctor, Role, Supplier,
};

// ============================================================================
// Status values
// ============================================================================

impl StatusValue for ActiveStatus {
  fn label(&self) -> &'static str {
    match self {
      ActiveStatus::Active => "active",
      ActiveStatus::Inactive => "inactive",
    }
  }

  fn all_variants() -> &'static [Self] {
    &[ActiveStatus::Active, ActiveStatus::Inactive]
  }
}

impl StatusValue for AttendanceStatus {
  fn label(&self) -> &'static str {
    match self {
      AttendanceStatus::Present => "Present",
      AttendanceStatus::Absent => "Absent",
      AttendanceStatus::Late => "Late",
      AttendanceStatus::HalfDay => "Half Day",
    }
  }

  fn all_variants() -> &'static [Self] {
    &[
      AttendanceStatus::Present,
      AttendanceStatus::Absent,
      AttendanceStatus::Late,
      AttendanceStatus::HalfDay,
    ]
  }
}

/// The status following `status` in display order, wrapping around.
pub fn next_status<S: StatusValue>(status: S) -> S {
  let variants = S::all_variants();
  let idx = variants.iter().position(|s| *s == status).unwrap_or(0);
  variants[(idx + 1) % variants.len()]
}

// ============================================================================
// Record implementations
// ============================================================================

fn require(field: &'static str, value: &str) -> Result<(), ValidationFailure> {
  if value.trim().is_empty() {
    Err(ValidationFailure::MissingField(field))
  } else {
    Ok(())
  }
}

fn check_email(value: &str) -> Result<(), ValidationFailure> {
  if value.is_empty() || value.contains('@') {
    Ok(())
  } else {
    Err(ValidationFailure::InvalidField {
      field: "email",
      reason: format!("'{}' is not an email address", value),
    })
  }
}

impl Record for Role {
  type Status = ActiveStatus;

  fn resource_name() -> &'static str {
    "roles"
  }

  fn id(&self) -> &RecordId {
    &self.id
  }

  fn set_id(&mut self, id: RecordId) {
    self.id = id;
  }

  fn status(&self) -> ActiveStatus {
    self.status
  }

  fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  fn search_fields(&self) -> Vec<&str> {
    vec![self.name.as_str(), self.description.as_str()]
  }

  fn validate(&self) -> Result<(), ValidationFailure> {
    require("name", &self.name)
  }
}

impl Record for Category {
  type Status = ActiveStatus;

  fn resource_name() -> &'static str {
    "categories"
  }

  fn id(&self) -> &RecordId {
    &self.id
  }

  fn set_id(&mut self, id: RecordId) {
    self.id = id;
  }

  fn status(&self) -> ActiveStatus {
    self.status
  }

  fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  fn search_fields(&self) -> Vec<&str> {
    vec![self.name.as_str(), self.description.as_str()]
  }

  fn validate(&self) -> Result<(), ValidationFailure> {
    require("name", &self.name)
  }
}

impl Record for Supplier {
  type Status = ActiveStatus;

  fn resource_name() -> &'static str {
    "suppliers"
  }

  fn id(&self) -> &RecordId {
    &self.id
  }

  fn set_id(&mut self, id: RecordId) {
    self.id = id;
  }

  fn status(&self) -> ActiveStatus {
    self.status
  }

  fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  fn search_fields(&self) -> Vec<&str> {
    vec![self.name.as_str(), self.contact_person.as_str(), self.email.as_str()]
  }

  fn validate(&self) -> Result<(), ValidationFailure> {
    require("name", &self.name)?;
    check_email(&self.email)
  }
}

impl Record for Doctor {
  type Status = ActiveStatus;

  fn resource_name() -> &'static str {
    "doctors"
  }

  fn id(&self) -> &RecordId {
    &self.id
  }

  fn set_id(&mut self, id: RecordId) {
    self.id = id;
  }

  fn status(&self) -> ActiveStatus {
    self.status
  }

  fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  fn search_fields(&self) -> Vec<&str> {
    vec![self.name.as_str(), self.specialization.as_str()]
  }

  fn validate(&self) -> Result<(), ValidationFailure> {
    require("name", &self.name)?;
    require("specialization", &self.specialization)?;
    check_email(&self.email)
  }
}

impl Record for AttendanceEntry {
  type Status = AttendanceStatus;

  fn resource_name() -> &'static str {
    "attendance"
  }

  fn id(&self) -> &RecordId {
    &self.id
  }

  fn set_id(&mut self, id: RecordId) {
    self.id = id;
  }

  fn status(&self) -> AttendanceStatus {
    self.status
  }

  fn created_at(&self) -> DateTime<Utc> {
    self.marked_at
  }

  fn search_fields(&self) -> Vec<&str> {
    vec![self.staff_name.as_str(), self.staff_id.as_str(), self.role.as_str()]
  }

  fn natural_key(&self) -> Option<String> {
    Some(format!("{}@{}", self.staff_id, self.date))
  }

  fn validate(&self) -> Result<(), ValidationFailure> {
    require("staff id", &self.staff_id)?;
    require("staff name", &self.staff_name)?;
    if let (Some(check_in), Some(check_out)) = (self.check_in, self.check_out) {
      if check_out < check_in {
        return Err(ValidationFailure::InvalidField {
          field: "check out",
          reason: "must not be earlier than check in".to_string(),
        });
      }
    }
    Ok(())
  }
}

// ============================================================================
// Table / CSV columns
// ============================================================================

/// Column layout shared by the list screens and CSV export.
pub trait Tabular {
  fn columns() -> &'static [&'static str];

  fn cells(&self) -> Vec<String>;
}

impl Tabular for Role {
  fn columns() -> &'static [&'static str] {
    &["ID", "Name", "Description", "Permissions", "Status", "Created"]
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.name.clone(),
      self.description.clone(),
      self.permissions.join(", "),
      self.status.label().to_string(),
      self.created_at.format("%Y-%m-%d").to_string(),
    ]
  }
}

impl Tabular for Category {
  fn columns() -> &'static [&'static str] {
    &["ID", "Name", "Description", "Status", "Created"]
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.name.clone(),
      self.description.clone(),
      self.status.label().to_string(),
      self.created_at.format("%Y-%m-%d").to_string(),
    ]
  }
}

impl Tabular for Supplier {
  fn columns() -> &'static [&'static str] {
    &["ID", "Name", "Contact", "Email", "Phone", "Status", "Created"]
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.name.clone(),
      self.contact_person.clone(),
      self.email.clone(),
      self.phone.clone(),
      self.status.label().to_string(),
      self.created_at.format("%Y-%m-%d").to_string(),
    ]
  }
}

impl Tabular for Doctor {
  fn columns() -> &'static [&'static str] {
    &["ID", "Name", "Specialization", "Email", "Phone", "Status", "Created"]
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.name.clone(),
      self.specialization.clone(),
      self.email.clone(),
      self.phone.clone(),
      self.status.label().to_string(),
      self.created_at.format("%Y-%m-%d").to_string(),
    ]
  }
}

impl Tabular for AttendanceEntry {
  fn columns() -> &'static [&'static str] {
    &["ID", "Staff ID", "Name", "Role", "Date", "Status", "Check in", "Check out"]
  }

  fn cells(&self) -> Vec<String> {
    let time = |t: Option<chrono::NaiveTime>| {
      t.map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
    };
    vec![
      self.id.to_string(),
      self.staff_id.clone(),
      self.staff_name.clone(),
      self.role.clone(),
      self.date.to_string(),
      self.status.label().to_string(),
      time(self.check_in),
      time(self.check_out),
    ]
  }
}

// ============================================================================
// Quick status toggle
// ============================================================================

/// The one-key mutations each screen offers on its selected row.
pub trait StatusToggle: Record {
  fn toggle_intent(&self, today: NaiveDate, now: DateTime<Utc>) -> Intent<Self>;

  /// This record under another name, for the copy and rename prompts.
  /// `None` for resources whose records have no editable name.
  fn with_name(&self, _name: &str) -> Option<Self> {
    None
  }
}

macro_rules! toggle_by_update {
  ($($ty:ty),*) => {
    $(
      impl StatusToggle for $ty {
        fn toggle_intent(&self, _today: NaiveDate, _now: DateTime<Utc>) -> Intent<Self> {
          let mut next = self.clone();
          next.status = next_status(self.status);
          Intent::Update(next)
        }

        fn with_name(&self, name: &str) -> Option<Self> {
          let mut next = self.clone();
          next.name = name.trim().to_string();
          Some(next)
        }
      }
    )*
  };
}

toggle_by_update!(Role, Category, Supplier, Doctor);

impl StatusToggle for AttendanceEntry {
  /// Marks the staff member for `today`; upserts onto today's entry if any.
  fn toggle_intent(&self, today: NaiveDate, now: DateTime<Utc>) -> Intent<Self> {
    let status = if self.date == today {
      next_status(self.status)
    } else {
      AttendanceStatus::Present
    };
    Intent::Create(self.remark(today, status, now))
  }
}

// ============================================================================
// Snapshot keys
// ============================================================================

/// Fallback store key for resource `T` on the backend at `base_url`.
///
/// Scoped by backend so that pointing the client at another server never
/// serves the first server's snapshot.
pub fn snapshot_key<T: Record>(base_url: &str) -> String {
  let normalized = base_url.trim().trim_end_matches('/').to_lowercase();

  // SHA256 hash for stable, fixed-length keys
  let mut hasher = Sha256::new();
  hasher.update(normalized.as_bytes());
  let digest = hex::encode(hasher.finalize());

  format!("{}:{}", T::resource_name(), &digest[..16])
}
