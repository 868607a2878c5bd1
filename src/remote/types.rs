use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::RecordId;

/// Status shared by the catalogue resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveStatus {
  Active,
  Inactive,
}

/// Attendance mark for one staff member on one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
  Present,
  Absent,
  Late,
  #[serde(rename = "Half Day")]
  HalfDay,
}

/// Staff role with its granted permissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
  pub id: RecordId,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub permissions: Vec<String>,
  pub status: ActiveStatus,
  pub created_at: DateTime<Utc>,
}

/// Product category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
  pub id: RecordId,
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub status: ActiveStatus,
  pub created_at: DateTime<Utc>,
}

/// Supplier contact card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
  pub id: RecordId,
  pub name: String,
  #[serde(default)]
  pub contact_person: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub phone: String,
  #[serde(default)]
  pub address: String,
  pub status: ActiveStatus,
  pub created_at: DateTime<Utc>,
}

/// Doctor profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
  pub id: RecordId,
  pub name: String,
  pub specialization: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub phone: String,
  pub status: ActiveStatus,
  pub created_at: DateTime<Utc>,
}

/// One staff member's attendance for one calendar date.
///
/// At most one entry exists per (staff_id, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
  pub id: RecordId,
  pub staff_id: String,
  pub staff_name: String,
  #[serde(default)]
  pub role: String,
  pub date: NaiveDate,
  pub status: AttendanceStatus,
  #[serde(default)]
  pub check_in: Option<NaiveTime>,
  #[serde(default)]
  pub check_out: Option<NaiveTime>,
  pub marked_at: DateTime<Utc>,
}

impl AttendanceEntry {
  /// A fresh mark for the same staff member, to be upserted for `date`.
  pub fn remark(&self, date: NaiveDate, status: AttendanceStatus, now: DateTime<Utc>) -> Self {
    let check_in = match status {
      AttendanceStatus::Absent => None,
      _ if date == self.date => self.check_in.or(Some(now.time())),
      _ => Some(now.time()),
    };

    Self {
      id: self.id.clone(),
      staff_id: self.staff_id.clone(),
      staff_name: self.staff_name.clone(),
      role: self.role.clone(),
      date,
      status,
      check_in,
      check_out: None,
      marked_at: now,
    }
  }
}
