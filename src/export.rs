//! CSV export of the filtered (not paged) rows of a screen.

use chrono::NaiveDate;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};

use crate::cache::{Record, StatusValue};
use crate::remote::Tabular;
use crate::sync::{FilterState, StatusFilter};

fn escape_field(field: &str) -> String {
  if field.contains([',', '"', '\r', '\n']) {
    format!("\"{}\"", field.replace('"', "\"\""))
  } else {
    field.to_string()
  }
}

fn push_line<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
  let line: Vec<String> = fields.into_iter().map(escape_field).collect();
  out.push_str(&line.join(","));
  out.push_str("\r\n");
}

/// Render `rows` as CSV with one header row.
pub fn to_csv<T: Tabular>(rows: &[&T]) -> String {
  let mut out = String::new();
  push_line(&mut out, T::columns().iter().copied());
  for row in rows {
    let cells = row.cells();
    push_line(&mut out, cells.iter().map(String::as_str));
  }
  out
}

fn sanitize(part: &str) -> String {
  part
    .trim()
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
    .collect()
}

/// `{resource}_{YYYY-MM-DD}[_q-{search}][_status-{status}].csv`
pub fn export_filename<T: Record>(filter: &FilterState<T::Status>, date: NaiveDate) -> String {
  let mut name = format!("{}_{}", T::resource_name(), date.format("%Y-%m-%d"));

  let search = sanitize(&filter.search);
  if !search.is_empty() {
    name.push_str("_q-");
    name.push_str(&search);
  }
  if let StatusFilter::Only(status) = filter.status {
    name.push_str("_status-");
    name.push_str(&sanitize(status.label()));
  }

  name.push_str(".csv");
  name
}

/// Write `rows` to `dir`, returning the path written.
pub fn write_export<T: Record + Tabular>(
  dir: &Path,
  rows: &[&T],
  filter: &FilterState<T::Status>,
  date: NaiveDate,
) -> Result<PathBuf> {
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create export directory {}: {}", dir.display(), e))?;

  let path = dir.join(export_filename::<T>(filter, date));
  std::fs::write(&path, to_csv(rows))
    .map_err(|e| eyre!("Failed to write export {}: {}", path.display(), e))?;

  tracing::info!(path = %path.display(), rows = rows.len(), "exported csv");
  Ok(path)
}
