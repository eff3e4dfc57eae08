//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width so
//! that they sort lexically. UUIDs are stored as hyphenated lowercase strings.
//! ID sets are bound as JSON arrays and expanded with `json_each`.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use trove_core::record::Record;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

/// Encode a set of IDs as a JSON array for `json_each(?)`.
pub fn encode_id_set(ids: &BTreeSet<Uuid>) -> Result<String> {
  let strings: Vec<String> = ids.iter().copied().map(encode_uuid).collect();
  Ok(serde_json::to_string(&strings)?)
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ─── Field paths ──────────────────────────────────────────────────────────────

/// `$.field` for a top-level document field.
///
/// The path is spliced into SQL (so that expression indexes apply), which is
/// why only plain identifiers are accepted.
pub fn json_path(field: &str) -> Result<String> {
  let mut chars = field.chars();
  let valid = chars
    .next()
    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
  if !valid {
    return Err(Error::InvalidField(field.to_owned()));
  }
  Ok(format!("'$.{field}'"))
}

// ─── Documents ────────────────────────────────────────────────────────────────

pub fn encode_body<R: Record>(record: &R) -> Result<(serde_json::Value, String)> {
  let value = serde_json::to_value(record)?;
  let text = value.to_string();
  Ok((value, text))
}

pub fn decode_body<R: Record>(body: &str) -> Result<R> { Ok(serde_json::from_str(body)?) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = DateTime::parse_from_rfc3339("2024-01-01T00:00:01.5Z")
      .unwrap()
      .with_timezone(&Utc);
    let b = DateTime::parse_from_rfc3339("2024-01-01T00:00:01.25Z")
      .unwrap()
      .with_timezone(&Utc);
    assert!(encode_dt(b) < encode_dt(a));
  }

  #[test]
  fn json_path_rejects_non_identifiers() {
    assert_eq!(json_path("owner").unwrap(), "'$.owner'");
    assert!(json_path("owner') OR 1=1 --").is_err());
    assert!(json_path("").is_err());
    assert!(json_path("9lives").is_err());
  }

  #[test]
  fn id_set_is_a_json_array() {
    let id = Uuid::nil();
    let encoded = encode_id_set(&BTreeSet::from([id])).unwrap();
    assert_eq!(encoded, format!("[\"{id}\"]"));
  }
}
