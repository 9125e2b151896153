//! Payload normalization applied before change detection.
//!
//! Authors write dates in the course's local time and in a few friendly
//! formats; the platform wants UTC timestamps. Uploaded files are stamped
//! with a hash of their bytes. Doing both before the diff means checksums
//! cover what is actually sent.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use thiserror::Error;

use crate::resource::{Payload, ResourceKey, ResourceStore};
use crate::util::archive::{ArchiveError, ArchiveSpec};
use crate::util::hash::hash_bytes;

/// Payload fields holding timestamps.
pub const DATE_FIELDS: &[&str] = &["due_at", "unlock_at", "lock_at", "show_correct_answers_at"];

/// Field holding the hash of an uploaded file's bytes.
pub const CONTENT_HASH_FIELD: &str = "content_hash";

/// Local-time formats accepted for date fields.
const LOCAL_FORMATS: &[&str] = &["%b %d, %Y, %I:%M %p", "%b %d %Y %I:%M %p", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Error)]
pub enum PredeployError {
  #[error("invalid time zone '{0}': expected a zone name such as 'America/Denver' or an offset such as '-07:00'")]
  InvalidTimeZone(String),

  #[error("{key} ({location}): field '{field}' has unrecognized date '{value}'")]
  InvalidDate {
    key: ResourceKey,
    location: String,
    field: String,
    value: String,
  },

  #[error("{key} ({location}): failed to read {path}: {source}")]
  ReadFile {
    key: ResourceKey,
    location: String,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{key} ({location}): cannot build archive: {source}")]
  Archive {
    key: ResourceKey,
    location: String,
    #[source]
    source: ArchiveError,
  },
}

/// Rewrites a payload in place before it is diffed and deployed.
pub trait Predeploy {
  fn predeploy(&self, key: &ResourceKey, location: &str, data: &mut Payload) -> Result<(), PredeployError>;
}

#[derive(Debug, Clone, Copy)]
enum LocalZone {
  Fixed(FixedOffset),
  Named(Tz),
}

/// Converts local date fields to UTC RFC 3339.
#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
  zone: LocalZone,
}

impl DateNormalizer {
  pub fn new(offset: FixedOffset) -> Self {
    Self {
      zone: LocalZone::Fixed(offset),
    }
  }

  pub fn named(zone: Tz) -> Self {
    Self {
      zone: LocalZone::Named(zone),
    }
  }

  /// Parse `UTC`/`Z`, a `+HH:MM` / `-HH:MM` offset, or an IANA zone name.
  ///
  /// Named zones follow daylight saving time; a fixed offset never does.
  pub fn from_time_zone(time_zone: &str) -> Result<Self, PredeployError> {
    if let Some(offset) = parse_offset(time_zone) {
      return Ok(Self::new(offset));
    }
    time_zone
      .trim()
      .parse::<Tz>()
      .map(Self::named)
      .map_err(|_| PredeployError::InvalidTimeZone(time_zone.to_string()))
  }

  /// Normalize one date string, or `None` if it matches no known format.
  ///
  /// A local time that is repeated when clocks fall back resolves to its
  /// earlier instant; one skipped when clocks spring forward is rejected.
  pub fn normalize(&self, value: &str) -> Option<String> {
    let value = value.trim();
    if let Ok(zoned) = DateTime::parse_from_rfc3339(value) {
      return Some(zoned.with_timezone(&Utc).to_rfc3339());
    }
    if let Ok(zoned) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
      return Some(zoned.with_timezone(&Utc).to_rfc3339());
    }
    LOCAL_FORMATS.iter().find_map(|format| {
      let naive = NaiveDateTime::parse_from_str(value, format).ok()?;
      let utc = match self.zone {
        LocalZone::Fixed(offset) => offset.from_local_datetime(&naive).earliest()?.with_timezone(&Utc),
        LocalZone::Named(zone) => zone.from_local_datetime(&naive).earliest()?.with_timezone(&Utc),
      };
      Some(utc.to_rfc3339())
    })
  }
}

fn parse_offset(time_zone: &str) -> Option<FixedOffset> {
  let tz = time_zone.trim();
  if tz.eq_ignore_ascii_case("utc") || tz == "Z" {
    return FixedOffset::east_opt(0);
  }
  let (sign, rest) = match tz.as_bytes().first()? {
    b'+' => (1, &tz[1..]),
    b'-' => (-1, &tz[1..]),
    _ => return None,
  };
  let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
  let hours: i32 = hours.parse().ok()?;
  let minutes: i32 = minutes.parse().ok()?;
  if hours > 23 || minutes > 59 {
    return None;
  }
  FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl Predeploy for DateNormalizer {
  fn predeploy(&self, key: &ResourceKey, location: &str, data: &mut Payload) -> Result<(), PredeployError> {
    for field in DATE_FIELDS {
      let Some(value) = data.get_mut(*field) else {
        continue;
      };
      let invalid = |value: &Value| PredeployError::InvalidDate {
        key: key.clone(),
        location: location.to_string(),
        field: field.to_string(),
        value: match value {
          Value::String(s) => s.clone(),
          other => other.to_string(),
        },
      };
      match value {
        Value::Null => {}
        Value::String(text) if text.trim().is_empty() => *value = Value::Null,
        Value::String(text) => match self.normalize(text) {
          Some(normalized) => *value = Value::String(normalized),
          None => return Err(invalid(value)),
        },
        other => return Err(invalid(other)),
      }
    }
    Ok(())
  }
}

/// Stamps `file` and `zip` payloads with [`CONTENT_HASH_FIELD`], the hash
/// of the bytes they upload, so an edit on disk changes the checksum.
///
/// A `file` payload without a `path` is left alone for its deployer to reject.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl Predeploy for ContentHasher {
  fn predeploy(&self, key: &ResourceKey, location: &str, data: &mut Payload) -> Result<(), PredeployError> {
    let bytes = match key.rtype.as_str() {
      "file" => {
        let Some(path) = data.get("path").and_then(Value::as_str).map(PathBuf::from) else {
          return Ok(());
        };
        fs::read(&path).map_err(|source| PredeployError::ReadFile {
          key: key.clone(),
          location: location.to_string(),
          path,
          source,
        })?
      }
      "zip" => ArchiveSpec::from_payload(data)
        .and_then(|spec| spec.build())
        .map_err(|source| PredeployError::Archive {
          key: key.clone(),
          location: location.to_string(),
          source,
        })?,
      _ => return Ok(()),
    };
    data.insert(CONTENT_HASH_FIELD.to_string(), Value::String(hash_bytes(&bytes)));
    Ok(())
  }
}

/// Run `hook` over every declared payload in the store.
pub fn predeploy_all(store: &mut ResourceStore, hook: &dyn Predeploy) -> Result<(), PredeployError> {
  let keys: Vec<ResourceKey> = store.keys().cloned().collect();
  for key in keys {
    if let Some(resource) = store.get_mut(&key)
      && let Some(data) = resource.data.as_mut()
    {
      hook.predeploy(&key, &resource.content_path, data)?;
    }
  }
  Ok(())
}
