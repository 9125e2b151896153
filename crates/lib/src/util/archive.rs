//! Deterministic zip archives of local folders.
//!
//! Entries are stored uncompressed, sorted by name and stamped with the zip
//! epoch (1980-01-01), so the same files always produce the same bytes and
//! the archive's hash only changes when its content does.

use std::collections::BTreeMap;
use std::fs::{self, Metadata};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::resource::Payload;

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("missing required field '{0}'")]
  MissingField(String),

  #[error("folder not found: {0}")]
  MissingFolder(PathBuf),

  #[error("invalid exclude pattern '{pattern}': {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: regex::Error,
  },

  #[error("failed to walk {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write archive: {0}")]
  Zip(#[from] ZipError),
}

/// What goes into an archive.
///
/// Files in `priority_folder` win over same-named files from
/// `content_folder` and `additional_files`. The exclude pattern is matched
/// against each file and folder name; an excluded folder is skipped whole.
#[derive(Debug, Clone)]
pub struct ArchiveSpec {
  pub file_name: String,
  pub content_folder: PathBuf,
  pub priority_folder: Option<PathBuf>,
  pub additional_files: Vec<PathBuf>,
  pub exclude: Option<Regex>,
}

fn optional_str<'a>(data: &'a Payload, field: &str) -> Option<&'a str> {
  data.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

impl ArchiveSpec {
  /// Read a `zip` resource payload.
  pub fn from_payload(data: &Payload) -> Result<Self, ArchiveError> {
    let required = |field: &str| optional_str(data, field).ok_or_else(|| ArchiveError::MissingField(field.to_string()));
    let exclude = optional_str(data, "exclude_pattern")
      .map(|pattern| {
        Regex::new(pattern).map_err(|source| ArchiveError::Pattern {
          pattern: pattern.to_string(),
          source,
        })
      })
      .transpose()?;
    let additional_files = data
      .get("additional_files")
      .and_then(Value::as_array)
      .map(|files| files.iter().filter_map(Value::as_str).map(PathBuf::from).collect())
      .unwrap_or_default();

    Ok(Self {
      file_name: required("zip_file_name")?.to_string(),
      content_folder: PathBuf::from(required("content_folder")?),
      priority_folder: optional_str(data, "priority_folder").map(PathBuf::from),
      additional_files,
      exclude,
    })
  }

  /// Entry name → source file, in archive order.
  pub fn entries(&self) -> Result<BTreeMap<String, PathBuf>, ArchiveError> {
    let mut files = BTreeMap::new();
    collect(&self.content_folder, self.exclude.as_ref(), "", &mut files)?;
    for extra in &self.additional_files {
      let name = entry_name(extra);
      if extra.is_dir() {
        collect(extra, None, &name, &mut files)?;
      } else {
        files.insert(name, extra.clone());
      }
    }

    let Some(priority) = &self.priority_folder else {
      return Ok(files);
    };
    let mut preferred = BTreeMap::new();
    collect(priority, self.exclude.as_ref(), "", &mut preferred)?;
    for (name, path) in files {
      if let Some(kept) = preferred.get(&name) {
        debug!(entry = %name, preferred = %kept.display(), skipped = %path.display(), "priority file wins");
        continue;
      }
      preferred.insert(name, path);
    }
    Ok(preferred)
  }

  /// Build the archive in memory.
  pub fn build(&self) -> Result<Vec<u8>, ArchiveError> {
    let entries = self.entries()?;
    debug!(archive = %self.file_name, entries = entries.len(), "building archive");

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
      .compression_method(CompressionMethod::Stored)
      .last_modified_time(DateTime::default());
    for (name, path) in &entries {
      let read_err = |source| ArchiveError::Read {
        path: path.clone(),
        source,
      };
      let metadata = fs::metadata(path).map_err(read_err)?;
      let bytes = fs::read(path).map_err(read_err)?;
      writer.start_file(name.as_str(), options.unix_permissions(file_mode(&metadata)))?;
      writer.write_all(&bytes).map_err(ZipError::from)?;
    }
    Ok(writer.finish()?.into_inner())
  }
}

fn entry_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default()
}

/// Add every file under `folder` to `files` as `prefix/relative/path`.
fn collect(
  folder: &Path,
  exclude: Option<&Regex>,
  prefix: &str,
  files: &mut BTreeMap<String, PathBuf>,
) -> Result<(), ArchiveError> {
  if !folder.is_dir() {
    return Err(ArchiveError::MissingFolder(folder.to_path_buf()));
  }

  let walker = WalkDir::new(folder)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| {
      entry.depth() == 0 || exclude.is_none_or(|re| !re.is_match(&entry.file_name().to_string_lossy()))
    });

  for entry in walker {
    let entry = entry.map_err(|source| ArchiveError::Walk {
      path: folder.to_path_buf(),
      source,
    })?;
    if !entry.file_type().is_file() {
      continue;
    }
    let relative = entry.path().strip_prefix(folder).unwrap_or(entry.path());
    let relative = relative
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");
    let name = if prefix.is_empty() {
      relative
    } else {
      format!("{prefix}/{relative}")
    };
    files.insert(name, entry.path().to_path_buf());
  }
  Ok(())
}

#[cfg(unix)]
fn file_mode(metadata: &Metadata) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &Metadata) -> u32 {
  0o644
}
