//! Package root classification.
//!
//! Walks the directory a recipe's `package()` hook filled and turns it into
//! the manifest a packaging backend serializes.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ContentsError {
  #[error("failed to walk package root: {0}")]
  Walk(#[from] walkdir::Error),

  #[error("path is not valid UTF-8: '{}'", .0.display())]
  NonUtf8Path(PathBuf),

  #[error("io error at '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
  /// An empty directory.
  Dir,
  Symlink,
  File,
  /// A regular file preserved on reinstall.
  Config,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
  /// On-disk path for files, link target for symlinks.
  pub source: PathBuf,
  /// Absolute install path (`/usr/bin/foo`).
  pub destination: String,
  pub kind: EntryKind,
  /// Seconds since the Unix epoch.
  pub mtime: u64,
  /// Permission bits.
  pub mode: u32,
  pub size: u64,
}

impl ManifestEntry {
  pub fn is_config(&self) -> bool {
    self.kind == EntryKind::Config
  }
}

/// Classify everything under `root`.
///
/// Directories only appear when empty. A regular file becomes
/// [`EntryKind::Config`] when its destination equals a `backup` entry exactly.
/// Entries are ordered by a pre-order walk with siblings sorted by name.
pub fn classify(root: &Path, backup: &[String]) -> Result<Vec<ManifestEntry>, ContentsError> {
  let mut entries = Vec::new();

  for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
    let entry = entry?;
    let path = entry.path();
    let io_err = |source| ContentsError::Io {
      path: path.to_path_buf(),
      source,
    };

    let meta = entry.metadata()?;
    let destination = destination(root, path)?;
    let file_type = entry.file_type();

    let (kind, source, size) = if file_type.is_dir() {
      let empty = std::fs::read_dir(path).map_err(io_err)?.next().is_none();
      if !empty {
        continue;
      }
      (EntryKind::Dir, path.to_path_buf(), 0)
    } else if file_type.is_symlink() {
      let target = std::fs::read_link(path).map_err(io_err)?;
      if target.to_str().is_none() {
        return Err(ContentsError::NonUtf8Path(target));
      }
      (EntryKind::Symlink, target, 0)
    } else if file_type.is_file() {
      let kind = if backup.iter().any(|b| *b == destination) {
        EntryKind::Config
      } else {
        EntryKind::File
      };
      (kind, path.to_path_buf(), meta.len())
    } else {
      debug!(path = %path.display(), "skipping special file");
      continue;
    };

    entries.push(ManifestEntry {
      source,
      destination,
      kind,
      mtime: mtime(&meta),
      mode: meta.permissions().mode() & 0o7777,
      size,
    });
  }

  debug!(root = %root.display(), entries = entries.len(), "classified package contents");
  Ok(entries)
}

/// Install path of `path`; package formats store names as text.
fn destination(root: &Path, path: &Path) -> Result<String, ContentsError> {
  let rel = path.strip_prefix(root).unwrap_or(path);
  rel
    .to_str()
    .map(|rel| format!("/{}", rel))
    .ok_or_else(|| ContentsError::NonUtf8Path(path.to_path_buf()))
}

fn mtime(meta: &std::fs::Metadata) -> u64 {
  meta
    .modified()
    .ok()
    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
    .map(|d| d.as_secs())
    .unwrap_or(0)
}
