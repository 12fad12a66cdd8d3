//! SHA-256 hashing of fetched content.
//!
//! - `hash_file()`: a single file, streamed
//! - `hash_bytes()`: an in-memory buffer
//! - `hash_directory()`: a deterministic digest of a directory tree, used to
//!   verify version-control checkouts

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

pub type Sha256Digest = [u8; 32];

#[derive(Debug, Error)]
pub enum HashError {
  #[error("failed to walk directory: {0}")]
  Walk(#[from] walkdir::Error),

  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

fn read_err(path: &Path) -> impl FnOnce(std::io::Error) -> HashError + '_ {
  move |source| HashError::Read {
    path: path.to_path_buf(),
    source,
  }
}

/// Compute a deterministic hash of a directory's contents.
///
/// Covers file contents, directory structure and symlink targets, never
/// timestamps or permissions. Entries named in `exclude` are skipped along
/// with everything below them.
pub fn hash_directory(path: &Path, exclude: &[&str]) -> Result<Sha256Digest, HashError> {
  let walker = WalkDir::new(path).sort_by_file_name().into_iter().filter_entry(|e| {
    e.file_name()
      .to_str()
      .map(|name| !exclude.contains(&name))
      .unwrap_or(true)
  });

  let mut hasher = Sha256::new();
  for entry in walker {
    let entry = entry?;
    let rel = entry.path().strip_prefix(path).unwrap_or(entry.path());
    if rel.as_os_str().is_empty() {
      continue;
    }
    let rel = rel.to_string_lossy();

    let file_type = entry.file_type();
    let line = if file_type.is_file() {
      format!("F:{}:{}", rel, hex::encode(hash_file(entry.path())?))
    } else if file_type.is_dir() {
      format!("D:{}", rel)
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry.path()).map_err(read_err(entry.path()))?;
      format!("L:{}:{}", rel, target.to_string_lossy())
    } else {
      continue;
    };

    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }

  Ok(hasher.finalize().into())
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<Sha256Digest, HashError> {
  let mut file = fs::File::open(path).map_err(read_err(path))?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let n = file.read(&mut buffer).map_err(read_err(path))?;
    if n == 0 {
      break;
    }
    hasher.update(&buffer[..n]);
  }

  Ok(hasher.finalize().into())
}

pub fn hash_bytes(data: &[u8]) -> Sha256Digest {
  Sha256::digest(data).into()
}
