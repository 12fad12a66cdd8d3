//! Packaging backends.
//!
//! A backend serializes package metadata and a classified manifest into a
//! concrete package file. Backends are picked by the format of the host's
//! package manager.

mod archlinux;
mod deb;
mod rpm;

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::contents::ManifestEntry;
use crate::manager::PackageFormat;

pub use archlinux::ArchlinuxPackager;
pub use deb::DebPackager;
pub use rpm::RpmPackager;

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("unsupported package format: {0}")]
  UnsupportedFormat(PackageFormat),

  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write package: {0}")]
  Write(#[source] std::io::Error),

  #[error("rpm error: {0}")]
  Rpm(String),
}

/// Metadata written into a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
  pub name: String,
  pub version: String,
  pub release: i64,
  pub epoch: u32,
  pub description: String,
  /// Architecture in platform naming (`amd64`, `arm7`); backends translate it.
  pub arch: String,
  pub homepage: String,
  pub license: String,
  pub depends: Vec<String>,
  pub provides: Vec<String>,
  pub conflicts: Vec<String>,
  pub replaces: Vec<String>,
}

pub trait Packager {
  fn format(&self) -> PackageFormat;

  /// File name a package for `info` is conventionally stored under.
  fn conventional_file_name(&self, info: &PackageInfo) -> String;

  /// Serialize `info` and `contents` into `writer`.
  fn package(&self, info: &PackageInfo, contents: &[ManifestEntry], writer: &mut dyn Write) -> Result<(), PackageError>;
}

/// Backend producing packages of `format`.
pub fn packager_for(format: PackageFormat) -> Result<Box<dyn Packager>, PackageError> {
  match format {
    PackageFormat::Deb => Ok(Box::new(DebPackager)),
    PackageFormat::Rpm => Ok(Box::new(RpmPackager)),
    PackageFormat::Archlinux => Ok(Box::new(ArchlinuxPackager)),
    PackageFormat::Apk => Err(PackageError::UnsupportedFormat(format)),
  }
}

/// Translate a platform architecture name to the name `format` uses.
pub fn arch_for_format(arch: &str, format: PackageFormat) -> String {
  let translated = match format {
    PackageFormat::Deb => match arch {
      "386" => "i386",
      "arm7" => "armhf",
      "arm" | "arm6" | "arm5" => "armel",
      "mips64le" => "mips64el",
      other => other,
    },
    PackageFormat::Rpm => match arch {
      "amd64" => "x86_64",
      "arm64" => "aarch64",
      "386" => "i686",
      "arm7" => "armv7hl",
      "arm6" => "armv6hl",
      "arm" | "arm5" => "armv5tel",
      "loong64" => "loongarch64",
      "mips64le" => "mips64el",
      other => other,
    },
    PackageFormat::Archlinux => match arch {
      "amd64" => "x86_64",
      "arm64" => "aarch64",
      "386" => "i686",
      "arm7" => "armv7h",
      "arm6" => "armv6h",
      "arm" | "arm5" => "arm",
      "loong64" => "loong64",
      other => other,
    },
    PackageFormat::Apk => arch,
  };
  translated.to_string()
}

/// Install path without its leading slash, as stored inside archives.
pub(crate) fn archive_path(destination: &str) -> &str {
  destination.trim_start_matches('/')
}

/// Every ancestor directory of the manifest's entries, parents first.
pub(crate) fn parent_dirs(contents: &[ManifestEntry]) -> BTreeSet<PathBuf> {
  let mut parents = BTreeSet::new();
  for entry in contents {
    let mut parent = Path::new(archive_path(&entry.destination)).parent();
    while let Some(dir) = parent.filter(|p| !p.as_os_str().is_empty()) {
      parents.insert(dir.to_path_buf());
      parent = dir.parent();
    }
  }
  parents
}

pub(crate) fn tar_header(kind: tar::EntryType, mode: u32, mtime: u64, size: u64) -> tar::Header {
  let mut header = tar::Header::new_gnu();
  header.set_entry_type(kind);
  header.set_mode(mode);
  header.set_mtime(mtime);
  header.set_size(size);
  header.set_uid(0);
  header.set_gid(0);
  header
}

pub(crate) fn read_source(entry: &ManifestEntry) -> Result<Vec<u8>, PackageError> {
  std::fs::read(&entry.source).map_err(|source| PackageError::Read {
    path: entry.source.clone(),
    source,
  })
}
