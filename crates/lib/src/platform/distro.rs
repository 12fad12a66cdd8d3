//! Distribution identity read from `os-release`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PlatformError;
use crate::consts::OS_RELEASE_ENV;

const OS_RELEASE_PATHS: &[&str] = &["/etc/os-release", "/usr/lib/os-release"];

/// Identity of the running distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsRelease {
  pub id: String,
  pub name: String,
  pub pretty_name: String,
  pub build_id: String,
  /// Declared ancestors (`ID_LIKE`), in declaration order.
  pub like: Vec<String>,
}

impl OsRelease {
  /// Parse the `KEY=value` content of an os-release file.
  pub fn parse(content: &str) -> Self {
    let mut out = OsRelease::default();

    for line in content.lines() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      let Some((key, value)) = line.split_once('=') else {
        continue;
      };
      let value = unquote(value.trim());

      match key.trim() {
        "ID" => out.id = value,
        "NAME" => out.name = value,
        "PRETTY_NAME" => out.pretty_name = value,
        "BUILD_ID" => out.build_id = value,
        "ID_LIKE" => out.like = value.split_whitespace().map(str::to_string).collect(),
        _ => {}
      }
    }

    out
  }

  /// Read and parse an os-release file.
  pub fn load(path: &Path) -> Result<Self, PlatformError> {
    let content = std::fs::read_to_string(path).map_err(|e| PlatformError::ReadOsRelease {
      path: path.to_path_buf(),
      source: e,
    })?;
    let info = Self::parse(&content);
    if info.id.is_empty() {
      return Err(PlatformError::MissingId(path.to_path_buf()));
    }
    Ok(info)
  }

  /// Detect the running distribution.
  ///
  /// `SRCPKG_OS_RELEASE` points at an alternative file; otherwise the standard
  /// locations are tried in order.
  pub fn detect() -> Result<Self, PlatformError> {
    if let Ok(path) = std::env::var(OS_RELEASE_ENV) {
      return Self::load(Path::new(&path));
    }

    let path = OS_RELEASE_PATHS
      .iter()
      .map(PathBuf::from)
      .find(|p| p.exists())
      .ok_or(PlatformError::NoOsRelease)?;
    debug!(path = %path.display(), "reading os-release");
    Self::load(&path)
  }

  /// The distro chain for override resolution: the id, then its ancestors if requested.
  pub fn distro_chain(&self, include_like: bool) -> Vec<String> {
    let mut out = vec![self.id.clone()];
    if include_like {
      out.extend(self.like.iter().cloned());
    }
    out
  }
}

fn unquote(value: &str) -> String {
  let stripped = value
    .strip_prefix('"')
    .and_then(|v| v.strip_suffix('"'))
    .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
    .unwrap_or(value);
  stripped.to_string()
}
