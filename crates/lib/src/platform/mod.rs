//! Running-system identity: architecture, distribution and language.

pub mod arch;
pub mod distro;
pub mod lang;
pub mod paths;

use std::path::PathBuf;

use thiserror::Error;

use arch::Arch;
use distro::OsRelease;

#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("failed to read os-release at '{path}': {source}")]
  ReadOsRelease {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("os-release at '{0}' has no ID")]
  MissingId(PathBuf),

  #[error("no os-release file found")]
  NoOsRelease,

  #[error("unsupported architecture: {0}")]
  UnsupportedArch(String),
}

/// The running system as seen by override resolution and the build environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
  pub arch: Arch,
  pub distro: OsRelease,
  /// Architecture chain, most specific first.
  pub architectures: Vec<String>,
}

impl Platform {
  pub fn new(arch: Arch, distro: OsRelease) -> Self {
    Self {
      architectures: arch.chain(),
      arch,
      distro,
    }
  }

  /// Build a platform with an explicit architecture chain.
  ///
  /// Useful when the chain should not come from the running machine.
  pub fn with_architectures(arch: Arch, distro: OsRelease, architectures: Vec<String>) -> Self {
    Self {
      arch,
      distro,
      architectures,
    }
  }

  /// Detect the current platform at runtime
  pub fn detect() -> Result<Self, PlatformError> {
    let arch = Arch::current().ok_or_else(|| PlatformError::UnsupportedArch(std::env::consts::ARCH.to_string()))?;
    let distro = OsRelease::detect()?;
    Ok(Self::new(arch, distro))
  }

  /// Most specific architecture name, as written into package metadata.
  pub fn package_arch(&self) -> String {
    self
      .architectures
      .first()
      .cloned()
      .unwrap_or_else(|| self.arch.as_str().to_string())
  }
}
