use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::contents::ContentsError;
use crate::exec::ExecError;
use crate::fetch::FetchError;
use crate::lua::RecipeError;
use crate::manager::PackageManager;
use crate::overrides::ResolveOpts;
use crate::package::PackageError;
use crate::platform::{Platform, PlatformError};
use crate::repo::RecipeCollection;

/// Typed build configuration decoded from a recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildVars {
  pub name: String,
  pub version: String,
  pub release: i64,
  pub epoch: u32,
  pub description: String,
  pub homepage: String,
  pub architectures: Vec<String>,
  pub licenses: Vec<String>,
  pub provides: Vec<String>,
  pub conflicts: Vec<String>,
  pub depends: Vec<String>,
  pub build_depends: Vec<String>,
  pub replaces: Vec<String>,
  pub sources: Vec<String>,
  pub checksums: Vec<String>,
  pub backup: Vec<String>,
}

/// Everything a build needs from its surroundings.
pub struct BuildContext {
  /// `None` means the running system is detected when a build starts.
  pub platform: Option<Platform>,
  pub resolve_opts: ResolveOpts,
  pub collection: RecipeCollection,
  pub manager: Box<dyn PackageManager>,
  /// Privilege elevation prefix for build dependency installs.
  pub root_cmd: String,
  /// Parent of every build session (`<cache>/pkgs`).
  pub pkgs_dir: PathBuf,
  pub cancel: CancellationToken,
}

/// Session directories for one build attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub base: PathBuf,
  pub src: PathBuf,
  pub pkg: PathBuf,
}

impl Session {
  pub fn new(pkgs_dir: &std::path::Path, name: &str) -> Self {
    let base = pkgs_dir.join(name);
    Self {
      src: base.join("src"),
      pkg: base.join("pkg"),
      base,
    }
  }
}

/// Packages produced by a build, including every locally built dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildOutput {
  pub paths: Vec<PathBuf>,
  pub names: Vec<String>,
}

/// Errors that abort a build.
///
/// A failing dependency build surfaces its own error unchanged.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error(transparent)]
  Recipe(#[from] RecipeError),

  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Exec(#[from] ExecError),

  #[error(transparent)]
  Contents(#[from] ContentsError),

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error("io error at '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("the checksums array must be the same length as sources ({sources} sources, {checksums} checksums)")]
  ChecksumCountMismatch { sources: usize, checksums: usize },

  #[error("no supported package manager found")]
  NoPackageManager,

  #[error("build cancelled")]
  Cancelled,
}

impl BuildError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    BuildError::Io {
      path: path.into(),
      source,
    }
  }

  /// Collapse collaborator cancellations into [`BuildError::Cancelled`].
  pub(crate) fn normalize(self) -> Self {
    match self {
      BuildError::Recipe(RecipeError::Cancelled(_))
      | BuildError::Fetch(FetchError::Cancelled)
      | BuildError::Exec(ExecError::Cancelled(_)) => BuildError::Cancelled,
      other => other,
    }
  }
}
