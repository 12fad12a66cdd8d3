//! User configuration read from `srcpkg.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::CONFIG_FILE;
use crate::overrides::ResolveOpts;
use crate::platform::lang::system_language;
use crate::platform::paths::config_dir;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

/// A remote recipe repository cloned by `refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoConfig {
  pub name: String,
  pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
  /// Privilege elevation prefix for package manager installs. Empty disables it.
  #[serde(default = "default_root_cmd")]
  pub root_cmd: String,

  /// Language preference chain. `None` falls back to `LANG`.
  #[serde(default)]
  pub languages: Option<Vec<String>>,

  #[serde(default = "default_true")]
  pub like_distros: bool,

  #[serde(default)]
  pub repos: Vec<RepoConfig>,

  #[serde(default)]
  pub recipe_dirs: Vec<PathBuf>,
}

fn default_root_cmd() -> String {
  "sudo".to_string()
}

fn default_true() -> bool {
  true
}

impl Default for Config {
  fn default() -> Self {
    Self {
      root_cmd: default_root_cmd(),
      languages: None,
      like_distros: true,
      repos: Vec::new(),
      recipe_dirs: Vec::new(),
    }
  }
}

impl Config {
  /// Default config location: `$XDG_CONFIG_HOME/srcpkg/srcpkg.toml`.
  pub fn default_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
  }

  pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Load from `path`, or from the default location when `None`.
  ///
  /// A missing file at the default location yields the defaults; an explicit
  /// path must exist.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let (path, explicit) = match path {
      Some(p) => (p.to_path_buf(), true),
      None => (Self::default_path(), false),
    };

    if !explicit && !path.exists() {
      debug!(path = %path.display(), "no config file, using defaults");
      return Ok(Self::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
      path: path.clone(),
      source,
    })?;
    debug!(path = %path.display(), "loaded config");
    Self::parse(&content, &path)
  }

  /// Language preference chain: configured languages, or the system language.
  pub fn languages(&self) -> Vec<String> {
    match &self.languages {
      Some(langs) => langs.clone(),
      None => vec![system_language()],
    }
  }

  /// Resolver options derived from this config.
  pub fn resolve_opts(&self) -> ResolveOpts {
    ResolveOpts::default()
      .with_like_distros(self.like_distros)
      .with_languages(self.languages())
  }
}
