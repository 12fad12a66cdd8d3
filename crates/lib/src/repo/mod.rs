//! Local recipe collection.
//!
//! A collection is an ordered list of roots, each holding one directory per
//! recipe: `<root>/<name>/recipe.lua`. Roots listed earlier shadow later ones.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::RepoConfig;
use crate::consts::RECIPE_FILE;
use crate::fetch::{self, Checksum, FetchError, SourceSpec};

#[derive(Debug, Error)]
pub enum RepoError {
  #[error("invalid url for repository '{name}': {source}")]
  InvalidUrl {
    name: String,
    #[source]
    source: FetchError,
  },

  #[error("failed to refresh repository '{name}': {source}")]
  Refresh {
    name: String,
    #[source]
    source: FetchError,
  },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeCollection {
  roots: Vec<PathBuf>,
}

impl RecipeCollection {
  pub fn new(roots: Vec<PathBuf>) -> Self {
    Self { roots }
  }

  /// Collection over refreshed repositories in `repo_dir`, in config order,
  /// after `extra` roots.
  pub fn from_config(extra: &[PathBuf], repos: &[RepoConfig], repo_dir: &Path) -> Self {
    let mut roots = extra.to_vec();
    roots.extend(repos.iter().map(|r| repo_dir.join(&r.name)));
    Self { roots }
  }

  pub fn roots(&self) -> &[PathBuf] {
    &self.roots
  }

  /// Recipe path for `name`, from the first root that has one.
  pub fn find(&self, name: &str) -> Option<PathBuf> {
    self
      .roots
      .iter()
      .map(|root| root.join(name).join(RECIPE_FILE))
      .find(|path| path.is_file())
  }

  /// Split `names` into recipe paths found locally and names that are not.
  ///
  /// Both lists keep the input order.
  pub fn find_pkgs(&self, names: &[String]) -> (Vec<PathBuf>, Vec<String>) {
    let mut found = Vec::new();
    let mut not_found = Vec::new();
    for name in names {
      match self.find(name) {
        Some(path) => {
          debug!(name = %name, path = %path.display(), "found local recipe");
          found.push(path);
        }
        None => not_found.push(name.clone()),
      }
    }
    (found, not_found)
  }
}

/// Clone missing repositories into `repo_dir` and update existing ones.
///
/// Returns the names of repositories whose content changed.
pub async fn refresh(
  repos: &[RepoConfig],
  repo_dir: &Path,
  cancel: &CancellationToken,
) -> Result<Vec<String>, RepoError> {
  let mut changed = Vec::new();

  for repo in repos {
    let spec = repo_spec(repo)?;
    let path = repo_dir.join(&repo.name);
    let refresh_err = |source| RepoError::Refresh {
      name: repo.name.clone(),
      source,
    };

    if path.join(".git").exists() {
      let updated = fetch::update(&spec, &path, cancel).await.map_err(refresh_err)?;
      info!(repo = %repo.name, updated, "refreshed repository");
      if updated {
        changed.push(repo.name.clone());
      }
    } else {
      fetch::fetch(&spec, repo_dir, &Checksum::Skip, cancel)
        .await
        .map_err(refresh_err)?;
      info!(repo = %repo.name, "cloned repository");
      changed.push(repo.name.clone());
    }
  }

  Ok(changed)
}

/// Git source for a configured repository, named after it.
fn repo_spec(repo: &RepoConfig) -> Result<SourceSpec, RepoError> {
  let url = if repo.url.starts_with("git+") {
    repo.url.clone()
  } else {
    format!("git+{}", repo.url)
  };
  let sep = if url.contains('?') { '&' } else { '?' };
  SourceSpec::parse(&format!("{}{}~name={}", url, sep, repo.name)).map_err(|source| RepoError::InvalidUrl {
    name: repo.name.clone(),
    source,
  })
}
