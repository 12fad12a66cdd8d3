//! Implementation of the `srcpkg build` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use srcpkg_lib::build::{BuildContext, BuildError, build_package};
use srcpkg_lib::config::Config;
use srcpkg_lib::manager;
use srcpkg_lib::platform::paths;
use srcpkg_lib::repo::RecipeCollection;

use super::{cancel_on_ctrl_c, runtime};

/// Build `recipe` and print the path of every package produced, one per line.
///
/// Local dependencies are looked up in `repo_dirs`, then in the configured
/// recipe directories, then in refreshed repositories.
pub fn cmd_build(recipe: &Path, repo_dirs: Vec<PathBuf>, config: &Config) -> Result<()> {
  if !recipe.exists() {
    anyhow::bail!("Recipe not found: {}", recipe.display());
  }

  let manager = manager::detect().ok_or(BuildError::NoPackageManager)?;
  info!(manager = manager.name(), format = %manager.format(), "detected package manager");

  let mut roots = repo_dirs;
  roots.extend(config.recipe_dirs.iter().cloned());
  let collection = RecipeCollection::from_config(&roots, &config.repos, &paths::repo_dir());

  let rt = runtime()?;
  let ctx = BuildContext {
    platform: None,
    resolve_opts: config.resolve_opts(),
    collection,
    manager,
    root_cmd: config.root_cmd.clone(),
    pkgs_dir: paths::pkgs_dir(),
    cancel: cancel_on_ctrl_c(&rt),
  };

  let output = rt
    .block_on(build_package(recipe, &ctx))
    .context("Error building package")?;

  info!(names = ?output.names, "Package(s) built successfully");
  for path in &output.paths {
    println!("{}", path.display());
  }
  Ok(())
}
