//! Implementation of the `srcpkg refresh` command.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use srcpkg_lib::config::Config;
use srcpkg_lib::platform::paths;
use srcpkg_lib::repo;

use super::{cancel_on_ctrl_c, runtime};
use crate::output::{print_info, print_success, symbols};

/// Clone missing recipe repositories and update existing ones.
pub fn cmd_refresh(config: &Config) -> Result<()> {
  if config.repos.is_empty() {
    print_info("No repositories configured");
    return Ok(());
  }

  let repo_dir = paths::repo_dir();
  let rt = runtime()?;
  let cancel = cancel_on_ctrl_c(&rt);
  let changed = rt
    .block_on(repo::refresh(&config.repos, &repo_dir, &cancel))
    .context("Failed to refresh repositories")?;

  for repo in &config.repos {
    if changed.contains(&repo.name) {
      println!("  {} {}", symbols::MODIFY.yellow(), repo.name.cyan());
    } else {
      println!("  {} {}", symbols::UNCHANGED.dimmed(), repo.name.dimmed());
    }
  }
  print_success(&format!("Refreshed {} repositories ({} changed)", config.repos.len(), changed.len()));
  Ok(())
}
