//! Implementation of the `srcpkg info` command.

use std::path::Path;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use srcpkg_lib::config::Config;
use srcpkg_lib::lua::{Decoder, RecipeRuntime};
use srcpkg_lib::overrides::{resolve, resolve_package};
use srcpkg_lib::platform::Platform;

use crate::output::print_json;

/// Print a recipe's package record as JSON.
///
/// Variants are resolved for the running system unless `all` is set, in which
/// case every declared variant is shown keyed by its suffix.
pub fn cmd_info(recipe: &Path, all: bool, config: &Config) -> Result<()> {
  if !recipe.exists() {
    anyhow::bail!("Recipe not found: {}", recipe.display());
  }

  let platform = Platform::detect().context("Failed to detect platform")?;
  let opts = config.resolve_opts();

  let rt = super::runtime()?;
  let record = rt.block_on(async {
    let runtime = RecipeRuntime::new(&platform, CancellationToken::new())?;
    runtime.load_file(recipe).await?;
    Decoder::new(&runtime, &platform, &opts).package_record()
  });
  let record = record.with_context(|| format!("Failed to load recipe {}", recipe.display()))?;

  if all {
    return print_json(&record);
  }

  let candidates = resolve(&platform, &opts).context("Failed to resolve overrides")?;
  print_json(&resolve_package(&record, &candidates))
}
