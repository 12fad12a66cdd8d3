//! Recipe builds.
//!
//! Building a recipe turns it into a package file for the host's package
//! format. Runtime dependencies that have a recipe in the local collection are
//! built first, depth-first, and become dependencies of the package; all other
//! dependencies are left to the system package manager at install time.
//!
//! Every build gets a fresh session under `<pkgs_dir>/<name>`: nothing is
//! reused between attempts, and a dependency reachable twice is built twice.

mod types;

pub use types::*;

use std::future::Future;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::pin::Pin;

use tracing::{debug, info};

use crate::contents;
use crate::exec::ExecOpts;
use crate::fetch::{self, Checksum, FetchError, SourceSpec};
use crate::lua::{Decoder, RecipeRuntime};
use crate::manager;
use crate::package::{self, PackageInfo};
use crate::platform::Platform;

type BuildFuture<'a> = Pin<Box<dyn Future<Output = Result<BuildOutput, BuildError>> + 'a>>;

/// Build the recipe at `recipe` and every local dependency it needs.
///
/// Returns the paths and names of all packages produced, deduplicated and
/// sorted. A failing dependency fails the whole build with its own error.
pub fn build_package<'a>(recipe: &'a Path, ctx: &'a BuildContext) -> BuildFuture<'a> {
  Box::pin(async move { build_recipe(recipe, ctx).await.map_err(BuildError::normalize) })
}

fn checkpoint(ctx: &BuildContext) -> Result<(), BuildError> {
  if ctx.cancel.is_cancelled() {
    return Err(BuildError::Cancelled);
  }
  Ok(())
}

async fn build_recipe(recipe: &Path, ctx: &BuildContext) -> Result<BuildOutput, BuildError> {
  let platform = match &ctx.platform {
    Some(platform) => platform.clone(),
    None => Platform::detect()?,
  };
  checkpoint(ctx)?;

  let runtime = RecipeRuntime::new(&platform, ctx.cancel.clone())?;
  runtime.load_file(recipe).await?;
  let vars = Decoder::new(&runtime, &platform, &ctx.resolve_opts).decode()?;
  info!(name = %vars.name, version = %vars.version, "Building package");

  let sources = parse_sources(&vars)?;
  checkpoint(ctx)?;

  let session = Session::new(&ctx.pkgs_dir, &vars.name);
  recreate_session(&session).await?;
  checkpoint(ctx)?;

  if !vars.build_depends.is_empty() {
    info!(packages = ?vars.build_depends, "Installing build dependencies");
    let opts = ExecOpts {
      cancel: ctx.cancel.clone(),
      ..Default::default()
    };
    manager::install(ctx.manager.as_ref(), &vars.build_depends, &ctx.root_cmd, &opts).await?;
  }
  checkpoint(ctx)?;

  let mut repo_deps = Vec::new();
  let mut built_paths = Vec::new();
  let mut built_names = Vec::new();
  if !vars.depends.is_empty() {
    info!("Installing dependencies");
    let (found, not_found) = ctx.collection.find_pkgs(&vars.depends);
    for dep in found {
      let output = build_package(&dep, ctx).await?;
      built_paths.extend(output.paths);
      built_names.extend(output.names);
      if let Some(name) = recipe_name(&dep) {
        built_names.push(name);
      }
    }
    repo_deps = not_found;
  }
  checkpoint(ctx)?;

  info!("Downloading sources");
  for (spec, checksum) in &sources {
    fetch::fetch(spec, &session.src, checksum, &ctx.cancel).await?;
    checkpoint(ctx)?;
  }

  runtime.set_var("srcdir", &session.src.to_string_lossy())?;
  runtime.set_var("pkgdir", &session.pkg.to_string_lossy())?;

  for name in ["build", "package"] {
    if let Some(hook) = runtime.try_get_hook(name)? {
      info!("Executing {}()", hook.name());
      runtime.run_hook(&hook, &session.src).await?;
    }
    checkpoint(ctx)?;
  }

  uniq(&mut repo_deps);
  uniq(&mut built_paths);
  uniq(&mut built_names);

  let mut depends = repo_deps;
  depends.extend(built_names.iter().cloned());
  let info = PackageInfo {
    name: vars.name.clone(),
    version: vars.version.clone(),
    release: vars.release,
    epoch: vars.epoch,
    description: vars.description.clone(),
    arch: platform.package_arch(),
    homepage: vars.homepage.clone(),
    license: vars.licenses.join(", "),
    depends,
    provides: vars.provides.clone(),
    conflicts: vars.conflicts.clone(),
    replaces: vars.replaces.clone(),
  };

  let manifest = contents::classify(&session.pkg, &vars.backup)?;
  checkpoint(ctx)?;

  let packager = package::packager_for(ctx.manager.format())?;
  let path = session.base.join(packager.conventional_file_name(&info));
  info!(path = %path.display(), format = %packager.format(), "Writing package");
  write_package(packager.as_ref(), &info, &manifest, &path)?;

  let mut paths = built_paths;
  paths.push(path);
  let mut names = built_names;
  names.push(vars.name);
  uniq(&mut paths);
  uniq(&mut names);

  Ok(BuildOutput { paths, names })
}

/// Pair every source with its checksum, validating both before anything is touched.
fn parse_sources(vars: &BuildVars) -> Result<Vec<(SourceSpec, Checksum)>, BuildError> {
  if vars.sources.len() != vars.checksums.len() {
    return Err(BuildError::ChecksumCountMismatch {
      sources: vars.sources.len(),
      checksums: vars.checksums.len(),
    });
  }

  let sources = vars
    .sources
    .iter()
    .zip(&vars.checksums)
    .map(|(source, checksum)| Ok((SourceSpec::parse(source)?, Checksum::parse(checksum)?)))
    .collect::<Result<Vec<_>, FetchError>>()?;
  Ok(sources)
}

async fn recreate_session(session: &Session) -> Result<(), BuildError> {
  match tokio::fs::remove_dir_all(&session.base).await {
    Ok(()) => debug!(path = %session.base.display(), "removed previous session"),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => return Err(BuildError::io(&session.base, e)),
  }
  for dir in [&session.src, &session.pkg] {
    tokio::fs::create_dir_all(dir)
      .await
      .map_err(|e| BuildError::io(dir, e))?;
  }
  Ok(())
}

fn write_package(
  packager: &dyn package::Packager,
  info: &PackageInfo,
  manifest: &[contents::ManifestEntry],
  path: &Path,
) -> Result<(), BuildError> {
  let file = std::fs::File::create(path).map_err(|e| BuildError::io(path, e))?;
  let mut writer = BufWriter::new(file);

  let written = packager
    .package(info, manifest, &mut writer)
    .map_err(BuildError::from)
    .and_then(|()| writer.flush().map_err(|e| BuildError::io(path, e)));

  if written.is_err() {
    let _ = std::fs::remove_file(path);
  }
  written
}

/// Name of the collection entry a recipe path was found under.
fn recipe_name(recipe: &Path) -> Option<String> {
  recipe
    .parent()
    .and_then(Path::file_name)
    .map(|name| name.to_string_lossy().into_owned())
}

fn uniq<T: Ord>(items: &mut Vec<T>) {
  items.sort();
  items.dedup();
}
