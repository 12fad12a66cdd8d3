//! Shared helpers for library integration tests.

use std::io::Read;
use std::path::{Path, PathBuf};

use srcpkg_lib::build::BuildContext;
use srcpkg_lib::manager::{PackageFormat, PackageManager};
use srcpkg_lib::overrides::ResolveOpts;
use srcpkg_lib::platform::Platform;
use srcpkg_lib::platform::arch::Arch;
use srcpkg_lib::platform::distro::OsRelease;
use srcpkg_lib::repo::RecipeCollection;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// A package manager that installs nothing and asks for deb packages.
pub struct StubManager;

impl PackageManager for StubManager {
  fn name(&self) -> &str {
    "stub"
  }

  fn format(&self) -> PackageFormat {
    PackageFormat::Deb
  }

  fn install_command(&self, pkgs: &[String]) -> Vec<String> {
    std::iter::once("true".to_string()).chain(pkgs.iter().cloned()).collect()
  }

  fn is_available(&self) -> bool {
    true
  }
}

pub fn debian() -> Platform {
  Platform::new(
    Arch::Amd64,
    OsRelease {
      id: "debian".to_string(),
      name: "Debian GNU/Linux".to_string(),
      pretty_name: "Debian GNU/Linux 13 (trixie)".to_string(),
      build_id: String::new(),
      like: vec![],
    },
  )
}

/// Isolated build environment.
///
/// Recipes live in `<temp>/repo/<name>/recipe.lua`, sessions in `<temp>/pkgs`.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("repo")).unwrap();
    Self { temp }
  }

  pub fn path(&self) -> &Path {
    self.temp.path()
  }

  pub fn pkgs_dir(&self) -> PathBuf {
    self.path().join("pkgs")
  }

  /// Add a recipe to the local collection and return its path.
  pub fn add_recipe(&self, name: &str, content: &str) -> PathBuf {
    let dir = self.path().join("repo").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("recipe.lua");
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Write a recipe outside the collection.
  pub fn write_recipe(&self, content: &str) -> PathBuf {
    let path = self.path().join("recipe.lua");
    std::fs::write(&path, content).unwrap();
    path
  }

  pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
    let path = self.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
  }

  pub fn context(&self) -> BuildContext {
    self.context_with_cancel(CancellationToken::new())
  }

  pub fn context_with_cancel(&self, cancel: CancellationToken) -> BuildContext {
    BuildContext {
      platform: Some(debian()),
      resolve_opts: ResolveOpts::default(),
      collection: RecipeCollection::new(vec![self.path().join("repo")]),
      manager: Box::new(StubManager),
      root_cmd: String::new(),
      pkgs_dir: self.pkgs_dir(),
      cancel,
    }
  }
}

/// The `control` file of a `.deb`.
pub fn deb_control(path: &Path) -> String {
  let file = std::fs::File::open(path).unwrap();
  let mut archive = ar::Archive::new(file);
  while let Some(entry) = archive.next_entry() {
    let entry = entry.unwrap();
    if entry.header().identifier() != b"control.tar.gz" {
      continue;
    }
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(entry));
    for file in tar.entries().unwrap() {
      let mut file = file.unwrap();
      if file.path().unwrap().to_string_lossy() == "control" {
        let mut control = String::new();
        file.read_to_string(&mut control).unwrap();
        return control;
      }
    }
  }
  panic!("no control file in {}", path.display());
}
