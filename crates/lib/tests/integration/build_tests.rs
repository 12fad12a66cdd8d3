//! Orchestrator tests against real Lua recipes.

use std::path::PathBuf;

use srcpkg_lib::build::{BuildError, build_package};
use srcpkg_lib::contents::{ManifestEntry, classify};
use srcpkg_lib::lua::RecipeError;
use tokio_util::sync::CancellationToken;

use super::common::{TestEnv, deb_control};

const LIBB: &str = r#"
name = "libb"
version = "1.0"
release = 1
desc = "The B library"

function package(srcdir)
  exec("mkdir -p " .. pkgdir .. "/usr/lib && echo b > " .. pkgdir .. "/usr/lib/libb.txt")
end
"#;

fn app_recipe(source: &str) -> String {
  format!(
    r#"
name = "appa"
version = "2.0"
release = 1
license = {{"MIT"}}
deps = {{"libb", "libc6"}}
sources = {{"file://{}"}}
checksums = {{"SKIP"}}
backup = {{"/etc/appa.conf"}}

function build(srcdir)
  exec("test -f hello.txt")
end

function package(srcdir)
  exec("mkdir -p " .. pkgdir .. "/usr/share/appa " .. pkgdir .. "/etc")
  exec("cp hello.txt " .. pkgdir .. "/usr/share/appa/")
  exec("echo x=1 > " .. pkgdir .. "/etc/appa.conf")
end
"#,
    source
  )
}

fn without_mtime(mut entries: Vec<ManifestEntry>) -> Vec<ManifestEntry> {
  for entry in &mut entries {
    entry.mtime = 0;
  }
  entries
}

fn debs(dir: PathBuf) -> Vec<PathBuf> {
  match std::fs::read_dir(dir) {
    Ok(entries) => entries
      .map(|e| e.unwrap().path())
      .filter(|p| p.extension().is_some_and(|e| e == "deb"))
      .collect(),
    Err(_) => vec![],
  }
}

mod dependencies {
  use super::*;

  #[tokio::test]
  async fn local_dependency_is_built_first() {
    let env = TestEnv::new();
    env.add_recipe("libb", LIBB);
    let hello = env.write_file("hello.txt", "hello\n");
    let recipe = env.write_recipe(&app_recipe(&hello.display().to_string()));

    let output = build_package(&recipe, &env.context()).await.unwrap();

    assert_eq!(output.names, vec!["appa", "libb"]);
    let libb = env.pkgs_dir().join("libb/libb_1.0-1_amd64.deb");
    let appa = env.pkgs_dir().join("appa/appa_2.0-1_amd64.deb");
    assert_eq!(output.paths, vec![appa.clone(), libb.clone()]);
    assert!(libb.exists());
    assert!(appa.exists());

    let control = deb_control(&appa);
    assert!(control.contains("Depends: libc6, libb\n"), "{}", control);
    assert!(control.contains("Architecture: amd64\n"));

    let control = deb_control(&libb);
    assert!(control.contains("Description: The B library\n"));
    assert!(!control.contains("Depends:"));
  }

  #[tokio::test]
  async fn failing_dependency_fails_dependent() {
    let env = TestEnv::new();
    env.add_recipe(
      "libb",
      r#"
name = "libb"
version = "1.0"
release = 1

function build(srcdir)
  exec("exit 3")
end
"#,
    );
    let hello = env.write_file("hello.txt", "hello\n");
    let recipe = env.write_recipe(&app_recipe(&hello.display().to_string()));

    let err = build_package(&recipe, &env.context()).await.unwrap_err();
    assert!(
      matches!(&err, BuildError::Recipe(RecipeError::Hook { name, .. }) if name == "build"),
      "unexpected error: {}",
      err
    );
    assert!(debs(env.pkgs_dir().join("appa")).is_empty());
    assert!(debs(env.pkgs_dir().join("libb")).is_empty());
  }

  #[tokio::test]
  async fn unknown_dependencies_are_kept_by_name() {
    let env = TestEnv::new();
    let recipe = env.write_recipe(
      r#"
name = "tool"
version = "0.1"
release = 2
deps = {"zlib", "curl", "zlib"}
"#,
    );

    let output = build_package(&recipe, &env.context()).await.unwrap();
    assert_eq!(output.names, vec!["tool"]);
    let control = deb_control(&output.paths[0]);
    assert!(control.contains("Depends: curl, zlib\n"), "{}", control);
  }
}

mod variants {
  use super::*;

  #[tokio::test]
  async fn distro_variant_wins_over_base() {
    let env = TestEnv::new();
    let recipe = env.write_recipe(
      r#"
name = "tool"
version = "0.1"
release = 1
deps = {"zlib"}
deps_debian = {"zlib1g"}
deps_fedora = {"zlib-ng"}
"#,
    );

    let output = build_package(&recipe, &env.context()).await.unwrap();
    let control = deb_control(&output.paths[0]);
    assert!(control.contains("Depends: zlib1g\n"), "{}", control);
  }
}

mod validation {
  use super::*;

  #[tokio::test]
  async fn checksum_count_mismatch_fails_before_fetch() {
    let env = TestEnv::new();
    let recipe = env.write_recipe(
      r#"
name = "broken"
version = "1"
release = 1
sources = {"http://127.0.0.1:9/a.tar.gz", "http://127.0.0.1:9/b.tar.gz"}
checksums = {"SKIP"}
"#,
    );

    let err = build_package(&recipe, &env.context()).await.unwrap_err();
    assert!(matches!(
      err,
      BuildError::ChecksumCountMismatch {
        sources: 2,
        checksums: 1
      }
    ));
    assert!(!env.pkgs_dir().join("broken").exists());
  }

  #[tokio::test]
  async fn missing_required_field() {
    let env = TestEnv::new();
    let recipe = env.write_recipe("name = 'noversion'\nrelease = 1\n");

    let err = build_package(&recipe, &env.context()).await.unwrap_err();
    assert!(matches!(err, BuildError::Recipe(RecipeError::MissingField("version"))));
  }

  #[tokio::test]
  async fn checksum_mismatch_aborts() {
    let env = TestEnv::new();
    let data = env.write_file("data.txt", "data");
    let recipe = env.write_recipe(&format!(
      r#"
name = "sums"
version = "1"
release = 1
sources = {{"file://{}"}}
checksums = {{"{}"}}
"#,
      data.display(),
      "0".repeat(64)
    ));

    let err = build_package(&recipe, &env.context()).await.unwrap_err();
    assert!(matches!(
      err,
      BuildError::Fetch(srcpkg_lib::fetch::FetchError::ChecksumMismatch { .. })
    ));
    assert!(debs(env.pkgs_dir().join("sums")).is_empty());
  }
}

mod session {
  use super::*;

  #[tokio::test]
  async fn rebuild_yields_same_manifest() {
    let env = TestEnv::new();
    let hello = env.write_file("hello.txt", "hello\n");
    env.add_recipe("libb", LIBB);
    let recipe = env.write_recipe(&app_recipe(&hello.display().to_string()));
    let pkg_root = env.pkgs_dir().join("appa/pkg");
    let backup = vec!["/etc/appa.conf".to_string()];

    build_package(&recipe, &env.context()).await.unwrap();
    let first = without_mtime(classify(&pkg_root, &backup).unwrap());

    build_package(&recipe, &env.context()).await.unwrap();
    let second = without_mtime(classify(&pkg_root, &backup).unwrap());

    assert_eq!(first, second);
    assert!(first.iter().any(|e| e.destination == "/etc/appa.conf" && e.is_config()));
  }

  #[tokio::test]
  async fn cancelled_build_stops() {
    let env = TestEnv::new();
    let recipe = env.write_recipe(LIBB);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = build_package(&recipe, &env.context_with_cancel(cancel))
      .await
      .unwrap_err();
    assert!(matches!(err, BuildError::Cancelled));
    assert!(!env.pkgs_dir().join("libb").exists());
  }

  #[tokio::test]
  async fn hooks_see_session_dirs() {
    let env = TestEnv::new();
    let recipe = env.write_recipe(
      r#"
name = "dirs"
version = "1"
release = 1

function package(dir)
  assert(dir == srcdir, "hook argument is the source dir")
  exec("mkdir -p \"$pkgdir/opt\" && echo \"$srcdir\" > \"$pkgdir/opt/srcdir\"")
end
"#,
    );

    build_package(&recipe, &env.context()).await.unwrap();
    let recorded = std::fs::read_to_string(env.pkgs_dir().join("dirs/pkg/opt/srcdir")).unwrap();
    assert_eq!(recorded.trim(), env.pkgs_dir().join("dirs/src").display().to_string());
  }
}
