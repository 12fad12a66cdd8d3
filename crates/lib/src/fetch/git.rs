//! Git sources.
//!
//! Cloning and fetching go through gix. Pinning a revision, fast-forwarding
//! and submodule recursion use the `git` binary.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gix::remote::Direction;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Checksum, FetchError, Fetched, SourceKind, SourceSpec};
use crate::exec::{ExecError, ExecOpts, run_program};
use crate::util::hash::hash_directory;

#[derive(Debug, Error)]
pub enum GitError {
  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("failed to open repository at '{path}': {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: Box<gix::open::Error>,
  },

  #[error("failed to fetch from '{url}': {source}")]
  Fetch {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("no remote configured for repository")]
  NoRemote,

  #[error("failed to resolve HEAD: {0}")]
  Head(String),

  #[error(transparent)]
  Command(#[from] ExecError),
}

/// Clone `spec` into `dest/<name>`, then pin, recurse and verify.
pub(super) async fn fetch(
  spec: &SourceSpec,
  dest: &Path,
  checksum: &Checksum,
  cancel: &CancellationToken,
) -> Result<Fetched, FetchError> {
  let repo_path = dest.join(&spec.name);
  info!(url = %spec.url, path = %repo_path.display(), "cloning repository");

  let url = spec.url.to_string();
  let depth = spec.depth;
  let path = repo_path.clone();
  run_blocking(cancel, move |interrupt| {
    clone_repo(&url, &path, depth, interrupt).map(|_| ())
  })
  .await?;

  let opts = git_opts(cancel);
  if let Some(rev) = &spec.rev {
    debug!(rev = %rev, "checking out revision");
    git(&repo_path, &["checkout", "--quiet", rev], &opts).await?;
  }
  if spec.recursive {
    git(&repo_path, &["submodule", "update", "--init", "--recursive"], &opts).await?;
  }

  if !matches!(checksum, Checksum::Skip) {
    let path = repo_path.clone();
    let actual = tokio::task::spawn_blocking(move || hash_directory(&path, &[".git"]))
      .await
      .map_err(|e| FetchError::Task(e.to_string()))??;
    checksum.verify(spec.url.as_str(), &actual)?;
  }

  Ok(Fetched {
    kind: SourceKind::Dir,
    name: spec.name.clone(),
    path: repo_path,
  })
}

/// Fetch the remote of the checkout at `path` and fast-forward. Returns whether HEAD moved.
pub(super) async fn update(spec: &SourceSpec, path: &Path, cancel: &CancellationToken) -> Result<bool, FetchError> {
  let url = spec.url.to_string();
  let repo_path = path.to_path_buf();
  let before = run_blocking(cancel, move |interrupt| {
    let repo = open_repo(&repo_path)?;
    let head = head_id(&repo)?;
    fetch_updates(&repo, &url, interrupt)?;
    Ok(head)
  })
  .await?;

  let opts = git_opts(cancel);
  git(path, &["merge", "--ff-only", "--quiet"], &opts).await?;
  if spec.recursive {
    git(path, &["submodule", "update", "--init", "--recursive"], &opts).await?;
  }

  let repo_path = path.to_path_buf();
  let after = run_blocking(cancel, move |_| head_id(&open_repo(&repo_path)?)).await?;

  debug!(path = %path.display(), before = %before, after = %after, "updated repository");
  Ok(before != after)
}

/// Run blocking gix work, raising its interrupt flag if `cancel` fires.
async fn run_blocking<T, F>(cancel: &CancellationToken, work: F) -> Result<T, FetchError>
where
  T: Send + 'static,
  F: FnOnce(&AtomicBool) -> Result<T, GitError> + Send + 'static,
{
  let interrupt = Arc::new(AtomicBool::new(false));
  let flag = interrupt.clone();
  let handle = tokio::task::spawn_blocking(move || work(&flag));

  let joined = tokio::select! {
    biased;
    _ = cancel.cancelled() => {
      interrupt.store(true, Ordering::Relaxed);
      return Err(FetchError::Cancelled);
    }
    joined = handle => joined,
  };
  Ok(joined.map_err(|e| FetchError::Task(e.to_string()))??)
}

fn git_opts(cancel: &CancellationToken) -> ExecOpts {
  ExecOpts {
    capture: true,
    cancel: cancel.clone(),
    ..Default::default()
  }
}

async fn git(repo: &Path, args: &[&str], opts: &ExecOpts) -> Result<(), GitError> {
  let repo = repo.to_string_lossy();
  let mut argv = vec!["-C", repo.as_ref()];
  argv.extend_from_slice(args);
  run_program("git", &argv, opts).await?;
  Ok(())
}

fn clone_repo(url: &str, dest: &Path, depth: Option<u32>, interrupt: &AtomicBool) -> Result<gix::Repository, GitError> {
  let clone_err = |e: Box<dyn std::error::Error + Send + Sync>| GitError::Clone {
    url: url.to_string(),
    source: e,
  };

  let mut prepared = gix::prepare_clone(url, dest).map_err(|e| clone_err(Box::new(e)))?;
  if let Some(depth) = depth.and_then(NonZeroU32::new) {
    prepared = prepared.with_shallow(gix::remote::fetch::Shallow::DepthAtRemote(depth));
  }

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, interrupt)
    .map_err(|e| clone_err(Box::new(e)))?;

  let (repo, _outcome) = checkout
    .main_worktree(gix::progress::Discard, interrupt)
    .map_err(|e| clone_err(Box::new(e)))?;

  Ok(repo)
}

/// Identity used for reflog entries when the host has none configured.
const FALLBACK_IDENTITY: [&str; 2] = ["committer.name=srcpkg", "committer.email=srcpkg@localhost"];

fn open_repo(path: &Path) -> Result<gix::Repository, GitError> {
  let open_err = |e| GitError::Open {
    path: path.to_path_buf(),
    source: Box::new(e),
  };

  let repo = gix::open(path).map_err(open_err)?;
  if repo.committer().is_some_and(|c| c.is_ok()) {
    return Ok(repo);
  }

  debug!(path = %path.display(), "no committer identity, using fallback for reflogs");
  gix::open_opts(path, gix::open::Options::default().config_overrides(FALLBACK_IDENTITY)).map_err(open_err)
}

fn head_id(repo: &gix::Repository) -> Result<gix::ObjectId, GitError> {
  repo
    .head_id()
    .map(|id| id.detach())
    .map_err(|e| GitError::Head(e.to_string()))
}

fn fetch_updates(repo: &gix::Repository, url: &str, interrupt: &AtomicBool) -> Result<(), GitError> {
  debug!(url, "fetching updates");
  let fetch_err = |e: Box<dyn std::error::Error + Send + Sync>| GitError::Fetch {
    url: url.to_string(),
    source: e,
  };

  let remote = repo
    .find_default_remote(Direction::Fetch)
    .ok_or(GitError::NoRemote)?
    .map_err(|e| fetch_err(Box::new(e)))?;

  remote
    .connect(Direction::Fetch)
    .map_err(|e| fetch_err(Box::new(e)))?
    .prepare_fetch(gix::progress::Discard, Default::default())
    .map_err(|e| fetch_err(Box::new(e)))?
    .receive(gix::progress::Discard, interrupt)
    .map_err(|e| fetch_err(Box::new(e)))?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fetch::{Checksum, fetch, update};
  use serial_test::serial;
  use tempfile::TempDir;

  fn sh(dir: &Path, script: &str) {
    let status = std::process::Command::new("/bin/sh")
      .arg("-c")
      .arg(script)
      .current_dir(dir)
      .status()
      .unwrap();
    assert!(status.success(), "script failed: {}", script);
  }

  const COMMIT: &str = "git -c user.name=test -c user.email=test@example.com commit -q";

  fn upstream(temp: &TempDir) -> PathBuf {
    let repo = temp.path().join("upstream");
    std::fs::create_dir(&repo).unwrap();
    sh(
      &repo,
      &format!("git init -q -b main && echo one > file.txt && git add . && {} -m one", COMMIT),
    );
    repo
  }

  #[tokio::test]
  async fn clone_and_verify_checkout() {
    let temp = TempDir::new().unwrap();
    let repo = upstream(&temp);
    let dest = temp.path().join("src");

    let spec = SourceSpec::parse(&format!("git+file://{}?~name=checkout", repo.display())).unwrap();
    let fetched = fetch(&spec, &dest, &Checksum::Skip, &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(fetched.kind, SourceKind::Dir);
    assert_eq!(fetched.path, dest.join("checkout"));
    assert_eq!(std::fs::read_to_string(dest.join("checkout/file.txt")).unwrap(), "one\n");

    let digest = hash_directory(&fetched.path, &[".git"]).unwrap();
    let again = temp.path().join("again");
    let fetched = fetch(&spec, &again, &Checksum::Sha256(digest), &CancellationToken::new())
      .await
      .unwrap();
    assert!(fetched.path.join("file.txt").exists());

    let wrong = temp.path().join("wrong");
    let result = fetch(&spec, &wrong, &Checksum::Sha256([1; 32]), &CancellationToken::new()).await;
    assert!(matches!(result, Err(FetchError::ChecksumMismatch { .. })));
  }

  #[tokio::test]
  async fn update_reports_new_commits() {
    let temp = TempDir::new().unwrap();
    let repo = upstream(&temp);
    let dest = temp.path().join("src");
    let spec = SourceSpec::parse(&format!("git+file://{}", repo.display())).unwrap();
    let cancel = CancellationToken::new();

    let fetched = fetch(&spec, &dest, &Checksum::Skip, &cancel).await.unwrap();
    assert!(!update(&spec, &fetched.path, &cancel).await.unwrap());

    sh(&repo, &format!("echo two > file.txt && {} -am two", COMMIT));
    assert!(update(&spec, &fetched.path, &cancel).await.unwrap());
    assert_eq!(std::fs::read_to_string(fetched.path.join("file.txt")).unwrap(), "two\n");
  }

  #[test]
  #[serial]
  fn update_without_committer_identity() {
    let temp = TempDir::new().unwrap();
    let repo = upstream(&temp);
    let home = temp.path().join("home");
    std::fs::create_dir(&home).unwrap();

    temp_env::with_vars(
      [
        ("HOME", Some(home.to_string_lossy().into_owned())),
        ("XDG_CONFIG_HOME", Some(home.to_string_lossy().into_owned())),
        ("GIT_CONFIG_NOSYSTEM", Some("1".to_string())),
        ("GIT_COMMITTER_NAME", None),
        ("GIT_COMMITTER_EMAIL", None),
        ("GIT_AUTHOR_NAME", None),
        ("GIT_AUTHOR_EMAIL", None),
        ("EMAIL", None),
      ],
      || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
          let spec = SourceSpec::parse(&format!("git+file://{}", repo.display())).unwrap();
          let cancel = CancellationToken::new();
          let fetched = fetch(&spec, &temp.path().join("src"), &Checksum::Skip, &cancel)
            .await
            .unwrap();

          sh(&repo, &format!("echo two > file.txt && {} -am two", COMMIT));
          assert!(update(&spec, &fetched.path, &cancel).await.unwrap());
          assert_eq!(std::fs::read_to_string(fetched.path.join("file.txt")).unwrap(), "two\n");
        });
      },
    );
  }

  #[tokio::test]
  async fn pinned_revision_is_checked_out() {
    let temp = TempDir::new().unwrap();
    let repo = upstream(&temp);
    sh(&repo, &format!("git tag v1 && echo two > file.txt && {} -am two", COMMIT));

    let spec = SourceSpec::parse(&format!("git+file://{}?~rev=v1", repo.display())).unwrap();
    let dest = temp.path().join("src");
    let fetched = fetch(&spec, &dest, &Checksum::Skip, &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(std::fs::read_to_string(fetched.path.join("file.txt")).unwrap(), "one\n");
    assert!(!update(&spec, &fetched.path, &CancellationToken::new()).await.unwrap());
  }
}
