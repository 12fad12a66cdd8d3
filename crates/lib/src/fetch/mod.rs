//! Source retrieval.
//!
//! A source is a URL with optional fetch-control query parameters, all
//! prefixed with `~` and stripped before the request is made:
//!
//! - `~name=<n>` - destination name inside the source directory
//! - `~archive=false` - keep a downloaded archive as a file
//! - `~rev=<rev>` - git revision to check out
//! - `~depth=<n>` - shallow clone depth
//! - `~recursive=true` - also fetch git submodules
//!
//! Supported schemes are `http`, `https`, `file` and `git+<scheme>`.

mod file;
mod git;

use std::path::{Path, PathBuf};

use reqwest::Url;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::consts::SKIP_CHECKSUM;
use crate::util::hash::{HashError, Sha256Digest};

pub use git::GitError;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("invalid source '{0}': {1}")]
  InvalidSource(String, String),

  #[error("unsupported source scheme '{0}'")]
  UnsupportedScheme(String),

  #[error("invalid checksum '{0}': expected hex SHA-256 or SKIP")]
  InvalidChecksum(String),

  #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
  ChecksumMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  #[error("request to {url} failed: {source}")]
  Http {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("request to {url} failed: HTTP {status}")]
  HttpStatus { url: String, status: u16 },

  #[error("io error at '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to extract '{path}': {source}")]
  Extract {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error(transparent)]
  Git(#[from] GitError),

  #[error("fetch task failed: {0}")]
  Task(String),

  #[error("fetch cancelled")]
  Cancelled,
}

impl FetchError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    FetchError::Io {
      path: path.into(),
      source,
    }
  }
}

/// Expected digest of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checksum {
  /// Verification disabled.
  Skip,
  Sha256(Sha256Digest),
}

impl Checksum {
  /// Parse `SKIP` or a 64 character hex SHA-256 digest (either case).
  pub fn parse(value: &str) -> Result<Self, FetchError> {
    if value == SKIP_CHECKSUM {
      return Ok(Checksum::Skip);
    }
    let bytes = hex::decode(value).map_err(|_| FetchError::InvalidChecksum(value.to_string()))?;
    let digest: Sha256Digest = bytes
      .try_into()
      .map_err(|_| FetchError::InvalidChecksum(value.to_string()))?;
    Ok(Checksum::Sha256(digest))
  }

  /// Compare against `actual`; [`Checksum::Skip`] always passes.
  pub fn verify(&self, url: &str, actual: &Sha256Digest) -> Result<(), FetchError> {
    match self {
      Checksum::Skip => Ok(()),
      Checksum::Sha256(expected) if expected == actual => Ok(()),
      Checksum::Sha256(expected) => Err(FetchError::ChecksumMismatch {
        url: url.to_string(),
        expected: hex::encode(expected),
        actual: hex::encode(actual),
      }),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
  Http,
  File,
  Git,
}

/// What a fetch produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
  File,
  Dir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
  pub kind: SourceKind,
  /// Suggested name of the fetched content.
  pub name: String,
  pub path: PathBuf,
}

/// A parsed source specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
  pub raw: String,
  pub scheme: Scheme,
  /// Request URL, without `git+` and `~` parameters.
  pub url: Url,
  pub name: String,
  pub archive: bool,
  pub rev: Option<String>,
  pub depth: Option<u32>,
  pub recursive: bool,
}

impl SourceSpec {
  pub fn parse(raw: &str) -> Result<Self, FetchError> {
    let invalid = |msg: String| FetchError::InvalidSource(raw.to_string(), msg);

    let (is_git, rest) = match raw.strip_prefix("git+") {
      Some(rest) => (true, rest),
      None => (false, raw),
    };
    let mut url = Url::parse(rest).map_err(|e| invalid(e.to_string()))?;

    let scheme = match (is_git, url.scheme()) {
      (true, "http" | "https" | "ssh" | "file") => Scheme::Git,
      (false, "http" | "https") => Scheme::Http,
      (false, "file") => Scheme::File,
      (true, other) => return Err(FetchError::UnsupportedScheme(format!("git+{}", other))),
      (false, other) => return Err(FetchError::UnsupportedScheme(other.to_string())),
    };

    let mut name = None;
    let mut archive = true;
    let mut rev = None;
    let mut depth = None;
    let mut recursive = false;
    let mut kept = Vec::new();

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "~name" => name = Some(value.into_owned()),
        "~archive" => archive = value != "false",
        "~rev" => rev = Some(value.into_owned()),
        "~depth" => {
          depth = Some(
            value
              .parse::<u32>()
              .map_err(|_| invalid(format!("invalid depth '{}'", value)))?,
          )
        }
        "~recursive" => recursive = value == "true",
        _ => kept.push((key.into_owned(), value.into_owned())),
      }
    }

    if kept.is_empty() {
      url.set_query(None);
    } else {
      url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let name = match name {
      Some(name) => name,
      None => default_name(&url, scheme).ok_or_else(|| invalid("cannot derive a name".to_string()))?,
    };
    // The name becomes a single path component under the source directory.
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
      return Err(invalid(format!("invalid name '{}'", name)));
    }

    Ok(Self {
      raw: raw.to_string(),
      scheme,
      url,
      name,
      archive,
      rev,
      depth: depth.filter(|d| *d > 0),
      recursive,
    })
  }
}

fn default_name(url: &Url, scheme: Scheme) -> Option<String> {
  let last = url
    .path_segments()
    .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
    .map(str::to_string);
  let last = match scheme {
    Scheme::Git => last.map(|s| s.trim_end_matches(".git").to_string()),
    _ => last,
  };
  last.filter(|s| !s.is_empty()).or_else(|| url.host_str().map(str::to_string))
}

/// Retrieve `spec` into `dest`, verifying it against `checksum`.
pub async fn fetch(
  spec: &SourceSpec,
  dest: &Path,
  checksum: &Checksum,
  cancel: &CancellationToken,
) -> Result<Fetched, FetchError> {
  info!(source = %spec.raw, name = %spec.name, "fetching source");
  tokio::fs::create_dir_all(dest)
    .await
    .map_err(|e| FetchError::io(dest, e))?;

  let fetched = match spec.scheme {
    Scheme::Http | Scheme::File => tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(FetchError::Cancelled),
      result = file::fetch(spec, dest, checksum) => result?,
    },
    // Raises gix's interrupt flag itself on cancellation.
    Scheme::Git => git::fetch(spec, dest, checksum, cancel).await?,
  };

  debug!(path = %fetched.path.display(), kind = ?fetched.kind, "source fetched");
  Ok(fetched)
}

/// Bring an already fetched source at `path` up to date. Returns whether content changed.
///
/// Only git sources without a pinned revision can change.
pub async fn update(spec: &SourceSpec, path: &Path, cancel: &CancellationToken) -> Result<bool, FetchError> {
  match spec.scheme {
    Scheme::Git if spec.rev.is_none() => git::update(spec, path, cancel).await,
    _ => Ok(false),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  mod checksum {
    use super::*;

    const EMPTY_SHA: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn parses_skip_and_hex() {
      assert_eq!(Checksum::parse("SKIP").unwrap(), Checksum::Skip);
      assert!(matches!(Checksum::parse(EMPTY_SHA).unwrap(), Checksum::Sha256(_)));
      assert_eq!(
        Checksum::parse(&EMPTY_SHA.to_uppercase()).unwrap(),
        Checksum::parse(EMPTY_SHA).unwrap()
      );
    }

    #[test]
    fn rejects_non_hex_and_wrong_length() {
      assert!(Checksum::parse("skip").is_err());
      assert!(Checksum::parse("xyz").is_err());
      assert!(Checksum::parse("abcd").is_err());
    }

    #[test]
    fn verify() {
      let sum = Checksum::parse(EMPTY_SHA).unwrap();
      assert!(sum.verify("u", &crate::util::hash::hash_bytes(b"")).is_ok());
      assert!(matches!(
        sum.verify("u", &crate::util::hash::hash_bytes(b"x")),
        Err(FetchError::ChecksumMismatch { .. })
      ));
      assert!(Checksum::Skip.verify("u", &[0; 32]).is_ok());
    }
  }

  mod spec {
    use super::*;

    #[test]
    fn http_with_defaults() {
      let spec = SourceSpec::parse("https://example.com/dl/foo-1.0.tar.gz").unwrap();
      assert_eq!(spec.scheme, Scheme::Http);
      assert_eq!(spec.name, "foo-1.0.tar.gz");
      assert!(spec.archive);
      assert_eq!(spec.url.as_str(), "https://example.com/dl/foo-1.0.tar.gz");
    }

    #[test]
    fn tilde_params_are_stripped() {
      let spec = SourceSpec::parse("https://example.com/get?id=3&~name=foo.tar&~archive=false").unwrap();
      assert_eq!(spec.name, "foo.tar");
      assert!(!spec.archive);
      assert_eq!(spec.url.as_str(), "https://example.com/get?id=3");
    }

    #[test]
    fn git_params() {
      let spec =
        SourceSpec::parse("git+https://github.com/org/repo.git?~rev=v1.2&~depth=1&~recursive=true").unwrap();
      assert_eq!(spec.scheme, Scheme::Git);
      assert_eq!(spec.url.as_str(), "https://github.com/org/repo.git");
      assert_eq!(spec.name, "repo");
      assert_eq!(spec.rev.as_deref(), Some("v1.2"));
      assert_eq!(spec.depth, Some(1));
      assert!(spec.recursive);
    }

    #[test]
    fn zero_depth_means_full_clone() {
      let spec = SourceSpec::parse("git+https://example.com/repo?~depth=0").unwrap();
      assert_eq!(spec.depth, None);
    }

    #[test]
    fn bad_depth_rejected() {
      let result = SourceSpec::parse("git+https://example.com/repo?~depth=deep");
      assert!(matches!(result, Err(FetchError::InvalidSource(..))));
    }

    #[test]
    fn unsupported_schemes() {
      assert!(matches!(
        SourceSpec::parse("ftp://example.com/x"),
        Err(FetchError::UnsupportedScheme(s)) if s == "ftp"
      ));
      assert!(matches!(
        SourceSpec::parse("git+ftp://example.com/x"),
        Err(FetchError::UnsupportedScheme(_))
      ));
      assert!(matches!(SourceSpec::parse("not a url"), Err(FetchError::InvalidSource(..))));
    }

    #[test]
    fn name_must_stay_inside_source_dir() {
      for raw in [
        "https://example.com/x.tar.gz?~name=/etc/passwd",
        "https://example.com/x.tar.gz?~name=..",
        "https://example.com/x.tar.gz?~name=../escape",
        "https://example.com/x.tar.gz?~name=a/b",
        "https://example.com/x.tar.gz?~name=",
      ] {
        assert!(
          matches!(SourceSpec::parse(raw), Err(FetchError::InvalidSource(..))),
          "accepted {}",
          raw
        );
      }
      let spec = SourceSpec::parse("https://example.com/x.tar.gz?~name=..hidden").unwrap();
      assert_eq!(spec.name, "..hidden");
    }

    #[test]
    fn file_scheme() {
      let spec = SourceSpec::parse("file:///tmp/src/patch.diff").unwrap();
      assert_eq!(spec.scheme, Scheme::File);
      assert_eq!(spec.name, "patch.diff");
    }
  }
}
