//! Plain file sources: HTTP(S) downloads and local `file://` copies.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{Checksum, FetchError, Fetched, Scheme, SourceKind, SourceSpec};
use crate::util::hash::{hash_bytes, hash_file};

const ARCHIVE_SUFFIXES: &[&str] = &[".tar", ".tar.gz", ".tgz", ".tar.xz", ".tar.zst"];

pub(super) fn is_archive(name: &str) -> bool {
  ARCHIVE_SUFFIXES.iter().any(|s| name.ends_with(s))
}

pub(super) async fn fetch(spec: &SourceSpec, dest: &Path, checksum: &Checksum) -> Result<Fetched, FetchError> {
  let target = dest.join(&spec.name);

  if spec.scheme == Scheme::File {
    copy_local(spec, &target, checksum).await?;
  } else {
    download(spec, &target, checksum).await?;
  }

  if spec.archive && is_archive(&spec.name) {
    let archive = target.clone();
    let out = dest.to_path_buf();
    tokio::task::spawn_blocking(move || extract(&archive, &out))
      .await
      .map_err(|e| FetchError::Task(e.to_string()))??;
    tokio::fs::remove_file(&target)
      .await
      .map_err(|e| FetchError::io(&target, e))?;
    info!(name = %spec.name, "extracted archive");
    return Ok(Fetched {
      kind: SourceKind::Dir,
      name: spec.name.clone(),
      path: dest.to_path_buf(),
    });
  }

  Ok(Fetched {
    kind: SourceKind::File,
    name: spec.name.clone(),
    path: target,
  })
}

async fn download(spec: &SourceSpec, target: &Path, checksum: &Checksum) -> Result<(), FetchError> {
  let url = spec.url.as_str();
  let http_err = |source| FetchError::Http {
    url: url.to_string(),
    source,
  };

  let response = reqwest::get(spec.url.clone()).await.map_err(http_err)?;
  if !response.status().is_success() {
    return Err(FetchError::HttpStatus {
      url: url.to_string(),
      status: response.status().as_u16(),
    });
  }
  let bytes = response.bytes().await.map_err(http_err)?;

  checksum.verify(url, &hash_bytes(&bytes))?;

  let mut file = tokio::fs::File::create(target)
    .await
    .map_err(|e| FetchError::io(target, e))?;
  file.write_all(&bytes).await.map_err(|e| FetchError::io(target, e))?;
  file.flush().await.map_err(|e| FetchError::io(target, e))?;

  debug!(path = %target.display(), size = bytes.len(), "download complete");
  Ok(())
}

async fn copy_local(spec: &SourceSpec, target: &Path, checksum: &Checksum) -> Result<(), FetchError> {
  let source = spec
    .url
    .to_file_path()
    .map_err(|_| FetchError::InvalidSource(spec.raw.clone(), "not a local path".to_string()))?;

  tokio::fs::copy(&source, target)
    .await
    .map_err(|e| FetchError::io(&source, e))?;

  if !matches!(checksum, Checksum::Skip) {
    let path = target.to_path_buf();
    let actual = tokio::task::spawn_blocking(move || hash_file(&path))
      .await
      .map_err(|e| FetchError::Task(e.to_string()))??;
    checksum.verify(spec.url.as_str(), &actual)?;
  }
  Ok(())
}

/// Unpack a tarball, picking the decompressor from the file name.
fn extract(archive: &Path, dest: &Path) -> Result<(), FetchError> {
  let err = |source| FetchError::Extract {
    path: archive.to_path_buf(),
    source,
  };

  let file = File::open(archive).map_err(err)?;
  let name = archive.to_string_lossy();
  let reader: Box<dyn Read> = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
    Box::new(flate2::read::GzDecoder::new(file))
  } else if name.ends_with(".tar.xz") {
    Box::new(xz2::read::XzDecoder::new(file))
  } else if name.ends_with(".tar.zst") {
    Box::new(zstd::stream::read::Decoder::new(file).map_err(err)?)
  } else {
    Box::new(file)
  };

  tar::Archive::new(reader).unpack(dest).map_err(err)
}
