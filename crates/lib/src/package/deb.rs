//! Debian packages.
//!
//! A `.deb` is an ar archive holding, in order:
//! - `debian-binary`: the format version `2.0\n`
//! - `control.tar.gz`: `control`, `md5sums` and `conffiles`
//! - `data.tar.gz`: the package payload

use std::io::{self, Write};

use flate2::Compression;
use flate2::write::GzEncoder;
use md5::{Digest, Md5};
use tracing::debug;

use super::{PackageError, PackageInfo, Packager, arch_for_format, archive_path, parent_dirs, read_source, tar_header};
use crate::contents::{EntryKind, ManifestEntry};
use crate::manager::PackageFormat;

const DEFAULT_MAINTAINER: &str = "Unknown <unknown@unknown.org>";

type TarGz = tar::Builder<GzEncoder<Vec<u8>>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct DebPackager;

impl Packager for DebPackager {
  fn format(&self) -> PackageFormat {
    PackageFormat::Deb
  }

  fn conventional_file_name(&self, info: &PackageInfo) -> String {
    format!(
      "{}_{}-{}_{}.deb",
      info.name,
      info.version,
      info.release,
      arch_for_format(&info.arch, PackageFormat::Deb)
    )
  }

  fn package(&self, info: &PackageInfo, contents: &[ManifestEntry], writer: &mut dyn Write) -> Result<(), PackageError> {
    let mtime = contents.iter().map(|e| e.mtime).max().unwrap_or(0);

    let (data, md5sums) = data_tarball(contents)?;
    let installed_size = contents.iter().map(|e| e.size).sum::<u64>().div_ceil(1024);
    let control = control_tarball(info, contents, &md5sums, installed_size, mtime).map_err(PackageError::Write)?;

    let mut archive = ar::Builder::new(writer);
    append_member(&mut archive, "debian-binary", b"2.0\n", mtime)?;
    append_member(&mut archive, "control.tar.gz", &control, mtime)?;
    append_member(&mut archive, "data.tar.gz", &data, mtime)?;

    debug!(name = %info.name, entries = contents.len(), "wrote deb package");
    Ok(())
  }
}

fn append_member<W: Write>(archive: &mut ar::Builder<W>, name: &str, data: &[u8], mtime: u64) -> Result<(), PackageError> {
  let mut header = ar::Header::new(name.as_bytes().to_vec(), data.len() as u64);
  header.set_mode(0o100644);
  header.set_mtime(mtime);
  archive.append(&header, data).map_err(PackageError::Write)
}

fn finish(tar: TarGz) -> io::Result<Vec<u8>> {
  tar.into_inner()?.finish()
}

/// Payload tarball plus the `md5sums` lines of its regular files.
fn data_tarball(contents: &[ManifestEntry]) -> Result<(Vec<u8>, Vec<String>), PackageError> {
  let mut tar = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
  let mut md5sums = Vec::new();

  // dpkg expects every parent directory to be present in the archive.
  for dir in &parent_dirs(contents) {
    let mut header = tar_header(tar::EntryType::Directory, 0o755, 0, 0);
    tar.append_data(&mut header, dir, io::empty()).map_err(PackageError::Write)?;
  }

  for entry in contents {
    let path = archive_path(&entry.destination);
    match entry.kind {
      EntryKind::Dir => {
        let mut header = tar_header(tar::EntryType::Directory, entry.mode, entry.mtime, 0);
        tar.append_data(&mut header, path, io::empty()).map_err(PackageError::Write)?;
      }
      EntryKind::Symlink => {
        let mut header = tar_header(tar::EntryType::Symlink, 0o777, entry.mtime, 0);
        tar
          .append_link(&mut header, path, &entry.source)
          .map_err(PackageError::Write)?;
      }
      EntryKind::File | EntryKind::Config => {
        let data = read_source(entry)?;
        md5sums.push(format!("{}  {}", hex::encode(Md5::digest(&data)), path));
        let mut header = tar_header(tar::EntryType::Regular, entry.mode, entry.mtime, data.len() as u64);
        tar.append_data(&mut header, path, &data[..]).map_err(PackageError::Write)?;
      }
    }
  }

  Ok((finish(tar).map_err(PackageError::Write)?, md5sums))
}

fn control_tarball(
  info: &PackageInfo,
  contents: &[ManifestEntry],
  md5sums: &[String],
  installed_size: u64,
  mtime: u64,
) -> io::Result<Vec<u8>> {
  let mut tar = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

  let mut add = |name: &str, body: String| -> io::Result<()> {
    let mut header = tar_header(tar::EntryType::Regular, 0o644, mtime, body.len() as u64);
    tar.append_data(&mut header, name, body.as_bytes())
  };

  add("control", control_file(info, installed_size))?;
  if !md5sums.is_empty() {
    add("md5sums", md5sums.join("\n") + "\n")?;
  }

  let conffiles: Vec<&str> = contents
    .iter()
    .filter(|e| e.is_config())
    .map(|e| e.destination.as_str())
    .collect();
  if !conffiles.is_empty() {
    add("conffiles", conffiles.join("\n") + "\n")?;
  }

  finish(tar)
}

fn version_string(info: &PackageInfo) -> String {
  if info.epoch > 0 {
    format!("{}:{}-{}", info.epoch, info.version, info.release)
  } else {
    format!("{}-{}", info.version, info.release)
  }
}

fn control_file(info: &PackageInfo, installed_size: u64) -> String {
  let mut control = format!(
    "Package: {}\n\
     Version: {}\n\
     Architecture: {}\n\
     Maintainer: {}\n\
     Installed-Size: {}\n",
    info.name,
    version_string(info),
    arch_for_format(&info.arch, PackageFormat::Deb),
    DEFAULT_MAINTAINER,
    installed_size
  );

  for (field, values) in [
    ("Depends", &info.depends),
    ("Provides", &info.provides),
    ("Conflicts", &info.conflicts),
    ("Replaces", &info.replaces),
  ] {
    if !values.is_empty() {
      control.push_str(&format!("{}: {}\n", field, values.join(", ")));
    }
  }

  if !info.homepage.is_empty() {
    control.push_str(&format!("Homepage: {}\n", info.homepage));
  }

  let description = if info.description.trim().is_empty() {
    info.name.as_str()
  } else {
    info.description.trim()
  };
  let mut lines = description.lines();
  control.push_str(&format!("Description: {}\n", lines.next().unwrap_or_default()));
  for line in lines {
    if line.trim().is_empty() {
      control.push_str(" .\n");
    } else {
      control.push_str(&format!(" {}\n", line));
    }
  }

  control
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::package::testutil;
  use flate2::read::GzDecoder;
  use std::collections::HashMap;
  use std::io::Read;
  use tempfile::TempDir;

  fn members(deb: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = ar::Archive::new(deb);
    let mut out = Vec::new();
    while let Some(entry) = archive.next_entry() {
      let mut entry = entry.unwrap();
      let name = String::from_utf8(entry.header().identifier().to_vec()).unwrap();
      let mut data = Vec::new();
      entry.read_to_end(&mut data).unwrap();
      out.push((name, data));
    }
    out
  }

  fn tar_files(data: &[u8]) -> HashMap<String, (tar::EntryType, String)> {
    let mut archive = tar::Archive::new(GzDecoder::new(data));
    archive
      .entries()
      .unwrap()
      .map(|entry| {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().to_string_lossy().trim_end_matches('/').to_string();
        let kind = entry.header().entry_type();
        let body = if kind == tar::EntryType::Symlink {
          entry.link_name().unwrap().unwrap().to_string_lossy().to_string()
        } else {
          let mut s = String::new();
          entry.read_to_string(&mut s).unwrap();
          s
        };
        (path, (kind, body))
      })
      .collect()
  }

  #[test]
  fn layout_and_metadata() {
    let temp = TempDir::new().unwrap();
    let contents = testutil::contents(temp.path());
    let mut out = Vec::new();
    DebPackager.package(&testutil::info(), &contents, &mut out).unwrap();

    let members = members(&out);
    let names: Vec<&str> = members.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["debian-binary", "control.tar.gz", "data.tar.gz"]);
    assert_eq!(members[0].1, b"2.0\n");

    let control = tar_files(&members[1].1);
    let (_, control_text) = &control["control"];
    assert!(control_text.contains("Package: hello\n"));
    assert!(control_text.contains("Version: 1.2.0-3\n"));
    assert!(control_text.contains("Architecture: amd64\n"));
    assert!(control_text.contains("Depends: libc6, zlib\n"));
    assert!(control_text.contains("Homepage: https://example.com/hello\n"));
    assert_eq!(control["conffiles"].1, "/etc/hello.conf\n");
    assert!(control["md5sums"].1.contains("  usr/bin/hello\n"));

    let data = tar_files(&members[2].1);
    assert_eq!(data["usr/bin/hello"], (tar::EntryType::Regular, "#!/bin/sh\necho hello\n".to_string()));
    assert_eq!(data["usr/bin/hi"], (tar::EntryType::Symlink, "hello".to_string()));
    assert_eq!(data["var/lib/hello"].0, tar::EntryType::Directory);
    assert_eq!(data["usr"].0, tar::EntryType::Directory);
  }

  #[test]
  fn epoch_and_multiline_description() {
    let mut info = testutil::info();
    info.epoch = 2;
    info.description = "Says hello\n\nLonger text".to_string();
    let control = control_file(&info, 0);
    assert!(control.contains("Version: 2:1.2.0-3\n"));
    assert!(control.ends_with("Description: Says hello\n .\n Longer text\n"));
  }

  #[test]
  fn empty_package() {
    let mut out = Vec::new();
    DebPackager.package(&testutil::info(), &[], &mut out).unwrap();
    let members = members(&out);
    let control = tar_files(&members[1].1);
    assert!(!control.contains_key("conffiles"));
    assert!(!control.contains_key("md5sums"));
  }

  #[test]
  fn md5_of_known_content() {
    assert_eq!(hex::encode(Md5::digest(b"hello world\n")), "6f5902ac237024bdd0c176cb93063dc4");
  }
}
