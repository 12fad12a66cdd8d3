//! Arch Linux packages: a zstd compressed tarball with `.PKGINFO` first.

use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::{PackageError, PackageInfo, Packager, arch_for_format, archive_path, parent_dirs, read_source, tar_header};
use crate::contents::{EntryKind, ManifestEntry};
use crate::manager::PackageFormat;

const PACKAGER: &str = "Unknown Packager <unknown@unknown.org>";

#[derive(Debug, Clone, Copy, Default)]
pub struct ArchlinuxPackager;

impl Packager for ArchlinuxPackager {
  fn format(&self) -> PackageFormat {
    PackageFormat::Archlinux
  }

  fn conventional_file_name(&self, info: &PackageInfo) -> String {
    format!(
      "{}-{}-{}.pkg.tar.zst",
      info.name,
      pkgver(info),
      arch_for_format(&info.arch, PackageFormat::Archlinux)
    )
  }

  fn package(&self, info: &PackageInfo, contents: &[ManifestEntry], writer: &mut dyn Write) -> Result<(), PackageError> {
    let encoder = zstd::stream::write::Encoder::new(writer, 0).map_err(PackageError::Write)?;
    let mut tar = tar::Builder::new(encoder);

    let builddate = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_secs())
      .unwrap_or(0);
    let pkginfo = pkginfo(info, contents, builddate);
    let mut header = tar_header(tar::EntryType::Regular, 0o644, builddate, pkginfo.len() as u64);
    tar
      .append_data(&mut header, ".PKGINFO", pkginfo.as_bytes())
      .map_err(PackageError::Write)?;

    for dir in parent_dirs(contents) {
      let mut header = tar_header(tar::EntryType::Directory, 0o755, builddate, 0);
      tar.append_data(&mut header, &dir, io::empty()).map_err(PackageError::Write)?;
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
          let mut header = tar_header(tar::EntryType::Regular, entry.mode, entry.mtime, data.len() as u64);
          tar.append_data(&mut header, path, &data[..]).map_err(PackageError::Write)?;
        }
      }
    }

    tar
      .into_inner()
      .and_then(|encoder| encoder.finish())
      .map_err(PackageError::Write)?;

    debug!(name = %info.name, entries = contents.len(), "wrote archlinux package");
    Ok(())
  }
}

fn pkgver(info: &PackageInfo) -> String {
  let version = info.version.replace('-', "_");
  if info.epoch > 0 {
    format!("{}:{}-{}", info.epoch, version, info.release)
  } else {
    format!("{}-{}", version, info.release)
  }
}

fn pkginfo(info: &PackageInfo, contents: &[ManifestEntry], builddate: u64) -> String {
  let mut out = String::new();
  let mut line = |key: &str, value: &str| {
    out.push_str(key);
    out.push_str(" = ");
    out.push_str(value);
    out.push('\n');
  };

  line("pkgname", &info.name);
  line("pkgver", &pkgver(info));
  line("pkgdesc", info.description.lines().next().unwrap_or_default());
  if !info.homepage.is_empty() {
    line("url", &info.homepage);
  }
  line("builddate", &builddate.to_string());
  line("packager", PACKAGER);
  line("size", &contents.iter().map(|e| e.size).sum::<u64>().to_string());
  line("arch", &arch_for_format(&info.arch, PackageFormat::Archlinux));
  if !info.license.is_empty() {
    for license in info.license.split(", ") {
      line("license", license);
    }
  }
  for dep in &info.replaces {
    line("replaces", dep);
  }
  for dep in &info.conflicts {
    line("conflict", dep);
  }
  for dep in &info.provides {
    line("provides", dep);
  }
  for entry in contents.iter().filter(|e| e.is_config()) {
    line("backup", archive_path(&entry.destination));
  }
  for dep in &info.depends {
    line("depend", dep);
  }

  out
}
