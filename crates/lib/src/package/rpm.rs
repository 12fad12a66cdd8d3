//! RPM packages, built with the `rpm` crate's `PackageBuilder`.

use std::io::Write;

use rpm::PackageBuilder;
use tracing::debug;

use super::{PackageError, PackageInfo, Packager, arch_for_format};
use crate::contents::{EntryKind, ManifestEntry};
use crate::manager::PackageFormat;

#[derive(Debug, Clone, Copy, Default)]
pub struct RpmPackager;

fn rpm_err(e: rpm::Error) -> PackageError {
  PackageError::Rpm(e.to_string())
}

impl Packager for RpmPackager {
  fn format(&self) -> PackageFormat {
    PackageFormat::Rpm
  }

  fn conventional_file_name(&self, info: &PackageInfo) -> String {
    format!(
      "{}-{}-{}.{}.rpm",
      info.name,
      info.version,
      info.release,
      arch_for_format(&info.arch, PackageFormat::Rpm)
    )
  }

  fn package(&self, info: &PackageInfo, contents: &[ManifestEntry], writer: &mut dyn Write) -> Result<(), PackageError> {
    let arch = arch_for_format(&info.arch, PackageFormat::Rpm);
    let license = if info.license.is_empty() {
      "Unspecified"
    } else {
      info.license.as_str()
    };

    let mut builder = PackageBuilder::new(&info.name, &info.version, license, &arch, &info.description)
      .release(info.release.to_string())
      .compression(rpm::CompressionType::Gzip);

    if info.epoch > 0 {
      builder = builder.epoch(info.epoch);
    }
    if !info.homepage.is_empty() {
      builder = builder.url(&info.homepage);
    }

    for dep in &info.depends {
      builder = builder.requires(rpm::Dependency::any(dep));
    }
    for dep in &info.provides {
      builder = builder.provides(rpm::Dependency::any(dep));
    }
    for dep in &info.conflicts {
      builder = builder.conflicts(rpm::Dependency::any(dep));
    }
    for dep in &info.replaces {
      builder = builder.obsoletes(rpm::Dependency::any(dep));
    }

    // The builder only reads contents from disk. A symlink's payload is its
    // target, staged as a plain file so the link itself is never followed.
    let staging = tempfile::tempdir().map_err(PackageError::Write)?;

    for (i, entry) in contents.iter().enumerate() {
      match entry.kind {
        EntryKind::Dir => {
          debug!(path = %entry.destination, "rpm backend skips empty directory");
        }
        EntryKind::Symlink => {
          let target = entry.source.to_string_lossy().into_owned();
          let payload = staging.path().join(format!("link_{}", i));
          std::fs::write(&payload, target.as_bytes()).map_err(PackageError::Write)?;
          let options = rpm::FileOptions::new(&entry.destination)
            .symlink(target)
            .mode(rpm::FileMode::symbolic_link(0o777));
          builder = builder.with_file(&payload, options).map_err(rpm_err)?;
        }
        EntryKind::File | EntryKind::Config => {
          let options = rpm::FileOptions::new(&entry.destination).mode(rpm::FileMode::regular(entry.mode as u16));
          let options = if entry.is_config() {
            options.is_config_noreplace()
          } else {
            options
          };
          builder = builder.with_file(&entry.source, options).map_err(rpm_err)?;
        }
      }
    }

    let package = builder.build().map_err(rpm_err)?;
    let mut out = writer;
    package.write(&mut out).map_err(rpm_err)?;

    debug!(name = %info.name, entries = contents.len(), "wrote rpm package");
    Ok(())
  }
}
