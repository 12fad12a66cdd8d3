//! System package managers.
//!
//! A manager installs build dependencies on the host and names the package
//! format the packaging backend should produce.

use std::fmt;

use tracing::{debug, info};

use crate::exec::{ExecError, ExecOpts, run_program};

/// Package formats a manager consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageFormat {
  Deb,
  Rpm,
  Archlinux,
  Apk,
}

impl PackageFormat {
  pub fn as_str(&self) -> &'static str {
    match self {
      PackageFormat::Deb => "deb",
      PackageFormat::Rpm => "rpm",
      PackageFormat::Archlinux => "archlinux",
      PackageFormat::Apk => "apk",
    }
  }
}

impl fmt::Display for PackageFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

pub trait PackageManager: Send + Sync {
  fn name(&self) -> &str;

  fn format(&self) -> PackageFormat;

  /// Command line installing `pkgs`, without privilege elevation.
  fn install_command(&self, pkgs: &[String]) -> Vec<String>;

  /// Whether this manager can run on the host.
  fn is_available(&self) -> bool;
}

/// A manager driven through its command line binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemManager {
  pub binary: &'static str,
  pub install_args: &'static [&'static str],
  pub format: PackageFormat,
}

impl PackageManager for SystemManager {
  fn name(&self) -> &str {
    self.binary
  }

  fn format(&self) -> PackageFormat {
    self.format
  }

  fn install_command(&self, pkgs: &[String]) -> Vec<String> {
    std::iter::once(self.binary)
      .chain(self.install_args.iter().copied())
      .map(str::to_string)
      .chain(pkgs.iter().cloned())
      .collect()
  }

  fn is_available(&self) -> bool {
    which::which(self.binary).is_ok()
  }
}

/// Built-in managers, in detection order.
pub static BUILTIN: &[SystemManager] = &[
  SystemManager {
    binary: "apt",
    install_args: &["install", "-y"],
    format: PackageFormat::Deb,
  },
  SystemManager {
    binary: "dnf",
    install_args: &["install", "-y"],
    format: PackageFormat::Rpm,
  },
  SystemManager {
    binary: "yum",
    install_args: &["install", "-y"],
    format: PackageFormat::Rpm,
  },
  SystemManager {
    binary: "zypper",
    install_args: &["--non-interactive", "install"],
    format: PackageFormat::Rpm,
  },
  SystemManager {
    binary: "pacman",
    install_args: &["-S", "--needed", "--noconfirm"],
    format: PackageFormat::Archlinux,
  },
  SystemManager {
    binary: "apk",
    install_args: &["add"],
    format: PackageFormat::Apk,
  },
];

/// The first built-in manager present on the host.
pub fn detect() -> Option<Box<dyn PackageManager>> {
  let found = BUILTIN.iter().find(|m| m.is_available())?;
  debug!(manager = found.binary, "detected package manager");
  Some(Box::new(*found))
}

/// Look up a built-in manager by name.
pub fn get(name: &str) -> Option<Box<dyn PackageManager>> {
  BUILTIN
    .iter()
    .find(|m| m.binary == name)
    .map(|m| Box::new(*m) as Box<dyn PackageManager>)
}

/// Full install command line, prefixed with `root_cmd` unless it is empty.
pub fn install_argv(manager: &dyn PackageManager, pkgs: &[String], root_cmd: &str) -> Vec<String> {
  let mut argv: Vec<String> = root_cmd.split_whitespace().map(str::to_string).collect();
  argv.extend(manager.install_command(pkgs));
  argv
}

/// Install `pkgs` through `manager`.
pub async fn install(
  manager: &dyn PackageManager,
  pkgs: &[String],
  root_cmd: &str,
  opts: &ExecOpts,
) -> Result<(), ExecError> {
  if pkgs.is_empty() {
    return Ok(());
  }
  info!(manager = manager.name(), packages = ?pkgs, "installing packages");
  let argv = install_argv(manager, pkgs, root_cmd);
  let (program, args) = argv.split_first().ok_or_else(|| ExecError::CmdFailed {
    cmd: String::new(),
    code: None,
  })?;
  run_program(program, args, opts).await?;
  Ok(())
}
