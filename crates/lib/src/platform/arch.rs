use std::fmt;
use std::path::Path;

use crate::consts::ARM_VARIANT_ENV;

/// CPU architecture families, named the way recipes and override keys spell them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  Amd64,
  Arm64,
  Arm,
  I386,
  Riscv64,
  Ppc64le,
  Ppc64,
  S390x,
  Loong64,
  Mips64le,
  Mips64,
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    Self::from_rust_arch(std::env::consts::ARCH)
  }

  /// Map a Rust target architecture name onto an architecture family.
  pub fn from_rust_arch(arch: &str) -> Option<Self> {
    match arch {
      "x86_64" => Some(Self::Amd64),
      "aarch64" => Some(Self::Arm64),
      "arm" => Some(Self::Arm),
      "x86" => Some(Self::I386),
      "riscv64" => Some(Self::Riscv64),
      "powerpc64" if cfg!(target_endian = "little") => Some(Self::Ppc64le),
      "powerpc64" => Some(Self::Ppc64),
      "s390x" => Some(Self::S390x),
      "loongarch64" => Some(Self::Loong64),
      "mips64" if cfg!(target_endian = "little") => Some(Self::Mips64le),
      "mips64" => Some(Self::Mips64),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Amd64 => "amd64",
      Self::Arm64 => "arm64",
      Self::Arm => "arm",
      Self::I386 => "386",
      Self::Riscv64 => "riscv64",
      Self::Ppc64le => "ppc64le",
      Self::Ppc64 => "ppc64",
      Self::S390x => "s390x",
      Self::Loong64 => "loong64",
      Self::Mips64le => "mips64le",
      Self::Mips64 => "mips64",
    }
  }

  /// Whether this family has sub-variants that are more specific than the family name.
  pub fn has_variants(&self) -> bool {
    matches!(self, Self::Arm)
  }

  /// The most specific name for the running machine.
  ///
  /// For ARM this is the detected variant (`arm5`, `arm6`, `arm7`), otherwise the family name.
  pub fn specific(&self) -> String {
    match self {
      Self::Arm => arm_variant(),
      other => other.as_str().to_string(),
    }
  }

  /// Architecture chain used for override resolution, most specific first.
  pub fn chain(&self) -> Vec<String> {
    if self.has_variants() {
      vec![self.specific(), self.as_str().to_string()]
    } else {
      vec![self.as_str().to_string()]
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Returns the current CPU architecture
///
/// Returns `None` if the architecture is not supported
pub fn arch() -> Option<Arch> {
  Arch::current()
}

/// Detect which ARM variant the machine runs.
///
/// `SRCPKG_ARM_VARIANT` wins when it looks like an ARM name (`arm5`, `arm6`, ...).
pub fn arm_variant() -> String {
  if let Ok(value) = std::env::var(ARM_VARIANT_ENV)
    && value.starts_with("arm")
  {
    return value;
  }

  let features = std::fs::read_to_string(Path::new("/proc/cpuinfo"))
    .map(|content| cpu_features(&content))
    .unwrap_or_default();
  variant_from_features(&features).to_string()
}

/// Extract the `Features` flags from `/proc/cpuinfo` content.
fn cpu_features(cpuinfo: &str) -> Vec<String> {
  cpuinfo
    .lines()
    .filter_map(|line| line.split_once(':'))
    .filter(|(key, _)| key.trim() == "Features")
    .flat_map(|(_, value)| value.split_whitespace().map(str::to_string))
    .collect()
}

fn variant_from_features(features: &[String]) -> &'static str {
  let has = |flag: &str| features.iter().any(|f| f == flag);
  if has("vfpv3") {
    "arm7"
  } else if has("vfp") {
    "arm6"
  } else {
    "arm5"
  }
}
