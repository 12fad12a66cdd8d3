//! Override candidate resolution.
//!
//! A field may be declared several times under increasingly specific keys
//! (`deps`, `deps_arm64`, `deps_fedora`, `deps_arm64_fedora`, `desc_ru`, ...).
//! [`resolve`] produces the ordered list of keys to try for the running
//! system, most specific first; the first key present wins.
//!
//! Ordering, for every architecture (most specific first):
//! - for every distro: `name_arch_distro`, then `name_distro`
//! - then `name_arch`
//!
//! followed by the bare `name`. When languages are given, every candidate
//! gets a `_lang` suffixed copy per language, and all of those precede the
//! unsuffixed list.

pub mod package;

use thiserror::Error;

use crate::platform::Platform;
use crate::platform::lang::{InvalidLanguageTag, LanguageTag, base_languages};

pub use package::{Overridable, PackageRecord, ResolvedPackage, resolve_package};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OverrideError {
  #[error(transparent)]
  InvalidLanguageTag(#[from] InvalidLanguageTag),
}

/// Options controlling candidate generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOpts {
  /// Name prefix; empty means keys without a name component.
  pub name: String,
  /// When false, resolution yields only the name itself.
  pub overrides: bool,
  /// Include the distro's declared ancestors after its own id.
  pub like_distros: bool,
  pub languages: Vec<String>,
  pub language_tags: Vec<LanguageTag>,
}

impl Default for ResolveOpts {
  fn default() -> Self {
    Self {
      name: String::new(),
      overrides: true,
      like_distros: true,
      languages: vec!["en".to_string()],
      language_tags: Vec::new(),
    }
  }
}

impl ResolveOpts {
  pub fn with_name(&self, name: &str) -> Self {
    Self {
      name: name.to_string(),
      ..self.clone()
    }
  }

  pub fn with_overrides(&self, overrides: bool) -> Self {
    Self {
      overrides,
      ..self.clone()
    }
  }

  pub fn with_like_distros(&self, like_distros: bool) -> Self {
    Self {
      like_distros,
      ..self.clone()
    }
  }

  pub fn with_languages(&self, languages: Vec<String>) -> Self {
    Self {
      languages,
      ..self.clone()
    }
  }

  pub fn with_language_tags(&self, language_tags: Vec<LanguageTag>) -> Self {
    Self {
      language_tags,
      ..self.clone()
    }
  }
}

/// Generate the override candidates for `platform`, most specific first.
pub fn resolve(platform: &Platform, opts: &ResolveOpts) -> Result<Vec<String>, OverrideError> {
  if !opts.overrides {
    return Ok(vec![opts.name.clone()]);
  }

  let langs = base_languages(&opts.languages, &opts.language_tags)?;
  let distros = platform.distro.distro_chain(opts.like_distros);

  let join = |parts: &[&str]| -> String {
    let mut all: Vec<&str> = Vec::with_capacity(parts.len() + 1);
    if !opts.name.is_empty() {
      all.push(&opts.name);
    }
    all.extend_from_slice(parts);
    all.join("_")
  };

  let mut out = Vec::new();
  for arch in &platform.architectures {
    for distro in &distros {
      out.push(join(&[arch, distro]));
      out.push(join(&[distro]));
    }
    out.push(join(&[arch]));
  }
  out.push(opts.name.clone());

  for item in out.iter_mut() {
    *item = item.replace('-', "_");
  }

  if langs.is_empty() {
    return Ok(out);
  }

  let mut expanded = Vec::with_capacity(out.len() * (langs.len() + 1));
  for lang in &langs {
    for candidate in out.iter().filter(|c| !c.is_empty()) {
      expanded.push(format!("{}_{}", candidate, lang));
    }
  }
  expanded.extend(out);

  Ok(expanded)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::arch::Arch;
  use crate::platform::distro::OsRelease;

  fn platform(arches: &[&str], id: &str, like: &[&str]) -> Platform {
    Platform::with_architectures(
      Arch::Amd64,
      OsRelease {
        id: id.to_string(),
        like: like.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
      },
      arches.iter().map(|s| s.to_string()).collect(),
    )
  }

  fn no_langs() -> ResolveOpts {
    ResolveOpts::default().with_languages(Vec::new())
  }

  #[test]
  fn nameless_single_arch_single_distro() {
    let out = resolve(&platform(&["a"], "d", &[]), &no_langs()).unwrap();
    assert_eq!(out, vec!["a_d", "d", "a", ""]);
  }

  #[test]
  fn named_candidates_are_arch_major_distro_minor() {
    let opts = no_langs().with_name("foo");
    let out = resolve(&platform(&["x", "generic"], "d1", &["d2"]), &opts).unwrap();
    assert_eq!(
      out,
      vec![
        "foo_x_d1",
        "foo_d1",
        "foo_x_d2",
        "foo_d2",
        "foo_x",
        "foo_generic_d1",
        "foo_d1",
        "foo_generic_d2",
        "foo_d2",
        "foo_generic",
        "foo",
      ]
    );
  }

  #[test]
  fn like_distros_can_be_excluded() {
    let opts = no_langs().with_name("deps").with_like_distros(false);
    let out = resolve(&platform(&["amd64"], "linuxmint", &["ubuntu"]), &opts).unwrap();
    assert_eq!(out, vec!["deps_amd64_linuxmint", "deps_linuxmint", "deps_amd64", "deps"]);
  }

  #[test]
  fn disabled_overrides_yield_only_name() {
    let opts = ResolveOpts::default().with_name("deps").with_overrides(false);
    let out = resolve(&platform(&["amd64"], "fedora", &[]), &opts).unwrap();
    assert_eq!(out, vec!["deps"]);
  }

  #[test]
  fn dashes_become_underscores() {
    let opts = no_langs().with_name("my-pkg");
    let out = resolve(&platform(&["amd64"], "open-suse", &[]), &opts).unwrap();
    assert!(out.iter().all(|c| !c.contains('-')));
    assert_eq!(out[0], "my_pkg_amd64_open_suse");
    assert_eq!(out.last().unwrap(), "my_pkg");
  }

  #[test]
  fn languages_layer_on_top() {
    let base = resolve(&platform(&["a"], "d", &[]), &no_langs()).unwrap();
    let opts = ResolveOpts::default().with_languages(vec!["ru".to_string(), "en".to_string()]);
    let out = resolve(&platform(&["a"], "d", &[]), &opts).unwrap();

    let non_empty: Vec<&String> = base.iter().filter(|c| !c.is_empty()).collect();
    let mut expected: Vec<String> = Vec::new();
    for lang in ["en", "ru"] {
      for c in &non_empty {
        expected.push(format!("{}_{}", c, lang));
      }
    }
    expected.extend(base.iter().cloned());

    assert_eq!(out, expected);
    assert_eq!(&out[..3], &["a_d_en", "d_en", "a_en"]);
    assert_eq!(out.last().unwrap(), "");
  }

  #[test]
  fn language_tags_merge_with_strings() {
    let opts = no_langs()
      .with_name("desc")
      .with_languages(vec!["de_DE".to_string()])
      .with_language_tags(vec![LanguageTag::parse("de").unwrap()]);
    let out = resolve(&platform(&["amd64"], "arch", &[]), &opts).unwrap();
    assert_eq!(out.iter().filter(|c| c.ends_with("_de")).count(), 4);
    assert_eq!(out[0], "desc_amd64_arch_de");
  }

  #[test]
  fn invalid_language_fails() {
    let opts = ResolveOpts::default().with_languages(vec!["not a tag".to_string()]);
    let result = resolve(&platform(&["amd64"], "arch", &[]), &opts);
    assert!(matches!(result, Err(OverrideError::InvalidLanguageTag(_))));
  }

  #[test]
  fn output_is_deterministic() {
    let opts = ResolveOpts::default().with_name("deps");
    let p = platform(&["arm7", "arm"], "raspbian", &["debian"]);
    assert_eq!(resolve(&p, &opts).unwrap(), resolve(&p, &opts).unwrap());
  }
}
