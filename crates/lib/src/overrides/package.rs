//! Variant merging for package records.
//!
//! An overridable field holds either one value or a map from candidate key
//! to value. Merging walks a static table of fields; each entry copies a
//! plain value verbatim or picks the first candidate present in the map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A field that is either a single value or a set of candidate-keyed variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Overridable<T> {
  Plain(T),
  Variants(BTreeMap<String, T>),
}

impl<T> Default for Overridable<T> {
  fn default() -> Self {
    Overridable::Variants(BTreeMap::new())
  }
}

impl<T: Clone + Default> Overridable<T> {
  /// Pick the value for the first candidate present. Absence yields `T::default()`.
  pub fn resolve(&self, candidates: &[String]) -> T {
    match self {
      Overridable::Plain(value) => value.clone(),
      Overridable::Variants(map) => candidates.iter().find_map(|c| map.get(c)).cloned().unwrap_or_default(),
    }
  }
}

impl<T> Overridable<T> {
  /// Record a variant under `key`. A plain value is kept as the `""` variant.
  pub fn insert(&mut self, key: impl Into<String>, value: T) {
    let mut map = match std::mem::take(self) {
      Overridable::Plain(plain) => BTreeMap::from([(String::new(), plain)]),
      Overridable::Variants(map) => map,
    };
    map.insert(key.into(), value);
    *self = Overridable::Variants(map);
  }

  pub fn is_empty(&self) -> bool {
    matches!(self, Overridable::Variants(map) if map.is_empty())
  }
}

/// Package metadata as declared, with every variant kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
  pub name: String,
  pub version: String,
  pub release: i64,
  pub epoch: u32,
  pub description: Overridable<String>,
  pub homepage: Overridable<String>,
  pub architectures: Overridable<Vec<String>>,
  pub licenses: Overridable<Vec<String>>,
  pub provides: Overridable<Vec<String>>,
  pub conflicts: Overridable<Vec<String>>,
  pub replaces: Overridable<Vec<String>>,
  pub depends: Overridable<Vec<String>>,
  pub build_depends: Overridable<Vec<String>>,
}

/// Package metadata with every variant settled for one system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
  pub name: String,
  pub version: String,
  pub release: i64,
  pub epoch: u32,
  pub description: String,
  pub homepage: String,
  pub architectures: Vec<String>,
  pub licenses: Vec<String>,
  pub provides: Vec<String>,
  pub conflicts: Vec<String>,
  pub replaces: Vec<String>,
  pub depends: Vec<String>,
  pub build_depends: Vec<String>,
}

type Merge = fn(&PackageRecord, &[String], &mut ResolvedPackage);

static FIELDS: &[(&str, Merge)] = &[
  ("name", |r, _, out| out.name = r.name.clone()),
  ("version", |r, _, out| out.version = r.version.clone()),
  ("release", |r, _, out| out.release = r.release),
  ("epoch", |r, _, out| out.epoch = r.epoch),
  ("description", |r, c, out| out.description = r.description.resolve(c)),
  ("homepage", |r, c, out| out.homepage = r.homepage.resolve(c)),
  ("architectures", |r, c, out| out.architectures = r.architectures.resolve(c)),
  ("licenses", |r, c, out| out.licenses = r.licenses.resolve(c)),
  ("provides", |r, c, out| out.provides = r.provides.resolve(c)),
  ("conflicts", |r, c, out| out.conflicts = r.conflicts.resolve(c)),
  ("replaces", |r, c, out| out.replaces = r.replaces.resolve(c)),
  ("depends", |r, c, out| out.depends = r.depends.resolve(c)),
  ("build_depends", |r, c, out| out.build_depends = r.build_depends.resolve(c)),
];

/// Settle every field of `record` against `candidates`, most specific first.
///
/// Fields are resolved independently; a field with no matching candidate
/// is left empty.
pub fn resolve_package(record: &PackageRecord, candidates: &[String]) -> ResolvedPackage {
  let mut out = ResolvedPackage::default();
  for (_, merge) in FIELDS {
    merge(record, candidates, &mut out);
  }
  out
}

/// Names of the fields the merger knows about, in merge order.
pub fn field_names() -> impl Iterator<Item = &'static str> {
  FIELDS.iter().map(|(name, _)| *name)
}
