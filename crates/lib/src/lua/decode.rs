//! Decoding recipe globals into [`BuildVars`].
//!
//! Each field is looked up under the override candidates computed with the
//! field key as name (`deps_amd64_fedora`, `deps_fedora`, ..., `deps`); the
//! first candidate set in the recipe wins.

use mlua::prelude::*;

use super::RecipeError;
use super::runtime::RecipeRuntime;
use crate::build::BuildVars;
use crate::fetch::Checksum;
use crate::overrides::{PackageRecord, ResolveOpts, resolve};
use crate::platform::Platform;

type Setter = fn(&mut BuildVars, &str, &LuaValue) -> Result<(), RecipeError>;

struct Field {
  key: &'static str,
  required: bool,
  set: Setter,
}

static FIELDS: &[Field] = &[
  Field {
    key: "name",
    required: true,
    set: |v, k, val| {
      v.name = as_string(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "version",
    required: true,
    set: |v, k, val| {
      v.version = as_string(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "release",
    required: true,
    set: |v, k, val| {
      v.release = as_integer(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "epoch",
    required: false,
    set: |v, k, val| {
      v.epoch = u32::try_from(as_integer(k, val)?).map_err(|_| invalid(k, "a non-negative integer", val))?;
      Ok(())
    },
  },
  Field {
    key: "desc",
    required: false,
    set: |v, k, val| {
      v.description = as_string(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "homepage",
    required: false,
    set: |v, k, val| {
      v.homepage = as_string(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "architectures",
    required: false,
    set: |v, k, val| {
      v.architectures = as_list(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "license",
    required: false,
    set: |v, k, val| {
      v.licenses = as_list(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "provides",
    required: false,
    set: |v, k, val| {
      v.provides = as_list(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "conflicts",
    required: false,
    set: |v, k, val| {
      v.conflicts = as_list(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "deps",
    required: false,
    set: |v, k, val| {
      v.depends = as_list(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "build_deps",
    required: false,
    set: |v, k, val| {
      v.build_depends = as_list(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "replaces",
    required: false,
    set: |v, k, val| {
      v.replaces = as_list(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "sources",
    required: false,
    set: |v, k, val| {
      v.sources = as_list(k, val)?;
      Ok(())
    },
  },
  Field {
    key: "checksums",
    required: false,
    set: |v, k, val| {
      let sums = as_list(k, val)?;
      for sum in &sums {
        if Checksum::parse(sum).is_err() {
          return Err(RecipeError::InvalidChecksum(sum.clone()));
        }
      }
      v.checksums = sums;
      Ok(())
    },
  },
  Field {
    key: "backup",
    required: false,
    set: |v, k, val| {
      v.backup = as_list(k, val)?;
      Ok(())
    },
  },
];

type RecordSetter = fn(&mut PackageRecord, &str, &str, &LuaValue) -> Result<(), RecipeError>;

/// Overridable record fields, keyed by recipe global name.
static RECORD_FIELDS: &[(&str, RecordSetter)] = &[
  ("desc", |r, s, k, v| {
    r.description.insert(s, as_string(k, v)?);
    Ok(())
  }),
  ("homepage", |r, s, k, v| {
    r.homepage.insert(s, as_string(k, v)?);
    Ok(())
  }),
  ("architectures", |r, s, k, v| {
    r.architectures.insert(s, as_list(k, v)?);
    Ok(())
  }),
  ("license", |r, s, k, v| {
    r.licenses.insert(s, as_list(k, v)?);
    Ok(())
  }),
  ("provides", |r, s, k, v| {
    r.provides.insert(s, as_list(k, v)?);
    Ok(())
  }),
  ("conflicts", |r, s, k, v| {
    r.conflicts.insert(s, as_list(k, v)?);
    Ok(())
  }),
  ("replaces", |r, s, k, v| {
    r.replaces.insert(s, as_list(k, v)?);
    Ok(())
  }),
  ("deps", |r, s, k, v| {
    r.depends.insert(s, as_list(k, v)?);
    Ok(())
  }),
  ("build_deps", |r, s, k, v| {
    r.build_depends.insert(s, as_list(k, v)?);
    Ok(())
  }),
];

fn describe(val: &LuaValue) -> String {
  match val {
    LuaValue::String(s) => format!("string \"{}\"", s.to_string_lossy()),
    LuaValue::Integer(i) => format!("integer {}", i),
    LuaValue::Number(n) => format!("number {}", n),
    other => other.type_name().to_string(),
  }
}

fn invalid(key: &str, expected: &'static str, val: &LuaValue) -> RecipeError {
  RecipeError::InvalidField {
    key: key.to_string(),
    expected,
    got: describe(val),
  }
}

fn as_string(key: &str, val: &LuaValue) -> Result<String, RecipeError> {
  match val {
    LuaValue::String(s) => Ok(s.to_str()?.to_string()),
    LuaValue::Integer(i) => Ok(i.to_string()),
    LuaValue::Number(n) => Ok(n.to_string()),
    other => Err(invalid(key, "a string", other)),
  }
}

fn as_integer(key: &str, val: &LuaValue) -> Result<i64, RecipeError> {
  match val {
    LuaValue::Integer(i) => Ok(*i),
    LuaValue::Number(n) if n.fract() == 0.0 => Ok(*n as i64),
    LuaValue::String(s) => s
      .to_str()?
      .trim()
      .parse()
      .map_err(|_| invalid(key, "an integer", val)),
    other => Err(invalid(key, "an integer", other)),
  }
}

/// A sequence table, or a single string treated as a one-element list.
fn as_list(key: &str, val: &LuaValue) -> Result<Vec<String>, RecipeError> {
  match val {
    LuaValue::Table(table) => {
      let mut out = Vec::new();
      for item in table.sequence_values::<LuaValue>() {
        out.push(as_string(key, &item?)?);
      }
      Ok(out)
    }
    LuaValue::String(_) => Ok(vec![as_string(key, val)?]),
    other => Err(invalid(key, "a list of strings", other)),
  }
}

/// Decodes a loaded recipe for one platform.
pub struct Decoder<'a> {
  runtime: &'a RecipeRuntime,
  platform: &'a Platform,
  opts: &'a ResolveOpts,
}

impl<'a> Decoder<'a> {
  pub fn new(runtime: &'a RecipeRuntime, platform: &'a Platform, opts: &'a ResolveOpts) -> Self {
    Self {
      runtime,
      platform,
      opts,
    }
  }

  /// First candidate of `key` that the recipe sets, with its value.
  pub fn lookup(&self, key: &str) -> Result<Option<(String, LuaValue)>, RecipeError> {
    for candidate in resolve(self.platform, &self.opts.with_name(key))? {
      let value = self.runtime.get_var(&candidate)?;
      if !value.is_nil() {
        return Ok(Some((candidate, value)));
      }
    }
    Ok(None)
  }

  /// Populate [`BuildVars`] from the recipe's globals.
  pub fn decode(&self) -> Result<BuildVars, RecipeError> {
    let mut vars = BuildVars::default();
    for field in FIELDS {
      match self.lookup(field.key)? {
        Some((candidate, value)) => (field.set)(&mut vars, &candidate, &value)?,
        None if field.required => return Err(RecipeError::MissingField(field.key)),
        None => {}
      }
    }
    Ok(vars)
  }

  /// Collect every declared variant into a [`PackageRecord`].
  ///
  /// The base global is stored under the `""` key, `<field>_<suffix>` under
  /// `<suffix>`.
  pub fn package_record(&self) -> Result<PackageRecord, RecipeError> {
    let vars = self.decode()?;
    let mut record = PackageRecord {
      name: vars.name,
      version: vars.version,
      release: vars.release,
      epoch: vars.epoch,
      ..Default::default()
    };

    let mut globals = self.runtime.vars()?;
    globals.sort_by(|a, b| a.0.cmp(&b.0));

    for (key, value) in globals {
      if matches!(value, LuaValue::Function(_) | LuaValue::Nil) {
        continue;
      }
      for (field, set) in RECORD_FIELDS {
        let suffix = if key == *field {
          Some("")
        } else {
          key.strip_prefix(field).and_then(|rest| rest.strip_prefix('_'))
        };
        if let Some(suffix) = suffix {
          set(&mut record, suffix, &key, &value)?;
        }
      }
    }

    Ok(record)
  }
}
