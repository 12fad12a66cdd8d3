//! Lua recipe engine.
//!
//! A recipe is a Lua script that declares its metadata as globals and may
//! define `build` and `package` hooks. This module provides the runtime the
//! script runs in and the decoder that turns the resulting globals into typed
//! build variables.
//!
//! # Submodules
//!
//! - [`runtime`] - VM lifecycle, variable injection and hook dispatch
//! - [`globals`] - Values and functions seeded before the recipe runs
//! - [`decode`] - Field table decoding into [`crate::build::BuildVars`]
//! - [`helpers`] - Helper tables exposed to scripts

pub mod decode;
pub mod globals;
pub mod helpers;
pub mod runtime;

use std::path::PathBuf;

use mlua::prelude::LuaError;
use thiserror::Error;

use crate::overrides::OverrideError;

pub use decode::Decoder;
pub use runtime::{Hook, RecipeRuntime};

#[derive(Debug, Error)]
pub enum RecipeError {
  #[error("failed to read recipe '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("lua error: {0}")]
  Lua(#[from] LuaError),

  #[error("required field '{0}' is not set")]
  MissingField(&'static str),

  #[error("field '{key}' must be {expected}, got {got}")]
  InvalidField {
    key: String,
    expected: &'static str,
    got: String,
  },

  #[error("invalid checksum '{0}': expected hex SHA-256 or SKIP")]
  InvalidChecksum(String),

  #[error("{name}() failed: {source}")]
  Hook {
    name: String,
    #[source]
    source: LuaError,
  },

  #[error("{0}() cancelled")]
  Cancelled(String),

  #[error(transparent)]
  Override(#[from] OverrideError),
}
