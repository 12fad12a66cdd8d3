//! srcpkg-lib: build orchestration for source-based packages.
//!
//! This crate turns a Lua recipe into an installable package:
//! - `overrides`: candidate key generation and per-field variant merging
//! - `lua`: the recipe runtime, decoder and hook dispatch
//! - `build`: the recursive build orchestrator
//! - `contents`: classification of a package root into manifest entries
//! - `fetch`, `manager`, `package`, `repo`: collaborators the orchestrator drives

pub mod build;
pub mod config;
pub mod consts;
pub mod contents;
pub mod exec;
pub mod fetch;
pub mod lua;
pub mod manager;
pub mod overrides;
pub mod package;
pub mod platform;
pub mod repo;
pub mod util;
