//! Globals seeded into every recipe runtime.
//!
//! - `DISTRO_NAME`, `DISTRO_PRETTY_NAME`, `DISTRO_ID`, `DISTRO_BUILD_ID`
//! - `ARCH`, `NCPU`
//! - `env` - the caller's environment plus the values above
//! - `path` - path helpers
//! - `exec(cmd [, opts])` - run a shell command in the hook's directory

use std::collections::BTreeMap;
use std::path::PathBuf;

use mlua::prelude::*;

use super::helpers;
use super::runtime::ExecContext;
use crate::exec::{ExecOpts, run_shell};
use crate::platform::Platform;

/// Variables describing the running system, exported to recipes and commands.
pub fn build_env(platform: &Platform) -> BTreeMap<String, String> {
  let ncpu = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
  BTreeMap::from([
    ("DISTRO_NAME".to_string(), platform.distro.name.clone()),
    ("DISTRO_PRETTY_NAME".to_string(), platform.distro.pretty_name.clone()),
    ("DISTRO_ID".to_string(), platform.distro.id.clone()),
    ("DISTRO_BUILD_ID".to_string(), platform.distro.build_id.clone()),
    ("ARCH".to_string(), platform.arch.as_str().to_string()),
    ("NCPU".to_string(), ncpu.to_string()),
  ])
}

/// Register the seeded globals. `env` is the build environment from [`build_env`].
pub fn register_globals(lua: &Lua, env: &BTreeMap<String, String>) -> LuaResult<()> {
  let globals = lua.globals();

  for (key, value) in env {
    globals.set(key.as_str(), value.as_str())?;
  }
  if let Some(ncpu) = env.get("NCPU").and_then(|n| n.parse::<i64>().ok()) {
    globals.set("NCPU", ncpu)?;
  }

  let env_table = lua.create_table()?;
  for (key, value) in std::env::vars() {
    env_table.set(key, value)?;
  }
  for (key, value) in env {
    env_table.set(key.as_str(), value.as_str())?;
  }
  globals.set("env", env_table)?;

  globals.set("path", helpers::path::create_path_helpers(lua)?)?;
  globals.set("exec", create_exec(lua)?)?;

  Ok(())
}

/// `exec(cmd [, { cwd = ..., env = {...}, capture = bool }])`
///
/// Raises a Lua error on non-zero exit. Returns captured stdout, or `""`.
fn create_exec(lua: &Lua) -> LuaResult<LuaFunction> {
  lua.create_async_function(|lua, (cmd, opts): (String, Option<LuaTable>)| async move {
    let mut exec_opts = {
      let ctx = lua
        .app_data_ref::<ExecContext>()
        .ok_or_else(|| LuaError::external("exec called outside a recipe runtime"))?;
      ExecOpts {
        cwd: ctx.cwd.clone(),
        env: ctx.env.clone(),
        capture: false,
        cancel: ctx.cancel.clone(),
      }
    };

    if let Some(opts) = opts {
      if let Some(cwd) = opts.get::<Option<String>>("cwd")? {
        let cwd = PathBuf::from(cwd);
        exec_opts.cwd = Some(match &exec_opts.cwd {
          Some(base) if cwd.is_relative() => base.join(cwd),
          _ => cwd,
        });
      }
      if let Some(env) = opts.get::<Option<LuaTable>>("env")? {
        for pair in env.pairs::<String, String>() {
          let (key, value) = pair?;
          exec_opts.env.insert(key, value);
        }
      }
      exec_opts.capture = opts.get::<Option<bool>>("capture")?.unwrap_or(false);
    }

    run_shell(&cmd, &exec_opts).await.map_err(LuaError::external)
  })
}
