use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mlua::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::RecipeError;
use super::globals;
use crate::platform::Platform;

/// State shared with the `exec` function through Lua app data.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExecContext {
  pub cwd: Option<PathBuf>,
  pub env: BTreeMap<String, String>,
  pub cancel: CancellationToken,
}

/// A hook function defined by a recipe.
#[derive(Debug, Clone)]
pub struct Hook {
  name: String,
  func: LuaFunction,
}

impl Hook {
  pub fn name(&self) -> &str {
    &self.name
  }
}

/// A Lua VM seeded for running one recipe.
pub struct RecipeRuntime {
  lua: Lua,
  cancel: CancellationToken,
}

impl RecipeRuntime {
  /// Create a runtime seeded with the system identity of `platform`.
  pub fn new(platform: &Platform, cancel: CancellationToken) -> Result<Self, RecipeError> {
    let lua = Lua::new();
    let env = globals::build_env(platform);
    globals::register_globals(&lua, &env)?;
    lua.set_app_data(ExecContext {
      cwd: None,
      env,
      cancel: cancel.clone(),
    });
    Ok(Self { lua, cancel })
  }

  /// Execute a recipe file. Top-level code may call `exec`.
  pub async fn load_file(&self, path: &Path) -> Result<(), RecipeError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|source| RecipeError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), "executing recipe");
    self.load_str(&content, &path.display().to_string()).await
  }

  pub async fn load_str(&self, source: &str, name: &str) -> Result<(), RecipeError> {
    self.lua.load(source).set_name(format!("@{}", name)).exec_async().await?;
    Ok(())
  }

  /// Set a global string variable and export it to commands run by `exec`.
  pub fn set_var(&self, name: &str, value: &str) -> Result<(), RecipeError> {
    self.lua.globals().set(name, value)?;
    let env_table: LuaTable = self.lua.globals().get("env")?;
    env_table.set(name, value)?;
    if let Some(mut ctx) = self.lua.app_data_mut::<ExecContext>() {
      ctx.env.insert(name.to_string(), value.to_string());
    }
    Ok(())
  }

  /// Raw value of a global; `Nil` when unset.
  pub fn get_var(&self, name: &str) -> Result<LuaValue, RecipeError> {
    Ok(self.lua.globals().get::<LuaValue>(name)?)
  }

  /// Every global with a string key.
  pub fn vars(&self) -> Result<Vec<(String, LuaValue)>, RecipeError> {
    let mut out = Vec::new();
    for pair in self.lua.globals().pairs::<LuaValue, LuaValue>() {
      let (key, value) = pair?;
      if let LuaValue::String(key) = key {
        out.push((key.to_str()?.to_string(), value));
      }
    }
    Ok(out)
  }

  /// Look up an optional hook. Absence is not an error.
  pub fn try_get_hook(&self, name: &str) -> Result<Option<Hook>, RecipeError> {
    match self.get_var(name)? {
      LuaValue::Function(func) => Ok(Some(Hook {
        name: name.to_string(),
        func,
      })),
      LuaValue::Nil => Ok(None),
      other => {
        warn!(hook = name, kind = other.type_name(), "ignoring non-function hook");
        Ok(None)
      }
    }
  }

  /// Run `hook` with `dir` as its argument and as the working directory of `exec`.
  pub async fn run_hook(&self, hook: &Hook, dir: &Path) -> Result<(), RecipeError> {
    if let Some(mut ctx) = self.lua.app_data_mut::<ExecContext>() {
      ctx.cwd = Some(dir.to_path_buf());
    }

    let call = hook.func.call_async::<()>(dir.to_string_lossy().into_owned());
    let result = tokio::select! {
      biased;
      _ = self.cancel.cancelled() => return Err(RecipeError::Cancelled(hook.name.clone())),
      result = call => result,
    };

    if let Some(mut ctx) = self.lua.app_data_mut::<ExecContext>() {
      ctx.cwd = None;
    }

    result.map_err(|source| RecipeError::Hook {
      name: hook.name.clone(),
      source,
    })
  }

  pub fn lua(&self) -> &Lua {
    &self.lua
  }
}
