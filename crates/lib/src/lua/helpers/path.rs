use std::path::{Path, PathBuf};

use mlua::prelude::*;

fn lossy(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}

/// Register a single-argument path function returning a string.
fn set_path_fn(lua: &Lua, table: &LuaTable, name: &str, f: fn(&Path) -> String) -> LuaResult<()> {
  table.set(
    name,
    lua.create_function(move |_, path: String| Ok(f(Path::new(&path))))?,
  )
}

/// Create the `path` table exposed to recipes.
pub fn create_path_helpers(lua: &Lua) -> LuaResult<LuaTable> {
  let path = lua.create_table()?;

  path.set(
    "join",
    lua.create_function(|_, segments: LuaVariadic<String>| {
      let joined: PathBuf = segments.iter().collect();
      Ok(lossy(&joined))
    })?,
  )?;

  set_path_fn(lua, &path, "dirname", |p| p.parent().map(lossy).unwrap_or_default())?;
  set_path_fn(lua, &path, "basename", |p| {
    p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
  })?;
  set_path_fn(lua, &path, "extname", |p| {
    p.extension()
      .map(|e| format!(".{}", e.to_string_lossy()))
      .unwrap_or_default()
  })?;
  set_path_fn(lua, &path, "stem", |p| {
    p.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
  })?;

  path.set(
    "exists",
    lua.create_function(|_, p: String| Ok(Path::new(&p).exists()))?,
  )?;

  Ok(path)
}
