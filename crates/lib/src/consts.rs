//! Crate-wide constants.

/// Application name, used for config and cache directory names.
pub const APP_NAME: &str = "srcpkg";

/// File name of a recipe inside a recipe collection directory.
pub const RECIPE_FILE: &str = "recipe.lua";

/// Checksum value that disables verification for a source.
pub const SKIP_CHECKSUM: &str = "SKIP";

/// Environment variable overriding the detected ARM sub-variant.
pub const ARM_VARIANT_ENV: &str = "SRCPKG_ARM_VARIANT";

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "SRCPKG_CACHE_DIR";

/// Environment variable pointing at an alternative os-release file.
pub const OS_RELEASE_ENV: &str = "SRCPKG_OS_RELEASE";

/// Name of the config file inside the config directory.
pub const CONFIG_FILE: &str = "srcpkg.toml";
