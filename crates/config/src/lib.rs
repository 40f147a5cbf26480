//! Configuration loading, env substitution, directory resolution and validation.
//!
//! Config files: `jfp.toml`, `jfp.yaml`, `jfp.yml`, or `jfp.json`.
//! Searched in `./` then the user config directory.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        HOME_ENV, cache_dir, clear_config_dir, config_dir, discover_and_load, find_config_file,
        find_or_default_config_path, load_config, save_config, set_cache_dir, set_config_dir,
    },
    schema::{JfpConfig, LocalPromptsConfig, OutputConfig, RegistryConfig, SkillsConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_config},
};
