use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::JfpConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["jfp.toml", "jfp.yaml", "jfp.yml", "jfp.json"];

/// Environment variable that relocates every jfp directory under one root.
pub const HOME_ENV: &str = "JFP_HOME";

static CONFIG_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);
static CACHE_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<JfpConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./jfp.{toml,yaml,yml,json}` (project-local)
/// 2. `<config_dir>/jfp.{toml,yaml,yml,json}` (user-global)
///
/// Returns `JfpConfig::default()` if no config file is found.
pub fn discover_and_load() -> JfpConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    JfpConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir();
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Override the config directory for the rest of the process.
pub fn set_config_dir(dir: PathBuf) {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.write() {
        *guard = Some(dir);
    }
}

pub fn clear_config_dir() {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.write() {
        *guard = None;
    }
}

/// Override the cache directory for the rest of the process.
pub fn set_cache_dir(dir: PathBuf) {
    if let Ok(mut guard) = CACHE_DIR_OVERRIDE.write() {
        *guard = Some(dir);
    }
}

/// Returns the user-global config directory.
///
/// Precedence: [`set_config_dir`] override, `$JFP_HOME/.config/jfp`, the
/// platform config dir, then `./.jfp`.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = read_override(&CONFIG_DIR_OVERRIDE) {
        return dir;
    }
    if let Some(home) = home_override() {
        return home.join(".config").join("jfp");
    }
    directories::ProjectDirs::from("", "", "jfp")
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".jfp"))
}

/// Returns the cache directory holding registry and library caches.
pub fn cache_dir() -> PathBuf {
    if let Some(dir) = read_override(&CACHE_DIR_OVERRIDE) {
        return dir;
    }
    if let Some(home) = home_override() {
        return home.join(".cache").join("jfp");
    }
    directories::ProjectDirs::from("", "", "jfp")
        .map(|d| d.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".jfp").join("cache"))
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    find_config_file().unwrap_or_else(|| config_dir().join("jfp.toml"))
}

/// Serialize `config` to TOML and write it to the user-global config path.
///
/// Creates parent directories if needed. Returns the path written to.
pub fn save_config(config: &JfpConfig) -> anyhow::Result<PathBuf> {
    let path = find_or_default_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))?;
    std::fs::write(&path, toml_str)?;
    debug!(path = %path.display(), "saved config");
    Ok(path)
}

fn read_override(slot: &RwLock<Option<PathBuf>>) -> Option<PathBuf> {
    slot.read().ok().and_then(|guard| guard.clone())
}

fn home_override() -> Option<PathBuf> {
    std::env::var_os(HOME_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<JfpConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_each_supported_format() {
        let tmp = tempfile::tempdir().unwrap();

        let toml_path = tmp.path().join("jfp.toml");
        std::fs::write(&toml_path, "[registry]\ntimeout_ms = 500\n").unwrap();
        assert_eq!(load_config(&toml_path).unwrap().registry.timeout_ms, 500);

        let yaml_path = tmp.path().join("jfp.yaml");
        std::fs::write(&yaml_path, "skills:\n  prefer_project: true\n").unwrap();
        assert!(load_config(&yaml_path).unwrap().skills.prefer_project);

        let json_path = tmp.path().join("jfp.json");
        std::fs::write(&json_path, r#"{"output":{"json":true}}"#).unwrap();
        assert!(load_config(&json_path).unwrap().output.json);
    }

    #[test]
    fn rejects_unknown_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("jfp.ini");
        std::fs::write(&path, "x=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn invalid_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("jfp.toml");
        std::fs::write(&path, "[registry\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    // One test owns the process-wide overrides so parallel tests never race.
    #[test]
    fn directory_overrides_and_save() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = tmp.path().join("cache");
        set_cache_dir(cache.clone());
        assert_eq!(cache_dir(), cache);

        set_config_dir(tmp.path().to_path_buf());
        assert_eq!(config_dir(), tmp.path());

        let mut cfg = JfpConfig::default();
        cfg.registry.timeout_ms = 750;
        let written = save_config(&cfg).unwrap();
        assert_eq!(written, tmp.path().join("jfp.toml"));
        assert_eq!(load_config(&written).unwrap(), cfg);

        clear_config_dir();
        assert_ne!(config_dir(), tmp.path());
    }
}
