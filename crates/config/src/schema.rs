/// Config schema types (registry, skills, local prompts, output).
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default catalog endpoint.
pub const DEFAULT_REGISTRY_URL: &str = "https://jeffreysprompts.com/api/prompts";
/// Default endpoint for the authenticated full-library download.
pub const DEFAULT_LIBRARY_URL: &str = "https://jeffreysprompts.com/api/library";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JfpConfig {
    pub registry: RegistryConfig,
    pub skills: SkillsConfig,
    pub local_prompts: LocalPromptsConfig,
    pub output: OutputConfig,
}

/// Catalog source and cache behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Catalog endpoint, fetched with conditional GET.
    pub url: String,
    /// Full-library endpoint used by `jfp sync`.
    pub library_url: String,
    /// Where `registry.json`, `registry.meta.json` and `library.json` live.
    /// Falls back to [`crate::cache_dir`] when unset.
    pub cache_dir: Option<PathBuf>,
    /// Spawn a background refresh when a warm cache is stale.
    pub auto_refresh: bool,
    /// Age after which a cached catalog counts as stale.
    pub cache_ttl_secs: u64,
    /// Upper bound for every network request.
    pub timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.into(),
            library_url: DEFAULT_LIBRARY_URL.into(),
            cache_dir: None,
            auto_refresh: true,
            cache_ttl_secs: 3600,
            timeout_ms: 2000,
        }
    }
}

impl RegistryConfig {
    /// Resolved cache directory.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(crate::cache_dir)
    }
}

/// Install roots for generated skills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    /// Personal root, shared across projects.
    pub personal_dir: PathBuf,
    /// Project root, relative to the working directory unless absolute.
    pub project_dir: PathBuf,
    /// Install into the project root when no root flag is given.
    pub prefer_project: bool,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        let home = directories::BaseDirs::new()
            .map(|d| d.home_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            personal_dir: home.join(".config/claude/skills"),
            project_dir: PathBuf::from(".claude/skills"),
            prefer_project: false,
        }
    }
}

/// Locally authored prompts merged over the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalPromptsConfig {
    pub enabled: bool,
    /// Directory scanned for `*.json` prompt files.
    /// Falls back to `<config_dir>/local` when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LocalPromptsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

impl LocalPromptsConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| crate::config_dir().join("local"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print machine-readable JSON by default.
    pub json: bool,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: JfpConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, JfpConfig::default());
        assert!(cfg.registry.auto_refresh);
        assert_eq!(cfg.registry.timeout_ms, 2000);
        assert_eq!(cfg.skills.project_dir, PathBuf::from(".claude/skills"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg: JfpConfig = toml::from_str(
            r#"
[registry]
auto_refresh = false
cache_dir = "/tmp/jfp-cache"
"#,
        )
        .unwrap();
        assert!(!cfg.registry.auto_refresh);
        assert_eq!(cfg.registry.url, DEFAULT_REGISTRY_URL);
        assert_eq!(
            cfg.registry.resolved_cache_dir(),
            PathBuf::from("/tmp/jfp-cache")
        );
    }
}
