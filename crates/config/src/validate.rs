//! Semantic checks over a loaded configuration, reported by `jfp doctor`.

use std::path::Path;

use crate::schema::JfpConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "registry.url"
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate an already-parsed configuration.
#[must_use]
pub fn validate_config(config: &JfpConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    check_url(&mut result, "registry.url", &config.registry.url);
    check_url(&mut result, "registry.library_url", &config.registry.library_url);

    if config.registry.timeout_ms == 0 {
        result.push(
            Severity::Error,
            "registry.timeout_ms",
            "timeout must be greater than zero",
        );
    } else if config.registry.timeout_ms > 60_000 {
        result.push(
            Severity::Warning,
            "registry.timeout_ms",
            "timeouts above 60s make offline commands feel hung",
        );
    }

    if config.registry.cache_ttl_secs == 0 && config.registry.auto_refresh {
        result.push(
            Severity::Info,
            "registry.cache_ttl_secs",
            "a zero TTL refreshes the catalog in the background on every command",
        );
    }

    if config.skills.personal_dir == config.skills.project_dir {
        result.push(
            Severity::Error,
            "skills.project_dir",
            "personal and project roots must differ; each keeps its own manifest",
        );
    }

    if config.skills.personal_dir.is_relative() {
        result.push(
            Severity::Warning,
            "skills.personal_dir",
            "relative personal root resolves against the working directory",
        );
    }

    result
}

/// Load the file at `path` (or the discovered config file) and validate it.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(crate::loader::find_config_file);

    let Some(actual_path) = config_path else {
        let mut result = validate_config(&JfpConfig::default());
        result.push(Severity::Info, "", "no config file found; using defaults");
        return result;
    };

    match crate::loader::load_config(&actual_path) {
        Ok(config) => {
            let mut result = validate_config(&config);
            result.config_path = Some(actual_path);
            result
        },
        Err(e) => {
            let mut result = ValidationResult {
                config_path: Some(actual_path),
                ..Default::default()
            };
            result.push(Severity::Error, "", format!("failed to load config: {e}"));
            result
        },
    }
}

fn check_url(result: &mut ValidationResult, path: &str, raw: &str) {
    match url::Url::parse(raw) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {
            if u.scheme() == "http" && u.host_str() != Some("127.0.0.1") {
                result.push(Severity::Warning, path, "catalog fetched over plain http");
            }
        },
        Ok(u) => result.push(
            Severity::Error,
            path,
            format!("unsupported scheme '{}'", u.scheme()),
        ),
        Err(e) => result.push(Severity::Error, path, format!("invalid URL: {e}")),
    }
}
