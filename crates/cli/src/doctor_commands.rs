//! `jfp doctor`: config validation, cache and install-root health.
//!
//! Prints a report with `[ok]`, `[warn]`, `[fail]` or `[info]` per item.

use std::path::Path;

use {
    anyhow::Result,
    jfp_config::{JfpConfig, Severity, validate},
    jfp_registry::{RegistryLoader, library::TOKEN_ENV},
    jfp_skills::{
        InstalledState, SkillSyncer,
        manifest::{manifest_path, read_manifest},
    },
    serde::Serialize,
};

use crate::{
    VERSION,
    output::{BOLD, CYAN, GREEN, RED, RESET, YELLOW, print_json},
    skill_commands::{RootKind, root_path},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Info => "info",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
            Self::Info => CYAN,
        }
    }
}

#[derive(Serialize)]
struct CheckItem {
    status: Status,
    message: String,
}

#[derive(Serialize)]
struct Section {
    title: String,
    items: Vec<CheckItem>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push(CheckItem {
            status,
            message: message.into(),
        });
    }

    fn count(&self, status: Status) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }
}

fn print_sections(sections: &[Section]) {
    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for item in &section.items {
            let color = item.status.color();
            let label = item.status.label();
            eprintln!("  [{color}{label}{RESET}]  {}", item.message);
        }
        eprintln!();
    }
}

// ── Entry point ─────────────────────────────────────────────────────────────

pub(crate) fn handle_doctor(config: &JfpConfig, json: bool) -> Result<bool> {
    let sections = vec![
        check_config(),
        check_cache(config)?,
        check_root(config, RootKind::Personal)?,
        check_root(config, RootKind::Project)?,
        check_auth(),
    ];
    let errors: usize = sections.iter().map(|s| s.count(Status::Fail)).sum();
    let warnings: usize = sections.iter().map(|s| s.count(Status::Warn)).sum();

    if json {
        print_json(&sections)?;
    } else {
        eprintln!("{BOLD}jfp doctor{RESET} v{VERSION}\n");
        print_sections(&sections);
        eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");
    }
    Ok(errors == 0)
}

// ── Checks ──────────────────────────────────────────────────────────────────

fn check_config() -> Section {
    let result = validate(None);
    let label = result
        .config_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".into());
    let mut section = Section::new(format!("Config ({label})"));

    for d in &result.diagnostics {
        let status = match d.severity {
            Severity::Error => Status::Fail,
            Severity::Warning => Status::Warn,
            Severity::Info => Status::Info,
        };
        if d.path.is_empty() {
            section.push(status, d.message.clone());
        } else {
            section.push(status, format!("{}: {}", d.path, d.message));
        }
    }
    if !result.has_errors() && result.count(Severity::Warning) == 0 {
        section.push(Status::Ok, "configuration is valid");
    }
    section
}

fn check_cache(config: &JfpConfig) -> Result<Section> {
    let mut section = Section::new("Catalog cache");
    let status = RegistryLoader::new(config, VERSION)?.status();

    check_writable(&mut section, &status.cache_dir, "Cache directory");
    match (&status.meta, status.cached) {
        (Some(meta), true) if status.stale => section.push(
            Status::Warn,
            format!("{} cached prompt(s), stale (run `jfp refresh`)", meta.prompt_count),
        ),
        (Some(meta), true) => section.push(
            Status::Ok,
            format!("{} cached prompt(s), fresh", meta.prompt_count),
        ),
        _ => section.push(
            Status::Info,
            "no cached catalog yet (the bundled snapshot is used until the first fetch)",
        ),
    }
    if !config.registry.auto_refresh {
        section.push(Status::Info, "background refresh disabled");
    }
    Ok(section)
}

fn check_root(config: &JfpConfig, kind: RootKind) -> Result<Section> {
    let root = root_path(config, kind)?;
    let title = match kind {
        RootKind::Personal => "Personal skills",
        RootKind::Project => "Project skills",
    };
    let mut section = Section::new(format!("{title} ({})", root.display()));

    if !root.exists() {
        section.push(Status::Info, "root does not exist yet");
        return Ok(section);
    }
    check_writable(&mut section, &root, "Root");

    let manifest_file = manifest_path(&root);
    if manifest_file.exists() && read_manifest(&root).is_none() {
        section.push(
            Status::Warn,
            format!(
                "{} is unreadable; installed skills are treated as untracked",
                manifest_file.display()
            ),
        );
        return Ok(section);
    }

    let skills = SkillSyncer::new(&root, VERSION).installed();
    let modified = skills
        .iter()
        .filter(|s| s.state == InstalledState::Modified)
        .count();
    let missing = skills
        .iter()
        .filter(|s| s.state == InstalledState::Missing)
        .count();
    section.push(Status::Ok, format!("{} tracked skill(s)", skills.len()));
    if modified > 0 {
        section.push(
            Status::Info,
            format!("{modified} skill(s) edited locally; updates will skip them"),
        );
    }
    if missing > 0 {
        section.push(
            Status::Warn,
            format!("{missing} tracked skill(s) missing on disk"),
        );
    }
    Ok(section)
}

fn check_auth() -> Section {
    let mut section = Section::new("Library access");
    match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => {
            section.push(Status::Ok, format!("{TOKEN_ENV} is set"));
        },
        _ => section.push(
            Status::Info,
            format!("{TOKEN_ENV} not set; `jfp sync` is unavailable"),
        ),
    }
    section
}

fn check_writable(section: &mut Section, dir: &Path, label: &str) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        section.push(Status::Fail, format!("{label} cannot be created: {e}"));
        return;
    }
    let marker = dir.join(".jfp-doctor-write-check");
    match std::fs::write(&marker, b"ok") {
        Ok(()) => {
            let _ = std::fs::remove_file(&marker);
        },
        Err(e) => {
            section.push(Status::Fail, format!("{label} is not writable: {e}"));
        },
    }
}
