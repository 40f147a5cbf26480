//! `jfp export`: write catalog prompts as standalone markdown.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use {
    anyhow::Result,
    clap::ValueEnum,
    jfp_common::fs::write_atomic,
    jfp_config::JfpConfig,
    jfp_registry::{Prompt, Registry},
    jfp_skills::{is_safe_id, render_markdown, render_prompt},
    serde::Serialize,
    tracing::warn,
};

use crate::{
    output::{DIM, RESET, YELLOW, print_json},
    registry_commands::{load, settle},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ExportFormat {
    /// Plain markdown.
    Md,
    /// `SKILL.md` layout with frontmatter, as `install` writes it.
    Skill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExportTarget {
    Stdout,
    Dir(PathBuf),
}

#[derive(Debug, Serialize)]
struct Exported {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExportFailure {
    id: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct ExportReport {
    format: ExportFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dir: Option<PathBuf>,
    count: usize,
    exported: Vec<Exported>,
    missing: Vec<String>,
    failed: Vec<ExportFailure>,
}

impl ExportReport {
    fn ok(&self) -> bool {
        !self.exported.is_empty() && self.missing.is_empty() && self.failed.is_empty()
    }
}

fn render(prompt: &Prompt, format: ExportFormat) -> String {
    match format {
        ExportFormat::Md => render_markdown(prompt),
        ExportFormat::Skill => render_prompt(prompt),
    }
}

/// Prompts named by `ids` plus the ids that matched nothing. No ids, or the
/// single id `all`, selects the whole catalog.
fn select<'a>(registry: &'a Registry, ids: &[String]) -> (Vec<&'a Prompt>, Vec<String>) {
    if ids.is_empty() || (ids.len() == 1 && ids[0] == "all") {
        return (registry.prompts.iter().collect(), Vec::new());
    }
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for id in ids.iter().filter(|id| seen.insert(id.as_str())) {
        match registry.get_prompt(id) {
            Some(prompt) => found.push(prompt),
            None => missing.push(id.clone()),
        }
    }
    (found, missing)
}

fn export_prompts(
    prompts: &[&Prompt],
    format: ExportFormat,
    target: &ExportTarget,
) -> ExportReport {
    let mut exported = Vec::with_capacity(prompts.len());
    let mut failed = Vec::new();

    for prompt in prompts {
        let content = render(prompt, format);
        let dir = match target {
            ExportTarget::Stdout => {
                exported.push(Exported {
                    id: prompt.id.clone(),
                    file: None,
                    content: Some(content),
                });
                continue;
            },
            ExportTarget::Dir(dir) => dir,
        };
        if !is_safe_id(&prompt.id) {
            failed.push(ExportFailure {
                id: prompt.id.clone(),
                error: "unsafe prompt id".into(),
            });
            continue;
        }
        let file = dir.join(format!("{}.md", prompt.id));
        match write_atomic(&file, content.as_bytes()) {
            Ok(()) => exported.push(Exported {
                id: prompt.id.clone(),
                file: Some(file),
                content: None,
            }),
            Err(e) => {
                warn!(id = %prompt.id, path = %file.display(), error = %e, "export write failed");
                failed.push(ExportFailure {
                    id: prompt.id.clone(),
                    error: e.to_string(),
                });
            },
        }
    }

    ExportReport {
        format,
        output_dir: match target {
            ExportTarget::Stdout => None,
            ExportTarget::Dir(dir) => Some(dir.clone()),
        },
        count: exported.len(),
        exported,
        missing: Vec::new(),
        failed,
    }
}

pub(crate) async fn export(
    config: &JfpConfig,
    json: bool,
    ids: &[String],
    format: ExportFormat,
    target: ExportTarget,
) -> Result<bool> {
    let mut loaded = load(config).await?;
    let (prompts, missing) = select(&loaded.registry, ids);
    let mut report = export_prompts(&prompts, format, &target);
    report.missing = missing;
    settle(loaded.background_refresh.take()).await;

    if json {
        print_json(&report)?;
        return Ok(report.ok());
    }

    for id in &report.missing {
        eprintln!("{YELLOW}warning{RESET} prompt '{id}' not found, skipped");
    }
    for failure in &report.failed {
        eprintln!("{YELLOW}warning{RESET} {}: {}", failure.id, failure.error);
    }
    match target {
        ExportTarget::Stdout => print_documents(&report.exported),
        ExportTarget::Dir(dir) => print_written(&dir, &report.exported),
    }
    Ok(report.ok())
}

fn print_documents(exported: &[Exported]) {
    for (i, item) in exported.iter().enumerate() {
        if i > 0 {
            println!("\n---\n");
        }
        if let Some(content) = &item.content {
            print!("{content}");
        }
    }
}

fn print_written(dir: &Path, exported: &[Exported]) {
    for item in exported {
        if let Some(file) = &item.file {
            println!("Exported: {}", file.display());
        }
    }
    println!(
        "{DIM}{} prompt(s) exported to {}{RESET}",
        exported.len(),
        dir.display()
    );
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Registry {
        Registry::new(vec![
            Prompt::new("alpha", "Alpha", "alpha body"),
            Prompt::new("beta", "Beta", "beta body"),
        ])
    }

    #[test]
    fn select_all_or_named() {
        let reg = catalog();
        assert_eq!(select(&reg, &[]).0.len(), 2);
        assert_eq!(select(&reg, &["all".into()]).0.len(), 2);

        let (found, missing) = select(&reg, &["beta".into(), "ghost".into(), "beta".into()]);
        let ids: Vec<_> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["beta"]);
        assert_eq!(missing, ["ghost"]);
    }

    #[test]
    fn writes_one_file_per_prompt() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = catalog();
        let prompts: Vec<&Prompt> = reg.prompts.iter().collect();
        let out = tmp.path().join("out");

        let report = export_prompts(&prompts, ExportFormat::Md, &ExportTarget::Dir(out.clone()));
        assert!(report.ok());
        assert_eq!(report.count, 2);
        let alpha = std::fs::read_to_string(out.join("alpha.md")).unwrap();
        assert!(alpha.starts_with("# Alpha\n"));
        assert!(alpha.ends_with("alpha body\n"));

        let target = ExportTarget::Dir(out.clone());
        let skill = export_prompts(&prompts[..1], ExportFormat::Skill, &target);
        assert!(skill.ok());
        let alpha = std::fs::read_to_string(out.join("alpha.md")).unwrap();
        assert!(alpha.starts_with("---\nname: alpha\n"));
    }

    #[test]
    fn stdout_target_writes_nothing() {
        let reg = catalog();
        let prompts: Vec<&Prompt> = reg.prompts.iter().collect();
        let report = export_prompts(&prompts, ExportFormat::Md, &ExportTarget::Stdout);
        assert_eq!(report.count, 2);
        assert!(report.output_dir.is_none());
        assert!(report.exported.iter().all(|e| e.file.is_none() && e.content.is_some()));
    }

    #[test]
    fn unsafe_ids_and_missing_prompts_fail_the_export() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = Registry::new(vec![Prompt::new("../up", "Up", "x")]);
        let prompts: Vec<&Prompt> = reg.prompts.iter().collect();

        let mut report =
            export_prompts(&prompts, ExportFormat::Md, &ExportTarget::Dir(tmp.path().into()));
        assert_eq!(report.failed.len(), 1);
        assert!(!report.ok());
        assert!(!tmp.path().parent().unwrap().join("up.md").exists());

        report.failed.clear();
        report.exported.push(Exported {
            id: "x".into(),
            file: None,
            content: None,
        });
        report.missing.push("ghost".into());
        assert!(!report.ok());
    }
}
