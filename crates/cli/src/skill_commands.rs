//! `install`, `update`, `uninstall` and `installed` over the personal and
//! project roots.

use std::path::PathBuf;

use {
    anyhow::{Result, bail},
    clap::Args,
    jfp_config::JfpConfig,
    jfp_skills::{
        BatchReport, InstalledState, Selection, SkillSyncer, SyncOptions, manifest::read_manifest,
    },
    serde::Serialize,
};

use crate::{
    VERSION,
    output::{DIM, GREEN, RED, RESET, YELLOW, print_json, print_report},
    registry_commands::{load, settle},
};

#[derive(Args, Debug, Clone, Copy)]
pub(crate) struct TargetArgs {
    /// Use the project root instead of the personal root.
    #[arg(long, conflicts_with = "personal")]
    pub project: bool,
    /// Use the personal root even when the config prefers the project root.
    #[arg(long)]
    pub personal: bool,
}

#[derive(Args, Debug, Clone, Copy)]
pub(crate) struct SyncArgs {
    /// Overwrite files that were edited or not generated by jfp.
    #[arg(long)]
    pub force: bool,
    /// Show what would change without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RootKind {
    Personal,
    Project,
}

impl RootKind {
    fn label(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Project => "project",
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RootSummary {
    pub label: &'static str,
    pub path: PathBuf,
    pub installed: usize,
}

pub(crate) fn root_path(config: &JfpConfig, kind: RootKind) -> Result<PathBuf> {
    let dir = match kind {
        RootKind::Personal => &config.skills.personal_dir,
        RootKind::Project => &config.skills.project_dir,
    };
    Ok(if dir.is_absolute() {
        dir.clone()
    } else {
        std::env::current_dir()?.join(dir)
    })
}

fn target_root(config: &JfpConfig, target: TargetArgs) -> RootKind {
    if target.project || (config.skills.prefer_project && !target.personal) {
        RootKind::Project
    } else {
        RootKind::Personal
    }
}

fn options(args: SyncArgs, diff: bool) -> SyncOptions {
    SyncOptions {
        force: args.force,
        dry_run: args.dry_run,
        diff,
    }
}

pub(crate) fn selection(ids: Vec<String>, all: bool, bundle: Option<String>) -> Result<Selection> {
    match (all, bundle) {
        (true, _) => Ok(Selection::All),
        (false, Some(id)) => Ok(Selection::Bundle(id)),
        (false, None) if !ids.is_empty() => Ok(Selection::Ids(ids)),
        (false, None) => bail!("nothing selected: pass prompt ids, --all or --bundle <id>"),
    }
}

pub(crate) fn root_summaries(config: &JfpConfig) -> Result<Vec<RootSummary>> {
    [RootKind::Personal, RootKind::Project]
        .into_iter()
        .map(|kind| {
            let path = root_path(config, kind)?;
            let installed = read_manifest(&path).map_or(0, |m| m.entries.len());
            Ok(RootSummary {
                label: kind.label(),
                path,
                installed,
            })
        })
        .collect()
}

fn emit(json: bool, reports: &[(RootKind, BatchReport)]) -> Result<bool> {
    if json {
        #[derive(Serialize)]
        struct Labeled<'a> {
            target: RootKind,
            #[serde(flatten)]
            report: &'a BatchReport,
        }
        let labeled: Vec<_> = reports
            .iter()
            .map(|(target, report)| Labeled {
                target: *target,
                report,
            })
            .collect();
        match labeled.as_slice() {
            [single] => print_json(single)?,
            many => print_json(many)?,
        }
    } else {
        for (kind, report) in reports {
            print_report(kind.label(), report);
        }
    }
    Ok(reports.iter().all(|(_, r)| r.exit_ok()))
}

pub(crate) async fn install(
    config: &JfpConfig,
    json: bool,
    selection: Selection,
    target: TargetArgs,
    args: SyncArgs,
) -> Result<bool> {
    let mut loaded = load(config).await?;
    let kind = target_root(config, target);
    let syncer = SkillSyncer::new(root_path(config, kind)?, VERSION);
    let report = syncer.install_selection(&loaded.registry, &selection, options(args, false));
    settle(loaded.background_refresh.take()).await;
    emit(json, &[(kind, report)])
}

pub(crate) async fn update(
    config: &JfpConfig,
    json: bool,
    project: bool,
    personal: bool,
    args: SyncArgs,
    diff: bool,
) -> Result<bool> {
    let kinds: &[RootKind] = match (project, personal) {
        (true, _) => &[RootKind::Project],
        (false, true) => &[RootKind::Personal],
        (false, false) => &[RootKind::Personal, RootKind::Project],
    };

    let mut loaded = load(config).await?;
    let mut reports = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let syncer = SkillSyncer::new(root_path(config, *kind)?, VERSION);
        reports.push((*kind, syncer.update(&loaded.registry, options(args, diff))));
    }
    settle(loaded.background_refresh.take()).await;
    emit(json, &reports)
}

pub(crate) fn uninstall(
    config: &JfpConfig,
    json: bool,
    ids: &[String],
    target: TargetArgs,
    args: SyncArgs,
) -> Result<bool> {
    let kind = target_root(config, target);
    let syncer = SkillSyncer::new(root_path(config, kind)?, VERSION);
    let report = syncer.uninstall(ids, options(args, false));
    emit(json, &[(kind, report)])
}

pub(crate) fn installed(config: &JfpConfig, json: bool, target: TargetArgs) -> Result<bool> {
    let kind = target_root(config, target);
    let syncer = SkillSyncer::new(root_path(config, kind)?, VERSION);
    let skills = syncer.installed();

    if json {
        print_json(&skills)?;
        return Ok(true);
    }
    if skills.is_empty() {
        println!("No skills installed in {}", syncer.root().display());
        return Ok(true);
    }
    for skill in &skills {
        let (color, state) = match skill.state {
            InstalledState::Ok => (GREEN, "ok"),
            InstalledState::Modified => (YELLOW, "modified"),
            InstalledState::Missing => (RED, "missing"),
        };
        println!(
            "{color}{state:<8}{RESET} {} {DIM}{} v{}{RESET}",
            skill.entry.id, skill.entry.kind, skill.entry.version
        );
    }
    Ok(true)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_prefers_all_then_bundle_then_ids() {
        assert_eq!(
            selection(vec!["a".into()], true, None).unwrap(),
            Selection::All
        );
        assert_eq!(
            selection(vec![], false, Some("pack".into())).unwrap(),
            Selection::Bundle("pack".into())
        );
        assert_eq!(
            selection(vec!["a".into()], false, None).unwrap(),
            Selection::Ids(vec!["a".into()])
        );
        assert!(selection(vec![], false, None).is_err());
    }

    #[test]
    fn prefer_project_is_overridable() {
        let mut config = JfpConfig::default();
        let none = TargetArgs {
            project: false,
            personal: false,
        };
        assert_eq!(target_root(&config, none), RootKind::Personal);

        config.skills.prefer_project = true;
        assert_eq!(target_root(&config, none), RootKind::Project);
        assert_eq!(
            target_root(&config, TargetArgs {
                project: false,
                personal: true,
            }),
            RootKind::Personal
        );
    }

    #[test]
    fn relative_project_root_resolves_against_cwd() {
        let config = JfpConfig::default();
        let root = root_path(&config, RootKind::Project).unwrap();
        assert!(root.is_absolute());
        assert!(root.ends_with(".claude/skills"));
    }
}
