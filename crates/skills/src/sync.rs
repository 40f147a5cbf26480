//! Install, update and uninstall generated skills under one install root.
//!
//! Every batch runs in two phases. The plan phase renders content, hashes it
//! and decides an outcome for each entry without writing anything. The apply
//! phase performs the planned writes and deletes, then persists the manifest
//! once. A failure on one entry is recorded on that entry and never aborts
//! the batch.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use {
    chrono::Utc,
    jfp_common::fs::write_atomic,
    jfp_registry::{Bundle, Prompt, Registry},
    serde::Serialize,
    tracing::{debug, info, warn},
};

use crate::{
    diff::{format_diff, line_diff},
    error::Result,
    hash::{content_hash, file_hash},
    manifest::{
        EntryKind, Manifest, ManifestEntry, check_skill_modification, create_empty_manifest,
        read_manifest, write_manifest,
    },
    paths::{is_safe_id, skill_file_path},
    render::{is_generated_by_tool, render_bundle, render_prompt},
};

pub const REASON_NOT_FOUND_ON_DISK: &str = "not found on disk";
pub const REASON_NOT_GENERATED: &str = "not generated by this tool";
pub const REASON_USER_MODIFIED: &str = "user modifications detected";
pub const REASON_REMOVED_UPSTREAM: &str = "no longer in registry";
pub const REASON_UNKNOWN_ID: &str = "not found in registry";
pub const REASON_NOT_INSTALLED: &str = "not installed";
pub const REASON_UNSAFE_ID: &str = "unsafe skill id";
pub const REASON_ADOPTED: &str = "existing file matches, now tracked";

// ── Inputs ──────────────────────────────────────────────────────────────────

/// Rendered content for one catalog entry, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillArtifact {
    pub id: String,
    pub kind: EntryKind,
    pub version: String,
    pub content: String,
}

impl SkillArtifact {
    pub fn from_prompt(prompt: &Prompt) -> Self {
        Self {
            id: prompt.id.clone(),
            kind: EntryKind::Single,
            version: prompt.version_or_default().to_string(),
            content: render_prompt(prompt),
        }
    }

    pub fn from_bundle(bundle: &Bundle, registry: &Registry) -> Self {
        Self {
            id: bundle.id.clone(),
            kind: EntryKind::Bundle,
            version: bundle.version_or_default().to_string(),
            content: render_bundle(bundle, &registry.prompts_for_bundle(bundle)),
        }
    }

    /// Current artifact for a tracked entry, `None` when upstream dropped it.
    pub fn lookup(registry: &Registry, id: &str, kind: EntryKind) -> Option<Self> {
        match kind {
            EntryKind::Single => registry.get_prompt(id).map(Self::from_prompt),
            EntryKind::Bundle => registry
                .get_bundle(id)
                .map(|b| Self::from_bundle(b, registry)),
        }
    }
}

/// Which catalog entries an install applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Prompt ids, falling back to bundle ids.
    Ids(Vec<String>),
    /// Every prompt in the catalog.
    All,
    /// One bundle, installed as a single combined skill.
    Bundle(String),
}

impl Selection {
    /// Resolve against `registry`. Unknown ids come back as `Err(id)`;
    /// duplicates are dropped.
    pub fn resolve(&self, registry: &Registry) -> Vec<std::result::Result<SkillArtifact, String>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        match self {
            Self::Ids(ids) => {
                for id in ids {
                    if !seen.insert(id.as_str()) {
                        continue;
                    }
                    let found = registry
                        .get_prompt(id)
                        .map(SkillArtifact::from_prompt)
                        .or_else(|| {
                            registry
                                .get_bundle(id)
                                .map(|b| SkillArtifact::from_bundle(b, registry))
                        });
                    out.push(found.ok_or_else(|| id.clone()));
                }
            },
            Self::All => {
                for prompt in &registry.prompts {
                    if seen.insert(prompt.id.as_str()) {
                        out.push(Ok(SkillArtifact::from_prompt(prompt)));
                    }
                }
            },
            Self::Bundle(id) => out.push(
                registry
                    .get_bundle(id)
                    .map(|b| SkillArtifact::from_bundle(b, registry))
                    .ok_or_else(|| id.clone()),
            ),
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Overwrite or delete files even when they were edited or are foreign.
    pub force: bool,
    /// Decide everything, write nothing.
    pub dry_run: bool,
    /// Attach a line diff to `updated` results.
    pub diff: bool,
}

// ── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Installed,
    Updated,
    Unchanged,
    Skipped,
    Failed,
    Removed,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryResult {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntryKind>,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

impl EntryResult {
    fn new(id: &str, kind: Option<EntryKind>, outcome: Outcome) -> Self {
        Self {
            id: id.to_string(),
            kind,
            outcome,
            reason: None,
            path: None,
            diff: None,
        }
    }

    fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    fn path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }

    /// Skipped to protect a file the user edited or did not get from us.
    pub fn is_protected_skip(&self) -> bool {
        self.outcome == Outcome::Skipped
            && matches!(
                self.reason.as_deref(),
                Some(REASON_USER_MODIFIED | REASON_NOT_GENERATED)
            )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub installed: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub root: PathBuf,
    pub dry_run: bool,
    pub results: Vec<EntryResult>,
    pub counts: BatchCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_warning: Option<String>,
}

impl BatchReport {
    fn new(root: &Path, dry_run: bool, results: Vec<EntryResult>) -> Self {
        let mut counts = BatchCounts::default();
        for r in &results {
            match r.outcome {
                Outcome::Installed => counts.installed += 1,
                Outcome::Updated => counts.updated += 1,
                Outcome::Unchanged => counts.unchanged += 1,
                Outcome::Skipped => counts.skipped += 1,
                Outcome::Failed => counts.failed += 1,
                Outcome::Removed => counts.removed += 1,
            }
        }
        Self {
            root: root.to_path_buf(),
            dry_run,
            results,
            counts,
            manifest_warning: None,
        }
    }

    pub fn get(&self, id: &str) -> Option<&EntryResult> {
        self.results.iter().find(|r| r.id == id)
    }

    /// False when anything failed, a protected file blocked a change or the
    /// manifest could not be saved.
    pub fn exit_ok(&self) -> bool {
        self.counts.failed == 0
            && self.manifest_warning.is_none()
            && !self.results.iter().any(EntryResult::is_protected_skip)
    }
}

/// State of one tracked skill on disk, for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstalledState {
    Ok,
    Modified,
    Missing,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstalledSkill {
    #[serde(flatten)]
    pub entry: ManifestEntry,
    pub path: PathBuf,
    pub state: InstalledState,
}

// ── Planning ────────────────────────────────────────────────────────────────

enum Action {
    None,
    /// Write content (unless dry run) and record `entry`.
    Write {
        path: PathBuf,
        content: String,
        entry: ManifestEntry,
    },
    /// Record `entry` without touching the file.
    Track(ManifestEntry),
    /// Delete the file (if present) and forget the entry.
    Delete { path: PathBuf, id: String },
}

struct Planned {
    result: EntryResult,
    action: Action,
}

impl Planned {
    fn only(result: EntryResult) -> Self {
        Self {
            result,
            action: Action::None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Install,
    Update,
}

// ── Syncer ──────────────────────────────────────────────────────────────────

/// Synchronizes one install root (`<root>/manifest.json` + `<root>/<id>/SKILL.md`).
#[derive(Debug, Clone)]
pub struct SkillSyncer {
    root: PathBuf,
    tool_version: String,
}

impl SkillSyncer {
    pub fn new(root: impl Into<PathBuf>, tool_version: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            tool_version: tool_version.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The manifest on disk, or an empty one when missing or corrupt.
    pub fn manifest(&self) -> Manifest {
        read_manifest(&self.root).unwrap_or_else(|| create_empty_manifest(&self.tool_version))
    }

    /// Resolve `selection` against `registry` and install the result.
    pub fn install_selection(
        &self,
        registry: &Registry,
        selection: &Selection,
        opts: SyncOptions,
    ) -> BatchReport {
        let mut manifest = self.manifest();
        let plans = selection
            .resolve(registry)
            .into_iter()
            .map(|resolved| match resolved {
                Ok(artifact) => self.plan_write(&manifest, artifact, Mode::Install, opts),
                Err(id) => Planned::only(
                    EntryResult::new(&id, None, Outcome::Failed).reason(REASON_UNKNOWN_ID),
                ),
            })
            .collect();
        self.apply(&mut manifest, plans, opts)
    }

    pub fn install(&self, artifacts: Vec<SkillArtifact>, opts: SyncOptions) -> BatchReport {
        let mut manifest = self.manifest();
        let plans = artifacts
            .into_iter()
            .map(|a| self.plan_write(&manifest, a, Mode::Install, opts))
            .collect();
        self.apply(&mut manifest, plans, opts)
    }

    /// Bring every tracked entry up to date with `registry`, in manifest order.
    pub fn update(&self, registry: &Registry, opts: SyncOptions) -> BatchReport {
        let mut manifest = self.manifest();
        let plans = manifest
            .entries
            .iter()
            .map(
                |entry| match SkillArtifact::lookup(registry, &entry.id, entry.kind) {
                    Some(artifact) => self.plan_write(&manifest, artifact, Mode::Update, opts),
                    None => Planned::only(
                        EntryResult::new(&entry.id, Some(entry.kind), Outcome::Skipped)
                            .reason(REASON_REMOVED_UPSTREAM),
                    ),
                },
            )
            .collect();
        self.apply(&mut manifest, plans, opts)
    }

    pub fn uninstall(&self, ids: &[String], opts: SyncOptions) -> BatchReport {
        let mut manifest = self.manifest();
        let mut seen = HashSet::new();
        let plans = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .map(|id| self.plan_delete(&manifest, id, opts))
            .collect();
        self.apply(&mut manifest, plans, opts)
    }

    /// Tracked skills with their on-disk state.
    pub fn installed(&self) -> Vec<InstalledSkill> {
        let manifest = self.manifest();
        manifest
            .entries
            .into_iter()
            .filter_map(|entry| {
                let path = skill_file_path(&self.root, &entry.id).ok()?;
                let state = match file_hash(&path) {
                    Ok(Some(hash)) if hash == entry.hash => InstalledState::Ok,
                    Ok(Some(_)) => InstalledState::Modified,
                    Ok(None) | Err(_) => InstalledState::Missing,
                };
                Some(InstalledSkill { entry, path, state })
            })
            .collect()
    }

    fn plan_write(
        &self,
        manifest: &Manifest,
        artifact: SkillArtifact,
        mode: Mode,
        opts: SyncOptions,
    ) -> Planned {
        let kind = Some(artifact.kind);
        if !is_safe_id(&artifact.id) {
            warn!(id = %artifact.id, "refusing unsafe skill id");
            return Planned::only(
                EntryResult::new(&artifact.id, kind, Outcome::Failed).reason(REASON_UNSAFE_ID),
            );
        }
        let id = artifact.id.clone();
        match self.decide_write(manifest, artifact, mode, opts) {
            Ok(planned) => planned,
            Err(e) => {
                warn!(id = %id, error = %e, "cannot plan skill write");
                Planned::only(EntryResult::new(&id, kind, Outcome::Failed).reason(e.to_string()))
            },
        }
    }

    fn decide_write(
        &self,
        manifest: &Manifest,
        artifact: SkillArtifact,
        mode: Mode,
        opts: SyncOptions,
    ) -> Result<Planned> {
        let path = skill_file_path(&self.root, &artifact.id)?;
        let kind = Some(artifact.kind);
        let new_hash = content_hash(&artifact.content);
        let on_disk = file_hash(&path)?;
        let result = |outcome| EntryResult::new(&artifact.id, kind, outcome).path(&path);

        let Some(prev) = manifest.get(&artifact.id) else {
            // Untracked: only ever written when nothing is there, or forced.
            return Ok(match on_disk {
                None => self.planned_write(result(Outcome::Installed), &path, artifact, new_hash),
                Some(existing) if existing == new_hash => Planned {
                    result: result(Outcome::Installed).reason(REASON_ADOPTED),
                    action: Action::Track(self.entry_for(&artifact, new_hash)),
                },
                Some(_) if opts.force => {
                    self.planned_write(result(Outcome::Installed), &path, artifact, new_hash)
                },
                Some(_) => Planned::only(result(Outcome::Skipped).reason(REASON_NOT_GENERATED)),
            });
        };

        // An explicit install restores a deleted file; an update leaves it alone.
        if on_disk.is_none() && mode == Mode::Install {
            return Ok(self.planned_write(result(Outcome::Installed), &path, artifact, new_hash));
        }

        if prev.hash == new_hash {
            return Ok(Planned::only(result(Outcome::Unchanged)));
        }

        // Written by an earlier batch whose manifest write failed.
        if on_disk.as_deref() == Some(new_hash.as_str()) {
            debug!(id = %artifact.id, "file already matches render, refreshing manifest entry");
            return Ok(Planned {
                result: result(Outcome::Updated).reason(REASON_ADOPTED),
                action: Action::Track(self.entry_for(&artifact, new_hash)),
            });
        }

        if on_disk.is_none() {
            return Ok(Planned::only(
                result(Outcome::Skipped).reason(REASON_NOT_FOUND_ON_DISK),
            ));
        }

        if !opts.force {
            if !is_generated_by_tool(&path) {
                return Ok(Planned::only(
                    result(Outcome::Skipped).reason(REASON_NOT_GENERATED),
                ));
            }
            if check_skill_modification(&self.root, &artifact.id, Some(manifest))?.was_modified {
                return Ok(Planned::only(
                    result(Outcome::Skipped).reason(REASON_USER_MODIFIED),
                ));
            }
        }

        let mut updated = result(Outcome::Updated);
        if opts.diff {
            let old = std::fs::read_to_string(&path)?;
            updated.diff = Some(format_diff(&line_diff(&old, &artifact.content)));
        }
        Ok(self.planned_write(updated, &path, artifact, new_hash))
    }

    fn plan_delete(&self, manifest: &Manifest, id: &str, opts: SyncOptions) -> Planned {
        if !is_safe_id(id) {
            return Planned::only(
                EntryResult::new(id, None, Outcome::Failed).reason(REASON_UNSAFE_ID),
            );
        }
        let Some(entry) = manifest.get(id) else {
            return Planned::only(
                EntryResult::new(id, None, Outcome::Skipped).reason(REASON_NOT_INSTALLED),
            );
        };
        let kind = Some(entry.kind);
        let decided = skill_file_path(&self.root, id).and_then(|path| {
            let check = check_skill_modification(&self.root, id, Some(manifest))?;
            Ok((path, check))
        });
        match decided {
            Ok((_, check)) if check.was_modified && !opts.force => Planned::only(
                EntryResult::new(id, kind, Outcome::Skipped).reason(REASON_USER_MODIFIED),
            ),
            Ok((path, _)) => Planned {
                result: EntryResult::new(id, kind, Outcome::Removed).path(&path),
                action: Action::Delete {
                    path,
                    id: id.to_string(),
                },
            },
            Err(e) => Planned::only(
                EntryResult::new(id, kind, Outcome::Failed).reason(e.to_string()),
            ),
        }
    }

    fn entry_for(&self, artifact: &SkillArtifact, hash: String) -> ManifestEntry {
        ManifestEntry {
            id: artifact.id.clone(),
            kind: artifact.kind,
            version: artifact.version.clone(),
            hash,
            updated_at: Utc::now(),
        }
    }

    fn planned_write(
        &self,
        result: EntryResult,
        path: &Path,
        artifact: SkillArtifact,
        hash: String,
    ) -> Planned {
        let entry = self.entry_for(&artifact, hash);
        Planned {
            result,
            action: Action::Write {
                path: path.to_path_buf(),
                content: artifact.content,
                entry,
            },
        }
    }

    // ── Apply ───────────────────────────────────────────────────────────────

    fn apply(
        &self,
        manifest: &mut Manifest,
        plans: Vec<Planned>,
        opts: SyncOptions,
    ) -> BatchReport {
        let mut results = Vec::with_capacity(plans.len());
        let mut dirty = false;

        for Planned { mut result, action } in plans {
            if opts.dry_run {
                results.push(result);
                continue;
            }
            match action {
                Action::None => {},
                Action::Write {
                    path,
                    content,
                    entry,
                } => match write_atomic(&path, content.as_bytes()) {
                    Ok(()) => {
                        debug!(id = %entry.id, path = %path.display(), "skill written");
                        manifest.upsert(entry);
                        dirty = true;
                    },
                    Err(e) => {
                        warn!(
                            id = %result.id,
                            path = %path.display(),
                            error = %e,
                            "skill write failed"
                        );
                        result.outcome = Outcome::Failed;
                        result.reason = Some(e.to_string());
                        result.diff = None;
                    },
                },
                Action::Track(entry) => {
                    manifest.upsert(entry);
                    dirty = true;
                },
                Action::Delete { path, id } => match remove_skill_file(&path) {
                    Ok(()) => {
                        debug!(id = %id, path = %path.display(), "skill removed");
                        manifest.remove(&id);
                        dirty = true;
                    },
                    Err(e) => {
                        warn!(id = %id, path = %path.display(), error = %e, "skill removal failed");
                        result.outcome = Outcome::Failed;
                        result.reason = Some(e.to_string());
                    },
                },
            }
            results.push(result);
        }

        let mut report = BatchReport::new(&self.root, opts.dry_run, results);
        if dirty {
            manifest.tool_version = self.tool_version.clone();
            if let Err(e) = write_manifest(&self.root, manifest) {
                warn!(root = %self.root.display(), error = %e, "manifest write failed");
                report.manifest_warning =
                    Some(format!("files written but manifest may be out of sync: {e}"));
            }
        }
        info!(
            root = %self.root.display(),
            dry_run = opts.dry_run,
            installed = report.counts.installed,
            updated = report.counts.updated,
            unchanged = report.counts.unchanged,
            skipped = report.counts.skipped,
            failed = report.counts.failed,
            removed = report.counts.removed,
            "skill batch finished"
        );
        report
    }
}

/// Delete the artifact, then its directory when that leaves it empty.
fn remove_skill_file(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {},
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => return Err(e),
    }
    if let Some(dir) = path.parent() {
        // Non-empty directories keep the user's other files.
        let _ = std::fs::remove_dir(dir);
    }
    Ok(())
}
