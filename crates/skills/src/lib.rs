//! Materializes catalog entries as `SKILL.md` files under an install root,
//! tracking what was written in a per-root manifest so user edits survive
//! repeated syncs.

pub mod diff;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod paths;
pub mod render;
pub mod sync;

pub use {
    error::{Error, Result},
    manifest::{EntryKind, Manifest, ManifestEntry},
    paths::{is_safe_id, resolve_child_path},
    render::{is_generated_by_tool, render_markdown, render_prompt},
    sync::{
        BatchCounts, BatchReport, EntryResult, InstalledSkill, InstalledState, Outcome, Selection,
        SkillArtifact, SkillSyncer, SyncOptions,
    },
};
