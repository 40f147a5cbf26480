//! Per-root ledger of generated skills and their content hashes.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use {
    chrono::{DateTime, Utc},
    jfp_common::fs::write_atomic,
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

use crate::{
    error::{Context, Result},
    hash::file_hash,
    paths::{is_safe_id, skill_file_path},
};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Single,
    Bundle,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Bundle => write!(f, "bundle"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: String,
    pub kind: EntryKind,
    /// Catalog version of the entry when it was written.
    pub version: String,
    /// SHA-256 of the content written to disk.
    pub hash: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: u32,
    /// Version of the tool that last wrote this manifest.
    pub tool_version: String,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn get(&self, id: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Replace the entry with the same id in place, or append.
    pub fn upsert(&mut self, entry: ManifestEntry) {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<ManifestEntry> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(idx))
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.version != MANIFEST_SCHEMA_VERSION {
            return Err(format!("unsupported manifest version {}", self.version));
        }
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !is_safe_id(&entry.id) {
                return Err(format!("unsafe id '{}'", entry.id));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(format!("duplicate id '{}'", entry.id));
            }
            if entry.hash.len() != 64 || !entry.hash.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(format!("malformed hash for '{}'", entry.id));
            }
        }
        Ok(())
    }
}

pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE)
}

/// Read and validate `<root>/manifest.json`.
///
/// Missing, unparsable and schema-invalid manifests all read as `None`;
/// callers treat that as "nothing installed".
pub fn read_manifest(root: &Path) -> Option<Manifest> {
    let path = manifest_path(root);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "cannot read manifest");
            }
            return None;
        },
    };
    let manifest: Manifest = match serde_json::from_str(&raw) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring corrupt manifest");
            return None;
        },
    };
    if let Err(reason) = manifest.validate() {
        warn!(path = %path.display(), reason = %reason, "ignoring invalid manifest");
        return None;
    }
    Some(manifest)
}

pub fn create_empty_manifest(tool_version: &str) -> Manifest {
    Manifest {
        version: MANIFEST_SCHEMA_VERSION,
        tool_version: tool_version.to_string(),
        entries: Vec::new(),
    }
}

/// Copy of `manifest` with `entry` replacing any entry of the same id.
pub fn upsert_manifest_entry(manifest: &Manifest, entry: ManifestEntry) -> Manifest {
    let mut next = manifest.clone();
    next.upsert(entry);
    next
}

/// Copy of `manifest` without `id`.
pub fn remove_manifest_entry(manifest: &Manifest, id: &str) -> Manifest {
    let mut next = manifest.clone();
    next.remove(id);
    next
}

/// Persist via temp file + rename; creates `root` when missing.
pub fn write_manifest(root: &Path, manifest: &Manifest) -> Result<()> {
    let path = manifest_path(root);
    let mut data = serde_json::to_vec_pretty(manifest)?;
    data.push(b'\n');
    write_atomic(&path, &data).with_context(|| format!("cannot write {}", path.display()))?;
    debug!(path = %path.display(), entries = manifest.entries.len(), "manifest written");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationCheck {
    pub was_modified: bool,
    pub can_overwrite: bool,
}

/// Compare the on-disk artifact for `id` against the manifest hash.
///
/// | file | manifest entry | result |
/// |------|----------------|--------|
/// | absent | any | not modified, overwritable |
/// | present | absent | treated as foreign: modified, not overwritable |
/// | present | present | modified iff hashes differ |
pub fn check_skill_modification(
    root: &Path,
    id: &str,
    manifest: Option<&Manifest>,
) -> Result<ModificationCheck> {
    let path = skill_file_path(root, id)?;
    let Some(on_disk) = file_hash(&path)? else {
        return Ok(ModificationCheck {
            was_modified: false,
            can_overwrite: true,
        });
    };
    let check = match manifest.and_then(|m| m.get(id)) {
        Some(entry) => {
            let was_modified = entry.hash != on_disk;
            ModificationCheck {
                was_modified,
                can_overwrite: !was_modified,
            }
        },
        None => ModificationCheck {
            was_modified: true,
            can_overwrite: false,
        },
    };
    Ok(check)
}
