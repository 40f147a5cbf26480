//! Payload + metadata cache files for the catalog.

use std::path::{Path, PathBuf};

use {
    chrono::{DateTime, Utc},
    jfp_common::fs::write_atomic,
    tracing::warn,
};

use crate::{
    error::{Context, Result},
    types::{CacheMeta, PayloadShape, Registry},
};

pub const PAYLOAD_FILE: &str = "registry.json";
pub const META_FILE: &str = "registry.meta.json";

/// The two cache files in one directory.
#[derive(Debug, Clone)]
pub struct RegistryCache {
    payload_path: PathBuf,
    meta_path: PathBuf,
}

impl RegistryCache {
    pub fn new(dir: &Path) -> Self {
        Self {
            payload_path: dir.join(PAYLOAD_FILE),
            meta_path: dir.join(META_FILE),
        }
    }

    pub fn payload_path(&self) -> &Path {
        &self.payload_path
    }

    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }

    /// Best-effort read of payload + meta.
    ///
    /// `None` when the payload is missing, unparsable or has no prompts. A
    /// missing or corrupt meta file does not invalidate the payload; the cache
    /// is then reported as fetched at the epoch, i.e. stale, with no ETag.
    pub fn read(&self) -> Option<(Registry, CacheMeta)> {
        let raw = match std::fs::read_to_string(&self.payload_path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        path = %self.payload_path.display(),
                        error = %e,
                        "cannot read registry cache"
                    );
                }
                return None;
            },
        };
        let registry: Registry = match serde_json::from_str::<PayloadShape>(&raw) {
            Ok(shape) => shape.into(),
            Err(e) => {
                warn!(
                    path = %self.payload_path.display(),
                    error = %e,
                    "ignoring corrupt registry cache"
                );
                return None;
            },
        };
        if registry.prompts.is_empty() {
            return None;
        }

        let meta = self.read_meta().unwrap_or_else(|| CacheMeta {
            version: registry.version.clone(),
            etag: None,
            fetched_at: DateTime::<Utc>::UNIX_EPOCH,
            prompt_count: registry.prompts.len(),
        });
        Some((registry, meta))
    }

    pub fn read_meta(&self) -> Option<CacheMeta> {
        let raw = std::fs::read_to_string(&self.meta_path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(
                    path = %self.meta_path.display(),
                    error = %e,
                    "ignoring corrupt registry meta"
                );
                None
            },
        }
    }

    /// Overwrite both files. Payload first, so a crash in between leaves a
    /// new payload with old meta (worst case: one extra full fetch).
    pub fn write(&self, registry: &Registry, etag: Option<String>) -> Result<CacheMeta> {
        write_atomic(&self.payload_path, &serde_json::to_vec_pretty(registry)?)
            .with_context(|| format!("cannot write {}", self.payload_path.display()))?;
        let meta = CacheMeta {
            version: registry.version.clone(),
            etag,
            fetched_at: Utc::now(),
            prompt_count: registry.prompts.len(),
        };
        self.write_meta(&meta)?;
        Ok(meta)
    }

    /// Bump `fetched_at` on an existing meta file, keeping ETag and payload.
    pub fn touch(&self) -> Result<Option<CacheMeta>> {
        let Some(mut meta) = self.read_meta() else {
            return Ok(None);
        };
        meta.fetched_at = Utc::now();
        self.write_meta(&meta)?;
        Ok(Some(meta))
    }

    fn write_meta(&self, meta: &CacheMeta) -> Result<()> {
        write_atomic(&self.meta_path, &serde_json::to_vec_pretty(meta)?)
            .with_context(|| format!("cannot write {}", self.meta_path.display()))?;
        Ok(())
    }
}

/// Whether a cache fetched at `fetched_at` is older than `ttl_secs`.
pub fn is_stale(meta: &CacheMeta, ttl_secs: u64) -> bool {
    let age = Utc::now().signed_duration_since(meta.fetched_at);
    age.num_seconds() > i64::try_from(ttl_secs).unwrap_or(i64::MAX)
}
