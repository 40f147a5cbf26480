//! Stale-while-revalidate catalog loading.
//!
//! Resolution order: warm cache (returned immediately, refreshed in the
//! background when stale), then a blocking conditional fetch, then the bundled
//! snapshot. None of the read paths return an error; problems are reported as
//! warnings on the result.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use {
    chrono::Utc,
    jfp_config::JfpConfig,
    serde::Serialize,
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
};

use crate::{
    cache::{RegistryCache, is_stale},
    client::{CatalogClient, FetchOutcome},
    embedded::bundled_registry,
    error::Result,
    library::{LIBRARY_FILE, read_library},
    local::load_local_prompts,
    types::{CacheMeta, Registry, RegistrySource},
};

/// A loaded catalog plus where it came from.
#[derive(Debug)]
pub struct RegistryLoadResult {
    pub registry: Registry,
    pub source: RegistrySource,
    /// The returned data is older than the configured TTL.
    pub stale: bool,
    /// Number of prompts merged from the local prompts directory.
    pub local_count: usize,
    pub warnings: Vec<String>,
    /// Set when a stale warm cache triggered a refresh.
    pub background_refresh: Option<BackgroundRefresh>,
}

/// What a background refresh ended up doing.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub source: RegistrySource,
    pub prompt_count: usize,
    pub warnings: Vec<String>,
}

/// Handle to a detached refresh. Dropping it leaves the task running.
#[derive(Debug)]
pub struct BackgroundRefresh {
    handle: JoinHandle<RefreshSummary>,
    timeout: Duration,
}

impl BackgroundRefresh {
    /// Wait for the refresh, at most the configured request timeout plus a
    /// small grace period. Returns `None` when it did not finish in time.
    pub async fn finish(self) -> Option<RefreshSummary> {
        let budget = self.timeout + Duration::from_millis(250);
        let mut handle = self.handle;
        match tokio::time::timeout(budget, &mut handle).await {
            Ok(Ok(summary)) => Some(summary),
            Ok(Err(e)) => {
                warn!(error = %e, "background refresh task failed");
                None
            },
            Err(_) => {
                debug!("background refresh still running, abandoning");
                handle.abort();
                None
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatus {
    pub url: String,
    pub cache_dir: PathBuf,
    pub cached: bool,
    pub meta: Option<CacheMeta>,
    pub age_secs: Option<i64>,
    pub stale: bool,
    pub ttl_secs: u64,
    pub auto_refresh: bool,
    pub library_path: Option<PathBuf>,
    pub library_prompts: Option<usize>,
    pub local_dir: Option<PathBuf>,
}

struct CatalogOutcome {
    registry: Registry,
    source: RegistrySource,
    stale: bool,
    warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RegistryLoader {
    client: CatalogClient,
    cache: RegistryCache,
    cache_dir: PathBuf,
    local_dir: Option<PathBuf>,
    auto_refresh: bool,
    ttl_secs: u64,
    timeout: Duration,
}

impl RegistryLoader {
    pub fn new(config: &JfpConfig, tool_version: &str) -> Result<Self> {
        let cache_dir = config.registry.resolved_cache_dir();
        let timeout = Duration::from_millis(config.registry.timeout_ms);
        Ok(Self {
            client: CatalogClient::new(config.registry.url.clone(), timeout, tool_version)?,
            cache: RegistryCache::new(&cache_dir),
            local_dir: config
                .local_prompts
                .enabled
                .then(|| config.local_prompts.resolved_dir()),
            cache_dir,
            auto_refresh: config.registry.auto_refresh,
            ttl_secs: config.registry.cache_ttl_secs,
            timeout,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Load the catalog without ever blocking on the network when a usable
    /// cache exists.
    pub async fn load(&self) -> RegistryLoadResult {
        let outcome = match self.cache.read() {
            Some((registry, meta)) => {
                let stale = is_stale(&meta, self.ttl_secs);
                let background_refresh = (stale && self.auto_refresh).then(|| self.spawn_refresh());
                debug!(
                    prompts = registry.prompts.len(),
                    stale,
                    refreshing = background_refresh.is_some(),
                    "serving catalog from cache"
                );
                return self.finish(
                    CatalogOutcome {
                        registry,
                        source: RegistrySource::Cache,
                        stale,
                        warnings: Vec::new(),
                    },
                    background_refresh,
                );
            },
            None => self.fetch_catalog(None).await,
        };
        self.finish(outcome, None)
    }

    /// Revalidate the catalog now. Falls back like [`Self::load`] on failure.
    pub async fn refresh(&self) -> RegistryLoadResult {
        let cached = self.cache.read();
        let outcome = self.fetch_catalog(cached).await;
        self.finish(outcome, None)
    }

    pub fn status(&self) -> RegistryStatus {
        let cached = self.cache.read();
        let meta = cached
            .as_ref()
            .map(|(_, meta)| meta.clone())
            .or_else(|| self.cache.read_meta());
        let library = read_library(&self.cache_dir);
        RegistryStatus {
            url: self.client.url().to_string(),
            cache_dir: self.cache_dir.clone(),
            cached: cached.is_some(),
            age_secs: meta
                .as_ref()
                .map(|m| Utc::now().signed_duration_since(m.fetched_at).num_seconds()),
            stale: meta.as_ref().is_none_or(|m| is_stale(m, self.ttl_secs)),
            meta,
            ttl_secs: self.ttl_secs,
            auto_refresh: self.auto_refresh,
            library_path: library
                .as_ref()
                .map(|_| self.cache_dir.join(LIBRARY_FILE)),
            library_prompts: library.map(|l| l.prompts.len()),
            local_dir: self.local_dir.clone(),
        }
    }

    fn spawn_refresh(&self) -> BackgroundRefresh {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let cached = this.cache.read();
            let outcome = this.fetch_catalog(cached).await;
            RefreshSummary {
                source: outcome.source,
                prompt_count: outcome.registry.prompts.len(),
                warnings: outcome.warnings,
            }
        });
        BackgroundRefresh {
            handle,
            timeout: self.timeout,
        }
    }

    /// Conditional fetch against the endpoint, degrading to `cached` and then
    /// to the bundled snapshot.
    async fn fetch_catalog(&self, cached: Option<(Registry, CacheMeta)>) -> CatalogOutcome {
        let etag = cached.as_ref().and_then(|(_, meta)| meta.etag.as_deref());
        let mut warnings = Vec::new();

        match self.client.fetch(etag).await {
            Ok(FetchOutcome::Modified { registry, etag }) => {
                if let Err(e) = self.cache.write(&registry, etag) {
                    warn!(
                        dir = %self.cache_dir.display(),
                        error = %e,
                        "cannot write registry cache"
                    );
                    warnings.push(format!("catalog fetched but cache not saved: {e}"));
                }
                info!(prompts = registry.prompts.len(), "catalog fetched");
                return CatalogOutcome {
                    registry,
                    source: RegistrySource::Remote,
                    stale: false,
                    warnings,
                };
            },
            Ok(FetchOutcome::NotModified) => {
                if let Some((registry, _)) = cached {
                    if let Err(e) = self.cache.touch() {
                        warn!(error = %e, "cannot update registry cache timestamp");
                    }
                    debug!("catalog not modified");
                    return CatalogOutcome {
                        registry,
                        source: RegistrySource::Cache,
                        stale: false,
                        warnings,
                    };
                }
                warnings.push("catalog reported not modified but no cache is available".into());
            },
            Err(e) => {
                warn!(url = %self.client.url(), error = %e, "catalog fetch failed");
                warnings.push(format!("could not refresh catalog: {e}"));
            },
        }

        match cached {
            Some((registry, meta)) => CatalogOutcome {
                registry,
                source: RegistrySource::Cache,
                stale: is_stale(&meta, self.ttl_secs),
                warnings,
            },
            None => {
                warnings.push("using the bundled catalog snapshot".into());
                CatalogOutcome {
                    registry: bundled_registry(),
                    source: RegistrySource::Bundled,
                    stale: true,
                    warnings,
                }
            },
        }
    }

    /// Layer the downloaded library and local prompts over the catalog.
    fn finish(
        &self,
        outcome: CatalogOutcome,
        background_refresh: Option<BackgroundRefresh>,
    ) -> RegistryLoadResult {
        let CatalogOutcome {
            mut registry,
            source,
            stale,
            warnings,
        } = outcome;

        if let Some(library) = read_library(&self.cache_dir) {
            let merged = registry.merge_prompts(library.prompts);
            registry.merge_bundles(library.bundles);
            debug!(merged, "merged library prompts");
        }

        let local_count = match &self.local_dir {
            Some(dir) => {
                let local = load_local_prompts(dir);
                registry.merge_prompts(local)
            },
            None => 0,
        };

        RegistryLoadResult {
            registry,
            source,
            stale,
            local_count,
            warnings,
            background_refresh,
        }
    }
}
