//! Authenticated full-library download, serialized by an advisory lock.

use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
    time::Duration,
};

use {
    fd_lock::RwLock,
    jfp_common::fs::write_atomic,
    reqwest::{
        StatusCode,
        header::{ACCEPT, USER_AGENT},
    },
    secrecy::{ExposeSecret, Secret},
    serde::Serialize,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Context, Error, Result},
    types::{PayloadShape, Registry},
};

pub const LIBRARY_FILE: &str = "library.json";
pub const LIBRARY_LOCK_FILE: &str = "library.lock";

/// Environment variable read by [`EnvAuthorizer`].
pub const TOKEN_ENV: &str = "JFP_TOKEN";

/// Gate deciding whether the caller may download the full library.
pub trait Authorizer: Send + Sync {
    fn access_token(&self) -> Option<Secret<String>>;
}

/// Reads the bearer token from `JFP_TOKEN`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvAuthorizer;

impl Authorizer for EnvAuthorizer {
    fn access_token(&self) -> Option<Secret<String>> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(Secret::new)
    }
}

/// Fixed token, mostly for tests and embedding.
pub struct StaticAuthorizer(pub Option<Secret<String>>);

impl Authorizer for StaticAuthorizer {
    fn access_token(&self) -> Option<Secret<String>> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryReport {
    pub path: PathBuf,
    pub prompt_count: usize,
    pub bundle_count: usize,
}

pub struct LibrarySync {
    http: reqwest::Client,
    url: String,
    cache_dir: PathBuf,
    user_agent: String,
}

impl LibrarySync {
    pub fn new(
        url: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
        timeout: Duration,
        tool_version: &str,
    ) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .connect_timeout(timeout)
                .build()?,
            url: url.into(),
            cache_dir: cache_dir.into(),
            user_agent: format!("jfp/{tool_version}"),
        })
    }

    pub fn lock_path(&self) -> PathBuf {
        self.cache_dir.join(LIBRARY_LOCK_FILE)
    }

    pub fn library_path(&self) -> PathBuf {
        self.cache_dir.join(LIBRARY_FILE)
    }

    /// Download the library and store it next to the catalog cache.
    ///
    /// Fails fast with [`Error::SyncInProgress`] when another process holds
    /// the lock, and with [`Error::Unauthorized`] when there is no token or
    /// the server refuses it.
    pub async fn download(&self, auth: &dyn Authorizer) -> Result<LibraryReport> {
        let token = auth.access_token().ok_or(Error::Unauthorized)?;

        std::fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("cannot create {}", self.cache_dir.display()))?;
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("cannot open lock file {}", lock_path.display()))?;
        let mut lock = RwLock::new(file);
        let _guard = match lock.try_write() {
            Ok(guard) => guard,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                warn!(lock = %lock_path.display(), "library sync already running");
                return Err(Error::SyncInProgress { lock_path });
            },
            Err(e) => return Err(e.into()),
        };
        debug!(lock = %lock_path.display(), "acquired library lock");

        let resp = self
            .http
            .get(&self.url)
            .bearer_auth(token.expose_secret())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;
        let status = resp.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(Error::Unauthorized);
        }
        if !status.is_success() {
            return Err(Error::http(&self.url, status));
        }

        let body = resp.bytes().await?;
        let registry: Registry = serde_json::from_slice::<PayloadShape>(&body)?.into();
        let path = self.library_path();
        write_atomic(&path, &serde_json::to_vec_pretty(&registry)?)
            .with_context(|| format!("cannot store library at {}", path.display()))?;

        info!(
            path = %path.display(),
            prompts = registry.prompts.len(),
            bundles = registry.bundles.len(),
            "library downloaded"
        );
        Ok(LibraryReport {
            path,
            prompt_count: registry.prompts.len(),
            bundle_count: registry.bundles.len(),
        })
    }
}

/// The previously downloaded library, if any. Corrupt files read as absent.
pub fn read_library(cache_dir: &Path) -> Option<Registry> {
    let path = cache_dir.join(LIBRARY_FILE);
    let raw = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<PayloadShape>(&raw) {
        Ok(shape) => Some(shape.into()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring corrupt library file");
            None
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"prompts":[{"id":"premium","title":"P","content":"x"}],"bundles":[]}"#;

    fn token(t: &str) -> StaticAuthorizer {
        StaticAuthorizer(Some(Secret::new(t.to_string())))
    }

    fn sync_for(url: String, dir: &Path) -> LibrarySync {
        LibrarySync::new(url, dir, Duration::from_secs(2), "0.0.0-test").unwrap()
    }

    #[tokio::test]
    async fn downloads_with_bearer_token() {
        let tmp = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/library")
            .match_header("authorization", "Bearer s3cret")
            .with_status(200)
            .with_body(BODY)
            .create_async()
            .await;

        let sync = sync_for(format!("{}/api/library", server.url()), tmp.path());
        let report = sync.download(&token("s3cret")).await.unwrap();
        mock.assert_async().await;
        assert_eq!(report.prompt_count, 1);
        let lib = read_library(tmp.path()).unwrap();
        assert_eq!(lib.prompts[0].id, "premium");
    }

    #[tokio::test]
    async fn missing_token_fails_before_network() {
        let tmp = tempfile::tempdir().unwrap();
        let sync = sync_for("http://127.0.0.1:1/api/library".into(), tmp.path());
        let err = sync.download(&StaticAuthorizer(None)).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
    }

    #[tokio::test]
    async fn forbidden_maps_to_unauthorized() {
        let tmp = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/library")
            .with_status(403)
            .create_async()
            .await;

        let sync = sync_for(format!("{}/api/library", server.url()), tmp.path());
        let err = sync.download(&token("expired")).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
        assert!(read_library(tmp.path()).is_none());
    }

    #[tokio::test]
    async fn held_lock_fails_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let sync = sync_for("http://127.0.0.1:1/api/library".into(), tmp.path());

        let holder = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(sync.lock_path())
            .unwrap();
        let mut held = RwLock::new(holder);
        let _guard = held.try_write().unwrap();

        let err = sync.download(&token("t")).await.unwrap_err();
        assert!(matches!(err, Error::SyncInProgress { .. }));
    }
}
