//! Conditional-GET client for the catalog endpoint.

use std::time::Duration;

use {
    reqwest::{
        StatusCode,
        header::{ACCEPT, ETAG, IF_NONE_MATCH, USER_AGENT},
    },
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    types::{PayloadShape, Registry},
};

/// Outcome of a conditional fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    Modified {
        registry: Registry,
        etag: Option<String>,
    },
    NotModified,
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    url: String,
    user_agent: String,
}

impl CatalogClient {
    pub fn new(url: impl Into<String>, timeout: Duration, tool_version: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            user_agent: format!("jfp/{tool_version}"),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `GET <url>` with `If-None-Match` when an ETag is remembered.
    ///
    /// A 200 whose body parses to an empty catalog is treated as an error so a
    /// broken upstream never replaces a good cache.
    pub async fn fetch(&self, etag: Option<&str>) -> Result<FetchOutcome> {
        let mut req = self
            .http
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent);
        if let Some(etag) = etag {
            req = req.header(IF_NONE_MATCH, etag);
        }

        let resp = req.send().await?;
        let status = resp.status();
        debug!(url = %self.url, status = status.as_u16(), "catalog response");

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(Error::http(&self.url, status));
        }

        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await?;
        let registry: Registry = serde_json::from_slice::<PayloadShape>(&body)?.into();
        if registry.prompts.is_empty() {
            return Err(Error::message(format!(
                "catalog at {} returned no prompts",
                self.url
            )));
        }
        Ok(FetchOutcome::Modified { registry, etag })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"version":"7","prompts":[{"id":"a","title":"A","content":"x"}]}"#;

    fn client(url: String) -> CatalogClient {
        CatalogClient::new(url, Duration::from_secs(2), "0.0.0-test").unwrap()
    }

    #[tokio::test]
    async fn returns_payload_and_etag_on_200() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/prompts")
            .match_header("user-agent", "jfp/0.0.0-test")
            .with_status(200)
            .with_header("etag", "\"abc\"")
            .with_body(BODY)
            .create_async()
            .await;

        let outcome = client(format!("{}/api/prompts", server.url()))
            .fetch(None)
            .await
            .unwrap();
        mock.assert_async().await;
        match outcome {
            FetchOutcome::Modified { registry, etag } => {
                assert_eq!(registry.version.as_deref(), Some("7"));
                assert_eq!(etag.as_deref(), Some("\"abc\""));
            },
            FetchOutcome::NotModified => panic!("expected a payload"),
        }
    }

    #[tokio::test]
    async fn sends_if_none_match_and_handles_304() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/prompts")
            .match_header("if-none-match", "\"abc\"")
            .with_status(304)
            .create_async()
            .await;

        let outcome = client(format!("{}/api/prompts", server.url()))
            .fetch(Some("\"abc\""))
            .await
            .unwrap();
        mock.assert_async().await;
        assert!(matches!(outcome, FetchOutcome::NotModified));
    }

    #[tokio::test]
    async fn server_error_maps_to_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/prompts")
            .with_status(500)
            .create_async()
            .await;

        let err = client(format!("{}/api/prompts", server.url()))
            .fetch(None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn empty_catalog_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/prompts")
            .with_status(200)
            .with_body(r#"{"prompts":[]}"#)
            .create_async()
            .await;

        let result = client(format!("{}/api/prompts", server.url()))
            .fetch(None)
            .await;
        assert!(result.is_err());
    }
}
