use std::path::PathBuf;

use jfp_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("request to {url} failed with HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("a library sync is already in progress (lock held on {})", lock_path.display())]
    SyncInProgress { lock_path: PathBuf },

    #[error("not authorized: sign in and set a token before syncing the library")]
    Unauthorized,

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn http(url: &str, status: reqwest::StatusCode) -> Self {
        Self::Http {
            url: url.to_string(),
            status: status.as_u16(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

jfp_common::impl_context!();
