//! Error types for the remote space service.

use thiserror::Error;

/// Errors returned by a [`SpaceService`](super::SpaceService) binding.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The configured service base URL could not be parsed or joined.
    #[error("invalid service URL {url}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
    },

    /// Transport-level failure talking to the service.
    #[error("request to {url} failed: {source}")]
    Request {
        /// The endpoint that was called.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// The endpoint that was called.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body was not the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode {
        /// The endpoint that was called.
        url: String,
        /// What went wrong.
        message: String,
    },

    /// The server-side export job did not finish in time.
    #[error("export of space {key} did not finish within {waited_secs}s")]
    ExportTimedOut {
        /// The space being exported.
        key: String,
        /// How long we polled before giving up.
        waited_secs: u64,
    },

    /// Building the HTTP client failed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ServiceError {
    /// Creates a request error, folding the reqwest error into context.
    pub fn request(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.into(),
            source,
        }
    }

    /// Creates a status error.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.into(),
        }
    }
}
