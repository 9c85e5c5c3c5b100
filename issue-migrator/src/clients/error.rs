//! Tracker client error types.

use thiserror::Error;

/// Errors raised by the source and destination tracker clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The remote API answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing a local file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A configured base URL could not be joined with an API path.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The blocking HTTP task panicked or was cancelled.
    #[error("HTTP worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ClientError {
    /// Returns the HTTP status if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for `409 Conflict`, e.g. "already a member".
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

impl From<ureq::Error> for ClientError {
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::Status(status, response) => {
                let url = response.get_url().to_string();
                let message = response
                    .into_string()
                    .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
                Self::Status {
                    status,
                    url,
                    message,
                }
            }
            ureq::Error::Transport(transport) => Self::Transport(transport.to_string()),
        }
    }
}
