//! Crate-wide error types.

use thiserror::Error;

use crate::transport::TransportFailure;

/// Generic user-facing text shown for any transport-level failure.
pub const GENERIC_HTTP_ERROR: &str =
    "An HTTP Error has occurred! Check your network connection and try again.";

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure or non-success HTTP status.
    ///
    /// `Display` shows only the generic message, plus an upstream detail
    /// when one could be extracted from the error body. The original cause
    /// stays on the value for diagnostics and logging.
    #[error("{message}")]
    Transport {
        /// User-facing message.
        message: String,
        /// HTTP status that caused the failure, when a response was received.
        status: Option<u16>,
        /// Underlying transport failure, when the request never completed.
        #[source]
        source: Option<TransportFailure>,
    },

    /// Invalid client configuration, such as an unparseable base URL.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure raised by a cache backend.
    #[error("cache backend error: {0}")]
    Cache(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Transport error for a request that never produced a response.
    pub(crate) fn transport_failure(source: TransportFailure) -> Self {
        Self::Transport {
            message: GENERIC_HTTP_ERROR.to_string(),
            status: None,
            source: Some(source),
        }
    }

    /// Transport error for a response with a non-success status. `detail`
    /// is the upstream `message` field when one was extractable.
    pub(crate) fn non_success(status: u16, detail: Option<String>) -> Self {
        let message = match detail {
            Some(detail) => format!("{GENERIC_HTTP_ERROR} {detail}"),
            None => GENERIC_HTTP_ERROR.to_string(),
        };
        Self::Transport {
            message,
            status: Some(status),
            source: None,
        }
    }
}
