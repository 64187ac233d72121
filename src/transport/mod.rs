//! Transport capability — how raw HTTP requests are issued.
//!
//! The client never talks to the network directly; it goes through the
//! [`Transport`] trait. [`HttpTransport`] is the reqwest-backed adapter;
//! tests substitute scripted implementations.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod http;

pub use http::HttpTransport;

/// HTTP method supported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Uppercase wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Parameters attached to a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    /// Pairs serialized into the query string.
    pub query: Vec<(String, String)>,
    /// JSON request body, sent with `Content-Type: application/json`.
    pub json_body: Option<Value>,
}

impl RequestParams {
    /// Params carrying only a query string.
    pub fn query(pairs: &[(&str, &str)]) -> Self {
        Self {
            query: pairs
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            json_body: None,
        }
    }

    /// Params carrying only a JSON body.
    pub fn json(body: Value) -> Self {
        Self {
            query: Vec::new(),
            json_body: Some(body),
        }
    }
}

/// Raw wire-level response, before interpretation.
///
/// Headers are kept as name/value pairs in arrival order; repeated names
/// are preserved as separate pairs.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

/// Failure signaled by a transport adapter: connection refused, DNS
/// resolution, timeout, or a failed body read.
///
/// HTTP statuses are not failures at this layer — adapters return every
/// received status as a [`RawResponse`] and leave classification to the
/// client.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportFailure(String);

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(err: reqwest::Error) -> Self {
        Self(err.to_string())
    }
}

/// Capability interface for issuing requests against a configured base
/// endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a request to `path`, relative to the base endpoint.
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: RequestParams,
    ) -> Result<RawResponse, TransportFailure>;
}
