//! reqwest-backed transport adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{Method, RawResponse, RequestParams, Transport, TransportFailure};

/// SDK identifier advertised in the default `User-Agent` header. The
/// literal is kept wire-compatible with earlier SDK generations; override
/// it with [`HttpTransport::with_user_agent`] when rebranding.
pub const SDK_USER_AGENT: &str = "easyclient-sdk-php";

/// SDK version appended to the user agent.
pub const SDK_VERSION: &str = "1.0";

/// Default per-request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Transport adapter issuing requests over HTTP(S) with reqwest.
///
/// Configured with a base endpoint URL; request paths are resolved
/// against it. Redirects are followed by the underlying client, so a
/// redirect chain surfaces here only through its final status.
pub struct HttpTransport {
    base_url: Url,
    user_agent: String,
    client: Client,
}

impl HttpTransport {
    /// Build a transport for `base_url`.
    pub fn new(base_url: &str) -> Result<Self, TransportFailure> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TransportFailure::new(format!("invalid base URL '{base_url}': {e}")))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| TransportFailure::new(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url,
            user_agent: format!("{SDK_USER_AGENT}/{SDK_VERSION}"),
            client,
        })
    }

    /// Replace the advertised `User-Agent` string.
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// The configured base endpoint.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The `User-Agent` string sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: RequestParams,
    ) -> Result<RawResponse, TransportFailure> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| TransportFailure::new(format!("invalid request path '{path}': {e}")))?;

        debug!(method = method.as_str(), %url, "issuing request");

        let mut request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        request = request.header(USER_AGENT, &self.user_agent);
        if !params.query.is_empty() {
            request = request.query(&params.query);
        }
        if let Some(body) = &params.json_body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(TransportFailure::from)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await.map_err(TransportFailure::from)?;

        Ok(RawResponse {
            status,
            body,
            headers,
        })
    }
}
