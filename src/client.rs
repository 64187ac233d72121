//! Response client — request orchestration, response interpretation, and
//! cache-version lifecycle.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheBackend, CacheConfig, CACHE_VERSION_KEY};
use crate::error::{ClientError, Result};
use crate::response::{interpret_body, Headers, ResponseBody, ResponseEnvelope};
use crate::transport::{HttpTransport, Method, RawResponse, RequestParams, Transport};

/// Content lifecycle stage attached to a cache write.
///
/// Only `Published` content is eligible for caching; draft and preview
/// stages update client state without persisting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    Published,
    Draft,
    Preview,
}

/// Last successful response, tracked separately from the cache.
#[derive(Debug, Default)]
struct ClientState {
    body: ResponseBody,
    headers: Headers,
}

/// Request client: fetches resources through a [`Transport`], normalizes
/// responses into [`ResponseEnvelope`]s, and optionally memoizes them
/// through a [`CacheBackend`].
///
/// One request is in flight at a time; `get`/`post` take `&mut self`, so
/// sharing a client across threads requires external synchronization.
pub struct Client {
    transport: Arc<dyn Transport>,
    cache: Option<Arc<dyn CacheBackend>>,
    cache_version: Option<u64>,
    state: ClientState,
}

impl Client {
    /// Build a client over the default HTTP transport for `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let transport =
            HttpTransport::new(base_url).map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    /// Build a client over a custom transport adapter.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cache: None,
            cache_version: None,
            state: ClientState::default(),
        }
    }

    // ── Requests ─────────────────────────────────────────────────────────────

    /// Issue a GET request to `path` with `query` serialized into the
    /// query string.
    pub async fn get(&mut self, path: &str, query: &[(&str, &str)]) -> Result<ResponseEnvelope> {
        let raw = self
            .transport
            .request(Method::Get, path, RequestParams::query(query))
            .await
            .map_err(ClientError::transport_failure)?;
        self.response_handler(raw)
    }

    /// Issue a POST request to `path` with `body` serialized as JSON.
    pub async fn post(&mut self, path: &str, body: &Value) -> Result<ResponseEnvelope> {
        let raw = self
            .transport
            .request(Method::Post, path, RequestParams::json(body.clone()))
            .await
            .map_err(ClientError::transport_failure)?;
        self.response_handler(raw)
    }

    /// Interpret a raw response, updating client state on success.
    ///
    /// Success is exactly status 200. Any other status — other 2xx codes
    /// and redirects included — fails, with the upstream `message` field
    /// appended when the error body is structured and carries one.
    fn response_handler(&mut self, raw: RawResponse) -> Result<ResponseEnvelope> {
        if raw.status != 200 {
            return Err(ClientError::non_success(
                raw.status,
                extract_error_message(&raw.body),
            ));
        }
        let envelope = ResponseEnvelope {
            body: interpret_body(&raw.body),
            status_code: raw.status,
            headers: Headers::from_pairs(raw.headers),
        };
        self.assign_state(&envelope);
        Ok(envelope)
    }

    // ── State accessors ──────────────────────────────────────────────────────

    /// Body of the most recent successful response, or an empty container
    /// if none has occurred yet. Never errors, never issues a request.
    pub fn body(&self) -> &ResponseBody {
        &self.state.body
    }

    /// Headers of the most recent successful response, or an empty
    /// container if none has occurred yet.
    pub fn headers(&self) -> &Headers {
        &self.state.headers
    }

    // ── Cache lifecycle ──────────────────────────────────────────────────────

    /// Attach a cache backend (fluent).
    ///
    /// Ensures a cache version exists: an existing stamp is kept as-is, an
    /// absent one is created immediately. Backend construction failures
    /// propagate.
    pub async fn attach_cache(mut self, config: CacheConfig) -> Result<Self> {
        let backend = config.build().await?;
        self.cache = Some(backend);
        match self.load_cache_version().await? {
            Some(version) => self.cache_version = Some(version),
            None => self.restamp_cache_version().await?,
        }
        Ok(self)
    }

    /// Clear every entry the backend owns and stamp a new cache version.
    /// No-op without an attached backend.
    pub async fn flush_cache(&mut self) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache.flush().await?;
            self.restamp_cache_version().await?;
        }
        Ok(())
    }

    /// Write the current time as the new cache version and update the
    /// in-memory mirror. No-op without an attached backend.
    pub async fn restamp_cache_version(&mut self) -> Result<()> {
        if let Some(cache) = &self.cache {
            let timestamp = now_secs();
            cache.save(&Value::from(timestamp), CACHE_VERSION_KEY).await?;
            debug!(timestamp, "stamped new cache version");
            self.cache_version = Some(timestamp);
        }
        Ok(())
    }

    /// In-memory mirror of the stored cache version, if a backend is
    /// attached.
    pub fn cache_version(&self) -> Option<u64> {
        self.cache_version
    }

    /// Memoization write path.
    ///
    /// Always refreshes client state from `envelope` — state tracking and
    /// caching are independent concerns. The entry is written only for
    /// [`LifecycleStage::Published`] content; draft and preview stages
    /// persist nothing.
    pub async fn persist(
        &mut self,
        envelope: &ResponseEnvelope,
        key: &str,
        stage: LifecycleStage,
    ) -> Result<()> {
        self.assign_state(envelope);
        if stage != LifecycleStage::Published {
            return Ok(());
        }
        if let Some(cache) = &self.cache {
            let value = serde_json::to_value(envelope)
                .map_err(|e| ClientError::Cache(format!("failed to encode envelope: {e}")))?;
            cache.save(&value, key).await?;
        }
        Ok(())
    }

    async fn load_cache_version(&self) -> Result<Option<u64>> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        Ok(cache
            .load(CACHE_VERSION_KEY)
            .await?
            .and_then(|value| value.as_u64()))
    }

    fn assign_state(&mut self, envelope: &ResponseEnvelope) {
        self.state.body = envelope.body.clone();
        self.state.headers = envelope.headers.clone();
    }
}

/// Pull the upstream `message` field out of a structured error body.
/// Decode failures yield no detail, never a secondary error.
fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message")?.as_str().map(str::to_string))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheOptions, FileCache};
    use crate::error::GENERIC_HTTP_ERROR;
    use crate::transport::TransportFailure;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Transport returning scripted responses in order.
    struct MockTransport {
        responses: Mutex<VecDeque<std::result::Result<RawResponse, TransportFailure>>>,
        requests: Mutex<Vec<(Method, String)>>,
    }

    impl MockTransport {
        fn new(
            responses: impl IntoIterator<Item = std::result::Result<RawResponse, TransportFailure>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn ok(status: u16, body: &str) -> std::result::Result<RawResponse, TransportFailure> {
            Ok(RawResponse {
                status,
                body: body.to_string(),
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
            })
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn request(
            &self,
            method: Method,
            path: &str,
            _params: RequestParams,
        ) -> std::result::Result<RawResponse, TransportFailure> {
            self.requests
                .lock()
                .unwrap()
                .push((method, path.to_string()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportFailure::new("no scripted response")))
        }
    }

    fn client_with(
        responses: impl IntoIterator<Item = std::result::Result<RawResponse, TransportFailure>>,
    ) -> Client {
        Client::with_transport(MockTransport::new(responses))
    }

    // ── Interpretation through the client ────────────────────────────────────

    #[tokio::test]
    async fn test_get_decodes_json_body() {
        let mut client = client_with([MockTransport::ok(200, r#"{"a": 1}"#)]);
        let envelope = client.get("/data.json", &[]).await.unwrap();
        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.body, ResponseBody::Structured(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_requests_carry_method_and_path() {
        let mock = MockTransport::new([
            MockTransport::ok(200, r#"{"a": 1}"#),
            MockTransport::ok(200, r#"{"b": 2}"#),
        ]);
        let mut client = Client::with_transport(mock.clone());
        client.get("/data.json", &[("page", "1")]).await.unwrap();
        client.post("/items", &json!({"name": "x"})).await.unwrap();

        let requests = mock.requests.lock().unwrap();
        assert_eq!(
            requests.as_slice(),
            &[
                (Method::Get, "/data.json".to_string()),
                (Method::Post, "/items".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_get_falls_back_to_xml() {
        let mut client = client_with([MockTransport::ok(
            200,
            "<result><status>ok</status></result>",
        )]);
        let envelope = client.get("/data.xml", &[]).await.unwrap();
        assert_eq!(
            envelope.body,
            ResponseBody::Structured(json!({"status": "ok"}))
        );
    }

    #[tokio::test]
    async fn test_get_falls_back_to_raw_text() {
        let mut client = client_with([MockTransport::ok(200, "plain payload")]);
        let envelope = client.get("/data.txt", &[]).await.unwrap();
        assert_eq!(envelope.body, ResponseBody::Raw("plain payload".to_string()));
    }

    #[tokio::test]
    async fn test_post_success_updates_state() {
        let mut client = client_with([MockTransport::ok(200, r#"{"created": true}"#)]);
        client.post("/items", &json!({"name": "x"})).await.unwrap();
        assert_eq!(
            client.body(),
            &ResponseBody::Structured(json!({"created": true}))
        );
    }

    #[tokio::test]
    async fn test_envelope_carries_headers() {
        let mut client = client_with([MockTransport::ok(200, r#"{"a": 1}"#)]);
        let envelope = client.get("/", &[]).await.unwrap();
        assert_eq!(
            envelope.headers.get("Content-Type"),
            Some(&["text/plain".to_string()][..])
        );
    }

    // ── Error classification ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_non_200_fails_with_generic_error() {
        let mut client = client_with([MockTransport::ok(500, "oops")]);
        let err = client.get("/", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), GENERIC_HTTP_ERROR);
    }

    #[tokio::test]
    async fn test_other_2xx_statuses_are_failures() {
        let mut client = client_with([MockTransport::ok(204, "")]);
        let err = client.get("/", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport {
                status: Some(204),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_redirect_status_is_a_failure() {
        let mut client = client_with([MockTransport::ok(301, "")]);
        assert!(client.get("/", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_error_message_extracted_from_structured_body() {
        let mut client = client_with([MockTransport::ok(404, r#"{"message": "Story not found"}"#)]);
        let err = client.get("/missing", &[]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("{GENERIC_HTTP_ERROR} Story not found")
        );
    }

    #[tokio::test]
    async fn test_error_message_extraction_never_fails_on_bad_body() {
        let mut client = client_with([MockTransport::ok(404, "<html>not json</html>")]);
        let err = client.get("/missing", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), GENERIC_HTTP_ERROR);
    }

    #[tokio::test]
    async fn test_transport_failure_collapses_to_generic_error() {
        let mut client = client_with([Err(TransportFailure::new("dns failure"))]);
        let err = client.get("/", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), GENERIC_HTTP_ERROR);
        // The cause survives on the error value for diagnostics.
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "dns failure");
    }

    #[tokio::test]
    async fn test_failure_does_not_touch_state() {
        let mut client = client_with([
            MockTransport::ok(200, r#"{"a": 1}"#),
            MockTransport::ok(500, "boom"),
        ]);
        client.get("/", &[]).await.unwrap();
        let _ = client.get("/", &[]).await.unwrap_err();
        assert_eq!(client.body(), &ResponseBody::Structured(json!({"a": 1})));
    }

    // ── State accessors ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_accessors_empty_before_any_request() {
        let client = client_with([]);
        assert!(client.body().is_empty());
        assert!(client.headers().is_empty());
    }

    #[tokio::test]
    async fn test_state_reflects_only_latest_success() {
        let mut client = client_with([
            MockTransport::ok(200, r#"{"first": 1}"#),
            MockTransport::ok(200, r#"{"second": 2}"#),
        ]);
        client.get("/one", &[]).await.unwrap();
        client.get("/two", &[]).await.unwrap();
        assert_eq!(
            client.body(),
            &ResponseBody::Structured(json!({"second": 2}))
        );
    }

    // ── Cache lifecycle ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_attach_cache_creates_version_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let client = client_with([])
            .attach_cache(CacheConfig::File {
                path: dir.path().to_path_buf(),
            })
            .await
            .unwrap();
        let version = client.cache_version().expect("version must be stamped");
        assert!(version > 0);
    }

    #[tokio::test]
    async fn test_attach_cache_keeps_existing_version() {
        let dir = tempfile::tempdir().unwrap();

        // Pre-seed a version stamp directly in the backend.
        let backend =
            FileCache::open(dir.path().to_path_buf(), CacheOptions::default()).unwrap();
        backend
            .save(&Value::from(1000u64), CACHE_VERSION_KEY)
            .await
            .unwrap();

        let client = client_with([])
            .attach_cache(CacheConfig::File {
                path: dir.path().to_path_buf(),
            })
            .await
            .unwrap();
        assert_eq!(client.cache_version(), Some(1000));
    }

    #[tokio::test]
    async fn test_flush_cache_restamps_and_empties_backend() {
        let dir = tempfile::tempdir().unwrap();

        let backend =
            FileCache::open(dir.path().to_path_buf(), CacheOptions::default()).unwrap();
        backend
            .save(&Value::from(1000u64), CACHE_VERSION_KEY)
            .await
            .unwrap();
        backend.save(&json!("stale"), "entry").await.unwrap();
        drop(backend);

        let mut client = client_with([])
            .attach_cache(CacheConfig::File {
                path: dir.path().to_path_buf(),
            })
            .await
            .unwrap();
        assert_eq!(client.cache_version(), Some(1000));

        client.flush_cache().await.unwrap();
        let new_version = client.cache_version().unwrap();
        assert!(new_version > 1000, "flush must stamp a fresh version");

        // Only the fresh version stamp remains in the backend.
        let backend =
            FileCache::open(dir.path().to_path_buf(), CacheOptions::default()).unwrap();
        assert_eq!(backend.entry_count().await, 1);
        assert_eq!(backend.load("entry").await.unwrap(), None);
        assert_eq!(
            backend.load(CACHE_VERSION_KEY).await.unwrap(),
            Some(Value::from(new_version))
        );
    }

    #[tokio::test]
    async fn test_flush_cache_without_backend_is_a_noop() {
        let mut client = client_with([]);
        client.flush_cache().await.unwrap();
        assert_eq!(client.cache_version(), None);
    }

    #[tokio::test]
    async fn test_restamp_without_backend_is_a_noop() {
        let mut client = client_with([]);
        client.restamp_cache_version().await.unwrap();
        assert_eq!(client.cache_version(), None);
    }

    #[tokio::test]
    async fn test_requests_do_not_touch_cache_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = client_with([MockTransport::ok(200, r#"{"a": 1}"#)])
            .attach_cache(CacheConfig::File {
                path: dir.path().to_path_buf(),
            })
            .await
            .unwrap();
        let stamped = client.cache_version();
        client.get("/data.json", &[]).await.unwrap();
        assert_eq!(client.cache_version(), stamped);
    }

    // ── persist ──────────────────────────────────────────────────────────────

    fn envelope(body: Value) -> ResponseEnvelope {
        ResponseEnvelope {
            body: ResponseBody::Structured(body),
            status_code: 200,
            headers: Headers::from_pairs([("x-served-by".to_string(), "test".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_persist_published_writes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = client_with([])
            .attach_cache(CacheConfig::File {
                path: dir.path().to_path_buf(),
            })
            .await
            .unwrap();

        let envelope = envelope(json!({"page": "home"}));
        client
            .persist(&envelope, "page:home", LifecycleStage::Published)
            .await
            .unwrap();

        let backend =
            FileCache::open(dir.path().to_path_buf(), CacheOptions::default()).unwrap();
        let stored = backend.load("page:home").await.unwrap().unwrap();
        let back: ResponseEnvelope = serde_json::from_value(stored).unwrap();
        assert_eq!(back, envelope);
    }

    #[tokio::test]
    async fn test_persist_draft_updates_state_but_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = client_with([])
            .attach_cache(CacheConfig::File {
                path: dir.path().to_path_buf(),
            })
            .await
            .unwrap();

        let envelope = envelope(json!({"page": "draft"}));
        client
            .persist(&envelope, "page:draft", LifecycleStage::Draft)
            .await
            .unwrap();

        assert_eq!(client.body(), &envelope.body);
        let backend =
            FileCache::open(dir.path().to_path_buf(), CacheOptions::default()).unwrap();
        assert_eq!(backend.load("page:draft").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persist_without_backend_still_updates_state() {
        let mut client = client_with([]);
        let envelope = envelope(json!({"page": "home"}));
        client
            .persist(&envelope, "page:home", LifecycleStage::Published)
            .await
            .unwrap();
        assert_eq!(client.body(), &envelope.body);
    }

    // ── End-to-end scenario ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_end_to_end_get_with_file_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = client_with([MockTransport::ok(200, r#"{"a":1}"#)])
            .attach_cache(CacheConfig::File {
                path: dir.path().to_path_buf(),
            })
            .await
            .unwrap();

        let stamped = client.cache_version().expect("attach must stamp a version");

        client.get("/data.json", &[]).await.unwrap();
        assert_eq!(client.body(), &ResponseBody::Structured(json!({"a": 1})));
        assert_eq!(client.cache_version(), Some(stamped));

        let backend =
            FileCache::open(dir.path().to_path_buf(), CacheOptions::default()).unwrap();
        assert_eq!(
            backend.load(CACHE_VERSION_KEY).await.unwrap(),
            Some(Value::from(stamped))
        );
    }
}
