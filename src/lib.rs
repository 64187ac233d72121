//! Minimal HTTP(S) request client with response normalization and
//! pluggable response caching.
//!
//! [`Client`] issues GET/POST requests through a [`Transport`] adapter,
//! interprets every success into a canonical [`ResponseEnvelope`]
//! (structured body where possible, raw text otherwise), and tracks the
//! most recent body and headers. Optionally, responses can be memoized in
//! a [`CacheBackend`] — file-based or SQL-backed — guarded by a manually
//! invalidated cache-version stamp.
//!
//! ```no_run
//! use easyclient::{CacheConfig, Client};
//!
//! # async fn run() -> easyclient::Result<()> {
//! let mut client = Client::new("https://example.test")?
//!     .attach_cache(CacheConfig::File {
//!         path: "cache".into(),
//!     })
//!     .await?;
//!
//! let envelope = client.get("/data.json", &[("page", "1")]).await?;
//! println!("status: {}", envelope.status_code);
//! println!("body: {:?}", client.body());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod response;
pub mod transport;

pub use cache::{CacheBackend, CacheConfig, FileCache, MySqlCache, PostgresCache, SqliteCache};
pub use client::{Client, LifecycleStage};
pub use error::{ClientError, Result, GENERIC_HTTP_ERROR};
pub use response::{Headers, ResponseBody, ResponseEnvelope};
pub use transport::{
    HttpTransport, Method, RawResponse, RequestParams, Transport, TransportFailure,
};
