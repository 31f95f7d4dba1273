use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::{MalformedRecord, SinkError};

pub mod backoff;
pub mod cloudwatch;
pub mod folder;
pub mod json_stream;
pub mod log_stream;
pub mod mock;
pub mod object_store;
pub mod s3;

/// One log unit pulled out of a sink, before identity extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Object key or `group/stream` the payload came from, for diagnostics
    pub location: Arc<str>,
    /// The log line, or why the record could not be decoded into one
    pub log: Result<String, MalformedRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Objects opened, `None` for sinks without objects
    pub objects: Option<u64>,
    /// Listing or event pages fetched
    pub pages: u64,
}

/// A lazy, possibly paginated sequence of payloads from one location in a sink.
/// Nothing is fetched until the first call to `next_payload`.
#[async_trait]
pub trait SinkReader: Send {
    /// `Ok(None)` once the sink is exhausted. Any `Err` is fatal for the run.
    async fn next_payload(&mut self) -> Result<Option<Payload>, SinkError>;

    fn summary(&self) -> ScanSummary;
}

/// One page of an object listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    pub keys: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// Body chunks of a single object. Dropping the stream releases the object.
pub type ObjectBody = BoxStream<'static, Result<Bytes, SinkError>>;

/// The calls the object store reader needs from a bucket-like backend
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectListing, SinkError>;

    async fn open_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, SinkError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEventsRequest {
    pub log_group: String,
    pub log_stream: String,
    pub next_token: Option<String>,
    pub limit: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEventsPage {
    pub messages: Vec<Option<String>>,
    pub next_forward_token: Option<String>,
}

/// The call the log stream reader needs from a CloudWatch-like backend. Rate
/// limiting must be reported as `SinkError::Throttled` so it gets retried.
#[async_trait]
pub trait LogEventsClient: Send + Sync {
    async fn get_log_events(&self, request: &LogEventsRequest)
        -> Result<LogEventsPage, SinkError>;
}
