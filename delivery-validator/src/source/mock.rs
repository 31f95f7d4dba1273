//! Scripted sink backends for tests. Always compiled, like the S3 mock in the
//! shared s3 crate, so integration tests and downstream harnesses can use them.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};

use crate::error::SinkError;

use super::{
    LogEventsClient, LogEventsPage, LogEventsRequest, ObjectBody, ObjectListing,
    ObjectStoreClient,
};

#[derive(Clone)]
enum MockObject {
    Chunks(Vec<Bytes>),
    // yields the chunks, then a read error
    Broken(Vec<Bytes>),
}

/// Object store with listing pages keyed by the continuation token they answer.
#[derive(Clone, Default)]
pub struct MockObjectStore {
    pages: HashMap<Option<String>, Result<ObjectListing, String>>,
    objects: HashMap<String, MockObject>,
    listing_tokens: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The listing returned for `token`. The page is truncated iff `next` is set.
    pub fn page(mut self, token: Option<&str>, keys: &[&str], next: Option<&str>) -> Self {
        let listing = ObjectListing {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            is_truncated: next.is_some(),
            next_continuation_token: next.map(str::to_string),
        };
        self.pages.insert(token.map(str::to_string), Ok(listing));
        self
    }

    pub fn truncated_page_without_token(mut self, token: Option<&str>, keys: &[&str]) -> Self {
        let listing = ObjectListing {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            is_truncated: true,
            next_continuation_token: None,
        };
        self.pages.insert(token.map(str::to_string), Ok(listing));
        self
    }

    pub fn failing_page(mut self, token: Option<&str>, message: &str) -> Self {
        self.pages
            .insert(token.map(str::to_string), Err(message.to_string()));
        self
    }

    /// An object whose body arrives in the given chunks
    pub fn object(mut self, key: &str, chunks: &[&str]) -> Self {
        self.objects
            .insert(key.to_string(), MockObject::Chunks(to_bytes(chunks)));
        self
    }

    /// An object whose body fails after the given chunks
    pub fn broken_object(mut self, key: &str, chunks: &[&str]) -> Self {
        self.objects
            .insert(key.to_string(), MockObject::Broken(to_bytes(chunks)));
        self
    }

    /// Continuation tokens of every listing call made so far, in order
    pub fn listing_tokens(&self) -> Vec<Option<String>> {
        self.listing_tokens
            .lock()
            .expect("poisoned listing log")
            .clone()
    }
}

fn to_bytes(chunks: &[&str]) -> Vec<Bytes> {
    chunks
        .iter()
        .map(|c| Bytes::copy_from_slice(c.as_bytes()))
        .collect()
}

#[async_trait]
impl ObjectStoreClient for MockObjectStore {
    async fn list_objects(
        &self,
        bucket: &str,
        _prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectListing, SinkError> {
        self.listing_tokens
            .lock()
            .expect("poisoned listing log")
            .push(continuation_token.clone());
        match self.pages.get(&continuation_token) {
            Some(Ok(listing)) => Ok(listing.clone()),
            Some(Err(message)) => Err(SinkError::unavailable(message.clone())),
            None => Err(SinkError::unavailable(format!(
                "no listing scripted for {bucket} with token {continuation_token:?}"
            ))),
        }
    }

    async fn open_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, SinkError> {
        match self.objects.get(key) {
            Some(MockObject::Chunks(chunks)) => {
                Ok(stream::iter(chunks.clone().into_iter().map(Ok)).boxed())
            }
            Some(MockObject::Broken(chunks)) => {
                let failure = SinkError::unavailable(format!("connection reset reading {key}"));
                Ok(stream::iter(chunks.clone().into_iter().map(Ok))
                    .chain(stream::once(async move { Err(failure) }))
                    .boxed())
            }
            None => Err(SinkError::unavailable(format!(
                "NoSuchKey: {bucket}/{key}"
            ))),
        }
    }
}

enum MockResponse {
    Page(LogEventsPage),
    Throttle,
    Fail(String),
}

/// Log events backend that answers calls from a script, in order.
#[derive(Clone, Default)]
pub struct MockLogEvents {
    script: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<LogEventsRequest>>>,
}

impl MockLogEvents {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, response: MockResponse) -> Self {
        self.script
            .lock()
            .expect("poisoned script")
            .push_back(response);
        self
    }

    pub fn page(self, messages: &[&str], next_forward_token: Option<&str>) -> Self {
        self.page_with(
            messages.iter().map(|m| Some(m.to_string())).collect(),
            next_forward_token,
        )
    }

    pub fn page_with(self, messages: Vec<Option<String>>, next_forward_token: Option<&str>) -> Self {
        self.push(MockResponse::Page(LogEventsPage {
            messages,
            next_forward_token: next_forward_token.map(str::to_string),
        }))
    }

    pub fn throttle(self) -> Self {
        self.push(MockResponse::Throttle)
    }

    pub fn throttle_times(self, times: usize) -> Self {
        (0..times).fold(self, |mock, _| mock.throttle())
    }

    pub fn fail(self, message: &str) -> Self {
        self.push(MockResponse::Fail(message.to_string()))
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<LogEventsRequest> {
        self.requests.lock().expect("poisoned requests").clone()
    }
}

#[async_trait]
impl LogEventsClient for MockLogEvents {
    async fn get_log_events(
        &self,
        request: &LogEventsRequest,
    ) -> Result<LogEventsPage, SinkError> {
        self.requests
            .lock()
            .expect("poisoned requests")
            .push(request.clone());
        let next = self.script.lock().expect("poisoned script").pop_front();
        match next {
            Some(MockResponse::Page(page)) => Ok(page),
            Some(MockResponse::Throttle) => Err(SinkError::Throttled(
                "ThrottlingException: Rate exceeded".to_string(),
            )),
            Some(MockResponse::Fail(message)) => Err(SinkError::unavailable(message)),
            None => Err(SinkError::unavailable("mock log events script exhausted")),
        }
    }
}
