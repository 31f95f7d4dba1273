use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

use crate::error::SinkError;

use super::json_stream::JsonRecordDecoder;
use super::{ObjectBody, ObjectStoreClient, Payload, ScanSummary, SinkReader};

enum Listing {
    Start,
    Continue(String),
    Done,
}

struct OpenObject {
    key: Arc<str>,
    body: ObjectBody,
    decoder: JsonRecordDecoder,
    body_done: bool,
}

/// Reads every record of every object under a prefix. Listing pages are
/// fetched lazily, and only one object body is open at a time.
pub struct ObjectStoreReader<C> {
    client: C,
    bucket: String,
    prefix: String,
    listing: Listing,
    pending: VecDeque<String>,
    current: Option<OpenObject>,
    objects_scanned: u64,
    pages: u64,
}

impl<C: ObjectStoreClient> ObjectStoreReader<C> {
    pub fn new(client: C, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
            listing: Listing::Start,
            pending: VecDeque::new(),
            current: None,
            objects_scanned: 0,
            pages: 0,
        }
    }

    async fn fetch_page(&mut self, token: Option<String>) -> Result<(), SinkError> {
        debug!(
            "Listing objects in {} with prefix {} (token: {:?})",
            self.bucket, self.prefix, token
        );
        let listing = self
            .client
            .list_objects(&self.bucket, &self.prefix, token)
            .await?;
        self.pages += 1;
        info!(
            "Listing page {} for {}/{}: {} objects, truncated: {}",
            self.pages,
            self.bucket,
            self.prefix,
            listing.keys.len(),
            listing.is_truncated
        );

        self.pending.extend(listing.keys);
        self.listing = match (listing.is_truncated, listing.next_continuation_token) {
            (false, _) => Listing::Done,
            (true, Some(token)) => Listing::Continue(token),
            (true, None) => {
                return Err(SinkError::unavailable(format!(
                    "Listing of bucket {:?} is truncated but has no continuation token",
                    self.bucket
                )))
            }
        };
        Ok(())
    }
}

#[async_trait]
impl<C: ObjectStoreClient> SinkReader for ObjectStoreReader<C> {
    async fn next_payload(&mut self) -> Result<Option<Payload>, SinkError> {
        loop {
            if let Some(object) = self.current.as_mut() {
                if let Some(log) = object.decoder.next_record() {
                    return Ok(Some(Payload {
                        location: object.key.clone(),
                        log,
                    }));
                }
                if object.body_done {
                    debug!("Finished reading object {}", object.key);
                    self.current = None;
                    continue;
                }
                match object.body.next().await {
                    Some(Ok(chunk)) => object.decoder.push(&chunk),
                    Some(Err(e)) => return Err(e),
                    None => {
                        object.body_done = true;
                        object.decoder.finish();
                    }
                }
                continue;
            }

            if let Some(key) = self.pending.pop_front() {
                let body = self.client.open_object(&self.bucket, &key).await?;
                self.objects_scanned += 1;
                debug!("Opened object {} ({} so far)", key, self.objects_scanned);
                self.current = Some(OpenObject {
                    key: key.into(),
                    body,
                    decoder: JsonRecordDecoder::new(),
                    body_done: false,
                });
                continue;
            }

            let token = match std::mem::replace(&mut self.listing, Listing::Done) {
                Listing::Done => return Ok(None),
                Listing::Start => None,
                Listing::Continue(token) => Some(token),
            };
            self.fetch_page(token).await?;
        }
    }

    fn summary(&self) -> ScanSummary {
        ScanSummary {
            objects: Some(self.objects_scanned),
            pages: self.pages,
        }
    }
}
