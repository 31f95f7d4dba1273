use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{MalformedRecord, SinkError};

use super::backoff::ThrottlePolicy;
use super::{LogEventsClient, LogEventsRequest, Payload, ScanSummary, SinkReader};

pub const DEFAULT_PAGE_LIMIT: i32 = 10_000;

/// Reads a log stream from its oldest event, following forward tokens.
///
/// CloudWatch has no "last page" marker: at the end of the stream it hands
/// back the same forward token it was given. That equality, including on the
/// very first call, is what ends the read.
pub struct LogStreamReader<C> {
    client: C,
    policy: ThrottlePolicy,
    log_group: String,
    log_stream: String,
    location: Arc<str>,
    limit: i32,
    forward_token: Option<String>,
    buffered: VecDeque<Option<String>>,
    done: bool,
    pages: u64,
}

impl<C: LogEventsClient> LogStreamReader<C> {
    pub fn new(
        client: C,
        log_group: impl Into<String>,
        log_stream: impl Into<String>,
        policy: ThrottlePolicy,
    ) -> Self {
        let log_group = log_group.into();
        let log_stream = log_stream.into();
        let location = format!("{log_group}/{log_stream}").into();
        Self {
            client,
            policy,
            log_group,
            log_stream,
            location,
            limit: DEFAULT_PAGE_LIMIT,
            forward_token: None,
            buffered: VecDeque::new(),
            done: false,
            pages: 0,
        }
    }

    pub fn with_page_limit(mut self, limit: i32) -> Self {
        self.limit = limit;
        self
    }

    async fn fetch_page(&mut self) -> Result<(), SinkError> {
        if self.pages > 0 && !self.policy.page_delay.is_zero() {
            tokio::time::sleep(self.policy.page_delay).await;
        }

        let request = LogEventsRequest {
            log_group: self.log_group.clone(),
            log_stream: self.log_stream.clone(),
            next_token: self.forward_token.clone(),
            limit: self.limit,
        };
        debug!("Requesting log events: {:?}", request);
        let client = &self.client;
        let page = self
            .policy
            .retry_throttled(|| client.get_log_events(&request))
            .await?;
        self.pages += 1;

        info!(
            "Log events page {} for {}: {} events",
            self.pages,
            self.location,
            page.messages.len()
        );
        self.buffered.extend(page.messages);

        let sent = self.forward_token.as_deref().unwrap_or_default();
        match page.next_forward_token {
            Some(token) if token != sent => self.forward_token = Some(token),
            // A missing token would restart the read from the head
            _ => self.done = true,
        }
        Ok(())
    }
}

#[async_trait]
impl<C: LogEventsClient> SinkReader for LogStreamReader<C> {
    async fn next_payload(&mut self) -> Result<Option<Payload>, SinkError> {
        loop {
            if let Some(message) = self.buffered.pop_front() {
                return Ok(Some(Payload {
                    location: self.location.clone(),
                    log: message.ok_or(MalformedRecord::MissingLog),
                }));
            }
            if self.done {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    fn summary(&self) -> ScanSummary {
        ScanSummary {
            objects: None,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::source::backoff::BackoffPolicy;
    use crate::source::mock::MockLogEvents;

    async fn drain<R: SinkReader>(reader: &mut R) -> Result<Vec<Payload>, SinkError> {
        let mut out = Vec::new();
        while let Some(payload) = reader.next_payload().await? {
            out.push(payload);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn test_follows_forward_tokens_until_repeated() {
        let client = MockLogEvents::new()
            .page(&["00000001_x", "00000002_x"], Some("f1"))
            .page(&["00000003_x"], Some("f2"))
            .page(&[], Some("f2"));

        let mut reader = LogStreamReader::new(
            client.clone(),
            "group",
            "stream",
            ThrottlePolicy::immediate(3),
        );
        let payloads = drain(&mut reader).await.unwrap();

        assert_eq!(payloads.len(), 3);
        assert_eq!(&*payloads[0].location, "group/stream");
        let tokens: Vec<_> = client
            .requests()
            .into_iter()
            .map(|r| r.next_token)
            .collect();
        assert_eq!(
            tokens,
            vec![None, Some("f1".to_string()), Some("f2".to_string())]
        );
        assert_eq!(reader.summary().pages, 3);
    }

    #[tokio::test]
    async fn test_requests_carry_group_stream_and_limit() {
        let client = MockLogEvents::new().page(&[], None);
        let mut reader = LogStreamReader::new(
            client.clone(),
            "group",
            "stream",
            ThrottlePolicy::immediate(3),
        )
        .with_page_limit(500);
        drain(&mut reader).await.unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].log_group, "group");
        assert_eq!(requests[0].log_stream, "stream");
        assert_eq!(requests[0].limit, 500);
    }

    #[tokio::test]
    async fn test_empty_stream_ends_on_first_call() {
        let client = MockLogEvents::new().page(&[], None);
        let mut reader = LogStreamReader::new(
            client.clone(),
            "group",
            "stream",
            ThrottlePolicy::immediate(3),
        );
        assert!(reader.next_payload().await.unwrap().is_none());
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_events_on_the_final_page_are_kept() {
        let client = MockLogEvents::new()
            .page(&["00000001_x"], Some("f1"))
            .page(&["00000002_x"], Some("f1"));
        let mut reader = LogStreamReader::new(
            client,
            "group",
            "stream",
            ThrottlePolicy::immediate(3),
        );
        assert_eq!(drain(&mut reader).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_forward_token_ends_the_read() {
        let client = MockLogEvents::new()
            .page(&["00000001_x"], Some("f1"))
            .page(&["00000002_x"], None);
        let mut reader = LogStreamReader::new(
            client.clone(),
            "group",
            "stream",
            ThrottlePolicy::immediate(3),
        );
        assert_eq!(drain(&mut reader).await.unwrap().len(), 2);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_event_without_message_is_malformed() {
        let client = MockLogEvents::new()
            .page_with(vec![None, Some("00000001_x".to_string())], None);
        let mut reader = LogStreamReader::new(
            client,
            "group",
            "stream",
            ThrottlePolicy::immediate(3),
        );
        let payloads = drain(&mut reader).await.unwrap();
        assert_eq!(payloads[0].log, Err(MalformedRecord::MissingLog));
        assert_eq!(payloads[1].log, Ok("00000001_x".to_string()));
    }

    #[tokio::test]
    async fn test_throttled_call_is_retried_with_same_token() {
        let client = MockLogEvents::new()
            .page(&["00000001_x"], Some("f1"))
            .throttle()
            .page(&["00000002_x"], Some("f1"));
        let mut reader = LogStreamReader::new(
            client.clone(),
            "group",
            "stream",
            ThrottlePolicy::immediate(3),
        );
        assert_eq!(drain(&mut reader).await.unwrap().len(), 2);

        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1], requests[2]);
    }

    #[tokio::test]
    async fn test_endless_throttling_gives_up() {
        let client = MockLogEvents::new().throttle_times(10);
        let mut reader = LogStreamReader::new(
            client.clone(),
            "group",
            "stream",
            ThrottlePolicy::immediate(4),
        );
        let err = reader.next_payload().await.unwrap_err();
        assert!(matches!(
            err,
            SinkError::RetriesExhausted { attempts: 4, .. }
        ));
        assert_eq!(client.requests().len(), 5);
    }

    #[tokio::test]
    async fn test_non_throttling_error_is_fatal() {
        let client = MockLogEvents::new()
            .page(&["00000001_x"], Some("f1"))
            .fail("ResourceNotFoundException");
        let mut reader = LogStreamReader::new(
            client.clone(),
            "group",
            "stream",
            ThrottlePolicy::immediate(3),
        );
        assert!(reader.next_payload().await.unwrap().is_some());
        assert!(matches!(
            reader.next_payload().await,
            Err(SinkError::Unavailable { .. })
        ));
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_delay_and_throttle_backoff_are_waited() {
        let client = MockLogEvents::new()
            .page(&["00000001_x"], Some("f1"))
            .throttle()
            .page(&["00000002_x"], Some("f2"))
            .page(&[], Some("f2"));
        let policy = ThrottlePolicy::new(
            Duration::from_millis(100),
            BackoffPolicy::fixed(Duration::from_secs(5)),
            3,
        );
        let mut reader = LogStreamReader::new(client.clone(), "group", "stream", policy);
        let start = tokio::time::Instant::now();

        // first request goes out right away
        assert!(reader.next_payload().await.unwrap().is_some());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(client.requests().len(), 1);

        // page delay, throttled, backoff, retry
        assert!(reader.next_payload().await.unwrap().is_some());
        assert_eq!(start.elapsed(), Duration::from_millis(5_100));
        assert_eq!(client.requests().len(), 3);

        // page delay before the request that confirms the end
        assert!(reader.next_payload().await.unwrap().is_none());
        assert_eq!(start.elapsed(), Duration::from_millis(5_200));
        assert_eq!(client.requests().len(), 4);
    }
}
