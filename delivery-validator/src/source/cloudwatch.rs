use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::error::ProvideErrorMetadata;
use aws_sdk_cloudwatchlogs::Client as LogsClient;

use crate::error::{friendly_sink_message, SinkError};

use super::{LogEventsClient, LogEventsPage, LogEventsRequest};

const THROTTLING_CODE: &str = "ThrottlingException";

pub struct CloudWatchLogEvents {
    client: LogsClient,
}

impl CloudWatchLogEvents {
    pub fn new(client: LogsClient) -> Self {
        Self { client }
    }
}

// Some SDK paths only surface the code in the rendered message
fn is_throttling(code: Option<&str>, rendered: &str) -> bool {
    code == Some(THROTTLING_CODE)
        || rendered.contains("ThrottlingException")
        || rendered.contains("Rate exceeded")
}

#[async_trait]
impl LogEventsClient for CloudWatchLogEvents {
    async fn get_log_events(
        &self,
        request: &LogEventsRequest,
    ) -> Result<LogEventsPage, SinkError> {
        let result = self
            .client
            .get_log_events()
            .log_group_name(&request.log_group)
            .log_stream_name(&request.log_stream)
            .start_from_head(true)
            .limit(request.limit)
            .set_next_token(request.next_token.clone())
            .send()
            .await;

        match result {
            Ok(output) => Ok(LogEventsPage {
                messages: output
                    .events
                    .unwrap_or_default()
                    .into_iter()
                    .map(|event| event.message)
                    .collect(),
                next_forward_token: output.next_forward_token,
            }),
            Err(sdk_error) => {
                let rendered = format!("{sdk_error:?}");
                if is_throttling(sdk_error.code(), &rendered) {
                    let message = sdk_error.message().unwrap_or("Rate exceeded").to_string();
                    return Err(SinkError::Throttled(message));
                }
                let resource = format!("{}/{}", request.log_group, request.log_stream);
                let friendly_msg = friendly_sink_message(&sdk_error, &resource, "get log events");
                Err(SinkError::unavailable_from(
                    format!(
                        "Error occurred to get the log events from log group {:?}: {friendly_msg}",
                        request.log_group
                    ),
                    sdk_error,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttling_detected_by_code() {
        assert!(is_throttling(Some("ThrottlingException"), ""));
    }

    #[test]
    fn test_throttling_detected_in_message() {
        assert!(is_throttling(
            None,
            "ServiceError { ThrottlingException: Rate exceeded }"
        ));
    }

    #[test]
    fn test_other_errors_are_not_throttling() {
        assert!(!is_throttling(
            Some("ResourceNotFoundException"),
            "The specified log group does not exist."
        ));
    }
}
