use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single payload that could not be turned into a record identity. These are
/// logged and skipped, they never end a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("log field too short: expected at least {expected} characters, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("record id prefix {0:?} is not an unsigned integer")]
    InvalidPrefix(String),
    #[error("record has no Log field")]
    MissingLog,
    #[error("unmarshal error: {0}")]
    Json(String),
}

/// Failures talking to the sink under test. Everything except `Throttled` ends
/// the run; `Throttled` is retried by the log stream reader until its policy
/// gives up, at which point it becomes `RetriesExhausted`.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("{message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("throttled by backend: {0}")]
    Throttled(String),
    #[error("still throttled after {attempts} retries: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl SinkError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn unavailable_from<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Unavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

/// Invalid or missing run configuration, detected before any sink is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{what} required. Use the --{flag} flag.")]
    Missing {
        what: &'static str,
        flag: &'static str,
    },
    #[error("Total input record number must be greater than zero. Use the --input-record flag.")]
    ZeroInputRecords,
    #[error("{0}")]
    InvalidArgument(String),
}

impl ConfigError {
    pub const fn missing(what: &'static str, flag: &'static str) -> Self {
        Self::Missing { what, flag }
    }
}

// String matching on the debug output, the SDK error types differ per operation
// and per service so this is the one place that covers all of them.
pub fn friendly_sink_message(
    error: &dyn std::fmt::Debug,
    resource: &str,
    operation: &str,
) -> String {
    let error_string = format!("{error:?}");

    if error_string.contains("InvalidAccessKeyId")
        || error_string.contains("UnrecognizedClientException")
    {
        "Invalid AWS Access Key ID - please check your credentials".to_string()
    } else if error_string.contains("SignatureDoesNotMatch")
        || error_string.contains("InvalidSignatureException")
    {
        "Invalid AWS Secret Access Key - please check your credentials".to_string()
    } else if error_string.contains("AccessDenied") {
        format!("Access denied to '{resource}' during {operation} - check your permissions")
    } else if error_string.contains("NoSuchBucket") {
        format!("S3 bucket '{resource}' does not exist or you don't have access to it")
    } else if error_string.contains("InvalidBucketName") {
        format!("Invalid S3 bucket name '{resource}'")
    } else if error_string.contains("NoSuchKey") {
        format!("Object vanished from '{resource}' while reading it")
    } else if error_string.contains("ResourceNotFoundException") {
        format!("Log group or stream '{resource}' does not exist")
    } else if error_string.contains("timeout") || error_string.contains("Timeout") {
        format!("{operation} timed out - check your network connection and region settings")
    } else if error_string.contains("dns") || error_string.contains("DNS") {
        "Failed to connect to AWS - check your endpoint URL and network connection".to_string()
    } else if error_string.contains("EndpointConnectionError") {
        "Failed to connect to AWS endpoint - check your endpoint URL and network connection"
            .to_string()
    } else {
        format!("Error occurred during {operation} on '{resource}'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friendly_message_for_missing_bucket() {
        let msg = friendly_sink_message(&"NoSuchBucket: gone", "my-bucket", "list objects");
        assert_eq!(
            msg,
            "S3 bucket 'my-bucket' does not exist or you don't have access to it"
        );
    }

    #[test]
    fn test_friendly_message_for_missing_log_stream() {
        let msg = friendly_sink_message(
            &"ResourceNotFoundException { message: \"The specified log stream does not exist.\" }",
            "group/stream",
            "get log events",
        );
        assert!(msg.contains("group/stream"));
    }

    #[test]
    fn test_friendly_message_fallback_names_operation() {
        let msg = friendly_sink_message(&"something odd", "bucket", "get object");
        assert_eq!(msg, "Error occurred during get object on 'bucket'");
    }

    #[test]
    fn test_config_error_mentions_flag() {
        let err = ConfigError::missing("AWS Region", "region");
        assert_eq!(err.to_string(), "AWS Region required. Use the --region flag.");
    }

    #[test]
    fn test_unavailable_keeps_source() {
        let io = std::io::Error::other("socket closed");
        let err = SinkError::unavailable_from("Error to get S3 object", io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_throttled());
    }
}
