use std::ffi::OsString;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use envconfig::Envconfig;

use crate::error::ConfigError;
use crate::source::backoff::{BackoffPolicy, ThrottlePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Destination {
    S3,
    Cloudwatch,
    /// A local directory holding a copy of the bucket contents
    Local,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// Required values are checked by `validate` rather than by clap. Together with
// `parse_args` every bad flag ends up as a `ConfigError`.
/// Counts unique, duplicated and missing load test records in a log destination.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about, long_about = None)]
pub struct ValidatorArgs {
    /// AWS region of the destination
    #[arg(long, env = "VALIDATOR_REGION")]
    pub region: Option<String>,

    /// S3 bucket name
    #[arg(long, env = "VALIDATOR_BUCKET")]
    pub bucket: Option<String>,

    /// CloudWatch log group name
    #[arg(long, env = "VALIDATOR_LOG_GROUP")]
    pub log_group: Option<String>,

    /// S3 key prefix, or the log stream name for CloudWatch
    #[arg(long, env = "VALIDATOR_PREFIX")]
    pub prefix: Option<String>,

    /// Where the pipeline delivered the logs
    #[arg(long, value_enum, env = "VALIDATOR_DESTINATION")]
    pub destination: Option<Destination>,

    /// Total number of records the producer wrote
    #[arg(long, env = "VALIDATOR_INPUT_RECORD")]
    pub input_record: Option<u64>,

    /// Delay label of this run, copied to the report
    #[arg(long, env = "VALIDATOR_LOG_DELAY")]
    pub log_delay: Option<String>,

    /// Directory to read for the `local` destination
    #[arg(long, env = "VALIDATOR_LOCAL_DIR")]
    pub local_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    S3 {
        region: String,
        bucket: String,
        prefix: String,
    },
    CloudWatch {
        region: String,
        log_group: String,
        log_stream: String,
    },
    Local {
        dir: PathBuf,
        prefix: String,
    },
}

/// A validated run: everything the validation needs, nothing optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub target: SinkTarget,
    pub input_records: NonZeroU64,
    pub log_delay: String,
    pub output: OutputFormat,
}

fn required(
    value: Option<String>,
    what: &'static str,
    flag: &'static str,
) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::missing(what, flag)),
    }
}

impl ValidatorArgs {
    /// Like `Parser::parse_from`, except that a bad flag value is returned
    /// instead of exiting. `--help` and `--version` still print and exit.
    pub fn parse_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Self::try_parse_from(args) {
            Ok(args) => Ok(args),
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                e.exit()
            }
            Err(e) => Err(ConfigError::InvalidArgument(e.to_string().trim_end().to_string())),
        }
    }

    pub fn validate(self) -> Result<RunConfig, ConfigError> {
        let destination = self
            .destination
            .ok_or(ConfigError::missing("Log destination for validation", "destination"))?;
        let prefix = required(self.prefix, "Object prefix", "prefix")?;
        let input_records = match self.input_record {
            None => return Err(ConfigError::missing("Total input record number", "input-record")),
            Some(n) => NonZeroU64::new(n).ok_or(ConfigError::ZeroInputRecords)?,
        };
        let log_delay = required(self.log_delay, "Log delay", "log-delay")?;

        let target = match destination {
            Destination::S3 => SinkTarget::S3 {
                region: required(self.region, "AWS Region", "region")?,
                bucket: required(self.bucket, "Bucket name", "bucket")?,
                prefix,
            },
            Destination::Cloudwatch => SinkTarget::CloudWatch {
                region: required(self.region, "AWS Region", "region")?,
                log_group: required(self.log_group, "Log group name", "log-group")?,
                log_stream: prefix,
            },
            Destination::Local => SinkTarget::Local {
                dir: self
                    .local_dir
                    .ok_or(ConfigError::missing("Local directory", "local-dir"))?,
                prefix,
            },
        };

        Ok(RunConfig {
            target,
            input_records,
            log_delay,
            output: self.output,
        })
    }
}

/// Harness tuning, read from the environment.
#[derive(Envconfig, Clone, Debug)]
pub struct Settings {
    #[envconfig(from = "PAGE_DELAY_MS", default = "100")]
    pub page_delay_ms: u64,

    #[envconfig(from = "THROTTLE_BACKOFF_SECONDS", default = "5")]
    pub throttle_backoff_seconds: u64,

    #[envconfig(from = "THROTTLE_BACKOFF_MULTIPLIER", default = "1.0")]
    pub throttle_backoff_multiplier: f64,

    #[envconfig(from = "THROTTLE_BACKOFF_MAX_SECONDS", default = "60")]
    pub throttle_backoff_max_seconds: u64,

    // 0 means unlimited retries
    #[envconfig(from = "THROTTLE_MAX_ATTEMPTS", default = "60")]
    pub throttle_max_attempts: u32,

    #[envconfig(from = "LOG_EVENTS_PAGE_LIMIT", default = "10000")]
    pub log_events_page_limit: i32,

    // MinIO / LocalStack
    #[envconfig(from = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,
}

impl Settings {
    pub fn throttle_policy(&self) -> ThrottlePolicy {
        let initial = Duration::from_secs(self.throttle_backoff_seconds);
        ThrottlePolicy::new(
            Duration::from_millis(self.page_delay_ms),
            BackoffPolicy::new(
                initial,
                self.throttle_backoff_multiplier,
                Duration::from_secs(self.throttle_backoff_max_seconds).max(initial),
            ),
            self.throttle_max_attempts,
        )
    }
}
