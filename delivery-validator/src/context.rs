use anyhow::{Context, Error};
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::Region;
use tracing::info;

use crate::config::{Settings, SinkTarget};
use crate::source::cloudwatch::CloudWatchLogEvents;
use crate::source::folder::FolderObjectStore;
use crate::source::log_stream::LogStreamReader;
use crate::source::object_store::ObjectStoreReader;
use crate::source::s3::S3ObjectStore;
use crate::source::SinkReader;

async fn load_aws_config(region: &str, endpoint_url: Option<&str>) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
    if let Some(endpoint) = endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    loader.load().await
}

/// Builds the reader for the configured destination. This is the only place
/// that knows which concrete client backs which destination.
pub async fn build_reader(
    target: &SinkTarget,
    settings: &Settings,
) -> Result<Box<dyn SinkReader>, Error> {
    let endpoint_url = settings.endpoint_url.as_deref();
    match target {
        SinkTarget::S3 {
            region,
            bucket,
            prefix,
        } => {
            info!("Validating s3://{bucket}/{prefix} in {region}");
            let config = load_aws_config(region, endpoint_url).await;
            // MinIO and LocalStack need path style addressing
            let s3_config = aws_sdk_s3::config::Builder::from(&config)
                .force_path_style(endpoint_url.is_some())
                .build();
            let client = S3ObjectStore::new(aws_sdk_s3::Client::from_conf(s3_config));
            Ok(Box::new(ObjectStoreReader::new(
                client,
                bucket.clone(),
                prefix.clone(),
            )))
        }
        SinkTarget::CloudWatch {
            region,
            log_group,
            log_stream,
        } => {
            info!("Validating CloudWatch log stream {log_group}/{log_stream} in {region}");
            let config = load_aws_config(region, endpoint_url).await;
            let client = CloudWatchLogEvents::new(aws_sdk_cloudwatchlogs::Client::new(&config));
            Ok(Box::new(
                LogStreamReader::new(
                    client,
                    log_group.clone(),
                    log_stream.clone(),
                    settings.throttle_policy(),
                )
                .with_page_limit(settings.log_events_page_limit),
            ))
        }
        SinkTarget::Local { dir, prefix } => {
            info!("Validating local directory {dir:?} with prefix {prefix}");
            let client = FolderObjectStore::new(dir)
                .await
                .with_context(|| format!("Unable to open local directory {dir:?}"))?;
            Ok(Box::new(ObjectStoreReader::new(
                client,
                dir.to_string_lossy().to_string(),
                prefix.clone(),
            )))
        }
    }
}
