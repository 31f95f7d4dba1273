use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use futures::stream::{self, StreamExt};

use crate::error::{friendly_sink_message, SinkError};

use super::{ObjectBody, ObjectListing, ObjectStoreClient};

pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStoreClient for S3ObjectStore {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectListing, SinkError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(|sdk_error| {
                let friendly_msg = friendly_sink_message(&sdk_error, bucket, "list objects");
                SinkError::unavailable_from(
                    format!("Error occurred to get the objects from bucket {bucket:?}: {friendly_msg}"),
                    sdk_error,
                )
            })?;

        Ok(ObjectListing {
            keys: output
                .contents
                .unwrap_or_default()
                .into_iter()
                .filter_map(|o| o.key)
                .collect(),
            is_truncated: output.is_truncated.unwrap_or(false),
            next_continuation_token: output.next_continuation_token,
        })
    }

    async fn open_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, SinkError> {
        let get = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|sdk_error| {
                let friendly_msg = friendly_sink_message(&sdk_error, bucket, "get object");
                SinkError::unavailable_from(
                    format!("Error to get S3 object s3://{bucket}/{key}: {friendly_msg}"),
                    sdk_error,
                )
            })?;

        let location = format!("s3://{bucket}/{key}");
        let body = stream::try_unfold((get.body, location), |(mut body, location)| async move {
            match body.try_next().await {
                Ok(Some(chunk)) => Ok(Some((chunk, (body, location)))),
                Ok(None) => Ok(None),
                Err(e) => Err(SinkError::unavailable_from(
                    format!("Failed to read body data from S3 object {location}"),
                    e,
                )),
            }
        });
        Ok(body.boxed())
    }
}
