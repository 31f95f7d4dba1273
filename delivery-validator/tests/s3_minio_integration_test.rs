//! MinIO integration test for the S3 reader: upload a few Firehose style
//! objects over more than one listing page, validate them, check the report.
//!
//! Requires MinIO running at localhost:19000. Skips if unreachable.

use std::num::NonZeroU64;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as AwsS3Client;
use delivery_validator::{
    source::{object_store::ObjectStoreReader, s3::S3ObjectStore},
    validation::validate,
};

const MINIO_ENDPOINT: &str = "http://localhost:19000";
const MINIO_ACCESS_KEY: &str = "object_storage_root_user";
const MINIO_SECRET_KEY: &str = "object_storage_root_password";

const TEST_BUCKET: &str = "delivery-validator-test";
const TEST_PREFIX: &str = "s3_minio_integration/";

async fn create_minio_client() -> AwsS3Client {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url(MINIO_ENDPOINT)
        .region(Region::new("us-east-1"))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            MINIO_ACCESS_KEY,
            MINIO_SECRET_KEY,
            None,
            None,
            "test",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&config)
        .force_path_style(true)
        .build();

    AwsS3Client::from_conf(s3_config)
}

async fn cleanup_prefix(client: &AwsS3Client) {
    // each pass deletes one listing page
    for _ in 0..10 {
        let Ok(response) = client
            .list_objects_v2()
            .bucket(TEST_BUCKET)
            .prefix(TEST_PREFIX)
            .send()
            .await
        else {
            return;
        };
        if response.contents().is_empty() {
            return;
        }
        for object in response.contents() {
            if let Some(key) = object.key() {
                drop(
                    client
                        .delete_object()
                        .bucket(TEST_BUCKET)
                        .key(key)
                        .send()
                        .await,
                );
            }
        }
    }
}

#[tokio::test]
async fn test_s3_minio_integration() {
    let client = create_minio_client().await;
    if client.list_buckets().send().await.is_err() {
        eprintln!("MinIO unreachable at {MINIO_ENDPOINT}, skipping test");
        return;
    }
    drop(client.create_bucket().bucket(TEST_BUCKET).send().await);
    cleanup_prefix(&client).await;

    // 1005 objects forces a second listing page, MinIO pages at 1000
    for part in 0..1005u32 {
        let body = format!(
            r#"{{"Log":"{:08}_1639151827578_RandomString"}}"#,
            part % 1000
        );
        client
            .put_object()
            .bucket(TEST_BUCKET)
            .key(format!("{TEST_PREFIX}part-{part:05}"))
            .body(ByteStream::from(body.into_bytes()))
            .send()
            .await
            .unwrap();
    }

    let mut reader = ObjectStoreReader::new(
        S3ObjectStore::new(client.clone()),
        TEST_BUCKET,
        TEST_PREFIX,
    );
    let report = validate(&mut reader, NonZeroU64::new(1000).unwrap(), "0s")
        .await
        .unwrap();

    assert_eq!(report.total_s3_obj, Some(1005));
    assert_eq!(report.total_destination, 1005);
    assert_eq!(report.unique, 1000);
    assert_eq!(report.duplicate, 5);
    assert_eq!(report.missing, 0);

    cleanup_prefix(&client).await;
}
