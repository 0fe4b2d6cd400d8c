use std::path::Path;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{debug, info};

use super::BlobStore;

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
}

impl StorageService {
    pub async fn new(endpoint: &str, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ Connected to S3 (MinIO)");

        Self { client }
    }
}

#[async_trait]
impl BlobStore for StorageService {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to get {}/{}: {}", bucket, key, e))?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| anyhow!("Failed to read {}/{}: {}", bucket, key, e))?;

        Ok(data.into_bytes())
    }

    async fn store(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| anyhow!("Failed to open {}: {}", local_path.display(), e))?;

        let content_type = mime_guess::from_path(local_path).first_or_octet_stream();

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type.essence_str())
            .send()
            .await
            .map_err(|e| anyhow!("Failed to put {}/{}: {}", bucket, key, e))?;

        debug!("Stored {}/{}", bucket, key);
        Ok(())
    }
}
