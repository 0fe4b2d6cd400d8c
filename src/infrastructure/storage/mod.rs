use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub mod s3;

/// Object storage as seen by the pipeline: whole-object reads, file uploads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes>;
    async fn store(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()>;
}
