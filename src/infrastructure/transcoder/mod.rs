use std::path::Path;

use async_trait::async_trait;

use crate::error::EncoderResult;

pub mod bento4;

/// Black-box media tooling. Both profiles return the tool's combined
/// stdout/stderr on success and `EncoderError::Transcode` on failure.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn fragment(&self, input: &Path, output: &Path) -> EncoderResult<String>;

    async fn package(
        &self,
        input: &Path,
        output_dir: &Path,
        extra_args: &[String],
    ) -> EncoderResult<String>;
}
