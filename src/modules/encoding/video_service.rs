use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use super::model::Video;
use crate::error::{EncoderError, EncoderResult, TranscodeStage};
use crate::infrastructure::storage::BlobStore;
use crate::infrastructure::transcoder::Transcoder;

/// Local file layout and the per-video stages. Every file a video touches
/// is named after its id, so executors never share paths.
pub struct VideoService {
    blob: Arc<dyn BlobStore>,
    transcoder: Arc<dyn Transcoder>,
    local_storage_path: PathBuf,
}

impl VideoService {
    pub fn new(
        blob: Arc<dyn BlobStore>,
        transcoder: Arc<dyn Transcoder>,
        local_storage_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            blob,
            transcoder,
            local_storage_path: local_storage_path.into(),
        }
    }

    pub fn source_path(&self, video: &Video) -> PathBuf {
        self.local_storage_path.join(format!("{}.mp4", video.id))
    }

    pub fn fragment_path(&self, video: &Video) -> PathBuf {
        self.local_storage_path.join(format!("{}.frag", video.id))
    }

    pub fn work_dir(&self, video: &Video) -> PathBuf {
        self.local_storage_path.join(video.id.to_string())
    }

    /// Acquire: copies the source object into `<root>/<id>.mp4`.
    pub async fn download(&self, video: &Video, bucket: &str) -> EncoderResult<PathBuf> {
        let data = self
            .blob
            .fetch(bucket, &video.file_path)
            .await
            .map_err(EncoderError::acquisition)?;

        let target = self.source_path(video);
        tokio::fs::write(&target, &data)
            .await
            .map_err(|e| EncoderError::acquisition(format!("{}: {}", target.display(), e)))?;

        info!("⬇️ Video {} stored ({} bytes)", video.id, data.len());
        Ok(target)
    }

    /// Fragment: prepares the working directory, then writes `<root>/<id>.frag`.
    pub async fn fragment(&self, video: &Video) -> EncoderResult<()> {
        let work_dir = self.work_dir(video);
        match tokio::fs::create_dir(&work_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!("Working directory {} already exists", work_dir.display());
            }
            Err(e) => {
                return Err(EncoderError::transcode(
                    TranscodeStage::Fragment,
                    format!("cannot create {}: {}", work_dir.display(), e),
                ));
            }
        }

        self.transcoder
            .fragment(&self.source_path(video), &self.fragment_path(video))
            .await?;

        info!("🧩 Video {} fragmented", video.id);
        Ok(())
    }

    /// Package: renders the DASH manifest and segments into the working directory.
    pub async fn encode(&self, video: &Video, extra_args: &[String]) -> EncoderResult<()> {
        self.transcoder
            .package(&self.fragment_path(video), &self.work_dir(video), extra_args)
            .await?;

        info!("🎞️ Video {} packaged", video.id);
        Ok(())
    }

    /// Finalize: removes the source, the fragment and the working directory.
    /// Files that are already gone are not an error, so running it twice is safe.
    pub async fn finish(&self, video: &Video) -> EncoderResult<()> {
        let mut failures = self.remove_inputs(video).await;

        let work_dir = self.work_dir(video);
        if let Err(e) = remove(&work_dir, true).await {
            error!("Error removing directory {}: {}", work_dir.display(), e);
            failures.push(format!("{}: {}", work_dir.display(), e));
        }

        if !failures.is_empty() {
            return Err(EncoderError::cleanup(failures.join("; ")));
        }

        info!("🧹 Files have been removed: {}", video.id);
        Ok(())
    }

    /// Removes the source and the fragment but keeps the working directory.
    pub async fn discard_inputs(&self, video: &Video) -> EncoderResult<()> {
        let failures = self.remove_inputs(video).await;
        if !failures.is_empty() {
            return Err(EncoderError::cleanup(failures.join("; ")));
        }
        Ok(())
    }

    async fn remove_inputs(&self, video: &Video) -> Vec<String> {
        let mut failures = Vec::new();
        for file in [self.source_path(video), self.fragment_path(video)] {
            if let Err(e) = remove(&file, false).await {
                error!("Error removing {}: {}", file.display(), e);
                failures.push(format!("{}: {}", file.display(), e));
            }
        }
        failures
    }
}

async fn remove(path: &Path, recursive: bool) -> std::io::Result<()> {
    let result = if recursive {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
