use std::sync::Arc;

use tracing::{error, info, warn};
use validator::Validate;

use super::events::VideoMessage;
use super::model::{Job, JobStatus, Video};
use super::repository::JobStore;
use super::video_service::VideoService;
use crate::config::settings::PipelineConfig;
use crate::error::{EncoderError, EncoderResult};
use crate::infrastructure::storage::BlobStore;
use crate::infrastructure::transcoder::Transcoder;
use crate::workers::upload::VideoUpload;

/// Drives one message from intake to a terminal job status. Shared by every
/// executor of the job pool; holds no per-job state.
pub struct JobService {
    store: Arc<dyn JobStore>,
    blob: Arc<dyn BlobStore>,
    videos: VideoService,
    config: PipelineConfig,
    package_args: Vec<String>,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        blob: Arc<dyn BlobStore>,
        transcoder: Arc<dyn Transcoder>,
        config: PipelineConfig,
    ) -> Self {
        let videos = VideoService::new(
            Arc::clone(&blob),
            transcoder,
            config.local_storage_path.clone(),
        );
        Self {
            store,
            blob,
            videos,
            config,
            package_args: Vec::new(),
        }
    }

    /// Extra arguments appended to every packaging invocation.
    pub fn with_package_args(mut self, args: Vec<String>) -> Self {
        self.package_args = args;
        self
    }

    #[cfg(test)]
    pub fn videos(&self) -> &VideoService {
        &self.videos
    }

    /// Validates and decodes `body`, then persists its video and a `Pending` job.
    pub async fn accept(&self, body: &[u8]) -> EncoderResult<Job> {
        VideoMessage::check_structure(body)?;

        let video = VideoMessage::decode(body)?.into_video();
        video
            .validate()
            .map_err(|e| EncoderError::invalid_video(e.to_string()))?;

        let video = self
            .store
            .insert_video(&video)
            .await
            .map_err(EncoderError::persistence)?;

        let job = Job::new(&self.config.output_bucket, video);
        let job = self
            .store
            .insert_job(&job)
            .await
            .map_err(EncoderError::persistence)?;

        info!("📥 Job {} accepted for video {}", job.id, job.video_id);
        Ok(job)
    }

    /// Runs every stage for `job`. On failure the source and fragment are
    /// discarded, the job is persisted as `Failed` and the first stage error
    /// is returned. The working directory is only removed after an upload.
    pub async fn start(&self, job: &mut Job) -> EncoderResult<()> {
        let Some(video) = job.video.clone() else {
            let err = EncoderError::invalid_video(format!("job {} has no video", job.id));
            return Err(self.fail_job(job, err).await);
        };

        if let Err(err) = self.run_stages(job, &video).await {
            if let Err(e) = self.videos.discard_inputs(&video).await {
                warn!("Job {} left scratch files behind: {}", job.id, e);
            }
            return Err(self.fail_job(job, err).await);
        }

        Ok(())
    }

    async fn run_stages(&self, job: &mut Job, video: &Video) -> EncoderResult<()> {
        self.change_status(job, JobStatus::Starting).await?;
        self.videos.download(video, &self.config.input_bucket).await?;

        self.change_status(job, JobStatus::Fragmenting).await?;
        self.videos.fragment(video).await?;

        self.change_status(job, JobStatus::Encoding).await?;
        self.videos.encode(video, &self.package_args).await?;

        self.change_status(job, JobStatus::Uploading).await?;
        self.perform_upload(job, video).await?;

        if let Err(e) = self.videos.finish(video).await {
            // The artifacts are already published; a stale scratch file does not undo that.
            warn!("Job {} uploaded but cleanup failed: {}", job.id, e);
        }

        self.change_status(job, JobStatus::Complete).await?;
        info!("✅ Job {} complete", job.id);
        Ok(())
    }

    async fn perform_upload(&self, job: &Job, video: &Video) -> EncoderResult<()> {
        let upload = VideoUpload::load(
            &self.videos.work_dir(video),
            self.config.local_storage_path.clone(),
            job.output_bucket_path.clone(),
        )?;

        info!(
            "⬆️ Uploading {} file(s) for job {}",
            upload.paths().len(),
            job.id
        );
        let report = upload
            .process_upload(Arc::clone(&self.blob), self.config.upload_concurrency)
            .await?;
        info!("Job {} published {} file(s)", job.id, report.uploaded);
        Ok(())
    }

    async fn change_status(&self, job: &mut Job, status: JobStatus) -> EncoderResult<()> {
        job.advance(status)?;
        self.store
            .update_job(job)
            .await
            .map_err(EncoderError::persistence)?;
        info!("Job {} is {}", job.id, status);
        Ok(())
    }

    async fn fail_job(&self, job: &mut Job, err: EncoderError) -> EncoderError {
        error!("❌ Job {} failed: {}", job.id, err);
        if job.fail(&err) {
            if let Err(e) = self.store.update_job(job).await {
                error!("Could not persist failure of job {}: {}", job.id, e);
            }
        }
        err
    }
}
