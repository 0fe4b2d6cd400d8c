//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::{EncoderError, EncoderResult, TranscodeStage};
use crate::infrastructure::storage::BlobStore;
use crate::infrastructure::transcoder::Transcoder;
use crate::modules::encoding::model::{Job, JobStatus, Video};
use crate::modules::encoding::repository::JobStore;

#[derive(Default)]
pub struct MemoryJobStore {
    videos: Mutex<HashMap<Uuid, Video>>,
    jobs: Mutex<HashMap<Uuid, Job>>,
    history: Mutex<Vec<(Uuid, JobStatus)>>,
    pub fail_video_inserts: AtomicBool,
    pub fail_job_inserts: AtomicBool,
}

impl MemoryJobStore {
    /// Every status this job was written with, in write order.
    pub fn history(&self, job_id: Uuid) -> Vec<JobStatus> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == job_id)
            .map(|(_, status)| *status)
            .collect()
    }

    pub fn video_ids(&self) -> Vec<Uuid> {
        self.videos.lock().unwrap().keys().copied().collect()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert_video(&self, video: &Video) -> Result<Video> {
        if self.fail_video_inserts.load(Ordering::SeqCst) {
            return Err(anyhow!("videos table is read-only"));
        }
        let mut videos = self.videos.lock().unwrap();
        if videos.contains_key(&video.id) {
            return Err(anyhow!("duplicate video id {}", video.id));
        }
        videos.insert(video.id, video.clone());
        Ok(video.clone())
    }

    async fn insert_job(&self, job: &Job) -> Result<Job> {
        if self.fail_job_inserts.load(Ordering::SeqCst) {
            return Err(anyhow!("jobs table is read-only"));
        }
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        self.history.lock().unwrap().push((job.id, job.status));
        Ok(job.clone())
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(anyhow!("Job {} not found", job.id));
        }
        jobs.insert(job.id, job.clone());
        self.history.lock().unwrap().push((job.id, job.status));
        Ok(())
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn find_video(&self, id: Uuid) -> Result<Option<Video>> {
        let Some(mut video) = self.videos.lock().unwrap().get(&id).cloned() else {
            return Ok(None);
        };
        video.jobs = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.video_id == id)
            .cloned()
            .map(|mut j| {
                j.video = None;
                j
            })
            .collect();
        Ok(Some(video))
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<(String, String), Bytes>>,
    stored: Mutex<Vec<(String, String)>>,
    failing_keys: Mutex<HashSet<String>>,
    store_delay: Option<Duration>,
}

impl MemoryBlobStore {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            store_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn put_object(&self, bucket: &str, key: &str, data: &'static [u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), Bytes::from_static(data));
    }

    pub fn fail_on(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    /// Keys written so far, sorted.
    pub fn stored_keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .stored
            .lock()
            .unwrap()
            .iter()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("NoSuchKey: {}/{}", bucket, key))
    }

    async fn store(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        if let Some(delay) = self.store_delay {
            tokio::time::sleep(delay).await;
        }
        tokio::fs::metadata(local_path).await?;
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(anyhow!("503 SlowDown for {}", key));
        }
        self.stored
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        Ok(())
    }
}

/// Writes a small DASH-shaped tree instead of running Bento4.
#[derive(Default)]
pub struct FakeTranscoder {
    pub fail_stage: Option<TranscodeStage>,
}

impl FakeTranscoder {
    pub fn failing(stage: TranscodeStage) -> Self {
        Self {
            fail_stage: Some(stage),
        }
    }

    pub const PACKAGE_FILES: [&'static str; 4] = [
        "stream.mpd",
        "video/avc1/init.mp4",
        "video/avc1/seg-1.m4s",
        "audio/und/mp4a/seg-1.m4s",
    ];
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn fragment(&self, input: &Path, output: &Path) -> EncoderResult<String> {
        if self.fail_stage == Some(TranscodeStage::Fragment) {
            return Err(EncoderError::transcode(
                TranscodeStage::Fragment,
                "ERROR: cannot open input file",
            ));
        }
        tokio::fs::copy(input, output)
            .await
            .map_err(|e| EncoderError::transcode(TranscodeStage::Fragment, e.to_string()))?;
        Ok(String::new())
    }

    async fn package(
        &self,
        input: &Path,
        output_dir: &Path,
        _extra_args: &[String],
    ) -> EncoderResult<String> {
        if self.fail_stage == Some(TranscodeStage::Package) {
            return Err(EncoderError::transcode(
                TranscodeStage::Package,
                "ERROR: mp4dash failed",
            ));
        }
        tokio::fs::metadata(input)
            .await
            .map_err(|e| EncoderError::transcode(TranscodeStage::Package, e.to_string()))?;
        for file in Self::PACKAGE_FILES {
            let path = output_dir.join(file);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    EncoderError::transcode(TranscodeStage::Package, e.to_string())
                })?;
            }
            tokio::fs::write(&path, b"segment")
                .await
                .map_err(|e| EncoderError::transcode(TranscodeStage::Package, e.to_string()))?;
        }
        Ok("Parsing media file 1\n".to_string())
    }
}
