//! Fan-out upload of one job's packaged output.
//!
//! A feeder task pushes task indices into a bounded channel, `concurrency`
//! workers upload the files, and a supervisor emits [`UploadSignal::Completed`]
//! once every worker has exited. The caller returns on the first failure
//! without waiting for the rest. Files already being uploaded finish, and
//! each worker takes at most one more file before it notices that the caller
//! has stopped listening. A worker that panics fails the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::error::{EncoderError, EncoderResult};
use crate::infrastructure::storage::BlobStore;

#[derive(Debug)]
pub enum UploadSignal {
    Uploaded(PathBuf),
    Failed { path: PathBuf, reason: String },
    /// A worker died without reporting its file.
    WorkerLost(String),
    /// Sent once, after all workers have exited.
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: usize,
}

pub struct VideoUpload {
    paths: Arc<[PathBuf]>,
    local_storage_path: PathBuf,
    output_bucket: String,
    errors: Arc<Mutex<Vec<PathBuf>>>,
}

impl VideoUpload {
    /// Snapshots every regular file below `video_dir`. The set is fixed from
    /// here on.
    pub fn load(
        video_dir: &Path,
        local_storage_path: impl Into<PathBuf>,
        output_bucket: impl Into<String>,
    ) -> EncoderResult<Self> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(video_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| EncoderError::Upload {
                failed: vec![],
                reason: format!("cannot list {}: {}", video_dir.display(), e),
            })?;
            if entry.file_type().is_file() {
                paths.push(entry.into_path());
            }
        }

        Ok(Self {
            paths: paths.into(),
            local_storage_path: local_storage_path.into(),
            output_bucket: output_bucket.into(),
            errors: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Paths whose upload failed so far.
    pub async fn errors(&self) -> Vec<PathBuf> {
        self.errors.lock().await.clone()
    }

    pub async fn process_upload(
        &self,
        blob: Arc<dyn BlobStore>,
        concurrency: usize,
    ) -> EncoderResult<UploadReport> {
        let concurrency = concurrency.max(1);
        let (task_tx, task_rx) = async_channel::bounded::<usize>(concurrency);
        let (result_tx, mut result_rx) = mpsc::channel::<UploadSignal>(concurrency);

        let mut workers = JoinSet::new();
        for worker_id in 0..concurrency {
            let worker = UploadWorker {
                id: worker_id,
                paths: Arc::clone(&self.paths),
                local_storage_path: self.local_storage_path.clone(),
                output_bucket: self.output_bucket.clone(),
                errors: Arc::clone(&self.errors),
                blob: Arc::clone(&blob),
            };
            workers.spawn(worker.run(task_rx.clone(), result_tx.clone()));
        }
        drop(task_rx);

        let total = self.paths.len();
        tokio::spawn(async move {
            for index in 0..total {
                if task_tx.send(index).await.is_err() {
                    break;
                }
            }
            // Dropping the sender closes the channel.
        });

        tokio::spawn(async move {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    error!("Upload worker panicked: {}", e);
                    let _ = result_tx.send(UploadSignal::WorkerLost(e.to_string())).await;
                }
            }
            let _ = result_tx.send(UploadSignal::Completed).await;
        });

        let mut uploaded = 0;
        while let Some(signal) = result_rx.recv().await {
            match signal {
                UploadSignal::Uploaded(path) => {
                    uploaded += 1;
                    debug!("Uploaded {} ({}/{})", path.display(), uploaded, total);
                }
                UploadSignal::Failed { path, reason } => {
                    return Err(EncoderError::Upload {
                        failed: self.errors().await,
                        reason: format!("{}: {}", path.display(), reason),
                    });
                }
                UploadSignal::WorkerLost(reason) => {
                    return Err(EncoderError::Upload {
                        failed: self.errors().await,
                        reason,
                    });
                }
                UploadSignal::Completed if uploaded != total => {
                    return Err(EncoderError::Upload {
                        failed: self.errors().await,
                        reason: format!("only {} of {} file(s) uploaded", uploaded, total),
                    });
                }
                UploadSignal::Completed => {
                    info!("⬆️ Upload completed: {} file(s) to {}", uploaded, self.output_bucket);
                    return Ok(UploadReport { uploaded });
                }
            }
        }

        Err(EncoderError::Upload {
            failed: self.errors().await,
            reason: "upload workers stopped without reporting".to_string(),
        })
    }
}

/// Object key for `path`: its location relative to the local storage root.
pub fn object_key(local_storage_path: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(local_storage_path).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

struct UploadWorker {
    id: usize,
    paths: Arc<[PathBuf]>,
    local_storage_path: PathBuf,
    output_bucket: String,
    errors: Arc<Mutex<Vec<PathBuf>>>,
    blob: Arc<dyn BlobStore>,
}

impl UploadWorker {
    async fn run(self, tasks: async_channel::Receiver<usize>, results: mpsc::Sender<UploadSignal>) {
        while let Ok(index) = tasks.recv().await {
            let path = self.paths[index].clone();
            let signal = match self.upload(&path).await {
                Ok(()) => UploadSignal::Uploaded(path),
                Err(reason) => {
                    error!("error during the upload: {}. Error: {}", path.display(), reason);
                    self.errors.lock().await.push(path.clone());
                    UploadSignal::Failed { path, reason }
                }
            };

            if results.send(signal).await.is_err() {
                debug!("Upload worker {} stopping, nobody is listening", self.id);
                break;
            }
        }
    }

    async fn upload(&self, path: &Path) -> Result<(), String> {
        let key = object_key(&self.local_storage_path, path).ok_or_else(|| {
            format!(
                "{} is outside {}",
                path.display(),
                self.local_storage_path.display()
            )
        })?;

        self.blob
            .store(&self.output_bucket, &key, path)
            .await
            .map_err(|e| e.to_string())
    }
}
