//! Fixed-size pool of executors draining one inbound message channel.
//!
//! Each executor takes one message at a time and drives it through
//! [`JobService`] to exactly one [`JobWorkerResult`]. Decoding happens into
//! executor-local values, so executors share nothing mutable. The pool stops
//! once the inbound channel is closed and drained.

use std::sync::Arc;

use lapin::message::Delivery;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::EncoderError;
use crate::modules::encoding::job_service::JobService;
use crate::modules::encoding::model::Job;

/// Anything carrying a raw message body.
pub trait InboundMessage: Send + 'static {
    fn body(&self) -> &[u8];
}

impl InboundMessage for Delivery {
    fn body(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug)]
pub struct JobWorkerResult<M> {
    /// `None` when the message never produced a persisted job.
    pub job: Option<Job>,
    pub message: M,
    pub error: Option<EncoderError>,
}

impl<M> JobWorkerResult<M> {
    fn completed(job: Job, message: M) -> Self {
        Self {
            job: Some(job),
            message,
            error: None,
        }
    }

    fn failed(job: Option<Job>, message: M, error: EncoderError) -> Self {
        Self {
            job,
            message,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct JobWorkerPool {
    workers: JoinSet<()>,
}

impl JobWorkerPool {
    pub fn spawn<M: InboundMessage>(
        size: usize,
        service: Arc<JobService>,
        messages: async_channel::Receiver<M>,
        results: mpsc::Sender<JobWorkerResult<M>>,
    ) -> Self {
        let size = size.max(1);
        let mut workers = JoinSet::new();
        for worker_id in 0..size {
            workers.spawn(job_worker(
                worker_id,
                Arc::clone(&service),
                messages.clone(),
                results.clone(),
            ));
        }

        info!("🎬 Job worker pool started with {} executor(s)", size);
        Self { workers }
    }

    /// Waits for every executor to exit.
    pub async fn join(mut self) {
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                error!("Job executor panicked: {}", e);
            }
        }
        info!("Job worker pool stopped");
    }
}

async fn job_worker<M: InboundMessage>(
    worker_id: usize,
    service: Arc<JobService>,
    messages: async_channel::Receiver<M>,
    results: mpsc::Sender<JobWorkerResult<M>>,
) {
    while let Ok(message) = messages.recv().await {
        let result = process_message(&service, message).await;
        if results.send(result).await.is_err() {
            warn!("Executor {} has no result receiver, stopping", worker_id);
            break;
        }
    }
}

async fn process_message<M: InboundMessage>(service: &JobService, message: M) -> JobWorkerResult<M> {
    let mut job = match service.accept(message.body()).await {
        Ok(job) => job,
        Err(error) => {
            warn!("Rejected message: {}", error);
            return JobWorkerResult::failed(None, message, error);
        }
    };

    match service.start(&mut job).await {
        Ok(()) => JobWorkerResult::completed(job, message),
        Err(error) => JobWorkerResult::failed(Some(job), message, error),
    }
}
