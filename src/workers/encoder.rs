use std::sync::Arc;

use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicRejectOptions};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::job_worker::{InboundMessage, JobWorkerPool, JobWorkerResult};
use crate::config::settings::AppConfig;
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::modules::encoding::events::JobNotification;
use crate::modules::encoding::job_service::JobService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Reject without requeue; the broker dead-letters the message.
    Reject,
}

/// What to tell the broker and the notification exchange about one result.
pub fn settlement<M: InboundMessage>(result: &JobWorkerResult<M>) -> (Disposition, Option<JobNotification>) {
    if result.is_success() {
        let notification = result.job.clone().map(JobNotification::Completed);
        return (Disposition::Ack, notification);
    }

    let notification = result
        .error
        .as_ref()
        .map(|err| JobNotification::failed(result.message.body(), result.job.as_ref(), err));
    (Disposition::Reject, notification)
}

struct Notifier {
    rabbit: RabbitMqService,
    exchange: String,
    routing_key: String,
}

impl Notifier {
    async fn publish(&self, notification: &JobNotification) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(notification)?;
        self.rabbit
            .publish(&self.exchange, &self.routing_key, &payload)
            .await
    }
}

pub async fn start_encoder_worker(
    rabbit: RabbitMqService,
    service: Arc<JobService>,
    config: AppConfig,
) -> anyhow::Result<()> {
    info!("🎥 Starting Encoder Worker...");

    let workers = config.concurrency_workers.max(1);
    let prefetch = u16::try_from(workers).unwrap_or(u16::MAX);

    let mut consumer = rabbit
        .consume(
            &config.consumer_queue,
            &config.consumer_name,
            &config.dead_letter_exchange,
            prefetch,
        )
        .await?;

    info!("🎥 Encoder Worker listening on '{}'", config.consumer_queue);

    let (message_tx, message_rx) = async_channel::bounded::<Delivery>(workers);
    let (result_tx, result_rx) = mpsc::channel::<JobWorkerResult<Delivery>>(workers);

    let pool = JobWorkerPool::spawn(workers, service, message_rx, result_tx);

    let notifier = Notifier {
        rabbit: rabbit.clone(),
        exchange: config.notification_exchange.clone(),
        routing_key: config.notification_routing_key.clone(),
    };
    let results = tokio::spawn(handle_results(notifier, result_rx));

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                info!("📦 Received encoding request");
                if message_tx.send(delivery).await.is_err() {
                    error!("Job worker pool is gone, stopping consumer");
                    break;
                }
            }
            Err(e) => error!("❌ Consumer error: {}", e),
        }
    }

    warn!("Consumer stream ended, draining in-flight jobs");
    message_tx.close();
    pool.join().await;
    results.await?;

    info!("Encoder Worker stopped");
    Ok(())
}

async fn handle_results(notifier: Notifier, mut results: mpsc::Receiver<JobWorkerResult<Delivery>>) {
    while let Some(result) = results.recv().await {
        let (disposition, notification) = settlement(&result);

        if let Some(notification) = notification {
            if let Err(e) = notifier.publish(&notification).await {
                error!("Failed to publish job notification: {}", e);
            }
        }

        let settled = match disposition {
            Disposition::Ack => {
                if let Some(job) = &result.job {
                    info!("✅ Job {} completed successfully", job.id);
                }
                result.message.ack(BasicAckOptions::default()).await
            }
            Disposition::Reject => {
                if let Some(err) = &result.error {
                    error!("❌ Message rejected ({}): {}", err.kind(), err);
                }
                result
                    .message
                    .reject(BasicRejectOptions { requeue: false })
                    .await
            }
        };

        if let Err(e) = settled {
            error!("Failed to settle message: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::error::EncoderError;
    use crate::modules::encoding::model::{Job, JobStatus, Video};

    struct Body(&'static [u8]);

    impl InboundMessage for Body {
        fn body(&self) -> &[u8] {
            self.0
        }
    }

    fn job() -> Job {
        let mut job = Job::new(
            "output",
            Video {
                id: Uuid::new_v4(),
                resource_id: None,
                file_path: "clip.mp4".to_string(),
                created_at: Some(OffsetDateTime::now_utc()),
                jobs: vec![],
            },
        );
        job.status = JobStatus::Complete;
        job
    }

    #[test]
    fn success_is_acked_and_announced() {
        let result = JobWorkerResult {
            job: Some(job()),
            message: Body(br#"{"file_path":"clip.mp4"}"#),
            error: None,
        };

        let (disposition, notification) = settlement(&result);
        assert_eq!(disposition, Disposition::Ack);
        let json = serde_json::to_value(notification.unwrap()).unwrap();
        assert_eq!(json["status"], "COMPLETE");
        assert_eq!(json["video"]["file_path"], "clip.mp4");
    }

    #[test]
    fn failure_is_rejected_with_error_notification() {
        let failed = job();
        let job_id = failed.id;
        let result = JobWorkerResult {
            job: Some(failed),
            message: Body(br#"{"file_path":"clip.mp4"}"#),
            error: Some(EncoderError::acquisition("NoSuchKey")),
        };

        let (disposition, notification) = settlement(&result);
        assert_eq!(disposition, Disposition::Reject);
        let json = serde_json::to_value(notification.unwrap()).unwrap();
        assert_eq!(json["message"]["file_path"], "clip.mp4");
        assert_eq!(json["kind"], "acquisition_error");
        assert_eq!(json["job_id"], job_id.to_string());
    }

    #[test]
    fn malformed_message_is_rejected() {
        let result = JobWorkerResult {
            job: None,
            message: Body(b"not-json"),
            error: Some(EncoderError::malformed("expected value at line 1 column 1")),
        };

        let (disposition, _) = settlement(&result);
        assert_eq!(disposition, Disposition::Reject);
    }
}
