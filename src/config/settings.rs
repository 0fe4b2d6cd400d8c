use std::path::PathBuf;
use std::thread::available_parallelism;
use std::time::Duration;

use serde::Deserialize;
use crate::config::env::{self, EnvKey};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub rabbitmq_url: String,
    pub consumer_queue: String,
    pub consumer_name: String,
    pub dead_letter_exchange: String,
    pub notification_exchange: String,
    pub notification_routing_key: String,
    pub minio_url: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub input_bucket: String,
    pub output_bucket: String,
    pub local_storage_path: PathBuf,
    pub concurrency_workers: usize,
    pub concurrency_upload: usize,
    pub bento4_exec_dir: String,
    pub transcode_timeout_secs: u64,
    pub package_extra_args: Vec<String>,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            rabbitmq_url: env::get(EnvKey::RabbitMqUrl)?,
            consumer_queue: env::get_or(EnvKey::RabbitMqConsumerQueue, "videos"),
            consumer_name: env::get_or(EnvKey::RabbitMqConsumerName, "encoder"),
            dead_letter_exchange: env::get_or(EnvKey::RabbitMqDlx, "dlx"),
            notification_exchange: env::get_or(EnvKey::NotificationExchange, "amq.direct"),
            notification_routing_key: env::get_or(EnvKey::NotificationRoutingKey, "jobs"),
            minio_url: env::get(EnvKey::MinioUrl)?,
            minio_access_key: env::get(EnvKey::MinioAccessKey)?,
            minio_secret_key: env::get(EnvKey::MinioSecretKey)?,
            input_bucket: env::get(EnvKey::InputBucket)?,
            output_bucket: env::get(EnvKey::OutputBucket)?,
            local_storage_path: PathBuf::from(env::get_or(EnvKey::LocalStoragePath, "/tmp")),
            concurrency_workers: env::get_parsed(EnvKey::ConcurrencyWorkers, 1usize).max(1),
            concurrency_upload: env::get_parsed(EnvKey::ConcurrencyUpload, default_parallelism())
                .max(1),
            bento4_exec_dir: env::get_or(EnvKey::Bento4ExecDir, "/opt/bento4/bin/"),
            transcode_timeout_secs: env::get_parsed(EnvKey::TranscodeTimeoutSecs, 0),
            package_extra_args: env::get_or(EnvKey::PackageExtraArgs, "")
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        })
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            local_storage_path: self.local_storage_path.clone(),
            input_bucket: self.input_bucket.clone(),
            output_bucket: self.output_bucket.clone(),
            upload_concurrency: self.concurrency_upload,
        }
    }

    /// `None` when no deadline is configured.
    pub fn transcode_timeout(&self) -> Option<Duration> {
        (self.transcode_timeout_secs > 0).then(|| Duration::from_secs(self.transcode_timeout_secs))
    }
}

/// The slice of configuration every pipeline executor reads.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub local_storage_path: PathBuf,
    pub input_bucket: String,
    pub output_bucket: String,
    pub upload_concurrency: usize,
}

pub fn default_parallelism() -> usize {
    available_parallelism().map(|n| n.get()).unwrap_or(4)
}
