use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    RabbitMqUrl,
    RabbitMqConsumerQueue,
    RabbitMqConsumerName,
    RabbitMqDlx,
    NotificationExchange,
    NotificationRoutingKey,
    MinioUrl,
    MinioAccessKey,
    MinioSecretKey,
    InputBucket,
    OutputBucket,
    LocalStoragePath,
    ConcurrencyWorkers,
    ConcurrencyUpload,
    Bento4ExecDir,
    TranscodeTimeoutSecs,
    PackageExtraArgs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RabbitMqUrl => "RABBITMQ_DSN",
            EnvKey::RabbitMqConsumerQueue => "RABBITMQ_CONSUMER_QUEUE_NAME",
            EnvKey::RabbitMqConsumerName => "RABBITMQ_CONSUMER_NAME",
            EnvKey::RabbitMqDlx => "RABBITMQ_DLX",
            EnvKey::NotificationExchange => "RABBITMQ_NOTIFICATION_EX",
            EnvKey::NotificationRoutingKey => "RABBITMQ_NOTIFICATION_ROUTING_KEY",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::InputBucket => "INPUT_BUCKET_NAME",
            EnvKey::OutputBucket => "OUTPUT_BUCKET_NAME",
            EnvKey::LocalStoragePath => "LOCAL_STORAGE_PATH",
            EnvKey::ConcurrencyWorkers => "CONCURRENCY_WORKERS",
            EnvKey::ConcurrencyUpload => "CONCURRENCY_UPLOAD",
            EnvKey::Bento4ExecDir => "BENTO4_EXEC_DIR",
            EnvKey::TranscodeTimeoutSecs => "TRANSCODE_TIMEOUT_SECS",
            EnvKey::PackageExtraArgs => "MP4DASH_EXTRA_ARGS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
