use sqlx::postgres::{PgPoolOptions, PgConnectOptions};
use sqlx::{Pool, Postgres, ConnectOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use tracing::log::LevelFilter;

pub type DbPool = Pool<Postgres>;

const SCHEMA: &str = r#"
DO $$ BEGIN
    CREATE TYPE job_status AS ENUM (
        'PENDING', 'STARTING', 'FRAGMENTING', 'ENCODING', 'UPLOADING', 'COMPLETE', 'FAILED'
    );
EXCEPTION
    WHEN duplicate_object THEN NULL;
END $$;

CREATE TABLE IF NOT EXISTS videos (
    id UUID PRIMARY KEY,
    resource_id VARCHAR(255),
    file_path VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS jobs (
    id UUID PRIMARY KEY,
    output_bucket_path VARCHAR(255) NOT NULL,
    status job_status NOT NULL,
    video_id UUID NOT NULL REFERENCES videos (id) ON DELETE CASCADE,
    error TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS jobs_video_id_idx ON jobs (video_id);
"#;

pub async fn connect_to_db(connection_string: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(connection_string)?
        .log_statements(LevelFilter::Debug);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect_with(options)
        .await?;

    info!("✅ Connected to PostgreSQL");
    Ok(pool)
}

/// Creates the `job_status` type and the `videos`/`jobs` tables when missing.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    info!("✅ Database schema ready");
    Ok(())
}
