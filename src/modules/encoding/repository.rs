use anyhow::{Result, anyhow};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{Job, Video};

/// Persistence seam for videos and jobs. Implementations must be safe to
/// share between executors; concurrent writes to one job row are last-write-wins.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_video(&self, video: &Video) -> Result<Video>;
    async fn insert_job(&self, job: &Job) -> Result<Job>;
    async fn update_job(&self, job: &Job) -> Result<()>;
    async fn find_job(&self, id: Uuid) -> Result<Option<Job>>;
    /// Loads the video together with every job that processed it.
    async fn find_video(&self, id: Uuid) -> Result<Option<Video>>;
}

#[derive(Clone)]
pub struct EncodingRepository {
    pool: PgPool,
}

impl EncodingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for EncodingRepository {
    async fn insert_video(&self, video: &Video) -> Result<Video> {
        let created = sqlx::query_as::<_, Video>(
            r#"
            INSERT INTO videos (id, resource_id, file_path, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, resource_id, file_path, created_at
            "#,
        )
        .bind(video.id)
        .bind(&video.resource_id)
        .bind(&video.file_path)
        .bind(video.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn insert_job(&self, job: &Job) -> Result<Job> {
        let mut created = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (id, output_bucket_path, status, video_id, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, output_bucket_path, status, video_id, error, created_at, updated_at
            "#,
        )
        .bind(job.id)
        .bind(&job.output_bucket_path)
        .bind(job.status)
        .bind(job.video_id)
        .bind(&job.error)
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_one(&self.pool)
        .await?;

        created.video = job.video.clone();
        Ok(created)
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET output_bucket_path = $1, status = $2, error = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(&job.output_bucket_path)
        .bind(job.status)
        .bind(&job.error)
        .bind(job.updated_at)
        .bind(job.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Job {} not found", job.id));
        }
        Ok(())
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, output_bucket_path, status, video_id, error, created_at, updated_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut job) = job else {
            return Ok(None);
        };

        job.video = sqlx::query_as::<_, Video>(
            "SELECT id, resource_id, file_path, created_at FROM videos WHERE id = $1",
        )
        .bind(job.video_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(Some(job))
    }

    async fn find_video(&self, id: Uuid) -> Result<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(
            "SELECT id, resource_id, file_path, created_at FROM videos WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut video) = video else {
            return Ok(None);
        };

        video.jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, output_bucket_path, status, video_id, error, created_at, updated_at
            FROM jobs
            WHERE video_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(video))
    }
}
