use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

pub async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.store.find_job(id).await {
        Ok(Some(job)) => ApiSuccess(ApiResponse::success(job, "Job retrieved successfully"), StatusCode::OK).into_response(),
        Ok(None) => ApiError("Job not found".to_string(), StatusCode::NOT_FOUND).into_response(),
        Err(e) => {
            error!("Failed to load job {}: {}", id, e);
            ApiError(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

/// The video together with every job that processed it.
pub async fn get_video(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.store.find_video(id).await {
        Ok(Some(video)) => ApiSuccess(ApiResponse::success(video, "Video retrieved successfully"), StatusCode::OK).into_response(),
        Ok(None) => ApiError("Video not found".to_string(), StatusCode::NOT_FOUND).into_response(),
        Err(e) => {
            error!("Failed to load video {}: {}", id, e);
            ApiError(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::app::create_app;
    use crate::modules::encoding::events::VideoMessage;
    use crate::modules::encoding::model::Job;
    use crate::modules::encoding::repository::JobStore;
    use crate::state::AppState;
    use crate::testing::MemoryJobStore;

    async fn get(state: AppState, uri: &str) -> (u16, Value) {
        let response = create_app(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status().as_u16();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn seeded() -> (AppState, Job) {
        let store = Arc::new(MemoryJobStore::default());
        let video = VideoMessage {
            resource_id: Some("r-42".to_string()),
            file_path: "clip.mp4".to_string(),
        }
        .into_video();
        store.insert_video(&video).await.unwrap();
        let job = store.insert_job(&Job::new("output", video)).await.unwrap();
        (AppState::new(store), job)
    }

    #[tokio::test]
    async fn job_is_returned_in_envelope() {
        let (state, job) = seeded().await;
        let (status, body) = get(state, &format!("/api/v1/jobs/{}", job.id)).await;

        assert_eq!(status, 200);
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["id"], job.id.to_string());
        assert_eq!(body["data"]["status"], "PENDING");
    }

    #[tokio::test]
    async fn video_includes_its_jobs() {
        let (state, job) = seeded().await;
        let (status, body) = get(state, &format!("/api/v1/videos/{}", job.video_id)).await;

        assert_eq!(status, 200);
        assert_eq!(body["data"]["resource_id"], "r-42");
        assert_eq!(body["data"]["jobs"][0]["id"], job.id.to_string());
    }

    #[tokio::test]
    async fn unknown_job_is_404() {
        let (state, _) = seeded().await;
        let (status, body) = get(state, &format!("/api/v1/jobs/{}", uuid::Uuid::new_v4())).await;

        assert_eq!(status, 404);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn health_answers() {
        let (state, _) = seeded().await;
        let response = create_app(state)
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }
}
