use axum::Router;
use axum::routing::get;
use crate::state::AppState;

pub mod events;
pub mod handler;
pub mod job_service;
pub mod model;
pub mod repository;
pub mod video_service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs/{id}", get(handler::get_job))
        .route("/videos/{id}", get(handler::get_video))
}
