// Route table for the Kata API
use crate::handlers;
use crate::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/execute", post(handlers::execute))
        .route("/grade", post(handlers::grade))
        .route("/check-syntax", post(handlers::check_syntax))
        .route("/languages", get(handlers::list_languages))
        .route("/status", get(handlers::health_check))
}
