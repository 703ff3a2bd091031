mod handlers;
pub mod service;

use axum::{
    routing::{delete, post},
    Router,
};

use crate::AppState;

pub use service::DirectSent;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations/{id}/messages", post(handlers::send))
        .route("/messages", post(handlers::send_direct))
        .route("/messages/{id}", delete(handlers::delete))
        .route("/messages/{id}/forward", post(handlers::forward))
        .route("/messages/{id}/comments", post(handlers::comment).delete(handlers::uncomment))
}
