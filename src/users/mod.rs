mod handlers;
pub mod service;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, put},
    Router,
};

use crate::{
    photos::{MAX_PHOTO_BYTES, MULTIPART_OVERHEAD},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(handlers::search))
        .route("/user/{id}", get(handlers::profile))
        .route("/me/username", put(handlers::rename))
        .route(
            "/me/photo",
            put(handlers::set_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + MULTIPART_OVERHEAD)),
        )
}
