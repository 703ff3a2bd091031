pub mod appresult;
pub mod auth;
pub mod config;
pub mod conversations;
pub mod db;
pub mod messages;
pub mod photos;
pub mod users;

use axum::{debug_handler, extract::{FromRef, State}, routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use appresult::{AppError, AppResult};

use auth::Identity;
use photos::BlobStore;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub identity: Identity,
    pub blobs: BlobStore,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, blobs: BlobStore) -> Self {
        AppState {
            db_pool,
            identity: Identity::default(),
            blobs,
        }
    }
}

/// The whole HTTP surface.
pub fn router(app_state: AppState) -> Router {
    let uploads = ServeDir::new(app_state.blobs.root());

    Router::new()
        .route("/liveness", get(liveness))
        .merge(auth::router())
        .merge(users::router())
        .merge(conversations::router())
        .merge(messages::router())
        .nest_service(BlobStore::PUBLIC_PREFIX, uploads)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[debug_handler]
async fn liveness(State(db_pool): State<SqlitePool>) -> AppResult<Json<Value>> {
    db::ping(&db_pool).await?;
    Ok(Json(json!({ "status": "ok" })))
}
