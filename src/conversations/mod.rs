mod handlers;
pub mod service;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::{
    appresult::AppResult,
    db::{self, ConversationInfo},
    photos::{MAX_PHOTO_BYTES, MULTIPART_OVERHEAD},
    AppError, AppState,
};

pub use service::{ConversationDetail, ConversationSummary};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me/conversations", get(handlers::my_conversations))
        .route("/conversations", post(handlers::create))
        .route("/conversations/{id}", get(handlers::detail))
        .route("/groups/{id}/members", post(handlers::add_member).delete(handlers::leave))
        .route("/groups/{id}/name", put(handlers::rename))
        .route(
            "/groups/{id}/photo",
            put(handlers::set_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + MULTIPART_OVERHEAD)),
        )
}

/// 404 unless the conversation exists.
pub(crate) async fn require_conversation(
    db: impl sqlx::SqliteExecutor<'_>,
    id: i64,
) -> AppResult<ConversationInfo> {
    db::find_conversation(db, id)
        .await?
        .ok_or(AppError::NotFound("conversation"))
}

/// 403 unless `user_id` belongs to the conversation.
pub(crate) async fn require_member(
    db: impl sqlx::SqliteExecutor<'_>,
    conversation_id: i64,
    user_id: &str,
) -> AppResult<()> {
    if !db::is_member(db, conversation_id, user_id).await? {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub(crate) fn require_group(info: &ConversationInfo) -> AppResult<()> {
    if !info.is_group {
        return Err(AppError::bad_request("not a group conversation"));
    }
    Ok(())
}
