use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{
    appresult::{positive_id, AppJson, AppPath, AppResult},
    auth::Caller,
    AppState,
};

use super::service;

#[derive(Deserialize)]
pub(crate) struct SendRequest {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendDirectRequest {
    to_user_id: String,
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ForwardRequest {
    conversation_id: i64,
}

#[derive(Deserialize)]
pub(crate) struct CommentRequest {
    comment: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    State(db_pool): State<SqlitePool>,
    Caller(sender): Caller,
    AppPath(conversation_id): AppPath<i64>,
    AppJson(SendRequest { text }): AppJson<SendRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let conversation_id = positive_id(conversation_id)?;
    let message_id = service::send(&db_pool, conversation_id, &sender, &text).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "messageId": message_id, "status": "sent" })),
    ))
}

#[debug_handler(state = AppState)]
pub(crate) async fn send_direct(
    State(db_pool): State<SqlitePool>,
    Caller(sender): Caller,
    AppJson(SendDirectRequest { to_user_id, text }): AppJson<SendDirectRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let sent = service::send_direct(&db_pool, &sender, &to_user_id, &text).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "conversationId": sent.conversation_id,
            "messageId": sent.message_id,
            "status": "sent",
        })),
    ))
}

#[debug_handler(state = AppState)]
pub(crate) async fn forward(
    State(db_pool): State<SqlitePool>,
    Caller(caller): Caller,
    AppPath(message_id): AppPath<i64>,
    AppJson(ForwardRequest { conversation_id }): AppJson<ForwardRequest>,
) -> AppResult<Json<Value>> {
    let message_id = positive_id(message_id)?;
    let id = service::forward(&db_pool, message_id, &caller, conversation_id).await?;
    Ok(Json(json!({ "messageId": id, "status": "Forwarded" })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete(
    State(db_pool): State<SqlitePool>,
    Caller(caller): Caller,
    AppPath(message_id): AppPath<i64>,
) -> AppResult<Json<Value>> {
    let message_id = positive_id(message_id)?;
    service::delete(&db_pool, message_id, &caller).await?;
    Ok(Json(json!({ "status": "deleted" })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn comment(
    State(db_pool): State<SqlitePool>,
    Caller(caller): Caller,
    AppPath(message_id): AppPath<i64>,
    AppJson(CommentRequest { comment }): AppJson<CommentRequest>,
) -> AppResult<Json<Value>> {
    let message_id = positive_id(message_id)?;
    let comment_id = service::comment(&db_pool, message_id, &caller, &comment).await?;
    Ok(Json(json!({ "commentId": comment_id, "status": "ok" })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn uncomment(
    State(db_pool): State<SqlitePool>,
    Caller(caller): Caller,
    AppPath(message_id): AppPath<i64>,
) -> AppResult<Json<Value>> {
    let message_id = positive_id(message_id)?;
    service::uncomment(&db_pool, message_id, &caller).await?;
    Ok(Json(json!({ "status": "removed" })))
}
