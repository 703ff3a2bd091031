use axum::{
    debug_handler,
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{
    appresult::{positive_id, AppJson, AppPath, AppResult},
    auth::Caller,
    photos::{self, BlobStore, PhotoUploaded},
    AppState,
};

use super::service::{self, ConversationDetail, ConversationSummary};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateConversationRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_group: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateConversationResponse {
    conversation_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddMemberRequest {
    user_id: String,
}

#[derive(Deserialize)]
pub(crate) struct RenameRequest {
    name: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn my_conversations(
    State(db_pool): State<SqlitePool>,
    Caller(user_id): Caller,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(service::list_for_user(&db_pool, &user_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    State(db_pool): State<SqlitePool>,
    Caller(user_id): Caller,
    AppJson(CreateConversationRequest { name, is_group }): AppJson<CreateConversationRequest>,
) -> AppResult<(StatusCode, Json<CreateConversationResponse>)> {
    let conversation_id = service::create_conversation(&db_pool, &name, is_group, &user_id).await?;
    Ok((StatusCode::CREATED, Json(CreateConversationResponse { conversation_id })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn detail(
    State(db_pool): State<SqlitePool>,
    Caller(user_id): Caller,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ConversationDetail>> {
    let id = positive_id(id)?;
    Ok(Json(service::detail(&db_pool, id, &user_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_member(
    State(db_pool): State<SqlitePool>,
    Caller(caller): Caller,
    AppPath(id): AppPath<i64>,
    AppJson(AddMemberRequest { user_id }): AppJson<AddMemberRequest>,
) -> AppResult<Json<Value>> {
    let id = positive_id(id)?;
    service::add_member(&db_pool, id, &caller, &user_id).await?;
    Ok(Json(json!({ "status": "Added" })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn leave(
    State(db_pool): State<SqlitePool>,
    Caller(caller): Caller,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Value>> {
    let id = positive_id(id)?;
    service::leave(&db_pool, id, &caller).await?;
    Ok(Json(json!({ "status": "Left" })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn rename(
    State(db_pool): State<SqlitePool>,
    Caller(caller): Caller,
    AppPath(id): AppPath<i64>,
    AppJson(RenameRequest { name }): AppJson<RenameRequest>,
) -> AppResult<Json<Value>> {
    let id = positive_id(id)?;
    let name = service::rename(&db_pool, id, &caller, &name).await?;
    Ok(Json(json!({ "name": name })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn set_photo(
    State(db_pool): State<SqlitePool>,
    State(blobs): State<BlobStore>,
    Caller(caller): Caller,
    AppPath(id): AppPath<i64>,
    mut multipart: Multipart,
) -> AppResult<Json<PhotoUploaded>> {
    let id = positive_id(id)?;
    service::ensure_group_member(&db_pool, id, &caller).await?;

    let photo = photos::read_photo(&mut multipart).await?;
    let url = service::set_photo(&db_pool, &blobs, id, &photo).await?;
    Ok(Json(PhotoUploaded::new(url)))
}
