use axum::{
    debug_handler,
    extract::{Multipart, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{
    appresult::{AppJson, AppPath, AppQuery, AppResult},
    auth::Caller,
    db::User,
    photos::{self, BlobStore, PhotoUploaded},
    AppState,
};

use super::service;

#[derive(Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
pub(crate) struct RenameRequest {
    name: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn search(
    State(db_pool): State<SqlitePool>,
    Caller(_): Caller,
    AppQuery(SearchParams { q }): AppQuery<SearchParams>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(service::search(&db_pool, &q).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn profile(
    State(db_pool): State<SqlitePool>,
    Caller(_): Caller,
    AppPath(id): AppPath<String>,
) -> AppResult<Json<User>> {
    Ok(Json(service::get(&db_pool, &id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn rename(
    State(db_pool): State<SqlitePool>,
    Caller(caller): Caller,
    AppJson(RenameRequest { name }): AppJson<RenameRequest>,
) -> AppResult<Json<Value>> {
    let name = service::rename(&db_pool, &caller, &name).await?;
    Ok(Json(json!({ "name": name })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn set_photo(
    State(db_pool): State<SqlitePool>,
    State(blobs): State<BlobStore>,
    Caller(caller): Caller,
    mut multipart: Multipart,
) -> AppResult<Json<PhotoUploaded>> {
    service::ensure_exists(&db_pool, &caller).await?;

    let photo = photos::read_photo(&mut multipart).await?;
    let url = service::set_photo(&db_pool, &blobs, &caller, &photo).await?;
    Ok(Json(PhotoUploaded::new(url)))
}
