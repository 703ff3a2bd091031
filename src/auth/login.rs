use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    appresult::{is_unique_violation, AppJson, AppResult},
    db, AppError,
};

use super::{check_username, create_user};

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    name: String,
}

#[derive(Serialize)]
pub(crate) struct LoginResponse {
    identifier: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn session(
    State(db_pool): State<SqlitePool>,
    AppJson(LoginRequest { name }): AppJson<LoginRequest>,
) -> AppResult<(StatusCode, Json<LoginResponse>)> {
    let identifier = login(&db_pool, &name).await?;
    Ok((StatusCode::CREATED, Json(LoginResponse { identifier })))
}

/// Returns the id of the user called `name`, creating the user on first login.
pub async fn login(db_pool: &SqlitePool, name: &str) -> AppResult<String> {
    let name = check_username(name)?;

    if let Some(user) = db::find_user_by_name(db_pool, name).await? {
        tracing::debug!(user_id = %user.id, "welcome back");
        return Ok(user.id);
    }

    match create_user(db_pool, name).await {
        Ok(id) => Ok(id),
        // someone registered the same name between our lookup and insert
        Err(e) if is_unique_violation(&e) => db::find_user_by_name(db_pool, name)
            .await?
            .map(|user| user.id)
            .ok_or(AppError::Conflict("name already taken".to_owned())),
        Err(e) => Err(e.into()),
    }
}
