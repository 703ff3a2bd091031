use sqlx::SqlitePool;

use crate::{
    appresult::{is_unique_violation, AppResult},
    auth::check_username,
    db::{self, User},
    photos::{BlobStore, Photo},
    AppError,
};

pub async fn get(db_pool: &SqlitePool, id: &str) -> AppResult<User> {
    db::find_user(db_pool, id).await?.ok_or(AppError::NotFound("user"))
}

/// Users whose name starts with `prefix`, or everyone for an empty prefix.
pub async fn search(db_pool: &SqlitePool, prefix: &str) -> AppResult<Vec<User>> {
    let pattern = format!("{}%", escape_like(prefix));

    let users = sqlx::query_as(
        r"SELECT id,username,photo FROM users WHERE username LIKE ? ESCAPE '\' ORDER BY username",
    )
    .bind(pattern)
    .fetch_all(db_pool)
    .await?;
    Ok(users)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub async fn ensure_exists(db_pool: &SqlitePool, id: &str) -> AppResult<()> {
    get(db_pool, id).await.map(|_| ())
}

/// Changes the caller's name and returns the stored (trimmed) value.
pub async fn rename(db_pool: &SqlitePool, caller: &str, name: &str) -> AppResult<String> {
    let name = check_username(name)?;
    ensure_exists(db_pool, caller).await?;

    if let Some(holder) = db::find_user_by_name(db_pool, name).await? {
        if holder.id != caller {
            return Err(AppError::Conflict("name already taken".into()));
        }
    }

    match sqlx::query("UPDATE users SET username=? WHERE id=?")
        .bind(name)
        .bind(caller)
        .execute(db_pool)
        .await
    {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict("name already taken".into()));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = caller, name, "username changed");
    Ok(name.to_owned())
}

pub async fn set_photo(
    db_pool: &SqlitePool,
    blobs: &BlobStore,
    user_id: &str,
    photo: &Photo,
) -> AppResult<String> {
    let url = blobs.put("users", user_id, photo).await?;

    sqlx::query("UPDATE users SET photo=? WHERE id=?")
        .bind(&url)
        .bind(user_id)
        .execute(db_pool)
        .await?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("ann"), "ann");
        assert_eq!(escape_like("50%_off"), r"50\%\_off");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like(""), "");
    }
}
