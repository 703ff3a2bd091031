use std::str::FromStr;

use anyhow::Context;
use serde::Serialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqliteExecutor, SqlitePool,
};
use time::{format_description::BorrowedFormatItem, macros::format_description, OffsetDateTime};

use crate::{appresult::AppResult, config::Config, AppError};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

// fixed width, so string order is time order
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

pub async fn connect(config: &Config) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("bad DATABASE_URL {}", config.database_url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&db_pool).await?;
    Ok(db_pool)
}

pub async fn ping(db_pool: &SqlitePool) -> AppResult<()> {
    sqlx::query("SELECT 1").execute(db_pool).await?;
    Ok(())
}

/// Current UTC time as stored in every `created_at` column.
pub fn now() -> AppResult<String> {
    format_timestamp(OffsetDateTime::now_utc())
}

fn format_timestamp(at: OffsetDateTime) -> AppResult<String> {
    at.to_offset(time::UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .context("formatting timestamp")
        .map_err(AppError::from)
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[sqlx(rename = "username")]
    pub name: String,
    #[sqlx(rename = "photo")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversationInfo {
    pub id: i64,
    pub name: Option<String>,
    pub is_group: bool,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: String,
    pub text: String,
    pub created_at: String,
}

pub async fn find_user(db: impl SqliteExecutor<'_>, id: &str) -> AppResult<Option<User>> {
    Ok(sqlx::query_as("SELECT id,username,photo FROM users WHERE id=?")
        .bind(id)
        .fetch_optional(db)
        .await?)
}

pub async fn find_user_by_name(db: impl SqliteExecutor<'_>, name: &str) -> AppResult<Option<User>> {
    Ok(sqlx::query_as("SELECT id,username,photo FROM users WHERE username=?")
        .bind(name)
        .fetch_optional(db)
        .await?)
}

pub async fn find_conversation(
    db: impl SqliteExecutor<'_>,
    id: i64,
) -> AppResult<Option<ConversationInfo>> {
    Ok(sqlx::query_as("SELECT id,name,is_group,photo FROM conversations WHERE id=?")
        .bind(id)
        .fetch_optional(db)
        .await?)
}

pub async fn find_message(db: impl SqliteExecutor<'_>, id: i64) -> AppResult<Option<Message>> {
    Ok(sqlx::query_as(
        "SELECT id,conversation_id,sender_id,text,created_at FROM messages WHERE id=?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?)
}

pub async fn is_member(
    db: impl SqliteExecutor<'_>,
    conversation_id: i64,
    user_id: &str,
) -> AppResult<bool> {
    Ok(sqlx::query("SELECT 1 FROM user_conversations WHERE conversation_id=? AND user_id=?")
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .is_some())
}

pub async fn add_member(
    db: impl SqliteExecutor<'_>,
    conversation_id: i64,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO user_conversations (conversation_id,user_id) VALUES (?,?)")
        .bind(conversation_id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn insert_message(
    db: impl SqliteExecutor<'_>,
    conversation_id: i64,
    sender_id: &str,
    text: &str,
) -> AppResult<i64> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO messages (conversation_id,sender_id,text,created_at) VALUES (?,?,?,?) RETURNING id",
    )
    .bind(conversation_id)
    .bind(sender_id)
    .bind(text)
    .bind(now()?)
    .fetch_one(db)
    .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn timestamps_are_fixed_width_utc() {
        let at = format_timestamp(datetime!(2024-03-05 07:08:09.5 +02:00)).unwrap();
        assert_eq!(at, "2024-03-05T05:08:09.500Z");

        let whole = format_timestamp(datetime!(2024-03-05 05:08:10 UTC)).unwrap();
        assert_eq!(whole.len(), at.len());
        assert!(whole > at);
    }
}
