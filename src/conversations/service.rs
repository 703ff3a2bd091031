//! Conversation lifecycle, membership and read models.
//!
//! Every function takes the pool and an already authenticated caller id and
//! runs its checks in the same order: existence (404), kind (400),
//! membership (403), then the write.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    appresult::{is_unique_violation, AppResult},
    db,
    photos::{BlobStore, Photo},
    AppError,
};

use super::{require_conversation, require_group, require_member};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: i64,
    pub name: Option<String>,
    pub is_group: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    pub id: i64,
    pub name: Option<String>,
    pub is_group: bool,
    pub photo_url: Option<String>,
    pub participants: Vec<String>,
    /// Newest first.
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: i64,
    pub sender_id: String,
    pub sender: String,
    pub text: String,
    pub timestamp: String,
    #[sqlx(skip)]
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(skip)]
    pub message_id: i64,
    pub user_id: String,
    pub user: String,
    pub comment: String,
    pub timestamp: String,
}

/// Creates a group whose only member is `creator`.
pub async fn create_conversation(
    db_pool: &SqlitePool,
    name: &str,
    is_group: bool,
    creator: &str,
) -> AppResult<i64> {
    if !is_group {
        return Err(AppError::bad_request(
            "direct conversations are opened by messaging a user",
        ));
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("group name must not be blank"));
    }

    let mut tx = db_pool.begin().await?;
    if db::find_user(&mut *tx, creator).await?.is_none() {
        return Err(AppError::Unauthorized);
    }

    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO conversations (name,is_group,created_at) VALUES (?,1,?) RETURNING id",
    )
    .bind(name)
    .bind(db::now()?)
    .fetch_one(&mut *tx)
    .await?;
    db::add_member(&mut *tx, id, creator).await?;
    tx.commit().await?;

    tracing::info!(conversation_id = id, user_id = creator, "group created");
    Ok(id)
}

/// The one direct conversation between `a` and `b`, created on first use.
pub async fn find_or_create_direct(db_pool: &SqlitePool, a: &str, b: &str) -> AppResult<i64> {
    if a == b {
        return Err(AppError::bad_request("cannot message yourself"));
    }
    let key = direct_key(a, b);

    if let Some(id) = find_direct(db_pool, &key).await? {
        return Ok(id);
    }

    match create_direct(db_pool, &key, &db::now()?, a, b).await {
        Ok(id) => {
            tracing::info!(conversation_id = id, "direct conversation created");
            Ok(id)
        }
        // lost a race with a concurrent creator of the same pair
        Err(e) if is_unique_violation(&e) => find_direct(db_pool, &key)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("direct conversation {key} missing after conflict"))),
        Err(e) => Err(e.into()),
    }
}

fn direct_key(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{lo}:{hi}", lo.len())
}

async fn find_direct(db_pool: &SqlitePool, key: &str) -> AppResult<Option<i64>> {
    Ok(sqlx::query_scalar("SELECT id FROM conversations WHERE direct_key=?")
        .bind(key)
        .fetch_optional(db_pool)
        .await?)
}

async fn create_direct(
    db_pool: &SqlitePool,
    key: &str,
    created_at: &str,
    a: &str,
    b: &str,
) -> Result<i64, sqlx::Error> {
    let mut tx = db_pool.begin().await?;
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO conversations (is_group,direct_key,created_at) VALUES (0,?,?) RETURNING id",
    )
    .bind(key)
    .bind(created_at)
    .fetch_one(&mut *tx)
    .await?;
    db::add_member(&mut *tx, id, a).await?;
    db::add_member(&mut *tx, id, b).await?;
    tx.commit().await?;
    Ok(id)
}

pub async fn add_member(
    db_pool: &SqlitePool,
    conversation_id: i64,
    caller: &str,
    user_id: &str,
) -> AppResult<()> {
    let info = require_conversation(db_pool, conversation_id).await?;
    require_group(&info)?;
    require_member(db_pool, conversation_id, caller).await?;

    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::bad_request("userId is required"));
    }
    if db::find_user(db_pool, user_id).await?.is_none() {
        return Err(AppError::NotFound("user"));
    }

    match db::add_member(db_pool, conversation_id, user_id).await {
        Ok(()) => {
            tracing::info!(conversation_id, user_id, added_by = caller, "member added");
            Ok(())
        }
        Err(e) if is_unique_violation(&e) => Err(AppError::Conflict("already a member".to_owned())),
        Err(e) => Err(e.into()),
    }
}

/// Removes the caller from a group. Leaving twice is a 404.
pub async fn leave(db_pool: &SqlitePool, conversation_id: i64, caller: &str) -> AppResult<()> {
    let info = require_conversation(db_pool, conversation_id).await?;
    require_group(&info)?;

    let removed = sqlx::query("DELETE FROM user_conversations WHERE conversation_id=? AND user_id=?")
        .bind(conversation_id)
        .bind(caller)
        .execute(db_pool)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::NotFound("membership"));
    }

    tracing::info!(conversation_id, user_id = caller, "member left");
    Ok(())
}

pub async fn rename(
    db_pool: &SqlitePool,
    conversation_id: i64,
    caller: &str,
    name: &str,
) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("group name must not be blank"));
    }
    ensure_group_member(db_pool, conversation_id, caller).await?;

    sqlx::query("UPDATE conversations SET name=? WHERE id=?")
        .bind(name)
        .bind(conversation_id)
        .execute(db_pool)
        .await?;
    Ok(name.to_owned())
}

/// Checks that run before a group photo upload body is read.
pub async fn ensure_group_member(
    db_pool: &SqlitePool,
    conversation_id: i64,
    caller: &str,
) -> AppResult<()> {
    let info = require_conversation(db_pool, conversation_id).await?;
    require_group(&info)?;
    require_member(db_pool, conversation_id, caller).await
}

pub async fn set_photo(
    db_pool: &SqlitePool,
    blobs: &BlobStore,
    conversation_id: i64,
    photo: &Photo,
) -> AppResult<String> {
    let url = blobs.put("groups", &conversation_id.to_string(), photo).await?;

    sqlx::query("UPDATE conversations SET photo=? WHERE id=?")
        .bind(&url)
        .bind(conversation_id)
        .execute(db_pool)
        .await?;
    Ok(url)
}

pub async fn detail(
    db_pool: &SqlitePool,
    conversation_id: i64,
    caller: &str,
) -> AppResult<ConversationDetail> {
    let info = require_conversation(db_pool, conversation_id).await?;
    require_member(db_pool, conversation_id, caller).await?;

    let participants: Vec<String> = sqlx::query_scalar(
        "SELECT u.username FROM user_conversations uc JOIN users u ON u.id=uc.user_id
         WHERE uc.conversation_id=? ORDER BY u.username",
    )
    .bind(conversation_id)
    .fetch_all(db_pool)
    .await?;

    let mut messages: Vec<MessageView> = sqlx::query_as(
        "SELECT m.id,m.sender_id,u.username AS sender,m.text,m.created_at AS timestamp
         FROM messages m JOIN users u ON u.id=m.sender_id
         WHERE m.conversation_id=? ORDER BY m.created_at DESC, m.id DESC",
    )
    .bind(conversation_id)
    .fetch_all(db_pool)
    .await?;

    let comments: Vec<CommentView> = sqlx::query_as(
        "SELECT c.message_id,c.user_id,u.username AS user,c.comment,c.created_at AS timestamp
         FROM message_comments c
         JOIN messages m ON m.id=c.message_id
         JOIN users u ON u.id=c.user_id
         WHERE m.conversation_id=? ORDER BY c.created_at, c.id",
    )
    .bind(conversation_id)
    .fetch_all(db_pool)
    .await?;

    let mut by_message: HashMap<i64, Vec<CommentView>> = HashMap::new();
    for comment in comments {
        by_message.entry(comment.message_id).or_default().push(comment);
    }
    for message in &mut messages {
        message.comments = by_message.remove(&message.id).unwrap_or_default();
    }

    Ok(ConversationDetail {
        id: info.id,
        name: info.name,
        is_group: info.is_group,
        photo_url: info.photo,
        participants,
        messages,
    })
}

/// The caller's conversations, most recently active first.
pub async fn list_for_user(db_pool: &SqlitePool, user_id: &str) -> AppResult<Vec<ConversationSummary>> {
    Ok(sqlx::query_as(
        r#"
        SELECT
            c.id,
            CASE
                WHEN c.is_group = 1 OR TRIM(IFNULL(c.name, '')) <> '' THEN c.name
                ELSE (SELECT u.username FROM user_conversations o JOIN users u ON u.id = o.user_id
                      WHERE o.conversation_id = c.id AND o.user_id <> ?1 LIMIT 1)
            END AS name,
            c.is_group,
            (SELECT m.text FROM messages m WHERE m.conversation_id = c.id
             ORDER BY m.created_at DESC, m.id DESC LIMIT 1) AS last_message_text,
            (SELECT m.created_at FROM messages m WHERE m.conversation_id = c.id
             ORDER BY m.created_at DESC, m.id DESC LIMIT 1) AS last_message_at,
            CASE
                WHEN c.is_group = 1 THEN c.photo
                ELSE (SELECT u.photo FROM user_conversations o JOIN users u ON u.id = o.user_id
                      WHERE o.conversation_id = c.id AND o.user_id <> ?1 LIMIT 1)
            END AS photo_url
        FROM conversations c
        JOIN user_conversations uc ON uc.conversation_id = c.id
        WHERE uc.user_id = ?1
        ORDER BY COALESCE(last_message_at, c.created_at) DESC, c.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?)
}
