use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    appresult::{positive_id, AppResult},
    conversations::{require_conversation, require_member, service::find_or_create_direct},
    db::{self, Message},
    AppError,
};

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectSent {
    pub conversation_id: i64,
    pub message_id: i64,
}

fn require_text<'a>(text: &'a str, what: &str) -> AppResult<&'a str> {
    if text.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{what} must not be blank")));
    }
    Ok(text)
}

async fn require_message(db_pool: &SqlitePool, id: i64) -> AppResult<Message> {
    db::find_message(db_pool, id)
        .await?
        .ok_or(AppError::NotFound("message"))
}

pub async fn send(
    db_pool: &SqlitePool,
    conversation_id: i64,
    sender: &str,
    text: &str,
) -> AppResult<i64> {
    require_conversation(db_pool, conversation_id).await?;
    require_member(db_pool, conversation_id, sender).await?;
    let text = require_text(text, "text")?;

    let id = db::insert_message(db_pool, conversation_id, sender, text).await?;
    tracing::debug!(message_id = id, conversation_id, user_id = sender, "message sent");
    Ok(id)
}

/// Sends to the direct conversation shared with `recipient`, opening it if
/// this is the first message between the two.
pub async fn send_direct(
    db_pool: &SqlitePool,
    sender: &str,
    recipient: &str,
    text: &str,
) -> AppResult<DirectSent> {
    // stored ids carry no surrounding whitespace, so compare and look up the trimmed id
    let recipient = recipient.trim();
    if recipient.is_empty() {
        return Err(AppError::bad_request("toUserId is required"));
    }
    let text = require_text(text, "text")?;
    if recipient == sender {
        return Err(AppError::bad_request("cannot message yourself"));
    }

    if db::find_user(db_pool, sender).await?.is_none() {
        return Err(AppError::Unauthorized);
    }
    if db::find_user(db_pool, recipient).await?.is_none() {
        return Err(AppError::NotFound("recipient"));
    }

    let conversation_id = find_or_create_direct(db_pool, sender, recipient).await?;
    let message_id = send(db_pool, conversation_id, sender, text).await?;
    Ok(DirectSent {
        conversation_id,
        message_id,
    })
}

/// Copies the text of `message_id` into `destination` as a new message by
/// `caller`. The caller must be able to read the source and write the
/// destination.
pub async fn forward(
    db_pool: &SqlitePool,
    message_id: i64,
    caller: &str,
    destination: i64,
) -> AppResult<i64> {
    let destination = positive_id(destination)?;
    require_conversation(db_pool, destination).await?;
    require_member(db_pool, destination, caller).await?;

    let source = require_message(db_pool, message_id).await?;
    require_member(db_pool, source.conversation_id, caller).await?;

    let id = db::insert_message(db_pool, destination, caller, &source.text).await?;
    tracing::debug!(message_id = id, forwarded_from = source.id, conversation_id = destination, "message forwarded");
    Ok(id)
}

/// Only the sender may delete a message.
pub async fn delete(db_pool: &SqlitePool, message_id: i64, caller: &str) -> AppResult<()> {
    let deleted = sqlx::query("DELETE FROM messages WHERE id=? AND sender_id=?")
        .bind(message_id)
        .bind(caller)
        .execute(db_pool)
        .await?
        .rows_affected();
    if deleted > 0 {
        tracing::debug!(message_id, user_id = caller, "message deleted");
        return Ok(());
    }

    match db::find_message(db_pool, message_id).await? {
        None => Err(AppError::NotFound("message")),
        Some(_) => Err(AppError::Forbidden),
    }
}

/// Sets the caller's one comment on a message, replacing any earlier one.
pub async fn comment(
    db_pool: &SqlitePool,
    message_id: i64,
    caller: &str,
    text: &str,
) -> AppResult<i64> {
    let text = require_text(text, "comment")?;
    let message = require_message(db_pool, message_id).await?;
    require_member(db_pool, message.conversation_id, caller).await?;

    let id = sqlx::query_scalar(
        "INSERT INTO message_comments (message_id,user_id,comment,created_at) VALUES (?,?,?,?)
         ON CONFLICT(message_id,user_id) DO UPDATE SET comment=excluded.comment, created_at=excluded.created_at
         RETURNING id",
    )
    .bind(message_id)
    .bind(caller)
    .bind(text)
    .bind(db::now()?)
    .fetch_one(db_pool)
    .await?;
    Ok(id)
}

pub async fn uncomment(db_pool: &SqlitePool, message_id: i64, caller: &str) -> AppResult<()> {
    let message = require_message(db_pool, message_id).await?;
    require_member(db_pool, message.conversation_id, caller).await?;

    let removed = sqlx::query("DELETE FROM message_comments WHERE message_id=? AND user_id=?")
        .bind(message_id)
        .bind(caller)
        .execute(db_pool)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::NotFound("comment"));
    }
    Ok(())
}
