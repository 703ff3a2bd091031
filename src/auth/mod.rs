//! Who is calling.
//!
//! A bearer token is the caller's user id: there is no issuance, signature or
//! expiry. The check for whether that user exists belongs to each operation.
//! This is a placeholder identity scheme, not a security boundary.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
    routing::post,
    Router,
};
use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::{appresult::AppResult, AppError, AppState};

mod login;

pub use login::login;

pub fn router() -> Router<AppState> {
    Router::new().route("/session", post(login::session))
}

/// Turns a presented credential into a user id.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, credential: &str) -> Option<String>;
}

/// The token is taken verbatim as the user id.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenIsUserId;

impl IdentityResolver for TokenIsUserId {
    fn resolve(&self, credential: &str) -> Option<String> {
        (!credential.is_empty()).then(|| credential.to_owned())
    }
}

#[derive(Clone)]
pub struct Identity(pub Arc<dyn IdentityResolver>);

impl Default for Identity {
    fn default() -> Self {
        Identity(Arc::new(TokenIsUserId))
    }
}

/// The authenticated caller's user id. Rejects with 401 when the request
/// carries no usable credential.
#[derive(Debug, Clone)]
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    Identity: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        let Identity(resolver) = Identity::from_ref(state);
        bearer_credential(header)
            .and_then(|credential| resolver.resolve(credential))
            .map(Caller)
            .ok_or(AppError::Unauthorized)
    }
}

/// `Bearer <token>` or a bare token; surrounding whitespace is ignored.
pub(crate) fn bearer_credential(header: &str) -> Option<&str> {
    let raw = header.trim();
    let token = match raw.strip_prefix("Bearer") {
        // the scheme alone, or the scheme and whitespace before the token
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => raw,
    };
    (!token.is_empty()).then_some(token)
}

pub(crate) fn check_username(name: &str) -> AppResult<&str> {
    let name = name.trim();
    let len = name.chars().count();
    if !(3..=16).contains(&len) {
        return Err(AppError::bad_request("name must be 3 to 16 characters"));
    }
    Ok(name)
}

pub(crate) async fn create_user(db: impl SqliteExecutor<'_>, name: &str) -> Result<String, sqlx::Error> {
    let id = Uuid::now_v7().to_string();

    sqlx::query("INSERT INTO users (id,username) VALUES (?,?)")
        .bind(&id)
        .bind(name)
        .execute(db)
        .await?;

    tracing::info!(user_id = %id, name, "user created");
    Ok(id)
}
