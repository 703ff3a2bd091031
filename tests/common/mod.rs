#![allow(dead_code)]

use std::{path::PathBuf, str::FromStr, time::Duration};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chatterbox::{auth, db, photos::BlobStore, AppState};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use tower::util::ServiceExt;

pub const BOUNDARY: &str = "chatterbox-test-boundary";

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

/// Every in-memory connection is its own database, so the pool is pinned to
/// one connection that never expires.
pub async fn pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();

    db::MIGRATOR.run(&db_pool).await.unwrap();
    db_pool
}

/// A database file shared by several connections, for exercising writers
/// that race each other.
pub struct FileDb {
    pub db_pool: SqlitePool,
    dir: PathBuf,
}

impl FileDb {
    pub async fn new(max_connections: u32) -> Self {
        let dir = upload_dir();
        std::fs::create_dir_all(&dir).unwrap();

        let options = SqliteConnectOptions::new()
            .filename(dir.join("chatterbox.db"))
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));

        let db_pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .unwrap();

        db::MIGRATOR.run(&db_pool).await.unwrap();
        FileDb { db_pool, dir }
    }
}

impl Drop for FileDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

pub fn upload_dir() -> PathBuf {
    std::env::temp_dir().join(format!("chatterbox-test-{}", uuid::Uuid::now_v7()))
}

pub struct TestApp {
    pub db_pool: SqlitePool,
    pub upload_dir: PathBuf,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_pool = pool().await;
        let upload_dir = upload_dir();
        let router = chatterbox::router(AppState::new(db_pool.clone(), BlobStore::new(&upload_dir)));
        TestApp {
            db_pool,
            upload_dir,
            router,
        }
    }

    pub async fn user(&self, name: &str) -> String {
        auth::login(&self.db_pool, name).await.unwrap()
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.send(request.body(body).unwrap()).await
    }

    pub async fn upload(&self, uri: &str, token: &str, data: &[u8]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body("photo", data)))
            .unwrap();

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

pub fn multipart_body(field: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
