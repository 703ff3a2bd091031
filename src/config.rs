use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    /// Root directory of the photo blob store, also served under `/uploads`.
    pub upload_dir: PathBuf,
}

impl Config {
    /// Reads the environment, after loading `.env` if there is one.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_url = dotenv::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://chatterbox.db".to_owned());

        let db_max_connections = match dotenv::var("DB_MAX_CONNECTIONS") {
            Ok(v) => v.parse().context("DB_MAX_CONNECTIONS must be a number")?,
            Err(_) => 16,
        };

        let bind_addr = dotenv::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_owned())
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let upload_dir = dotenv::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        Ok(Config {
            database_url,
            db_max_connections,
            bind_addr,
            upload_dir,
        })
    }
}
