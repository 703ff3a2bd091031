use chatterbox::{config::Config, db, photos::BlobStore, router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db_pool = db::connect(&config).await?;
    tracing::info!(database = %config.database_url, "database ready");

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let app_state = AppState::new(db_pool, BlobStore::new(&config.upload_dir));

    let app = router(app_state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
