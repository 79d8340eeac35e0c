use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use scrawl_db::Database;
use scrawl_gateway::dispatcher::Dispatcher;
use scrawl_gateway::registry::Registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scrawl=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("SCRAWL_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("SCRAWL_DB_PATH").unwrap_or_else(|_| "scrawl.db".into());
    let host = std::env::var("SCRAWL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("SCRAWL_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()?;

    // Durable store
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);

    // Registry and dispatcher are process-wide; every connection task
    // shares them.
    let dispatcher = Dispatcher::new(Registry::new(), db);

    let app = scrawl_server::app(dispatcher, jwt_secret);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Scrawl broadcaster listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
