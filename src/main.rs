use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bhimdatta::app::{build_router, build_state};
use bhimdatta::auth::session;
use bhimdatta::config::{Cli, Config};
use bhimdatta::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure uploads directory exists
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = if config.database.ephemeral {
        tracing::warn!("Ephemeral mode: reports and uploads are discarded on restart");
        db::create_memory_pool()?
    } else {
        db::create_pool(&config.db_path())?
    };
    db::run_migrations(&pool)?;

    let purged = session::purge_expired(&pool)?;
    if purged > 0 {
        tracing::info!("Purged {} expired session(s)", purged);
    }

    let state = build_state(pool, config.clone());
    if config.database.ephemeral {
        state.media.clear().await?;
    }

    if config.seed.demo {
        db::seed::seed_demo(
            state.accounts.as_ref(),
            state.problems.as_ref(),
            config.auth.bcrypt_cost,
        )
        .await?;
    }

    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
