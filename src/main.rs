use anyhow::Context;
use lobbychat::{app, config::Config, db::Database, logging, shutdown, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let db = Database::connect(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?
        .with_bcrypt_cost(config.bcrypt_cost);
    let tokens = config.token_service()?;

    let app = app(AppState { db, tokens });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal())
        .await?;

    Ok(())
}

