use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use docchat_backend::server;
use docchat_backend::state::AppState;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    docchat_backend::core::logging::init(&state.paths);

    state.spawn_index_initialization();
    state.spawn_session_sweeper(SESSION_SWEEP_INTERVAL);

    let bind_addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
