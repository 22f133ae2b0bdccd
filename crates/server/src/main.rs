mod admin;
mod bootstrap;
mod chat;
mod health;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use innkeep_core::config::{AppConfig, LoadOptions};

use crate::chat::AppState;

fn init_logging(config: &AppConfig) {
    use innkeep_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/admin/reservations", get(admin::list_reservations))
        .route("/admin/reservations/{id}/confirm", post(admin::confirm_reservation))
        .route("/admin/reservations/{id}/reject", post(admin::reject_reservation))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let state = AppState {
        router: app.router.clone(),
        sessions: app.sessions.clone(),
        store: app.store.clone(),
    };

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        session_id = "unknown",
        reservation_id = "unknown",
        bind_address = %address,
        "innkeep-server chat endpoint started"
    );

    axum::serve(listener, api_router(state))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        session_id = "unknown",
        reservation_id = "unknown",
        "innkeep-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
