use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};
use yambot_core::CommandSet;

#[derive(Clone)]
pub struct HealthState {
    commands: Arc<CommandSet>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub commands: HealthCheck,
    pub command_count: usize,
    pub checked_at: String,
}

pub fn router(commands: Arc<CommandSet>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { commands })
}

pub async fn spawn(bind_address: &str, port: u16, commands: Arc<CommandSet>) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(commands)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let command_count = state.commands.len();
    let commands = if command_count > 0 {
        HealthCheck { status: "ready", detail: format!("{command_count} commands loaded") }
    } else {
        HealthCheck { status: "degraded", detail: "no commands configured".to_string() }
    };
    let ready = commands.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "yambot-server runtime initialized".to_string(),
        },
        commands,
        command_count,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
