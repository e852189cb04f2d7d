mod bootstrap;
mod health;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use yambot_core::config::{AppConfig, LoadOptions};

fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging(config: &AppConfig) {
    use yambot_core::config::LogFormat::*;

    let filter = log_filter(&config.logging.level);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config);

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.commands.clone(),
    )
    .await?;

    bootstrap::register_commands(app.discord.as_ref(), &app.commands).await;

    if app.transport_mode == bootstrap::NOOP_TRANSPORT {
        tracing::warn!(
            event_name = "system.server.gateway_transport_mode",
            transport_mode = app.transport_mode,
            correlation_id = "bootstrap",
            "no live gateway transport configured; interactions will not be received"
        );
    } else {
        tracing::info!(
            event_name = "system.server.gateway_transport_mode",
            transport_mode = app.transport_mode,
            correlation_id = "bootstrap",
            "gateway runner transport mode initialized"
        );
    }

    app.gateway.start().await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        commands = app.commands.len(),
        "yambot-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "yambot-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::log_filter;

    #[test]
    fn log_filter_keeps_per_target_directives() {
        let filter = log_filter("warn,yambot_discord=debug").to_string();
        assert!(filter.contains("yambot_discord=debug"), "{filter}");
        assert!(filter.contains("warn"), "{filter}");
    }

    #[test]
    fn unparseable_level_falls_back_to_info() {
        assert_eq!(log_filter("yambot=verbose").to_string(), "info");
    }
}
