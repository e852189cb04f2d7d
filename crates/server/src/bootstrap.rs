use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};
use yambot_core::config::{AppConfig, ConfigError, LoadOptions};
use yambot_core::CommandSet;
use yambot_discord::commands::CommandPipeline;
use yambot_discord::components::command_definitions;
use yambot_discord::events::default_dispatcher;
use yambot_discord::gateway::{GatewayRunner, GatewayTransport, NoopGatewayTransport, ReconnectPolicy};
use yambot_discord::rest::{CommandRegistrar, DiscordRestClient};
use yambot_discord::validation::FieldValidator;
use yambot_discord::webhook::{RemoteOptionResolver, WebhookClient};

pub const NOOP_TRANSPORT: &str = "noop";

pub struct Application {
    pub config: AppConfig,
    pub commands: Arc<CommandSet>,
    pub discord: Arc<DiscordRestClient>,
    pub gateway: GatewayRunner,
    pub transport_mode: &'static str,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    Ok(bootstrap_with_config(config))
}

/// Wires the interaction pipeline around an already loaded configuration.
pub fn bootstrap_with_config(config: AppConfig) -> Application {
    bootstrap_with_transport(config, Arc::new(NoopGatewayTransport), NOOP_TRANSPORT)
}

pub fn bootstrap_with_transport(
    config: AppConfig,
    transport: Arc<dyn GatewayTransport>,
    transport_mode: &'static str,
) -> Application {
    let timeout = Duration::from_secs(config.http.timeout_secs);
    let commands = Arc::new(config.commands.clone());

    let pipeline = CommandPipeline::new(
        Arc::clone(&commands),
        Arc::new(WebhookClient::new(timeout)),
        FieldValidator::new(Arc::new(RemoteOptionResolver::new(timeout))),
    );
    let dispatcher = Arc::new(default_dispatcher(Arc::new(pipeline)));

    let discord = Arc::new(DiscordRestClient::new(
        config.discord.api_base_url.clone(),
        config.discord.token.clone(),
        config.discord.application_id.clone(),
        timeout,
    ));

    let gateway =
        GatewayRunner::new(transport, dispatcher, discord.clone(), ReconnectPolicy::default());

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        commands = commands.len(),
        transport_mode,
        "interaction pipeline ready"
    );

    Application { config, commands, discord, gateway, transport_mode }
}

/// Registers every expressible command. Failures are logged; the bot keeps
/// running with whatever Discord already has.
pub async fn register_commands(registrar: &dyn CommandRegistrar, commands: &CommandSet) -> usize {
    let (definitions, skipped) = command_definitions(commands);
    for error in &skipped {
        warn!(
            event_name = "system.registration.skipped",
            correlation_id = "bootstrap",
            error = %error,
            "command cannot be registered"
        );
    }

    match registrar.register(&definitions).await {
        Ok(count) => {
            info!(
                event_name = "system.registration.completed",
                correlation_id = "bootstrap",
                registered = count,
                skipped = skipped.len(),
                "commands registered"
            );
            count
        }
        Err(error) => {
            warn!(
                event_name = "system.registration.failed",
                correlation_id = "bootstrap",
                error = %error,
                "command registration failed; continuing without it"
            );
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use yambot_core::config::{ConfigOverrides, LoadOptions};
    use yambot_core::{CommandKind, CommandSet, CommandSpec, FieldSpec};
    use yambot_discord::components::CommandDefinition;
    use yambot_discord::rest::{CommandRegistrar, RegistrationError};

    use crate::bootstrap::{bootstrap, register_commands, NOOP_TRANSPORT};

    struct FakeRegistrar {
        fail: bool,
        registered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRegistrar for FakeRegistrar {
        async fn register(
            &self,
            definitions: &[CommandDefinition],
        ) -> Result<usize, RegistrationError> {
            if self.fail {
                return Err(RegistrationError::Rejected { status: 401, body: "unauthorized".to_owned() });
            }
            let mut registered = self.registered.lock().expect("registrar lock");
            registered.extend(definitions.iter().map(|definition| definition.name.clone()));
            Ok(definitions.len())
        }
    }

    fn commands() -> CommandSet {
        CommandSet::new(vec![
            CommandSpec::new("ping", CommandKind::Slash),
            CommandSpec::new("cost", CommandKind::Modal).with_field(FieldSpec::text("title")),
            CommandSpec::new("assign", CommandKind::Slash)
                .with_field(FieldSpec::remote_select("project", "https://example.com/projects")),
        ])
        .expect("unique commands")
    }

    #[test]
    fn bootstrap_fails_fast_without_discord_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides { discord_token: Some(String::new()), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        });

        let message = result.err().expect("error").to_string();
        assert!(message.contains("discord.token"));
    }

    #[tokio::test]
    async fn bootstrap_wires_pipeline_with_valid_overrides() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                discord_token: Some("token".to_owned()),
                commands: Some(vec![CommandSpec::new("ping", CommandKind::Slash)]),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("bootstrap should succeed");

        assert_eq!(app.commands.len(), 1);
        assert_eq!(app.transport_mode, NOOP_TRANSPORT);
        app.gateway.start().await.expect("noop gateway completes");
    }

    #[tokio::test]
    async fn registration_skips_unexpressible_commands() {
        let registrar = FakeRegistrar { fail: false, registered: Mutex::new(Vec::new()) };

        let count = register_commands(&registrar, &commands()).await;

        assert_eq!(count, 2);
        assert_eq!(
            registrar.registered.lock().expect("registrar lock").clone(),
            vec!["ping".to_owned(), "cost".to_owned()]
        );
    }

    #[tokio::test]
    async fn registration_failure_is_not_fatal() {
        let registrar = FakeRegistrar { fail: true, registered: Mutex::new(Vec::new()) };

        assert_eq!(register_commands(&registrar, &commands()).await, 0);
    }
}
