use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, info};

use crate::components::{CommandDefinition, InteractionResponse};
use crate::events::InteractionHandle;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponderError {
    #[error("interaction callback request failed: {0}")]
    Transport(String),
    #[error("interaction callback rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("discord.application_id is not configured; commands cannot be registered")]
    MissingApplicationId,
    #[error("command registration request failed: {0}")]
    Transport(String),
    #[error("command registration rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait InteractionResponder: Send + Sync {
    async fn respond(
        &self,
        handle: &InteractionHandle,
        response: &InteractionResponse,
    ) -> Result<(), ResponderError>;
}

#[async_trait]
pub trait CommandRegistrar: Send + Sync {
    /// Replaces the application's global commands with `definitions`.
    async fn register(&self, definitions: &[CommandDefinition]) -> Result<usize, RegistrationError>;
}

pub struct DiscordRestClient {
    http: Client,
    api_base_url: String,
    token: SecretString,
    application_id: Option<String>,
    timeout: Duration,
}

impl DiscordRestClient {
    pub fn new(
        api_base_url: impl Into<String>,
        token: SecretString,
        application_id: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http: Client::new(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            token,
            application_id,
            timeout,
        }
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token.expose_secret())
    }
}

#[async_trait]
impl InteractionResponder for DiscordRestClient {
    async fn respond(
        &self,
        handle: &InteractionHandle,
        response: &InteractionResponse,
    ) -> Result<(), ResponderError> {
        let url =
            format!("{}/interactions/{}/{}/callback", self.api_base_url, handle.id, handle.token);

        let reply = self
            .http
            .post(url)
            .header(AUTHORIZATION, self.authorization())
            .timeout(self.timeout)
            .json(&response.callback_body())
            .send()
            .await
            .map_err(|error| ResponderError::Transport(error.to_string()))?;

        let status = reply.status();
        if !status.is_success() {
            let body = reply.text().await.unwrap_or_default();
            return Err(ResponderError::Rejected { status: status.as_u16(), body });
        }

        debug!(
            event_name = "egress.discord.response_sent",
            interaction_id = %handle.id,
            ephemeral = response.is_ephemeral(),
            "interaction response sent"
        );
        Ok(())
    }
}

#[async_trait]
impl CommandRegistrar for DiscordRestClient {
    async fn register(&self, definitions: &[CommandDefinition]) -> Result<usize, RegistrationError> {
        let application_id =
            self.application_id.as_deref().ok_or(RegistrationError::MissingApplicationId)?;
        let url = format!("{}/applications/{}/commands", self.api_base_url, application_id);

        let reply = self
            .http
            .put(url)
            .header(AUTHORIZATION, self.authorization())
            .timeout(self.timeout)
            .json(definitions)
            .send()
            .await
            .map_err(|error| RegistrationError::Transport(error.to_string()))?;

        let status = reply.status();
        if !status.is_success() {
            let body = reply.text().await.unwrap_or_default();
            return Err(RegistrationError::Rejected { status: status.as_u16(), body });
        }

        info!(
            event_name = "egress.discord.commands_registered",
            application_id,
            count = definitions.len(),
            "registered application commands"
        );
        Ok(definitions.len())
    }
}
