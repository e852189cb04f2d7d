use std::sync::Arc;

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, warn};
use yambot_core::{
    ApplicationError, CommandKind, CommandSet, CommandSpec, InterfaceError, ResponseTemplater,
    TemplateData, WebhookResponse,
};

use crate::components::{
    command_from_modal_id, form_summary, modal_for, slash_options, InteractionResponse,
    UiBuildError,
};
use crate::events::{CommandInvocation, EventContext, ModalSubmission, OptionValue};
use crate::validation::FieldValidator;
use crate::webhook::WebhookSender;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("modal submission received for slash command `{0}`")]
    SubmissionForSlashCommand(String),
    #[error(transparent)]
    Ui(#[from] UiBuildError),
}

impl From<RouteError> for ApplicationError {
    fn from(error: RouteError) -> Self {
        match error {
            RouteError::UnknownCommand(command) => Self::UnknownCommand(command),
            other @ RouteError::SubmissionForSlashCommand(_) => Self::Routing(other.to_string()),
            RouteError::Ui(ui) => Self::Configuration(ui.to_string()),
        }
    }
}

/// Runs one interaction from lookup to a single response.
pub struct CommandPipeline {
    commands: Arc<CommandSet>,
    webhooks: Arc<dyn WebhookSender>,
    validator: FieldValidator,
    templater: ResponseTemplater,
}

impl CommandPipeline {
    pub fn new(
        commands: Arc<CommandSet>,
        webhooks: Arc<dyn WebhookSender>,
        validator: FieldValidator,
    ) -> Self {
        Self { commands, webhooks, validator, templater: ResponseTemplater::new() }
    }

    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }

    pub async fn handle_invocation(
        &self,
        invocation: &CommandInvocation,
        ctx: &EventContext,
    ) -> InteractionResponse {
        match self.route_invocation(invocation, ctx).await {
            Ok(response) => response,
            Err(error) => error_response(&invocation.command_name, error, ctx),
        }
    }

    pub async fn handle_submission(
        &self,
        submission: &ModalSubmission,
        ctx: &EventContext,
    ) -> InteractionResponse {
        let Some(command) = command_from_modal_id(&submission.custom_id) else {
            let error = RouteError::UnknownCommand(submission.custom_id.clone());
            return error_response(&submission.custom_id, error.into(), ctx);
        };
        match self.route_submission(command, submission, ctx).await {
            Ok(response) => response,
            Err(error) => error_response(command, error, ctx),
        }
    }

    fn resolve(&self, name: &str, ctx: &EventContext) -> Result<&CommandSpec, RouteError> {
        let spec =
            self.commands.get(name).ok_or_else(|| RouteError::UnknownCommand(name.to_owned()))?;
        info!(
            event_name = "dispatch.command.resolved",
            correlation_id = %ctx.correlation_id,
            command = %spec.name,
            command_type = %spec.kind,
            "resolved command spec"
        );
        Ok(spec)
    }

    async fn route_invocation(
        &self,
        invocation: &CommandInvocation,
        ctx: &EventContext,
    ) -> Result<InteractionResponse, ApplicationError> {
        let spec = self.resolve(&invocation.command_name, ctx)?;

        match spec.kind {
            CommandKind::Slash => self.run_slash(spec, invocation, ctx).await,
            CommandKind::Modal => {
                info!(
                    event_name = "dispatch.modal.opened",
                    correlation_id = %ctx.correlation_id,
                    command = %spec.name,
                    "responding with modal form"
                );
                Ok(InteractionResponse::Modal(modal_for(spec)))
            }
        }
    }

    async fn run_slash(
        &self,
        spec: &CommandSpec,
        invocation: &CommandInvocation,
        ctx: &EventContext,
    ) -> Result<InteractionResponse, ApplicationError> {
        slash_options(spec).map_err(RouteError::from)?;

        let (inputs, payload) = slash_inputs(spec, invocation);
        let webhook_response = self.call_webhook(spec, &payload, ctx).await;
        let data = TemplateData::new(inputs, webhook_response);

        Ok(InteractionResponse::public(self.templater.render(spec.response_template(), &data)))
    }

    async fn route_submission(
        &self,
        command: &str,
        submission: &ModalSubmission,
        ctx: &EventContext,
    ) -> Result<InteractionResponse, ApplicationError> {
        let spec = self.resolve(command, ctx)?;
        if spec.kind != CommandKind::Modal {
            return Err(RouteError::SubmissionForSlashCommand(spec.name.clone()).into());
        }

        if let Err(report) = self.validator.validate_form(spec, &submission.values).await {
            info!(
                event_name = "dispatch.modal.validation_failed",
                correlation_id = %ctx.correlation_id,
                command = %spec.name,
                violations = report.violations.len(),
                "modal submission failed validation"
            );
            let error = InterfaceError::invalid_input(report.to_string(), ctx.correlation_id.clone());
            return Ok(InteractionResponse::ephemeral(error.user_message()));
        }

        let payload: Map<String, Value> = submission
            .values
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        let webhook_response = self.call_webhook(spec, &payload, ctx).await;

        let content = match spec.response_template() {
            Some(template) => {
                let data = TemplateData::new(payload, webhook_response);
                self.templater.render(Some(template), &data)
            }
            None => form_summary(spec, &submission.values, webhook_response.as_ref()),
        };

        Ok(InteractionResponse::public(content))
    }

    async fn call_webhook(
        &self,
        spec: &CommandSpec,
        payload: &Map<String, Value>,
        ctx: &EventContext,
    ) -> Option<WebhookResponse> {
        let url = spec.webhook_url()?;
        let response = self.webhooks.send(url, payload).await;
        info!(
            event_name = "dispatch.webhook.completed",
            correlation_id = %ctx.correlation_id,
            command = %spec.name,
            status = response.status.as_str(),
            status_code = response.status_code,
            "command webhook completed"
        );
        Some(response)
    }
}

fn error_response(command: &str, error: ApplicationError, ctx: &EventContext) -> InteractionResponse {
    let interface = error.into_interface(ctx.correlation_id.clone());
    warn!(
        event_name = "dispatch.command.failed",
        correlation_id = %interface.correlation_id(),
        command,
        error = %interface,
        "command dispatch failed"
    );
    InteractionResponse::ephemeral(interface.user_message())
}

/// Template inputs and webhook payload for a slash invocation. Only declared
/// fields are read; attachments are resolved to their metadata.
fn slash_inputs(
    spec: &CommandSpec,
    invocation: &CommandInvocation,
) -> (Map<String, Value>, Map<String, Value>) {
    let mut inputs = Map::new();
    let mut payload = Map::new();
    payload.insert("command".to_owned(), Value::String(spec.name.clone()));

    for field in &spec.fields {
        let Some(value) = invocation.option(&field.name) else {
            continue;
        };

        match value {
            OptionValue::String(text) => {
                inputs.insert(field.name.clone(), Value::String(text.clone()));
                payload.insert(field.name.clone(), Value::String(text.clone()));
            }
            OptionValue::Attachment(id) => match invocation.attachments.get(id) {
                Some(attachment) => {
                    let content_type = attachment.content_type.clone().unwrap_or_default();
                    inputs.insert(
                        field.name.clone(),
                        json!({
                            "name": attachment.filename,
                            "content_type": content_type,
                            "size": attachment.size,
                            "url": attachment.url,
                        }),
                    );
                    payload.insert(
                        field.name.clone(),
                        Value::String(format!(
                            "File: {} ({}, {} bytes)",
                            attachment.filename, content_type, attachment.size
                        )),
                    );
                    payload.insert(
                        format!("{}_url", field.name),
                        Value::String(attachment.url.clone()),
                    );
                    payload.insert(
                        format!("{}_content_type", field.name),
                        Value::String(content_type),
                    );
                    payload.insert(
                        format!("{}_size", field.name),
                        Value::String(attachment.size.to_string()),
                    );
                }
                None => {
                    inputs.insert(field.name.clone(), Value::String(id.clone()));
                    payload.insert(field.name.clone(), Value::String(id.clone()));
                }
            },
            OptionValue::Other(raw) => {
                inputs.insert(field.name.clone(), raw.clone());
                payload.insert(field.name.clone(), raw.clone());
            }
        }
    }

    (inputs, payload)
}
