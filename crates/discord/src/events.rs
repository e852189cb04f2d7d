use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::commands::CommandPipeline;
use crate::components::InteractionResponse;

const APPLICATION_COMMAND: u8 = 2;
const MESSAGE_COMPONENT: u8 = 3;
const MODAL_SUBMIT: u8 = 5;
const STRING_OPTION: u8 = 3;
const ATTACHMENT_OPTION: u8 = 11;

/// Id and token needed to answer an interaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionHandle {
    pub id: String,
    pub token: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    String(String),
    /// Attachment id, resolved through [`CommandInvocation::attachments`].
    Attachment(String),
    Other(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommandOptionInput {
    pub name: String,
    pub value: OptionValue,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommandInvocation {
    pub handle: InteractionHandle,
    pub command_name: String,
    pub options: Vec<CommandOptionInput>,
    pub attachments: HashMap<String, Attachment>,
}

impl CommandInvocation {
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.iter().find(|option| option.name == name).map(|option| &option.value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModalSubmission {
    pub handle: InteractionHandle,
    pub custom_id: String,
    pub values: HashMap<String, String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Interaction {
    ApplicationCommand(CommandInvocation),
    ModalSubmit(ModalSubmission),
    Component { handle: InteractionHandle, custom_id: String },
    Unsupported { handle: InteractionHandle, kind: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    ApplicationCommand,
    ModalSubmit,
    Component,
    Unsupported,
}

impl Interaction {
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::ApplicationCommand(_) => InteractionKind::ApplicationCommand,
            Self::ModalSubmit(_) => InteractionKind::ModalSubmit,
            Self::Component { .. } => InteractionKind::Component,
            Self::Unsupported { .. } => InteractionKind::Unsupported,
        }
    }

    pub fn handle(&self) -> &InteractionHandle {
        match self {
            Self::ApplicationCommand(invocation) => &invocation.handle,
            Self::ModalSubmit(submission) => &submission.handle,
            Self::Component { handle, .. } | Self::Unsupported { handle, .. } => handle,
        }
    }

    /// Command name for application commands, custom id for the rest.
    pub fn target(&self) -> &str {
        match self {
            Self::ApplicationCommand(invocation) => &invocation.command_name,
            Self::ModalSubmit(submission) => &submission.custom_id,
            Self::Component { custom_id, .. } => custom_id,
            Self::Unsupported { .. } => "",
        }
    }
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("interaction payload is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("interaction of type {kind} has no `{field}`")]
    MissingField { kind: u8, field: &'static str },
}

#[derive(Deserialize)]
struct RawInteraction {
    id: String,
    token: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    data: Option<RawData>,
}

#[derive(Default, Deserialize)]
struct RawData {
    name: Option<String>,
    #[serde(default)]
    options: Vec<RawOption>,
    #[serde(default)]
    resolved: Option<RawResolved>,
    custom_id: Option<String>,
    #[serde(default)]
    components: Vec<RawRow>,
}

#[derive(Deserialize)]
struct RawOption {
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    value: Value,
}

#[derive(Default, Deserialize)]
struct RawResolved {
    #[serde(default)]
    attachments: HashMap<String, RawAttachment>,
}

#[derive(Deserialize)]
struct RawAttachment {
    id: String,
    filename: String,
    content_type: Option<String>,
    #[serde(default)]
    size: u64,
    url: String,
}

#[derive(Deserialize)]
struct RawRow {
    #[serde(default)]
    components: Vec<RawComponent>,
}

#[derive(Deserialize)]
struct RawComponent {
    custom_id: Option<String>,
    value: Option<String>,
}

/// Decodes a Discord `INTERACTION_CREATE` body into the typed model.
pub fn from_gateway_payload(payload: Value) -> Result<Interaction, PayloadError> {
    let raw: RawInteraction = serde_json::from_value(payload)?;
    let handle = InteractionHandle { id: raw.id, token: raw.token };
    let kind = raw.kind;
    let data = raw.data.unwrap_or_default();

    match kind {
        APPLICATION_COMMAND => {
            let command_name = data.name.ok_or(PayloadError::MissingField { kind, field: "data.name" })?;
            let options = data
                .options
                .into_iter()
                .map(|option| CommandOptionInput {
                    value: match (option.kind, option.value) {
                        (STRING_OPTION, Value::String(text)) => OptionValue::String(text),
                        (ATTACHMENT_OPTION, Value::String(id)) => OptionValue::Attachment(id),
                        (_, other) => OptionValue::Other(other),
                    },
                    name: option.name,
                })
                .collect();
            let attachments = data
                .resolved
                .unwrap_or_default()
                .attachments
                .into_iter()
                .map(|(key, raw)| {
                    (
                        key,
                        Attachment {
                            id: raw.id,
                            filename: raw.filename,
                            content_type: raw.content_type,
                            size: raw.size,
                            url: raw.url,
                        },
                    )
                })
                .collect();

            Ok(Interaction::ApplicationCommand(CommandInvocation {
                handle,
                command_name,
                options,
                attachments,
            }))
        }
        MODAL_SUBMIT => {
            let custom_id =
                data.custom_id.ok_or(PayloadError::MissingField { kind, field: "data.custom_id" })?;
            let values = data
                .components
                .into_iter()
                .flat_map(|row| row.components)
                .filter_map(|component| Some((component.custom_id?, component.value?)))
                .collect();

            Ok(Interaction::ModalSubmit(ModalSubmission { handle, custom_id, values }))
        }
        MESSAGE_COMPONENT => Ok(Interaction::Component {
            handle,
            custom_id: data.custom_id.unwrap_or_default(),
        }),
        other => Ok(Interaction::Unsupported { handle, kind: other }),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(InteractionResponse),
    Ignored,
}

#[async_trait]
pub trait InteractionHandler: Send + Sync {
    fn kind(&self) -> InteractionKind;
    async fn handle(
        &self,
        interaction: &Interaction,
        ctx: &EventContext,
    ) -> HandlerResult;
}

#[derive(Default)]
pub struct InteractionDispatcher {
    handlers: HashMap<InteractionKind, Arc<dyn InteractionHandler>>,
}

impl InteractionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: InteractionHandler + 'static,
    {
        self.handlers.insert(handler.kind(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        interaction: &Interaction,
        ctx: &EventContext,
    ) -> HandlerResult {
        let Some(handler) = self.handlers.get(&interaction.kind()) else {
            return HandlerResult::Ignored;
        };

        handler.handle(interaction, ctx).await
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Slash invocations and modal submissions go through `pipeline`; component
/// clicks and anything else are ignored.
pub fn default_dispatcher(pipeline: Arc<CommandPipeline>) -> InteractionDispatcher {
    let mut dispatcher = InteractionDispatcher::new();
    dispatcher.register(ApplicationCommandHandler::new(Arc::clone(&pipeline)));
    dispatcher.register(ModalSubmitHandler::new(pipeline));
    dispatcher
}

pub struct ApplicationCommandHandler {
    pipeline: Arc<CommandPipeline>,
}

impl ApplicationCommandHandler {
    pub fn new(pipeline: Arc<CommandPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl InteractionHandler for ApplicationCommandHandler {
    fn kind(&self) -> InteractionKind {
        InteractionKind::ApplicationCommand
    }

    async fn handle(
        &self,
        interaction: &Interaction,
        ctx: &EventContext,
    ) -> HandlerResult {
        let Interaction::ApplicationCommand(invocation) = interaction else {
            return HandlerResult::Ignored;
        };

        HandlerResult::Responded(self.pipeline.handle_invocation(invocation, ctx).await)
    }
}

pub struct ModalSubmitHandler {
    pipeline: Arc<CommandPipeline>,
}

impl ModalSubmitHandler {
    pub fn new(pipeline: Arc<CommandPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl InteractionHandler for ModalSubmitHandler {
    fn kind(&self) -> InteractionKind {
        InteractionKind::ModalSubmit
    }

    async fn handle(
        &self,
        interaction: &Interaction,
        ctx: &EventContext,
    ) -> HandlerResult {
        let Interaction::ModalSubmit(submission) = interaction else {
            return HandlerResult::Ignored;
        };

        HandlerResult::Responded(self.pipeline.handle_submission(submission, ctx).await)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::{
        from_gateway_payload, EventContext, HandlerResult, Interaction,
        InteractionDispatcher, InteractionHandler, InteractionKind, OptionValue, PayloadError,
    };
    use crate::components::InteractionResponse;

    #[test]
    fn decodes_application_command_with_attachment() {
        let interaction = from_gateway_payload(json!({
            "id": "111",
            "token": "tok",
            "type": 2,
            "data": {
                "name": "expense",
                "options": [
                    {"name": "title", "type": 3, "value": "Laptop"},
                    {"name": "receipt", "type": 11, "value": "900"},
                    {"name": "count", "type": 4, "value": 3}
                ],
                "resolved": {
                    "attachments": {
                        "900": {
                            "id": "900",
                            "filename": "receipt.pdf",
                            "content_type": "application/pdf",
                            "size": 2048,
                            "url": "https://cdn.example.com/receipt.pdf"
                        }
                    }
                }
            }
        }))
        .expect("valid payload");

        let Interaction::ApplicationCommand(invocation) = interaction else {
            panic!("expected application command");
        };
        assert_eq!(invocation.command_name, "expense");
        assert_eq!(invocation.handle.id, "111");
        assert_eq!(invocation.option("title"), Some(&OptionValue::String("Laptop".to_owned())));
        assert_eq!(invocation.option("receipt"), Some(&OptionValue::Attachment("900".to_owned())));
        assert_eq!(invocation.option("count"), Some(&OptionValue::Other(json!(3))));
        assert_eq!(invocation.attachments["900"].filename, "receipt.pdf");
        assert_eq!(invocation.attachments["900"].size, 2048);
    }

    #[test]
    fn decodes_modal_submission_values() {
        let interaction = from_gateway_payload(json!({
            "id": "222",
            "token": "tok",
            "type": 5,
            "data": {
                "custom_id": "modal_cost",
                "components": [
                    {"type": 1, "components": [{"type": 4, "custom_id": "title", "value": "Laptop"}]},
                    {"type": 1, "components": [{"type": 4, "custom_id": "amount", "value": "12,50"}]}
                ]
            }
        }))
        .expect("valid payload");

        let Interaction::ModalSubmit(submission) = interaction else {
            panic!("expected modal submission");
        };
        assert_eq!(submission.custom_id, "modal_cost");
        assert_eq!(submission.values["title"], "Laptop");
        assert_eq!(submission.values["amount"], "12,50");
    }

    #[test]
    fn classifies_components_and_unknown_types() {
        let component = from_gateway_payload(json!({
            "id": "1", "token": "t", "type": 3, "data": {"custom_id": "button"}
        }))
        .expect("component");
        assert_eq!(component.kind(), InteractionKind::Component);
        assert_eq!(component.target(), "button");

        let ping = from_gateway_payload(json!({"id": "2", "token": "t", "type": 1})).expect("ping");
        assert!(matches!(ping, Interaction::Unsupported { kind: 1, .. }));
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(
            from_gateway_payload(json!({"id": "1", "type": 2})),
            Err(PayloadError::Malformed(_))
        ));
        assert!(matches!(
            from_gateway_payload(json!({"id": "1", "token": "t", "type": 2, "data": {}})),
            Err(PayloadError::MissingField { field: "data.name", .. })
        ));
    }

    struct EchoHandler;

    #[async_trait]
    impl InteractionHandler for EchoHandler {
        fn kind(&self) -> InteractionKind {
            InteractionKind::Component
        }

        async fn handle(
            &self,
            interaction: &Interaction,
            ctx: &EventContext,
        ) -> HandlerResult {
            HandlerResult::Responded(InteractionResponse::ephemeral(format!(
                "{} {}",
                interaction.target(),
                ctx.correlation_id
            )))
        }
    }

    #[tokio::test]
    async fn dispatcher_routes_by_kind_and_ignores_unregistered() {
        let mut dispatcher = InteractionDispatcher::new();
        dispatcher.register(EchoHandler);
        assert_eq!(dispatcher.handler_count(), 1);

        let ctx = EventContext { correlation_id: "corr-1".to_owned() };
        let component = from_gateway_payload(json!({
            "id": "1", "token": "t", "type": 3, "data": {"custom_id": "button"}
        }))
        .expect("component");
        let result = dispatcher.dispatch(&component, &ctx).await;
        assert_eq!(
            result,
            HandlerResult::Responded(InteractionResponse::ephemeral("button corr-1"))
        );

        let ping = from_gateway_payload(json!({"id": "2", "token": "t", "type": 1})).expect("ping");
        assert_eq!(dispatcher.dispatch(&ping, &ctx).await, HandlerResult::Ignored);
    }
}
