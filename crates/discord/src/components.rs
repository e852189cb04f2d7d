use std::collections::HashMap;

use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;
use yambot_core::text::title_case;
use yambot_core::{CommandKind, CommandSet, CommandSpec, FieldKind, FieldSpec, TextSemantic};
use yambot_core::WebhookResponse;

pub const MODAL_PREFIX: &str = "modal_";

const SHORT_MAX_LENGTH: u16 = 1000;
const PARAGRAPH_MAX_LENGTH: u16 = 4000;
const ACTION_ROW: u8 = 1;
const TEXT_INPUT: u8 = 4;
const CHAT_INPUT_COMMAND: u8 = 1;
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
const MODAL_RESPONSE: u8 = 9;
const EPHEMERAL_FLAG: u64 = 1 << 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextInputStyle {
    Short = 1,
    Paragraph = 2,
}

impl Serialize for TextInputStyle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TextInput {
    #[serde(rename = "type")]
    component_type: u8,
    pub custom_id: String,
    pub label: String,
    pub style: TextInputStyle,
    pub placeholder: String,
    pub required: bool,
    pub max_length: u16,
}

impl TextInput {
    fn for_field(field: &FieldSpec) -> Self {
        let (style, max_length) = if field.is_long_form() {
            (TextInputStyle::Paragraph, PARAGRAPH_MAX_LENGTH)
        } else {
            (TextInputStyle::Short, SHORT_MAX_LENGTH)
        };

        Self {
            component_type: TEXT_INPUT,
            custom_id: field.name.clone(),
            label: title_case(&field.name),
            style,
            placeholder: format!("Enter {}", field.name),
            required: field.required,
            max_length,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    component_type: u8,
    pub components: Vec<TextInput>,
}

impl ActionRow {
    pub fn single(input: TextInput) -> Self {
        Self { component_type: ACTION_ROW, components: vec![input] }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalPayload {
    pub custom_id: String,
    pub title: String,
    pub components: Vec<ActionRow>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionType {
    String = 3,
    Attachment = 11,
}

impl Serialize for OptionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionChoice {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandOption {
    #[serde(rename = "type")]
    pub kind: OptionType,
    pub name: String,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<OptionChoice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandDefinition {
    #[serde(rename = "type")]
    command_type: u8,
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOption>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UiBuildError {
    #[error("field `{field}` of command `{command}` has type {kind}, which has no slash option form")]
    UnsupportedSlashField { command: String, field: String, kind: FieldKind },
}

/// What a handler sends back for one interaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionResponse {
    Message { content: String, ephemeral: bool },
    Modal(ModalPayload),
}

impl InteractionResponse {
    pub fn public(content: impl Into<String>) -> Self {
        Self::Message { content: content.into(), ephemeral: false }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self::Message { content: content.into(), ephemeral: true }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Message { content, .. } => Some(content),
            Self::Modal(_) => None,
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Message { ephemeral: true, .. })
    }

    /// Body for `POST /interactions/{id}/{token}/callback`.
    pub fn callback_body(&self) -> Value {
        match self {
            Self::Message { content, ephemeral } => {
                let mut data = json!({ "content": content });
                if *ephemeral {
                    data["flags"] = json!(EPHEMERAL_FLAG);
                }
                json!({ "type": CHANNEL_MESSAGE_WITH_SOURCE, "data": data })
            }
            Self::Modal(modal) => json!({ "type": MODAL_RESPONSE, "data": modal }),
        }
    }
}

pub fn modal_custom_id(command: &str) -> String {
    format!("{MODAL_PREFIX}{command}")
}

pub fn command_from_modal_id(custom_id: &str) -> Option<&str> {
    custom_id.strip_prefix(MODAL_PREFIX)
}

/// One single-input action row per text field. Other field types cannot be
/// rendered in a modal and are skipped.
pub fn modal_rows(spec: &CommandSpec) -> Vec<ActionRow> {
    spec.fields
        .iter()
        .filter_map(|field| match field.kind {
            FieldKind::Text => Some(ActionRow::single(TextInput::for_field(field))),
            FieldKind::Select | FieldKind::Attachment | FieldKind::RemoteSelect => {
                warn!(
                    event_name = "ui.modal.field_skipped",
                    command = %spec.name,
                    field = %field.name,
                    field_type = %field.kind,
                    "field type is not supported in modals; only text fields are rendered"
                );
                None
            }
        })
        .collect()
}

pub fn modal_for(spec: &CommandSpec) -> ModalPayload {
    ModalPayload {
        custom_id: modal_custom_id(&spec.name),
        title: format!("Form: {}", spec.name),
        components: modal_rows(spec),
    }
}

/// Required options come first; Discord rejects a required option after an
/// optional one.
pub fn slash_options(spec: &CommandSpec) -> Result<Vec<CommandOption>, UiBuildError> {
    let mut options = spec
        .fields
        .iter()
        .map(|field| slash_option(spec, field))
        .collect::<Result<Vec<_>, _>>()?;
    options.sort_by_key(|option| !option.required);
    Ok(options)
}

fn slash_option(spec: &CommandSpec, field: &FieldSpec) -> Result<CommandOption, UiBuildError> {
    let (kind, choices) = match field.kind {
        FieldKind::Text => (OptionType::String, Vec::new()),
        FieldKind::Select => (
            OptionType::String,
            field
                .options
                .iter()
                .map(|option| OptionChoice { name: option.clone(), value: option.clone() })
                .collect(),
        ),
        FieldKind::Attachment => (OptionType::Attachment, Vec::new()),
        FieldKind::RemoteSelect => {
            return Err(UiBuildError::UnsupportedSlashField {
                command: spec.name.clone(),
                field: field.name.clone(),
                kind: field.kind,
            })
        }
    };

    Ok(CommandOption {
        kind,
        name: field.name.clone(),
        description: format!("Enter {}", field.name),
        required: field.required,
        choices,
    })
}

pub fn command_definition(spec: &CommandSpec) -> Result<CommandDefinition, UiBuildError> {
    let (description, options) = match spec.kind {
        CommandKind::Slash => (format!("Execute {} command", spec.name), slash_options(spec)?),
        CommandKind::Modal => (format!("Open {} form", spec.name), Vec::new()),
    };

    Ok(CommandDefinition {
        command_type: CHAT_INPUT_COMMAND,
        name: spec.name.clone(),
        description,
        options,
    })
}

/// Projects every command into registration metadata, collecting the ones
/// that cannot be expressed instead of failing the whole batch.
pub fn command_definitions(commands: &CommandSet) -> (Vec<CommandDefinition>, Vec<UiBuildError>) {
    let mut definitions = Vec::with_capacity(commands.len());
    let mut skipped = Vec::new();

    for spec in commands.iter() {
        match command_definition(spec) {
            Ok(definition) => definitions.push(definition),
            Err(error) => skipped.push(error),
        }
    }

    (definitions, skipped)
}

fn field_icon(field: &FieldSpec) -> &'static str {
    match field.kind {
        FieldKind::Attachment => "📎",
        FieldKind::Select => "📋",
        FieldKind::RemoteSelect => "🌐",
        FieldKind::Text => match field.text_semantics().first() {
            Some(TextSemantic::Email) => "📧",
            Some(TextSemantic::Amount) => "💰",
            Some(TextSemantic::Phone) => "📞",
            Some(TextSemantic::Url) => "🔗",
            None => "📝",
        },
    }
}

/// Structured acknowledgement used when a modal command has no
/// `response_format`.
pub fn form_summary(
    spec: &CommandSpec,
    values: &HashMap<String, String>,
    webhook: Option<&WebhookResponse>,
) -> String {
    let mut message = format!(
        "✅ **Form Successfully Submitted**\n\n📋 **Command**: {}\n\n**📝 Submitted Data:**\n",
        title_case(&spec.name)
    );

    let mut filled = 0;
    for field in &spec.fields {
        match values.get(&field.name).filter(|value| !value.trim().is_empty()) {
            Some(value) => {
                filled += 1;
                message.push_str(&format!(
                    "{} **{}**: {}\n",
                    field_icon(field),
                    title_case(&field.name),
                    value
                ));
            }
            None if field.required => {
                message.push_str(&format!("❌ **{}**: *Not provided*\n", title_case(&field.name)));
            }
            None => {}
        }
    }

    message.push_str(&format!("\n📊 **Summary**: {filled}/{} fields filled", spec.fields.len()));
    let required = spec.required_field_count();
    if required > 0 {
        message.push_str(&format!(" ({required} required)"));
    }

    if let Some(endpoint) = spec.webhook_url() {
        match webhook.filter(|response| !response.is_success()) {
            Some(failed) => message.push_str(&format!(
                "\n\n❌ **Webhook Status**: Failed to send data\n🌐 **Endpoint**: {endpoint}\n⚠️ **Error**: {}",
                failed.error.as_deref().unwrap_or_default()
            )),
            None => message.push_str(&format!(
                "\n\n✅ **Webhook Status**: Data sent successfully\n🌐 **Endpoint**: {endpoint}"
            )),
        }
    }

    message.push_str("\n\n✨ **Thank you for your submission!**");
    message
}
