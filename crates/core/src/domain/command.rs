use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::text::contains_any;

const EMAIL_KEYWORDS: &[&str] = &["email"];
const AMOUNT_KEYWORDS: &[&str] = &["amount", "price", "cost"];
const PHONE_KEYWORDS: &[&str] = &["phone"];
const URL_KEYWORDS: &[&str] = &["url", "link"];
const LONG_FORM_KEYWORDS: &[&str] = &["description", "details", "comment"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum CommandKind {
    /// Answered immediately from the invocation options.
    Slash,
    /// Answered with a form; the submission carries the inputs.
    Modal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum FieldKind {
    Text,
    Select,
    Attachment,
    RemoteSelect,
}

/// Format checks a text field picks up from its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextSemantic {
    Email,
    Amount,
    Phone,
    Url,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("unknown command type `{0}` (expected slash|modal)")]
    UnknownCommandKind(String),
    #[error("unknown field type `{0}` (expected text|select|attachment|remote_select)")]
    UnknownFieldKind(String),
    #[error("command `{0}` is declared more than once")]
    DuplicateCommand(String),
    #[error("command `{command}` declares field `{field}` more than once")]
    DuplicateField { command: String, field: String },
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slash => "slash",
            Self::Modal => "modal",
        }
    }
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Select => "select",
            Self::Attachment => "attachment",
            Self::RemoteSelect => "remote_select",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = SpecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "slash" => Ok(Self::Slash),
            "modal" => Ok(Self::Modal),
            other => Err(SpecError::UnknownCommandKind(other.to_owned())),
        }
    }
}

impl FromStr for FieldKind {
    type Err = SpecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "select" => Ok(Self::Select),
            "attachment" => Ok(Self::Attachment),
            "remote_select" => Ok(Self::RemoteSelect),
            other => Err(SpecError::UnknownFieldKind(other.to_owned())),
        }
    }
}

impl TryFrom<String> for CommandKind {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for FieldKind {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self { name: name.into(), kind, options: Vec::new(), webhook: None, required: false }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn select<I, S>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut field = Self::new(name, FieldKind::Select);
        field.options = options.into_iter().map(Into::into).collect();
        field
    }

    pub fn attachment(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Attachment)
    }

    pub fn remote_select(name: impl Into<String>, webhook: impl Into<String>) -> Self {
        let mut field = Self::new(name, FieldKind::RemoteSelect);
        field.webhook = Some(webhook.into());
        field
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }

    /// Name-keyed checks in priority order. Only text fields carry any.
    pub fn text_semantics(&self) -> Vec<TextSemantic> {
        if self.kind != FieldKind::Text {
            return Vec::new();
        }

        [
            (EMAIL_KEYWORDS, TextSemantic::Email),
            (AMOUNT_KEYWORDS, TextSemantic::Amount),
            (PHONE_KEYWORDS, TextSemantic::Phone),
            (URL_KEYWORDS, TextSemantic::Url),
        ]
        .into_iter()
        .filter(|(keywords, _)| contains_any(&self.name, keywords))
        .map(|(_, semantic)| semantic)
        .collect()
    }

    pub fn is_long_form(&self) -> bool {
        contains_any(&self.name, LONG_FORM_KEYWORDS)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, kind: CommandKind) -> Self {
        Self { name: name.into(), kind, webhook: None, response_format: None, fields: Vec::new() }
    }

    pub fn with_webhook(mut self, webhook: impl Into<String>) -> Self {
        self.webhook = Some(webhook.into());
        self
    }

    pub fn with_response_format(mut self, template: impl Into<String>) -> Self {
        self.response_format = Some(template.into());
        self
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }

    pub fn response_template(&self) -> Option<&str> {
        self.response_format.as_deref().filter(|template| !template.trim().is_empty())
    }

    pub fn required_field_count(&self) -> usize {
        self.fields.iter().filter(|field| field.required).count()
    }
}

/// The loaded command table. Read-only once built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandSet {
    commands: Vec<CommandSpec>,
    index: HashMap<String, usize>,
}

impl CommandSet {
    pub fn new(commands: Vec<CommandSpec>) -> Result<Self, SpecError> {
        let mut index = HashMap::with_capacity(commands.len());

        for (position, command) in commands.iter().enumerate() {
            if index.insert(command.name.clone(), position).is_some() {
                return Err(SpecError::DuplicateCommand(command.name.clone()));
            }

            let mut seen = Vec::with_capacity(command.fields.len());
            for field in &command.fields {
                if seen.contains(&field.name.as_str()) {
                    return Err(SpecError::DuplicateField {
                        command: command.name.clone(),
                        field: field.name.clone(),
                    });
                }
                seen.push(field.name.as_str());
            }
        }

        Ok(Self { commands, index })
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.index.get(name).and_then(|position| self.commands.get(*position))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
