//! Operator-supplied response templates.
//!
//! Templates use the Tera dialect and see two variables: `Inputs` (the
//! submitted values keyed by field name) and `WebhookResponse` (`StatusCode`,
//! `Status`, `Error` and the decoded `Data` object). The filters `upper`,
//! `lower`, `title` and `json` are available, e.g.
//! `Ticket {{ WebhookResponse.Data.ticket_id }} for {{ Inputs.name | title }}`.
//!
//! Rendering never fails from the caller's point of view: any parse or render
//! error is logged and replaced with [`DEFAULT_ACKNOWLEDGEMENT`].

use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::{Map, Value};
use tera::{Context, Tera};
use thiserror::Error;
use tracing::warn;

use crate::domain::webhook::WebhookResponse;
use crate::text::title_case;

pub const DEFAULT_ACKNOWLEDGEMENT: &str = "✅ Command accepted.";
pub const MISSING_VALUE_MARKER: &str = "<no value>";

const TEMPLATE_NAME: &str = "response";
const INPUTS_PREFIX: &str = "Inputs.";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemplateData {
    pub inputs: Map<String, Value>,
    pub webhook_response: Option<WebhookResponse>,
}

impl TemplateData {
    pub fn new(inputs: Map<String, Value>, webhook_response: Option<WebhookResponse>) -> Self {
        Self { inputs, webhook_response }
    }

    fn to_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("Inputs", &self.inputs);
        if let Some(response) = &self.webhook_response {
            context.insert("WebhookResponse", &response.template_value());
        }
        context
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template parse error: {0}")]
    Parse(String),
    #[error("template render error: {0}")]
    Render(String),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseTemplater;

impl ResponseTemplater {
    pub fn new() -> Self {
        Self
    }

    /// Renders `template`, reporting parse and render errors to the caller.
    pub fn render_template(
        &self,
        template: &str,
        data: &TemplateData,
    ) -> Result<String, TemplateError> {
        if template.trim().is_empty() {
            return Ok(DEFAULT_ACKNOWLEDGEMENT.to_owned());
        }

        let tera = template_engine(&mark_missing_inputs(template, &data.inputs))?;
        tera.render(TEMPLATE_NAME, &data.to_context())
            .map_err(|error| TemplateError::Render(describe(&error)))
    }

    /// Renders `template`, falling back to the default acknowledgement.
    pub fn render(&self, template: Option<&str>, data: &TemplateData) -> String {
        let Some(template) = template else {
            return DEFAULT_ACKNOWLEDGEMENT.to_owned();
        };

        match self.render_template(template, data) {
            Ok(rendered) => rendered,
            Err(error) => {
                warn!(
                    event_name = "response.template.fallback",
                    error = %error,
                    "template rendering failed; using default acknowledgement"
                );
                DEFAULT_ACKNOWLEDGEMENT.to_owned()
            }
        }
    }
}

/// Parses `template` with the same engine configuration used for rendering.
pub fn validate_template(template: &str) -> Result<(), TemplateError> {
    if template.trim().is_empty() {
        return Ok(());
    }
    template_engine(template).map(|_| ())
}

fn template_engine(template: &str) -> Result<Tera, TemplateError> {
    let mut tera = Tera::default();
    register_template_filters(&mut tera);
    tera.add_raw_template(TEMPLATE_NAME, template)
        .map_err(|error| TemplateError::Parse(describe(&error)))?;
    Ok(tera)
}

/// Registers the response filters, replacing Tera's builtins of the same name.
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("upper", upper_filter);
    tera.register_filter("lower", lower_filter);
    tera.register_filter("title", title_filter);
    tera.register_filter("json", json_filter);
}

fn upper_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(text_of(value).to_uppercase()))
}

fn lower_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(text_of(value).to_lowercase()))
}

fn title_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(title_case(&text_of(value))))
}

fn json_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    serde_json::to_string_pretty(value)
        .map(Value::String)
        .map_err(|error| tera::Error::msg(format!("json filter failed: {error}")))
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Rewrites printed references to absent inputs as
/// `Inputs.x | default(value="<no value>")`. Only `{{ }}` blocks are touched,
/// so `{% if Inputs.x %}` and explicit `default` filters still see an
/// undefined value.
fn mark_missing_inputs<'a>(template: &'a str, inputs: &Map<String, Value>) -> Cow<'a, str> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    let mut changed = false;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open..].find("}}").map(|offset| open + offset) else {
            break;
        };
        output.push_str(&rest[..open]);
        let block = &rest[open..close];
        let rewritten = mark_block(block, inputs);
        changed |= rewritten != block;
        output.push_str(&rewritten);
        rest = &rest[close..];
    }

    if !changed {
        return Cow::Borrowed(template);
    }
    output.push_str(rest);
    Cow::Owned(output)
}

fn mark_block(block: &str, inputs: &Map<String, Value>) -> String {
    let mut output = String::with_capacity(block.len());
    let mut quote: Option<char> = None;
    let mut previous: Option<char> = None;
    let mut index = 0;

    while index < block.len() {
        let rest = &block[index..];
        let Some(ch) = rest.chars().next() else {
            break;
        };

        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
        } else if matches!(ch, '"' | '\'' | '`') {
            quote = Some(ch);
        } else if rest.starts_with(INPUTS_PREFIX) && !previous.is_some_and(is_path_char) {
            let path_len = INPUTS_PREFIX.len()
                + rest[INPUTS_PREFIX.len()..]
                    .find(|ch: char| !is_path_char(ch))
                    .unwrap_or(rest.len() - INPUTS_PREFIX.len());
            let path = &rest[..path_len];
            let key = path[INPUTS_PREFIX.len()..].split('.').next().unwrap_or_default();
            output.push_str(path);
            if !key.is_empty() && !inputs.contains_key(key) && !has_default_filter(&rest[path_len..])
            {
                output.push_str(&format!(" | default(value=\"{MISSING_VALUE_MARKER}\")"));
            }
            previous = path.chars().next_back();
            index += path_len;
            continue;
        }

        output.push(ch);
        previous = Some(ch);
        index += ch.len_utf8();
    }

    output
}

fn is_path_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '.'
}

fn has_default_filter(after_path: &str) -> bool {
    after_path
        .trim_start()
        .strip_prefix('|')
        .is_some_and(|filter| filter.trim_start().starts_with("default"))
}

fn describe(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
