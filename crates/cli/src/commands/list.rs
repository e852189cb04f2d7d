use std::path::Path;

use serde::Serialize;
use yambot_core::{CommandSet, CommandSpec, FieldSpec};

use super::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct CommandEntry<'a> {
    name: &'a str,
    kind: &'static str,
    webhook: Option<&'a str>,
    response_format: bool,
    fields: Vec<FieldEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct FieldEntry<'a> {
    name: &'a str,
    kind: &'static str,
    required: bool,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    options: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook: Option<&'a str>,
}

pub fn run(config_path: Option<&Path>, json: bool) -> CommandResult {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("commands", &error),
    };

    if json {
        let entries: Vec<CommandEntry<'_>> = config.commands.iter().map(command_entry).collect();
        return match serde_json::to_string_pretty(&entries) {
            Ok(output) => CommandResult { exit_code: 0, output },
            Err(error) => CommandResult::failure("commands", "serialization", error.to_string(), 1),
        };
    }

    CommandResult { exit_code: 0, output: render_human(&config.commands) }
}

fn command_entry(command: &CommandSpec) -> CommandEntry<'_> {
    CommandEntry {
        name: &command.name,
        kind: command.kind.as_str(),
        webhook: command.webhook_url(),
        response_format: command.response_template().is_some(),
        fields: command.fields.iter().map(field_entry).collect(),
    }
}

fn field_entry(field: &FieldSpec) -> FieldEntry<'_> {
    FieldEntry {
        name: &field.name,
        kind: field.kind.as_str(),
        required: field.required,
        options: &field.options,
        webhook: field.webhook_url(),
    }
}

fn render_human(commands: &CommandSet) -> String {
    if commands.is_empty() {
        return "no commands configured".to_string();
    }

    let mut lines = vec![format!("available commands ({}):", commands.len())];
    for command in commands.iter() {
        lines.push(format!("- {} (type: {})", command.name, command.kind));
        lines.push(format!("  webhook: {}", command.webhook_url().unwrap_or("<none>")));
        if command.fields.is_empty() {
            lines.push("  fields: <none>".to_string());
            continue;
        }

        lines.push("  fields:".to_string());
        for field in &command.fields {
            let mut line = format!("    - {} ({})", field.name, field.kind.as_str());
            if field.required {
                line.push_str(" required");
            }
            if !field.options.is_empty() {
                line.push_str(&format!(" options: [{}]", field.options.join(", ")));
            }
            if let Some(webhook) = field.webhook_url() {
                line.push_str(&format!(" source: {webhook}"));
            }
            lines.push(line);
        }
    }

    lines.join("\n")
}
