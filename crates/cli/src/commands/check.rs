use std::path::Path;

use yambot_core::CommandKind;
use yambot_discord::components::command_definitions;

use super::{load_config, CommandResult};

/// Loads the config through the same validation path as the server, then
/// reports commands that Discord registration would skip.
pub fn run(config_path: Option<&Path>) -> CommandResult {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("check", &error),
    };

    let commands = &config.commands;
    let slash = commands.iter().filter(|command| command.kind == CommandKind::Slash).count();
    let modal = commands.len() - slash;
    let templates =
        commands.iter().filter(|command| command.response_template().is_some()).count();

    let (definitions, skipped) = command_definitions(commands);
    if !skipped.is_empty() {
        let reasons = skipped.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        return CommandResult::failure(
            "check",
            "command_registration",
            format!(
                "{} of {} commands cannot be registered: {reasons}",
                skipped.len(),
                commands.len()
            ),
            3,
        );
    }

    CommandResult::success(
        "check",
        format!(
            "configuration valid: {} commands ({slash} slash, {modal} modal), {templates} response templates compiled, {} registrable",
            commands.len(),
            definitions.len()
        ),
    )
}
