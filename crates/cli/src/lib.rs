pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "yambot",
    about = "Yambot operator CLI",
    long_about = "Inspect and validate the command configuration that drives yambot-server.",
    after_help = "Examples:\n  yambot commands\n  yambot check --config config/yambot.toml\n  yambot config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to the TOML config file (defaults to yambot.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "List configured commands with their fields and webhooks")]
    Commands {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Validate config, response templates, and command registrability")]
    Check,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Command::Commands { json } => commands::list::run(config_path, json),
        Command::Check => commands::check::run(config_path),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(config_path) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
