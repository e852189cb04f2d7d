use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::command::{CommandSet, CommandSpec, FieldKind};
use crate::templating::{validate_template, TemplateError};

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";
const MAX_COMMAND_NAME_LEN: usize = 32;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub http: HttpConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub commands: CommandSet,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub token: SecretString,
    pub application_id: Option<String>,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub discord_token: Option<String>,
    pub application_id: Option<String>,
    pub api_base_url: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub commands: Option<Vec<CommandSpec>>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("invalid response_format in command `{command}`: {source}")]
    Template { command: String, source: TemplateError },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                token: String::new().into(),
                application_id: None,
                api_base_url: DEFAULT_API_BASE_URL.to_string(),
            },
            http: HttpConfig { timeout_secs: 10 },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            commands: CommandSet::default(),
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("yambot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides)?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(discord) = patch.discord {
            if let Some(discord_token_value) = discord.token {
                self.discord.token = secret_value(discord_token_value);
            }
            if let Some(application_id) = discord.application_id {
                self.discord.application_id = Some(application_id);
            }
            if let Some(api_base_url) = discord.api_base_url {
                self.discord.api_base_url = api_base_url;
            }
        }

        if let Some(http) = patch.http {
            if let Some(timeout_secs) = http.timeout_secs {
                self.http.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(commands) = patch.commands {
            self.commands = command_set(commands)?;
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("YAMBOT_DISCORD_TOKEN") {
            self.discord.token = secret_value(value);
        }
        if let Some(value) = read_env("YAMBOT_DISCORD_APPLICATION_ID") {
            self.discord.application_id = Some(value);
        }
        if let Some(value) = read_env("YAMBOT_DISCORD_API_BASE_URL") {
            self.discord.api_base_url = value;
        }

        if let Some(value) = read_env("YAMBOT_HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = parse_u64("YAMBOT_HTTP_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("YAMBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("YAMBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("YAMBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level = read_env("YAMBOT_LOGGING_LEVEL").or_else(|| read_env("YAMBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("YAMBOT_LOGGING_FORMAT").or_else(|| read_env("YAMBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(discord_token) = overrides.discord_token {
            self.discord.token = secret_value(discord_token);
        }
        if let Some(application_id) = overrides.application_id {
            self.discord.application_id = Some(application_id);
        }
        if let Some(api_base_url) = overrides.api_base_url {
            self.discord.api_base_url = api_base_url;
        }
        if let Some(timeout_secs) = overrides.http_timeout_secs {
            self.http.timeout_secs = timeout_secs;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(commands) = overrides.commands {
            self.commands = command_set(commands)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_http(&self.http)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_commands(&self.commands)?;
        Ok(())
    }
}

fn command_set(commands: Vec<CommandSpec>) -> Result<CommandSet, ConfigError> {
    CommandSet::new(commands).map_err(|error| ConfigError::Validation(error.to_string()))
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("yambot.toml"), PathBuf::from("config/yambot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    let token = discord.token.expose_secret();
    if token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Token".to_string(),
        ));
    }
    if token.starts_with("Bot ") {
        return Err(ConfigError::Validation(
            "discord.token must be the raw bot token (hint: omit the `Bot ` prefix)".to_string(),
        ));
    }

    if let Some(application_id) = &discord.application_id {
        if application_id.is_empty() || !application_id.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(ConfigError::Validation(
                "discord.application_id must be a numeric snowflake".to_string(),
            ));
        }
    }

    if !is_http_url(&discord.api_base_url) {
        return Err(ConfigError::Validation(
            "discord.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_http(http: &HttpConfig) -> Result<(), ConfigError> {
    if http.timeout_secs == 0 || http.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "http.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Accepts a bare level or comma-separated `target=level` directives.
fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let valid = logging.level.split(',').map(str::trim).all(|directive| {
        let (target, level) = match directive.rsplit_once('=') {
            Some((target, level)) => (Some(target.trim()), level.trim()),
            None => (None, directive),
        };
        !target.is_some_and(str::is_empty)
            && matches!(
                level.to_ascii_lowercase().as_str(),
                "trace" | "debug" | "info" | "warn" | "error" | "off"
            )
    });

    if valid {
        Ok(())
    } else {
        Err(ConfigError::Validation(
            "logging.level must be trace|debug|info|warn|error|off or `target=level` directives"
                .to_string(),
        ))
    }
}

fn validate_commands(commands: &CommandSet) -> Result<(), ConfigError> {
    for command in commands.iter() {
        if !is_valid_command_name(&command.name) {
            return Err(ConfigError::Validation(format!(
                "command name `{}` must be 1-{MAX_COMMAND_NAME_LEN} lowercase letters, digits, `-` or `_`",
                command.name
            )));
        }

        if let Some(webhook) = &command.webhook {
            if !webhook.trim().is_empty() && !is_http_url(webhook) {
                return Err(ConfigError::Validation(format!(
                    "command `{}` webhook must start with http:// or https://",
                    command.name
                )));
            }
        }

        if let Some(template) = command.response_template() {
            validate_template(template).map_err(|source| ConfigError::Template {
                command: command.name.clone(),
                source,
            })?;
        }

        for field in &command.fields {
            if field.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "command `{}` declares a field without a name",
                    command.name
                )));
            }

            match field.kind {
                FieldKind::RemoteSelect => match field.webhook_url() {
                    Some(url) if is_http_url(url) => {}
                    _ => {
                        return Err(ConfigError::Validation(format!(
                            "field `{}` in command `{}` is remote_select and needs an http(s) webhook",
                            field.name, command.name
                        )));
                    }
                },
                FieldKind::Select if field.options.is_empty() => {
                    warn!(
                        command = %command.name,
                        field = %field.name,
                        "select field declares no options; any value will be accepted"
                    );
                }
                FieldKind::Text | FieldKind::Select | FieldKind::Attachment => {}
            }
        }
    }

    Ok(())
}

fn is_valid_command_name(name: &str) -> bool {
    (1..=MAX_COMMAND_NAME_LEN).contains(&name.chars().count())
        && name.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    http: Option<HttpPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    commands: Option<Vec<CommandSpec>>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    token: Option<String>,
    application_id: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HttpPatch {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
