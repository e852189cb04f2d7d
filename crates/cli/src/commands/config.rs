use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;

use super::load_config;

struct ConfigSources {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl ConfigSources {
    fn detect(explicit_path: Option<&Path>) -> Self {
        let path = detect_config_path(explicit_path);
        let doc = load_config_file_doc(path.as_deref());
        Self { path, doc }
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run(config_path: Option<&Path>) -> String {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    let sources = ConfigSources::detect(config_path);

    let token = redact_token(config.discord.token.expose_secret());
    let timeout_secs = config.http.timeout_secs.to_string();
    let health_check_port = config.server.health_check_port.to_string();
    let log_format = format!("{:?}", config.logging.format).to_ascii_lowercase();
    let command_count = config.commands.len().to_string();

    let entries: [(&str, &str, &[&str]); 9] = [
        ("discord.token", &token, &["YAMBOT_DISCORD_TOKEN"]),
        (
            "discord.application_id",
            config.discord.application_id.as_deref().unwrap_or("<unset>"),
            &["YAMBOT_DISCORD_APPLICATION_ID"],
        ),
        ("discord.api_base_url", &config.discord.api_base_url, &["YAMBOT_DISCORD_API_BASE_URL"]),
        ("http.timeout_secs", &timeout_secs, &["YAMBOT_HTTP_TIMEOUT_SECS"]),
        ("server.bind_address", &config.server.bind_address, &["YAMBOT_SERVER_BIND_ADDRESS"]),
        ("server.health_check_port", &health_check_port, &["YAMBOT_SERVER_HEALTH_CHECK_PORT"]),
        ("logging.level", &config.logging.level, &["YAMBOT_LOGGING_LEVEL", "YAMBOT_LOG_LEVEL"]),
        ("logging.format", &log_format, &["YAMBOT_LOGGING_FORMAT", "YAMBOT_LOG_FORMAT"]),
        ("commands", &command_count, &[]),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .iter()
            .map(|(key, value, env_keys)| render_line(key, value, sources.source(key, env_keys))),
    );

    lines.join("\n")
}

fn detect_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("yambot.toml"), PathBuf::from("config/yambot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps only the token's first dot-separated segment, which encodes the bot id.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('.') {
        Some((prefix, _)) if !prefix.is_empty() => format!("{prefix}.***"),
        _ => "<redacted>".to_string(),
    }
}
