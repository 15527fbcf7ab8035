use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use faqbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use super::{CommandResult, EXIT_CONFIG_FAILURE};

/// One inspectable setting: dotted key, primary env var and its legacy alias.
struct Field {
    key: &'static str,
    env_key: &'static str,
    alias: Option<&'static str>,
}

const fn field(key: &'static str, env_key: &'static str, alias: Option<&'static str>) -> Field {
    Field { key, env_key, alias }
}

const FIELDS: &[Field] = &[
    field("discord.token", "FAQBOT_DISCORD_TOKEN", Some("DISCORD_TOKEN")),
    field("discord.application_id", "FAQBOT_DISCORD_APPLICATION_ID", Some("CLIENT_ID")),
    field("discord.guild_id", "FAQBOT_DISCORD_GUILD_ID", Some("GUILD_ID")),
    field("discord.api_base_url", "FAQBOT_DISCORD_API_BASE_URL", None),
    field("services.rag_api", "FAQBOT_RAG_API", Some("RAG_API")),
    field("services.feedback_api", "FAQBOT_FEEDBACK_API", Some("FEEDBACK_API")),
    field("answer.max_chars", "FAQBOT_ANSWER_MAX_CHARS", None),
    field("answer.truncation_marker", "FAQBOT_ANSWER_TRUNCATION_MARKER", None),
    field("server.bind_address", "FAQBOT_SERVER_BIND_ADDRESS", None),
    field("server.health_check_port", "FAQBOT_SERVER_HEALTH_CHECK_PORT", None),
    field("server.graceful_shutdown_secs", "FAQBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", None),
    field("logging.level", "FAQBOT_LOGGING_LEVEL", Some("FAQBOT_LOG_LEVEL")),
    field("logging.format", "FAQBOT_LOGGING_FORMAT", Some("FAQBOT_LOG_FORMAT")),
];

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG_FAILURE,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in FIELDS {
        let source = field_source(field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &effective_value(&config, field.key), source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn effective_value(config: &AppConfig, key: &str) -> String {
    match key {
        "discord.token" => redact_token(config.discord.token.expose_secret()),
        "discord.application_id" => config.discord.application_id.clone(),
        "discord.guild_id" => config.discord.guild_id.clone(),
        "discord.api_base_url" => config.discord.api_base_url.clone(),
        "services.rag_api" => config.services.rag_api.clone(),
        "services.feedback_api" => config.services.feedback_api.clone(),
        "answer.max_chars" => config.answer.max_chars.to_string(),
        "answer.truncation_marker" => format!("{:?}", config.answer.truncation_marker),
        "server.bind_address" => config.server.bind_address.clone(),
        "server.health_check_port" => config.server.health_check_port.to_string(),
        "server.graceful_shutdown_secs" => config.server.graceful_shutdown_secs.to_string(),
        "logging.level" => config.logging.level.clone(),
        "logging.format" => format!("{:?}", config.logging.format),
        _ => "<unknown>".to_string(),
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("faqbot.toml"), PathBuf::from("config/faqbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in std::iter::once(field.env_key).chain(field.alias) {
        if env::var(env_key).is_ok_and(|value| !value.trim().is_empty()) {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    // Discord bot tokens start with the base64 application id; keep a short
    // prefix so operators can tell bots apart.
    match trimmed.get(..4) {
        Some(prefix) if trimmed.len() > 12 => format!("{prefix}***"),
        _ => "<redacted>".to_string(),
    }
}
