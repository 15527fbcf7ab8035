use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DISCORD_API_BASE_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_ANSWER_MAX_CHARS: usize = 4000;
pub const DEFAULT_TRUNCATION_MARKER: &str = "\n…[truncated]";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub services: ServicesConfig,
    pub answer: AnswerConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub token: SecretString,
    pub application_id: String,
    pub guild_id: String,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct ServicesConfig {
    pub rag_api: String,
    pub feedback_api: String,
}

/// Display limits applied to answers before they are rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerConfig {
    pub max_chars: usize,
    pub truncation_marker: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
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
    pub discord_application_id: Option<String>,
    pub discord_guild_id: Option<String>,
    pub discord_api_base_url: Option<String>,
    pub rag_api: Option<String>,
    pub feedback_api: Option<String>,
    pub answer_max_chars: Option<usize>,
    pub log_level: Option<String>,
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
    #[error("could not load env file `{path}`: {source}")]
    EnvFile { path: PathBuf, source: dotenvy::Error },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                token: String::new().into(),
                application_id: String::new(),
                guild_id: String::new(),
                api_base_url: DEFAULT_DISCORD_API_BASE_URL.to_string(),
            },
            services: ServicesConfig { rag_api: String::new(), feedback_api: String::new() },
            answer: AnswerConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_ANSWER_MAX_CHARS,
            truncation_marker: DEFAULT_TRUNCATION_MARKER.to_string(),
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

/// Exports `KEY=value` pairs from an env file into the process environment
/// so the env layer of [`AppConfig::load`] sees them. Variables that are
/// already set keep their value. With no explicit path, `.env` is searched
/// for from the working directory upwards. A missing file yields `Ok(None)`.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(error) if error.not_found() => Ok(None),
        Err(source) => Err(ConfigError::EnvFile {
            path: path.map_or_else(|| PathBuf::from(".env"), Path::to_path_buf),
            source,
        }),
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("faqbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(discord_token_value) = discord.token {
                self.discord.token = secret_value(discord_token_value);
            }
            if let Some(application_id) = discord.application_id {
                self.discord.application_id = application_id;
            }
            if let Some(guild_id) = discord.guild_id {
                self.discord.guild_id = guild_id;
            }
            if let Some(api_base_url) = discord.api_base_url {
                self.discord.api_base_url = api_base_url;
            }
        }

        if let Some(services) = patch.services {
            if let Some(rag_api) = services.rag_api {
                self.services.rag_api = rag_api;
            }
            if let Some(feedback_api) = services.feedback_api {
                self.services.feedback_api = feedback_api;
            }
        }

        if let Some(answer) = patch.answer {
            if let Some(max_chars) = answer.max_chars {
                self.answer.max_chars = max_chars;
            }
            if let Some(truncation_marker) = answer.truncation_marker {
                self.answer.truncation_marker = truncation_marker;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Unprefixed names are what the bot was originally deployed with.
        if let Some(value) = read_env_with_alias("FAQBOT_DISCORD_TOKEN", "DISCORD_TOKEN") {
            self.discord.token = secret_value(value);
        }
        if let Some(value) = read_env_with_alias("FAQBOT_DISCORD_APPLICATION_ID", "CLIENT_ID") {
            self.discord.application_id = value;
        }
        if let Some(value) = read_env_with_alias("FAQBOT_DISCORD_GUILD_ID", "GUILD_ID") {
            self.discord.guild_id = value;
        }
        if let Some(value) = read_env("FAQBOT_DISCORD_API_BASE_URL") {
            self.discord.api_base_url = value;
        }

        if let Some(value) = read_env_with_alias("FAQBOT_RAG_API", "RAG_API") {
            self.services.rag_api = value;
        }
        if let Some(value) = read_env_with_alias("FAQBOT_FEEDBACK_API", "FEEDBACK_API") {
            self.services.feedback_api = value;
        }

        if let Some(value) = read_env("FAQBOT_ANSWER_MAX_CHARS") {
            self.answer.max_chars = parse_usize("FAQBOT_ANSWER_MAX_CHARS", &value)?;
        }
        if let Some(value) = read_env("FAQBOT_ANSWER_TRUNCATION_MARKER") {
            self.answer.truncation_marker = value;
        }

        if let Some(value) = read_env("FAQBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("FAQBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("FAQBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("FAQBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("FAQBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env_with_alias("FAQBOT_LOGGING_LEVEL", "FAQBOT_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env_with_alias("FAQBOT_LOGGING_FORMAT", "FAQBOT_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(discord_token) = overrides.discord_token {
            self.discord.token = secret_value(discord_token);
        }
        if let Some(application_id) = overrides.discord_application_id {
            self.discord.application_id = application_id;
        }
        if let Some(guild_id) = overrides.discord_guild_id {
            self.discord.guild_id = guild_id;
        }
        if let Some(api_base_url) = overrides.discord_api_base_url {
            self.discord.api_base_url = api_base_url;
        }
        if let Some(rag_api) = overrides.rag_api {
            self.services.rag_api = rag_api;
        }
        if let Some(feedback_api) = overrides.feedback_api {
            self.services.feedback_api = feedback_api;
        }
        if let Some(max_chars) = overrides.answer_max_chars {
            self.answer.max_chars = max_chars;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    /// Stored values are the trimmed ones that validation accepts.
    fn normalize(&mut self) {
        let token = self.discord.token.expose_secret();
        if token.trim().len() != token.len() {
            self.discord.token = secret_value(token.trim().to_string());
        }
        for value in [
            &mut self.discord.application_id,
            &mut self.discord.guild_id,
            &mut self.discord.api_base_url,
            &mut self.services.rag_api,
            &mut self.services.feedback_api,
            &mut self.server.bind_address,
        ] {
            trim_in_place(value);
        }
        self.logging.level = self.logging.level.trim().to_ascii_lowercase();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_services(&self.services)?;
        validate_answer(&self.answer)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("faqbot.toml"), PathBuf::from("config/faqbot.toml")]
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

/// Expands `${VAR}` and `${VAR:-fallback}` references in the raw file text.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("${") {
        output.push_str(&rest[..open]);
        let expression = &rest[open + 2..];
        let close = expression.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;

        let (var, fallback) = match expression[..close].split_once(":-") {
            Some((var, fallback)) => (var, Some(fallback)),
            None => (&expression[..close], None),
        };
        match (read_env(var), fallback) {
            (Some(value), _) => output.push_str(&value),
            (None, Some(fallback)) => output.push_str(fallback),
            (None, None) => {
                return Err(ConfigError::MissingEnvInterpolation { var: var.to_string() })
            }
        }

        rest = &expression[close + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    if discord.token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Token".to_string(),
        ));
    }

    validate_snowflake("discord.application_id", &discord.application_id)?;
    validate_snowflake("discord.guild_id", &discord.guild_id)?;
    validate_http_url("discord.api_base_url", &discord.api_base_url)?;

    Ok(())
}

fn validate_services(services: &ServicesConfig) -> Result<(), ConfigError> {
    validate_http_url("services.rag_api", &services.rag_api)?;
    validate_http_url("services.feedback_api", &services.feedback_api)?;
    Ok(())
}

fn validate_answer(answer: &AnswerConfig) -> Result<(), ConfigError> {
    if answer.max_chars == 0 {
        return Err(ConfigError::Validation(
            "answer.max_chars must be greater than zero".to_string(),
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

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_snowflake(key: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{key} is required")));
    }
    if !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ConfigError::Validation(format!(
            "{key} must be a numeric Discord snowflake, got `{value}`"
        )));
    }
    Ok(())
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{key} is required")));
    }
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{key} must start with http:// or https://"
        )));
    }
    Ok(())
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_with_alias(key: &str, alias: &str) -> Option<String> {
    read_env(key).or_else(|| read_env(alias))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    services: Option<ServicesPatch>,
    answer: Option<AnswerPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    token: Option<String>,
    application_id: Option<String>,
    guild_id: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServicesPatch {
    rag_api: Option<String>,
    feedback_api: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AnswerPatch {
    max_chars: Option<usize>,
    truncation_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
