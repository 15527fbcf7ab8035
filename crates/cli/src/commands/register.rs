use faqbot_core::config::{AppConfig, LoadOptions};
use faqbot_discord::{
    commands::{register_commands, CommandScope, RegistrationOutcome},
    DiscordRestClient,
};

use super::{CommandResult, EXIT_CONFIG_FAILURE, EXIT_REGISTRATION_FAILURE};

const COMMAND: &str = "register-commands";

pub fn run() -> CommandResult {
    run_with(LoadOptions::default())
}

pub fn run_with(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                error.to_string(),
                EXIT_CONFIG_FAILURE,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_REGISTRATION_FAILURE,
            );
        }
    };

    runtime.block_on(register(&config))
}

/// Publishes the command set once. Registration errors become a failed
/// outcome with exit code 3, never a panic.
pub async fn register(config: &AppConfig) -> CommandResult {
    let client = DiscordRestClient::new(
        reqwest::Client::new(),
        config.discord.api_base_url.clone(),
        config.discord.token.clone(),
    );
    let scope = CommandScope {
        application_id: config.discord.application_id.clone(),
        guild_id: config.discord.guild_id.clone(),
    };

    match register_commands(&client, &scope).await {
        RegistrationOutcome::Registered { count } => CommandResult::success(
            COMMAND,
            format!("registered {count} command(s) for guild {}", scope.guild_id),
        ),
        RegistrationOutcome::Failed { error } => CommandResult::failure(
            COMMAND,
            "registration",
            error.to_string(),
            EXIT_REGISTRATION_FAILURE,
        ),
    }
}
