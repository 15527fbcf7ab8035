use std::sync::Arc;

use faqbot_core::config::AppConfig;
use faqbot_discord::{
    commands::{register_commands, CommandScope, RegistrationOutcome},
    faqbot_dispatcher,
    gateway::ChannelGatewayTransport,
    DiscordRestClient, GatewayRunner, ReconnectPolicy,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::clients::{HttpAnswerService, HttpFeedbackService};

const RELAY_CAPACITY: usize = 256;

pub struct Application {
    pub config: AppConfig,
    pub gateway_runner: GatewayRunner,
    /// The only strong relay handle; dropping it ends the gateway stream.
    pub relay: mpsc::Sender<Value>,
    pub registration: RegistrationOutcome,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Wires clients, registers `/ask` (best effort) and builds the gateway
/// runner for an already validated config.
pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let http = reqwest::Client::builder()
        .user_agent(concat!("faqbot/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let discord = Arc::new(DiscordRestClient::new(
        http.clone(),
        config.discord.api_base_url.clone(),
        config.discord.token.clone(),
    ));
    let scope = CommandScope {
        application_id: config.discord.application_id.clone(),
        guild_id: config.discord.guild_id.clone(),
    };
    let registration = register_commands(discord.as_ref(), &scope).await;

    let dispatcher = faqbot_dispatcher(
        discord,
        Arc::new(HttpAnswerService::new(http.clone(), config.services.rag_api.clone())),
        Arc::new(HttpFeedbackService::new(http, config.services.feedback_api.clone())),
        config.answer.clone(),
    );
    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        handler_count = dispatcher.handler_count(),
        max_answer_chars = config.answer.max_chars,
        "interaction dispatcher wired"
    );

    let (relay, transport) = ChannelGatewayTransport::channel(RELAY_CAPACITY);
    let gateway_runner =
        GatewayRunner::new(Arc::new(transport), Arc::new(dispatcher), ReconnectPolicy::default());

    Ok(Application { config, gateway_runner, relay, registration })
}
