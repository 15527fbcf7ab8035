//! Discord HTTP API client: interaction callbacks, original-response edits and
//! guild command registration.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::{
    commands::{CommandDefinition, CommandRegistry, CommandScope, RegistrationError},
    events::InteractionRef,
    messages::{MessagePayload, ModalPayload},
    reply::{InteractionResponder, ReplyAction, ResponderError},
};

const CALLBACK_CHANNEL_MESSAGE: u8 = 4;
const CALLBACK_DEFERRED_CHANNEL_MESSAGE: u8 = 5;
const CALLBACK_MODAL: u8 = 9;

#[derive(Serialize)]
struct CallbackBody<'a, T> {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
}

#[derive(Clone)]
pub struct DiscordRestClient {
    client: Client,
    api_base_url: String,
    token: SecretString,
}

impl DiscordRestClient {
    pub fn new(client: Client, api_base_url: impl Into<String>, token: SecretString) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_owned();
        Self { client, api_base_url, token }
    }

    fn callback_url(&self, interaction: &InteractionRef) -> String {
        format!(
            "{}/interactions/{}/{}/callback",
            self.api_base_url, interaction.id, interaction.token
        )
    }

    fn original_message_url(&self, interaction: &InteractionRef) -> String {
        format!(
            "{}/webhooks/{}/{}/messages/@original",
            self.api_base_url, interaction.application_id, interaction.token
        )
    }

    fn guild_commands_url(&self, scope: &CommandScope) -> String {
        format!(
            "{}/applications/{}/guilds/{}/commands",
            self.api_base_url, scope.application_id, scope.guild_id
        )
    }

    async fn callback<T: Serialize + Sync>(
        &self,
        action: ReplyAction,
        interaction: &InteractionRef,
        kind: u8,
        data: Option<&T>,
    ) -> Result<(), ResponderError> {
        let body = CallbackBody { kind, data };
        let request = self.client.post(self.callback_url(interaction)).json(&body);
        send_interaction_request(action, interaction, request).await
    }
}

/// Interaction endpoints authenticate through the token in the URL; no bot
/// authorization header is sent.
async fn send_interaction_request(
    action: ReplyAction,
    interaction: &InteractionRef,
    request: RequestBuilder,
) -> Result<(), ResponderError> {
    let response = request
        .send()
        .await
        .map_err(|error| ResponderError::Transport { action, message: error.to_string() })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ResponderError::Rejected { action, status: status.as_u16(), body });
    }

    debug!(
        event_name = "egress.discord.reply_sent",
        interaction_id = %interaction.id,
        action = %action,
        status = status.as_u16(),
        "interaction reply accepted"
    );
    Ok(())
}

#[async_trait]
impl InteractionResponder for DiscordRestClient {
    async fn defer(&self, interaction: &InteractionRef) -> Result<(), ResponderError> {
        self.callback::<MessagePayload>(
            ReplyAction::Defer,
            interaction,
            CALLBACK_DEFERRED_CHANNEL_MESSAGE,
            None,
        )
        .await
    }

    async fn edit_original(
        &self,
        interaction: &InteractionRef,
        message: &MessagePayload,
    ) -> Result<(), ResponderError> {
        let request = self.client.patch(self.original_message_url(interaction)).json(message);
        send_interaction_request(ReplyAction::Edit, interaction, request).await
    }

    async fn reply(
        &self,
        interaction: &InteractionRef,
        message: &MessagePayload,
    ) -> Result<(), ResponderError> {
        self.callback(ReplyAction::Reply, interaction, CALLBACK_CHANNEL_MESSAGE, Some(message))
            .await
    }

    async fn show_modal(
        &self,
        interaction: &InteractionRef,
        modal: &ModalPayload,
    ) -> Result<(), ResponderError> {
        self.callback(ReplyAction::ShowModal, interaction, CALLBACK_MODAL, Some(modal)).await
    }
}

#[async_trait]
impl CommandRegistry for DiscordRestClient {
    async fn publish(
        &self,
        scope: &CommandScope,
        commands: &[CommandDefinition],
    ) -> Result<(), RegistrationError> {
        let response = self
            .client
            .put(self.guild_commands_url(scope))
            .header("Authorization", format!("Bot {}", self.token.expose_secret()))
            .json(commands)
            .send()
            .await
            .map_err(|error| RegistrationError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistrationError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}
