use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::reply::{InteractionResponder, ReplyError, ReplyHandle, ReplyState};

/// Platform-issued handle used to answer one interaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionRef {
    pub id: String,
    pub application_id: String,
    pub token: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionEnvelope {
    pub interaction: InteractionRef,
    pub event: InteractionEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionEvent {
    ApplicationCommand(CommandInvocation),
    ButtonPress(ButtonPressEvent),
    ModalSubmit(ModalSubmitEvent),
    Unsupported { kind: String },
}

impl InteractionEvent {
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::ApplicationCommand(_) => InteractionKind::ApplicationCommand,
            Self::ButtonPress(_) => InteractionKind::ButtonPress,
            Self::ModalSubmit(_) => InteractionKind::ModalSubmit,
            Self::Unsupported { .. } => InteractionKind::Unsupported,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::ApplicationCommand(command) => Some(&command.user_id),
            Self::ButtonPress(press) => Some(&press.user_id),
            Self::ModalSubmit(submission) => Some(&submission.user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    ApplicationCommand,
    ButtonPress,
    ModalSubmit,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    pub name: String,
    pub options: Vec<CommandOptionValue>,
    pub user_id: String,
    pub channel_id: Option<String>,
}

impl CommandInvocation {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|option| option.name == name)
            .map(|option| option.value.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOptionValue {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonPressEvent {
    pub custom_id: String,
    pub message_id: String,
    pub user_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModalSubmitEvent {
    pub custom_id: String,
    /// Present when the modal was opened from a message component.
    pub message_id: Option<String>,
    pub user_id: String,
    pub fields: Vec<SubmittedField>,
}

impl ModalSubmitEvent {
    pub fn field(&self, custom_id: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.custom_id == custom_id)
            .map(|field| field.value.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedField {
    pub custom_id: String,
    pub value: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("interaction payload is not valid JSON: {0}")]
    Json(String),
    #[error("interaction payload is missing `{0}`")]
    MissingField(&'static str),
}

const INTERACTION_PING: u8 = 1;
const INTERACTION_APPLICATION_COMMAND: u8 = 2;
const INTERACTION_MESSAGE_COMPONENT: u8 = 3;
const INTERACTION_MODAL_SUBMIT: u8 = 5;
const COMPONENT_BUTTON: u8 = 2;

impl InteractionEnvelope {
    /// Decodes a raw `INTERACTION_CREATE` payload.
    pub fn from_json(raw: &str) -> Result<Self, DecodeError> {
        let raw: RawInteraction =
            serde_json::from_str(raw).map_err(|error| DecodeError::Json(error.to_string()))?;
        raw.into_envelope()
    }

    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let raw: RawInteraction =
            serde_json::from_value(value).map_err(|error| DecodeError::Json(error.to_string()))?;
        raw.into_envelope()
    }
}

#[derive(Debug, Deserialize)]
struct RawInteraction {
    id: String,
    application_id: String,
    #[serde(rename = "type")]
    kind: u8,
    token: String,
    data: Option<RawData>,
    member: Option<RawMember>,
    user: Option<RawUser>,
    message: Option<RawMessage>,
    channel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawData {
    name: Option<String>,
    #[serde(default)]
    options: Vec<RawOption>,
    custom_id: Option<String>,
    component_type: Option<u8>,
    #[serde(default)]
    components: Vec<RawRow>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    name: String,
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    components: Vec<RawInput>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    custom_id: String,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
}

impl RawInteraction {
    fn into_envelope(self) -> Result<InteractionEnvelope, DecodeError> {
        // Guild interactions carry the user under `member`, DMs under `user`.
        let user_id = self
            .member
            .and_then(|member| member.user)
            .or(self.user)
            .map(|user| user.id);
        let message_id = self.message.map(|message| message.id);
        let data = self.data.unwrap_or_default();

        let event = match self.kind {
            INTERACTION_APPLICATION_COMMAND => {
                InteractionEvent::ApplicationCommand(CommandInvocation {
                    name: data.name.ok_or(DecodeError::MissingField("data.name"))?,
                    options: data
                        .options
                        .into_iter()
                        .filter_map(|option| {
                            let value = match option.value? {
                                Value::String(text) => text,
                                other => other.to_string(),
                            };
                            Some(CommandOptionValue { name: option.name, value })
                        })
                        .collect(),
                    user_id: user_id.ok_or(DecodeError::MissingField("member.user.id"))?,
                    channel_id: self.channel_id,
                })
            }
            INTERACTION_MESSAGE_COMPONENT if data.component_type == Some(COMPONENT_BUTTON) => {
                InteractionEvent::ButtonPress(ButtonPressEvent {
                    custom_id: data.custom_id.ok_or(DecodeError::MissingField("data.custom_id"))?,
                    message_id: message_id.ok_or(DecodeError::MissingField("message.id"))?,
                    user_id: user_id.ok_or(DecodeError::MissingField("member.user.id"))?,
                })
            }
            INTERACTION_MESSAGE_COMPONENT => InteractionEvent::Unsupported {
                kind: format!("message_component:{}", data.component_type.unwrap_or_default()),
            },
            INTERACTION_MODAL_SUBMIT => InteractionEvent::ModalSubmit(ModalSubmitEvent {
                custom_id: data.custom_id.ok_or(DecodeError::MissingField("data.custom_id"))?,
                message_id,
                user_id: user_id.ok_or(DecodeError::MissingField("member.user.id"))?,
                fields: data
                    .components
                    .into_iter()
                    .flat_map(|row| row.components)
                    .map(|input| SubmittedField {
                        custom_id: input.custom_id,
                        value: input.value.unwrap_or_default(),
                    })
                    .collect(),
            }),
            INTERACTION_PING => InteractionEvent::Unsupported { kind: "ping".to_owned() },
            other => InteractionEvent::Unsupported { kind: format!("interaction:{other}") },
        };

        Ok(InteractionEnvelope {
            interaction: InteractionRef {
                id: self.id,
                application_id: self.application_id,
                token: self.token,
            },
            event,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// The terminal reply action a handler took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Edited,
    Replied,
    ModalShown,
    Ignored,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Reply(#[from] ReplyError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_kinds(&self) -> &'static [InteractionKind];

    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        reply: &mut ReplyHandle<'_>,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// Routes each interaction to the handler registered for its kind and owns
/// the responder every reply goes through.
pub struct EventDispatcher {
    handlers: HashMap<InteractionKind, Arc<dyn EventHandler>>,
    responder: Arc<dyn InteractionResponder>,
}

impl EventDispatcher {
    pub fn new(responder: Arc<dyn InteractionResponder>) -> Self {
        Self { handlers: HashMap::new(), responder }
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        let handler: Arc<dyn EventHandler> = Arc::new(handler);
        for kind in handler.event_kinds() {
            self.handlers.insert(*kind, Arc::clone(&handler));
        }
    }

    pub async fn dispatch(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.kind()) else {
            return Ok(HandlerResult::Ignored);
        };

        let mut reply = ReplyHandle::new(self.responder.as_ref(), &envelope.interaction);
        let result = handler.handle(envelope, &mut reply, ctx).await?;

        if result != HandlerResult::Ignored && reply.state() != ReplyState::Completed {
            warn!(
                event_name = "ingress.discord.reply_incomplete",
                interaction_id = %envelope.interaction.id,
                correlation_id = %ctx.correlation_id,
                state = ?reply.state(),
                result = ?result,
                "handler returned without completing the interaction reply"
            );
        }

        Ok(result)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}
