use std::sync::Arc;

use async_trait::async_trait;
use faqbot_core::{AnswerConfig, AnswerService, QueryRequest, ServiceError};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    commands::{ASK_COMMAND_NAME, QUERY_OPTION_NAME},
    events::{
        CommandInvocation, EventContext, EventHandler, EventHandlerError, HandlerResult,
        InteractionEnvelope, InteractionEvent, InteractionKind,
    },
    messages::{answer_error_message, answer_message, EmbedError, MessagePayload},
    reply::ReplyHandle,
};

#[derive(Debug, Error)]
enum AskError {
    #[error("`query` option was not supplied")]
    MissingQuery,
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("answer cannot be rendered: {0}")]
    Unrenderable(#[from] EmbedError),
}

impl AskError {
    fn error_class(&self) -> &'static str {
        match self {
            Self::MissingQuery => "missing_query",
            Self::Service(error) => error.error_class(),
            Self::Unrenderable(error) => error.error_class(),
        }
    }
}

/// Handles `/ask`: defer, fetch the answer, then edit the placeholder with
/// either the answer card or the generic error card.
pub struct AskCommandHandler {
    answers: Arc<dyn AnswerService>,
    answer_config: AnswerConfig,
}

impl AskCommandHandler {
    pub fn new(answers: Arc<dyn AnswerService>, answer_config: AnswerConfig) -> Self {
        Self { answers, answer_config }
    }

    async fn render_answer(&self, command: &CommandInvocation) -> Result<MessagePayload, AskError> {
        let query = command.option(QUERY_OPTION_NAME).ok_or(AskError::MissingQuery)?;
        let response = self.answers.ask(&QueryRequest::new(query)).await?;
        Ok(answer_message(&response, &self.answer_config)?)
    }
}

#[async_trait]
impl EventHandler for AskCommandHandler {
    fn event_kinds(&self) -> &'static [InteractionKind] {
        &[InteractionKind::ApplicationCommand]
    }

    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        reply: &mut ReplyHandle<'_>,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InteractionEvent::ApplicationCommand(command) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if command.name != ASK_COMMAND_NAME {
            return Ok(HandlerResult::Ignored);
        }

        // The platform expires un-acknowledged interactions quickly; defer
        // before the answer service is contacted.
        reply.defer().await?;

        let message = match self.render_answer(command).await {
            Ok(message) => {
                info!(
                    event_name = "egress.rag.answer_rendered",
                    interaction_id = %envelope.interaction.id,
                    correlation_id = %ctx.correlation_id,
                    user_id = %command.user_id,
                    "answer fetched and rendered"
                );
                message
            }
            Err(ask_error) => {
                warn!(
                    event_name = "egress.rag.request_failed",
                    interaction_id = %envelope.interaction.id,
                    correlation_id = %ctx.correlation_id,
                    user_id = %command.user_id,
                    error_class = ask_error.error_class(),
                    error = %ask_error,
                    "answer unavailable; replying with error card"
                );
                answer_error_message()
            }
        };

        reply.edit(&message).await?;
        Ok(HandlerResult::Edited)
    }
}
