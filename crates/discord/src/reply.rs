use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    events::InteractionRef,
    messages::{MessagePayload, ModalPayload},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyAction {
    Defer,
    Edit,
    Reply,
    ShowModal,
}

impl fmt::Display for ReplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Defer => "defer",
            Self::Edit => "edit",
            Self::Reply => "reply",
            Self::ShowModal => "show_modal",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponderError {
    #[error("platform request for {action} failed: {message}")]
    Transport { action: ReplyAction, message: String },
    #[error("platform rejected {action} with HTTP {status}: {body}")]
    Rejected { action: ReplyAction, status: u16, body: String },
}

/// The platform operations a handler may perform on an interaction.
#[async_trait]
pub trait InteractionResponder: Send + Sync {
    async fn defer(&self, interaction: &InteractionRef) -> Result<(), ResponderError>;

    async fn edit_original(
        &self,
        interaction: &InteractionRef,
        message: &MessagePayload,
    ) -> Result<(), ResponderError>;

    async fn reply(
        &self,
        interaction: &InteractionRef,
        message: &MessagePayload,
    ) -> Result<(), ResponderError>;

    async fn show_modal(
        &self,
        interaction: &InteractionRef,
        modal: &ModalPayload,
    ) -> Result<(), ResponderError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyState {
    Pending,
    Deferred,
    Completed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error(transparent)]
    Responder(#[from] ResponderError),
    #[error("cannot {action} an interaction in state {state:?}")]
    OutOfOrder { action: ReplyAction, state: ReplyState },
}

/// Single-use reply lifecycle for one interaction:
/// `Pending -> Deferred -> Completed` or `Pending -> Completed`.
///
/// A step is consumed when it is attempted, even if the platform call fails;
/// interaction tokens are never replayed.
pub struct ReplyHandle<'a> {
    responder: &'a dyn InteractionResponder,
    interaction: &'a InteractionRef,
    state: ReplyState,
}

impl<'a> ReplyHandle<'a> {
    pub fn new(responder: &'a dyn InteractionResponder, interaction: &'a InteractionRef) -> Self {
        Self { responder, interaction, state: ReplyState::Pending }
    }

    pub fn state(&self) -> ReplyState {
        self.state
    }

    pub async fn defer(&mut self) -> Result<(), ReplyError> {
        self.advance(ReplyAction::Defer, ReplyState::Pending, ReplyState::Deferred)?;
        self.responder.defer(self.interaction).await?;
        Ok(())
    }

    pub async fn edit(&mut self, message: &MessagePayload) -> Result<(), ReplyError> {
        self.advance(ReplyAction::Edit, ReplyState::Deferred, ReplyState::Completed)?;
        self.responder.edit_original(self.interaction, message).await?;
        Ok(())
    }

    pub async fn reply(&mut self, message: &MessagePayload) -> Result<(), ReplyError> {
        self.advance(ReplyAction::Reply, ReplyState::Pending, ReplyState::Completed)?;
        self.responder.reply(self.interaction, message).await?;
        Ok(())
    }

    pub async fn show_modal(&mut self, modal: &ModalPayload) -> Result<(), ReplyError> {
        self.advance(ReplyAction::ShowModal, ReplyState::Pending, ReplyState::Completed)?;
        self.responder.show_modal(self.interaction, modal).await?;
        Ok(())
    }

    fn advance(
        &mut self,
        action: ReplyAction,
        expected: ReplyState,
        next: ReplyState,
    ) -> Result<(), ReplyError> {
        if self.state != expected {
            return Err(ReplyError::OutOfOrder { action, state: self.state });
        }
        self.state = next;
        Ok(())
    }
}
