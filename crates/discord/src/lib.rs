//! Discord Integration - interaction handling for the FAQ bot
//!
//! This crate provides the Discord interface for faqbot:
//! - **Gateway** (`gateway`) - interaction intake with reconnection logic
//! - **Events** (`events`) - interaction decoding and the event dispatcher
//! - **Ask** (`ask`) - `/ask query:<text>` answered through the answer service
//! - **Feedback** (`feedback`) - 👍/👎 buttons and the follow-up feedback form
//! - **Messages** (`messages`) - embed, button and modal builders
//! - **Commands** (`commands`) - slash-command schema and registration
//! - **REST** (`rest`) - Discord HTTP API client
//!
//! # Architecture
//!
//! ```text
//! Gateway → EventDispatcher → Handlers → Answer / Feedback services
//!                 ↓
//!           ReplyHandle → Discord REST (defer, edit, reply, modal)
//! ```
//!
//! # Key Types
//!
//! - `GatewayRunner` - interaction pump, one task per interaction
//! - `EventDispatcher` - routes interactions to handlers by kind
//! - `ReplyHandle` - enforces a single reply per interaction
//! - `DiscordRestClient` - responder and command registry over HTTP

pub mod ask;
pub mod commands;
pub mod events;
pub mod feedback;
pub mod gateway;
pub mod messages;
pub mod reply;
pub mod rest;

use std::sync::Arc;

use faqbot_core::{AnswerConfig, AnswerService, FeedbackSink};

pub use ask::AskCommandHandler;
pub use events::{EventDispatcher, InteractionEnvelope};
pub use feedback::FeedbackHandler;
pub use gateway::{GatewayRunner, ReconnectPolicy};
pub use rest::DiscordRestClient;

/// Dispatcher wired with the ask and feedback handlers.
pub fn faqbot_dispatcher(
    responder: Arc<dyn reply::InteractionResponder>,
    answers: Arc<dyn AnswerService>,
    feedback: Arc<dyn FeedbackSink>,
    answer_config: AnswerConfig,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new(responder);
    dispatcher.register(AskCommandHandler::new(answers, answer_config));
    dispatcher.register(FeedbackHandler::new(feedback));
    dispatcher
}
