use std::sync::Arc;

use async_trait::async_trait;
use faqbot_core::{FeedbackRecord, FeedbackSink};
use tracing::{info, warn};

use crate::{
    events::{
        ButtonPressEvent, EventContext, EventHandler, EventHandlerError, HandlerResult,
        InteractionEnvelope, InteractionEvent, InteractionKind, ModalSubmitEvent,
    },
    messages::{
        detailed_feedback_ack_message, feedback_ack_message, feedback_modal, FEEDBACK_INPUT_ID,
        FEEDBACK_MODAL_ID, NEGATIVE_FEEDBACK_BUTTON_ID, POSITIVE_FEEDBACK_BUTTON_ID,
    },
    reply::ReplyHandle,
};

/// Collects thumbs-up/down on answers and the follow-up form for negative
/// feedback.
pub struct FeedbackHandler {
    sink: Arc<dyn FeedbackSink>,
}

impl FeedbackHandler {
    pub fn new(sink: Arc<dyn FeedbackSink>) -> Self {
        Self { sink }
    }

    /// Submits in a detached task. The acknowledgement never waits on the
    /// feedback service and its failures are only logged.
    fn submit_detached(&self, record: FeedbackRecord, correlation_id: String) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            match sink.submit(&record).await {
                Ok(()) => info!(
                    event_name = "egress.feedback.submitted",
                    correlation_id = %correlation_id,
                    message_id = %record.message_id,
                    feedback_type = record.feedback_type.as_str(),
                    "feedback recorded"
                ),
                Err(error) => warn!(
                    event_name = "egress.feedback.submit_failed",
                    correlation_id = %correlation_id,
                    message_id = %record.message_id,
                    feedback_type = record.feedback_type.as_str(),
                    error_class = error.error_class(),
                    error = %error,
                    "feedback submission failed"
                ),
            }
        });
    }

    async fn handle_form(
        &self,
        submission: &ModalSubmitEvent,
        reply: &mut ReplyHandle<'_>,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let comments = submission.field(FEEDBACK_INPUT_ID).unwrap_or_default();
        match &submission.message_id {
            Some(message_id) => {
                let record = FeedbackRecord::negative(message_id, &submission.user_id, comments);
                self.submit_detached(record, ctx.correlation_id.clone());
            }
            None => warn!(
                event_name = "ingress.discord.feedback_form_unanchored",
                correlation_id = %ctx.correlation_id,
                user_id = %submission.user_id,
                "feedback form submitted without a source message; skipping submission"
            ),
        }

        reply.reply(&detailed_feedback_ack_message()).await?;
        Ok(HandlerResult::Replied)
    }

    async fn handle_button(
        &self,
        press: &ButtonPressEvent,
        reply: &mut ReplyHandle<'_>,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        match press.custom_id.as_str() {
            POSITIVE_FEEDBACK_BUTTON_ID => {
                let record = FeedbackRecord::positive(&press.message_id, &press.user_id);
                self.submit_detached(record, ctx.correlation_id.clone());
                reply.reply(&feedback_ack_message()).await?;
                Ok(HandlerResult::Replied)
            }
            NEGATIVE_FEEDBACK_BUTTON_ID => {
                reply.show_modal(&feedback_modal()).await?;
                Ok(HandlerResult::ModalShown)
            }
            _ => Ok(HandlerResult::Ignored),
        }
    }
}

#[async_trait]
impl EventHandler for FeedbackHandler {
    fn event_kinds(&self) -> &'static [InteractionKind] {
        &[InteractionKind::ButtonPress, InteractionKind::ModalSubmit]
    }

    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        reply: &mut ReplyHandle<'_>,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        match &envelope.event {
            InteractionEvent::ModalSubmit(submission)
                if submission.custom_id == FEEDBACK_MODAL_ID =>
            {
                self.handle_form(submission, reply, ctx).await
            }
            InteractionEvent::ButtonPress(press) => self.handle_button(press, reply, ctx).await,
            _ => Ok(HandlerResult::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use faqbot_core::{FeedbackRecord, FeedbackSink, FeedbackType, ServiceError, ServiceKind};
    use tokio::sync::{mpsc, Notify};

    use super::FeedbackHandler;
    use crate::{
        events::{
            ButtonPressEvent, EventContext, EventDispatcher, HandlerResult, InteractionEnvelope,
            InteractionEvent, InteractionRef, ModalSubmitEvent, SubmittedField,
        },
        messages::{DETAILED_FEEDBACK_ACK, FEEDBACK_ACK, FEEDBACK_MODAL_ID},
        reply::testing::{Recorded, RecordingResponder},
    };

    /// Forwards every submission to a channel; optionally holds or fails it.
    struct ChannelSink {
        sent: mpsc::UnboundedSender<FeedbackRecord>,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    #[async_trait]
    impl FeedbackSink for ChannelSink {
        async fn submit(&self, record: &FeedbackRecord) -> Result<(), ServiceError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.sent.send(record.clone()).expect("test receiver alive");
            if self.fail {
                return Err(ServiceError::Transport {
                    service: ServiceKind::Feedback,
                    message: "connection refused".to_owned(),
                });
            }
            Ok(())
        }
    }

    struct Harness {
        dispatcher: EventDispatcher,
        responder: Arc<RecordingResponder>,
        submitted: mpsc::UnboundedReceiver<FeedbackRecord>,
    }

    fn harness(gate: Option<Arc<Notify>>, fail: bool) -> Harness {
        let (sent, submitted) = mpsc::unbounded_channel();
        let responder = Arc::new(RecordingResponder::default());
        let mut dispatcher = EventDispatcher::new(responder.clone());
        dispatcher.register(FeedbackHandler::new(Arc::new(ChannelSink { sent, gate, fail })));
        Harness { dispatcher, responder, submitted }
    }

    fn interaction(id: &str) -> InteractionRef {
        InteractionRef { id: id.to_owned(), application_id: "1100".to_owned(), token: "tok".to_owned() }
    }

    fn button(custom_id: &str) -> InteractionEnvelope {
        InteractionEnvelope {
            interaction: interaction("i-button"),
            event: InteractionEvent::ButtonPress(ButtonPressEvent {
                custom_id: custom_id.to_owned(),
                message_id: "M-42".to_owned(),
                user_id: "U-7".to_owned(),
            }),
        }
    }

    fn form(custom_id: &str, message_id: Option<&str>, comments: &str) -> InteractionEnvelope {
        InteractionEnvelope {
            interaction: interaction("i-form"),
            event: InteractionEvent::ModalSubmit(ModalSubmitEvent {
                custom_id: custom_id.to_owned(),
                message_id: message_id.map(str::to_owned),
                user_id: "U-7".to_owned(),
                fields: vec![SubmittedField {
                    custom_id: "feedback_input".to_owned(),
                    value: comments.to_owned(),
                }],
            }),
        }
    }

    async fn next_submission(
        submitted: &mut mpsc::UnboundedReceiver<FeedbackRecord>,
    ) -> FeedbackRecord {
        tokio::time::timeout(Duration::from_secs(1), submitted.recv())
            .await
            .expect("submission within deadline")
            .expect("sink channel open")
    }

    #[tokio::test]
    async fn positive_button_submits_once_and_acknowledges_privately() {
        let mut harness = harness(None, false);

        let result = harness
            .dispatcher
            .dispatch(&button("fb_positive"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Replied);
        let record = next_submission(&mut harness.submitted).await;
        assert_eq!(record, FeedbackRecord::positive("M-42", "U-7"));
        assert!(record.comments.is_none());
        assert!(harness.submitted.try_recv().is_err());

        let calls = harness.responder.calls();
        assert_eq!(calls.len(), 1);
        let Recorded::Reply { message, .. } = &calls[0] else {
            panic!("expected a direct reply, got {calls:?}");
        };
        assert_eq!(message.content.as_deref(), Some(FEEDBACK_ACK));
        assert!(message.is_ephemeral());
    }

    #[tokio::test]
    async fn negative_button_shows_form_without_submitting() {
        let mut harness = harness(None, false);

        let result = harness
            .dispatcher
            .dispatch(&button("fb_negative"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::ModalShown);
        let calls = harness.responder.calls();
        assert_eq!(calls.len(), 1);
        let Recorded::ShowModal { modal, .. } = &calls[0] else {
            panic!("expected the feedback form, got {calls:?}");
        };
        assert_eq!(modal.custom_id, FEEDBACK_MODAL_ID);

        tokio::task::yield_now().await;
        assert!(harness.submitted.try_recv().is_err());
    }

    #[tokio::test]
    async fn form_submission_sends_negative_feedback_with_comments() {
        let mut harness = harness(None, false);

        let result = harness
            .dispatcher
            .dispatch(&form("feedback_modal", Some("M-42"), "too vague"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Replied);
        let record = next_submission(&mut harness.submitted).await;
        assert_eq!(record.feedback_type, FeedbackType::Negative);
        assert_eq!(record.comments.as_deref(), Some("too vague"));
        assert_eq!(record.message_id, "M-42");
        assert!(harness.submitted.try_recv().is_err());

        let calls = harness.responder.calls();
        assert_eq!(calls.len(), 1);
        let Recorded::Reply { message, .. } = &calls[0] else {
            panic!("expected a direct reply, got {calls:?}");
        };
        assert_eq!(message.content.as_deref(), Some(DETAILED_FEEDBACK_ACK));
        assert!(message.is_ephemeral());
    }

    #[tokio::test]
    async fn acknowledgement_does_not_wait_for_feedback_service() {
        let gate = Arc::new(Notify::new());
        let mut harness = harness(Some(gate.clone()), false);

        harness
            .dispatcher
            .dispatch(&button("fb_positive"), &EventContext::default())
            .await
            .expect("dispatch");

        // The reply is already recorded while the sink is still blocked.
        assert_eq!(harness.responder.calls().len(), 1);
        assert!(harness.submitted.try_recv().is_err());

        gate.notify_one();
        let record = next_submission(&mut harness.submitted).await;
        assert_eq!(record.feedback_type, FeedbackType::Positive);
    }

    #[tokio::test]
    async fn failing_feedback_service_still_acknowledges() {
        let mut harness = harness(None, true);

        let result = harness
            .dispatcher
            .dispatch(&form("feedback_modal", Some("M-42"), "wrong"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Replied);
        next_submission(&mut harness.submitted).await;
        assert_eq!(harness.responder.calls().len(), 1);
    }

    #[tokio::test]
    async fn unanchored_form_is_acknowledged_without_submission() {
        let mut harness = harness(None, false);

        let result = harness
            .dispatcher
            .dispatch(&form("feedback_modal", None, "too vague"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Replied);
        tokio::task::yield_now().await;
        assert!(harness.submitted.try_recv().is_err());
        assert_eq!(harness.responder.calls().len(), 1);
    }

    #[tokio::test]
    async fn unknown_buttons_and_forms_are_ignored() {
        let harness = harness(None, false);

        for envelope in [button("something_else"), form("survey_modal", Some("M-1"), "hi")] {
            let result = harness
                .dispatcher
                .dispatch(&envelope, &EventContext::default())
                .await
                .expect("dispatch");
            assert_eq!(result, HandlerResult::Ignored);
        }
        assert!(harness.responder.calls().is_empty());
    }
}
