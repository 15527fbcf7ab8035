use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
};
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, InteractionEnvelope};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("gateway failed to connect: {0}")]
    Connect(String),
    #[error("gateway read failed: {0}")]
    Receive(String),
    #[error("gateway disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of raw `INTERACTION_CREATE` payloads. `Ok(None)` means the stream
/// closed cleanly.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_interaction(&self) -> Result<Option<Value>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Transport fed through an mpsc channel, for relaying interactions received
/// by another component. The stream ends when every sender is dropped.
pub struct ChannelGatewayTransport {
    receiver: Mutex<mpsc::Receiver<Value>>,
}

impl ChannelGatewayTransport {
    pub fn channel(capacity: usize) -> (mpsc::Sender<Value>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self { receiver: Mutex::new(receiver) })
    }
}

#[async_trait]
impl GatewayTransport for ChannelGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_interaction(&self) -> Result<Option<Value>, TransportError> {
        Ok(self.receiver.lock().await.recv().await)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.receiver.lock().await.close();
        Ok(())
    }
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: Arc<EventDispatcher>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Pumps interactions until the stream closes or retries run out. Never
    /// returns an error for transport failures.
    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        event_name = "system.gateway.transport_failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "gateway transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            event_name = "system.gateway.retries_exhausted",
                            max_retries = self.reconnect_policy.max_retries,
                            "gateway retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening gateway connection");
        self.transport.connect().await?;
        info!(attempt, "gateway connected");

        let mut in_flight = JoinSet::new();
        let pumped = self.pump(&mut in_flight).await;

        // Interactions already accepted finish even when the stream fails.
        while in_flight.join_next().await.is_some() {}
        pumped
    }

    async fn pump(&self, in_flight: &mut JoinSet<()>) -> Result<(), TransportError> {
        loop {
            // Reap finished dispatches so the set does not grow unbounded.
            while in_flight.try_join_next().is_some() {}

            let Some(payload) = self.transport.next_interaction().await? else {
                info!("gateway stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            let envelope = match InteractionEnvelope::from_value(payload) {
                Ok(envelope) => envelope,
                Err(decode_error) => {
                    warn!(
                        event_name = "ingress.discord.decode_failed",
                        error = %decode_error,
                        "dropping undecodable interaction payload"
                    );
                    continue;
                }
            };

            info!(
                event_name = "ingress.discord.interaction_received",
                interaction_id = %envelope.interaction.id,
                correlation_id = %envelope.interaction.id,
                event_kind = ?envelope.event.kind(),
                user_id = envelope.event.user_id().unwrap_or("unknown"),
                "received discord interaction"
            );

            let dispatcher = Arc::clone(&self.dispatcher);
            in_flight.spawn(async move {
                let context = EventContext { correlation_id: envelope.interaction.id.clone() };
                match dispatcher.dispatch(&envelope, &context).await {
                    Ok(result) => debug!(
                        event_name = "ingress.discord.interaction_handled",
                        interaction_id = %envelope.interaction.id,
                        correlation_id = %context.correlation_id,
                        result = ?result,
                        "interaction handled"
                    ),
                    Err(error) => warn!(
                        event_name = "ingress.discord.dispatch_failed",
                        interaction_id = %envelope.interaction.id,
                        correlation_id = %context.correlation_id,
                        error = %error,
                        "event dispatch failed; continuing gateway loop"
                    ),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    use super::{
        ChannelGatewayTransport, GatewayRunner, GatewayTransport, ReconnectPolicy, TransportError,
    };
    use crate::{
        events::{
            EventContext, EventDispatcher, EventHandler, EventHandlerError, HandlerResult,
            InteractionEnvelope, InteractionKind,
        },
        messages::feedback_ack_message,
        reply::{
            testing::{Recorded, RecordingResponder},
            ReplyHandle,
        },
    };

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        payloads: VecDeque<Result<Option<Value>, TransportError>>,
        connect_attempts: usize,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            payloads: Vec<Result<Option<Value>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    payloads: payloads.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_interaction(&self) -> Result<Option<Value>, TransportError> {
            let mut state = self.state.lock().await;
            state.payloads.pop_front().unwrap_or(Ok(None))
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            Ok(())
        }
    }

    struct AckButtons;

    #[async_trait]
    impl EventHandler for AckButtons {
        fn event_kinds(&self) -> &'static [InteractionKind] {
            &[InteractionKind::ButtonPress]
        }

        async fn handle(
            &self,
            _envelope: &InteractionEnvelope,
            reply: &mut ReplyHandle<'_>,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            reply.reply(&feedback_ack_message()).await?;
            Ok(HandlerResult::Replied)
        }
    }

    fn button_payload(id: &str) -> Value {
        json!({
            "id": id,
            "application_id": "1100",
            "type": 3,
            "token": format!("tok-{id}"),
            "member": { "user": { "id": "U-1" } },
            "message": { "id": "M-1" },
            "data": { "custom_id": "fb_positive", "component_type": 2 }
        })
    }

    fn dispatcher(responder: Arc<RecordingResponder>) -> Arc<EventDispatcher> {
        let mut dispatcher = EventDispatcher::new(responder);
        dispatcher.register(AckButtons);
        Arc::new(dispatcher)
    }

    fn no_delay(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(button_payload("900"))), Ok(None)],
        ));
        let responder = Arc::new(RecordingResponder::default());

        let runner =
            GatewayRunner::new(transport.clone(), dispatcher(responder.clone()), no_delay(2));
        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.disconnect_calls().await, 1);
        let calls = responder.calls();
        assert_eq!(calls.len(), 1);
        let Recorded::Reply { interaction_id, .. } = &calls[0] else {
            panic!("expected a direct reply, got {calls:?}");
        };
        assert_eq!(interaction_id, "900");
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = GatewayRunner::new(
            transport.clone(),
            dispatcher(Arc::new(RecordingResponder::default())),
            no_delay(2),
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn undecodable_payloads_are_skipped() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(json!({ "unexpected": true }))),
                Ok(Some(button_payload("901"))),
                Ok(None),
            ],
        ));
        let responder = Arc::new(RecordingResponder::default());

        GatewayRunner::new(transport, dispatcher(responder.clone()), no_delay(0))
            .start()
            .await
            .expect("runner");

        assert_eq!(responder.calls().len(), 1);
    }

    #[tokio::test]
    async fn read_failure_still_completes_accepted_interactions() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(button_payload("902"))),
                Err(TransportError::Receive("socket reset".to_owned())),
                Ok(None),
            ],
        ));
        let responder = Arc::new(RecordingResponder::default());

        GatewayRunner::new(transport.clone(), dispatcher(responder.clone()), no_delay(1))
            .start()
            .await
            .expect("runner");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(responder.calls().len(), 1);
    }

    #[tokio::test]
    async fn channel_transport_ends_when_senders_drop() {
        let (sender, transport) = ChannelGatewayTransport::channel(4);
        let responder = Arc::new(RecordingResponder::default());

        sender.send(button_payload("903")).await.expect("send");
        sender.send(button_payload("904")).await.expect("send");
        drop(sender);

        GatewayRunner::new(Arc::new(transport), dispatcher(responder.clone()), no_delay(0))
            .start()
            .await
            .expect("runner");

        assert_eq!(responder.calls().len(), 2);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.backoff(0).as_millis(), 250);
        assert_eq!(policy.backoff(2).as_millis(), 1_000);
        assert_eq!(policy.backoff(10).as_millis(), 5_000);
    }
}
