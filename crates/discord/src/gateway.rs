use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::events::{
    from_gateway_payload, EventContext, HandlerResult, Interaction, InteractionDispatcher,
};
use crate::rest::InteractionResponder;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport disconnect failed: {0}")]
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

/// Source of raw `INTERACTION_CREATE` payloads.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_interaction(&self) -> Result<Option<Value>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_interaction(&self) -> Result<Option<Value>, TransportError> {
        Ok(None)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Feeds payloads pushed through an in-process channel; the stream ends when
/// every sender is dropped.
pub struct ChannelTransport {
    receiver: Mutex<mpsc::Receiver<Value>>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (mpsc::Sender<Value>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self { receiver: Mutex::new(receiver) })
    }
}

#[async_trait]
impl GatewayTransport for ChannelTransport {
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
    dispatcher: Arc<InteractionDispatcher>,
    responder: Arc<dyn InteractionResponder>,
    reconnect_policy: ReconnectPolicy,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: Arc<InteractionDispatcher>,
        responder: Arc<dyn InteractionResponder>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, responder, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "gateway transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
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
        info!(attempt, "opening gateway transport connection");
        self.transport.connect().await?;
        info!(attempt, "gateway transport connected");

        let mut in_flight = JoinSet::new();
        let pumped = self.pump(&mut in_flight, attempt).await;

        let pending = in_flight.len();
        if pending > 0 {
            debug!(pending, "draining in-flight interactions");
        }
        while let Some(joined) = in_flight.join_next().await {
            log_abnormal_exit(joined);
        }

        pumped?;
        self.transport.disconnect().await
    }

    async fn pump(&self, in_flight: &mut JoinSet<()>, attempt: u32) -> Result<(), TransportError> {
        loop {
            let Some(payload) = self.transport.next_interaction().await? else {
                info!(attempt, "gateway transport stream closed");
                return Ok(());
            };

            let interaction = match from_gateway_payload(payload) {
                Ok(interaction) => interaction,
                Err(error) => {
                    warn!(
                        event_name = "ingress.discord.payload_rejected",
                        error = %error,
                        "could not decode interaction payload; skipping"
                    );
                    continue;
                }
            };

            info!(
                event_name = "ingress.discord.interaction_received",
                interaction_id = %interaction.handle().id,
                interaction_type = ?interaction.kind(),
                command = interaction.target(),
                correlation_id = %interaction.handle().id,
                "received discord interaction"
            );

            while let Some(joined) = in_flight.try_join_next() {
                log_abnormal_exit(joined);
            }

            let dispatcher = Arc::clone(&self.dispatcher);
            let responder = Arc::clone(&self.responder);
            in_flight.spawn(async move {
                process_interaction(&dispatcher, responder.as_ref(), interaction).await;
            });
        }
    }
}

fn log_abnormal_exit(joined: Result<(), tokio::task::JoinError>) {
    if let Err(error) = joined {
        warn!(error = %error, "interaction task ended abnormally");
    }
}

async fn process_interaction(
    dispatcher: &InteractionDispatcher,
    responder: &dyn InteractionResponder,
    interaction: Interaction,
) {
    let context = EventContext { correlation_id: interaction.handle().id.clone() };

    let HandlerResult::Responded(response) = dispatcher.dispatch(&interaction, &context).await
    else {
        debug!(
            correlation_id = %context.correlation_id,
            interaction_type = ?interaction.kind(),
            "interaction ignored"
        );
        return;
    };

    if let Err(error) = responder.respond(interaction.handle(), &response).await {
        warn!(
            event_name = "egress.discord.response_failed",
            correlation_id = %context.correlation_id,
            error = %error,
            "failed to send interaction response"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;
    use tokio::task::JoinSet;
    use yambot_core::{CommandKind, CommandSet, CommandSpec, FieldSpec, WebhookResponse};

    use super::{ChannelTransport, GatewayRunner, GatewayTransport, ReconnectPolicy, TransportError};
    use crate::commands::CommandPipeline;
    use crate::components::InteractionResponse;
    use crate::events::{default_dispatcher, InteractionDispatcher, InteractionHandle};
    use crate::rest::{InteractionResponder, ResponderError};
    use crate::validation::FieldValidator;
    use crate::webhook::{RemoteOptionResolver, WebhookSender};

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
                    connect_attempts: 0,
                    disconnect_calls: 0,
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

    struct PacedTransport {
        payloads: Mutex<VecDeque<Value>>,
        pace: Duration,
    }

    #[async_trait]
    impl GatewayTransport for PacedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn next_interaction(&self) -> Result<Option<Value>, TransportError> {
            tokio::time::sleep(self.pace).await;
            Ok(self.payloads.lock().await.pop_front())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingResponder {
        responses: Mutex<Vec<(String, InteractionResponse)>>,
    }

    impl RecordingResponder {
        async fn arrival_order(&self) -> Vec<String> {
            self.responses.lock().await.iter().map(|(id, _)| id.clone()).collect()
        }

        async fn responses(&self) -> Vec<(String, InteractionResponse)> {
            let mut responses = self.responses.lock().await.clone();
            responses.sort_by(|left, right| left.0.cmp(&right.0));
            responses
        }
    }

    #[async_trait]
    impl InteractionResponder for RecordingResponder {
        async fn respond(
            &self,
            handle: &InteractionHandle,
            response: &InteractionResponse,
        ) -> Result<(), ResponderError> {
            self.responses.lock().await.push((handle.id.clone(), response.clone()));
            Ok(())
        }
    }

    struct SlowWebhook;

    #[async_trait]
    impl WebhookSender for SlowWebhook {
        async fn send(
            &self,
            _url: &str,
            _payload: &serde_json::Map<String, Value>,
        ) -> WebhookResponse {
            tokio::time::sleep(Duration::from_millis(50)).await;
            WebhookResponse::success(200, None)
        }
    }

    fn dispatcher() -> Arc<InteractionDispatcher> {
        let commands = CommandSet::new(vec![
            CommandSpec::new("ping", CommandKind::Slash)
                .with_webhook("https://hooks.example.com/ping")
                .with_response_format("pong {{ WebhookResponse.StatusCode }}"),
            CommandSpec::new("cost", CommandKind::Modal).with_field(FieldSpec::text("title")),
        ])
        .expect("unique commands");
        let pipeline = CommandPipeline::new(
            Arc::new(commands),
            Arc::new(SlowWebhook),
            FieldValidator::new(Arc::new(RemoteOptionResolver::default())),
        );
        Arc::new(default_dispatcher(Arc::new(pipeline)))
    }

    fn command_payload(id: &str, name: &str) -> Value {
        json!({"id": id, "token": "tok", "type": 2, "data": {"name": name}})
    }

    fn no_delay(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(command_payload("1", "ping"))), Ok(None)],
        ));
        let responder = Arc::new(RecordingResponder::default());

        let runner =
            GatewayRunner::new(transport.clone(), dispatcher(), responder.clone(), no_delay(2));
        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.disconnect_calls().await, 1);
        assert_eq!(
            responder.responses().await,
            vec![("1".to_owned(), InteractionResponse::public("pong 200"))]
        );
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
            dispatcher(),
            Arc::new(RecordingResponder::default()),
            no_delay(2),
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn drains_in_flight_interactions_and_answers_each_once() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(command_payload("1", "ping"))),
                Ok(Some(json!({"id": "bad"}))),
                Ok(Some(command_payload("2", "cost"))),
                Ok(Some(command_payload("3", "deploy"))),
                Ok(Some(json!({"id": "4", "token": "tok", "type": 3, "data": {"custom_id": "x"}}))),
                Ok(None),
            ],
        ));
        let responder = Arc::new(RecordingResponder::default());

        let runner = GatewayRunner::new(transport, dispatcher(), responder.clone(), no_delay(0));
        runner.start().await.expect("runner");

        let responses = responder.responses().await;
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0], ("1".to_owned(), InteractionResponse::public("pong 200")));
        assert!(matches!(responses[1].1, InteractionResponse::Modal(_)));
        assert_eq!(
            responses[2],
            ("3".to_owned(), InteractionResponse::ephemeral("Error: Unknown command"))
        );
    }

    #[tokio::test]
    async fn channel_transport_ends_when_senders_drop() {
        let (sender, transport) = ChannelTransport::new(4);
        let responder = Arc::new(RecordingResponder::default());
        sender.send(command_payload("9", "ping")).await.expect("queue payload");
        drop(sender);

        let runner =
            GatewayRunner::new(Arc::new(transport), dispatcher(), responder.clone(), no_delay(0));
        runner.start().await.expect("runner");

        assert_eq!(responder.responses().await.len(), 1);
    }

    #[tokio::test]
    async fn finished_interaction_tasks_are_reaped_while_streaming() {
        let payloads =
            (0..60).map(|index| command_payload(&index.to_string(), "cost")).collect();
        let transport = Arc::new(PacedTransport {
            payloads: Mutex::new(payloads),
            pace: Duration::from_millis(2),
        });
        let responder = Arc::new(RecordingResponder::default());
        let runner = GatewayRunner::new(transport, dispatcher(), responder.clone(), no_delay(0));

        let mut in_flight = JoinSet::new();
        runner.pump(&mut in_flight, 0).await.expect("pump");

        assert!(in_flight.len() <= 1, "{} tasks still held", in_flight.len());
        while in_flight.join_next().await.is_some() {}
        assert_eq!(responder.responses().await.len(), 60);
    }

    #[tokio::test]
    async fn slow_webhook_does_not_block_later_interactions() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(command_payload("slow", "ping"))),
                Ok(Some(command_payload("fast", "cost"))),
                Ok(None),
            ],
        ));
        let responder = Arc::new(RecordingResponder::default());
        let runner = GatewayRunner::new(transport, dispatcher(), responder.clone(), no_delay(0));

        runner.start().await.expect("runner");

        assert_eq!(responder.arrival_order().await, vec!["fast".to_owned(), "slow".to_owned()]);
    }
}
