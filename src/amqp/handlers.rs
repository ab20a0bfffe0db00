//! AMQP message handlers for inbound collaborator reports
//!
//! Two external collaborators feed the lifecycle over AMQP: the statistics
//! service reports authoritative final scores, and the server orchestrator
//! reports which game server a lobby was allocated. Each queue gets its own
//! consumer; both funnel into one handler trait.

use crate::amqp::messages::MessageUtils;
use crate::error::{GameError, Result};
use crate::types::{MatchResultReport, ServerAssignment};
use amqprs::{
    channel::{BasicCancelArguments, BasicConsumeArguments, Channel},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

/// Which inbound queue a consumer drains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    MatchResult,
    ServerAssignment,
}

impl std::fmt::Display for InboundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InboundKind::MatchResult => write!(f, "match-result"),
            InboundKind::ServerAssignment => write!(f, "server-assignment"),
        }
    }
}

/// Trait defining the interface for handling inbound reports
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an authoritative match result from the statistics collaborator
    async fn handle_match_result(&self, report: MatchResultReport) -> Result<()>;

    /// Handle a server allocation from the orchestration collaborator
    async fn handle_server_assignment(&self, assignment: ServerAssignment) -> Result<()>;

    /// Handle processing errors
    async fn handle_error(&self, error: GameError, message_data: &[u8]);
}

/// Consumer bound to one inbound report queue
pub struct ReportConsumer {
    handler: Arc<dyn MessageHandler>,
    channel: Channel,
    kind: InboundKind,
    consumer_tag: String,
}

impl ReportConsumer {
    /// Create a new report consumer for the given queue kind
    pub fn new(handler: Arc<dyn MessageHandler>, channel: Channel, kind: InboundKind) -> Self {
        let consumer_tag = format!("{}-consumer-{}", kind, uuid::Uuid::new_v4());

        Self {
            handler,
            channel,
            kind,
            consumer_tag,
        }
    }

    /// Start consuming messages from the queue
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag);

        self.channel
            .basic_consume(InboundConsumer::new(self.handler.clone(), self.kind), args)
            .await
            .map_err(|e| GameError::AmqpConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!(
            "Started consuming {} messages from queue: {}",
            self.kind, queue_name
        );
        Ok(())
    }

    /// Stop consuming messages
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel.basic_cancel(args).await.map_err(|e| {
            GameError::AmqpConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            }
        })?;

        info!("Stopped consuming {} messages", self.kind);
        Ok(())
    }
}

/// Internal consumer implementation
struct InboundConsumer {
    handler: Arc<dyn MessageHandler>,
    kind: InboundKind,
}

impl InboundConsumer {
    fn new(handler: Arc<dyn MessageHandler>, kind: InboundKind) -> Self {
        Self { handler, kind }
    }
}

#[async_trait]
impl AsyncConsumer for InboundConsumer {
    async fn consume(
        &mut self,
        _channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();

        info!(
            "AMQP message received - kind: {}, delivery_tag: {}, size: {} bytes",
            self.kind,
            delivery_tag,
            content.len()
        );

        let start_time = std::time::Instant::now();

        match self.process_message(&content).await {
            Ok(_) => {
                info!(
                    "Message processed successfully - delivery_tag: {}, processing_time: {:.2}ms",
                    delivery_tag,
                    start_time.elapsed().as_secs_f64() * 1000.0
                );
            }
            Err(e) => {
                error!(
                    "Message processing failed - kind: {}, delivery_tag: {}, error: {}",
                    self.kind, delivery_tag, e
                );
                self.handler
                    .handle_error(
                        GameError::InternalError {
                            message: e.to_string(),
                        },
                        &content,
                    )
                    .await;
            }
        }
    }
}

impl InboundConsumer {
    /// Process an incoming message
    async fn process_message(&self, content: &[u8]) -> Result<()> {
        match self.kind {
            InboundKind::MatchResult => {
                let report = MessageUtils::deserialize_match_result(content)?;
                info!(
                    "Match result parsed - game: {}, score: {}-{}",
                    report.game_id, report.team1_score, report.team2_score
                );
                self.handler.handle_match_result(report).await
            }
            InboundKind::ServerAssignment => {
                let assignment = MessageUtils::deserialize_server_assignment(content)?;
                info!(
                    "Server assignment parsed - game: {}, server: '{}'",
                    assignment.game_id, assignment.server
                );
                self.handler.handle_server_assignment(assignment).await
            }
        }
    }
}

/// Mock message handler for testing
pub struct MockMessageHandler {
    pub received_results: Arc<tokio::sync::Mutex<Vec<MatchResultReport>>>,
    pub received_assignments: Arc<tokio::sync::Mutex<Vec<ServerAssignment>>>,
}

impl Default for MockMessageHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMessageHandler {
    pub fn new() -> Self {
        Self {
            received_results: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            received_assignments: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl MessageHandler for MockMessageHandler {
    async fn handle_match_result(&self, report: MatchResultReport) -> Result<()> {
        let mut results = self.received_results.lock().await;
        results.push(report);
        Ok(())
    }

    async fn handle_server_assignment(&self, assignment: ServerAssignment) -> Result<()> {
        let mut assignments = self.received_assignments.lock().await;
        assignments.push(assignment);
        Ok(())
    }

    async fn handle_error(&self, error: GameError, _message_data: &[u8]) {
        eprintln!("Mock handler received error: {}", error);
    }
}
