//! AMQP integration for the matchmaking lifecycle service
//!
//! This module handles AMQP connections, inbound report consumption, and
//! outbound lifecycle event publishing.

pub mod connection;
pub mod handlers;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use connection::{AmqpConfig, AmqpConnection};
pub use handlers::{InboundKind, MessageHandler, ReportConsumer};
pub use messages::*;
pub use publisher::{AmqpEventPublisher, EventPublisher, MockEventPublisher, PublisherConfig};
