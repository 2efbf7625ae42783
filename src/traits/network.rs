//! Network abstraction traits for MQTT.
//!
//! The door logic talks to the broker only through [`MqttClient`], which
//! keeps the publisher and session glue testable without a broker.
//!
//! # Topics
//!
//! ```text
//! garage/door    - Current door state, "open" or "closed" (retained, QoS 2)
//! garage/remote  - Remote trigger, "open" or "close" (QoS 2)
//! ```

use std::fmt::Debug;

// ============================================================================
// MQTT Client Trait (Sync-First Design)
// ============================================================================

/// MQTT delivery guarantee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QoS {
    /// Fire and forget (QoS 0).
    AtMostOnce,
    /// Acknowledged delivery, may duplicate (QoS 1).
    AtLeastOnce,
    /// Exactly-once handshake (QoS 2).
    #[default]
    ExactlyOnce,
}

impl QoS {
    /// Numeric QoS level as used on the wire.
    pub const fn level(&self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// MQTT client trait for pub/sub messaging.
///
/// # Implementation Notes
///
/// - `publish` and `subscribe` must not wait on the network; implementations
///   queue the request and return.
/// - Inbound messages and connection events are not pulled through this
///   trait. The session runtime pushes them into
///   [`SessionHandler`](crate::session::SessionHandler).
/// - The client handles reconnection on its own.
///
/// # Example
///
/// ```rust
/// use garage_door::traits::{MqttClient, QoS};
///
/// fn announce<M: MqttClient>(client: &mut M) -> Result<(), M::Error> {
///     client.publish("garage/door", b"open", QoS::ExactlyOnce, true)
/// }
/// ```
pub trait MqttClient {
    /// Error type for MQTT operations.
    type Error: Debug;

    /// Publish a message to a topic.
    ///
    /// If `retain` is true the broker keeps the message for new subscribers.
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error>;

    /// Subscribe to a topic.
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Self::Error>;
}

/// An MQTT message received from a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Message payload as raw bytes.
    pub payload: Vec<u8>,
}

impl MqttMessage {
    /// Create a new MQTT message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Returns the payload as a UTF-8 string, if valid.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}
