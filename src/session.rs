//! Platform-agnostic MQTT session glue.
//!
//! The MQTT runtime calls into [`SessionHandler`] from its own task:
//!
//! - [`on_connected`](SessionHandler::on_connected) after every successful
//!   connection, including reconnects. It re-subscribes and force-publishes
//!   the current door state, since a restored connection looks the same as a
//!   fresh one to downstream subscribers.
//! - [`on_message`](SessionHandler::on_message) for each inbound publish.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use garage_door::{CommandRelay, DoorState, DoorStateCell, SessionHandler, StatePublisher, Topics};
//! use garage_door::hal::MockMqtt;
//!
//! let door = Arc::new(DoorStateCell::new(DoorState::Open));
//! let relay = Arc::new(CommandRelay::new("garage/remote"));
//! let publisher = Arc::new(StatePublisher::new(MockMqtt::new(), "garage/door"));
//! let session = SessionHandler::new(Arc::clone(&publisher), relay, door, Topics::default());
//!
//! session.on_connected().unwrap();
//! assert_eq!(publisher.with_client(|c| c.payloads_to("garage/door")), vec!["open"]);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Topics;
use crate::door::DoorStateCell;
use crate::publisher::StatePublisher;
use crate::relay::{CommandRelay, RemoteCommand};
use crate::traits::{MqttClient, MqttMessage, QoS};

/// Connects MQTT session events to the relay and the publisher.
///
/// The connect sequence can fail part-way when the client's request queue is
/// full. Whatever failed is remembered and retried by
/// [`retry_sync`](Self::retry_sync) until it succeeds or the next connection
/// runs the full sequence again.
#[derive(Debug)]
pub struct SessionHandler<C: MqttClient> {
    publisher: Arc<StatePublisher<C>>,
    commands: Arc<CommandRelay>,
    door: Arc<DoorStateCell>,
    topics: Topics,
    resubscribe: AtomicBool,
    republish: AtomicBool,
}

impl<C: MqttClient> SessionHandler<C> {
    /// Create a handler sharing state with the control loop and sensor.
    pub fn new(
        publisher: Arc<StatePublisher<C>>,
        commands: Arc<CommandRelay>,
        door: Arc<DoorStateCell>,
        topics: Topics,
    ) -> Self {
        Self {
            publisher,
            commands,
            door,
            topics,
            resubscribe: AtomicBool::new(false),
            republish: AtomicBool::new(false),
        }
    }

    /// Subscribe to both topics and force-publish the current state.
    ///
    /// Must run after every connection-established event. Subscriptions are
    /// made before the publish so the retained state echo is not missed. The
    /// forced publish is attempted even when a subscribe fails; the first
    /// error is returned and the failed parts are left for
    /// [`retry_sync`](Self::retry_sync).
    pub fn on_connected(&self) -> Result<(), C::Error> {
        self.sync(true, true)
    }

    /// Retry whatever part of the last connect sequence failed.
    ///
    /// Returns `None` when nothing is outstanding.
    pub fn retry_sync(&self) -> Option<Result<(), C::Error>> {
        let subscribe = self.resubscribe.load(Ordering::Acquire);
        let publish = self.republish.load(Ordering::Acquire);
        if !subscribe && !publish {
            return None;
        }
        debug!(subscribe, publish, "retrying connect sequence");
        Some(self.sync(subscribe, publish))
    }

    /// `true` while part of the connect sequence still has to be retried.
    pub fn sync_pending(&self) -> bool {
        self.resubscribe.load(Ordering::Acquire) || self.republish.load(Ordering::Acquire)
    }

    fn sync(&self, subscribe: bool, publish: bool) -> Result<(), C::Error> {
        let subscribed = if subscribe {
            let result = self.publisher.with_client(|client| {
                client.subscribe(self.topics.state.as_str(), QoS::ExactlyOnce)?;
                client.subscribe(self.topics.remote.as_str(), QoS::ExactlyOnce)
            });
            self.resubscribe.store(result.is_err(), Ordering::Release);
            if result.is_ok() {
                info!(
                    state_topic = self.topics.state.as_str(),
                    remote_topic = self.topics.remote.as_str(),
                    "subscribed"
                );
            }
            result
        } else {
            Ok(())
        };

        let published = if publish {
            let result = self.publisher.publish_current(&self.door, true).map(|_| ());
            self.republish.store(result.is_err(), Ordering::Release);
            result
        } else {
            Ok(())
        };

        subscribed.and(published)
    }

    /// Handle an inbound publish. Returns the command if one was queued.
    pub fn on_message(&self, topic: &str, payload: &[u8]) -> Option<RemoteCommand> {
        debug!(
            topic,
            payload = %String::from_utf8_lossy(payload),
            "received message"
        );
        self.commands.on_inbound_message(topic, payload)
    }

    /// Convenience wrapper for [`on_message`](Self::on_message).
    pub fn on_mqtt_message(&self, msg: &MqttMessage) -> Option<RemoteCommand> {
        self.on_message(&msg.topic, &msg.payload)
    }

    /// Get a reference to the shared publisher.
    pub fn publisher(&self) -> &Arc<StatePublisher<C>> {
        &self.publisher
    }

    /// Configured topics.
    pub fn topics(&self) -> &Topics {
        &self.topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockMqtt;
    use crate::DoorState;

    fn setup(initial: DoorState) -> (Arc<DoorStateCell>, Arc<CommandRelay>, SessionHandler<MockMqtt>) {
        let door = Arc::new(DoorStateCell::new(initial));
        let relay = Arc::new(CommandRelay::new("garage/remote"));
        let publisher = Arc::new(StatePublisher::new(MockMqtt::new(), "garage/door"));
        let session = SessionHandler::new(
            publisher,
            Arc::clone(&relay),
            Arc::clone(&door),
            Topics::default(),
        );
        (door, relay, session)
    }

    #[test]
    fn on_connected_subscribes_both_topics_at_qos2() {
        let (_door, _relay, session) = setup(DoorState::Closed);
        session.on_connected().unwrap();

        session.publisher().with_client(|c| {
            assert_eq!(
                c.subscriptions,
                vec![
                    ("garage/door".to_string(), QoS::ExactlyOnce),
                    ("garage/remote".to_string(), QoS::ExactlyOnce),
                ]
            );
        });
    }

    #[test]
    fn every_connect_forces_one_publish() {
        let (door, _relay, session) = setup(DoorState::Closed);

        session.on_connected().unwrap();
        session.on_connected().unwrap();
        door.set(DoorState::Open);
        session.on_connected().unwrap();

        session.publisher().with_client(|c| {
            assert_eq!(c.payloads_to("garage/door"), vec!["closed", "closed", "open"]);
            assert!(c.published.iter().all(|(_, _, _, retain)| *retain));
            assert_eq!(c.subscriptions.len(), 6);
        });
    }

    #[test]
    fn subscribe_failure_still_forces_publish() {
        let (_door, _relay, session) = setup(DoorState::Closed);
        session.publisher().with_client(|c| c.fail_subscribe = true);

        assert!(session.on_connected().is_err());
        assert_eq!(session.publisher().last_published(), Some(DoorState::Closed));
        assert!(session.sync_pending());
    }

    #[test]
    fn retry_sync_only_redoes_failed_parts() {
        let (door, _relay, session) = setup(DoorState::Closed);
        session.publisher().with_client(|c| c.fail_subscribe = true);
        session.on_connected().unwrap_err();

        session.publisher().with_client(|c| c.fail_subscribe = false);
        door.set(DoorState::Open);
        assert_eq!(session.retry_sync(), Some(Ok(())));

        session.publisher().with_client(|c| {
            assert_eq!(c.subscriptions.len(), 2);
            // The forced publish already went out; no second one
            assert_eq!(c.payloads_to("garage/door"), vec!["closed"]);
        });
        assert!(!session.sync_pending());
        assert_eq!(session.retry_sync(), None);
    }

    #[test]
    fn failed_forced_publish_is_retried_with_current_state() {
        let (door, _relay, session) = setup(DoorState::Closed);
        session.publisher().with_client(|c| c.fail_publish = true);
        session.on_connected().unwrap_err();
        assert!(session.sync_pending());

        // Still failing: stays pending
        assert_eq!(session.retry_sync(), Some(Err(())));
        assert!(session.sync_pending());

        session.publisher().with_client(|c| c.fail_publish = false);
        door.set(DoorState::Open);
        assert_eq!(session.retry_sync(), Some(Ok(())));

        session.publisher().with_client(|c| {
            assert_eq!(c.subscriptions.len(), 2);
            assert_eq!(c.payloads_to("garage/door"), vec!["open"]);
        });
        assert!(!session.sync_pending());
    }

    #[test]
    fn successful_connect_clears_outstanding_retry() {
        let (_door, _relay, session) = setup(DoorState::Closed);
        session.publisher().with_client(|c| c.fail_publish = true);
        session.on_connected().unwrap_err();

        session.publisher().with_client(|c| c.fail_publish = false);
        session.on_connected().unwrap();
        assert!(!session.sync_pending());
    }

    #[test]
    fn handler_is_debug() {
        let (_door, _relay, session) = setup(DoorState::Open);
        let text = format!("{session:?}");
        assert!(text.starts_with("SessionHandler"));
        assert!(text.contains("garage/remote"));
    }

    #[test]
    fn on_message_feeds_relay() {
        let (_door, relay, session) = setup(DoorState::Closed);

        assert_eq!(session.on_message("garage/door", b"open"), None);
        assert!(!relay.is_pending());

        let msg = MqttMessage::new("garage/remote", b"open".to_vec());
        assert_eq!(session.on_mqtt_message(&msg), Some(RemoteCommand::Open));
        assert!(relay.is_pending());
    }
}
