//! Retained door-state publisher with change detection.
//!
//! Publishes the door state on the state topic, retained at QoS 2, only when
//! it differs from the last value that actually reached the client, or when
//! a forced re-publish is requested after a (re)connect.
//!
//! # Example
//!
//! ```rust
//! use garage_door::{DoorState, StatePublisher};
//! use garage_door::hal::MockMqtt;
//!
//! let publisher = StatePublisher::new(MockMqtt::new(), "garage/door");
//!
//! assert_eq!(publisher.maybe_publish(DoorState::Open, false), Ok(true));
//! // Unchanged: no network call
//! assert_eq!(publisher.maybe_publish(DoorState::Open, false), Ok(false));
//! // Forced: always published
//! assert_eq!(publisher.maybe_publish(DoorState::Open, true), Ok(true));
//!
//! assert_eq!(publisher.with_client(|c| c.published.len()), 2);
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::door::{DoorState, DoorStateCell};
use crate::traits::{MqttClient, QoS};

/// Client handle plus the last value it successfully published.
///
/// Kept under one lock so a publish and its bookkeeping are atomic with
/// respect to the other context publishing.
#[derive(Debug)]
struct PublisherInner<C> {
    client: C,
    last_published: Option<DoorState>,
}

impl<C: MqttClient> PublisherInner<C> {
    fn publish(&mut self, topic: &str, current: DoorState, force: bool) -> Result<bool, C::Error> {
        if !force && self.last_published == Some(current) {
            return Ok(false);
        }

        match self
            .client
            .publish(topic, current.as_str().as_bytes(), QoS::ExactlyOnce, true)
        {
            Ok(()) => {
                self.last_published = Some(current);
                info!(state = %current, force, topic, "door state published");
                Ok(true)
            }
            Err(e) => {
                warn!(state = %current, force, error = ?e, "door state publish failed");
                Err(e)
            }
        }
    }
}

/// Door-state publisher shared by the control loop and the MQTT session.
///
/// # Thread Safety
///
/// Wraps the MQTT client and `LastPublished` in a single `Mutex`. The
/// control loop publishes on change, the session task force-publishes on
/// connect, and the lock serializes the two.
#[derive(Debug)]
pub struct StatePublisher<C> {
    inner: Mutex<PublisherInner<C>>,
    topic: String,
}

impl<C: MqttClient> StatePublisher<C> {
    /// Create a publisher that has not published anything yet.
    pub fn new(client: C, topic: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(PublisherInner {
                client,
                last_published: None,
            }),
            topic: topic.into(),
        }
    }

    /// Publish `current` if `force` or if it differs from the last published
    /// value.
    ///
    /// Returns `Ok(true)` when a publish was made and `Ok(false)` when it was
    /// skipped. On error the last published value is left unchanged, so the
    /// next change or forced publish retries.
    pub fn maybe_publish(&self, current: DoorState, force: bool) -> Result<bool, C::Error> {
        self.lock().publish(&self.topic, current, force)
    }

    /// Like [`maybe_publish`](Self::maybe_publish), but reads the state from
    /// `door` while holding the publisher lock, so the value sent is the
    /// latest one at publish time.
    pub fn publish_current(&self, door: &DoorStateCell, force: bool) -> Result<bool, C::Error> {
        let mut inner = self.lock();
        let current = door.get();
        inner.publish(&self.topic, current, force)
    }

    /// Last value that reached the client, `None` before the first publish.
    pub fn last_published(&self) -> Option<DoorState> {
        self.lock().last_published
    }

    /// Run `f` with exclusive access to the client.
    pub fn with_client<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut C) -> R,
    {
        f(&mut self.lock().client)
    }

    /// State topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn lock(&self) -> MutexGuard<'_, PublisherInner<C>> {
        // The inner state stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
