//! MQTT session runtime on `rumqttc` and tokio.
//!
//! [`RumqttClient`] adapts `rumqttc::AsyncClient` to the sync
//! [`MqttClient`] trait using its non-blocking `try_*` calls, so the
//! control loop thread can publish without an async context.
//!
//! [`run_event_loop`] drives the connection: it polls the rumqttc event
//! loop forever, hands each event to [`dispatch_event`], and backs off
//! between failed polls. rumqttc reconnects on the next poll after an
//! error, and every successful `ConnAck` re-runs the subscribe and forced
//! publish sequence.
//!
//! **Publish Topics:**
//! - `garage/door` - `"open"` / `"closed"` (retained, QoS 2)
//!
//! **Subscribe Topics:**
//! - `garage/door` - own retained state (ignored on receipt)
//! - `garage/remote` - `"open"` / `"close"` triggers a relay pulse
//!
//! # Example
//!
//! ```ignore
//! let (client, eventloop) = connect(&config.mqtt);
//! let publisher = Arc::new(StatePublisher::new(RumqttClient::new(client.clone()), STATE_TOPIC));
//! let session = Arc::new(SessionHandler::new(publisher, relay, door, config.topics.clone()));
//! tokio::spawn(run_event_loop(eventloop, session));
//! ```

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, ClientError, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MqttConfig;
use crate::session::SessionHandler;
use crate::traits::{MqttClient, QoS};

/// Capacity of the request channel between clients and the event loop.
///
/// Sized for one connect sequence (two subscribes, one publish) plus a
/// burst of state changes while disconnected.
const REQUEST_CAPACITY: usize = 32;

/// First retry delay after a connection error.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound for the retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

// ============================================================================
// Client adapter
// ============================================================================

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// [`MqttClient`] over a cloned `rumqttc::AsyncClient`.
///
/// Requests are queued to the event loop without waiting. An error means
/// the queue is full or the event loop is gone.
#[derive(Clone, Debug)]
pub struct RumqttClient {
    client: AsyncClient,
}

impl RumqttClient {
    /// Wrap an async client.
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }

    /// The wrapped async client (for disconnect on shutdown).
    pub fn inner(&self) -> &AsyncClient {
        &self.client
    }
}

impl MqttClient for RumqttClient {
    type Error = ClientError;

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), ClientError> {
        self.client
            .try_publish(topic, qos.into(), retain, payload.to_vec())
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), ClientError> {
        self.client.try_subscribe(topic, qos.into())
    }
}

/// Build the rumqttc client and event loop for `config`.
///
/// Nothing touches the network until the event loop is polled.
pub fn connect(config: &MqttConfig) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(
        config.client_id.as_str(),
        config.host.as_str(),
        config.port,
    );
    options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));
    if config.has_auth() {
        options.set_credentials(config.username.as_str(), config.password.as_str());
    }

    AsyncClient::new(options, REQUEST_CAPACITY)
}

// ============================================================================
// Event dispatch
// ============================================================================

/// What [`dispatch_event`] did with an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Connection accepted; subscribe and forced publish were attempted.
    Connected,
    /// Broker refused the connection.
    Refused,
    /// Inbound publish delivered to the session.
    Message,
    /// Anything else.
    Ignored,
}

/// Route one rumqttc event into the session handler.
///
/// A connect sequence that could not be queued in full (the request channel
/// fills up while the broker is unreachable) is retried on every later event
/// of the same connection, until it goes through.
pub fn dispatch_event<C: MqttClient>(session: &SessionHandler<C>, event: &Event) -> Dispatch {
    let dispatch = match event {
        Event::Incoming(Packet::ConnAck(ack)) => {
            if ack.code != ConnectReturnCode::Success {
                warn!(code = ?ack.code, "broker refused connection");
                return Dispatch::Refused;
            }
            info!(code = ?ack.code, session_present = ack.session_present, "connected to broker");
            if let Err(e) = session.on_connected() {
                warn!(error = ?e, "connect sequence incomplete; retrying on next event");
            }
            return Dispatch::Connected;
        }
        Event::Incoming(Packet::Publish(publish)) => {
            session.on_message(&publish.topic, &publish.payload);
            Dispatch::Message
        }
        _ => Dispatch::Ignored,
    };

    match session.retry_sync() {
        Some(Ok(())) => info!("connect sequence completed on retry"),
        Some(Err(e)) => debug!(error = ?e, "connect sequence still incomplete"),
        None => {}
    }
    dispatch
}

/// Poll the event loop forever.
///
/// Connection errors are logged and retried after an exponential backoff
/// that resets once a connection is accepted. Cancel by aborting the task.
pub async fn run_event_loop<C: MqttClient>(mut eventloop: EventLoop, session: Arc<SessionHandler<C>>) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match eventloop.poll().await {
            Ok(event) => {
                if dispatch_event(&session, &event) == Dispatch::Connected {
                    backoff = INITIAL_BACKOFF;
                }
            }
            Err(e) => {
                warn!(error = %e, retry_in = ?backoff, "MQTT connection error");
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
            }
        }
    }
}

/// Queue a disconnect, give the event loop task `grace` to send it, then
/// abort the task.
///
/// Returns `true` if the task stopped on its own within the grace period.
pub async fn disconnect(client: &AsyncClient, mut task: JoinHandle<()>, grace: Duration) -> bool {
    if let Err(e) = client.try_disconnect() {
        warn!(error = ?e, "MQTT disconnect not queued");
    }
    let stopped = tokio::time::timeout(grace, &mut task).await.is_ok();
    if !stopped {
        debug!(
            grace_ms = grace.as_millis() as u64,
            "MQTT task still running after disconnect grace period; aborting"
        );
    }
    task.abort();
    stopped
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockMqtt;
    use crate::relay::CommandRelay;
    use crate::{DoorState, DoorStateCell, StatePublisher, Topics};
    use rumqttc::{ConnAck, Publish};

    fn session(initial: DoorState) -> (Arc<CommandRelay>, SessionHandler<MockMqtt>) {
        let relay = Arc::new(CommandRelay::new("garage/remote"));
        let publisher = Arc::new(StatePublisher::new(MockMqtt::new(), "garage/door"));
        let door = Arc::new(DoorStateCell::new(initial));
        let handler = SessionHandler::new(publisher, Arc::clone(&relay), door, Topics::default());
        (relay, handler)
    }

    fn connack(code: ConnectReturnCode) -> Event {
        Event::Incoming(Packet::ConnAck(ConnAck::new(code, false)))
    }

    #[test]
    fn qos_mapping() {
        assert_eq!(rumqttc::QoS::from(QoS::AtMostOnce), rumqttc::QoS::AtMostOnce);
        assert_eq!(rumqttc::QoS::from(QoS::AtLeastOnce), rumqttc::QoS::AtLeastOnce);
        assert_eq!(rumqttc::QoS::from(QoS::ExactlyOnce), rumqttc::QoS::ExactlyOnce);
    }

    #[test]
    fn connack_runs_connect_sequence() {
        let (_relay, handler) = session(DoorState::Open);

        assert_eq!(
            dispatch_event(&handler, &connack(ConnectReturnCode::Success)),
            Dispatch::Connected
        );
        handler.publisher().with_client(|c| {
            assert!(c.is_subscribed("garage/door"));
            assert!(c.is_subscribed("garage/remote"));
            assert_eq!(c.payloads_to("garage/door"), vec!["open"]);
        });
    }

    #[test]
    fn reconnect_republishes() {
        let (_relay, handler) = session(DoorState::Closed);

        dispatch_event(&handler, &connack(ConnectReturnCode::Success));
        dispatch_event(&handler, &Event::Incoming(Packet::PingResp));
        dispatch_event(&handler, &connack(ConnectReturnCode::Success));

        assert_eq!(
            handler.publisher().with_client(|c| c.payloads_to("garage/door")),
            vec!["closed", "closed"]
        );
    }

    #[test]
    fn refused_connack_does_nothing() {
        let (_relay, handler) = session(DoorState::Open);

        assert_eq!(
            dispatch_event(&handler, &connack(ConnectReturnCode::NotAuthorized)),
            Dispatch::Refused
        );
        handler.publisher().with_client(|c| {
            assert!(c.published.is_empty());
            assert!(c.subscriptions.is_empty());
        });
    }

    #[test]
    fn inbound_publish_reaches_relay() {
        let (relay, handler) = session(DoorState::Open);
        let publish = Publish::new("garage/remote", rumqttc::QoS::ExactlyOnce, "close");

        assert_eq!(
            dispatch_event(&handler, &Event::Incoming(Packet::Publish(publish))),
            Dispatch::Message
        );
        assert!(relay.take_pending());
    }

    #[test]
    fn outgoing_events_are_ignored() {
        let (_relay, handler) = session(DoorState::Open);
        let event = Event::Outgoing(rumqttc::Outgoing::PingReq);
        assert_eq!(dispatch_event(&handler, &event), Dispatch::Ignored);
    }

    #[test]
    fn incomplete_connect_sequence_retried_on_later_event() {
        let (_relay, handler) = session(DoorState::Open);
        handler.publisher().with_client(|c| {
            c.fail_subscribe = true;
            c.fail_publish = true;
        });

        assert_eq!(
            dispatch_event(&handler, &connack(ConnectReturnCode::Success)),
            Dispatch::Connected
        );
        assert!(handler.sync_pending());

        handler.publisher().with_client(|c| {
            c.fail_subscribe = false;
            c.fail_publish = false;
        });
        let drained = Event::Outgoing(rumqttc::Outgoing::Publish(1));
        assert_eq!(dispatch_event(&handler, &drained), Dispatch::Ignored);

        assert!(!handler.sync_pending());
        handler.publisher().with_client(|c| {
            assert!(c.is_subscribed("garage/door"));
            assert!(c.is_subscribed("garage/remote"));
            assert_eq!(c.payloads_to("garage/door"), vec!["open"]);
        });
    }

    #[test]
    fn full_request_queue_at_connack_leaves_sync_pending() {
        let config = MqttConfig::default().with_host("127.0.0.1");
        // Never polled, so nothing drains the request channel
        let (client, _eventloop) = connect(&config);
        let door = Arc::new(DoorStateCell::new(DoorState::Closed));
        let publisher = Arc::new(StatePublisher::new(RumqttClient::new(client), "garage/door"));
        let handler = SessionHandler::new(
            Arc::clone(&publisher),
            Arc::new(CommandRelay::new("garage/remote")),
            Arc::clone(&door),
            Topics::default(),
        );

        // Alternating changes while offline fill the queue
        let mut full = false;
        for i in 0..(REQUEST_CAPACITY * 4) {
            door.set(DoorState::from_level(i % 2 == 0));
            if publisher.publish_current(&door, false).is_err() {
                full = true;
                break;
            }
        }
        assert!(full);

        door.set(DoorState::Open);
        assert_eq!(
            dispatch_event(&handler, &connack(ConnectReturnCode::Success)),
            Dispatch::Connected
        );

        // Nothing could be queued: the forced publish stays outstanding
        assert!(handler.sync_pending());
        assert_eq!(handler.retry_sync().map(|r| r.is_err()), Some(true));
        assert!(handler.sync_pending());
    }

    #[tokio::test]
    async fn disconnect_aborts_task_after_grace_period() {
        let (client, _eventloop) = connect(&MqttConfig::default());
        let task = tokio::spawn(std::future::pending::<()>());

        assert!(!disconnect(&client, task, Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn disconnect_reports_task_that_stopped() {
        let (client, _eventloop) = connect(&MqttConfig::default());
        let task = tokio::spawn(async {});

        assert!(disconnect(&client, task, Duration::from_secs(5)).await);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        assert_eq!(next_backoff(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(next_backoff(Duration::from_secs(16)), Duration::from_secs(30));
        assert_eq!(next_backoff(MAX_BACKOFF), MAX_BACKOFF);
    }
}
