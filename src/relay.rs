//! Remote command relay.
//!
//! Turns `open`/`close` messages on the remote topic into a single pending
//! pulse request for the control loop. The spare remote wired to the relay
//! output toggles the opener, so both commands map to the same pulse.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

/// A recognized remote command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RemoteCommand {
    /// `"open"` payload.
    Open,
    /// `"close"` payload.
    Close,
}

impl RemoteCommand {
    /// Decode a payload. Must be UTF-8 and exactly `open` or `close`.
    ///
    /// # Examples
    ///
    /// ```
    /// use garage_door::RemoteCommand;
    ///
    /// assert_eq!(RemoteCommand::from_payload(b"open"), Some(RemoteCommand::Open));
    /// assert_eq!(RemoteCommand::from_payload(b"close"), Some(RemoteCommand::Close));
    ///
    /// assert_eq!(RemoteCommand::from_payload(b"OPEN"), None);
    /// assert_eq!(RemoteCommand::from_payload(b" open"), None);
    /// assert_eq!(RemoteCommand::from_payload(b"closed"), None);
    /// ```
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        match std::str::from_utf8(payload).ok()? {
            "open" => Some(RemoteCommand::Open),
            "close" => Some(RemoteCommand::Close),
            _ => None,
        }
    }

    /// The payload text for this command.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RemoteCommand::Open => "open",
            RemoteCommand::Close => "close",
        }
    }
}

/// Pending-pulse flag fed by inbound MQTT messages.
///
/// Written from the MQTT session task, drained by the control loop. The flag
/// is a trigger, not a counter: any number of commands received before the
/// control loop takes the flag produce one pulse.
#[derive(Debug)]
pub struct CommandRelay {
    remote_topic: String,
    pending: AtomicBool,
}

impl CommandRelay {
    /// Create a relay listening for commands on `remote_topic`.
    pub fn new(remote_topic: impl Into<String>) -> Self {
        Self {
            remote_topic: remote_topic.into(),
            pending: AtomicBool::new(false),
        }
    }

    /// Handle an inbound message.
    ///
    /// Returns the command if the message was a recognized trigger on the
    /// remote topic. Anything else is ignored.
    pub fn on_inbound_message(&self, topic: &str, payload: &[u8]) -> Option<RemoteCommand> {
        if topic != self.remote_topic {
            return None;
        }

        let Some(command) = RemoteCommand::from_payload(payload) else {
            debug!(
                topic,
                payload = %String::from_utf8_lossy(payload),
                "ignoring unrecognized remote payload"
            );
            return None;
        };

        let already_pending = self.pending.swap(true, Ordering::AcqRel);
        info!(command = command.as_str(), already_pending, "remote pressed");
        Some(command)
    }

    /// Take the pending flag, clearing it. Returns `true` if a pulse was
    /// requested since the last take.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Whether a pulse is currently requested, without clearing it.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Topic this relay accepts commands on.
    pub fn remote_topic(&self) -> &str {
        &self.remote_topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REMOTE: &str = "garage/remote";

    #[test]
    fn open_and_close_both_request_pulse() {
        let relay = CommandRelay::new(REMOTE);

        assert_eq!(
            relay.on_inbound_message(REMOTE, b"open"),
            Some(RemoteCommand::Open)
        );
        assert!(relay.take_pending());

        assert_eq!(
            relay.on_inbound_message(REMOTE, b"close"),
            Some(RemoteCommand::Close)
        );
        assert!(relay.take_pending());
    }

    #[test]
    fn other_topics_are_ignored() {
        let relay = CommandRelay::new(REMOTE);

        assert_eq!(relay.on_inbound_message("garage/door", b"open"), None);
        assert_eq!(relay.on_inbound_message("garage/remote/x", b"open"), None);
        assert!(!relay.is_pending());
    }

    #[test]
    fn unrecognized_payloads_are_ignored() {
        let relay = CommandRelay::new(REMOTE);

        let payloads: [&[u8]; 6] = [b"Open", b"closed", b"", b"toggle", b"open\n", &[0xff, 0x00]];
        for payload in payloads {
            assert_eq!(relay.on_inbound_message(REMOTE, payload), None);
        }
        assert!(!relay.is_pending());
    }

    #[test]
    fn repeated_commands_collapse_into_one_pulse() {
        let relay = CommandRelay::new(REMOTE);

        relay.on_inbound_message(REMOTE, b"open");
        relay.on_inbound_message(REMOTE, b"close");
        relay.on_inbound_message(REMOTE, b"open");

        assert!(relay.take_pending());
        assert!(!relay.take_pending());
    }

    #[test]
    fn command_after_take_queues_again() {
        let relay = CommandRelay::new(REMOTE);

        relay.on_inbound_message(REMOTE, b"open");
        assert!(relay.take_pending());

        relay.on_inbound_message(REMOTE, b"open");
        assert!(relay.is_pending());
        assert!(relay.take_pending());
        assert!(!relay.is_pending());
    }

    #[test]
    fn command_strings() {
        assert_eq!(RemoteCommand::Open.as_str(), "open");
        assert_eq!(RemoteCommand::Close.as_str(), "close");
    }
}
