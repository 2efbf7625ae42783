//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware and network traits,
//! enabling development and testing on desktop without a Raspberry Pi or a
//! broker.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockSwitch`] | [`SwitchInput`] | Settable level, optional read failure |
//! | [`MockRelay`] | [`RelayOutput`] | Records every level written |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockDelay`] | [`Delay`] | Records delays instead of sleeping |
//! | [`MockMqtt`] | [`MqttClient`] | Captures pub/sub operations |
//!
//! # Example
//!
//! ```rust
//! use garage_door::hal::{MockMqtt, MockRelay};
//! use garage_door::traits::{MqttClient, QoS, RelayOutput};
//!
//! let mut relay = MockRelay::new();
//! relay.set_high().unwrap();
//! assert!(relay.level);
//!
//! let mut mqtt = MockMqtt::new();
//! mqtt.publish("garage/door", b"open", QoS::ExactlyOnce, true).unwrap();
//! assert_eq!(mqtt.payloads_to("garage/door"), vec!["open"]);
//! ```
//!
//! [`SwitchInput`]: crate::traits::SwitchInput
//! [`RelayOutput`]: crate::traits::RelayOutput
//! [`Clock`]: crate::traits::Clock
//! [`Delay`]: crate::traits::Delay
//! [`MqttClient`]: crate::traits::MqttClient

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::traits::{Clock, Delay, MqttClient, QoS, RelayOutput, SwitchInput};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// Mock reed switch input.
///
/// # Example
///
/// ```rust
/// use garage_door::hal::MockSwitch;
/// use garage_door::traits::SwitchInput;
///
/// let mut switch = MockSwitch::new(false);
/// assert_eq!(switch.is_high(), Ok(false));
///
/// switch.level = true;
/// assert_eq!(switch.is_high(), Ok(true));
///
/// assert!(MockSwitch::new(true).failing().is_high().is_err());
/// ```
#[derive(Debug, Default, Clone)]
pub struct MockSwitch {
    /// Current logic level (`true` = high = door open).
    pub level: bool,
    /// When set, every read fails.
    pub fail: bool,
}

impl MockSwitch {
    /// Creates a switch reading `level`.
    pub fn new(level: bool) -> Self {
        Self { level, fail: false }
    }

    /// Makes every read fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl SwitchInput for MockSwitch {
    type Error = ();

    fn is_high(&self) -> Result<bool, ()> {
        if self.fail {
            Err(())
        } else {
            Ok(self.level)
        }
    }
}

/// Mock relay output.
///
/// Records all levels written, in order, for verification.
#[derive(Debug, Default, Clone)]
pub struct MockRelay {
    /// Current output level.
    pub level: bool,
    /// Every level written, oldest first.
    pub history: Vec<bool>,
    /// When set, every write fails and leaves the level unchanged.
    pub fail: bool,
}

impl MockRelay {
    /// Creates a relay output that starts low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn write(&mut self, level: bool) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.level = level;
        self.history.push(level);
        Ok(())
    }
}

impl RelayOutput for MockRelay {
    type Error = ();

    fn set_high(&mut self) -> Result<(), ()> {
        self.write(true)
    }

    fn set_low(&mut self) -> Result<(), ()> {
        self.write(false)
    }
}

/// Mock clock for testing.
///
/// Provides a controllable time source for testing time-dependent behavior.
///
/// # Example
///
/// ```rust
/// use garage_door::hal::MockClock;
/// use garage_door::traits::Clock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self { current_ms: 0 }
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

/// Mock delay that records requested durations instead of sleeping.
///
/// Can raise a shutdown flag after a number of calls, which is how tests
/// stop [`ControlLoop::run`](crate::control::ControlLoop::run).
#[derive(Debug, Default)]
pub struct MockDelay {
    /// Every delay requested, in milliseconds.
    pub calls: Vec<u32>,
    stop_after: Option<(usize, Arc<AtomicBool>)>,
}

impl MockDelay {
    /// Creates a delay with no recorded calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `flag` once `calls` delays have been recorded.
    pub fn stop_after(mut self, calls: usize, flag: Arc<AtomicBool>) -> Self {
        self.stop_after = Some((calls, flag));
        self
    }
}

impl Delay for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.calls.push(ms);
        if let Some((limit, flag)) = &self.stop_after {
            if self.calls.len() >= *limit {
                flag.store(true, Ordering::Release);
            }
        }
    }
}

// ============================================================================
// Network Mocks
// ============================================================================

/// Mock MQTT client for testing.
///
/// Records all publish/subscribe operations. Failures can be switched on
/// to simulate a broker outage.
#[derive(Debug, Default, Clone)]
pub struct MockMqtt {
    /// Messages that have been published (topic, payload, qos, retain).
    pub published: Vec<(String, Vec<u8>, QoS, bool)>,
    /// Topics that have been subscribed to.
    pub subscriptions: Vec<(String, QoS)>,
    /// When set, `publish` fails without recording.
    pub fail_publish: bool,
    /// When set, `subscribe` fails without recording.
    pub fail_subscribe: bool,
}

impl MockMqtt {
    /// Creates a new mock MQTT client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a topic was subscribed to
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|(t, _)| t == topic)
    }

    /// Payloads published to `topic`, as text, oldest first.
    pub fn payloads_to(&self, topic: &str) -> Vec<String> {
        self.published
            .iter()
            .filter(|(t, ..)| t == topic)
            .map(|(_, payload, ..)| String::from_utf8_lossy(payload).into_owned())
            .collect()
    }
}

impl MqttClient for MockMqtt {
    type Error = ();

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), ()> {
        if self.fail_publish {
            return Err(());
        }
        self.published
            .push((topic.into(), payload.to_vec(), qos, retain));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), ()> {
        if self.fail_subscribe {
            return Err(());
        }
        self.subscriptions.push((topic.into(), qos));
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
