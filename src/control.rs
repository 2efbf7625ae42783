//! The control loop: drives the remote relay and forwards door changes.
//!
//! Each iteration has two phases:
//!
//! 1. If a remote command is pending, pulse the relay output for the
//!    configured duration.
//! 2. If the door state differs from the last value seen by the loop,
//!    publish it (non-forced).
//!
//! Between iterations the loop sleeps the poll interval. Edges that arrive
//! while the loop is pulsing or sleeping are still captured by the
//! [`DebouncedSensor`](crate::sensor::DebouncedSensor) and picked up on the
//! next iteration. Several flips inside one interval coalesce into the final
//! state.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use garage_door::{CommandRelay, ControlLoop, DoorState, DoorStateCell, StatePublisher};
//! use garage_door::hal::{MockDelay, MockMqtt, MockRelay};
//!
//! let door = Arc::new(DoorStateCell::new(DoorState::Closed));
//! let relay = Arc::new(CommandRelay::new("garage/remote"));
//! let publisher = Arc::new(StatePublisher::new(MockMqtt::new(), "garage/door"));
//!
//! let mut control = ControlLoop::new(
//!     MockRelay::new(),
//!     MockDelay::new(),
//!     Arc::clone(&door),
//!     Arc::clone(&relay),
//!     Arc::clone(&publisher),
//! );
//!
//! relay.on_inbound_message("garage/remote", b"open");
//! let tick = control.step().unwrap();
//! assert!(tick.pulsed);
//! assert_eq!(control.relay().history, vec![true, false]);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::TimingConfig;
use crate::door::{DoorState, DoorStateCell};
use crate::error::ControlError;
use crate::publisher::StatePublisher;
use crate::relay::CommandRelay;
use crate::traits::{Delay, MqttClient, RelayOutput};

/// What happened during one [`ControlLoop::step`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tick {
    /// A relay pulse was executed.
    pub pulsed: bool,
    /// The door state changed since the previous step, with the new value.
    pub changed: Option<DoorState>,
}

/// Top-level coordinator owning the relay output pin.
///
/// Runs on its own thread. It is the only context that blocks (for the
/// relay pulse and the poll sleep).
pub struct ControlLoop<R, D, C>
where
    R: RelayOutput,
    D: Delay,
    C: MqttClient,
{
    relay_out: R,
    delay: D,
    door: Arc<DoorStateCell>,
    commands: Arc<CommandRelay>,
    publisher: Arc<StatePublisher<C>>,
    /// Door state as of the previous step.
    last_seen: DoorState,
    timing: TimingConfig,
    shutdown: Arc<AtomicBool>,
}

impl<R, D, C> ControlLoop<R, D, C>
where
    R: RelayOutput,
    D: Delay,
    C: MqttClient,
{
    /// Create a control loop with default timings.
    ///
    /// The cached last-seen state starts at the door's current value, so the
    /// startup state is not published here. The session's forced publish on
    /// connect covers it.
    pub fn new(
        relay_out: R,
        delay: D,
        door: Arc<DoorStateCell>,
        commands: Arc<CommandRelay>,
        publisher: Arc<StatePublisher<C>>,
    ) -> Self {
        let last_seen = door.get();
        Self {
            relay_out,
            delay,
            door,
            commands,
            publisher,
            last_seen,
            timing: TimingConfig::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use the given pulse and poll timings.
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Use an externally owned shutdown flag.
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Flag that stops [`run`](Self::run) when set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Get a reference to the relay output.
    pub fn relay(&self) -> &R {
        &self.relay_out
    }

    /// Get a reference to the delay provider.
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Door state as of the last step.
    pub fn last_seen(&self) -> DoorState {
        self.last_seen
    }

    /// Run one iteration without the trailing poll sleep.
    ///
    /// A relay error aborts the step. Publish errors do not: they are logged
    /// and the cached state is updated anyway, so the next genuine change is
    /// still attempted.
    pub fn step(&mut self) -> Result<Tick, ControlError> {
        let mut tick = Tick::default();

        // The flag is taken before pulsing so a command received mid-pulse
        // yields exactly one more pulse.
        if self.commands.take_pending() {
            self.pulse()?;
            tick.pulsed = true;
        }

        let current = self.door.get();
        if current != self.last_seen {
            info!(state = %current, previous = %self.last_seen, "door {}", current.as_str().to_uppercase());
            if let Err(e) = self.publisher.publish_current(&self.door, false) {
                warn!(error = ?e, "state change not published; waiting for next change or reconnect");
            }
            self.last_seen = current;
            tick.changed = Some(current);
        }

        Ok(tick)
    }

    /// Loop until the shutdown flag is set or the relay fails.
    ///
    /// Shutdown is honored between phases only, so a pulse in progress always
    /// finishes. On exit the relay output is driven low.
    pub fn run(&mut self) -> Result<(), ControlError> {
        info!(
            pulse_ms = self.timing.pulse_ms,
            poll_interval_ms = self.timing.poll_interval_ms,
            state = %self.last_seen,
            "control loop started"
        );

        let result = loop {
            if self.shutdown.load(Ordering::Acquire) {
                break Ok(());
            }
            if let Err(e) = self.step() {
                error!(error = %e, "hardware failure, stopping control loop");
                break Err(e);
            }
            if self.shutdown.load(Ordering::Acquire) {
                break Ok(());
            }
            self.delay.delay_ms(self.timing.poll_interval_ms);
        };

        let released = self.relay_out.set_low().map_err(ControlError::relay);
        info!("control loop stopped, relay released");
        result.and(released)
    }

    fn pulse(&mut self) -> Result<(), ControlError> {
        info!(pulse_ms = self.timing.pulse_ms, "pressing remote");
        self.relay_out.set_high().map_err(ControlError::relay)?;
        self.delay.delay_ms(self.timing.pulse_ms);
        self.relay_out.set_low().map_err(ControlError::relay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockDelay, MockMqtt, MockRelay};

    const REMOTE: &str = "garage/remote";
    const DOOR: &str = "garage/door";

    struct Fixture {
        door: Arc<DoorStateCell>,
        commands: Arc<CommandRelay>,
        publisher: Arc<StatePublisher<MockMqtt>>,
        control: ControlLoop<MockRelay, MockDelay, MockMqtt>,
    }

    fn setup(initial: DoorState) -> Fixture {
        let door = Arc::new(DoorStateCell::new(initial));
        let commands = Arc::new(CommandRelay::new(REMOTE));
        let publisher = Arc::new(StatePublisher::new(MockMqtt::new(), DOOR));
        let control = ControlLoop::new(
            MockRelay::new(),
            MockDelay::new(),
            Arc::clone(&door),
            Arc::clone(&commands),
            Arc::clone(&publisher),
        );
        Fixture {
            door,
            commands,
            publisher,
            control,
        }
    }

    // ========================================================================
    // Pulse phase
    // ========================================================================

    #[test]
    fn idle_step_does_nothing() {
        let mut f = setup(DoorState::Closed);

        assert_eq!(f.control.step().unwrap(), Tick::default());
        assert!(f.control.relay().history.is_empty());
        assert!(f.control.delay().calls.is_empty());
        assert_eq!(f.publisher.with_client(|c| c.published.len()), 0);
    }

    #[test]
    fn pending_command_pulses_relay() {
        let mut f = setup(DoorState::Closed);
        f.commands.on_inbound_message(REMOTE, b"close");

        let tick = f.control.step().unwrap();

        assert!(tick.pulsed);
        assert_eq!(f.control.relay().history, vec![true, false]);
        assert_eq!(f.control.delay().calls, vec![1500]);
        assert!(!f.commands.is_pending());
    }

    #[test]
    fn pulse_uses_configured_duration() {
        let mut f = setup(DoorState::Closed);
        f.control = f
            .control
            .with_timing(TimingConfig::default().with_pulse_ms(400));
        f.commands.on_inbound_message(REMOTE, b"open");

        f.control.step().unwrap();
        assert_eq!(f.control.delay().calls, vec![400]);
    }

    #[test]
    fn relay_failure_is_fatal() {
        let mut f = setup(DoorState::Closed);
        f.control = ControlLoop::new(
            MockRelay::new().failing(),
            MockDelay::new(),
            Arc::clone(&f.door),
            Arc::clone(&f.commands),
            Arc::clone(&f.publisher),
        );
        f.commands.on_inbound_message(REMOTE, b"open");

        assert!(matches!(f.control.step(), Err(ControlError::Relay(_))));
    }

    // ========================================================================
    // Publish phase
    // ========================================================================

    #[test]
    fn door_change_is_published_once() {
        let mut f = setup(DoorState::Open);
        f.door.set(DoorState::Closed);

        let tick = f.control.step().unwrap();
        assert_eq!(tick.changed, Some(DoorState::Closed));
        assert_eq!(f.control.last_seen(), DoorState::Closed);

        let tick = f.control.step().unwrap();
        assert_eq!(tick.changed, None);

        assert_eq!(f.publisher.with_client(|c| c.payloads_to(DOOR)), vec!["closed"]);
    }

    #[test]
    fn flips_within_one_interval_coalesce() {
        let mut f = setup(DoorState::Open);
        f.door.set(DoorState::Closed);
        f.door.set(DoorState::Open);

        assert_eq!(f.control.step().unwrap().changed, None);
        assert_eq!(f.publisher.with_client(|c| c.published.len()), 0);
    }

    #[test]
    fn publish_failure_still_updates_cache() {
        let mut f = setup(DoorState::Open);
        f.publisher.with_client(|c| c.fail_publish = true);
        f.door.set(DoorState::Closed);

        let tick = f.control.step().unwrap();
        assert_eq!(tick.changed, Some(DoorState::Closed));
        assert_eq!(f.control.last_seen(), DoorState::Closed);
        assert_eq!(f.publisher.last_published(), None);

        // No retry on the next poll
        f.publisher.with_client(|c| c.fail_publish = false);
        f.control.step().unwrap();
        assert_eq!(f.publisher.with_client(|c| c.published.len()), 0);
    }

    // ========================================================================
    // Run / shutdown
    // ========================================================================

    #[test]
    fn run_exits_immediately_when_already_shut_down() {
        let mut f = setup(DoorState::Closed);
        f.control.shutdown_handle().store(true, Ordering::Release);
        f.commands.on_inbound_message(REMOTE, b"open");

        f.control.run().unwrap();

        // Relay released, no pulse started
        assert_eq!(f.control.relay().history, vec![false]);
        assert!(f.commands.is_pending());
    }

    #[test]
    fn run_sleeps_poll_interval_until_shutdown() {
        let mut f = setup(DoorState::Closed);
        let shutdown = f.control.shutdown_handle();
        f.control = ControlLoop::new(
            MockRelay::new(),
            MockDelay::new().stop_after(3, Arc::clone(&shutdown)),
            Arc::clone(&f.door),
            Arc::clone(&f.commands),
            Arc::clone(&f.publisher),
        )
        .with_shutdown(shutdown);

        f.control.run().unwrap();

        assert_eq!(f.control.delay().calls, vec![1000, 1000, 1000]);
        assert_eq!(f.control.relay().history, vec![false]);
    }

    #[test]
    fn shutdown_during_pulse_finishes_pulse_then_exits() {
        let mut f = setup(DoorState::Closed);
        let shutdown = f.control.shutdown_handle();
        // The pulse delay is the first delay call, so shutdown lands mid-pulse
        f.control = ControlLoop::new(
            MockRelay::new(),
            MockDelay::new().stop_after(1, Arc::clone(&shutdown)),
            Arc::clone(&f.door),
            Arc::clone(&f.commands),
            Arc::clone(&f.publisher),
        )
        .with_shutdown(shutdown);
        f.commands.on_inbound_message(REMOTE, b"open");

        f.control.run().unwrap();

        // Pulse completed, then the exit release; no poll sleep or second pass
        assert_eq!(f.control.relay().history, vec![true, false, false]);
        assert_eq!(f.control.delay().calls, vec![1500]);
        assert!(!f.commands.is_pending());
    }

    #[test]
    fn run_returns_relay_error() {
        let mut f = setup(DoorState::Closed);
        f.control = ControlLoop::new(
            MockRelay::new().failing(),
            MockDelay::new(),
            Arc::clone(&f.door),
            Arc::clone(&f.commands),
            Arc::clone(&f.publisher),
        );
        f.commands.on_inbound_message(REMOTE, b"open");

        assert!(matches!(f.control.run(), Err(ControlError::Relay(_))));
    }
}
