//! Hardware abstraction traits for the reed switch, the remote relay, and time.
//!
//! These traits let the door logic run against real GPIO on a Raspberry Pi
//! or against the mocks in [`crate::hal::mock`] on a desktop.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`SwitchInput`] | Reed switch digital input (pull-up wired) |
//! | [`RelayOutput`] | Digital output wired across the spare remote's button |
//! | [`Clock`] | Millisecond time source for debounce timestamps |
//! | [`Delay`] | Blocking delay used for the pulse and poll interval |
//!
//! # Example
//!
//! ```rust
//! use garage_door::hal::{MockRelay, MockSwitch};
//! use garage_door::traits::{RelayOutput, SwitchInput};
//!
//! let switch = MockSwitch::new(true);
//! assert!(switch.is_high().unwrap());
//!
//! let mut relay = MockRelay::new();
//! relay.set_high().unwrap();
//! relay.set_low().unwrap();
//! assert_eq!(relay.history, vec![true, false]);
//! ```

use std::fmt::Debug;

/// Digital input connected to the door's reed switch.
///
/// The switch is normally-open and wired with a pull-up, so the input reads
/// high while the door is open and low once the magnet closes the circuit.
///
/// Edge notification is not part of this trait: platforms deliver edges to
/// [`DebouncedSensor::on_raw_edge`](crate::sensor::DebouncedSensor::on_raw_edge)
/// from their own interrupt context. This trait only covers the synchronous
/// read used to establish the initial state.
pub trait SwitchInput {
    /// Error type for pin reads.
    type Error: Debug;

    /// Read the current logic level. `true` means high.
    fn is_high(&self) -> Result<bool, Self::Error>;
}

/// Digital output that "presses" the garage remote's button while high.
///
/// # Implementation Notes
///
/// - The output must start low.
/// - Implementations should leave the pin low when dropped.
pub trait RelayOutput {
    /// Error type for pin writes.
    type Error: Debug;

    /// Drive the output high (button pressed).
    fn set_high(&mut self) -> Result<(), Self::Error>;

    /// Drive the output low (button released).
    fn set_low(&mut self) -> Result<(), Self::Error>;
}

/// Monotonic clock trait.
///
/// Timestamps passed to the debounced sensor come from this clock, so mocks
/// can replay exact edge timings.
pub trait Clock {
    /// Get current time in milliseconds since an arbitrary fixed epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}

/// Blocking delay.
///
/// Only the control loop calls this; it must never be used from the
/// interrupt context.
pub trait Delay {
    /// Block the calling thread for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}
