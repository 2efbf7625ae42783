//! Door state and its shared, lock-free container.
//!
//! [`DoorState`] is the only fact this crate tracks about the door.
//! [`DoorStateCell`] holds it behind an atomic so the interrupt context can
//! write it without blocking while the control loop and MQTT session read it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::traits::SwitchInput;

/// Physical position of the garage door as reported by the reed switch.
///
/// # Wiring
///
/// The switch is normally-open with a pull-up resistor: a closed door closes
/// the circuit and pulls the input low, an open door lets it float high.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DoorState {
    /// Door is open (input high).
    Open,
    /// Door is closed (input low).
    Closed,
}

impl DoorState {
    /// Map a logic level to a door state. High is open, low is closed.
    ///
    /// # Examples
    ///
    /// ```
    /// use garage_door::DoorState;
    ///
    /// assert_eq!(DoorState::from_level(true), DoorState::Open);
    /// assert_eq!(DoorState::from_level(false), DoorState::Closed);
    /// ```
    #[inline]
    pub const fn from_level(high: bool) -> Self {
        if high {
            DoorState::Open
        } else {
            DoorState::Closed
        }
    }

    /// Read the switch synchronously and derive the state from its level.
    ///
    /// Used once at startup, since the door may already be in either
    /// position before any edge arrives.
    pub fn read_from<S: SwitchInput>(switch: &S) -> Result<Self, S::Error> {
        switch.is_high().map(Self::from_level)
    }

    /// Payload published on the state topic.
    ///
    /// # Examples
    ///
    /// ```
    /// use garage_door::DoorState;
    ///
    /// assert_eq!(DoorState::Open.as_str(), "open");
    /// assert_eq!(DoorState::Closed.as_str(), "closed");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DoorState::Open => "open",
            DoorState::Closed => "closed",
        }
    }

    /// Returns `true` for [`DoorState::Open`].
    #[inline]
    pub const fn is_open(&self) -> bool {
        matches!(self, DoorState::Open)
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic holder for the current [`DoorState`].
///
/// Shared via `Arc` between the edge interrupt (writer), the control loop
/// and the MQTT session (readers). Reads and writes never block.
#[derive(Debug)]
pub struct DoorStateCell {
    open: AtomicBool,
}

impl DoorStateCell {
    /// Create a cell holding `initial`.
    pub fn new(initial: DoorState) -> Self {
        Self {
            open: AtomicBool::new(initial.is_open()),
        }
    }

    /// Current door state.
    #[inline]
    pub fn get(&self) -> DoorState {
        DoorState::from_level(self.open.load(Ordering::Acquire))
    }

    /// Store a new state, returning the previous one.
    #[inline]
    pub fn set(&self, state: DoorState) -> DoorState {
        DoorState::from_level(self.open.swap(state.is_open(), Ordering::AcqRel))
    }
}
