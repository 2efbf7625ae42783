//! Debounced edge sensor for the reed switch.
//!
//! Raw edges arrive from the GPIO interrupt thread in either direction. A
//! magnetic reed switch chatters while the door moves, so after an edge is
//! accepted every further edge within the debounce window is dropped.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use garage_door::{DebouncedSensor, DoorState, DoorStateCell};
//!
//! let door = Arc::new(DoorStateCell::new(DoorState::Open));
//! let sensor = DebouncedSensor::new(Arc::clone(&door), 2000);
//!
//! // Door closes: falling edge accepted
//! assert_eq!(sensor.on_raw_edge(false, 10_000), Some(DoorState::Closed));
//!
//! // Bounce 200ms later is ignored
//! assert_eq!(sensor.on_raw_edge(true, 10_200), None);
//! assert_eq!(door.get(), DoorState::Closed);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::door::{DoorState, DoorStateCell};

/// Sentinel for "no edge accepted yet".
const NEVER: u64 = 0;

/// Converts raw switch edges into validated [`DoorState`] transitions.
///
/// # Thread Safety
///
/// `on_raw_edge` is called from the interrupt context. It does one atomic
/// load, one compare-exchange and one atomic store, and never blocks or
/// touches the network. The control loop observes the new state on its next
/// poll.
#[derive(Debug)]
pub struct DebouncedSensor {
    door: Arc<DoorStateCell>,
    debounce_ms: u64,
    /// Timestamp of the last accepted edge plus one, or [`NEVER`].
    last_accepted: AtomicU64,
}

impl DebouncedSensor {
    /// Create a sensor writing into `door`, ignoring edges for `debounce_ms`
    /// after each accepted one.
    ///
    /// The window starts closed: the first edge is always accepted.
    pub fn new(door: Arc<DoorStateCell>, debounce_ms: u32) -> Self {
        Self {
            door,
            debounce_ms: u64::from(debounce_ms),
            last_accepted: AtomicU64::new(NEVER),
        }
    }

    /// Handle a raw edge. `high` is the level after the edge.
    ///
    /// Returns the accepted state, or `None` if the edge fell inside the
    /// debounce window. A timestamp older than the last accepted edge is
    /// treated as zero elapsed time.
    pub fn on_raw_edge(&self, high: bool, timestamp_ms: u64) -> Option<DoorState> {
        let last = self.last_accepted.load(Ordering::Acquire);
        if last != NEVER && timestamp_ms.saturating_sub(last - 1) < self.debounce_ms {
            trace!(high, timestamp_ms, "edge ignored inside debounce window");
            return None;
        }

        // Another edge may have been accepted since the load.
        self.last_accepted
            .compare_exchange(
                last,
                timestamp_ms.saturating_add(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()?;

        let state = DoorState::from_level(high);
        let previous = self.door.set(state);
        debug!(%state, %previous, timestamp_ms, "edge accepted");
        Some(state)
    }

    /// Shared cell this sensor writes to.
    pub fn door(&self) -> &Arc<DoorStateCell> {
        &self.door
    }

    /// Configured debounce window in milliseconds.
    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }

    /// Timestamp of the last accepted edge, if any.
    pub fn last_accepted_ms(&self) -> Option<u64> {
        match self.last_accepted.load(Ordering::Acquire) {
            NEVER => None,
            stamp => Some(stamp - 1),
        }
    }
}
