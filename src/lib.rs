//! # garage-door
//!
//! A garage door monitor for the Raspberry Pi: a reed switch reports whether
//! the door is open, the state is published to MQTT (retained), and commands
//! on a remote topic pulse a relay wired across a spare opener remote.
//!
//! ## Features
//!
//! - **Debounced sensing**: edges inside a window after an accepted edge are dropped
//! - **Retained state**: `garage/door` always carries the latest `"open"` / `"closed"`
//! - **Remote control**: `"open"` / `"close"` on `garage/remote` presses the button
//! - **Reconnect safe**: every connection re-subscribes and force-publishes
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware and MQTT client abstractions
//! - `door` - Door state and the shared atomic cell
//! - `sensor` - Debounced edge handling (interrupt context)
//! - `relay` - Remote command decoding and the pending-pulse flag
//! - `publisher` - Change-only state publishing
//! - `session` - Connect and inbound message handling
//! - `control` - The blocking loop that pulses the relay and publishes changes
//! - `hal` - Concrete implementations (mock for testing, rppal for hardware)
//! - `services` - rumqttc runtime (requires `mqtt` feature)
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use garage_door::{
//!     CommandRelay, ControlLoop, DebouncedSensor, DoorState, DoorStateCell, StatePublisher,
//!     hal::{MockDelay, MockMqtt, MockRelay},
//! };
//!
//! let door = Arc::new(DoorStateCell::new(DoorState::Closed));
//! let sensor = DebouncedSensor::new(Arc::clone(&door), 2000);
//! let commands = Arc::new(CommandRelay::new("garage/remote"));
//! let publisher = Arc::new(StatePublisher::new(MockMqtt::new(), "garage/door"));
//!
//! let mut control = ControlLoop::new(
//!     MockRelay::new(),
//!     MockDelay::new(),
//!     Arc::clone(&door),
//!     commands,
//!     Arc::clone(&publisher),
//! );
//!
//! // Door opens: the interrupt reports a rising edge
//! sensor.on_raw_edge(true, 10_000);
//!
//! // Next control step publishes it
//! control.step().unwrap();
//! assert_eq!(publisher.with_client(|c| c.payloads_to("garage/door")), vec!["open"]);
//! ```

#![warn(missing_docs)]

/// Runtime configuration from `GARAGE_*` environment variables.
pub mod config;
/// Relay pulse and change-publish loop.
pub mod control;
/// Door state and its shared cell.
pub mod door;
/// Error types.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Retained door state publishing.
pub mod publisher;
/// Remote command handling.
pub mod relay;
/// Debounced reed switch edge handling.
pub mod sensor;
/// MQTT session event handling.
pub mod session;
/// Core traits for hardware and MQTT abstraction.
pub mod traits;

/// Network services (MQTT runtime).
#[cfg(feature = "mqtt")]
pub mod services;

// Re-exports for convenience
pub use config::{Config, GpioConfig, MqttConfig, TimingConfig, Topics};
pub use control::{ControlLoop, Tick};
pub use door::{DoorState, DoorStateCell};
pub use error::{ConfigError, ControlError};
pub use publisher::StatePublisher;
pub use relay::{CommandRelay, RemoteCommand};
pub use sensor::DebouncedSensor;
pub use session::SessionHandler;
pub use traits::{Clock, Delay, MqttClient, MqttMessage, QoS, RelayOutput, SwitchInput};
