//! Trait definitions for hardware and network abstraction.
//!
//! This module defines the seams that allow garage-door to:
//! - Run on a Raspberry Pi or against desktop mocks
//! - Swap the MQTT client without touching the door logic
//!
//! # Submodules
//!
//! - `hardware`: Reed switch input, relay output, clock, delay
//! - `network`: MQTT client trait and message type

pub mod hardware;
pub mod network;

pub use hardware::*;
pub use network::*;
