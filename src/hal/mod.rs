//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - `system`: `std` clock and sleep
//! - `rpi`: Raspberry Pi GPIO through rppal (requires `rpi` feature)

pub mod mock;
pub mod system;

#[cfg(feature = "rpi")]
pub mod rpi;

pub use mock::*;
pub use system::*;

#[cfg(feature = "rpi")]
pub use rpi::*;
