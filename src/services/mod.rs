//! Network services (feature-gated).
//!
//! - `mqtt` feature: rumqttc-backed MQTT session runtime
//!
//! The runtime is a thin shell: all door logic lives in
//! [`SessionHandler`](crate::session::SessionHandler) and stays testable
//! without a broker.

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "mqtt")]
pub use mqtt::*;
