//! Error types for garage-door.

use thiserror::Error;

/// Fatal hardware errors surfaced by the control loop.
///
/// A pin failure leaves the door or the relay in an unknown state, so the
/// loop stops instead of retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// Reading the reed switch failed.
    #[error("switch input failed: {0}")]
    Switch(String),

    /// Driving the remote relay output failed.
    #[error("relay output failed: {0}")]
    Relay(String),
}

impl ControlError {
    /// Wrap a switch input error from any [`SwitchInput`](crate::traits::SwitchInput).
    pub fn switch(err: impl std::fmt::Debug) -> Self {
        ControlError::Switch(format!("{err:?}"))
    }

    /// Wrap a relay output error from any [`RelayOutput`](crate::traits::RelayOutput).
    pub fn relay(err: impl std::fmt::Debug) -> Self {
        ControlError::Relay(format!("{err:?}"))
    }
}

/// Configuration loading errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value found.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}
