//! Runtime configuration for the garage door service.
//!
//! Uses `heapless::String` for the fixed-size string fields so a config
//! can be built without allocation and copied between threads cheaply.
//! Values come from `GARAGE_*` environment variables, each with a default.
//!
//! # Example
//!
//! ```rust
//! use garage_door::config::{Config, GpioConfig, MqttConfig, TimingConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.timing.debounce_ms, 2000);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_mqtt(MqttConfig::default().with_host("192.168.0.210"))
//!     .with_gpio(GpioConfig::default().with_switch_pin(17))
//!     .with_timing(TimingConfig::default().with_pulse_ms(1000));
//! ```

use heapless::String as HString;

use crate::error::ConfigError;

/// Maximum length for short config strings (hostnames, client IDs)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (topics)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

/// Published door state topic.
pub const STATE_TOPIC: &str = "garage/door";

/// Subscribed remote command topic.
pub const REMOTE_TOPIC: &str = "garage/remote";

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

fn truncated<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    // Cut on a char boundary at or below capacity
    let mut end = s.len().min(N);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let _ = hs.push_str(&s[..end]);
    hs
}

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    truncated(s)
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    truncated(s)
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// MQTT broker connection
    pub mqtt: MqttConfig,
    /// Topic names
    pub topics: Topics,
    /// Pin assignments
    pub gpio: GpioConfig,
    /// Debounce, pulse and poll timings
    pub timing: TimingConfig,
}

impl Config {
    /// Load configuration from `GARAGE_*` environment variables.
    ///
    /// Unset variables keep their defaults. Set but unparseable values are
    /// an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// | Key | Default |
    /// |-----|---------|
    /// | `GARAGE_MQTT_HOST` | `localhost` |
    /// | `GARAGE_MQTT_PORT` | `1883` |
    /// | `GARAGE_MQTT_CLIENT_ID` | `garage-door` |
    /// | `GARAGE_MQTT_USERNAME` / `GARAGE_MQTT_PASSWORD` | empty |
    /// | `GARAGE_MQTT_KEEP_ALIVE_SECS` | `30` |
    /// | `GARAGE_SWITCH_PIN` | `16` |
    /// | `GARAGE_REMOTE_PIN` | `20` |
    /// | `GARAGE_DEBOUNCE_MS` | `2000` |
    /// | `GARAGE_PULSE_MS` | `1500` |
    /// | `GARAGE_POLL_INTERVAL_MS` | `1000` |
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup("GARAGE_MQTT_HOST") {
            config.mqtt.host = short_string(&host);
        }
        if let Some(port) = parse(&lookup, "GARAGE_MQTT_PORT")? {
            config.mqtt.port = port;
        }
        if let Some(id) = lookup("GARAGE_MQTT_CLIENT_ID") {
            config.mqtt.client_id = short_string(&id);
        }
        if let Some(user) = lookup("GARAGE_MQTT_USERNAME") {
            config.mqtt.username = short_string(&user);
        }
        if let Some(pass) = lookup("GARAGE_MQTT_PASSWORD") {
            config.mqtt.password = short_string(&pass);
        }
        if let Some(secs) = parse(&lookup, "GARAGE_MQTT_KEEP_ALIVE_SECS")? {
            config.mqtt.keep_alive_secs = secs;
        }
        if let Some(pin) = parse(&lookup, "GARAGE_SWITCH_PIN")? {
            config.gpio.switch_pin = pin;
        }
        if let Some(pin) = parse(&lookup, "GARAGE_REMOTE_PIN")? {
            config.gpio.remote_pin = pin;
        }
        if let Some(ms) = parse(&lookup, "GARAGE_DEBOUNCE_MS")? {
            config.timing.debounce_ms = ms;
        }
        if let Some(ms) = parse(&lookup, "GARAGE_PULSE_MS")? {
            config.timing.pulse_ms = ms;
        }
        if let Some(ms) = parse(&lookup, "GARAGE_POLL_INTERVAL_MS")? {
            config.timing.poll_interval_ms = ms;
        }

        Ok(config)
    }

    /// Set MQTT configuration
    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Set topic configuration
    pub fn with_topics(mut self, topics: Topics) -> Self {
        self.topics = topics;
        self
    }

    /// Set GPIO configuration
    pub fn with_gpio(mut self, gpio: GpioConfig) -> Self {
        self.gpio = gpio;
        self
    }

    /// Set timing configuration
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: core::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key,
                value: raw,
                reason: "expected an unsigned integer in range",
            }),
    }
}

// ============================================================================
// MQTT Config
// ============================================================================

/// MQTT client configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MqttConfig {
    /// Broker hostname or IP
    pub host: ShortString,
    /// Broker port
    pub port: u16,
    /// Client ID (should be unique per device)
    pub client_id: ShortString,
    /// Username for authentication (empty = no auth)
    pub username: ShortString,
    /// Password for authentication
    pub password: ShortString,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: short_string("localhost"),
            port: 1883,
            client_id: short_string("garage-door"),
            username: ShortString::new(),
            password: ShortString::new(),
            keep_alive_secs: 30,
        }
    }
}

impl MqttConfig {
    /// Set the broker host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = short_string(host);
        self
    }

    /// Set the broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the client ID
    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = short_string(id);
        self
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = short_string(username);
        self.password = short_string(password);
        self
    }

    /// Set the keep-alive interval
    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// Check if authentication is configured
    pub fn has_auth(&self) -> bool {
        !self.username.is_empty()
    }
}

// ============================================================================
// Topics
// ============================================================================

/// MQTT topic names. Defaults match existing subscribers bit for bit.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Topics {
    /// Retained door state topic
    pub state: LongString,
    /// Remote command topic
    pub remote: LongString,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            state: long_string(STATE_TOPIC),
            remote: long_string(REMOTE_TOPIC),
        }
    }
}

// ============================================================================
// GPIO Config
// ============================================================================

/// Pin assignments, in BCM numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpioConfig {
    /// Reed switch input (board pin 36)
    pub switch_pin: u8,
    /// Remote relay output (board pin 38)
    pub remote_pin: u8,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            switch_pin: 16,
            remote_pin: 20,
        }
    }
}

impl GpioConfig {
    /// Set the switch input pin
    pub fn with_switch_pin(mut self, pin: u8) -> Self {
        self.switch_pin = pin;
        self
    }

    /// Set the remote output pin
    pub fn with_remote_pin(mut self, pin: u8) -> Self {
        self.remote_pin = pin;
        self
    }
}

// ============================================================================
// Timing Config
// ============================================================================

/// Debounce, pulse and poll timings in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimingConfig {
    /// Edges within this window of an accepted edge are ignored
    pub debounce_ms: u32,
    /// How long the remote button is held
    pub pulse_ms: u32,
    /// Control loop sleep between iterations
    pub poll_interval_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            pulse_ms: 1500,
            poll_interval_ms: 1000,
        }
    }
}

impl TimingConfig {
    /// Set the debounce window
    pub fn with_debounce_ms(mut self, ms: u32) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the pulse length
    pub fn with_pulse_ms(mut self, ms: u32) -> Self {
        self.pulse_ms = ms;
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval_ms(mut self, ms: u32) -> Self {
        self.poll_interval_ms = ms;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
