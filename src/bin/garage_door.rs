//! Raspberry Pi garage door monitor.
//!
//! Watches the reed switch, publishes the door state to `garage/door`
//! (retained) and presses the opener remote when `garage/remote` receives
//! `"open"` or `"close"`.
//!
//! # Wiring
//!
//! - Reed switch between BCM 16 (board 36) and ground, internal pull-up
//! - Remote button relay on BCM 20 (board 38)
//!
//! # Run
//!
//! ```bash
//! GARAGE_MQTT_HOST=192.168.0.210 RUST_LOG=garage_door=debug \
//!     cargo run --release --features daemon --bin garage_door
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rppal::gpio::Gpio;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use garage_door::hal::{RpiRelay, RpiSwitch, SystemClock, ThreadDelay};
use garage_door::services::{connect, disconnect, run_event_loop, RumqttClient};
use garage_door::{
    CommandRelay, Config, ControlError, ControlLoop, DebouncedSensor, DoorState, DoorStateCell,
    SessionHandler, StatePublisher,
};

/// How long the MQTT task may run after a disconnect is queued.
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // =========================================================================
    // Configuration
    // =========================================================================
    let config = Config::from_env().context("loading configuration")?;

    info!(
        host = config.mqtt.host.as_str(),
        port = config.mqtt.port,
        client_id = config.mqtt.client_id.as_str(),
        auth = config.mqtt.has_auth(),
        state_topic = config.topics.state.as_str(),
        remote_topic = config.topics.remote.as_str(),
        switch_pin = config.gpio.switch_pin,
        remote_pin = config.gpio.remote_pin,
        debounce_ms = config.timing.debounce_ms,
        pulse_ms = config.timing.pulse_ms,
        poll_interval_ms = config.timing.poll_interval_ms,
        "garage door monitor starting"
    );

    // =========================================================================
    // GPIO
    // =========================================================================
    let gpio = Gpio::new().context("opening GPIO")?;
    let mut switch = RpiSwitch::new(&gpio, config.gpio.switch_pin)
        .with_context(|| format!("claiming switch pin {}", config.gpio.switch_pin))?;
    let relay_out = RpiRelay::new(&gpio, config.gpio.remote_pin)
        .with_context(|| format!("claiming remote pin {}", config.gpio.remote_pin))?;

    let initial = DoorState::read_from(&switch).map_err(ControlError::switch)?;
    info!(state = %initial, "initial door state");

    let door = Arc::new(DoorStateCell::new(initial));
    let sensor = Arc::new(DebouncedSensor::new(
        Arc::clone(&door),
        config.timing.debounce_ms,
    ));
    switch
        .watch_edges(sensor, SystemClock::new())
        .context("enabling switch interrupts")?;

    // =========================================================================
    // MQTT
    // =========================================================================
    let (client, eventloop) = connect(&config.mqtt);
    let commands = Arc::new(CommandRelay::new(config.topics.remote.as_str()));
    let publisher = Arc::new(StatePublisher::new(
        RumqttClient::new(client.clone()),
        config.topics.state.as_str(),
    ));
    let session = Arc::new(SessionHandler::new(
        Arc::clone(&publisher),
        Arc::clone(&commands),
        Arc::clone(&door),
        config.topics.clone(),
    ));
    let mqtt_task = tokio::spawn(run_event_loop(eventloop, session));

    // =========================================================================
    // Control loop
    // =========================================================================
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut control = ControlLoop::new(relay_out, ThreadDelay, door, commands, publisher)
        .with_timing(config.timing)
        .with_shutdown(Arc::clone(&shutdown));
    let mut control_task = tokio::task::spawn_blocking(move || control.run());

    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let result = tokio::select! {
        res = &mut control_task => res,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            shutdown.store(true, Ordering::Release);
            control_task.await
        }
        _ = sigterm.recv() => {
            info!("terminate received, shutting down");
            shutdown.store(true, Ordering::Release);
            control_task.await
        }
    };

    // =========================================================================
    // Cleanup
    // =========================================================================
    disconnect(&client, mqtt_task, DISCONNECT_GRACE).await;
    if let Err(e) = switch.unwatch() {
        warn!(error = %e, "failed to clear switch interrupt");
    }

    result.context("control loop panicked")??;
    info!("garage door monitor stopped");
    Ok(())
}
