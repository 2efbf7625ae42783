//! Raspberry Pi GPIO via `rppal`.
//!
//! # Wiring
//!
//! | Signal | BCM | Board | Mode |
//! |--------|-----|-------|------|
//! | Reed switch | 16 | 36 | input, internal pull-up |
//! | Remote button | 20 | 38 | output, starts low |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rppal::gpio::Gpio;
//! use garage_door::hal::{RpiRelay, RpiSwitch, SystemClock};
//!
//! let gpio = Gpio::new()?;
//! let mut switch = RpiSwitch::new(&gpio, 16)?;
//! let relay = RpiRelay::new(&gpio, 20)?;
//!
//! switch.watch_edges(Arc::clone(&sensor), SystemClock::new())?;
//! ```

use std::sync::Arc;

use rppal::gpio::{Event, Gpio, InputPin, OutputPin, Trigger};
use tracing::debug;

use crate::sensor::DebouncedSensor;
use crate::traits::{Clock, RelayOutput, SwitchInput};

/// Reed switch input with pull-up and edge interrupts.
pub struct RpiSwitch {
    pin: InputPin,
}

impl RpiSwitch {
    /// Claim BCM pin `bcm` as an input with the internal pull-up enabled.
    pub fn new(gpio: &Gpio, bcm: u8) -> rppal::gpio::Result<Self> {
        let pin = gpio.get(bcm)?.into_input_pullup();
        debug!(bcm, "switch input configured");
        Ok(Self { pin })
    }

    /// Deliver both edge directions to `sensor`.
    ///
    /// The callback runs on rppal's interrupt thread and only does the
    /// sensor's atomic bookkeeping. Debouncing is left to the sensor rather
    /// than rppal so the window is measured from accepted edges.
    pub fn watch_edges<K>(&mut self, sensor: Arc<DebouncedSensor>, clock: K) -> rppal::gpio::Result<()>
    where
        K: Clock + Send + 'static,
    {
        self.pin
            .set_async_interrupt(Trigger::Both, None, move |event: Event| {
                let high = matches!(event.trigger, Trigger::RisingEdge);
                sensor.on_raw_edge(high, clock.now_ms());
            })
    }

    /// Stop delivering edges.
    pub fn unwatch(&mut self) -> rppal::gpio::Result<()> {
        self.pin.clear_async_interrupt()
    }
}

impl SwitchInput for RpiSwitch {
    type Error = rppal::gpio::Error;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_high())
    }
}

/// Output driving the spare remote's button.
///
/// rppal resets the pin when it is dropped, which releases the button even
/// if the process exits without running the control loop's cleanup.
pub struct RpiRelay {
    pin: OutputPin,
}

impl RpiRelay {
    /// Claim BCM pin `bcm` as an output, initially low.
    pub fn new(gpio: &Gpio, bcm: u8) -> rppal::gpio::Result<Self> {
        let mut pin = gpio.get(bcm)?.into_output_low();
        pin.set_reset_on_drop(true);
        debug!(bcm, "relay output configured");
        Ok(Self { pin })
    }
}

impl RelayOutput for RpiRelay {
    type Error = rppal::gpio::Error;

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pin.set_low();
        Ok(())
    }
}
