//! Digital output driven by inbound pin commands.
//!
//! The drive is behind a small trait so the mirror loop can run against a
//! mock in tests and degrade to a no-op when the GPIO chip is unavailable
//! (e.g. when running on a development machine instead of the Pi).

use crate::link::message::PinCommand;
use rppal::gpio::{Gpio, OutputPin};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PinError {
    #[error("gpio error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

/// Output abstraction for the mirrored pin.
pub trait OutputDrive: Send {
    fn apply(&mut self, command: PinCommand);
}

/// Whether the electrical level for a command is high.
///
/// Active-low wiring (common for on-board LEDs) inverts the level: assert
/// drives the pin low.
pub fn level_is_high(active_low: bool, command: PinCommand) -> bool {
    match command {
        PinCommand::Assert => !active_low,
        PinCommand::Deassert => active_low,
    }
}

/// Real GPIO output via rppal.
pub struct GpioDrive {
    pin: OutputPin,
    active_low: bool,
}

impl GpioDrive {
    pub fn new(bcm: u8, active_low: bool) -> Result<Self, PinError> {
        let pin = Gpio::new()?.get(bcm)?.into_output();
        info!("Opened GPIO {} (active_low={})", bcm, active_low);
        let mut drive = GpioDrive { pin, active_low };
        // Start deasserted regardless of wiring.
        drive.apply(PinCommand::Deassert);
        Ok(drive)
    }
}

impl OutputDrive for GpioDrive {
    fn apply(&mut self, command: PinCommand) {
        if level_is_high(self.active_low, command) {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        debug!("Pin command applied: {:?}", command);
    }
}

/// No-op drive used when the GPIO chip cannot be opened.
pub struct NullDrive;

impl OutputDrive for NullDrive {
    fn apply(&mut self, command: PinCommand) {
        debug!("Pin command ignored (no gpio): {:?}", command);
    }
}

/// Opens the configured pin, degrading to a no-op drive on failure.
pub fn open_drive(bcm: u8, active_low: bool) -> Box<dyn OutputDrive> {
    match GpioDrive::new(bcm, active_low) {
        Ok(drive) => Box::new(drive),
        Err(e) => {
            warn!("GPIO unavailable, pin mirroring disabled: {}", e);
            Box::new(NullDrive)
        }
    }
}
