use std::collections;
use std::mem;

use failure;
use rppal::pwm;
use slog;
use sysfs_gpio;

use super::{Gpio, Level};
use crate::config;

/// GPIO outputs through the kernel's sysfs interface, PWM through the SoC's hardware channels.
///
/// Pins stay exported when this is dropped, so the levels a pass commanded outlive the process.
/// Only `release_all` resets them.
pub struct SysfsGpio {
    log: slog::Logger,
    base: u64,
    warnings: bool,
    pins: collections::BTreeMap<u8, sysfs_gpio::Pin>,
    pwms: collections::BTreeMap<u8, pwm::Pwm>,
}

impl SysfsGpio {
    pub fn new(log: slog::Logger, config: &config::Gpio) -> Self {
        SysfsGpio {
            log,
            base: config.base,
            warnings: config.warnings,
            pins: collections::BTreeMap::new(),
            pwms: collections::BTreeMap::new(),
        }
    }

    fn pin(&self, pin: u8) -> Result<&sysfs_gpio::Pin, failure::Error> {
        self.pins
            .get(&pin)
            .ok_or_else(|| failure::err_msg(format!("GPIO {} is not claimed as an output", pin)))
    }
}

/// Hardware PWM channel a BCM pin is routed to (needs the `pwm-2chan` overlay).
fn pwm_channel(pin: u8) -> Option<pwm::Channel> {
    match pin {
        12 | 18 => Some(pwm::Channel::Pwm0),
        13 | 19 => Some(pwm::Channel::Pwm1),
        _ => None,
    }
}

/// Records an exported pin before configuring it, so `release_all` unexports it even when the
/// direction cannot be set.
fn claim_output<P, E, C>(
    pins: &mut collections::BTreeMap<u8, P>,
    pin: u8,
    handle: P,
    export: E,
    configure: C,
) -> Result<(), failure::Error>
where
    E: FnOnce(&P) -> Result<(), failure::Error>,
    C: FnOnce(&P) -> Result<(), failure::Error>,
{
    export(&handle)?;
    pins.insert(pin, handle);
    configure(&pins[&pin])
}

impl Gpio for SysfsGpio {
    fn configure_output(&mut self, pin: u8, initial: Level) -> Result<(), failure::Error> {
        let handle = sysfs_gpio::Pin::new(self.base + u64::from(pin));

        if handle.is_exported() && !self.pins.contains_key(&pin) {
            if self.warnings {
                warn!(self.log, "GPIO is already in use, claiming it anyway"; "pin" => pin);
            } else {
                debug!(self.log, "GPIO was already exported"; "pin" => pin);
            }
        }

        let direction = match initial {
            Level::Low => sysfs_gpio::Direction::Low,
            Level::High => sysfs_gpio::Direction::High,
        };
        claim_output(
            &mut self.pins,
            pin,
            handle,
            |handle| Ok(handle.export()?),
            |handle| Ok(handle.set_direction(direction)?),
        )?;
        debug!(self.log, "claimed GPIO"; "pin" => pin, "initial" => ?initial);

        Ok(())
    }

    fn set_output(&mut self, pin: u8, level: Level) -> Result<(), failure::Error> {
        self.pin(pin)?.set_value(match level {
            Level::Low => 0,
            Level::High => 1,
        })?;
        Ok(())
    }

    fn start_pwm_output(
        &mut self,
        pin: u8,
        frequency_hz: f64,
        duty_percent: f64,
    ) -> Result<(), failure::Error> {
        let channel = pwm_channel(pin).ok_or_else(|| {
            failure::err_msg(format!("GPIO {} is not routed to a hardware PWM channel", pin))
        })?;
        let output = pwm::Pwm::with_frequency(
            channel,
            frequency_hz,
            duty_percent / 100.0,
            pwm::Polarity::Normal,
            true,
        )?;
        debug!(self.log, "started PWM"; "pin" => pin, "frequency_hz" => frequency_hz, "duty_percent" => duty_percent);

        self.pwms.insert(pin, output);
        Ok(())
    }

    fn set_pwm_duty_cycle(&mut self, pin: u8, duty_percent: f64) -> Result<(), failure::Error> {
        let output = self
            .pwms
            .get_mut(&pin)
            .ok_or_else(|| failure::err_msg(format!("GPIO {} is not running PWM", pin)))?;
        output.set_duty_cycle(duty_percent / 100.0)?;
        Ok(())
    }

    fn release_all(&mut self) {
        for (pin, handle) in mem::replace(&mut self.pins, collections::BTreeMap::new()) {
            if let Err(e) = handle.unexport() {
                error!(self.log, "could not unexport pin"; "pin" => pin, "error" => %e);
            } else {
                debug!(self.log, "released GPIO"; "pin" => pin);
            }
        }

        for (pin, output) in mem::replace(&mut self.pwms, collections::BTreeMap::new()) {
            if let Err(e) = output.disable() {
                error!(self.log, "could not disable PWM"; "pin" => pin, "error" => %e);
            } else {
                debug!(self.log, "released PWM"; "pin" => pin);
            }
        }
    }
}
