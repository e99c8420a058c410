use chrono::Timelike;
use failure::ResultExt;
use slog;

use crate::clock::ClockSource;
use crate::config;
use crate::error::{Error, ErrorKind};
use crate::hardware::{AnalogInput, Gpio, RealTimeClock};
use crate::sensors::OversamplingSampler;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lighting {
    On,
    Off,
}

/// Whether `hour` lies in the configured window, both ends included.
pub fn within_window(light: &config::Light, hour: u32) -> bool {
    light.from <= hour && hour <= light.until
}

/// Whether an averaged light reading is dark enough to need the grow light.
pub fn too_dark(light: &config::Light, reading: f64) -> bool {
    reading <= light.threshold
}

/// Switches the grow light for the current hour and ambient light level.
///
/// The relay is claimed in its OFF state before anything else happens and stays OFF when the light
/// sensor cannot be read.
pub fn run<G, A, R>(
    log: &slog::Logger,
    light: &config::Light,
    clock: &mut ClockSource<R>,
    sampler: &mut OversamplingSampler<A>,
    gpio: &mut G,
) -> Result<Lighting, Error>
where
    G: Gpio,
    A: AnalogInput,
    R: RealTimeClock,
{
    let off = light.polarity.level(false);
    gpio.configure_output(light.gpio, off)
        .context(ErrorKind::ActuatorClaim(light.gpio))?;

    let hour = clock.now().hour();

    let lighting = if within_window(light, hour) {
        let reading = match sampler.sample(light.channel) {
            Ok(reading) => reading,
            Err(e) => {
                if let Err(off_error) = gpio.set_output(light.gpio, off) {
                    error!(log, "could not force light off"; "error" => %off_error);
                }
                return Err(e);
            }
        };
        debug!(log, "sampled ambient light"; "reading" => reading, "threshold" => light.threshold);

        if too_dark(light, reading) {
            Lighting::On
        } else {
            Lighting::Off
        }
    } else {
        debug!(log, "outside of the light window"; "hour" => hour);
        Lighting::Off
    };

    gpio.set_output(light.gpio, light.polarity.level(lighting == Lighting::On))
        .context(ErrorKind::Actuator(light.gpio))?;
    info!(log, "switched grow light"; "lighting" => ?lighting, "hour" => hour);

    Ok(lighting)
}
