use std::ops;

use slog;

use crate::clock::ClockSource;
use crate::config;
use crate::error::Error;
use crate::hardware::{AnalogInput, ClimateSensor, Delay, Gpio, RealTimeClock};
use crate::irrigation;
use crate::light;
use crate::sensors::OversamplingSampler;
use crate::ventilation;

/// The peripherals one pass works with.
pub struct Hardware<G, A, C, R, D> {
    pub gpio: G,
    pub adc: A,
    pub climate: C,
    pub rtc: R,
    pub delay: D,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub lighting: light::Lighting,
    pub beds: Vec<irrigation::BedReport>,
    pub ventilation: ventilation::Ventilation,
}

/// Releases every claimed pin when dropped, unless the pass completed.
struct ReleaseGuard<'a, G>
where
    G: Gpio + 'a,
{
    log: &'a slog::Logger,
    gpio: &'a mut G,
    armed: bool,
}

impl<'a, G> ReleaseGuard<'a, G>
where
    G: Gpio + 'a,
{
    fn new(log: &'a slog::Logger, gpio: &'a mut G) -> Self {
        ReleaseGuard {
            log,
            gpio,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<'a, G> ops::Deref for ReleaseGuard<'a, G>
where
    G: Gpio + 'a,
{
    type Target = G;

    fn deref(&self) -> &G {
        &*self.gpio
    }
}

impl<'a, G> ops::DerefMut for ReleaseGuard<'a, G>
where
    G: Gpio + 'a,
{
    fn deref_mut(&mut self) -> &mut G {
        &mut *self.gpio
    }
}

impl<'a, G> Drop for ReleaseGuard<'a, G>
where
    G: Gpio + 'a,
{
    fn drop(&mut self) {
        if self.armed {
            warn!(self.log, "pass did not complete, releasing all claimed GPIO");
            self.gpio.release_all();
        }
    }
}

/// Runs lighting, irrigation and ventilation once, in that order.
///
/// Any failure ends the pass and every pin claimed up to that point is released, including pins
/// of controllers that already finished.  After a complete pass the pins keep the levels the
/// controllers left them in.
pub fn run<G, A, C, R, D>(
    log: &slog::Logger,
    config: &config::Config,
    hardware: Hardware<G, A, C, R, D>,
) -> Result<Summary, Error>
where
    G: Gpio,
    A: AnalogInput,
    C: ClimateSensor,
    R: RealTimeClock,
    D: Delay,
{
    let Hardware {
        mut gpio,
        adc,
        mut climate,
        rtc,
        mut delay,
    } = hardware;

    let mut gpio = ReleaseGuard::new(log, &mut gpio);
    let mut clock = ClockSource::new(log.new(o!("component" => "clock")), rtc);
    let mut sampler = OversamplingSampler::new(adc, config.sampling.repetitions);

    let lighting = light::run(
        &log.new(o!("controller" => "light")),
        &config.light,
        &mut clock,
        &mut sampler,
        &mut *gpio,
    )?;

    let beds = irrigation::run(
        &log.new(o!("controller" => "irrigation")),
        &config.plant,
        &config.irrigation,
        &mut sampler,
        &mut *gpio,
        &mut delay,
    )?;

    let ventilation = ventilation::run(
        &log.new(o!("controller" => "ventilation")),
        &config.climate,
        &config.window,
        &mut climate,
        &mut *gpio,
        &mut delay,
    )?;

    gpio.disarm();

    Ok(Summary {
        lighting,
        beds,
        ventilation,
    })
}
