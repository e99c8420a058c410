//! The peripherals a pass talks to.  Controllers only see these traits; the Linux drivers live in
//! the submodules and the fakes used by the tests in `testing`.
use std::thread;
use std::time;

use chrono;
use failure;

pub mod dht;
pub mod ds1307;
pub mod mcp3008;
pub mod sysfs;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

/// How a logical on/off command maps onto the electrical level of an actuator's control pin.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    ActiveHigh,
    /// Relay modules that energize their load while the input is pulled LOW.
    ActiveLow,
}

impl Polarity {
    pub fn level(self, on: bool) -> Level {
        match (self, on) {
            (Polarity::ActiveHigh, true) => Level::High,
            (Polarity::ActiveHigh, false) => Level::Low,
            (Polarity::ActiveLow, true) => Level::Low,
            (Polarity::ActiveLow, false) => Level::High,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SensorKind {
    Dht11,
    Dht22,
}

impl SensorKind {
    /// Temperature range in °C the sensor can report; anything outside is a garbled read.
    pub fn temperature_range(self) -> (f64, f64) {
        match self {
            SensorKind::Dht11 => (0.0, 50.0),
            SensorKind::Dht22 => (-40.0, 80.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClimateReading {
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Temperature in °C.
    pub temperature: f64,
}

pub trait Gpio {
    /// Claims `pin` as an output, driving `initial` from the moment it is claimed.
    fn configure_output(&mut self, pin: u8, initial: Level) -> Result<(), failure::Error>;

    fn set_output(&mut self, pin: u8, level: Level) -> Result<(), failure::Error>;

    /// Claims `pin` and starts a PWM signal on it.
    fn start_pwm_output(
        &mut self,
        pin: u8,
        frequency_hz: f64,
        duty_percent: f64,
    ) -> Result<(), failure::Error>;

    fn set_pwm_duty_cycle(&mut self, pin: u8, duty_percent: f64) -> Result<(), failure::Error>;

    /// Returns every pin claimed so far to its default state.  Each claimed pin is released
    /// exactly once; pins claimed afterwards need another call.
    fn release_all(&mut self);

    fn start_pwm(
        &mut self,
        pin: u8,
        frequency_hz: f64,
        duty_percent: f64,
    ) -> Result<PwmHandle<'_, Self>, failure::Error> {
        self.start_pwm_output(pin, frequency_hz, duty_percent)?;
        Ok(PwmHandle { gpio: self, pin })
    }
}

pub struct PwmHandle<'a, G: 'a + ?Sized> {
    gpio: &'a mut G,
    pin: u8,
}

impl<'a, G> PwmHandle<'a, G>
where
    G: Gpio + ?Sized,
{
    pub fn set_duty_cycle(&mut self, duty_percent: f64) -> Result<(), failure::Error> {
        self.gpio.set_pwm_duty_cycle(self.pin, duty_percent)
    }
}

/// A single-shot analog-to-digital converter.
pub trait AnalogInput {
    fn read_channel(&mut self, channel: u8) -> Result<u16, failure::Error>;
}

pub trait ClimateSensor {
    /// Reads humidity and temperature, retrying transient failures internally.  `None` means
    /// the sensor never produced a usable reading.
    fn read_with_retry(
        &mut self,
        kind: SensorKind,
        pin: u8,
    ) -> Result<Option<ClimateReading>, failure::Error>;
}

pub trait RealTimeClock {
    fn read_date_time(&mut self) -> Result<chrono::NaiveDateTime, failure::Error>;
}

pub trait Delay {
    fn delay(&mut self, duration: time::Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: time::Duration) {
        thread::sleep(duration);
    }
}

impl<'a, A: AnalogInput + ?Sized> AnalogInput for &'a mut A {
    fn read_channel(&mut self, channel: u8) -> Result<u16, failure::Error> {
        (**self).read_channel(channel)
    }
}

impl<'a, C: ClimateSensor + ?Sized> ClimateSensor for &'a mut C {
    fn read_with_retry(
        &mut self,
        kind: SensorKind,
        pin: u8,
    ) -> Result<Option<ClimateReading>, failure::Error> {
        (**self).read_with_retry(kind, pin)
    }
}

impl<'a, R: RealTimeClock + ?Sized> RealTimeClock for &'a mut R {
    fn read_date_time(&mut self) -> Result<chrono::NaiveDateTime, failure::Error> {
        (**self).read_date_time()
    }
}

impl<'a, D: Delay + ?Sized> Delay for &'a mut D {
    fn delay(&mut self, duration: time::Duration) {
        (**self).delay(duration)
    }
}
