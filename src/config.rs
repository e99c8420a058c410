use std::convert::TryFrom;
use std::path;
use std::time;

use failure::ResultExt;
use serde;

use crate::error::{Error, ErrorKind};
use crate::hardware::mcp3008;
use crate::hardware::{Polarity, SensorKind};
use crate::sensors;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub gpio: Gpio,
    pub adc: Adc,
    pub rtc: Rtc,
    pub light: Light,
    pub climate: Climate,
    pub window: Window,
    pub sampling: Sampling,
    pub irrigation: Irrigation,
    pub plant: Vec<Plant>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Gpio {
    /// Added to BCM pin numbers to get the sysfs GPIO number.
    pub base: u64,
    /// Log pins that some other process already exported.
    pub warnings: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Adc {
    #[serde(deserialize_with = "deserialize_u8")]
    pub bus: u8,
    #[serde(deserialize_with = "deserialize_u8")]
    pub slave_select: u8,
    pub clock_hz: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Rtc {
    pub device: path::PathBuf,
    #[serde(deserialize_with = "deserialize_u16")]
    pub address: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Light {
    #[serde(deserialize_with = "deserialize_u8")]
    pub gpio: u8,
    /// First hour of the day the light may be on.
    pub from: u32,
    /// Last hour of the day the light may be on, inclusive.
    pub until: u32,
    #[serde(deserialize_with = "deserialize_u8")]
    pub channel: u8,
    /// The light is switched on when the averaged sensor reading is at or below this.
    pub threshold: f64,
    pub polarity: Polarity,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Climate {
    #[serde(deserialize_with = "deserialize_u8")]
    pub gpio: u8,
    #[serde(deserialize_with = "deserialize_sensor_kind")]
    pub sensor: SensorKind,
    /// Above this temperature (°C) the window is opened.
    pub temperature_threshold: f64,
    /// IIO device directory; looked up by pin when missing.
    pub device: Option<path::PathBuf>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Window {
    #[serde(deserialize_with = "deserialize_u8")]
    pub servo_gpio: u8,
    /// Servo angle in degrees for an open window.
    pub open_angle: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Sampling {
    pub repetitions: u32,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Irrigation {
    /// Drive the pump of a bed that needs no water to OFF instead of leaving it untouched.
    pub enforce_idle_off: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Plant {
    pub name: String,
    #[serde(deserialize_with = "deserialize_u8_list")]
    pub moisture_channels: Vec<u8>,
    /// Higher readings mean drier soil; the bed is watered above this.
    pub moisture_threshold: f64,
    #[serde(deserialize_with = "deserialize_u8")]
    pub pump_gpio: u8,
    #[serde(deserialize_with = "deserialize_seconds")]
    pub watering_time: time::Duration,
    #[serde(default = "default_relay_polarity")]
    pub polarity: Polarity,
}

pub fn load(path: Option<&path::Path>) -> Result<Config, Error> {
    match path {
        Some(path) => from_source(::config::File::from(path)),
        None => {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn from_source<S>(source: S) -> Result<Config, Error>
where
    S: ::config::Source + Send + Sync + 'static,
{
    let settings = ::config::Config::builder()
        .add_source(source)
        .build()
        .context(ErrorKind::InvalidConfig("could not read the configuration file".to_owned()))?;
    let config: Config = settings
        .try_deserialize()
        .context(ErrorKind::InvalidConfig("unexpected configuration value".to_owned()))?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if self.light.from > 23 || self.light.until > 23 {
            return Err(invalid("light hours must be between 0 and 23"));
        }
        if self.light.from > self.light.until {
            return Err(invalid(format!(
                "light window starts at {} but ends at {}",
                self.light.from, self.light.until
            )));
        }
        check_channel(self.light.channel)?;

        if self.sampling.repetitions == 0 {
            return Err(invalid("sampling needs at least one repetition"));
        }
        if !(0.0..=180.0).contains(&self.window.open_angle) {
            return Err(invalid(format!(
                "servo open angle {} is outside 0..=180",
                self.window.open_angle
            )));
        }

        for plant in &self.plant {
            if plant.moisture_channels.is_empty() {
                return Err(invalid(format!(
                    "plant {:?} has no moisture channels",
                    plant.name
                )));
            }
            for &channel in &plant.moisture_channels {
                check_channel(channel)?;
            }
            if plant.watering_time == time::Duration::from_secs(0) {
                return Err(invalid(format!(
                    "plant {:?} has a zero watering time",
                    plant.name
                )));
            }
        }

        Ok(())
    }
}

fn invalid<S: Into<String>>(message: S) -> Error {
    ErrorKind::InvalidConfig(message.into()).into()
}

fn check_channel(channel: u8) -> Result<(), Error> {
    if channel < mcp3008::CHANNELS {
        Ok(())
    } else {
        Err(invalid(format!("analog channel {} does not exist", channel)))
    }
}

fn default_relay_polarity() -> Polarity {
    Polarity::ActiveLow
}

fn deserialize_sensor_kind<'de, D>(deserializer: D) -> Result<SensorKind, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = <String as serde::Deserialize>::deserialize(deserializer)?;

    match raw.to_ascii_uppercase().as_str() {
        "DHT11" => Ok(SensorKind::Dht11),
        "DHT22" | "AM2302" => Ok(SensorKind::Dht22),
        _ => Err(serde::de::Error::invalid_value(
            serde::de::Unexpected::Str(&raw),
            &"one of \"DHT11\", \"DHT22\" or \"AM2302\"",
        )),
    }
}

fn deserialize_u8<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = <i64 as serde::Deserialize>::deserialize(deserializer)?;
    narrow(raw, "an integer between 0 and 255")
}

fn deserialize_u16<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = <i64 as serde::Deserialize>::deserialize(deserializer)?;
    narrow(raw, "an integer between 0 and 65535")
}

fn deserialize_u8_list<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = <Vec<i64> as serde::Deserialize>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|value| narrow(value, "a list of integers between 0 and 255"))
        .collect()
}

/// Rejects values that do not fit instead of letting them wrap around.
fn narrow<T, E>(raw: i64, expected: &str) -> Result<T, E>
where
    T: TryFrom<i64>,
    E: serde::de::Error,
{
    T::try_from(raw)
        .map_err(|_| E::invalid_value(serde::de::Unexpected::Signed(raw), &expected))
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<time::Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let seconds = <u64 as serde::Deserialize>::deserialize(deserializer)?;
    Ok(time::Duration::from_secs(seconds))
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gpio: Gpio::default(),
            adc: Adc::default(),
            rtc: Rtc::default(),
            light: Light::default(),
            climate: Climate::default(),
            window: Window::default(),
            sampling: Sampling::default(),
            irrigation: Irrigation::default(),
            plant: vec![
                Plant {
                    name: "Tomaten".to_owned(),
                    moisture_channels: vec![1, 2],
                    moisture_threshold: 450.0,
                    pump_gpio: 23,
                    watering_time: time::Duration::from_secs(10),
                    polarity: Polarity::ActiveLow,
                },
                Plant {
                    name: "Salat".to_owned(),
                    moisture_channels: vec![3, 4],
                    moisture_threshold: 450.0,
                    pump_gpio: 24,
                    watering_time: time::Duration::from_secs(12),
                    polarity: Polarity::ActiveLow,
                },
            ],
        }
    }
}

impl Default for Gpio {
    fn default() -> Self {
        Gpio {
            base: 0,
            warnings: false,
        }
    }
}

impl Default for Adc {
    fn default() -> Self {
        Adc {
            bus: 0,
            slave_select: 0,
            clock_hz: 1_350_000,
        }
    }
}

impl Default for Rtc {
    fn default() -> Self {
        Rtc {
            device: path::PathBuf::from("/dev/i2c-1"),
            address: 0x68,
        }
    }
}

impl Default for Light {
    fn default() -> Self {
        Light {
            gpio: 17,
            from: 10,
            until: 20,
            channel: 0,
            threshold: 500.0,
            polarity: Polarity::ActiveLow,
        }
    }
}

impl Default for Climate {
    fn default() -> Self {
        Climate {
            gpio: 27,
            sensor: SensorKind::Dht22,
            temperature_threshold: 23.0,
            device: None,
        }
    }
}

impl Default for Window {
    fn default() -> Self {
        Window {
            servo_gpio: 18,
            open_angle: 90.0,
        }
    }
}

impl Default for Sampling {
    fn default() -> Self {
        Sampling {
            repetitions: sensors::DEFAULT_REPETITIONS,
        }
    }
}
