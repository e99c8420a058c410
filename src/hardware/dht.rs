use std::fs;
use std::path;
use std::thread;
use std::time;

use failure;
use slog;

use super::{ClimateReading, ClimateSensor, SensorKind};

pub const RETRIES: u32 = 15;
pub const RETRY_DELAY: time::Duration = time::Duration::from_secs(2);

const IIO_DEVICES: &str = "/sys/bus/iio/devices";

/// DHT11/DHT22 through the kernel's `dht11` IIO driver (`dtoverlay=dht11,gpiopin=N`).  The
/// kernel handles the bit timing; reads fail with EIO on checksum errors and are retried here.
pub struct IioDht {
    log: slog::Logger,
    device: Option<path::PathBuf>,
    root: path::PathBuf,
    retries: u32,
    retry_delay: time::Duration,
}

impl IioDht {
    pub fn new(log: slog::Logger, device: Option<path::PathBuf>) -> Self {
        IioDht {
            log,
            device,
            root: path::PathBuf::from(IIO_DEVICES),
            retries: RETRIES,
            retry_delay: RETRY_DELAY,
        }
    }

    fn locate(&self, pin: u8) -> Result<path::PathBuf, failure::Error> {
        if let Some(ref device) = self.device {
            return Ok(device.clone());
        }

        // The overlay names the node after its pin, e.g. `dht11@1b` for GPIO 27.
        let wanted = format!("dht11@{:x}", pin);
        let mut fallback = None;
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let name = match fs::read_to_string(path.join("name")) {
                Ok(name) => name.trim().to_owned(),
                Err(_) => continue,
            };
            if name == wanted {
                return Ok(path);
            }
            if name.starts_with("dht11") && fallback.is_none() {
                fallback = Some(path);
            }
        }

        let device = fallback.ok_or_else(|| {
            failure::err_msg(format!("no dht11 IIO device for GPIO {} found", pin))
        })?;
        warn!(self.log, "no dht11 device is named after the pin, using another one";
              "pin" => pin, "device" => %device.display());
        Ok(device)
    }

    fn read_once(&self, device: &path::Path) -> Result<ClimateReading, failure::Error> {
        let temperature = parse_milli(&fs::read_to_string(device.join("in_temp_input"))?)?;
        let humidity = parse_milli(&fs::read_to_string(
            device.join("in_humidityrelative_input"),
        )?)?;

        Ok(ClimateReading {
            humidity,
            temperature,
        })
    }
}

fn parse_milli(raw: &str) -> Result<f64, failure::Error> {
    let value = raw.trim().parse::<i64>()?;
    Ok(value as f64 / 1000.0)
}

fn plausible(kind: SensorKind, reading: &ClimateReading) -> bool {
    let (min, max) = kind.temperature_range();
    reading.temperature >= min
        && reading.temperature <= max
        && reading.humidity >= 0.0
        && reading.humidity <= 100.0
}

impl ClimateSensor for IioDht {
    fn read_with_retry(
        &mut self,
        kind: SensorKind,
        pin: u8,
    ) -> Result<Option<ClimateReading>, failure::Error> {
        let device = self.locate(pin)?;

        for attempt in 1..=self.retries {
            match self.read_once(&device) {
                Ok(ref reading) if plausible(kind, reading) => return Ok(Some(*reading)),
                Ok(reading) => {
                    debug!(self.log, "discarding implausible reading";
                           "attempt" => attempt,
                           "temperature" => reading.temperature,
                           "humidity" => reading.humidity)
                }
                Err(e) => debug!(self.log, "read failed"; "attempt" => attempt, "error" => %e),
            }

            if attempt < self.retries {
                thread::sleep(self.retry_delay);
            }
        }

        warn!(self.log, "no usable reading"; "pin" => pin, "attempts" => self.retries);
        Ok(None)
    }
}
