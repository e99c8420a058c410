use std::time;

use failure::ResultExt;
use slog;

use crate::config;
use crate::error::{Error, ErrorKind, Sensor};
use crate::hardware::{ClimateSensor, Delay, Gpio};

pub const SERVO_FREQUENCY_HZ: f64 = 50.0;
/// Duty cycle of the 0° position, a 0.5 ms pulse in a 20 ms period.
pub const CLOSED_DUTY: f64 = 2.5;
pub const SETTLE_TIME: time::Duration = time::Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ventilation {
    pub temperature: f64,
    pub humidity: f64,
    pub open: bool,
    pub duty_percent: f64,
}

/// PWM duty cycle in percent that moves the servo to `angle` degrees.
pub fn duty_cycle(angle: f64) -> f64 {
    angle / 20.0 + 2.5
}

/// Opens the window when it is too warm and closes it otherwise.  The servo is driven long enough
/// to reach its position and then released, so it does not buzz or draw current.
pub fn run<C, G, D>(
    log: &slog::Logger,
    climate: &config::Climate,
    window: &config::Window,
    sensor: &mut C,
    gpio: &mut G,
    delay: &mut D,
) -> Result<Ventilation, Error>
where
    C: ClimateSensor,
    G: Gpio,
    D: Delay,
{
    let unreadable = ErrorKind::SensorRead(Sensor::Climate { pin: climate.gpio });
    let reading = sensor
        .read_with_retry(climate.sensor, climate.gpio)
        .context(unreadable.clone())?
        .ok_or(unreadable)?;

    let open = reading.temperature > climate.temperature_threshold;
    let duty_percent = if open {
        duty_cycle(window.open_angle)
    } else {
        CLOSED_DUTY
    };

    let mut servo = gpio
        .start_pwm(window.servo_gpio, SERVO_FREQUENCY_HZ, duty_percent)
        .context(ErrorKind::ActuatorClaim(window.servo_gpio))?;
    delay.delay(SETTLE_TIME);
    servo
        .set_duty_cycle(0.0)
        .context(ErrorKind::Actuator(window.servo_gpio))?;

    info!(log, "moved window";
          "open" => open,
          "temperature" => reading.temperature,
          "humidity" => reading.humidity,
          "duty_percent" => duty_percent);

    Ok(Ventilation {
        temperature: reading.temperature,
        humidity: reading.humidity,
        open,
        duty_percent,
    })
}
