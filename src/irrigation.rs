use std::time;

use failure::ResultExt;
use slog;

use crate::config;
use crate::error::{Error, ErrorKind};
use crate::hardware::{AnalogInput, Delay, Gpio};
use crate::sensors::OversamplingSampler;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Watering {
    Watered(time::Duration),
    Skipped,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BedReport {
    pub name: String,
    pub score: f64,
    pub watering: Watering,
}

/// Mean of the per-channel oversampled means of a bed's moisture sensors.
pub fn moisture_score<A>(
    sampler: &mut OversamplingSampler<A>,
    plant: &config::Plant,
) -> Result<f64, Error>
where
    A: AnalogInput,
{
    if plant.moisture_channels.is_empty() {
        return Err(ErrorKind::InvalidConfig(format!(
            "plant {:?} has no moisture channels",
            plant.name
        ))
        .into());
    }

    let mut total = 0.0;
    for &channel in &plant.moisture_channels {
        total += sampler.sample(channel)?;
    }

    Ok(total / plant.moisture_channels.len() as f64)
}

/// Higher readings mean drier soil.
pub fn needs_water(plant: &config::Plant, score: f64) -> bool {
    score > plant.moisture_threshold
}

/// Evaluates every bed in order, running the pump of each dry one for its watering time.  The
/// watering blocks, so later beds wait for earlier ones.  The first failure ends the run.
pub fn run<A, G, D>(
    log: &slog::Logger,
    plants: &[config::Plant],
    irrigation: &config::Irrigation,
    sampler: &mut OversamplingSampler<A>,
    gpio: &mut G,
    delay: &mut D,
) -> Result<Vec<BedReport>, Error>
where
    A: AnalogInput,
    G: Gpio,
    D: Delay,
{
    let mut reports = Vec::with_capacity(plants.len());

    for plant in plants {
        let log = log.new(o!("plant" => plant.name.clone()));
        let score = moisture_score(sampler, plant)?;

        let watering = if needs_water(plant, score) {
            info!(log, "watering";
                  "score" => score,
                  "threshold" => plant.moisture_threshold,
                  "seconds" => plant.watering_time.as_secs());
            water(plant, gpio, delay)?;
            Watering::Watered(plant.watering_time)
        } else {
            debug!(log, "moist enough"; "score" => score, "threshold" => plant.moisture_threshold);
            if irrigation.enforce_idle_off {
                gpio.configure_output(plant.pump_gpio, plant.polarity.level(false))
                    .context(ErrorKind::ActuatorClaim(plant.pump_gpio))?;
            }
            Watering::Skipped
        };

        reports.push(BedReport {
            name: plant.name.clone(),
            score,
            watering,
        });
    }

    Ok(reports)
}

fn water<G, D>(plant: &config::Plant, gpio: &mut G, delay: &mut D) -> Result<(), Error>
where
    G: Gpio,
    D: Delay,
{
    gpio.configure_output(plant.pump_gpio, plant.polarity.level(true))
        .context(ErrorKind::ActuatorClaim(plant.pump_gpio))?;
    delay.delay(plant.watering_time);
    gpio.set_output(plant.pump_gpio, plant.polarity.level(false))
        .context(ErrorKind::Actuator(plant.pump_gpio))?;
    Ok(())
}
