use failure::ResultExt;

use crate::error::{Error, ErrorKind, Sensor};
use crate::hardware::AnalogInput;

pub const DEFAULT_REPETITIONS: u32 = 10;

/// Averages repeated single-shot reads of an analog channel to suppress single-sample noise.
pub struct OversamplingSampler<A> {
    adc: A,
    repetitions: u32,
}

impl<A> OversamplingSampler<A>
where
    A: AnalogInput,
{
    pub fn new(adc: A, repetitions: u32) -> Self {
        OversamplingSampler { adc, repetitions }
    }

    pub fn sample(&mut self, channel: u8) -> Result<f64, Error> {
        let repetitions = self.repetitions;
        self.sample_n(channel, repetitions)
    }

    /// Mean of exactly `repetitions` reads.  A failed read is returned as is, nothing is retried.
    pub fn sample_n(&mut self, channel: u8, repetitions: u32) -> Result<f64, Error> {
        if repetitions == 0 {
            return Err(ErrorKind::InvalidConfig(
                "oversampling needs at least one read".to_owned(),
            )
            .into());
        }

        let mut total = 0u64;
        for _ in 0..repetitions {
            let value = self
                .adc
                .read_channel(channel)
                .context(ErrorKind::SensorRead(Sensor::AnalogChannel(channel)))?;
            total += u64::from(value);
        }

        Ok(total as f64 / f64::from(repetitions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAdc;

    #[test]
    fn constant_signal_averages_to_itself() {
        let adc = FakeAdc::new().constant(0, 731);
        let mut sampler = OversamplingSampler::new(adc.clone(), 10);

        assert_eq!(sampler.sample(0).unwrap(), 731.0);
        assert_eq!(adc.reads(0), 10);
    }

    #[test]
    fn ramp_averages_to_its_mean() {
        let ramp = (0..10).map(|i| i * 100).collect::<Vec<_>>();
        let mut sampler =
            OversamplingSampler::new(FakeAdc::new().sequence(2, &ramp), DEFAULT_REPETITIONS);

        assert_eq!(sampler.sample(2).unwrap(), 450.0);
    }

    #[test]
    fn reads_exactly_n_times() {
        let adc = FakeAdc::new().constant(5, 10);
        let mut sampler = OversamplingSampler::new(adc.clone(), 10);

        assert_eq!(sampler.sample_n(5, 3).unwrap(), 10.0);
        assert_eq!(adc.reads(5), 3);
    }

    #[test]
    fn failed_read_aborts_the_sample() {
        let adc = FakeAdc::new().constant(4, 300).failing_after(4, 5);
        let mut sampler = OversamplingSampler::new(adc.clone(), 10);

        let error = sampler.sample(4).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::SensorRead(Sensor::AnalogChannel(4))
        );
        assert_eq!(adc.reads(4), 6);
    }

    #[test]
    fn zero_repetitions_is_rejected() {
        let adc = FakeAdc::new().constant(0, 1);
        let mut sampler = OversamplingSampler::new(adc.clone(), 10);

        assert!(sampler.sample_n(0, 0).is_err());
        assert_eq!(adc.reads(0), 0);
    }
}
