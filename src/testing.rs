//! In-memory stand-ins for the peripherals.  Clones share state, so a test can hand one copy to
//! the code under test and inspect the other.
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::mem;
use std::rc::Rc;
use std::time;

use chrono;
use failure;
use slog;

use crate::hardware::{
    AnalogInput, ClimateReading, ClimateSensor, Delay, Gpio, Level, RealTimeClock, SensorKind,
};

pub fn logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, o!())
}

pub fn at_hour(hour: u32) -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Configure(u8, Level),
    Set(u8, Level),
    StartPwm {
        pin: u8,
        frequency_hz: f64,
        duty_percent: f64,
    },
    Duty(u8, f64),
    Delay(time::Duration),
    Release(u8),
}

/// Ordered record of everything the fakes were asked to do.
#[derive(Clone, Debug, Default)]
pub struct Journal(Rc<RefCell<Vec<Event>>>);

impl Journal {
    fn record(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }
}

#[derive(Debug, Default)]
struct GpioState {
    claimed: BTreeSet<u8>,
    levels: HashMap<u8, Level>,
    refusing: BTreeSet<u8>,
    release_calls: u32,
}

#[derive(Clone, Debug)]
pub struct FakeGpio {
    journal: Journal,
    state: Rc<RefCell<GpioState>>,
}

impl FakeGpio {
    pub fn new() -> Self {
        FakeGpio::with_journal(Journal::default())
    }

    pub fn with_journal(journal: Journal) -> Self {
        FakeGpio {
            journal,
            state: Rc::new(RefCell::new(GpioState::default())),
        }
    }

    /// Makes claiming `pin` fail as if another process held it.
    pub fn refusing(self, pin: u8) -> Self {
        self.state.borrow_mut().refusing.insert(pin);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.journal.events()
    }

    pub fn level(&self, pin: u8) -> Option<Level> {
        self.state.borrow().levels.get(&pin).cloned()
    }

    pub fn claimed(&self) -> BTreeSet<u8> {
        self.state.borrow().claimed.clone()
    }

    pub fn release_calls(&self) -> u32 {
        self.state.borrow().release_calls
    }

    fn claim(&self, pin: u8) -> Result<(), failure::Error> {
        let mut state = self.state.borrow_mut();
        if state.refusing.contains(&pin) {
            return Err(failure::err_msg(format!("GPIO {} is busy", pin)));
        }
        state.claimed.insert(pin);
        Ok(())
    }

    fn check_claimed(&self, pin: u8) -> Result<(), failure::Error> {
        if self.state.borrow().claimed.contains(&pin) {
            Ok(())
        } else {
            Err(failure::err_msg(format!("GPIO {} is not claimed", pin)))
        }
    }
}

impl Gpio for FakeGpio {
    fn configure_output(&mut self, pin: u8, initial: Level) -> Result<(), failure::Error> {
        self.claim(pin)?;
        self.state.borrow_mut().levels.insert(pin, initial);
        self.journal.record(Event::Configure(pin, initial));
        Ok(())
    }

    fn set_output(&mut self, pin: u8, level: Level) -> Result<(), failure::Error> {
        self.check_claimed(pin)?;
        self.state.borrow_mut().levels.insert(pin, level);
        self.journal.record(Event::Set(pin, level));
        Ok(())
    }

    fn start_pwm_output(
        &mut self,
        pin: u8,
        frequency_hz: f64,
        duty_percent: f64,
    ) -> Result<(), failure::Error> {
        self.claim(pin)?;
        self.journal.record(Event::StartPwm {
            pin,
            frequency_hz,
            duty_percent,
        });
        Ok(())
    }

    fn set_pwm_duty_cycle(&mut self, pin: u8, duty_percent: f64) -> Result<(), failure::Error> {
        self.check_claimed(pin)?;
        self.journal.record(Event::Duty(pin, duty_percent));
        Ok(())
    }

    fn release_all(&mut self) {
        let mut state = self.state.borrow_mut();
        state.release_calls += 1;
        for pin in mem::replace(&mut state.claimed, BTreeSet::new()) {
            state.levels.remove(&pin);
            self.journal.record(Event::Release(pin));
        }
    }
}

#[derive(Debug, Default)]
struct AdcState {
    sequences: HashMap<u8, Vec<u16>>,
    fail_after: HashMap<u8, u32>,
    reads: HashMap<u8, u32>,
}

#[derive(Clone, Debug, Default)]
pub struct FakeAdc(Rc<RefCell<AdcState>>);

impl FakeAdc {
    pub fn new() -> Self {
        FakeAdc::default()
    }

    pub fn constant(self, channel: u8, value: u16) -> Self {
        self.sequence(channel, &[value])
    }

    /// Reads of `channel` cycle through `values`.
    pub fn sequence(self, channel: u8, values: &[u16]) -> Self {
        self.0
            .borrow_mut()
            .sequences
            .insert(channel, values.to_vec());
        self
    }

    /// Every read of `channel` after the first `reads` fails.
    pub fn failing_after(self, channel: u8, reads: u32) -> Self {
        self.0.borrow_mut().fail_after.insert(channel, reads);
        self
    }

    pub fn reads(&self, channel: u8) -> u32 {
        self.0.borrow().reads.get(&channel).cloned().unwrap_or(0)
    }
}

impl AnalogInput for FakeAdc {
    fn read_channel(&mut self, channel: u8) -> Result<u16, failure::Error> {
        let mut state = self.0.borrow_mut();
        let count = {
            let reads = state.reads.entry(channel).or_insert(0);
            *reads += 1;
            *reads
        };

        if let Some(&ok_reads) = state.fail_after.get(&channel) {
            if count > ok_reads {
                return Err(failure::err_msg(format!(
                    "channel {} did not answer",
                    channel
                )));
            }
        }

        match state.sequences.get(&channel) {
            Some(values) if !values.is_empty() => {
                Ok(values[(count as usize - 1) % values.len()])
            }
            _ => Err(failure::err_msg(format!("channel {} is not wired", channel))),
        }
    }
}

pub struct FakeRtc(Option<chrono::NaiveDateTime>);

impl FakeRtc {
    pub fn at(now: chrono::NaiveDateTime) -> Self {
        FakeRtc(Some(now))
    }

    pub fn broken() -> Self {
        FakeRtc(None)
    }
}

impl RealTimeClock for FakeRtc {
    fn read_date_time(&mut self) -> Result<chrono::NaiveDateTime, failure::Error> {
        self.0
            .ok_or_else(|| failure::err_msg("no acknowledge from 0x68"))
    }
}

pub enum FakeClimate {
    Reading(ClimateReading),
    Missing,
    Broken,
}

impl FakeClimate {
    pub fn reading(temperature: f64, humidity: f64) -> Self {
        FakeClimate::Reading(ClimateReading {
            humidity,
            temperature,
        })
    }
}

impl ClimateSensor for FakeClimate {
    fn read_with_retry(
        &mut self,
        _kind: SensorKind,
        _pin: u8,
    ) -> Result<Option<ClimateReading>, failure::Error> {
        match *self {
            FakeClimate::Reading(reading) => Ok(Some(reading)),
            FakeClimate::Missing => Ok(None),
            FakeClimate::Broken => Err(failure::err_msg("no dht11 IIO device found")),
        }
    }
}

/// Records delays in the journal instead of sleeping.
pub struct RecordingDelay(Journal);

impl RecordingDelay {
    pub fn new(journal: Journal) -> Self {
        RecordingDelay(journal)
    }
}

impl Delay for RecordingDelay {
    fn delay(&mut self, duration: time::Duration) {
        self.0.record(Event::Delay(duration));
    }
}
