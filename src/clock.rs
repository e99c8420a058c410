use chrono;
use slog;

use crate::error::ErrorKind;
use crate::hardware::RealTimeClock;

/// Local time from the real-time clock, or from the host when the clock cannot be read.
pub struct ClockSource<R> {
    log: slog::Logger,
    rtc: R,
    fallback: fn() -> chrono::NaiveDateTime,
}

fn host_time() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

impl<R> ClockSource<R>
where
    R: RealTimeClock,
{
    pub fn new(log: slog::Logger, rtc: R) -> Self {
        ClockSource {
            log,
            rtc,
            fallback: host_time,
        }
    }

    #[cfg(test)]
    pub fn with_fallback(mut self, fallback: fn() -> chrono::NaiveDateTime) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn now(&mut self) -> chrono::NaiveDateTime {
        match self.rtc.read_date_time() {
            Ok(now) => now,
            Err(e) => {
                let now = (self.fallback)();
                warn!(self.log, "{}, using host time", ErrorKind::ClockUnavailable;
                      "error" => %e, "host_time" => %now);
                now
            }
        }
    }
}
