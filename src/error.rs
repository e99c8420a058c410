use std::fmt;

use failure::{self, Backtrace, Context, Fail};

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum ErrorKind {
    /// The time-keeping peripheral could not be read.  Only ever logged, the clock falls back to
    /// host time.
    #[fail(display = "real-time clock unavailable")]
    ClockUnavailable,
    #[fail(display = "could not read {}", _0)]
    SensorRead(Sensor),
    #[fail(display = "could not claim GPIO {}", _0)]
    ActuatorClaim(u8),
    #[fail(display = "could not drive GPIO {}", _0)]
    Actuator(u8),
    #[fail(display = "invalid configuration: {}", _0)]
    InvalidConfig(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sensor {
    AnalogChannel(u8),
    Climate { pin: u8 },
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.inner.get_context()
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl ErrorKind {
    /// Process exit status for `--strict` runs.
    pub fn exit_code(&self) -> i32 {
        match *self {
            ErrorKind::InvalidConfig(_) => 2,
            ErrorKind::SensorRead(_) => 3,
            ErrorKind::ActuatorClaim(_) | ErrorKind::Actuator(_) => 4,
            ErrorKind::ClockUnavailable => 1,
        }
    }
}

/// Exit status of a failed `--strict` run; 1 when the failure carries no `ErrorKind`.
pub fn exit_code(error: &failure::Error) -> i32 {
    error
        .downcast_ref::<Error>()
        .map_or(1, |e| e.kind().exit_code())
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)?;
        let mut cause = self.inner.cause();
        while let Some(c) = cause {
            write!(f, ": {}", c)?;
            cause = c.cause();
        }
        Ok(())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(inner: Context<ErrorKind>) -> Error {
        Error { inner }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Sensor::AnalogChannel(channel) => write!(f, "analog channel {}", channel),
            Sensor::Climate { pin } => write!(f, "climate sensor on GPIO {}", pin),
        }
    }
}

#[cfg(test)]
mod tests {
    use failure::{self, ResultExt};

    use super::*;

    #[test]
    fn display_includes_driver_cause() {
        let result: Result<(), failure::Error> = Err(failure::err_msg("spi transfer failed"));
        let error: Error = result
            .context(ErrorKind::SensorRead(Sensor::AnalogChannel(3)))
            .unwrap_err()
            .into();

        assert_eq!(
            error.kind(),
            &ErrorKind::SensorRead(Sensor::AnalogChannel(3))
        );
        assert_eq!(
            error.to_string(),
            "could not read analog channel 3: spi transfer failed"
        );
    }

    #[test]
    fn strict_exit_codes_distinguish_failures() {
        assert_eq!(ErrorKind::InvalidConfig(String::new()).exit_code(), 2);
        assert_eq!(
            ErrorKind::SensorRead(Sensor::Climate { pin: 27 }).exit_code(),
            3
        );
        assert_eq!(ErrorKind::ActuatorClaim(18).exit_code(), 4);
        assert_eq!(ErrorKind::Actuator(23).exit_code(), 4);
    }

    #[test]
    fn foreign_errors_exit_with_one() {
        assert_eq!(exit_code(&failure::err_msg("spi bus missing")), 1);
        assert_eq!(
            exit_code(&failure::Error::from(Error::from(ErrorKind::Actuator(23)))),
            4
        );
    }

    #[test]
    fn bare_kind_has_no_cause() {
        let error = Error::from(ErrorKind::ActuatorClaim(17));
        assert_eq!(error.to_string(), "could not claim GPIO 17");
    }
}
