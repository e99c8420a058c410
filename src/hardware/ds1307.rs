use std::path;

use chrono;
use failure;
use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;

use super::RealTimeClock;
use crate::config;

const CLOCK_HALT: u8 = 0x80;
const TWELVE_HOUR: u8 = 0x40;
const PM: u8 = 0x20;

/// DS1307 real-time clock.  The bus is opened on every read, so a module that is missing at start
/// up is picked up once it answers.
pub struct Ds1307 {
    device: path::PathBuf,
    address: u16,
}

impl Ds1307 {
    pub fn new(config: &config::Rtc) -> Self {
        Ds1307 {
            device: config.device.clone(),
            address: config.address,
        }
    }
}

impl RealTimeClock for Ds1307 {
    fn read_date_time(&mut self) -> Result<chrono::NaiveDateTime, failure::Error> {
        let mut device = LinuxI2CDevice::new(&self.device, self.address)?;
        let registers = device.smbus_read_i2c_block_data(0x00, 7)?;
        decode(&registers)
    }
}

fn bcd(value: u8) -> u32 {
    u32::from(value >> 4) * 10 + u32::from(value & 0x0f)
}

fn decode(registers: &[u8]) -> Result<chrono::NaiveDateTime, failure::Error> {
    if registers.len() < 7 {
        return Err(failure::err_msg(format!(
            "short register read: {} bytes",
            registers.len()
        )));
    }
    if registers[0] & CLOCK_HALT != 0 {
        return Err(failure::err_msg("the oscillator is halted"));
    }

    let second = bcd(registers[0] & 0x7f);
    let minute = bcd(registers[1] & 0x7f);
    let hour = if registers[2] & TWELVE_HOUR != 0 {
        let hour = bcd(registers[2] & 0x1f) % 12;
        if registers[2] & PM != 0 {
            hour + 12
        } else {
            hour
        }
    } else {
        bcd(registers[2] & 0x3f)
    };
    let day = bcd(registers[4] & 0x3f);
    let month = bcd(registers[5] & 0x1f);
    let year = 2000 + bcd(registers[6]) as i32;

    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| {
            failure::err_msg(format!("registers hold no valid date: {:02x?}", &registers[..7]))
        })
}
