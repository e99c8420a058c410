use failure;
use rppal::spi;

use super::AnalogInput;
use crate::config;

pub const CHANNELS: u8 = 8;

/// MCP3008 10-bit ADC on the SPI bus.  The bus is opened on the first read, so a broken SPI
/// setup surfaces as a failed sample.
pub struct Mcp3008 {
    config: config::Adc,
    spi: Option<spi::Spi>,
}

impl Mcp3008 {
    pub fn new(config: &config::Adc) -> Self {
        Mcp3008 {
            config: config.clone(),
            spi: None,
        }
    }

    fn spi(&mut self) -> Result<&spi::Spi, failure::Error> {
        if self.spi.is_none() {
            self.spi = Some(open(&self.config)?);
        }
        self.spi
            .as_ref()
            .ok_or_else(|| failure::err_msg("SPI bus is not open"))
    }
}

fn open(config: &config::Adc) -> Result<spi::Spi, failure::Error> {
    let bus = match config.bus {
        0 => spi::Bus::Spi0,
        1 => spi::Bus::Spi1,
        2 => spi::Bus::Spi2,
        other => return Err(failure::err_msg(format!("no SPI bus {}", other))),
    };
    let slave_select = match config.slave_select {
        0 => spi::SlaveSelect::Ss0,
        1 => spi::SlaveSelect::Ss1,
        2 => spi::SlaveSelect::Ss2,
        other => return Err(failure::err_msg(format!("no SPI slave select {}", other))),
    };
    Ok(spi::Spi::new(
        bus,
        slave_select,
        config.clock_hz,
        spi::Mode::Mode0,
    )?)
}

/// Start bit, then single-ended mode and the channel in the high nibble of the second byte.
fn request(channel: u8) -> [u8; 3] {
    [0x01, (0x08 | channel) << 4, 0x00]
}

fn decode(response: &[u8; 3]) -> u16 {
    (u16::from(response[1] & 0x03) << 8) | u16::from(response[2])
}

impl AnalogInput for Mcp3008 {
    fn read_channel(&mut self, channel: u8) -> Result<u16, failure::Error> {
        if channel >= CHANNELS {
            return Err(failure::err_msg(format!(
                "the MCP3008 has no channel {}",
                channel
            )));
        }

        let mut response = [0u8; 3];
        self.spi()?.transfer(&mut response, &request(channel))?;
        Ok(decode(&response))
    }
}
