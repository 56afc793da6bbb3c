//! MCP3008 10-bit ADC reader.
//!
//! One conversion is a 3-byte full-duplex exchange: start bit,
//! single-ended mode + channel select, then a don't-care byte while
//! the result clocks out.  Chip select is asserted around the
//! exchange, and the whole conversation happens under the
//! transport-wide SPI lock because the bus is half-duplex per
//! transaction.

use std::sync::Arc;

use super::{lock, Bus};
use crate::error::BusError;

/// Channels the device supports.
pub const ADC_CHANNELS: usize = 8;

/// 10-bit full scale.
const FULL_SCALE: f64 = 1023.0;

pub struct Adc {
    bus: Arc<Bus>,
    cs_pin: usize,
    ref_voltage: f64,
}

impl Adc {
    pub(crate) fn new(bus: Arc<Bus>, cs_pin: usize, ref_voltage: f64) -> Self {
        Self {
            bus,
            cs_pin,
            ref_voltage,
        }
    }

    pub fn ref_voltage(&self) -> f64 {
        self.ref_voltage
    }

    /// Read one channel and return the input voltage.
    ///
    /// Channel indices outside the device's range are rejected before
    /// any bus activity.
    pub fn read(&self, channel: usize) -> Result<f64, BusError> {
        if channel >= ADC_CHANNELS {
            return Err(BusError::InvalidChannel(channel));
        }

        // Start bit; single-ended + channel select in the top nibble;
        // don't-care while the conversion clocks out.
        let tx = [0x01, 0x80 | ((channel as u8) << 4), 0x00];
        let mut rx = [0u8; 3];

        {
            let mut spi = lock(&self.bus.spi);
            let cs = self.bus.gpio.pin(self.cs_pin);
            cs.write(false);
            let result = spi.transfer(Some(&tx), Some(&mut rx));
            cs.write(true);
            result?;
        }

        let raw = (u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]);
        Ok(f64::from(raw) * self.ref_voltage / FULL_SCALE)
    }
}
