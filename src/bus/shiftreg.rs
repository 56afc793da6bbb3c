//! 16-bit shift-register output latch (74HC595 pair).
//!
//! The full output value is kept in memory; every bit operation is a
//! read-modify-write under a single lock, so concurrent sessions
//! toggling different effector bits never lose each other's updates.
//! A write pushes both bytes MSB-first over SPI, then strobes the
//! register clock so the physical outputs change atomically.

use std::sync::{Arc, Mutex};

use super::{lock, Bus};
use crate::error::BusError;

/// Width of the latch.
pub const SHIFTREG_BITS: usize = 16;

/// Display backlight output.
pub const BACKLIGHT_BIT: usize = 0;

/// Effector channels 0-7 occupy the high byte.
pub const EFFECTOR_BIT_BASE: usize = 8;

pub struct ShiftRegister {
    bus: Arc<Bus>,
    strobe_pin: usize,
    latch: Mutex<u16>,
}

impl ShiftRegister {
    pub(crate) fn new(bus: Arc<Bus>, strobe_pin: usize) -> Self {
        Self {
            bus,
            strobe_pin,
            latch: Mutex::new(0),
        }
    }

    /// Drive the physical outputs to the in-memory value (all-off at
    /// construction).  Called once before any session starts.
    pub fn init(&self) -> Result<(), BusError> {
        let guard = lock(&self.latch);
        self.commit(*guard)
    }

    pub fn set(&self, bit: usize) -> Result<(), BusError> {
        self.update(bit, |v, m| v | m)
    }

    pub fn clear(&self, bit: usize) -> Result<(), BusError> {
        self.update(bit, |v, m| v & !m)
    }

    pub fn toggle(&self, bit: usize) -> Result<(), BusError> {
        self.update(bit, |v, m| v ^ m)
    }

    pub fn is_set(&self, bit: usize) -> Result<bool, BusError> {
        check_bit(bit)?;
        let guard = lock(&self.latch);
        Ok(*guard & (1 << bit) != 0)
    }

    /// Replace the entire latch value.
    pub fn write(&self, value: u16) -> Result<(), BusError> {
        let mut guard = lock(&self.latch);
        self.commit(value)?;
        *guard = value;
        Ok(())
    }

    /// Current in-memory latch value.
    pub fn value(&self) -> u16 {
        *lock(&self.latch)
    }

    fn update(&self, bit: usize, f: impl FnOnce(u16, u16) -> u16) -> Result<(), BusError> {
        check_bit(bit)?;
        let mut guard = lock(&self.latch);
        let next = f(*guard, 1 << bit);
        // Commit to hardware first; the in-memory value only changes
        // once the outputs do.
        self.commit(next)?;
        *guard = next;
        Ok(())
    }

    fn commit(&self, value: u16) -> Result<(), BusError> {
        {
            let mut spi = lock(&self.bus.spi);
            let bytes = value.to_be_bytes();
            spi.transfer(Some(&bytes), None)?;
        }
        // Latch the shifted bits onto the outputs.
        let strobe = self.bus.gpio.pin(self.strobe_pin);
        strobe.write(true);
        strobe.write(false);
        Ok(())
    }
}

fn check_bit(bit: usize) -> Result<(), BusError> {
    if bit >= SHIFTREG_BITS {
        return Err(BusError::InvalidBit(bit));
    }
    Ok(())
}

#[cfg(all(test, not(feature = "hardware")))]
mod tests {
    use super::*;
    use crate::bus::gpio::GpioPort;
    use crate::bus::spi::SpiPort;
    use crate::config::SpiConfig;

    fn test_bus() -> Arc<Bus> {
        Arc::new(Bus {
            spi: Mutex::new(SpiPort::open(&SpiConfig::default()).unwrap()),
            gpio: GpioPort::new(),
        })
    }

    #[test]
    fn set_clear_toggle_track_the_latch() {
        let sr = ShiftRegister::new(test_bus(), 25);
        sr.set(3).unwrap();
        assert!(sr.is_set(3).unwrap());
        sr.toggle(3).unwrap();
        assert!(!sr.is_set(3).unwrap());
        sr.set(8).unwrap();
        sr.set(9).unwrap();
        sr.clear(8).unwrap();
        assert_eq!(sr.value(), 1 << 9);
    }

    #[test]
    fn write_pushes_msb_first() {
        let bus = test_bus();
        let sr = ShiftRegister::new(Arc::clone(&bus), 25);
        sr.write(0xAB01).unwrap();
        let frames = lock(&bus.spi).sim_take_frames();
        assert_eq!(frames, vec![vec![0xAB, 0x01]]);
    }

    #[test]
    fn bit_out_of_range_rejected() {
        let sr = ShiftRegister::new(test_bus(), 25);
        assert_eq!(sr.set(16).unwrap_err(), BusError::InvalidBit(16));
        assert_eq!(sr.is_set(99).unwrap_err(), BusError::InvalidBit(99));
        assert_eq!(sr.value(), 0);
    }

    #[test]
    fn failed_commit_leaves_memory_unchanged() {
        let bus = Arc::new(Bus {
            spi: Mutex::new(SpiPort::unconfigured()),
            gpio: GpioPort::new(),
        });
        let sr = ShiftRegister::new(bus, 25);
        assert!(sr.set(2).is_err());
        assert!(!sr.is_set(2).unwrap());
    }
}
