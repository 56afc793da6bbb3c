//! Shared hardware bus layer.
//!
//! All physical I/O — SPI, GPIO, the shift-register output latch and
//! the ADC — funnels through one [`BusContext`], constructed once at
//! startup and handed to every component by `Arc`.  It is the single
//! point of mutual exclusion for the hardware, no matter how many
//! session threads are running:
//!
//! - the SPI transport (and the ADC, which rides it) share one
//!   transport-wide lock,
//! - the shift-register latch value has its own lock for
//!   read-modify-write bit operations,
//! - GPIO pins are locked individually.

pub mod adc;
pub mod gpio;
pub mod shiftreg;
pub mod spi;

#[cfg(feature = "hardware")]
mod hw;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::info;

use crate::config::Config;
use crate::error::Result;
use crate::pins;

use adc::Adc;
use gpio::{GpioPort, PinMode};
use shiftreg::ShiftRegister;
use spi::SpiPort;

/// Lock a mutex, recovering the data from a poisoned lock.  A panic on
/// another session thread must not take the bus down with it.
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Raw transports: the SPI port under its transport-wide lock, and the
/// per-pin-locked GPIO table.
pub struct Bus {
    pub spi: Mutex<SpiPort>,
    pub gpio: GpioPort,
}

/// Process-wide hardware context.
///
/// Lifetime = process lifetime; initialized once before any session
/// starts and never re-initialized while sessions are running.
pub struct BusContext {
    bus: Arc<Bus>,
    pub shift_reg: ShiftRegister,
    pub adc: Adc,
}

impl BusContext {
    pub fn new(config: &Config) -> Result<Arc<Self>> {
        let spi = SpiPort::open(&config.spi)?;

        let gpio = GpioPort::new();
        gpio.pin(pins::SHIFTREG_RCLK_PIN).set_mode(PinMode::Output);
        let cs = gpio.pin(pins::ADC_CS_PIN);
        cs.set_mode(PinMode::Output);
        // MCP3008 chip select is active low; park it deasserted.
        cs.write(true);

        let bus = Arc::new(Bus {
            spi: Mutex::new(spi),
            gpio,
        });

        let shift_reg = ShiftRegister::new(Arc::clone(&bus), pins::SHIFTREG_RCLK_PIN);
        // Drive every latched output low before any session starts.
        shift_reg.init()?;

        let adc = Adc::new(Arc::clone(&bus), pins::ADC_CS_PIN, config.adc.ref_voltage);

        info!(
            "bus: ready (spi={} mode={} {}Hz, vref={}V)",
            config.spi.dev, config.spi.mode, config.spi.max_clock, config.adc.ref_voltage
        );
        Ok(Arc::new(Self {
            bus,
            shift_reg,
            adc,
        }))
    }

    /// Raw transport access (tests use this to script the sim wire).
    pub fn raw(&self) -> &Arc<Bus> {
        &self.bus
    }
}
