//! GPIO pin table.
//!
//! Every physical pin access is serialized by a per-pin lock.  An
//! out-of-range pin index yields a null pin that reads permanently low
//! and ignores writes — the fail-safe default for unconfigured
//! hardware, so callers never branch on pin validity.
//!
//! On host targets the pin levels live in memory; with the `hardware`
//! feature, output writes and input reads go through sysfs.

use std::sync::Mutex;

use log::warn;

use super::lock;
use crate::pins::GPIO_PIN_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
    Pwm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullMode {
    Up,
    Down,
    Off,
}

#[derive(Debug)]
struct PinState {
    mode: PinMode,
    pull: PullMode,
    level: bool,
}

impl Default for PinState {
    fn default() -> Self {
        Self {
            mode: PinMode::Input,
            pull: PullMode::Off,
            level: false,
        }
    }
}

/// The process-wide pin table.  One lock per pin; pins are independent.
pub struct GpioPort {
    pins: Vec<Mutex<PinState>>,
}

impl GpioPort {
    pub fn new() -> Self {
        Self {
            pins: (0..GPIO_PIN_COUNT).map(|_| Mutex::new(PinState::default())).collect(),
        }
    }

    /// Handle for a pin index.  Out-of-range indices yield the null pin.
    pub fn pin(&self, index: usize) -> Pin<'_> {
        if index >= self.pins.len() {
            warn!("gpio: pin {index} out of range, substituting null pin");
        }
        Pin {
            index,
            slot: self.pins.get(index),
        }
    }
}

impl Default for GpioPort {
    fn default() -> Self {
        Self::new()
    }
}

/// A single pin.  Null (out-of-range) pins read low and ignore writes.
pub struct Pin<'a> {
    index: usize,
    slot: Option<&'a Mutex<PinState>>,
}

impl Pin<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_null(&self) -> bool {
        self.slot.is_none()
    }

    pub fn read(&self) -> bool {
        let Some(slot) = self.slot else { return false };
        #[cfg(feature = "hardware")]
        {
            let mut st = lock(slot);
            if st.mode == PinMode::Input {
                match super::hw::gpio_read(self.index) {
                    Ok(level) => st.level = level,
                    Err(e) => warn!("gpio: read of pin {} failed: {e}", self.index),
                }
            }
            st.level
        }
        #[cfg(not(feature = "hardware"))]
        {
            lock(slot).level
        }
    }

    pub fn write(&self, high: bool) {
        let Some(slot) = self.slot else { return };
        let mut st = lock(slot);
        st.level = high;
        #[cfg(feature = "hardware")]
        if st.mode == PinMode::Output {
            if let Err(e) = super::hw::gpio_write(self.index, high) {
                warn!("gpio: write to pin {} failed: {e}", self.index);
            }
        }
    }

    pub fn set_mode(&self, mode: PinMode) {
        let Some(slot) = self.slot else { return };
        let mut st = lock(slot);
        st.mode = mode;
        #[cfg(feature = "hardware")]
        {
            let r = super::hw::gpio_export(self.index)
                .and_then(|()| super::hw::gpio_set_direction(self.index, mode == PinMode::Output));
            if let Err(e) = r {
                warn!("gpio: mode change on pin {} failed: {e}", self.index);
            }
        }
    }

    pub fn set_pull(&self, pull: PullMode) {
        let Some(slot) = self.slot else { return };
        let mut st = lock(slot);
        st.pull = pull;
    }

    /// Current mode, `None` for the null pin.
    pub fn mode(&self) -> Option<PinMode> {
        self.slot.map(|slot| lock(slot).mode)
    }
}
