//! System configuration parameters.
//!
//! All tunable parameters for the controller.  Loaded from a JSON file
//! by the daemon; defaults match the reference hardware (MCP3008 ADC,
//! 147 uA thermistor current source, 500 kHz SPI).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub adc: AdcConfig,
    pub spi: SpiConfig,
    pub session: SessionConfig,
    pub sensor: SensorConfig,
}

/// ADC front-end parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdcConfig {
    /// Full-scale reference voltage in volts.
    pub ref_voltage: f64,
    /// Default thermistor bias current in microamps.  A sensor record
    /// may carry its own per-device value.
    pub isource_ua: f64,
}

/// SPI bus setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiConfig {
    /// Device node, e.g. `/dev/spidev0.0`.
    pub dev: String,
    /// SPI clock mode (0-3).
    pub mode: u8,
    /// Maximum clock speed in Hz.
    pub max_clock: u32,
}

/// Control-loop parameters shared by every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Hysteresis half-width in degrees Celsius.  Must be > 0.
    pub dead_zone: f64,
    /// Control tick period in seconds.  Must be > 0.
    pub effector_update_interval_s: f64,
}

/// Sensor filtering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Moving-average window length N.  Must be >= 1.
    pub average_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adc: AdcConfig::default(),
            spi: SpiConfig::default(),
            session: SessionConfig::default(),
            sensor: SensorConfig::default(),
        }
    }
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            ref_voltage: 3.3,
            isource_ua: 147.0,
        }
    }
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            dev: "/dev/spidev0.0".to_owned(),
            mode: 0,
            max_clock: 500_000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dead_zone: 0.5,
            effector_update_interval_s: 1.0,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self { average_len: 64 }
    }
}

impl Config {
    /// Validate every field.  Invalid values are rejected, not clamped,
    /// so a bad config file cannot silently weaken the control loop.
    pub fn validate(&self) -> Result<()> {
        if !(self.adc.ref_voltage > 0.0) {
            return Err(Error::Config("adc.ref_voltage must be > 0"));
        }
        if !(self.adc.isource_ua > 0.0) {
            return Err(Error::Config("adc.isource_ua must be > 0"));
        }
        if self.spi.mode > 3 {
            return Err(Error::Config("spi.mode must be 0-3"));
        }
        if self.spi.max_clock == 0 {
            return Err(Error::Config("spi.max_clock must be > 0"));
        }
        if !(self.session.dead_zone > 0.0) {
            return Err(Error::Config("session.dead_zone must be > 0"));
        }
        if !(self.session.effector_update_interval_s > 0.0) {
            return Err(Error::Config("session.effector_update_interval_s must be > 0"));
        }
        if self.sensor.average_len == 0 {
            return Err(Error::Config("sensor.average_len must be >= 1"));
        }
        Ok(())
    }
}
