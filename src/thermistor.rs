//! NTC thermistor model.
//!
//! Simplified Beta (Steinhart-Hart) equation parameterised by a single
//! beta coefficient and a reference point (R0 at T0):
//!
//!   1/T = 1/T0 + ln(R/R0) / beta
//!
//! With R_inf = R0 * exp(-beta/T0), precomputed at construction, this
//! collapses to T = beta / ln(R / R_inf).  Both conversions are pure
//! functions of the immutable parameters.

use crate::temperature::Temperature;

#[derive(Debug, Clone, Copy)]
pub struct Thermistor {
    beta: f64,
    r0: f64,
    t0: Temperature,
    r_inf: f64,
}

impl Thermistor {
    /// `r0` is the reference resistance in ohms at reference
    /// temperature `t0`; `beta` in kelvin.
    pub fn new(beta: f64, r0: f64, t0: Temperature) -> Self {
        let r_inf = r0 * (-beta / t0.to_kelvin()).exp();
        Self { beta, r0, t0, r_inf }
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn r0(&self) -> f64 {
        self.r0
    }

    pub fn t0(&self) -> Temperature {
        self.t0
    }

    /// Temperature for a measured resistance.  Returns the 0 K sentinel
    /// for inputs outside the equation's domain (open/short circuit).
    pub fn temperature_from_resistance(&self, ohms: f64) -> Temperature {
        if !(ohms > 0.0) || !ohms.is_finite() {
            return Temperature::zero();
        }
        let ln_ratio = (ohms / self.r_inf).ln();
        if ln_ratio <= 0.0 {
            // Hotter than the model's asymptote — not a physical reading.
            return Temperature::zero();
        }
        Temperature::from_kelvin_clamped(self.beta / ln_ratio)
    }

    /// Resistance at a given temperature.  Returns 0 ohms for the
    /// sentinel (no reading).
    pub fn resistance_from_temperature(&self, t: Temperature) -> f64 {
        if !t.is_valid() {
            return 0.0;
        }
        self.r_inf * (self.beta / t.to_kelvin()).exp()
    }
}
