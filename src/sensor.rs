//! Vessel temperature sensing.
//!
//! A thermistor is biased by a constant current source and read
//! through the ADC; the measured voltage converts to resistance and
//! then to temperature through the beta equation.  Raw samples feed a
//! moving-average filter; everything downstream of `sense()` sees the
//! filtered value only.

use std::sync::Arc;

use crate::bus::BusContext;
use crate::config::Config;
use crate::error::{Error, Result, SensorError};
use crate::store::SensorRecord;
use crate::temperature::{Temperature, TemperatureUnit};
use crate::thermistor::Thermistor;

pub trait TempSensor: Send {
    /// Take one reading and return the updated filtered temperature.
    /// A failed reading leaves the filter untouched.
    fn sense(&mut self) -> Result<Temperature>;

    /// Whether the filtered value lies within the sensor's configured
    /// physical range.  False until at least one sample has landed.
    fn in_range(&self) -> bool;

    /// Current filtered temperature (sentinel before the first sample).
    fn average(&self) -> Temperature;

    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Thermistor-backed vessel sensor
// ---------------------------------------------------------------------------

pub struct VesselSensor {
    ctx: Arc<BusContext>,
    name: String,
    channel: usize,
    thermistor: Thermistor,
    /// Bias current in amps.
    isource_a: f64,
    /// Moving-average window length N.
    window: usize,
    avg_kelvin: f64,
    primed: bool,
    min: Temperature,
    max: Temperature,
}

impl core::fmt::Debug for VesselSensor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VesselSensor")
            .field("name", &self.name)
            .field("channel", &self.channel)
            .field("thermistor", &self.thermistor)
            .field("isource_a", &self.isource_a)
            .field("window", &self.window)
            .field("avg_kelvin", &self.avg_kelvin)
            .field("primed", &self.primed)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

impl VesselSensor {
    /// Build a sensor from its storage record.  The record must
    /// describe a thermistor; any other declared device type is a
    /// configuration error.
    pub fn from_record(
        ctx: Arc<BusContext>,
        rec: &SensorRecord,
        config: &Config,
    ) -> Result<Self> {
        if !rec.kind.eq_ignore_ascii_case("thermistor") {
            return Err(Error::Config("sensor type must be \"thermistor\""));
        }
        let t0 = Temperature::new(rec.ref_temp_celsius, TemperatureUnit::Celsius)
            .ok_or(Error::Config("sensor reference temperature below absolute zero"))?;
        if !(rec.ref_resistance > 0.0) || !(rec.beta > 0.0) {
            return Err(Error::Config("sensor beta and reference resistance must be > 0"));
        }
        let min = Temperature::new(rec.range_min_celsius, TemperatureUnit::Celsius)
            .ok_or(Error::Config("sensor range minimum below absolute zero"))?;
        let max = Temperature::new(rec.range_max_celsius, TemperatureUnit::Celsius)
            .ok_or(Error::Config("sensor range maximum below absolute zero"))?;
        if min > max {
            return Err(Error::Config("sensor range is inverted"));
        }
        let isource_ua = rec.isource_ua.unwrap_or(config.adc.isource_ua);
        if !(isource_ua > 0.0) {
            return Err(Error::Config("sensor bias current must be > 0"));
        }

        Ok(Self {
            ctx,
            name: rec.name.clone(),
            channel: rec.channel,
            thermistor: Thermistor::new(rec.beta, rec.ref_resistance, t0),
            isource_a: isource_ua * 1e-6,
            window: config.sensor.average_len,
            avg_kelvin: 0.0,
            primed: false,
            min,
            max,
        })
    }

    pub fn channel(&self) -> usize {
        self.channel
    }
}

impl TempSensor for VesselSensor {
    fn sense(&mut self) -> Result<Temperature> {
        let volts = self.ctx.adc.read(self.channel)?;
        let ohms = volts / self.isource_a;
        let sample = self.thermistor.temperature_from_resistance(ohms);
        if !sample.is_valid() {
            return Err(SensorError::Conversion.into());
        }

        let k = sample.to_kelvin();
        if self.primed {
            let n = self.window as f64;
            self.avg_kelvin = self.avg_kelvin - self.avg_kelvin / n + k / n;
        } else {
            // First sample initialises the filter directly.
            self.avg_kelvin = k;
            self.primed = true;
        }
        Ok(Temperature::from_kelvin_clamped(self.avg_kelvin))
    }

    fn in_range(&self) -> bool {
        if !self.primed {
            return false;
        }
        let avg = Temperature::from_kelvin_clamped(self.avg_kelvin);
        avg >= self.min && avg <= self.max
    }

    fn average(&self) -> Temperature {
        if self.primed {
            Temperature::from_kelvin_clamped(self.avg_kelvin)
        } else {
            Temperature::zero()
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Null sensor
// ---------------------------------------------------------------------------

/// Stand-in for a session (or the ambient slot) with no sensor wired.
/// Reads always succeed with the sentinel and never report in-range,
/// so the control loop holds its fail-safe posture uniformly.
pub struct NullSensor;

impl TempSensor for NullSensor {
    fn sense(&mut self) -> Result<Temperature> {
        Ok(Temperature::zero())
    }

    fn in_range(&self) -> bool {
        false
    }

    fn average(&self) -> Temperature {
        Temperature::zero()
    }

    fn name(&self) -> &str {
        "none"
    }
}

#[cfg(all(test, not(feature = "hardware")))]
mod tests {
    use super::*;
    use crate::bus::lock;

    fn record() -> SensorRecord {
        SensorRecord {
            session_id: Some(1),
            name: "vessel 1".to_owned(),
            kind: "thermistor".to_owned(),
            channel: 0,
            ref_temp_celsius: 25.0,
            ref_resistance: 10_000.0,
            beta: 3977.0,
            range_min_celsius: -5.0,
            range_max_celsius: 80.0,
            isource_ua: None,
        }
    }

    fn context(average_len: usize) -> (Arc<BusContext>, Config) {
        let mut config = Config::default();
        config.sensor.average_len = average_len;
        let ctx = BusContext::new(&config).unwrap();
        (ctx, config)
    }

    /// Queue the ADC reply that corresponds to the given vessel
    /// temperature, derived through the same electrical model the
    /// sensor inverts.
    fn queue_celsius(ctx: &Arc<BusContext>, rec: &SensorRecord, config: &Config, celsius: f64) {
        let t0 = Temperature::new(rec.ref_temp_celsius, TemperatureUnit::Celsius).unwrap();
        let th = Thermistor::new(rec.beta, rec.ref_resistance, t0);
        let ohms =
            th.resistance_from_temperature(Temperature::new(celsius, TemperatureUnit::Celsius).unwrap());
        let volts = ohms * config.adc.isource_ua * 1e-6;
        let raw = (volts / config.adc.ref_voltage * 1023.0).round() as u16;
        lock(&ctx.raw().spi).sim_queue_reply(vec![0x00, (raw >> 8) as u8 & 0x03, raw as u8]);
    }

    #[test]
    fn reading_round_trips_through_the_electrical_model() {
        let (ctx, config) = context(1);
        let rec = record();
        let mut sensor = VesselSensor::from_record(Arc::clone(&ctx), &rec, &config).unwrap();
        queue_celsius(&ctx, &rec, &config, 20.0);
        let t = sensor.sense().unwrap();
        // 10-bit quantisation leaves a fraction of a degree.
        assert!((t.to_celsius() - 20.0).abs() < 0.5, "got {t}");
        assert!(sensor.in_range());
    }

    #[test]
    fn filter_converges_on_a_step_change() {
        let (ctx, config) = context(4);
        let rec = record();
        let mut sensor = VesselSensor::from_record(Arc::clone(&ctx), &rec, &config).unwrap();

        queue_celsius(&ctx, &rec, &config, 20.0);
        let first = sensor.sense().unwrap().to_celsius();

        // Step the vessel to 30C; the average moves a quarter of the way.
        queue_celsius(&ctx, &rec, &config, 30.0);
        let second = sensor.sense().unwrap().to_celsius();
        assert!(second > first && second < 25.0, "average jumped: {second}");
    }

    #[test]
    fn conversion_failure_leaves_the_filter_untouched() {
        let (ctx, config) = context(1);
        let rec = record();
        let mut sensor = VesselSensor::from_record(Arc::clone(&ctx), &rec, &config).unwrap();

        queue_celsius(&ctx, &rec, &config, 20.0);
        let before = sensor.sense().unwrap();

        // Raw 0: shorted thermistor, zero resistance.
        lock(&ctx.raw().spi).sim_queue_reply(vec![0, 0, 0]);
        assert!(matches!(
            sensor.sense().unwrap_err(),
            Error::Sensor(SensorError::Conversion)
        ));
        assert_eq!(sensor.average(), before);
        assert!(sensor.in_range());
    }

    #[test]
    fn out_of_range_average_reported() {
        let (ctx, config) = context(1);
        let mut rec = record();
        rec.range_min_celsius = 18.0;
        rec.range_max_celsius = 22.0;
        let mut sensor = VesselSensor::from_record(Arc::clone(&ctx), &rec, &config).unwrap();

        queue_celsius(&ctx, &rec, &config, 30.0);
        sensor.sense().unwrap();
        assert!(!sensor.in_range());
    }

    #[test]
    fn unprimed_sensor_is_never_in_range() {
        let (ctx, config) = context(1);
        let sensor = VesselSensor::from_record(ctx, &record(), &config).unwrap();
        assert!(!sensor.in_range());
        assert!(!sensor.average().is_valid());
    }

    #[test]
    fn wrong_device_type_rejected() {
        let (ctx, config) = context(1);
        let mut rec = record();
        rec.kind = "ds18b20".to_owned();
        assert!(matches!(
            VesselSensor::from_record(ctx, &rec, &config).unwrap_err(),
            Error::Config(_)
        ));
    }

    #[test]
    fn null_sensor_reads_sentinel_and_never_in_range() {
        let mut s = NullSensor;
        assert!(!s.sense().unwrap().is_valid());
        assert!(!s.in_range());
        assert!(!s.average().is_valid());
    }
}
