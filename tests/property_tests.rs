//! Property tests for the numeric core.

use proptest::prelude::*;

use brewhaus::temperature::{Temperature, TemperatureUnit};
use brewhaus::thermistor::Thermistor;

proptest! {
    // ── Temperature ──────────────────────────────────────────────

    #[test]
    fn unit_round_trips_stay_within_tolerance(
        kelvin in 0.1f64..2000.0,
        unit in prop_oneof![
            Just(TemperatureUnit::Celsius),
            Just(TemperatureUnit::Fahrenheit),
            Just(TemperatureUnit::Kelvin),
        ],
    ) {
        let t = Temperature::new(kelvin, TemperatureUnit::Kelvin).unwrap();
        let back = Temperature::new(t.get(unit), unit).unwrap();
        prop_assert!(t == back, "round trip through {} moved {}K to {}K", unit, kelvin, back.to_kelvin());
    }

    #[test]
    fn construction_rejects_below_absolute_zero(kelvin in -1e6f64..-1e-9) {
        prop_assert!(Temperature::new(kelvin, TemperatureUnit::Kelvin).is_none());
    }

    #[test]
    fn subtraction_never_goes_below_the_sentinel(a in 0.0f64..1000.0, b in 0.0f64..1000.0) {
        let ta = Temperature::new(a, TemperatureUnit::Kelvin).unwrap();
        let tb = Temperature::new(b, TemperatureUnit::Kelvin).unwrap();
        let d = ta - tb;
        prop_assert!(d.to_kelvin() >= 0.0);
        if b >= a {
            prop_assert!(!d.is_valid());
        }
    }

    #[test]
    fn diff_is_symmetric_and_non_negative(a in 0.0f64..1000.0, b in 0.0f64..1000.0) {
        let ta = Temperature::new(a, TemperatureUnit::Kelvin).unwrap();
        let tb = Temperature::new(b, TemperatureUnit::Kelvin).unwrap();
        for unit in [
            TemperatureUnit::Celsius,
            TemperatureUnit::Fahrenheit,
            TemperatureUnit::Kelvin,
        ] {
            let d1 = ta.diff(&tb, unit);
            let d2 = tb.diff(&ta, unit);
            prop_assert!(d1 >= 0.0);
            prop_assert!((d1 - d2).abs() < 1e-9);
        }
    }

    #[test]
    fn parsing_arbitrary_strings_never_panics(s in ".*") {
        let _ = s.parse::<Temperature>();
    }

    #[test]
    fn parsing_well_formed_kelvin_strings_succeeds(
        value in 0.0f64..500.0,
        suffix in prop_oneof![Just('K'), Just('k')],
    ) {
        let parsed = format!("{value}{suffix}").parse::<Temperature>().unwrap();
        prop_assert!((parsed.to_kelvin() - value).abs() < 1e-6);
    }

    // ── Thermistor ───────────────────────────────────────────────

    #[test]
    fn thermistor_conversions_are_inverse(celsius in -20.0f64..90.0) {
        let th = Thermistor::new(
            3977.0,
            10_000.0,
            Temperature::new(25.0, TemperatureUnit::Celsius).unwrap(),
        );
        let t = Temperature::new(celsius, TemperatureUnit::Celsius).unwrap();
        let back = th.temperature_from_resistance(th.resistance_from_temperature(t));
        prop_assert!((back.to_celsius() - celsius).abs() < 1e-6);
    }

    #[test]
    fn thermistor_is_monotonic_decreasing(
        a in -20.0f64..90.0,
        delta in 0.1f64..20.0,
    ) {
        let th = Thermistor::new(
            3977.0,
            10_000.0,
            Temperature::new(25.0, TemperatureUnit::Celsius).unwrap(),
        );
        let cold = th.resistance_from_temperature(
            Temperature::new(a, TemperatureUnit::Celsius).unwrap(),
        );
        let warm = th.resistance_from_temperature(
            Temperature::new(a + delta, TemperatureUnit::Celsius).unwrap(),
        );
        prop_assert!(cold > warm);
    }

    #[test]
    fn thermistor_never_panics_on_arbitrary_resistance(ohms in proptest::num::f64::ANY) {
        let th = Thermistor::new(
            3977.0,
            10_000.0,
            Temperature::new(25.0, TemperatureUnit::Celsius).unwrap(),
        );
        let t = th.temperature_from_resistance(ohms);
        prop_assert!(t.to_kelvin() >= 0.0);
    }
}

// ── Shift-register latch model ───────────────────────────────────

#[cfg(not(feature = "hardware"))]
mod latch_model {
    use super::*;
    use brewhaus::bus::BusContext;
    use brewhaus::config::Config;

    #[derive(Debug, Clone)]
    enum LatchOp {
        Set(usize),
        Clear(usize),
        Toggle(usize),
    }

    fn latch_op() -> impl Strategy<Value = LatchOp> {
        prop_oneof![
            (0usize..16).prop_map(LatchOp::Set),
            (0usize..16).prop_map(LatchOp::Clear),
            (0usize..16).prop_map(LatchOp::Toggle),
        ]
    }

    proptest! {
        #[test]
        fn latch_tracks_a_reference_model(ops in proptest::collection::vec(latch_op(), 0..64)) {
            let ctx = BusContext::new(&Config::default()).unwrap();
            let mut model: u16 = 0;
            for op in ops {
                match op {
                    LatchOp::Set(bit) => {
                        ctx.shift_reg.set(bit).unwrap();
                        model |= 1 << bit;
                    }
                    LatchOp::Clear(bit) => {
                        ctx.shift_reg.clear(bit).unwrap();
                        model &= !(1 << bit);
                    }
                    LatchOp::Toggle(bit) => {
                        ctx.shift_reg.toggle(bit).unwrap();
                        model ^= 1 << bit;
                    }
                }
                prop_assert_eq!(ctx.shift_reg.value(), model);
            }
        }
    }
}
