//! Numeric unit conversions applied to native field values.

use serde::{Deserialize, Serialize};

/// A named conversion from a native unit to a display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitConversion {
    /// Kelvin to degrees Fahrenheit
    KToF,
    /// Kelvin to degrees Celsius
    KToC,
    /// Celsius to Fahrenheit
    CToF,
    /// Metres per second to miles per hour
    MsToMph,
    /// Metres per second to knots
    MsToKt,
    /// Kilograms per square metre (mm of water) to inches
    KgM2ToIn,
    /// Metres to inches
    MToIn,
    /// Metres to statute miles
    MToMi,
    /// Pascals to millibars
    PaToMb,
    /// Precipitation rate (kg m-2 s-1) to inches per hour
    RateToInHr,
}

impl UnitConversion {
    /// Apply the conversion to a single value.
    #[inline]
    pub fn apply(self, value: f32) -> f32 {
        match self {
            UnitConversion::KToF => (value - 273.15) * 9.0 / 5.0 + 32.0,
            UnitConversion::KToC => value - 273.15,
            UnitConversion::CToF => value * 9.0 / 5.0 + 32.0,
            UnitConversion::MsToMph => value * 2.236_936,
            UnitConversion::MsToKt => value * 1.943_844,
            UnitConversion::KgM2ToIn => value / 25.4,
            UnitConversion::MToIn => value * 39.370_08,
            UnitConversion::MToMi => value / 1609.344,
            UnitConversion::PaToMb => value / 100.0,
            UnitConversion::RateToInHr => value * 3600.0 / 25.4,
        }
    }

    /// Convert every value in place. Non-finite values are left untouched.
    pub fn apply_slice(self, values: &mut [f32]) {
        for v in values.iter_mut().filter(|v| v.is_finite()) {
            *v = self.apply(*v);
        }
    }

    /// Unit label produced by this conversion.
    pub fn target_units(self) -> &'static str {
        match self {
            UnitConversion::KToF | UnitConversion::CToF => "°F",
            UnitConversion::KToC => "°C",
            UnitConversion::MsToMph => "mph",
            UnitConversion::MsToKt => "kt",
            UnitConversion::KgM2ToIn | UnitConversion::MToIn => "in",
            UnitConversion::MToMi => "mi",
            UnitConversion::PaToMb => "mb",
            UnitConversion::RateToInHr => "in/hr",
        }
    }
}
