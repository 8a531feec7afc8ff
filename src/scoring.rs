pub const IDEAL_TEMP_C: f64 = 22.0;
pub const IDEAL_HUMIDITY: f64 = 45.0;

const TEMP_WEIGHT: f64 = 0.5;
const HUMIDITY_WEIGHT: f64 = 0.3;
const WIND_WEIGHT: f64 = 0.2;

/// Per-factor sub-scores, each floored at 0 and at most 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComfortComponents {
    pub temp: f64,
    pub humidity: f64,
    pub wind: f64,
}

impl ComfortComponents {
    pub fn weighted(&self) -> f64 {
        self.temp * TEMP_WEIGHT + self.humidity * HUMIDITY_WEIGHT + self.wind * WIND_WEIGHT
    }
}

pub fn comfort_components(temp_c: f64, humidity: f64, wind_ms: f64) -> ComfortComponents {
    ComfortComponents {
        temp: (100.0 - (temp_c - IDEAL_TEMP_C).abs() * 4.0).max(0.0),
        humidity: (100.0 - (humidity - IDEAL_HUMIDITY).abs()).max(0.0),
        // A negative speed is a sensor glitch, not a bonus.
        wind: (100.0 - wind_ms.max(0.0) * 5.0).max(0.0),
    }
}

/// Comfort score in `0..=100` for the given conditions.
///
/// Halves round up (`x.5 -> x+1`).
pub fn comfort_score(temp_c: f64, humidity: f64, wind_ms: f64) -> u8 {
    let weighted = comfort_components(temp_c, humidity, wind_ms).weighted();
    (weighted + 0.5).floor() as u8
}
