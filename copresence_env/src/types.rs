//! Common types for the co-presence environment abstraction.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed-point scale applied to every coordinate (6 decimal places, ~0.11 m).
pub const COORDINATE_SCALE: f64 = 1_000_000.0;

/// A WGS84 position in degrees, quantized to 6 decimal places.
///
/// Every constructor rounds, so two fixes that agree to the sixth decimal
/// compare equal and distances are computed on the stored precision.
///
/// Serialized as a `[latitude, longitude]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate, rounding both axes to 6 decimal places.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: quantize(latitude),
            longitude: quantize(longitude),
        }
    }
    
    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }
    
    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

fn quantize(degrees: f64) -> f64 {
    (degrees * COORDINATE_SCALE).round() / COORDINATE_SCALE
}

impl From<[f64; 2]> for Coordinate {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.latitude, c.longitude]
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Options for a single location request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocateOptions {
    /// Give up after this long (default: 10 s)
    #[serde(with = "millis")]
    pub timeout: Duration,
    
    /// Oldest cached reading that may be returned (default: 0, always a fresh fix)
    #[serde(with = "millis")]
    pub maximum_age: Duration,
    
    /// Ask the platform for its most accurate fix
    pub high_accuracy: bool,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(10_000),
            maximum_age: Duration::ZERO,
            high_accuracy: true,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;
    
    pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(d.as_millis() as u64)
    }
    
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms: u64 = Deserialize::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
