//! Ground truth oracle for simulation.
//!
//! The Oracle maintains the "God's eye view" of a verification venue:
//! - True positions of the scanner and every subject
//! - GPS fix generation (with noise)
//! - An independent expectation of each scan's outcome

use copresence_core::{Outcome, VerificationPolicy};
use copresence_env::Coordinate;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Earth radius used by the oracle's flat-earth approximation.
const EARTH_RADIUS: f64 = 6_371_000.0;

/// Distances this close to the fence are too close to call.
const BOUNDARY_MARGIN_M: f64 = 0.5;

/// Ground truth generator for a single venue.
pub struct Oracle {
    /// Deterministic RNG
    rng: ChaCha8Rng,
    
    /// Where the scanner stands
    venue: Coordinate,
    
    /// Per-axis GPS error, meters (None = perfect fixes)
    noise: Option<Normal<f64>>,
}

impl Oracle {
    /// Creates a new oracle around `venue` with zero GPS noise.
    pub fn new(seed: u64, venue: Coordinate) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            venue,
            noise: None,
        }
    }
    
    /// Sets the GPS noise standard deviation (meters per axis).
    pub fn set_position_noise(&mut self, std_m: f64) {
        self.noise = if std_m > 0.0 {
            Normal::new(0.0, std_m).ok()
        } else {
            None
        };
    }
    
    pub fn venue(&self) -> Coordinate {
        self.venue
    }
    
    /// Places a subject uniformly in a disc of `radius_m` around the venue.
    pub fn place_subject(&mut self, radius_m: f64) -> Coordinate {
        let r = radius_m * self.rng.gen::<f64>().sqrt();
        let theta = self.rng.gen_range(0.0..std::f64::consts::TAU);
        offset(self.venue, r * theta.cos(), r * theta.sin())
    }
    
    /// A noisy fix of `truth`.
    pub fn fix(&mut self, truth: Coordinate) -> Coordinate {
        let Some(noise) = self.noise else {
            return truth;
        };
        let north = noise.sample(&mut self.rng);
        let east = noise.sample(&mut self.rng);
        offset(truth, north, east)
    }
    
    /// Random scan delay in `0..=max_ms` milliseconds.
    pub fn scan_delay_ms(&mut self, max_ms: u64) -> u64 {
        self.rng.gen_range(0..=max_ms)
    }
    
    /// The outcome a correct verifier must produce, or `None` when the
    /// distance is within the boundary margin.
    pub fn expected_outcome(
        policy: &VerificationPolicy,
        issued_at: Coordinate,
        scanned_at: Coordinate,
        delta_ms: u64,
    ) -> Option<Outcome> {
        let d = flat_distance(issued_at, scanned_at);
        if (d - policy.max_distance_m).abs() < BOUNDARY_MARGIN_M {
            return None;
        }
        let ok = delta_ms <= policy.max_time_delta_ms && d <= policy.max_distance_m;
        Some(if ok { Outcome::Success } else { Outcome::Failed })
    }
}

/// Moves `from` by the given meters north and east.
pub fn offset(from: Coordinate, north_m: f64, east_m: f64) -> Coordinate {
    let d_lat = (north_m / EARTH_RADIUS).to_degrees();
    let d_lon = (east_m / (EARTH_RADIUS * from.latitude().to_radians().cos())).to_degrees();
    Coordinate::new(from.latitude() + d_lat, from.longitude() + d_lon)
}

/// Equirectangular distance; independent of the verifier's haversine.
pub fn flat_distance(a: Coordinate, b: Coordinate) -> f64 {
    let mean_lat = ((a.latitude() + b.latitude()) / 2.0).to_radians();
    let x = (b.longitude() - a.longitude()).to_radians() * mean_lat.cos();
    let y = (b.latitude() - a.latitude()).to_radians();
    (x * x + y * y).sqrt() * EARTH_RADIUS
}

#[cfg(test)]
mod tests {
    use super::*;
    use copresence_core::distance_meters;
    use proptest::prelude::*;
    
    #[test]
    fn test_oracle_deterministic() {
        let venue = Coordinate::new(40.0, -73.0);
        let mut o1 = Oracle::new(42, venue);
        let mut o2 = Oracle::new(42, venue);
        o1.set_position_noise(3.0);
        o2.set_position_noise(3.0);
        
        for _ in 0..10 {
            let p1 = o1.place_subject(100.0);
            let p2 = o2.place_subject(100.0);
            assert_eq!(p1, p2);
            assert_eq!(o1.fix(p1), o2.fix(p2));
        }
    }
    
    #[test]
    fn test_offset_distance() {
        let venue = Coordinate::new(40.0, -73.0);
        let moved = offset(venue, 30.0, 40.0);
        assert!((flat_distance(venue, moved) - 50.0).abs() < 0.2);
    }
    
    #[test]
    fn test_expected_outcome_margin() {
        let policy = VerificationPolicy::default();
        let venue = Coordinate::new(40.0, -73.0);
        
        assert_eq!(Oracle::expected_outcome(&policy, venue, offset(venue, 10.0, 0.0), 1_000), Some(Outcome::Success));
        assert_eq!(Oracle::expected_outcome(&policy, venue, offset(venue, 10.0, 0.0), 15_001), Some(Outcome::Failed));
        assert_eq!(Oracle::expected_outcome(&policy, venue, offset(venue, 80.0, 0.0), 0), Some(Outcome::Failed));
        assert_eq!(Oracle::expected_outcome(&policy, venue, offset(venue, 50.0, 0.0), 0), None);
    }
    
    proptest! {
        #[test]
        fn prop_flat_matches_haversine_at_venue_scale(north in -200.0f64..200.0, east in -200.0f64..200.0) {
            let venue = Coordinate::new(40.0, -73.0);
            let p = offset(venue, north, east);
            prop_assert!((flat_distance(venue, p) - distance_meters(venue, p)).abs() < 0.01);
        }
    }
}
