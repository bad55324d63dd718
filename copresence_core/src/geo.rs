//! Great-circle distance between two positions.
//!
//! Haversine on a spherical earth. Accurate to well under a metre at the
//! geofence scales the verifier cares about.

use copresence_env::Coordinate;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Returns the great-circle distance between `a` and `b` in meters.
///
/// Total and symmetric; zero when `a == b`.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.latitude().to_radians();
    let phi2 = b.latitude().to_radians();
    let d_phi = (b.latitude() - a.latitude()).to_radians();
    let d_lambda = (b.longitude() - a.longitude()).to_radians();
    
    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    
    EARTH_RADIUS_M * c
}
