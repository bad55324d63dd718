//! The presence verifier - time-window and geofence policy.
//!
//! Given a decoded credential and the scanning device's own observed instant
//! and position, decide whether the holder is co-located right now:
//!
//! - **Time**: `|observed - issued| <= max_time_delta_ms`
//! - **Distance**: `haversine(credential, observed) <= max_distance_m`
//!
//! Both inclusive. `Success` requires both; there is no partial credit.
//! The verifier never reads a clock or a location source itself.

use chrono::{DateTime, Utc};
use copresence_env::Coordinate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credential::Credential;
use crate::geo::distance_meters;

/// Result of one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "Success",
            Outcome::Failed => "Failed",
        }
    }
    
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
    
    fn from_check(ok: bool) -> Self {
        if ok {
            Outcome::Success
        } else {
            Outcome::Failed
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which check sank a `Failed` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckFailure {
    TimeFailed,
    DistanceFailed,
}

impl std::fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CheckFailure::TimeFailed => "TimeFailed",
            CheckFailure::DistanceFailed => "DistanceFailed",
        })
    }
}

/// Tolerances for a presence check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationPolicy {
    /// Largest accepted gap between issue and scan, either direction (default: 15000)
    pub max_time_delta_ms: u64,
    
    /// Largest accepted separation between issuer and scanner (default: 50.0)
    pub max_distance_m: f64,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            max_time_delta_ms: 15_000,
            max_distance_m: 50.0,
        }
    }
}

impl VerificationPolicy {
    /// Applies the thresholds to already-measured quantities.
    pub fn evaluate(&self, time_delta_ms: u64, distance_m: f64) -> VerificationReport {
        let time_ok = time_delta_ms <= self.max_time_delta_ms;
        // NaN compares false and fails closed
        let distance_ok = distance_m <= self.max_distance_m;
        
        VerificationReport {
            time_ok,
            time_delta_ms,
            distance_ok,
            distance_meters: distance_m,
            outcome: Outcome::from_check(time_ok && distance_ok),
        }
    }
}

/// Everything measured and decided for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub time_ok: bool,
    pub time_delta_ms: u64,
    pub distance_ok: bool,
    pub distance_meters: f64,
    pub outcome: Outcome,
}

impl VerificationReport {
    /// The failed checks, in evaluation order. Empty on success.
    pub fn failures(&self) -> Vec<CheckFailure> {
        let mut failures = Vec::new();
        if !self.time_ok {
            failures.push(CheckFailure::TimeFailed);
        }
        if !self.distance_ok {
            failures.push(CheckFailure::DistanceFailed);
        }
        failures
    }
}

/// Applies a [`VerificationPolicy`] to credentials.
#[derive(Debug, Clone, Default)]
pub struct PresenceVerifier {
    policy: VerificationPolicy,
}

impl PresenceVerifier {
    pub fn new(policy: VerificationPolicy) -> Self {
        Self { policy }
    }
    
    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }
    
    /// Checks `credential` against the scanner's observed instant and position.
    pub fn verify(
        &self,
        credential: &Credential,
        observed_now: DateTime<Utc>,
        observed_location: Coordinate,
    ) -> VerificationReport {
        let time_delta_ms = (observed_now - credential.issued_at())
            .num_milliseconds()
            .unsigned_abs();
        let distance_m = distance_meters(credential.location(), observed_location);
        
        let report = self.policy.evaluate(time_delta_ms, distance_m);
        
        debug!(
            "Time check: {}, {}ms",
            Outcome::from_check(report.time_ok),
            report.time_delta_ms
        );
        debug!(
            "Location check: {}, {:.3}m",
            Outcome::from_check(report.distance_ok),
            report.distance_meters
        );
        
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityRule;
    use chrono::Duration;
    
    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }
    
    fn credential() -> Credential {
        Credential::new(
            IdentityRule::default().parse("ABC1-005").unwrap(),
            at("2024-01-01T00:00:00.000Z"),
            Coordinate::new(40.0, -73.0),
        )
    }
    
    #[test]
    fn test_policy_boundaries_inclusive() {
        let policy = VerificationPolicy::default();
        
        assert_eq!(policy.evaluate(15_000, 50.0).outcome, Outcome::Success);
        assert_eq!(policy.evaluate(15_001, 0.0).outcome, Outcome::Failed);
        assert_eq!(policy.evaluate(0, 50.000001).outcome, Outcome::Failed);
        assert_eq!(policy.evaluate(0, f64::NAN).outcome, Outcome::Failed);
    }
    
    #[test]
    fn test_failures_listed() {
        let policy = VerificationPolicy::default();
        
        assert!(policy.evaluate(0, 0.0).failures().is_empty());
        assert_eq!(policy.evaluate(20_000, 0.0).failures(), vec![CheckFailure::TimeFailed]);
        assert_eq!(policy.evaluate(0, 80.0).failures(), vec![CheckFailure::DistanceFailed]);
        assert_eq!(
            policy.evaluate(20_000, 80.0).failures(),
            vec![CheckFailure::TimeFailed, CheckFailure::DistanceFailed]
        );
    }
    
    #[test]
    fn test_verify_nearby_and_on_time() {
        let verifier = PresenceVerifier::default();
        let report = verifier.verify(
            &credential(),
            at("2024-01-01T00:00:10.000Z"),
            Coordinate::new(40.0001, -73.0),
        );
        
        assert!(report.time_ok);
        assert_eq!(report.time_delta_ms, 10_000);
        assert!(report.distance_ok);
        assert!((report.distance_meters - 11.12).abs() < 0.01);
        assert_eq!(report.outcome, Outcome::Success);
    }
    
    #[test]
    fn test_verify_late_scan_fails_even_in_place() {
        let verifier = PresenceVerifier::default();
        let report = verifier.verify(
            &credential(),
            at("2024-01-01T00:00:20.000Z"),
            Coordinate::new(40.0, -73.0),
        );
        
        assert!(!report.time_ok);
        assert_eq!(report.distance_meters, 0.0);
        assert_eq!(report.outcome, Outcome::Failed);
    }
    
    #[test]
    fn test_verify_scan_before_issue_uses_absolute_delta() {
        let verifier = PresenceVerifier::default();
        let issued = credential().issued_at();
        
        let early = verifier.verify(&credential(), issued - Duration::milliseconds(15_000), credential().location());
        assert_eq!(early.time_delta_ms, 15_000);
        assert_eq!(early.outcome, Outcome::Success);
        
        let too_early = verifier.verify(&credential(), issued - Duration::milliseconds(15_001), credential().location());
        assert_eq!(too_early.outcome, Outcome::Failed);
    }
    
    #[test]
    fn test_verify_far_scan_fails() {
        let verifier = PresenceVerifier::default();
        // ~55.6 m north
        let report = verifier.verify(
            &credential(),
            at("2024-01-01T00:00:01.000Z"),
            Coordinate::new(40.0005, -73.0),
        );
        
        assert!(report.time_ok);
        assert!(!report.distance_ok);
        assert_eq!(report.outcome, Outcome::Failed);
    }
    
    #[test]
    fn test_custom_policy() {
        let verifier = PresenceVerifier::new(VerificationPolicy {
            max_time_delta_ms: 30_000,
            max_distance_m: 100.0,
        });
        let report = verifier.verify(
            &credential(),
            at("2024-01-01T00:00:20.000Z"),
            Coordinate::new(40.0005, -73.0),
        );
        
        assert_eq!(report.outcome, Outcome::Success);
    }
}
