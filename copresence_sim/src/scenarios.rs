//! Verification scenarios for DST.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// DST-001: Scan 10 s after issue, ~11 m away
    OnTime,
    
    /// DST-002: Scan 20 s after issue from the same spot
    LateScan,
    
    /// DST-003: Scan 1 s after issue, ~100 m away
    FarScan,
    
    /// DST-004: Scans at exactly the time limit and 1 ms past it
    Boundary,
    
    /// DST-005: Same subject scanned repeatedly
    RepeatAttempts,
    
    /// DST-006: Purge one scanner, leave another intact
    PurgeIsolation,
    
    /// DST-007: Location fix exceeds its timeout
    LocationTimeout,
    
    /// DST-008: Ledger storage hits its quota
    QuotaExhaustion,
    
    /// DST-009: Seeded crowd with GPS noise checked against the oracle
    Crowd,
}

impl ScenarioId {
    /// Returns all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::OnTime,
            ScenarioId::LateScan,
            ScenarioId::FarScan,
            ScenarioId::Boundary,
            ScenarioId::RepeatAttempts,
            ScenarioId::PurgeIsolation,
            ScenarioId::LocationTimeout,
            ScenarioId::QuotaExhaustion,
            ScenarioId::Crowd,
        ]
    }
    
    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::OnTime => "on_time",
            ScenarioId::LateScan => "late_scan",
            ScenarioId::FarScan => "far_scan",
            ScenarioId::Boundary => "boundary",
            ScenarioId::RepeatAttempts => "repeat_attempts",
            ScenarioId::PurgeIsolation => "purge_isolation",
            ScenarioId::LocationTimeout => "location_timeout",
            ScenarioId::QuotaExhaustion => "quota_exhaustion",
            ScenarioId::Crowd => "crowd",
        }
    }
    
    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::OnTime => "Scan 10s after issue from ~11m away, expect Success",
            ScenarioId::LateScan => "Scan 20s after issue at distance 0, expect Failed",
            ScenarioId::FarScan => "Scan 1s after issue from ~100m away, expect Failed",
            ScenarioId::Boundary => "15000ms is accepted, 15001ms is not",
            ScenarioId::RepeatAttempts => "Three scans of one subject append three attempts",
            ScenarioId::PurgeIsolation => "Purging one scanner leaves the other untouched",
            ScenarioId::LocationTimeout => "12s fix against a 10s timeout aborts with no write",
            ScenarioId::QuotaExhaustion => "Quota-exceeded write surfaces and preserves state",
            ScenarioId::Crowd => "Seeded subjects with GPS noise agree with the oracle",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on_time" | "ontime" | "dst-001" => Ok(ScenarioId::OnTime),
            "late_scan" | "latescan" | "dst-002" => Ok(ScenarioId::LateScan),
            "far_scan" | "farscan" | "dst-003" => Ok(ScenarioId::FarScan),
            "boundary" | "dst-004" => Ok(ScenarioId::Boundary),
            "repeat_attempts" | "repeatattempts" | "dst-005" => Ok(ScenarioId::RepeatAttempts),
            "purge_isolation" | "purgeisolation" | "dst-006" => Ok(ScenarioId::PurgeIsolation),
            "location_timeout" | "locationtimeout" | "dst-007" => Ok(ScenarioId::LocationTimeout),
            "quota_exhaustion" | "quotaexhaustion" | "dst-008" => Ok(ScenarioId::QuotaExhaustion),
            "crowd" | "dst-009" => Ok(ScenarioId::Crowd),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_names_parse_back() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>(), Ok(id));
        }
        assert_eq!("DST-007".parse::<ScenarioId>(), Ok(ScenarioId::LocationTimeout));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
