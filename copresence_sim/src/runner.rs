//! Scenario runner - executes deterministic verification scenarios.

use crate::oracle::{offset, Oracle};
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use copresence_core::{
    CheckFailure, IssuedCredential, KeyValueStore, LocationError, MemoryStore, Outcome, PresenceError, ScanReport,
    SortKey,
};
use copresence_env::Coordinate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const SCANNER: &str = "ABC1-001";
const OTHER_SCANNER: &str = "ABC1-002";
const SUBJECT: &str = "ABC1-005";

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,
    
    /// Seed used
    pub seed: u64,
    
    /// Whether scenario passed all assertions
    pub passed: bool,
    
    /// Final virtual time in seconds
    pub final_time_secs: f64,
    
    /// Failure message if any
    pub failure_reason: Option<String>,
    
    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Credentials issued
    pub issued: u64,
    
    /// Scans that reached the verifier
    pub scans: u64,
    
    /// Verified Success
    pub successes: u64,
    
    /// Verified Failed
    pub failures: u64,
    
    /// Scans aborted before verification (location, storage)
    pub aborted: u64,
    
    /// Crowd scans too close to the fence for the oracle to call
    pub ambiguous: u64,
    
    /// Verifier disagreed with the oracle
    pub mismatches: u64,
}

type Check = Result<(), String>;

fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Check {
    if cond {
        Ok(())
    } else {
        Err(msg())
    }
}

fn unexpected(e: PresenceError) -> String {
    format!("unexpected {} error: {}", e.kind(), e)
}

/// Runs verification scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,
    
    /// Subjects in the crowd scenario
    num_subjects: usize,
    
    /// GPS noise for the crowd scenario, meters
    gps_noise_std: f64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            num_subjects: 50,
            gps_noise_std: 3.0,
        }
    }
    
    /// Sets the crowd size (capped at 999 identities).
    pub fn with_subjects(mut self, n: usize) -> Self {
        self.num_subjects = n.min(999);
        self
    }
    
    /// Sets the crowd GPS noise.
    pub fn with_noise(mut self, std_m: f64) -> Self {
        self.gps_noise_std = std_m;
        self
    }
    
    fn config(&self) -> SimConfig {
        SimConfig {
            seed: self.seed,
            ..Default::default()
        }
    }
    
    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
            Ok(rt) => rt,
            Err(e) => return self.aborted(scenario, format!("runtime: {}", e)),
        };
        
        let world = match scenario {
            ScenarioId::QuotaExhaustion => {
                let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::with_quota(120));
                SimWorld::with_store(self.config(), store)
            }
            ScenarioId::Crowd => SimWorld::new(SimConfig {
                gps_noise_std: self.gps_noise_std,
                ..self.config()
            }),
            _ => SimWorld::new(self.config()),
        };
        let mut world = match world {
            Ok(w) => w,
            Err(e) => return self.aborted(scenario, format!("world: {}", e)),
        };
        
        let mut metrics = ScenarioMetrics::default();
        let outcome = runtime.block_on(async {
            match scenario {
                ScenarioId::OnTime => run_on_time(&world, &mut metrics).await,
                ScenarioId::LateScan => run_late_scan(&world, &mut metrics).await,
                ScenarioId::FarScan => run_far_scan(&world, &mut metrics).await,
                ScenarioId::Boundary => run_boundary(&world, &mut metrics).await,
                ScenarioId::RepeatAttempts => run_repeat_attempts(&world, &mut metrics).await,
                ScenarioId::PurgeIsolation => run_purge_isolation(&world, &mut metrics).await,
                ScenarioId::LocationTimeout => run_location_timeout(&world, &mut metrics).await,
                ScenarioId::QuotaExhaustion => run_quota_exhaustion(&world, &mut metrics).await,
                ScenarioId::Crowd => run_crowd(&mut world, self.num_subjects, &mut metrics).await,
            }
        });
        
        match &outcome {
            Ok(()) => info!(
                "✓ {} complete: {} scans, {} Success, {} Failed, {} aborted",
                scenario.name(),
                metrics.scans,
                metrics.successes,
                metrics.failures,
                metrics.aborted
            ),
            Err(reason) => warn!("✗ {}: {}", scenario.name(), reason),
        }
        
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: outcome.is_ok(),
            final_time_secs: world.time(),
            failure_reason: outcome.err(),
            metrics,
        }
    }
    
    fn aborted(&self, scenario: ScenarioId, reason: String) -> ScenarioResult {
        warn!("✗ {} could not start: {}", scenario.name(), reason);
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            final_time_secs: 0.0,
            failure_reason: Some(reason),
            metrics: ScenarioMetrics::default(),
        }
    }
}

/// Issues a credential for `subject` standing at `at`.
async fn issue_at(
    world: &SimWorld,
    subject: &str,
    at: Coordinate,
    metrics: &mut ScenarioMetrics,
) -> Result<IssuedCredential, String> {
    world.context.set_location(at);
    let issued = world.session.issue(subject).await.map_err(unexpected)?;
    metrics.issued += 1;
    Ok(issued)
}

/// Advances the clock by `after`, moves the scanner to `at` and scans.
async fn scan_at(
    world: &SimWorld,
    scanner: &str,
    issued: &IssuedCredential,
    after: Duration,
    at: Coordinate,
    metrics: &mut ScenarioMetrics,
) -> Result<ScanReport, PresenceError> {
    world.context.advance_time(after);
    world.context.set_location(at);
    
    match world.session.scan(scanner, Some(&issued.payload())).await {
        Ok(report) => {
            metrics.scans += 1;
            if report.verification.outcome.is_success() {
                metrics.successes += 1;
            } else {
                metrics.failures += 1;
            }
            debug!(
                "  t={:.3}s | {} -> {} ({}ms, {:.2}m)",
                world.time(),
                report.subject,
                report.verification.outcome,
                report.verification.time_delta_ms,
                report.verification.distance_meters
            );
            Ok(report)
        }
        Err(e) => {
            metrics.aborted += 1;
            Err(e)
        }
    }
}

fn expect_outcome(report: &ScanReport, expected: Outcome) -> Check {
    ensure(report.verification.outcome == expected, || {
        format!(
            "{} expected {}, got {} ({}ms, {:.3}m)",
            report.subject,
            expected,
            report.verification.outcome,
            report.verification.time_delta_ms,
            report.verification.distance_meters
        )
    })
}

/// DST-001: OnTime - the reference Success case.
///
/// Issued at (40.0, -73.0), scanned 10 s later from (40.0001, -73.0).
async fn run_on_time(world: &SimWorld, metrics: &mut ScenarioMetrics) -> Check {
    info!("DST-001: OnTime - scan inside both windows");
    
    let issued = issue_at(world, SUBJECT, world.oracle.venue(), metrics).await?;
    let scanner_spot = Coordinate::new(40.0001, -73.0);
    let report = scan_at(world, SCANNER, &issued, Duration::from_secs(10), scanner_spot, metrics)
        .await
        .map_err(unexpected)?;
    
    expect_outcome(&report, Outcome::Success)?;
    ensure(report.verification.time_delta_ms == 10_000, || {
        format!("time delta {}ms, expected 10000ms", report.verification.time_delta_ms)
    })?;
    ensure((report.verification.distance_meters - 11.12).abs() < 0.01, || {
        format!("distance {:.3}m, expected ~11.12m", report.verification.distance_meters)
    })?;
    ensure(report.table.len() == 1, || format!("table has {} rows", report.table.len()))
}

/// DST-002: LateScan - time window exceeded at zero distance.
async fn run_late_scan(world: &SimWorld, metrics: &mut ScenarioMetrics) -> Check {
    info!("DST-002: LateScan - scan after the time window");
    
    let venue = world.oracle.venue();
    let issued = issue_at(world, SUBJECT, venue, metrics).await?;
    let report = scan_at(world, SCANNER, &issued, Duration::from_secs(20), venue, metrics)
        .await
        .map_err(unexpected)?;
    
    expect_outcome(&report, Outcome::Failed)?;
    ensure(report.failures == [CheckFailure::TimeFailed], || {
        format!("expected only the time check to fail, got {:?}", report.failures)
    })?;
    
    let subjects = world.session.subjects(SCANNER).map_err(unexpected)?;
    ensure(subjects.len() == 1 && subjects[0].latest_outcome() == Outcome::Failed, || {
        "late scan was not recorded as Failed".to_string()
    })
}

/// DST-003: FarScan - geofence exceeded inside the time window.
async fn run_far_scan(world: &SimWorld, metrics: &mut ScenarioMetrics) -> Check {
    info!("DST-003: FarScan - scan outside the geofence");
    
    let venue = world.oracle.venue();
    let issued = issue_at(world, SUBJECT, venue, metrics).await?;
    let far = offset(venue, 100.0, 0.0);
    let report = scan_at(world, SCANNER, &issued, Duration::from_secs(1), far, metrics)
        .await
        .map_err(unexpected)?;
    
    expect_outcome(&report, Outcome::Failed)?;
    ensure(report.failures == [CheckFailure::DistanceFailed], || {
        format!("expected only the distance check to fail, got {:?}", report.failures)
    })
}

/// DST-004: Boundary - the limits are inclusive.
///
/// 15000 ms passes, 15001 ms fails; 49 m passes, 51 m fails.
async fn run_boundary(world: &SimWorld, metrics: &mut ScenarioMetrics) -> Check {
    info!("DST-004: Boundary - inclusive limits");
    
    let venue = world.oracle.venue();
    let cases = [
        ("ABC1-010", Duration::from_millis(15_000), venue, Outcome::Success),
        ("ABC1-011", Duration::from_millis(15_001), venue, Outcome::Failed),
        ("ABC1-012", Duration::from_secs(1), offset(venue, 49.0, 0.0), Outcome::Success),
        ("ABC1-013", Duration::from_secs(1), offset(venue, 51.0, 0.0), Outcome::Failed),
    ];
    
    for (subject, after, spot, expected) in cases {
        let issued = issue_at(world, subject, venue, metrics).await?;
        let report = scan_at(world, SCANNER, &issued, after, spot, metrics)
            .await
            .map_err(unexpected)?;
        expect_outcome(&report, expected)?;
    }
    
    let view = world.session.view(SCANNER, Some(SortKey::Status)).map_err(unexpected)?;
    let order: Vec<&str> = view.iter().map(|r| r.subject_id.as_str()).collect();
    ensure(order == ["ABC1-011", "ABC1-013", "ABC1-010", "ABC1-012"], || {
        format!("status view out of order: {:?}", order)
    })
}

/// DST-005: RepeatAttempts - one subject, three attempts, latest wins.
async fn run_repeat_attempts(world: &SimWorld, metrics: &mut ScenarioMetrics) -> Check {
    info!("DST-005: RepeatAttempts - attempt history");
    
    let venue = world.oracle.venue();
    let first = issue_at(world, SUBJECT, venue, metrics).await?;
    scan_at(world, SCANNER, &first, Duration::from_secs(5), venue, metrics)
        .await
        .map_err(unexpected)?;
    
    // Same credential, now stale
    scan_at(world, SCANNER, &first, Duration::from_secs(15), venue, metrics)
        .await
        .map_err(unexpected)?;
    
    let subjects = world.session.subjects(SCANNER).map_err(unexpected)?;
    let latest = subjects.first().map(|s| s.latest_outcome());
    ensure(latest == Some(Outcome::Failed), || {
        "stale rescan should be the latest status".to_string()
    })?;
    
    let refreshed = issue_at(world, SUBJECT, venue, metrics).await?;
    scan_at(world, SCANNER, &refreshed, Duration::from_secs(1), venue, metrics)
        .await
        .map_err(unexpected)?;
    
    let subjects = world.session.subjects(SCANNER).map_err(unexpected)?;
    ensure(subjects.len() == 1, || format!("{} subject records, expected 1", subjects.len()))?;
    let outcomes: Vec<Outcome> = subjects[0].attempts().iter().map(|a| a.outcome).collect();
    ensure(outcomes == [Outcome::Success, Outcome::Failed, Outcome::Success], || {
        format!("attempt history {:?}", outcomes)
    })?;
    ensure(
        subjects[0].attempts().windows(2).all(|w| w[0].observed_at < w[1].observed_at),
        || "attempts are not chronological".to_string(),
    )
}

/// DST-006: PurgeIsolation - purging one scanner leaves another intact.
async fn run_purge_isolation(world: &SimWorld, metrics: &mut ScenarioMetrics) -> Check {
    info!("DST-006: PurgeIsolation - per-scanner purge");
    
    let venue = world.oracle.venue();
    for scanner in [SCANNER, OTHER_SCANNER] {
        let issued = issue_at(world, SUBJECT, venue, metrics).await?;
        scan_at(world, scanner, &issued, Duration::from_secs(2), venue, metrics)
            .await
            .map_err(unexpected)?;
    }
    
    world.session.purge(SCANNER).map_err(unexpected)?;
    
    let purged = world.session.subjects(SCANNER).map_err(unexpected)?;
    let kept = world.session.subjects(OTHER_SCANNER).map_err(unexpected)?;
    ensure(purged.is_empty(), || format!("{} records survived purge", purged.len()))?;
    ensure(kept.len() == 1, || format!("other scanner has {} records", kept.len()))?;
    
    // Purging an empty ledger is not an error
    world.session.purge(SCANNER).map_err(unexpected)
}

/// DST-007: LocationTimeout - a slow fix aborts the scan with nothing written.
async fn run_location_timeout(world: &SimWorld, metrics: &mut ScenarioMetrics) -> Check {
    info!("DST-007: LocationTimeout - fix slower than the request timeout");
    
    let venue = world.oracle.venue();
    let issued = issue_at(world, SUBJECT, venue, metrics).await?;
    world.context.set_fix_latency(Duration::from_secs(12));
    
    let result = scan_at(world, SCANNER, &issued, Duration::from_secs(1), venue, metrics).await;
    match result {
        Err(PresenceError::LocationUnavailable(LocationError::Timeout(ms))) => {
            ensure(ms == 10_000, || format!("timed out after {}ms, expected 10000ms", ms))?;
        }
        Err(e) => return Err(unexpected(e)),
        Ok(report) => {
            return Err(format!("scan completed with {}", report.verification.outcome));
        }
    }
    
    let subjects = world.session.subjects(SCANNER).map_err(unexpected)?;
    ensure(subjects.is_empty(), || "aborted scan wrote to the ledger".to_string())?;
    
    // Device recovers
    world.context.set_fix_latency(Duration::ZERO);
    let fresh = issue_at(world, SUBJECT, venue, metrics).await?;
    let report = scan_at(world, SCANNER, &fresh, Duration::from_secs(1), venue, metrics)
        .await
        .map_err(unexpected)?;
    expect_outcome(&report, Outcome::Success)
}

/// DST-008: QuotaExhaustion - a refused write surfaces and changes nothing.
async fn run_quota_exhaustion(world: &SimWorld, metrics: &mut ScenarioMetrics) -> Check {
    info!("DST-008: QuotaExhaustion - storage refuses the second write");
    
    let venue = world.oracle.venue();
    let issued = issue_at(world, SUBJECT, venue, metrics).await?;
    scan_at(world, SCANNER, &issued, Duration::from_secs(1), venue, metrics)
        .await
        .map_err(unexpected)?;
    let before = world.session.subjects(SCANNER).map_err(unexpected)?;
    
    let result = scan_at(world, SCANNER, &issued, Duration::from_secs(1), venue, metrics).await;
    match result {
        Err(PresenceError::Storage(e)) => debug!("  storage refused: {}", e),
        Err(e) => return Err(unexpected(e)),
        Ok(_) => return Err("second write fit inside the quota".to_string()),
    }
    
    let after = world.session.subjects(SCANNER).map_err(unexpected)?;
    ensure(before == after, || "ledger changed after a refused write".to_string())
}

/// DST-009: Crowd - seeded subjects with noisy fixes, checked against the oracle.
async fn run_crowd(world: &mut SimWorld, num_subjects: usize, metrics: &mut ScenarioMetrics) -> Check {
    info!("DST-009: Crowd - {} subjects, GPS noise {:.1}m", num_subjects, world.config.gps_noise_std);
    
    let venue = world.oracle.venue();
    let policy = *world.policy();
    let mut disagreements = Vec::new();
    
    for i in 1..=num_subjects {
        let subject = format!("ABC1-{:03}", i);
        let truth = world.oracle.place_subject(80.0);
        let issue_fix = world.oracle.fix(truth);
        let scan_fix = world.oracle.fix(venue);
        let delay_ms = world.oracle.scan_delay_ms(20_000);
        
        let issued = issue_at(world, &subject, issue_fix, metrics).await?;
        let report = scan_at(
            world,
            SCANNER,
            &issued,
            Duration::from_millis(delay_ms),
            scan_fix,
            metrics,
        )
        .await
        .map_err(unexpected)?;
        
        match Oracle::expected_outcome(&policy, issued.credential.location(), scan_fix, delay_ms) {
            None => metrics.ambiguous += 1,
            Some(expected) if expected != report.verification.outcome => {
                metrics.mismatches += 1;
                disagreements.push(format!("{}: oracle {}, verifier {}", subject, expected, report.verification.outcome));
            }
            Some(_) => {}
        }
    }
    
    let recorded = world.session.subjects(SCANNER).map_err(unexpected)?;
    ensure(recorded.len() == num_subjects, || {
        format!("{} subjects recorded, expected {}", recorded.len(), num_subjects)
    })?;
    ensure(disagreements.is_empty(), || disagreements.join("; "))
}
