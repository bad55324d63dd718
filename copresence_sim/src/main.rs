//! Copresence CLI
//!
//! Issue credentials, scan them against this device's time and position,
//! inspect or purge the attempt ledger, and run the deterministic scenarios.

use clap::{Parser, Subcommand};
use copresence_core::{
    ConfigError, Coordinate, PresenceError, ScanSession, ScannerConfig, SledStore, SortKey,
};
use chrono::Utc;
use copresence_env::{FixedLocation, LocationProvider, NoLocation, TokioContext};
use copresence_sim::{LedgerExport, ScenarioId, ScenarioResult, ScenarioRunner};
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    
    #[error(transparent)]
    Presence(#[from] PresenceError),
    
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    
    #[error("{0}")]
    Usage(String),
}

impl From<copresence_core::StoreError> for CliError {
    fn from(e: copresence_core::StoreError) -> Self {
        CliError::Presence(e.into())
    }
}

/// Co-presence verification for rotating location/time-bound credentials
#[derive(Parser, Debug)]
#[command(name = "copresence")]
#[command(about = "Verify that a credential holder is here, now", long_about = None)]
struct Args {
    /// Scanner configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    
    /// Ledger database directory (overrides the config file)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    
    /// Device latitude, degrees
    #[arg(long, global = true, allow_negative_numbers = true)]
    lat: Option<f64>,
    
    /// Device longitude, degrees
    #[arg(long, global = true, allow_negative_numbers = true)]
    lon: Option<f64>,
    
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
    
    /// JSON output
    #[arg(long, global = true)]
    json: bool,
    
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a credential for a subject at this device's position
    Issue {
        /// Subject identity, e.g. ABC1-005
        subject: String,
        
        /// Number of credentials to issue, one per validity window
        #[arg(long, default_value = "1")]
        repeat: u32,
    },
    
    /// Verify a scanned credential payload and record the outcome
    Scan {
        /// This scanner's identity
        scanner: String,
        
        /// Decoded payload text, or "-" to read it from stdin
        payload: Option<String>,
    },
    
    /// Show the latest status of every subject seen by a scanner
    List {
        /// Scanner identity
        scanner: String,
        
        /// Sort by "id" or "status" (default: stored order)
        #[arg(short, long)]
        sort: Option<SortKey>,
        
        /// Also write the full history to a JSON file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    
    /// Delete every record held by a scanner
    Purge {
        /// Scanner identity
        scanner: String,
        
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    
    /// Run deterministic simulation scenarios
    Simulate {
        /// Scenario to run (on_time, late_scan, far_scan, boundary, repeat_attempts,
        /// purge_isolation, location_timeout, quota_exhaustion, crowd, all)
        #[arg(short = 'S', long, default_value = "all")]
        scenario: String,
        
        /// Master seed for determinism (0 = random from time)
        #[arg(short, long, default_value = "42")]
        seed: u64,
        
        /// Number of consecutive seeds to test
        #[arg(long, default_value = "1")]
        seeds: usize,
        
        /// Subjects in the crowd scenario
        #[arg(long, default_value = "50")]
        subjects: usize,
        
        /// GPS noise for the crowd scenario, meters
        #[arg(long, default_value = "3.0")]
        noise: f64,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    
    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
    
    let result = match &args.command {
        Command::Simulate { scenario, seed, seeds, subjects, noise } => {
            simulate(&args, scenario, *seed, *seeds, *subjects, *noise)
        }
        _ => live(&args),
    };
    
    match result {
        Ok(code) => code,
        Err(CliError::Presence(e)) => {
            error!("{}: {}", e.kind(), e);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs one of the device commands against the real clock and the sled ledger.
fn live(args: &Args) -> Result<ExitCode, CliError> {
    let mut config = match &args.config {
        Some(path) => ScannerConfig::from_json_file(path)?,
        None => ScannerConfig::default(),
    };
    if let Some(store) = &args.store {
        config.store_path = store.clone();
    }
    
    let provider: Arc<dyn LocationProvider> = match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => Arc::new(FixedLocation(Coordinate::new(lat, lon))),
        (None, None) => Arc::new(NoLocation),
        _ => return Err(CliError::Usage("--lat and --lon must be given together".to_string())),
    };
    
    debug!("Opening ledger at {}", config.store_path.display());
    let store = Arc::new(SledStore::open(&config.store_path)?);
    let session = ScanSession::new(TokioContext::shared(provider), store, &config)?;
    
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    
    match &args.command {
        Command::Issue { subject, repeat } => runtime.block_on(issue(args, &session, subject, *repeat)),
        Command::Scan { scanner, payload } => {
            let payload = read_payload(payload.as_deref())?;
            runtime.block_on(scan(args, &session, scanner, payload.as_deref()))
        }
        Command::List { scanner, sort, export } => list(args, &session, scanner, *sort, export.as_ref()),
        Command::Purge { scanner, yes } => purge(&session, scanner, *yes),
        Command::Simulate { .. } => Err(CliError::Usage("simulate does not use the device".to_string())),
    }
}

/// `None` means no code was found; "-" reads the decoded text from stdin.
fn read_payload(arg: Option<&str>) -> Result<Option<String>, CliError> {
    match arg {
        Some("-") => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            let text = text.trim();
            Ok(if text.is_empty() { None } else { Some(text.to_string()) })
        }
        Some(text) => Ok(Some(text.to_string())),
        None => Ok(None),
    }
}

async fn issue(
    args: &Args,
    session: &ScanSession<TokioContext>,
    subject: &str,
    repeat: u32,
) -> Result<ExitCode, CliError> {
    let rounds = repeat.max(1);
    for round in 1..=rounds {
        let issued = session.issue(subject).await?;
        
        if args.json {
            let out = serde_json::json!({
                "payload": issued.payload(),
                "issued_at": issued.credential.issued_at(),
                "expires_at": issued.expires_at(),
            });
            println!("{}", serde_json::to_string(&out)?);
        } else {
            println!("{}", issued.payload());
            println!("{}", issued.issued_stamp());
        }
        
        if round == rounds {
            break;
        }
        
        // Count down the window, then refresh
        while !issued.is_expired(Utc::now()) {
            debug!("Scan within {} seconds", issued.seconds_remaining(Utc::now()));
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Exit code 0 for Success, 2 for a recorded Failed verification.
async fn scan(
    args: &Args,
    session: &ScanSession<TokioContext>,
    scanner: &str,
    payload: Option<&str>,
) -> Result<ExitCode, CliError> {
    let report = session.scan(scanner, payload).await?;
    
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let v = &report.verification;
        println!("{} {}", report.subject, v.outcome);
        println!("  time:     {} ({}ms)", check(v.time_ok), v.time_delta_ms);
        println!("  distance: {} ({:.2}m)", check(v.distance_ok), v.distance_meters);
        if !report.failures.is_empty() {
            let causes: Vec<String> = report.failures.iter().map(|f| f.to_string()).collect();
            println!("  cause:    {}", causes.join(", "));
        }
        print_table(&report.table);
    }
    
    Ok(if report.verification.outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn check(ok: bool) -> &'static str {
    if ok {
        "Success"
    } else {
        "Failed"
    }
}

fn print_table(rows: &[copresence_core::StatusRow]) {
    if rows.is_empty() {
        println!("(no records)");
        return;
    }
    println!("{:<12} {}", "ID", "STATUS");
    for row in rows {
        println!("{:<12} {}", row.subject_id, row.latest_outcome);
    }
}

fn list(
    args: &Args,
    session: &ScanSession<TokioContext>,
    scanner: &str,
    sort: Option<SortKey>,
    export: Option<&PathBuf>,
) -> Result<ExitCode, CliError> {
    let subjects = session.subjects(scanner)?;
    let ledger = LedgerExport::new(scanner, Utc::now(), sort, subjects);
    
    if let Some(path) = export {
        ledger.write_to_file(path)?;
        info!(
            "Exported {} subjects ({} attempts) to {}",
            ledger.subjects.len(),
            ledger.attempt_count(),
            path.display()
        );
    }
    
    if args.json {
        println!("{}", serde_json::to_string_pretty(&ledger.table)?);
    } else {
        print_table(&ledger.table);
    }
    Ok(ExitCode::SUCCESS)
}

fn purge(session: &ScanSession<TokioContext>, scanner: &str, yes: bool) -> Result<ExitCode, CliError> {
    // Validate before asking
    let count = session.subjects(scanner)?.len();
    
    if !yes && !confirm(&format!("Delete all {} records held by {}? [y/N] ", count, scanner))? {
        info!("Purge of {} cancelled", scanner);
        return Ok(ExitCode::SUCCESS);
    }
    
    session.purge(scanner)?;
    info!("Purged {} records held by {}", count, scanner);
    Ok(ExitCode::SUCCESS)
}

fn confirm(prompt: &str) -> Result<bool, CliError> {
    let mut stderr = std::io::stderr();
    stderr.write_all(prompt.as_bytes())?;
    stderr.flush()?;
    
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}

fn simulate(
    args: &Args,
    scenario: &str,
    seed: u64,
    seeds: usize,
    subjects: usize,
    noise: f64,
) -> Result<ExitCode, CliError> {
    if !args.json {
        info!("Copresence DST Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
    
    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if scenario == "all" {
        ScenarioId::all()
    } else {
        vec![scenario.parse().map_err(CliError::Usage)?]
    };
    
    // Determine base seed
    let base_seed = if seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        seed
    };
    
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;
    
    for seed_offset in 0..seeds.max(1) {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed).with_subjects(subjects).with_noise(noise);
        
        for scenario in &scenarios {
            let result = runner.run(*scenario);
            
            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            
            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }
    
    let total = all_results.len();
    let passed = total - failed_count;
    
    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "time_secs": r.final_time_secs,
                    "metrics": r.metrics,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
        }
    }
    
    Ok(if failed_count > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_parse_scan_with_negative_longitude() {
        let args = Args::parse_from([
            "copresence", "--lat", "40.0001", "--lon", "-73.0", "scan", "ABC1-001", "-",
        ]);
        assert_eq!(args.lon, Some(-73.0));
        match args.command {
            Command::Scan { scanner, payload } => {
                assert_eq!(scanner, "ABC1-001");
                assert_eq!(payload.as_deref(), Some("-"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
    
    #[test]
    fn test_parse_list_sort() {
        let args = Args::parse_from(["copresence", "list", "ABC1-001", "--sort", "status"]);
        match args.command {
            Command::List { sort, export, .. } => {
                assert_eq!(sort, Some(SortKey::Status));
                assert!(export.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Args::try_parse_from(["copresence", "list", "ABC1-001", "--sort", "age"]).is_err());
    }
    
    #[test]
    fn test_read_payload() {
        assert_eq!(read_payload(None).unwrap(), None);
        assert_eq!(read_payload(Some("[1]")).unwrap().as_deref(), Some("[1]"));
    }
}
