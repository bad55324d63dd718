//! Scan Session - runs the presence engines against an environment context.
//!
//! This module is the integration layer between the pure engines (identity,
//! credential codec, verifier, ledger, view) and the environment abstraction
//! (`PresenceContext`).
//!
//! # Pipeline
//!
//! ```text
//!  scanner id ──► IdentityRule ──► IdentityInvalid
//!                     │
//!  payload ─────► Credential::decode ──► NoCredential / StructuralInvalid
//!                     │
//!  ctx.now_utc() ─────┤   (captured at presentation)
//!  ctx.current_location() ──► LocationUnavailable (abort, nothing written)
//!                     │
//!               PresenceVerifier ──► Success | Failed
//!                     │
//!               AttemptLedger::record_attempt ──► StorageError
//!                     │
//!               latest_status_view ──► ScanReport
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use copresence_core::{ScanSession, ScannerConfig, SledStore};
//! use copresence_env::{FixedLocation, TokioContext};
//!
//! let ctx = TokioContext::shared(Arc::new(FixedLocation(here)));
//! let store = Arc::new(SledStore::open("ledger")?);
//! let session = ScanSession::new(ctx, store, &ScannerConfig::default())?;
//!
//! let report = session.scan("ABC1-001", Some(payload)).await?;
//! ```

use chrono::{DateTime, Utc};
use copresence_env::{Coordinate, LocateOptions, PresenceContext};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ConfigError, ScannerConfig};
use crate::credential::{Credential, IssuedCredential};
use crate::error::{PresenceError, Result};
use crate::identity::{Identity, IdentityRule};
use crate::ledger::{AttemptLedger, SubjectRecord};
use crate::store::KeyValueStore;
use crate::verifier::{CheckFailure, PresenceVerifier, VerificationReport};
use crate::view::{latest_status_view, project_latest, SortKey, StatusRow};

/// Outcome of a completed scan, as shown to the operator.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scanner: Identity,
    pub subject: Identity,
    pub observed_at: DateTime<Utc>,
    pub observed_location: Coordinate,
    pub verification: VerificationReport,
    
    /// Checks that sank a `Failed` outcome; empty on `Success`
    pub failures: Vec<CheckFailure>,
    
    /// The scanner's status table after this attempt, in stored order
    pub table: Vec<StatusRow>,
}

/// One device's issue/scan workflow.
pub struct ScanSession<Ctx: PresenceContext> {
    ctx: Arc<Ctx>,
    ledger: AttemptLedger,
    verifier: PresenceVerifier,
    rule: IdentityRule,
    locate: LocateOptions,
    credential_validity: chrono::Duration,
}

impl<Ctx: PresenceContext> ScanSession<Ctx> {
    /// Fails when `config` holds a value the session cannot represent.
    pub fn new(
        ctx: Arc<Ctx>,
        store: Arc<dyn KeyValueStore>,
        config: &ScannerConfig,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            ctx,
            ledger: AttemptLedger::new(store),
            verifier: PresenceVerifier::new(config.policy),
            rule: config.identity_rule(),
            locate: config.locate,
            credential_validity: config.credential_validity()?,
        })
    }
    
    pub fn ledger(&self) -> &AttemptLedger {
        &self.ledger
    }
    
    pub fn identity_rule(&self) -> &IdentityRule {
        &self.rule
    }
    
    /// Generates a credential for `subject_input` at the current time and place.
    pub async fn issue(&self, subject_input: &str) -> Result<IssuedCredential> {
        let subject = self.rule.parse_input(subject_input)?;
        
        let location = self.ctx.current_location(&self.locate).await.map_err(|e| {
            warn!("Issue for {} aborted: {}", subject, e);
            e
        })?;
        let issued_at = self.ctx.now_utc();
        
        let issued = IssuedCredential::new(
            Credential::new(subject, issued_at, location),
            self.credential_validity,
        );
        info!("Issued credential payload: {}", issued.payload());
        Ok(issued)
    }
    
    /// Verifies a scanned payload and records the outcome under `scanner_input`.
    ///
    /// `payload` is `None` when the credential source found no code.
    pub async fn scan(&self, scanner_input: &str, payload: Option<&str>) -> Result<ScanReport> {
        let scanner = self.rule.parse_input(scanner_input)?;
        
        let payload = payload.ok_or(PresenceError::NoCredential)?;
        let credential = Credential::decode(payload, &self.rule).map_err(|e| {
            warn!("Rejected payload under {}: {}", scanner, e);
            e
        })?;
        
        // The instant of presentation, not of the (possibly slow) fix
        let observed_at = self.ctx.now_utc();
        let observed_location = self.ctx.current_location(&self.locate).await.map_err(|e| {
            warn!("Scan under {} aborted ({}): {}", scanner, e.cause(), e);
            e
        })?;
        
        let verification = self.verifier.verify(&credential, observed_at, observed_location);
        info!(
            "Scan {} by {}: {} ({}ms, {:.2}m)",
            credential.subject(),
            scanner,
            verification.outcome,
            verification.time_delta_ms,
            verification.distance_meters
        );
        
        let written = self.ledger.record_attempt(
            &scanner,
            credential.subject(),
            verification.outcome,
            observed_at,
            observed_location,
        )?;
        let table = project_latest(&written);
        
        Ok(ScanReport {
            scanner,
            subject: credential.subject().clone(),
            observed_at,
            observed_location,
            failures: verification.failures(),
            verification,
            table,
        })
    }
    
    /// Full attempt history under `scanner_input`.
    pub fn subjects(&self, scanner_input: &str) -> Result<Vec<SubjectRecord>> {
        let scanner = self.rule.parse_input(scanner_input)?;
        Ok(self.ledger.get_subjects(&scanner)?)
    }
    
    /// Status table under `scanner_input`, in stored order unless a key is given.
    pub fn view(&self, scanner_input: &str, sort: Option<SortKey>) -> Result<Vec<StatusRow>> {
        let subjects = self.subjects(scanner_input)?;
        Ok(match sort {
            Some(key) => latest_status_view(&subjects, key),
            None => project_latest(&subjects),
        })
    }
    
    /// Deletes everything under `scanner_input`. The caller has already confirmed.
    pub fn purge(&self, scanner_input: &str) -> Result<()> {
        let scanner = self.rule.parse_input(scanner_input)?;
        Ok(self.ledger.purge(&scanner)?)
    }
}
