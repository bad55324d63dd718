//! The attempt ledger - durable per-scanner history of verification outcomes.
//!
//! Layout in the backing store, one key per scanner:
//!
//! ```text
//! "ABC1-001" -> [{"id":"ABC1-005","attempts":[["Success","2024-01-01T00:00:10Z",[40.0001,-73.0]], ...]}, ...]
//! ```
//!
//! Each write replaces the scanner's whole partition in one `set`, so a failed
//! write leaves the previous partition as it was. Read-modify-write cycles on
//! the same scanner are serialized within the process; across processes a
//! single writer per scanner is assumed.

use chrono::{DateTime, Utc};
use copresence_env::Coordinate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::identity::Identity;
use crate::store::{KeyValueStore, StoreError};
use crate::verifier::Outcome;

/// One recorded verification. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AttemptWire", into = "AttemptWire")]
pub struct VerificationAttempt {
    pub outcome: Outcome,
    pub observed_at: DateTime<Utc>,
    pub observed_location: Coordinate,
}

/// Stored as a positional triple to keep partitions small.
#[derive(Serialize, Deserialize)]
struct AttemptWire(Outcome, DateTime<Utc>, Coordinate);

impl From<AttemptWire> for VerificationAttempt {
    fn from(w: AttemptWire) -> Self {
        Self {
            outcome: w.0,
            observed_at: w.1,
            observed_location: w.2,
        }
    }
}

impl From<VerificationAttempt> for AttemptWire {
    fn from(a: VerificationAttempt) -> Self {
        AttemptWire(a.outcome, a.observed_at, a.observed_location)
    }
}

/// A subject's attempt history under one scanner.
///
/// `attempts` is in append order and never empty; a stored record with an
/// empty history fails to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordWire")]
pub struct SubjectRecord {
    #[serde(rename = "id")]
    subject_id: String,
    attempts: Vec<VerificationAttempt>,
}

#[derive(Deserialize)]
struct RecordWire {
    id: String,
    attempts: Vec<VerificationAttempt>,
}

impl TryFrom<RecordWire> for SubjectRecord {
    type Error = String;
    
    fn try_from(w: RecordWire) -> Result<Self, Self::Error> {
        if w.attempts.is_empty() {
            return Err(format!("subject {} has no attempts", w.id));
        }
        Ok(Self {
            subject_id: w.id,
            attempts: w.attempts,
        })
    }
}

impl SubjectRecord {
    pub fn new(subject_id: impl Into<String>, first: VerificationAttempt) -> Self {
        Self {
            subject_id: subject_id.into(),
            attempts: vec![first],
        }
    }
    
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }
    
    pub fn attempts(&self) -> &[VerificationAttempt] {
        &self.attempts
    }
    
    /// Outcome of the most recent attempt.
    pub fn latest_outcome(&self) -> Outcome {
        self.attempts
            .last()
            .map(|a| a.outcome)
            .unwrap_or(Outcome::Failed)
    }
    
    pub(crate) fn push(&mut self, attempt: VerificationAttempt) {
        self.attempts.push(attempt);
    }
}

/// Per-scanner store of subject records.
pub struct AttemptLedger {
    store: Arc<dyn KeyValueStore>,
    
    /// One mutex per scanner key, guarding read-modify-write
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AttemptLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }
    
    fn scanner_lock(&self, scanner: &Identity) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Unavailable("ledger lock table poisoned".to_string()))?;
        Ok(locks
            .entry(scanner.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }
    
    fn load(&self, scanner: &Identity) -> Result<Vec<SubjectRecord>, StoreError> {
        match self.store.get(scanner.as_str())? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                StoreError::Corrupt(format!("partition {}: {}", scanner, e))
            }),
        }
    }
    
    /// Appends an attempt to `subject`'s history under `scanner`, creating
    /// the record (and the partition) on first sight.
    ///
    /// Returns the partition exactly as written.
    pub fn record_attempt(
        &self,
        scanner: &Identity,
        subject: &Identity,
        outcome: Outcome,
        observed_at: DateTime<Utc>,
        observed_location: Coordinate,
    ) -> Result<Vec<SubjectRecord>, StoreError> {
        let attempt = VerificationAttempt {
            outcome,
            observed_at,
            observed_location,
        };
        
        let lock = self.scanner_lock(scanner)?;
        let _guard = lock
            .lock()
            .map_err(|_| StoreError::Unavailable(format!("scanner {} lock poisoned", scanner)))?;
        
        let mut records = self.load(scanner)?;
        match records.iter_mut().find(|r| r.subject_id == subject.as_str()) {
            Some(record) => record.push(attempt),
            None => records.push(SubjectRecord::new(subject.as_str(), attempt)),
        }
        
        let encoded = serde_json::to_string(&records)
            .map_err(|e| StoreError::Corrupt(format!("encode partition {}: {}", scanner, e)))?;
        if let Err(e) = self.store.set(scanner.as_str(), &encoded) {
            warn!("Ledger write for {} failed: {}", scanner, e);
            return Err(e);
        }
        
        debug!("Recorded {} for {} under {} ({} subjects)", outcome, subject, scanner, records.len());
        Ok(records)
    }
    
    /// Returns the scanner's subject records in stored order.
    pub fn get_subjects(&self, scanner: &Identity) -> Result<Vec<SubjectRecord>, StoreError> {
        self.load(scanner)
    }
    
    /// Deletes every record under `scanner`. Irreversible; callers confirm first.
    pub fn purge(&self, scanner: &Identity) -> Result<(), StoreError> {
        let lock = self.scanner_lock(scanner)?;
        let _guard = lock
            .lock()
            .map_err(|_| StoreError::Unavailable(format!("scanner {} lock poisoned", scanner)))?;
        
        self.store.remove(scanner.as_str())?;
        info!("Purged ledger partition {}", scanner);
        Ok(())
    }
}
