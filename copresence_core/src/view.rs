//! Latest-status projection over a scanner's ledger partition.
//!
//! Derived on every read and never written back; the ledger keeps insertion
//! order and the view applies whatever ordering the caller asks for.

use serde::{Deserialize, Serialize};

use crate::ledger::SubjectRecord;
use crate::verifier::Outcome;

/// Column to order the status table by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Ascending subject id
    Id,
    /// Ascending outcome name (`Failed` before `Success`), ties in stored order
    Status,
}

impl std::str::FromStr for SortKey {
    type Err = String;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "id" => Ok(SortKey::Id),
            "status" => Ok(SortKey::Status),
            _ => Err(format!("Unknown sort key: {} (expected id or status)", s)),
        }
    }
}

/// One row of the status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    pub subject_id: String,
    pub latest_outcome: Outcome,
}

/// Projects each record to its latest outcome, in stored order.
pub fn project_latest(subjects: &[SubjectRecord]) -> Vec<StatusRow> {
    subjects
        .iter()
        .map(|r| StatusRow {
            subject_id: r.subject_id().to_string(),
            latest_outcome: r.latest_outcome(),
        })
        .collect()
}

/// Projects and sorts. Both orderings are stable.
pub fn latest_status_view(subjects: &[SubjectRecord], sort_key: SortKey) -> Vec<StatusRow> {
    let mut rows = project_latest(subjects);
    match sort_key {
        SortKey::Id => rows.sort_by(|a, b| a.subject_id.cmp(&b.subject_id)),
        SortKey::Status => rows.sort_by(|a, b| a.latest_outcome.as_str().cmp(b.latest_outcome.as_str())),
    }
    rows
}
