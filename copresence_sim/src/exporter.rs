//! JSON exporter for a scanner's ledger.
//!
//! Writes the status table (in the requested order) alongside the full attempt
//! history, for inspection outside the device.

use chrono::{DateTime, SecondsFormat, Utc};
use copresence_core::{latest_status_view, project_latest, SortKey, StatusRow, SubjectRecord};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete ledger export for one scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerExport {
    /// Scanner identity the partition belongs to
    pub scanner: String,
    
    /// When the export was taken (RFC3339, millisecond precision)
    pub exported_at: String,
    
    /// Ordering applied to `table`, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortKey>,
    
    /// Latest status per subject
    pub table: Vec<StatusRow>,
    
    /// Every recorded attempt, in stored order
    pub subjects: Vec<SubjectRecord>,
}

impl LedgerExport {
    /// Creates an export container.
    pub fn new(
        scanner: &str,
        exported_at: DateTime<Utc>,
        sort: Option<SortKey>,
        subjects: Vec<SubjectRecord>,
    ) -> Self {
        let table = match sort {
            Some(key) => latest_status_view(&subjects, key),
            None => project_latest(&subjects),
        };
        Self {
            scanner: scanner.to_string(),
            exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            sort,
            table,
            subjects,
        }
    }
    
    /// Number of attempts across all subjects.
    pub fn attempt_count(&self) -> usize {
        self.subjects.iter().map(|s| s.attempts().len()).sum()
    }
    
    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copresence_core::Outcome;
    
    fn subjects() -> Vec<SubjectRecord> {
        serde_json::from_str(
            r#"[
                {"id":"ABC1-009","attempts":[["Success","2024-01-01T00:00:10Z",[40.0001,-73.0]]]},
                {"id":"ABC1-002","attempts":[["Success","2024-01-01T00:00:20Z",[40.0,-73.0]],
                                             ["Failed","2024-01-01T00:01:00Z",[40.0,-73.0]]]}
            ]"#,
        )
        .unwrap()
    }
    
    #[test]
    fn test_export_sorted_table() {
        let at = DateTime::parse_from_rfc3339("2024-01-01T00:02:00Z").unwrap().with_timezone(&Utc);
        let export = LedgerExport::new("ABC1-001", at, Some(SortKey::Status), subjects());
        
        assert_eq!(export.exported_at, "2024-01-01T00:02:00.000Z");
        assert_eq!(export.table[0].subject_id, "ABC1-002");
        assert_eq!(export.table[0].latest_outcome, Outcome::Failed);
        assert_eq!(export.subjects[0].subject_id(), "ABC1-009");
        assert_eq!(export.attempt_count(), 3);
    }
    
    #[test]
    fn test_write_to_file() {
        let at = DateTime::parse_from_rfc3339("2024-01-01T00:02:00Z").unwrap().with_timezone(&Utc);
        let export = LedgerExport::new("ABC1-001", at, None, subjects());
        let path = std::env::temp_dir().join(format!("copresence-export-{}.json", std::process::id()));
        
        export.write_to_file(&path).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).ok();
        
        assert_eq!(written["scanner"], "ABC1-001");
        assert!(written.get("sort").is_none());
        assert_eq!(written["table"][0]["subject_id"], "ABC1-009");
        assert_eq!(written["subjects"][1]["attempts"][1][0], "Failed");
    }
}
