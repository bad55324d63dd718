//! Copresence Core - Proof-of-Presence Verification
//!
//! Decides whether the holder of a scanned credential is physically next to
//! the scanning device right now, and keeps a durable record of every
//! decision:
//! 1. **Geo**: great-circle distance between issuer and scanner
//! 2. **Verifier**: time-window + geofence policy over a decoded credential
//! 3. **Ledger**: per-scanner, append-only attempt history on a key-value store
//! 4. **View**: latest status per subject, sortable by id or status

pub mod config;
pub mod credential;
pub mod error;
pub mod geo;
pub mod identity;
pub mod ledger;
pub mod session;
pub mod store;
pub mod verifier;
pub mod view;

// Re-export key types for convenience
pub use config::{ConfigError, ScannerConfig};
pub use credential::{Credential, CredentialError, IssuedCredential};
pub use error::PresenceError;
pub use geo::distance_meters;
pub use identity::{Identity, IdentityError, IdentityRule};
pub use ledger::{AttemptLedger, SubjectRecord, VerificationAttempt};
pub use session::{ScanReport, ScanSession};
pub use store::{KeyValueStore, MemoryStore, SledStore, StoreError};
pub use verifier::{CheckFailure, Outcome, PresenceVerifier, VerificationPolicy, VerificationReport};
pub use view::{latest_status_view, project_latest, SortKey, StatusRow};
pub use copresence_env::{Coordinate, LocateOptions, LocationError, PresenceContext};
