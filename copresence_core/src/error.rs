//! Error taxonomy for a user-initiated action.
//!
//! Every variant ends the current action; nothing is retried internally.
//! Time and distance failures are not errors: they are `Failed` outcomes and
//! get recorded.

use copresence_env::LocationError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::credential::CredentialError;
use crate::identity::IdentityError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PresenceError {
    /// The payload is not a `(string, string, number, number)` credential
    #[error("Structurally invalid credential: {0}")]
    StructuralInvalid(#[from] CredentialError),
    
    /// Operator-entered identity fails the format rule
    #[error("{0}")]
    IdentityInvalid(#[from] IdentityError),
    
    /// The credential source found nothing to decode
    #[error("No QR code detected.")]
    NoCredential,
    
    /// Location fix failed; the scan was aborted before any write
    #[error("{0}")]
    LocationUnavailable(#[from] LocationError),
    
    /// Ledger read or write failed; persisted state is unchanged
    #[error("{0}")]
    Storage(#[from] StoreError),
    
    /// Device configuration rejected before the session started
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl PresenceError {
    /// Short machine-readable kind, for logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StructuralInvalid(_) => "structural_invalid",
            Self::IdentityInvalid(_) => "identity_invalid",
            Self::NoCredential => "no_credential",
            Self::LocationUnavailable(_) => "location_unavailable",
            Self::Storage(_) => "storage_error",
            Self::Config(_) => "config_invalid",
        }
    }
}

pub type Result<T> = std::result::Result<T, PresenceError>;
