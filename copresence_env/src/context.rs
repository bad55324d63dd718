//! Core environment context trait for co-presence verification.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::LocationError;
use crate::types::{Coordinate, LocateOptions};

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so the verification pipeline can
/// run in both production (tokio + platform fix) and simulation (virtual
/// clock + scripted fixes).
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `Utc::now()` and a `LocationProvider`
/// - **Simulation**: `SimContext` - virtual clock, settable position
///
/// # Determinism
///
/// Every reading the verifier depends on comes through here, so a scan is
/// reproducible given the same context state.
#[async_trait]
pub trait PresenceContext: Send + Sync + 'static {
    /// Returns the current wall-clock instant in UTC.
    ///
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn now_utc(&self) -> DateTime<Utc>;
    
    /// Requests a fresh position fix.
    ///
    /// Implementations must honour `options.timeout` and must not return a
    /// reading older than `options.maximum_age`.
    ///
    /// # Returns
    /// * `Ok(coordinate)` - quantized to 6 decimal places
    /// * `Err(LocationError)` - the scan must be aborted
    async fn current_location(&self, options: &LocateOptions) -> Result<Coordinate, LocationError>;
}

/// The raw platform geolocation call.
///
/// Kept separate from `PresenceContext` so the production context can wrap
/// any source with the timeout policy.
#[async_trait]
pub trait LocationProvider: Send + Sync + 'static {
    /// Asks the platform for a position.
    async fn fix(&self, high_accuracy: bool) -> Result<Coordinate, LocationError>;
}
