//! Simulation context implementing PresenceContext for deterministic testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copresence_env::{Coordinate, LocateOptions, LocationError, PresenceContext};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, UNIX_EPOCH};

/// Simulation context backed by a virtual clock and a scripted position.
///
/// This implements `PresenceContext` using:
/// - A virtual clock that only moves when advanced (or when a fix is taken)
/// - A settable position, or a settable failure
/// - A fix latency that consumes virtual time and trips the request timeout
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,
    
    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,
    
    /// What the next location request returns
    location: Arc<Mutex<Result<Coordinate, LocationError>>>,
    
    /// Virtual time a location request takes
    fix_latency: Arc<Mutex<Duration>>,
    
    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: DateTime<Utc>,
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    ///
    /// Virtual time 0 is 2024-01-01 00:00:00 UTC; the device reports
    /// `PositionUnavailable` until a position is set.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            location: Arc::new(Mutex::new(Err(LocationError::PositionUnavailable))),
            fix_latency: Arc::new(Mutex::new(Duration::ZERO)),
            epoch: DateTime::<Utc>::from(UNIX_EPOCH + Duration::from_secs(1704067200)), // 2024-01-01 00:00:00 UTC
        }
    }
    
    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }
    
    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = guard(&self.virtual_time_ns);
        *time += duration.as_nanos() as u64;
    }
    
    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *guard(&self.virtual_time_ns)
    }
    
    /// Returns the virtual time elapsed since the epoch.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }
    
    /// Moves the device.
    pub fn set_location(&self, location: Coordinate) {
        *guard(&self.location) = Ok(location);
    }
    
    /// Makes every following location request fail with `error`.
    pub fn fail_location(&self, error: LocationError) {
        *guard(&self.location) = Err(error);
    }
    
    /// Sets how much virtual time a location request consumes.
    pub fn set_fix_latency(&self, latency: Duration) {
        *guard(&self.fix_latency) = latency;
    }
    
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            location: Arc::clone(&self.location),
            fix_latency: Arc::clone(&self.fix_latency),
            epoch: self.epoch,
        }
    }
}

#[async_trait]
impl PresenceContext for SimContext {
    fn now_utc(&self) -> DateTime<Utc> {
        self.epoch + chrono::Duration::nanoseconds(self.time_ns() as i64)
    }
    
    async fn current_location(&self, options: &LocateOptions) -> Result<Coordinate, LocationError> {
        let latency = *guard(&self.fix_latency);
        if latency > options.timeout {
            self.advance_time(options.timeout);
            return Err(LocationError::Timeout(options.timeout.as_millis() as u64));
        }
        self.advance_time(latency);
        guard(&self.location).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now_utc().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        
        ctx.advance_time(Duration::from_secs(1));
        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.elapsed(), Duration::from_millis(1500));
        assert_eq!(ctx.now_utc().to_rfc3339(), "2024-01-01T00:00:01.500+00:00");
    }
    
    #[test]
    fn test_sim_context_clone_shares_state() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();
        
        ctx1.advance_time(Duration::from_secs(5));
        ctx1.set_location(Coordinate::new(1.0, 2.0));
        
        assert_eq!(ctx1.now_utc(), ctx2.now_utc());
        assert_eq!(ctx2.seed(), 42);
    }
    
    #[tokio::test]
    async fn test_sim_context_location_script() {
        let ctx = SimContext::new(7);
        let opts = LocateOptions::default();
        
        assert_eq!(ctx.current_location(&opts).await, Err(LocationError::PositionUnavailable));
        
        ctx.set_location(Coordinate::new(40.0, -73.0));
        ctx.set_fix_latency(Duration::from_millis(800));
        assert_eq!(ctx.current_location(&opts).await, Ok(Coordinate::new(40.0, -73.0)));
        assert_eq!(ctx.elapsed(), Duration::from_millis(800));
    }
    
    #[tokio::test]
    async fn test_sim_context_slow_fix_times_out() {
        let ctx = SimContext::new(7);
        ctx.set_location(Coordinate::new(40.0, -73.0));
        ctx.set_fix_latency(Duration::from_secs(12));
        
        let fix = ctx.current_location(&LocateOptions::default()).await;
        assert_eq!(fix, Err(LocationError::Timeout(10_000)));
        assert_eq!(ctx.elapsed(), Duration::from_secs(10));
    }
}
