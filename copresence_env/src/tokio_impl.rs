//! Production implementation of PresenceContext using Tokio.

use crate::{Coordinate, LocateOptions, LocationError, LocationProvider, PresenceContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Production context backed by the system clock and a platform provider.
///
/// Each call to `current_location` goes straight to the provider; there is
/// no reading cache, so a maximum age of zero is always satisfied.
pub struct TokioContext {
    provider: Arc<dyn LocationProvider>,
}

impl TokioContext {
    /// Creates a new TokioContext over the given location provider.
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        Self { provider }
    }
    
    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared(provider: Arc<dyn LocationProvider>) -> Arc<Self> {
        Arc::new(Self::new(provider))
    }
}

#[async_trait]
impl PresenceContext for TokioContext {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
    
    async fn current_location(&self, options: &LocateOptions) -> Result<Coordinate, LocationError> {
        match tokio::time::timeout(options.timeout, self.provider.fix(options.high_accuracy)).await {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout(options.timeout.as_millis() as u64)),
        }
    }
}

/// A provider that always reports the same position.
///
/// Stands in for the platform call on hosts without a positioning service
/// (the operator supplies the coordinates).
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinate);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn fix(&self, _high_accuracy: bool) -> Result<Coordinate, LocationError> {
        Ok(self.0)
    }
}

/// A provider for hosts with no position source at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn fix(&self, _high_accuracy: bool) -> Result<Coordinate, LocationError> {
        Err(LocationError::PositionUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    
    struct StalledProvider;
    
    #[async_trait]
    impl LocationProvider for StalledProvider {
        async fn fix(&self, _high_accuracy: bool) -> Result<Coordinate, LocationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Coordinate::new(0.0, 0.0))
        }
    }
    
    #[tokio::test]
    async fn test_tokio_context_fixed_location() {
        let here = Coordinate::new(40.0, -73.0);
        let ctx = TokioContext::new(Arc::new(FixedLocation(here)));
        
        let fix = ctx.current_location(&LocateOptions::default()).await;
        assert_eq!(fix, Ok(here));
    }
    
    #[tokio::test]
    async fn test_tokio_context_no_location() {
        let ctx = TokioContext::new(Arc::new(NoLocation));
        
        let fix = ctx.current_location(&LocateOptions::default()).await;
        assert_eq!(fix, Err(LocationError::PositionUnavailable));
    }
    
    #[tokio::test]
    async fn test_tokio_context_times_out() {
        let ctx = TokioContext::new(Arc::new(StalledProvider));
        let opts = LocateOptions {
            timeout: Duration::from_millis(20),
            ..Default::default()
        };
        
        let fix = ctx.current_location(&opts).await;
        assert_eq!(fix, Err(LocationError::Timeout(20)));
    }
    
    #[test]
    fn test_tokio_context_clock_is_utc_now() {
        let ctx = TokioContext::new(Arc::new(NoLocation));
        let before = Utc::now();
        let now = ctx.now_utc();
        assert!(now >= before);
    }
}
