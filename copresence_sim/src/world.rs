//! SimWorld - The simulation harness container.

use crate::context::SimContext;
use crate::oracle::Oracle;

use copresence_core::{
    KeyValueStore, MemoryStore, PresenceError, ScanSession, ScannerConfig, SledStore, VerificationPolicy,
};
use copresence_env::Coordinate;
use std::sync::Arc;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,
    
    /// Where the scanner stands
    pub venue: Coordinate,
    
    /// GPS noise standard deviation for fixes, meters
    pub gps_noise_std: f64,
    
    /// Scanner configuration (policy, location options, id prefix)
    pub scanner: ScannerConfig,
    
    /// Back the ledger with a temporary sled database instead of memory
    pub durable: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            venue: Coordinate::new(40.0, -73.0),
            gps_noise_std: 0.0,
            scanner: ScannerConfig::default(),
            durable: true,
        }
    }
}

/// The SimWorld - one scanning device, its ledger, and the venue oracle.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,
    
    /// Shared simulation context (virtual clock + position)
    pub context: Arc<SimContext>,
    
    /// The device's scan workflow
    pub session: ScanSession<SimContext>,
    
    /// Ground truth oracle
    pub oracle: Oracle,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Result<Self, PresenceError> {
        let store: Arc<dyn KeyValueStore> = if config.durable {
            Arc::new(SledStore::open_temporary()?)
        } else {
            Arc::new(MemoryStore::new())
        };
        Self::with_store(config, store)
    }
    
    /// Creates a SimWorld over a caller-supplied store.
    pub fn with_store(config: SimConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, PresenceError> {
        // Derive separate seeds for different subsystems
        let context_seed = config.seed;
        let venue_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);
        
        let context = SimContext::shared(context_seed);
        context.set_location(config.venue);
        
        let session = ScanSession::new(Arc::clone(&context), store, &config.scanner)?;
        
        let mut oracle = Oracle::new(venue_seed, config.venue);
        oracle.set_position_noise(config.gps_noise_std);
        
        Ok(Self {
            config,
            context,
            session,
            oracle,
        })
    }
    
    pub fn policy(&self) -> &VerificationPolicy {
        &self.config.scanner.policy
    }
    
    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copresence_env::PresenceContext;
    
    #[test]
    fn test_sim_world_creation() {
        let world = SimWorld::new(SimConfig::default()).unwrap();
        
        assert_eq!(world.time(), 0.0);
        assert_eq!(world.oracle.venue(), Coordinate::new(40.0, -73.0));
        assert!(world.session.view("ABC1-001", None).unwrap().is_empty());
    }
    
    #[test]
    fn test_sim_world_determinism() {
        let config = SimConfig {
            seed: 42,
            gps_noise_std: 4.0,
            durable: false,
            ..Default::default()
        };
        
        let mut world1 = SimWorld::new(config.clone()).unwrap();
        let mut world2 = SimWorld::new(config).unwrap();
        
        let p1 = world1.oracle.place_subject(60.0);
        let p2 = world2.oracle.place_subject(60.0);
        assert_eq!(p1, p2);
        assert_eq!(world1.context.now_utc(), world2.context.now_utc());
    }
    
    #[test]
    fn test_sim_world_rejects_unusable_config() {
        let mut config = SimConfig {
            durable: false,
            ..Default::default()
        };
        config.scanner.credential_validity_secs = u64::MAX;
        
        let err = SimWorld::new(config).err().unwrap();
        assert_eq!(err.kind(), "config_invalid");
    }
}
