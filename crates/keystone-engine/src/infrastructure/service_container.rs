//! Service container for dependency injection

use std::sync::Arc;

use keystone_core::{AccessTierResolver, ActivityParams, ActivityTracker, CurvePricingEngine};
use tracing::info;

use crate::adapters::{InstantSettlement, MemoryStore, SimulatedLaunchExecutor};
use crate::config::EngineConfig;
use crate::core::{CurveRepository, EngineResult, LaunchExecutor, SettlementGateway, VaultRepository};
use crate::infrastructure::KeyedLocks;
use crate::services::{CurveMarket, GraduationStateMachine, LockedValueVault};

/// Engine services wired against one set of collaborators
pub struct Engine {
    /// Configuration
    pub config: EngineConfig,

    pub market: CurveMarket,

    pub vault: LockedValueVault,

    pub graduation: GraduationStateMachine,

    pricing: CurvePricingEngine,
    tiers: AccessTierResolver,
}

impl Engine {
    /// Validate the configuration and build every service
    pub fn new(
        config: EngineConfig,
        curves: Arc<dyn CurveRepository>,
        vault: Arc<dyn VaultRepository>,
        settlement: Arc<dyn SettlementGateway>,
        executor: Arc<dyn LaunchExecutor>,
    ) -> EngineResult<Self> {
        info!("Initializing engine services");
        config.validate()?;

        let pricing = config.pricing_engine()?;
        let tiers = config.tier_resolver()?;

        // Market and graduation share one lock per curve so freeze waits
        // for in-flight trades
        let curve_locks = Arc::new(KeyedLocks::new());

        let market = CurveMarket::new(
            curves.clone(),
            settlement,
            pricing,
            tiers,
            config.market.clone(),
            curve_locks.clone(),
        );
        let vault = LockedValueVault::new(vault, config.retry.clone());
        let graduation = GraduationStateMachine::new(
            curves,
            executor,
            *pricing.fees(),
            config.graduation.clone(),
            curve_locks,
        );

        info!("Engine services initialized");
        Ok(Self {
            config,
            market,
            vault,
            graduation,
            pricing,
            tiers,
        })
    }

    /// Engine backed by the in-memory adapters
    pub fn in_memory(config: EngineConfig) -> EngineResult<Self> {
        let store = Arc::new(MemoryStore::new());
        Self::new(
            config,
            store.clone(),
            store,
            Arc::new(InstantSettlement::new()),
            Arc::new(SimulatedLaunchExecutor::new()),
        )
    }

    pub fn pricing(&self) -> &CurvePricingEngine {
        &self.pricing
    }

    pub fn tiers(&self) -> &AccessTierResolver {
        &self.tiers
    }

    pub fn activity_params(&self) -> ActivityParams {
        self.config.activity.params()
    }

    /// Fresh activity tracker using the configured decay
    pub fn activity_tracker(&self) -> EngineResult<ActivityTracker> {
        Ok(ActivityTracker::new(self.activity_params())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use keystone_core::{ActivityEvent, ActivityKind};

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.fees.referral_bps = 0;
        assert!(Engine::in_memory(config).is_err());
    }

    #[test]
    fn test_activity_tracker_uses_configured_decay() {
        let mut config = EngineConfig::default();
        config.activity.tau_hours = 1.0;
        let engine = Engine::in_memory(config).unwrap();

        let start = Utc::now();
        let mut tracker = engine.activity_tracker().unwrap();
        tracker
            .record(&ActivityEvent::new(ActivityKind::RoomSuccess, start))
            .unwrap();

        let later = tracker.score_at(start + Duration::hours(5));
        assert!(later < 1.0);
        assert!(later > 0.0);
    }
}
