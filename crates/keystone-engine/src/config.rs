use std::fs;
use std::path::Path;
use std::time::Duration;

use keystone_core::constants::*;
use keystone_core::{
    AccessTierResolver, ActivityParams, CurvePricingEngine, FeeSchedule, PricingParams, ResidualPolicy,
    TierThresholds, WalletCapParams,
};
use serde::{Deserialize, Serialize};

use crate::core::{EngineError, EngineResult};

/// Engine configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Curve coefficients for newly created curves
    pub pricing: PricingConfig,

    /// Fee routing in basis points
    pub fees: FeesConfig,

    /// Tier gates and wallet cap
    pub tiers: TiersConfig,

    /// Trade limits
    pub market: MarketConfig,

    /// Freeze and launch thresholds
    pub graduation: GraduationConfig,

    /// Activity score decay
    pub activity: ActivityConfig,

    /// Retry configuration for storage conflicts
    pub retry: RetryConfig,

    /// Log output
    pub logging: LoggingConfig,
}

/// Pricing coefficients in minor units
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PricingConfig {
    pub base_price: u64,
    pub linear_coefficient: u64,
    pub exponential_coefficient: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeesConfig {
    pub referral_bps: u16,
    pub buyback_bps: u16,
    pub community_bps: u16,
    pub reserve_bps: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TiersConfig {
    pub contributor_threshold: u64,
    pub curator_threshold: u64,
    pub partner_threshold: u64,

    /// Cap before any holders join
    pub wallet_cap_base: u64,

    /// Cap growth per unique holder, parts per million
    pub wallet_cap_growth_ppm: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MarketConfig {
    /// Largest buy accepted in one call
    pub max_shares_per_trade: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GraduationConfig {
    /// Reserve required before the owner may freeze (minor units)
    pub threshold: u64,

    /// Largest reserve spend allowed at launch (minor units)
    pub max_launch_spend: u64,

    pub min_holders: u64,
    pub min_supply: u64,

    /// What happens to the distribution flooring residual
    pub residual_policy: ResidualPolicy,

    /// Abort a launch that has not been dispatched within this many
    /// seconds. 0 disables the timeout.
    pub dispatch_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ActivityConfig {
    pub tau_hours: f64,
    pub base: f64,
    pub max_score: f64,
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum number of retries for failed operations
    pub max_retries: u32,

    /// Base delay between retries in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            EngineError::Configuration(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            EngineError::Configuration(format!("Failed to write config file {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> EngineResult<()> {
        self.pricing.validate()?;
        self.fees.validate()?;
        self.tiers.validate()?;
        self.market.validate()?;
        self.graduation.validate()?;
        self.activity.validate()?;
        self.retry.validate()?;
        Ok(())
    }

    pub fn pricing_engine(&self) -> EngineResult<CurvePricingEngine> {
        Ok(CurvePricingEngine::new(self.pricing.params(), self.fees.schedule())?)
    }

    pub fn tier_resolver(&self) -> EngineResult<AccessTierResolver> {
        Ok(AccessTierResolver::new(self.tiers.thresholds(), self.tiers.wallet_cap())?)
    }
}

impl PricingConfig {
    pub fn params(&self) -> PricingParams {
        PricingParams {
            base_price: self.base_price as u128,
            linear_coefficient: self.linear_coefficient as u128,
            exponential_coefficient: self.exponential_coefficient as u128,
        }
    }

    fn validate(&self) -> EngineResult<()> {
        if self.linear_coefficient == 0 && self.exponential_coefficient == 0 {
            return Err(EngineError::invalid_parameter(
                "pricing.linear_coefficient",
                "0",
                "greater than 0 unless exponential_coefficient is set",
            ));
        }
        self.params().validate()?;
        Ok(())
    }
}

impl FeesConfig {
    pub fn schedule(&self) -> FeeSchedule {
        FeeSchedule {
            referral_bps: self.referral_bps,
            buyback_bps: self.buyback_bps,
            community_bps: self.community_bps,
            reserve_bps: self.reserve_bps,
        }
    }

    fn validate(&self) -> EngineResult<()> {
        let total = self.schedule().total_bps();
        if total != MAX_BPS as u32 {
            return Err(EngineError::invalid_parameter(
                "fees",
                &format!("{} bps", total),
                "routing that sums to 10000 bps",
            ));
        }
        if self.reserve_bps == 0 {
            return Err(EngineError::invalid_parameter("fees.reserve_bps", "0", "greater than 0"));
        }
        Ok(())
    }
}

impl TiersConfig {
    pub fn thresholds(&self) -> TierThresholds {
        TierThresholds {
            contributor: self.contributor_threshold,
            curator: self.curator_threshold,
            partner: self.partner_threshold,
        }
    }

    pub fn wallet_cap(&self) -> WalletCapParams {
        WalletCapParams {
            base: self.wallet_cap_base,
            growth_ppm: self.wallet_cap_growth_ppm,
        }
    }

    fn validate(&self) -> EngineResult<()> {
        if self.thresholds().validate().is_err() {
            return Err(EngineError::invalid_parameter(
                "tiers",
                &format!(
                    "{}/{}/{}",
                    self.contributor_threshold, self.curator_threshold, self.partner_threshold
                ),
                "0 < contributor < curator < partner",
            ));
        }
        if self.wallet_cap_base == 0 {
            return Err(EngineError::invalid_parameter("tiers.wallet_cap_base", "0", "greater than 0"));
        }
        Ok(())
    }
}

impl MarketConfig {
    fn validate(&self) -> EngineResult<()> {
        if self.max_shares_per_trade == 0 {
            return Err(EngineError::invalid_parameter("market.max_shares_per_trade", "0", "greater than 0"));
        }
        Ok(())
    }
}

impl GraduationConfig {
    fn validate(&self) -> EngineResult<()> {
        if self.threshold == 0 {
            return Err(EngineError::invalid_parameter("graduation.threshold", "0", "greater than 0"));
        }
        if self.max_launch_spend == 0 {
            return Err(EngineError::invalid_parameter("graduation.max_launch_spend", "0", "greater than 0"));
        }
        if self.min_holders == 0 {
            return Err(EngineError::invalid_parameter("graduation.min_holders", "0", "greater than 0"));
        }
        Ok(())
    }

    pub fn dispatch_timeout(&self) -> Option<Duration> {
        (self.dispatch_timeout_secs > 0).then(|| Duration::from_secs(self.dispatch_timeout_secs))
    }
}

impl ActivityConfig {
    pub fn params(&self) -> ActivityParams {
        ActivityParams {
            tau_hours: self.tau_hours,
            base: self.base,
            max_score: self.max_score,
        }
    }

    fn validate(&self) -> EngineResult<()> {
        if self.tau_hours.is_nan() || self.tau_hours <= 0.0 {
            return Err(EngineError::invalid_parameter(
                "activity.tau_hours",
                &self.tau_hours.to_string(),
                "greater than 0",
            ));
        }
        if self.params().validate().is_err() {
            return Err(EngineError::invalid_parameter(
                "activity.max_score",
                &self.max_score.to_string(),
                &format!("greater than base ({})", self.base),
            ));
        }
        Ok(())
    }
}

impl RetryConfig {
    /// Validate retry configuration
    fn validate(&self) -> EngineResult<()> {
        if self.max_retries == 0 {
            return Err(EngineError::invalid_parameter("max_retries", "0", "greater than 0"));
        }

        if self.base_delay_ms == 0 {
            return Err(EngineError::invalid_parameter("base_delay_ms", "0", "greater than 0"));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(EngineError::invalid_parameter(
                "max_delay_ms",
                &self.max_delay_ms.to_string(),
                &format!("greater than or equal to base_delay_ms ({})", self.base_delay_ms),
            ));
        }

        if self.backoff_multiplier <= 1.0 {
            return Err(EngineError::invalid_parameter(
                "backoff_multiplier",
                &self.backoff_multiplier.to_string(),
                "greater than 1.0",
            ));
        }

        Ok(())
    }

    /// Calculate delay for retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(self.base_delay_ms);
        }

        let exponential_delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((exponential_delay as u64).min(self.max_delay_ms))
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price: DEFAULT_BASE_PRICE as u64,
            linear_coefficient: DEFAULT_LINEAR_COEFFICIENT as u64,
            exponential_coefficient: DEFAULT_EXPONENTIAL_COEFFICIENT as u64,
        }
    }
}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            referral_bps: DEFAULT_REFERRAL_BPS,
            buyback_bps: DEFAULT_BUYBACK_BPS,
            community_bps: DEFAULT_COMMUNITY_BPS,
            reserve_bps: DEFAULT_RESERVE_BPS,
        }
    }
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            contributor_threshold: DEFAULT_CONTRIBUTOR_THRESHOLD,
            curator_threshold: DEFAULT_CURATOR_THRESHOLD,
            partner_threshold: DEFAULT_PARTNER_THRESHOLD,
            wallet_cap_base: DEFAULT_WALLET_CAP_BASE,
            wallet_cap_growth_ppm: DEFAULT_WALLET_CAP_GROWTH_PPM,
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            max_shares_per_trade: DEFAULT_MAX_SHARES_PER_TRADE,
        }
    }
}

impl Default for GraduationConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_GRADUATION_THRESHOLD as u64,
            max_launch_spend: DEFAULT_MAX_LAUNCH_SPEND as u64,
            min_holders: DEFAULT_MIN_LAUNCH_HOLDERS,
            min_supply: DEFAULT_MIN_LAUNCH_SUPPLY,
            residual_policy: ResidualPolicy::default(),
            dispatch_timeout_secs: 30,
        }
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            tau_hours: DEFAULT_ACTIVITY_TAU_HOURS,
            base: DEFAULT_ACTIVITY_BASE,
            max_score: DEFAULT_ACTIVITY_MAX,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 50,
            max_delay_ms: 2_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Create example configuration file
pub fn create_example_config(path: impl AsRef<Path>) -> EngineResult<()> {
    let example_config = EngineConfig {
        graduation: GraduationConfig {
            residual_policy: ResidualPolicy::ReturnToReserve,
            dispatch_timeout_secs: 60,
            ..GraduationConfig::default()
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            json: true,
        },
        ..EngineConfig::default()
    };

    example_config.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        assert!(config.validate().is_ok());

        // Fee routing must be complete
        config.fees.reserve_bps = 9_000;
        assert!(config.validate().is_err());
        config.fees = FeesConfig::default();

        config.tiers.curator_threshold = 30;
        assert!(config.validate().is_err());
        config.tiers = TiersConfig::default();

        config.market.max_shares_per_trade = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_config() {
        let retry = RetryConfig::default();
        assert!(retry.validate().is_ok());

        assert_eq!(retry.delay_for_attempt(0), Duration::from_millis(50));
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for_attempt(10), Duration::from_millis(2_000));
    }

    #[test]
    fn test_dispatch_timeout() {
        let mut graduation = GraduationConfig::default();
        assert_eq!(graduation.dispatch_timeout(), Some(Duration::from_secs(30)));
        graduation.dispatch_timeout_secs = 0;
        assert_eq!(graduation.dispatch_timeout(), None);
    }

    #[test]
    fn test_defaults_build_components() {
        let config = EngineConfig::default();
        let pricing = config.pricing_engine().unwrap();
        assert_eq!(pricing.price(0).unwrap(), DEFAULT_BASE_PRICE);

        let tiers = config.tier_resolver().unwrap();
        assert_eq!(tiers.dynamic_cap(250).unwrap(), 3);
    }
}
