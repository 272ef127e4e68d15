//! # Engine Constants
//!
//! Fundamental constants for the creator-curve engine including:
//! - Numeric scales (minor units, basis points, percentage precision)
//! - Default pricing coefficients for the hybrid exponential curve
//! - Default fee routing
//! - Tier gates and dynamic cap parameters
//! - Graduation thresholds
//! - Activity score parameters

// ============================================================================
// Numeric Scales
// ============================================================================

/// Minor units per settlement coin (lamport-style, 10^9)
pub const MINOR_UNITS_PER_COIN: u128 = 1_000_000_000;

/// Basis points denominator (10,000 = 100%)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Maximum percentage in basis points (100%)
pub const MAX_BPS: u16 = 10_000;

/// Snapshot percentage scale: 10^12 parts = 100%
pub const PERCENT_SCALE: u128 = 1_000_000_000_000;

/// Parts-per-million denominator for the wallet cap growth factor
pub const PPM_DENOMINATOR: u64 = 1_000_000;

// ============================================================================
// Pricing Constants
// ============================================================================

/// Price of the first share: 0.05 coin
pub const DEFAULT_BASE_PRICE: u128 = 50_000_000;

/// Linear slope per share in circulation: 0.0003 coin
pub const DEFAULT_LINEAR_COEFFICIENT: u128 = 300_000;

/// Coefficient of the supply^1.6 term: 0.0000012 coin
pub const DEFAULT_EXPONENTIAL_COEFFICIENT: u128 = 1_200;

/// Precision of the supply^0.6 root (three decimal digits)
pub const ROOT_PRECISION: u128 = 1_000;

/// ROOT_PRECISION^5, folded into the radicand before taking the fifth root
pub const ROOT_PRECISION_POW5: u128 = 1_000_000_000_000_000;

/// Largest supply the pricing function accepts.
/// supply^3 * 10^15 must stay inside u128.
pub const MAX_CURVE_SUPPLY: u64 = 50_000_000;

// ============================================================================
// Fee Routing Constants
// ============================================================================

/// Referral layer share (4%)
pub const DEFAULT_REFERRAL_BPS: u16 = 400;

/// Buyback and burn share (1%)
pub const DEFAULT_BUYBACK_BPS: u16 = 100;

/// Community rewards share (1%)
pub const DEFAULT_COMMUNITY_BPS: u16 = 100;

/// Reserve vault share (94%)
pub const DEFAULT_RESERVE_BPS: u16 = 9_400;

// ============================================================================
// Access Tier Constants
// ============================================================================

/// Shares needed to post, apply and DM
pub const DEFAULT_CONTRIBUTOR_THRESHOLD: u64 = 1;

/// Shares needed to tag, rank and earn curator rewards
pub const DEFAULT_CURATOR_THRESHOLD: u64 = 5;

/// Shares needed to open deal rooms
pub const DEFAULT_PARTNER_THRESHOLD: u64 = 25;

/// Per-wallet cap before any holders join
pub const DEFAULT_WALLET_CAP_BASE: u64 = 2;

/// Cap growth per unique holder in ppm (0.004)
pub const DEFAULT_WALLET_CAP_GROWTH_PPM: u64 = 4_000;

/// Maximum shares in a single buy
pub const DEFAULT_MAX_SHARES_PER_TRADE: u64 = 100;

// ============================================================================
// Graduation Constants
// ============================================================================

/// Reserve needed before an owner may freeze (32 coins)
pub const DEFAULT_GRADUATION_THRESHOLD: u128 = 32 * MINOR_UNITS_PER_COIN;

/// Largest reserve spend allowed for the launch acquisition (12 coins)
pub const DEFAULT_MAX_LAUNCH_SPEND: u128 = 12 * MINOR_UNITS_PER_COIN;

/// Holders required for launch eligibility
pub const DEFAULT_MIN_LAUNCH_HOLDERS: u64 = 4;

/// Supply required for launch eligibility
pub const DEFAULT_MIN_LAUNCH_SUPPLY: u64 = 100;

// ============================================================================
// Activity Score Constants
// ============================================================================

/// Decay constant τ in hours
pub const DEFAULT_ACTIVITY_TAU_HOURS: f64 = 72.0;

/// Resting score the decay converges to
pub const DEFAULT_ACTIVITY_BASE: f64 = 0.0;

/// Ceiling for the peak score
pub const DEFAULT_ACTIVITY_MAX: f64 = 100.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fee_routing_is_complete() {
        let total = DEFAULT_REFERRAL_BPS + DEFAULT_BUYBACK_BPS + DEFAULT_COMMUNITY_BPS + DEFAULT_RESERVE_BPS;
        assert_eq!(total, MAX_BPS);
    }

    #[test]
    fn test_root_precision_pow5() {
        assert_eq!(ROOT_PRECISION.pow(5), ROOT_PRECISION_POW5);
    }

    #[test]
    fn test_max_supply_radicand_fits() {
        let s = MAX_CURVE_SUPPLY as u128;
        assert!(s.checked_pow(3).and_then(|c| c.checked_mul(ROOT_PRECISION_POW5)).is_some());
    }
}
