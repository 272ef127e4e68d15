//! Property-based tests for the curve economics.
//! Verifies monotonic pricing, fee conservation, tier ordering and the
//! snapshot/distribution bounds.

use chrono::Utc;
use keystone_core::constants::PERCENT_SCALE;
use keystone_core::{
    build_snapshot, compute_distribution, AccessTierResolver, CurveId, CurvePricingEngine, ResidualPolicy,
    UserId,
};
use proptest::prelude::*;

// ============================================================================
// Test Strategies
// ============================================================================

/// Supplies well inside the priced range
fn supply() -> impl Strategy<Value = u64> {
    0u64..2_000_000
}

/// Trade sizes up to the default per-trade max
fn shares() -> impl Strategy<Value = u64> {
    1u64..=100
}

/// Non-empty holder ledgers with distinct user ids
fn holder_balances() -> impl Strategy<Value = Vec<(UserId, u64)>> {
    prop::collection::vec(1u64..10_000, 1..40).prop_map(|balances| {
        balances
            .into_iter()
            .enumerate()
            .map(|(i, b)| (UserId::new(format!("holder-{i:03}")), b))
            .collect()
    })
}

fn residual_policy() -> impl Strategy<Value = ResidualPolicy> {
    prop_oneof![
        Just(ResidualPolicy::AssignToLargestHolder),
        Just(ResidualPolicy::Burn),
        Just(ResidualPolicy::ReturnToReserve),
    ]
}

// ============================================================================
// Pricing Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_price_strictly_increasing(s in supply()) {
        let engine = CurvePricingEngine::default();
        prop_assert!(engine.price(s + 1).unwrap() > engine.price(s).unwrap());
    }

    #[test]
    fn prop_fee_split_conserves_cost(total in 0u128..1_000_000_000_000_000) {
        let engine = CurvePricingEngine::default();
        let split = engine.fee_split(total).unwrap();
        prop_assert_eq!(split.total(), total);
        prop_assert!(split.reserve >= total * 9_400 / 10_000);
    }

    #[test]
    fn prop_cost_splits_at_any_point(s in supply(), a in shares(), b in shares()) {
        let engine = CurvePricingEngine::default();
        let whole = engine.cost_of(s, a + b).unwrap();
        let parts = engine.cost_of(s, a).unwrap() + engine.cost_of(s + a, b).unwrap();
        prop_assert_eq!(whole, parts);
    }

    #[test]
    fn prop_sell_never_pays_more_than_buy_reserved(s in supply(), n in shares()) {
        let engine = CurvePricingEngine::default();
        let buy = engine.quote_buy(s, n).unwrap();
        let sell = engine.quote_sell(s + n, n).unwrap();
        prop_assert_eq!(sell.gross_proceeds, buy.total_cost);
        prop_assert!(sell.payout <= buy.fees.reserve);
    }
}

// ============================================================================
// Tier Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_tier_monotonic(a in 0u64..1_000, b in 0u64..1_000) {
        let resolver = AccessTierResolver::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(resolver.resolve_tier(low) <= resolver.resolve_tier(high));
    }

    #[test]
    fn prop_cap_never_shrinks(h in 0u64..1_000_000) {
        let resolver = AccessTierResolver::default();
        prop_assert!(resolver.dynamic_cap(h + 1).unwrap() >= resolver.dynamic_cap(h).unwrap());
    }
}

// ============================================================================
// Graduation Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_snapshot_sums_to_scale(balances in holder_balances()) {
        let supply: u64 = balances.iter().map(|(_, b)| *b).sum();
        let snapshot = build_snapshot(CurveId::new(), supply, balances, Utc::now()).unwrap();
        prop_assert_eq!(snapshot.percentage_total(), PERCENT_SCALE);
        for pair in snapshot.entries.windows(2) {
            prop_assert!(pair[0].balance >= pair[1].balance);
        }
    }

    #[test]
    fn prop_distribution_accounts_for_everything(
        balances in holder_balances(),
        acquired in 0u128..1_000_000_000_000_000,
        policy in residual_policy(),
    ) {
        let supply: u64 = balances.iter().map(|(_, b)| *b).sum();
        let snapshot = build_snapshot(CurveId::new(), supply, balances, Utc::now()).unwrap();
        let distribution = compute_distribution(&snapshot, acquired, policy).unwrap();

        prop_assert!(distribution.distributed_total() <= acquired);
        prop_assert_eq!(distribution.distributed_total() + distribution.retained_residual(), acquired);
        prop_assert!(distribution.residual < snapshot.holder_count() as u128 + 1);
    }
}
