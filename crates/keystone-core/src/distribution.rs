//! # Snapshot and Distribution
//!
//! Graduation math over the frozen holder ledger. Percentages are integer
//! parts of `PERCENT_SCALE`; flooring remainders are assigned
//! deterministically so the snapshot always sums to exactly 100%.

use chrono::{DateTime, Utc};

use crate::constants::PERCENT_SCALE;
use crate::errors::{CoreResult, KeystoneCoreError};
use crate::math::{safe_add_u128, safe_mul_div_u128, safe_sub_u128};
use crate::types::{Allocation, CurveId, Distribution, ResidualPolicy, Snapshot, SnapshotEntry, UserId};

/// Build the snapshot of a frozen curve from its holder balances.
///
/// Zero balances are dropped. Entries are ordered by balance descending,
/// then user id ascending, and the percentage remainder goes to the first
/// entry.
pub fn build_snapshot(
    curve_id: CurveId,
    frozen_supply: u64,
    balances: impl IntoIterator<Item = (UserId, u64)>,
    captured_at: DateTime<Utc>,
) -> CoreResult<Snapshot> {
    let mut holders: Vec<(UserId, u64)> = balances.into_iter().filter(|(_, b)| *b > 0).collect();
    if holders.is_empty() || frozen_supply == 0 {
        return Err(KeystoneCoreError::EmptySnapshot);
    }

    let total: u128 = holders.iter().map(|(_, b)| *b as u128).sum();
    if total != frozen_supply as u128 {
        return Err(KeystoneCoreError::inconsistent_ledger(frozen_supply as u128, total));
    }

    holders.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut entries = Vec::with_capacity(holders.len());
    let mut assigned = 0u128;
    for (user_id, balance) in holders {
        let percentage = safe_mul_div_u128(balance as u128, PERCENT_SCALE, frozen_supply as u128)?;
        assigned = safe_add_u128(assigned, percentage)?;
        entries.push(SnapshotEntry {
            user_id,
            balance,
            percentage,
        });
    }

    let remainder = safe_sub_u128(PERCENT_SCALE, assigned)?;
    if let Some(first) = entries.first_mut() {
        first.percentage = safe_add_u128(first.percentage, remainder)?;
    }

    Ok(Snapshot {
        curve_id,
        captured_at,
        total_supply: frozen_supply,
        entries,
    })
}

/// Allocate `acquired_quantity` of the external asset across the snapshot.
///
/// Each amount is `floor(percentage * acquired / PERCENT_SCALE)`. The
/// flooring residual is recorded and then handled by `policy`.
pub fn compute_distribution(
    snapshot: &Snapshot,
    acquired_quantity: u128,
    policy: ResidualPolicy,
) -> CoreResult<Distribution> {
    if snapshot.entries.is_empty() {
        return Err(KeystoneCoreError::EmptySnapshot);
    }
    let percentage_total = snapshot.percentage_total();
    if percentage_total != PERCENT_SCALE {
        return Err(KeystoneCoreError::inconsistent_ledger(PERCENT_SCALE, percentage_total));
    }

    let mut allocations = Vec::with_capacity(snapshot.entries.len());
    let mut distributed = 0u128;
    for entry in &snapshot.entries {
        let token_amount = safe_mul_div_u128(entry.percentage, acquired_quantity, PERCENT_SCALE)?;
        distributed = safe_add_u128(distributed, token_amount)?;
        allocations.push(Allocation {
            user_id: entry.user_id.clone(),
            token_amount,
        });
    }

    let residual = safe_sub_u128(acquired_quantity, distributed)?;
    if policy == ResidualPolicy::AssignToLargestHolder {
        if let Some(first) = allocations.first_mut() {
            first.token_amount = safe_add_u128(first.token_amount, residual)?;
        }
    }

    Ok(Distribution {
        curve_id: snapshot.curve_id,
        acquired_quantity,
        allocations,
        residual,
        residual_policy: policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holders(list: &[(&str, u64)]) -> Vec<(UserId, u64)> {
        list.iter().map(|(u, b)| (UserId::from(*u), *b)).collect()
    }

    #[test]
    fn test_sixty_forty_split() {
        let curve_id = CurveId::new();
        let snapshot = build_snapshot(curve_id, 100, holders(&[("B", 40), ("A", 60)]), Utc::now()).unwrap();
        assert_eq!(snapshot.entries[0].user_id, UserId::from("A"));
        assert_eq!(snapshot.entries[0].percentage, 600_000_000_000);
        assert_eq!(snapshot.entries[1].percentage, 400_000_000_000);

        let distribution = compute_distribution(&snapshot, 1_000, ResidualPolicy::default()).unwrap();
        assert_eq!(distribution.amount_for(&UserId::from("A")), Some(600));
        assert_eq!(distribution.amount_for(&UserId::from("B")), Some(400));
        assert_eq!(distribution.residual, 0);
    }

    #[test]
    fn test_percentage_remainder_goes_to_largest() {
        let snapshot =
            build_snapshot(CurveId::new(), 3, holders(&[("a", 1), ("b", 1), ("c", 1)]), Utc::now()).unwrap();
        assert_eq!(snapshot.percentage_total(), PERCENT_SCALE);
        assert_eq!(snapshot.entries[0].user_id, UserId::from("a"));
        assert_eq!(snapshot.entries[0].percentage, 333_333_333_334);
        assert_eq!(snapshot.entries[2].percentage, 333_333_333_333);
    }

    #[test]
    fn test_residual_policies() {
        let snapshot =
            build_snapshot(CurveId::new(), 3, holders(&[("a", 1), ("b", 1), ("c", 1)]), Utc::now()).unwrap();

        let assigned = compute_distribution(&snapshot, 10, ResidualPolicy::AssignToLargestHolder).unwrap();
        assert_eq!(assigned.residual, 1);
        assert_eq!(assigned.distributed_total(), 10);
        assert_eq!(assigned.allocations[0].token_amount, 4);

        let burned = compute_distribution(&snapshot, 10, ResidualPolicy::Burn).unwrap();
        assert_eq!(burned.residual, 1);
        assert_eq!(burned.distributed_total(), 9);
        assert_eq!(burned.distributed_total() + burned.retained_residual(), 10);
    }

    #[test]
    fn test_zero_balances_dropped() {
        let snapshot = build_snapshot(CurveId::new(), 5, holders(&[("a", 5), ("b", 0)]), Utc::now()).unwrap();
        assert_eq!(snapshot.holder_count(), 1);
        assert_eq!(snapshot.entries[0].percentage, PERCENT_SCALE);
    }

    #[test]
    fn test_inconsistent_ledger() {
        let err = build_snapshot(CurveId::new(), 100, holders(&[("a", 60)]), Utc::now()).unwrap_err();
        assert_eq!(err, KeystoneCoreError::inconsistent_ledger(100, 60));
    }

    #[test]
    fn test_empty_snapshot() {
        let err = build_snapshot(CurveId::new(), 0, holders(&[]), Utc::now()).unwrap_err();
        assert_eq!(err, KeystoneCoreError::EmptySnapshot);
    }
}
