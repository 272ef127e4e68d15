//! # Graduation Types
//!
//! Stage marker, snapshot, distribution plan and launch record.

use std::fmt;

use chrono::{DateTime, Utc};

use super::{CurveId, CurveState, ExternalReference, UserId};
use crate::constants::PERCENT_SCALE;

/// Persisted graduation progress marker
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "client", serde(rename_all = "snake_case"))]
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GraduationStage {
    #[default]
    Trading,
    Frozen,
    SnapshotTaken,
    DistributionPlanned,
    LaunchDispatched,
    Launched,
}

/// Allowed stage edges. The single backward edge undoes a dispatch the
/// executor reports as never having happened.
const STAGE_TRANSITIONS: &[(GraduationStage, GraduationStage)] = &[
    (GraduationStage::Trading, GraduationStage::Frozen),
    (GraduationStage::Frozen, GraduationStage::SnapshotTaken),
    (GraduationStage::SnapshotTaken, GraduationStage::DistributionPlanned),
    (GraduationStage::DistributionPlanned, GraduationStage::LaunchDispatched),
    (GraduationStage::LaunchDispatched, GraduationStage::Launched),
    (GraduationStage::LaunchDispatched, GraduationStage::DistributionPlanned),
];

impl GraduationStage {
    pub fn can_transition_to(&self, next: GraduationStage) -> bool {
        STAGE_TRANSITIONS.contains(&(*self, next))
    }

    /// Curve state implied by this stage
    pub fn curve_state(&self) -> CurveState {
        match self {
            GraduationStage::Trading => CurveState::Active,
            GraduationStage::Launched => CurveState::Launched,
            _ => CurveState::Frozen,
        }
    }

    pub fn has_snapshot(&self) -> bool {
        *self >= GraduationStage::SnapshotTaken
    }

    pub fn has_distribution(&self) -> bool {
        *self >= GraduationStage::DistributionPlanned
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GraduationStage::Trading => "trading",
            GraduationStage::Frozen => "frozen",
            GraduationStage::SnapshotTaken => "snapshot_taken",
            GraduationStage::DistributionPlanned => "distribution_planned",
            GraduationStage::LaunchDispatched => "launch_dispatched",
            GraduationStage::Launched => "launched",
        }
    }
}

impl fmt::Display for GraduationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One holder's line in a snapshot
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub user_id: UserId,
    pub balance: u64,
    /// Share of the frozen supply in parts of PERCENT_SCALE
    pub percentage: u128,
}

/// Holder balances captured after freeze, ordered by balance desc then user id
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub curve_id: CurveId,
    pub captured_at: DateTime<Utc>,
    pub total_supply: u64,
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn holder_count(&self) -> usize {
        self.entries.len()
    }

    /// First entry is the largest holder
    pub fn largest_holder(&self) -> Option<&SnapshotEntry> {
        self.entries.first()
    }

    pub fn percentage_total(&self) -> u128 {
        self.entries.iter().map(|e| e.percentage).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.percentage_total() == PERCENT_SCALE
    }
}

/// What happens to the flooring residual of a distribution
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "client", serde(rename_all = "snake_case"))]
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResidualPolicy {
    /// Added to the first snapshot entry
    #[default]
    AssignToLargestHolder,
    /// Never distributed
    Burn,
    /// Kept with the project alongside the reserve remainder
    ReturnToReserve,
}

impl fmt::Display for ResidualPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResidualPolicy::AssignToLargestHolder => "assign_to_largest_holder",
            ResidualPolicy::Burn => "burn",
            ResidualPolicy::ReturnToReserve => "return_to_reserve",
        };
        f.write_str(s)
    }
}

#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub user_id: UserId,
    pub token_amount: u128,
}

/// Per-holder allocation of the acquired external asset
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Distribution {
    pub curve_id: CurveId,
    pub acquired_quantity: u128,
    pub allocations: Vec<Allocation>,
    /// acquired_quantity minus the sum of floored amounts, before the policy
    pub residual: u128,
    pub residual_policy: ResidualPolicy,
}

impl Distribution {
    pub fn distributed_total(&self) -> u128 {
        self.allocations.iter().map(|a| a.token_amount).sum()
    }

    /// Residual kept out of holder allocations
    pub fn retained_residual(&self) -> u128 {
        match self.residual_policy {
            ResidualPolicy::AssignToLargestHolder => 0,
            ResidualPolicy::Burn | ResidualPolicy::ReturnToReserve => self.residual,
        }
    }

    pub fn amount_for(&self, user_id: &UserId) -> Option<u128> {
        self.allocations
            .iter()
            .find(|a| &a.user_id == user_id)
            .map(|a| a.token_amount)
    }
}

/// Outcome of a completed launch
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchRecord {
    pub curve_id: CurveId,
    pub external_reference: ExternalReference,
    pub distribution: Distribution,
    pub reserve_spent: u128,
    /// Frozen reserve not spent on the acquisition, routed to the project wallet
    pub reserve_remainder: u128,
    pub project_wallet: String,
    pub launched_at: DateTime<Utc>,
}
