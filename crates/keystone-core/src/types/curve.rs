//! # Curve Types
//!
//! Lifecycle state and ledger fields of a creator curve, plus per-holder
//! share balances.

use std::fmt;

use chrono::{DateTime, Utc};

use super::{CurveId, GraduationStage, UserId};
use crate::errors::{CoreResult, KeystoneCoreError};
use crate::math::{safe_add_u128, safe_add_u64, safe_sub_u128, safe_sub_u64};
use crate::pricing::PricingParams;

/// Curve lifecycle state
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "client", serde(rename_all = "snake_case"))]
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CurveState {
    /// Accepting buys and sells
    #[default]
    Active,

    /// Trading halted, checkpoint recorded, awaiting launch
    Frozen,

    /// Graduated into the external asset (terminal)
    Launched,
}

impl CurveState {
    /// Check if state allows buys and sells
    pub fn allows_trading(&self) -> bool {
        matches!(self, CurveState::Active)
    }

    /// Check if state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, CurveState::Launched)
    }

    /// Validate state transition. Only Active -> Frozen -> Launched.
    pub fn can_transition_to(&self, next: CurveState) -> bool {
        matches!(
            (self, next),
            (CurveState::Active, CurveState::Frozen) | (CurveState::Frozen, CurveState::Launched)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CurveState::Active => "active",
            CurveState::Frozen => "frozen",
            CurveState::Launched => "launched",
        }
    }
}

impl fmt::Display for CurveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values captured at freeze time. Graduation math reads these, never the
/// live ledger fields.
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrozenCheckpoint {
    pub frozen_at: DateTime<Utc>,
    pub frozen_supply: u64,
    pub frozen_reserve: u128,
}

/// Reference to the launched external asset
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalReference {
    /// External asset identifier (e.g. token mint)
    pub asset_id: String,

    /// Execution transaction identifier
    pub execution_tx: String,
}

/// A creator's bonding curve
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Curve {
    pub id: CurveId,

    /// Creator or project that owns the curve
    pub owner: UserId,

    pub state: CurveState,

    /// Persisted graduation progress marker
    pub stage: GraduationStage,

    /// Shares in circulation
    pub supply: u64,

    /// Reserve in minor units
    pub reserve: u128,

    /// Unique holders with a non-zero balance
    pub holders: u64,

    pub pricing: PricingParams,

    /// Set once by freeze, immutable afterwards
    pub checkpoint: Option<FrozenCheckpoint>,

    /// Set once by launch
    pub external_reference: Option<ExternalReference>,

    pub total_buys: u64,
    pub total_sells: u64,

    /// Optimistic concurrency counter, bumped by every committed write
    pub version: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Curve {
    /// Create a new active curve with an empty ledger
    pub fn new(owner: UserId, pricing: PricingParams, now: DateTime<Utc>) -> Self {
        Self {
            id: CurveId::new(),
            owner,
            state: CurveState::Active,
            stage: GraduationStage::Trading,
            supply: 0,
            reserve: 0,
            holders: 0,
            pricing,
            checkpoint: None,
            external_reference: None,
            total_buys: 0,
            total_sells: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owner(&self, user: &UserId) -> bool {
        &self.owner == user
    }

    /// Reject trades unless the curve is active
    pub fn ensure_trading(&self) -> CoreResult<()> {
        if !self.state.allows_trading() {
            return Err(KeystoneCoreError::TradingHalted(self.state));
        }
        Ok(())
    }

    /// Apply a settled buy to the ledger fields
    pub fn apply_buy(
        &mut self,
        shares: u64,
        reserve_portion: u128,
        new_holder: bool,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.ensure_trading()?;
        self.supply = safe_add_u64(self.supply, shares)?;
        self.reserve = safe_add_u128(self.reserve, reserve_portion)?;
        if new_holder {
            self.holders = safe_add_u64(self.holders, 1)?;
        }
        self.total_buys = self.total_buys.saturating_add(1);
        self.updated_at = now;
        Ok(())
    }

    /// Apply a settled sell to the ledger fields
    pub fn apply_sell(
        &mut self,
        shares: u64,
        payout: u128,
        holder_exited: bool,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.ensure_trading()?;
        if payout > self.reserve {
            return Err(KeystoneCoreError::insufficient_reserve(self.reserve, payout));
        }
        self.supply = safe_sub_u64(self.supply, shares)?;
        self.reserve = safe_sub_u128(self.reserve, payout)?;
        if holder_exited {
            self.holders = safe_sub_u64(self.holders, 1)?;
        }
        self.total_sells = self.total_sells.saturating_add(1);
        self.updated_at = now;
        Ok(())
    }

    /// Advance the graduation stage marker, moving the curve state with it
    pub fn advance_stage(&mut self, next: GraduationStage, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.stage.can_transition_to(next) {
            return Err(KeystoneCoreError::InvalidStageTransition {
                from: self.stage,
                to: next,
            });
        }

        let next_state = next.curve_state();
        if next_state != self.state {
            if !self.state.can_transition_to(next_state) {
                return Err(KeystoneCoreError::InvalidStateTransition {
                    from: self.state,
                    to: next_state,
                });
            }
            self.state = next_state;
        }

        self.stage = next;
        self.updated_at = now;
        Ok(())
    }

    /// Halt trading and record the immutable checkpoint
    pub fn freeze(&mut self, now: DateTime<Utc>) -> CoreResult<FrozenCheckpoint> {
        if self.checkpoint.is_some() {
            return Err(KeystoneCoreError::InvalidStateTransition {
                from: self.state,
                to: CurveState::Frozen,
            });
        }
        self.advance_stage(GraduationStage::Frozen, now)?;

        let checkpoint = FrozenCheckpoint {
            frozen_at: now,
            frozen_supply: self.supply,
            frozen_reserve: self.reserve,
        };
        self.checkpoint = Some(checkpoint.clone());
        Ok(checkpoint)
    }

    pub fn checkpoint(&self) -> CoreResult<&FrozenCheckpoint> {
        self.checkpoint.as_ref().ok_or(KeystoneCoreError::MissingCheckpoint)
    }
}

/// Share balance of one user on one curve
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HolderBalance {
    pub curve_id: CurveId,
    pub user_id: UserId,
    pub balance: u64,
    pub updated_at: DateTime<Utc>,
}

impl HolderBalance {
    pub fn new(curve_id: CurveId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            curve_id,
            user_id,
            balance: 0,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> Curve {
        Curve::new(UserId::from("owner"), PricingParams::default(), Utc::now())
    }

    #[test]
    fn test_state_transitions() {
        assert!(CurveState::Active.can_transition_to(CurveState::Frozen));
        assert!(CurveState::Frozen.can_transition_to(CurveState::Launched));
        assert!(!CurveState::Active.can_transition_to(CurveState::Launched));
        assert!(!CurveState::Launched.can_transition_to(CurveState::Active));
        assert!(!CurveState::Frozen.can_transition_to(CurveState::Active));
    }

    #[test]
    fn test_buy_and_sell_update_ledger() {
        let mut curve = curve();
        let now = Utc::now();
        curve.apply_buy(3, 1_000, true, now).unwrap();
        assert_eq!((curve.supply, curve.reserve, curve.holders), (3, 1_000, 1));

        curve.apply_sell(3, 400, true, now).unwrap();
        assert_eq!((curve.supply, curve.reserve, curve.holders), (0, 600, 0));
        assert_eq!((curve.total_buys, curve.total_sells), (1, 1));
    }

    #[test]
    fn test_sell_cannot_drain_past_reserve() {
        let mut curve = curve();
        curve.apply_buy(1, 10, true, Utc::now()).unwrap();
        let err = curve.apply_sell(1, 11, true, Utc::now()).unwrap_err();
        assert_eq!(err, KeystoneCoreError::insufficient_reserve(10, 11));
        assert_eq!(curve.reserve, 10);
    }

    #[test]
    fn test_freeze_records_checkpoint_once() {
        let mut curve = curve();
        curve.apply_buy(10, 5_000, true, Utc::now()).unwrap();

        let checkpoint = curve.freeze(Utc::now()).unwrap();
        assert_eq!(checkpoint.frozen_supply, 10);
        assert_eq!(checkpoint.frozen_reserve, 5_000);
        assert_eq!(curve.state, CurveState::Frozen);
        assert_eq!(curve.stage, GraduationStage::Frozen);

        assert!(curve.freeze(Utc::now()).is_err());
        assert_eq!(
            curve.apply_buy(1, 1, false, Utc::now()),
            Err(KeystoneCoreError::TradingHalted(CurveState::Frozen))
        );
    }

    #[test]
    fn test_stage_cannot_skip() {
        let mut curve = curve();
        let err = curve.advance_stage(GraduationStage::Launched, Utc::now()).unwrap_err();
        assert!(matches!(err, KeystoneCoreError::InvalidStageTransition { .. }));
        assert_eq!(curve.state, CurveState::Active);
    }
}
