//! Request and record types exchanged with collaborators

use chrono::{DateTime, Utc};
use keystone_core::{
    AccessTier, Capabilities, CurveId, Distribution, ExternalReference, FeeSplit, LockStatus, ReferralRoute, UserId,
};
use serde::{Deserialize, Serialize};

/// Direction of a settled trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Value movement the settlement gateway must confirm before the ledger moves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub curve_id: CurveId,
    pub user_id: UserId,
    pub side: TradeSide,
    pub shares: u64,
    /// Paid by the buyer, or paid out to the seller
    pub amount: u128,
    /// Fee routing for buys, zero for sells
    pub fees: FeeSplit,
    pub referral: ReferralRoute,
    /// Curve version the quote was priced against
    pub curve_version: u64,
}

impl SettlementRequest {
    /// Stable key for one priced trade on one curve version
    pub fn idempotency_key(&self) -> String {
        format!(
            "settle:{}:{}:{}:{}",
            self.curve_id,
            self.curve_version,
            self.user_id,
            match self.side {
                TradeSide::Buy => "buy",
                TradeSide::Sell => "sell",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub settlement_id: String,
    pub curve_id: CurveId,
    pub user_id: UserId,
    pub side: TradeSide,
    pub amount: u128,
    pub settled_at: DateTime<Utc>,
}

/// Inputs to a launch supplied by the curve owner or scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchParams {
    /// Reserve spent acquiring the external asset
    pub reserve_to_spend: u128,
    /// External asset quantity the spend acquires
    pub acquired_quantity: u128,
    /// Receives the unspent reserve
    pub project_wallet: String,
}

/// Request handed to the launch executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub idempotency_key: String,
    pub curve_id: CurveId,
    pub distribution: Distribution,
    pub reserve_to_spend: u128,
    pub reserve_remainder: u128,
    pub project_wallet: String,
}

impl LaunchRequest {
    pub fn key_for(curve_id: &CurveId) -> String {
        format!("launch:{}", curve_id)
    }
}

/// Filter for vault lock listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockQuery {
    pub user_id: Option<UserId>,
    pub correlation_id: Option<String>,
    pub status: Option<LockStatus>,
}

impl LockQuery {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn for_correlation(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: Option<LockStatus>) -> Self {
        self.status = status;
        self
    }
}

/// A holder's standing on one curve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderAccess {
    pub curve_id: CurveId,
    pub user_id: UserId,
    pub balance: u64,
    pub tier: AccessTier,
    pub capabilities: Capabilities,
    /// Largest balance the holder may reach right now
    pub wallet_cap: u64,
}

/// Result of a buy or sell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub curve_id: CurveId,
    pub side: TradeSide,
    pub shares: u64,
    /// Total paid on buys, payout on sells
    pub amount: u128,
    pub fees: FeeSplit,
    pub balance_after: u64,
    pub supply_after: u64,
    pub reserve_after: u128,
    pub settlement_id: String,
}

/// Launch readiness report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchEligibility {
    pub curve_id: CurveId,
    pub reserve: u128,
    pub graduation_threshold: u128,
    pub holders: u64,
    pub min_holders: u64,
    pub supply: u64,
    pub min_supply: u64,
    /// Supply at which the reserve reaches the graduation threshold
    pub supply_at_threshold: u64,
    /// Reserve progress toward the threshold in basis points, capped at 10000
    pub progress_bps: u16,
    pub can_freeze: bool,
    pub can_launch: bool,
}

/// Outcome reported by the launch executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchExecution {
    pub external_reference: ExternalReference,
    pub executed_at: DateTime<Utc>,
}
