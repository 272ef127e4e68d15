//! # Core Error Types
//!
//! Errors raised by the pure curve logic. Every variant is a synchronous
//! validation or contract failure detected before any state is mutated.

use thiserror::Error;

use crate::types::{CurveState, GraduationStage, LockStatus};

/// Core engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize))]
pub enum KeystoneCoreError {
    // ========================================================================
    // Math Errors
    // ========================================================================

    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Supply {supply} outside priced range (max {max})")]
    SupplyOutOfRange { supply: u64, max: u64 },

    // ========================================================================
    // Validation Errors
    // ========================================================================

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("Fee schedule sums to {total_bps} bps (expected 10000)")]
    InvalidFeeSchedule { total_bps: u32 },

    #[error("Tier thresholds must be strictly increasing")]
    InvalidTierThresholds,

    #[error("Purchase would hold {attempted} shares, wallet cap is {cap}")]
    ExceedsWalletCap { cap: u64, attempted: u64 },

    #[error("Purchase of {requested} shares exceeds per-trade max {max}")]
    ExceedsMaxPurchase { max: u64, requested: u64 },

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: u64, requested: u64 },

    #[error("Insufficient shares: held {held}, requested {requested}")]
    InsufficientShares { held: u64, requested: u64 },

    #[error("Insufficient reserve: have {reserve}, need {required}")]
    InsufficientReserve { reserve: u128, required: u128 },

    #[error("Activity event predates the last recorded event")]
    EventOutOfOrder,

    // ========================================================================
    // State Errors
    // ========================================================================

    #[error("Invalid curve state transition: {from} -> {to}")]
    InvalidStateTransition { from: CurveState, to: CurveState },

    #[error("Invalid graduation stage transition: {from} -> {to}")]
    InvalidStageTransition { from: GraduationStage, to: GraduationStage },

    #[error("Trading halted: curve is {0}")]
    TradingHalted(CurveState),

    #[error("Vault lock already resolved ({0})")]
    AlreadyResolved(LockStatus),

    #[error("Curve has no frozen checkpoint")]
    MissingCheckpoint,

    #[error("Snapshot has no holders")]
    EmptySnapshot,

    #[error("Ledger inconsistent: expected {expected}, found {actual}")]
    InconsistentLedger { expected: u128, actual: u128 },

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    #[error("Unauthorized")]
    Unauthorized,
}

/// Result type using core errors
pub type CoreResult<T> = Result<T, KeystoneCoreError>;

impl KeystoneCoreError {
    /// Create a wallet cap error
    pub fn wallet_cap(cap: u64, attempted: u64) -> Self {
        Self::ExceedsWalletCap { cap, attempted }
    }

    /// Create an insufficient reserve error
    pub fn insufficient_reserve(reserve: u128, required: u128) -> Self {
        Self::InsufficientReserve { reserve, required }
    }

    /// Create an inconsistent ledger error
    pub fn inconsistent_ledger(expected: u128, actual: u128) -> Self {
        Self::InconsistentLedger { expected, actual }
    }
}
