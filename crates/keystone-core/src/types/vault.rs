//! # Vault Types
//!
//! Escrow locks and the per-user balance they draw from.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::{LockId, UserId};
use crate::errors::{CoreResult, KeystoneCoreError};
use crate::math::{safe_add_u64, safe_sub_u64};

/// Why value is being held
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "client", serde(rename_all = "snake_case"))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LockPurpose {
    RoomApplication,
    DmDeposit,
    CuratorStake,
    Other(String),
}

impl fmt::Display for LockPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockPurpose::RoomApplication => f.write_str("room-application"),
            LockPurpose::DmDeposit => f.write_str("dm-deposit"),
            LockPurpose::CuratorStake => f.write_str("curator-stake"),
            LockPurpose::Other(label) => f.write_str(label),
        }
    }
}

impl FromStr for LockPurpose {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "room-application" => LockPurpose::RoomApplication,
            "dm-deposit" => LockPurpose::DmDeposit,
            "curator-stake" => LockPurpose::CuratorStake,
            other => LockPurpose::Other(other.to_string()),
        })
    }
}

#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "client", serde(rename_all = "snake_case"))]
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockStatus {
    #[default]
    Locked,
    Refunded,
    Forfeited,
}

impl LockStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LockStatus::Locked)
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LockStatus::Locked => "locked",
            LockStatus::Refunded => "refunded",
            LockStatus::Forfeited => "forfeited",
        };
        f.write_str(s)
    }
}

/// Terminal resolution requested for a lock
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "client", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockOutcome {
    Refund,
    Forfeit,
}

impl LockOutcome {
    pub fn terminal_status(&self) -> LockStatus {
        match self {
            LockOutcome::Refund => LockStatus::Refunded,
            LockOutcome::Forfeit => LockStatus::Forfeited,
        }
    }
}

#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultLock {
    pub id: LockId,
    pub user_id: UserId,
    pub purpose: LockPurpose,
    pub amount: u64,
    /// External key the lock belongs to (room, thread, stake round)
    pub correlation_id: String,
    pub status: LockStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl VaultLock {
    pub fn new(
        user_id: UserId,
        purpose: LockPurpose,
        amount: u64,
        correlation_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LockId::new(),
            user_id,
            purpose,
            amount,
            correlation_id: correlation_id.into(),
            status: LockStatus::Locked,
            created_at: now,
            resolved_at: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.status == LockStatus::Locked
    }

    /// Apply the single terminal resolution
    pub fn resolve(&mut self, outcome: LockOutcome, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(KeystoneCoreError::AlreadyResolved(self.status));
        }
        self.status = outcome.terminal_status();
        self.resolved_at = Some(now);
        Ok(())
    }
}

/// Per-user vault balance
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultAccount {
    pub user_id: UserId,
    pub available: u64,
    pub locked: u64,
    /// Cumulative, never returned
    pub forfeited: u64,
    pub version: u64,
}

impl VaultAccount {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            available: 0,
            locked: 0,
            forfeited: 0,
            version: 0,
        }
    }

    pub fn credit(&mut self, amount: u64) -> CoreResult<()> {
        self.available = safe_add_u64(self.available, amount)?;
        Ok(())
    }

    /// Move `amount` from available to locked
    pub fn hold(&mut self, amount: u64) -> CoreResult<()> {
        if self.available < amount {
            return Err(KeystoneCoreError::InsufficientBalance {
                available: self.available,
                requested: amount,
            });
        }
        self.available -= amount;
        self.locked = safe_add_u64(self.locked, amount)?;
        Ok(())
    }

    /// Move a resolved lock's amount out of locked
    pub fn settle(&mut self, outcome: LockOutcome, amount: u64) -> CoreResult<()> {
        if self.locked < amount {
            return Err(KeystoneCoreError::inconsistent_ledger(amount as u128, self.locked as u128));
        }
        self.locked = safe_sub_u64(self.locked, amount)?;
        match outcome {
            LockOutcome::Refund => self.available = safe_add_u64(self.available, amount)?,
            LockOutcome::Forfeit => self.forfeited = safe_add_u64(self.forfeited, amount)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_resolves_once() {
        let mut lock = VaultLock::new(UserId::from("u"), LockPurpose::DmDeposit, 10, "thread-1", Utc::now());
        lock.resolve(LockOutcome::Forfeit, Utc::now()).unwrap();
        assert_eq!(lock.status, LockStatus::Forfeited);

        let err = lock.resolve(LockOutcome::Refund, Utc::now()).unwrap_err();
        assert_eq!(err, KeystoneCoreError::AlreadyResolved(LockStatus::Forfeited));
        assert_eq!(lock.status, LockStatus::Forfeited);
    }

    #[test]
    fn test_account_hold_and_settle() {
        let mut account = VaultAccount::new(UserId::from("u"));
        account.credit(100).unwrap();
        account.hold(30).unwrap();
        assert_eq!((account.available, account.locked), (70, 30));

        account.settle(LockOutcome::Forfeit, 10).unwrap();
        account.settle(LockOutcome::Refund, 20).unwrap();
        assert_eq!((account.available, account.locked, account.forfeited), (90, 0, 10));
    }

    #[test]
    fn test_hold_rejects_overdraw() {
        let mut account = VaultAccount::new(UserId::from("u"));
        account.credit(5).unwrap();
        assert_eq!(
            account.hold(6),
            Err(KeystoneCoreError::InsufficientBalance { available: 5, requested: 6 })
        );
        assert_eq!(account.available, 5);
    }

    #[test]
    fn test_purpose_labels() {
        assert_eq!("dm-deposit".parse::<LockPurpose>().unwrap(), LockPurpose::DmDeposit);
        assert_eq!(
            "bounty".parse::<LockPurpose>().unwrap(),
            LockPurpose::Other("bounty".to_string())
        );
        assert_eq!(LockPurpose::CuratorStake.to_string(), "curator-stake");
    }
}
