//! Locked value vault
//!
//! Holds deposits, stakes and application fees against a correlation key
//! until a single terminal outcome (refund or forfeit) is applied.

use std::sync::Arc;

use chrono::Utc;
use keystone_core::{
    KeystoneCoreError, LockId, LockOutcome, LockPurpose, LockStatus, UserId, VaultAccount, VaultLock,
};
use tracing::{info, instrument, warn};

use crate::config::RetryConfig;
use crate::core::{EngineError, EngineResult, LockQuery, StorageError, VaultRepository};
use crate::infrastructure::{retry_on_conflict, KeyedLocks};

pub struct LockedValueVault {
    repository: Arc<dyn VaultRepository>,
    retry: RetryConfig,
    user_locks: KeyedLocks<UserId>,
}

impl LockedValueVault {
    pub fn new(repository: Arc<dyn VaultRepository>, retry: RetryConfig) -> Self {
        Self {
            repository,
            retry,
            user_locks: KeyedLocks::new(),
        }
    }

    /// Current account, or an empty one for unseen users
    pub async fn account(&self, user_id: &UserId) -> EngineResult<VaultAccount> {
        Ok(self
            .repository
            .get_account(user_id)
            .await?
            .unwrap_or_else(|| VaultAccount::new(user_id.clone())))
    }

    /// Credit earnings or top-ups to the available balance
    #[instrument(skip_all, fields(user_id = %user_id, amount = amount))]
    pub async fn deposit(&self, user_id: &UserId, amount: u64) -> EngineResult<VaultAccount> {
        if amount == 0 {
            return Err(KeystoneCoreError::InvalidAmount.into());
        }
        let _guard = self.user_locks.lock(user_id).await;

        let account = retry_on_conflict(&self.retry, "vault.deposit", move || self.try_deposit(user_id, amount)).await?;
        info!(available = account.available, "Deposit credited");
        Ok(account)
    }

    async fn try_deposit(&self, user_id: &UserId, amount: u64) -> EngineResult<VaultAccount> {
        let mut account = self.account(user_id).await?;
        account.credit(amount)?;
        self.repository.upsert_account(&account).await
    }

    /// Move `amount` from available to locked under `correlation_id`
    #[instrument(skip_all, fields(user_id = %user_id, purpose = %purpose, amount = amount, correlation_id = %correlation_id))]
    pub async fn lock(
        &self,
        user_id: &UserId,
        purpose: LockPurpose,
        amount: u64,
        correlation_id: &str,
    ) -> EngineResult<LockId> {
        if amount == 0 {
            return Err(KeystoneCoreError::InvalidAmount.into());
        }
        let _guard = self.user_locks.lock(user_id).await;

        let purpose = &purpose;
        let lock = retry_on_conflict(&self.retry, "vault.lock", move || {
            self.try_lock(user_id, purpose, amount, correlation_id)
        })
        .await?;

        info!(lock_id = %lock.id, "Value locked");
        Ok(lock.id)
    }

    async fn try_lock(
        &self,
        user_id: &UserId,
        purpose: &LockPurpose,
        amount: u64,
        correlation_id: &str,
    ) -> EngineResult<VaultLock> {
        let open = self
            .repository
            .list_locks(&LockQuery::for_user(user_id.clone()).with_status(Some(LockStatus::Locked)))
            .await?;
        if open.iter().any(|l| l.correlation_id == correlation_id) {
            warn!("Duplicate lock attempt");
            return Err(EngineError::DuplicateLock {
                user_id: user_id.to_string(),
                correlation_id: correlation_id.to_string(),
            });
        }

        let mut account = self.account(user_id).await?;
        account.hold(amount)?;

        let lock = VaultLock::new(user_id.clone(), purpose.clone(), amount, correlation_id, Utc::now());
        self.repository.commit_lock(&account, &lock).await?;
        Ok(lock)
    }

    /// Apply the terminal outcome of a lock
    #[instrument(skip_all, fields(lock_id = %lock_id, outcome = ?outcome))]
    pub async fn resolve(&self, lock_id: &LockId, outcome: LockOutcome) -> EngineResult<VaultLock> {
        let lock = self.load_lock(lock_id).await?;
        if lock.status.is_terminal() {
            return Err(KeystoneCoreError::AlreadyResolved(lock.status).into());
        }
        let _guard = self.user_locks.lock(&lock.user_id).await;

        let resolved =
            retry_on_conflict(&self.retry, "vault.resolve", move || self.try_resolve(lock_id, outcome)).await?;

        info!(user_id = %resolved.user_id, status = %resolved.status, "Lock resolved");
        Ok(resolved)
    }

    async fn try_resolve(&self, lock_id: &LockId, outcome: LockOutcome) -> EngineResult<VaultLock> {
        let mut lock = self.load_lock(lock_id).await?;
        lock.resolve(outcome, Utc::now())?;

        let mut account = self
            .repository
            .get_account(&lock.user_id)
            .await?
            .ok_or_else(|| StorageError::Missing(format!("vault account {}", lock.user_id)))?;
        account.settle(outcome, lock.amount)?;

        self.repository.commit_resolution(&account, &lock).await?;
        Ok(lock)
    }

    async fn load_lock(&self, lock_id: &LockId) -> EngineResult<VaultLock> {
        self.repository
            .get_lock(lock_id)
            .await?
            .ok_or(EngineError::LockNotFound(*lock_id))
    }

    pub async fn get_lock(&self, lock_id: &LockId) -> EngineResult<VaultLock> {
        self.load_lock(lock_id).await
    }

    /// A user's locks, optionally filtered by status
    pub async fn locks_for_user(&self, user_id: &UserId, status: Option<LockStatus>) -> EngineResult<Vec<VaultLock>> {
        self.repository
            .list_locks(&LockQuery::for_user(user_id.clone()).with_status(status))
            .await
    }

    /// Every lock filed under a correlation key (e.g. all applications to a room)
    pub async fn locks_for_correlation(&self, correlation_id: &str) -> EngineResult<Vec<VaultLock>> {
        self.repository
            .list_locks(&LockQuery::for_correlation(correlation_id))
            .await
    }
}
