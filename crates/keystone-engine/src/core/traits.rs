//! Core trait abstractions (ports the services are wired against)

use async_trait::async_trait;
use keystone_core::{
    Curve, CurveId, Distribution, HolderBalance, LaunchRecord, LockId, Snapshot, UserId, VaultAccount,
    VaultLock,
};

use super::error::{CollaboratorError, EngineResult};
use super::types::{LaunchExecution, LaunchRequest, LockQuery, SettlementReceipt, SettlementRequest};

/// Curve ledger storage.
///
/// Every write carries the curve as last read. The write succeeds only if
/// the stored version still matches, and the stored copy (version bumped)
/// is returned. A mismatch is `StorageError::VersionConflict`.
#[async_trait]
pub trait CurveRepository: Send + Sync {
    /// Store a new curve
    async fn insert_curve(&self, curve: &Curve) -> EngineResult<()>;

    async fn get_curve(&self, id: &CurveId) -> EngineResult<Option<Curve>>;

    /// Compare-and-swap the curve record alone
    async fn update_curve(&self, curve: &Curve) -> EngineResult<Curve>;

    async fn get_holder(&self, curve_id: &CurveId, user_id: &UserId) -> EngineResult<Option<HolderBalance>>;

    /// All holder rows for a curve, zero balances included
    async fn list_holders(&self, curve_id: &CurveId) -> EngineResult<Vec<HolderBalance>>;

    /// Atomically update the curve and one holder balance
    async fn commit_trade(&self, curve: &Curve, holder: &HolderBalance) -> EngineResult<Curve>;

    async fn get_snapshot(&self, curve_id: &CurveId) -> EngineResult<Option<Snapshot>>;

    /// Atomically store the snapshot and advance the curve stage
    async fn commit_snapshot(&self, curve: &Curve, snapshot: &Snapshot) -> EngineResult<Curve>;

    async fn get_distribution(&self, curve_id: &CurveId) -> EngineResult<Option<Distribution>>;

    /// Atomically store the distribution plan and advance the curve stage
    async fn commit_distribution(&self, curve: &Curve, distribution: &Distribution) -> EngineResult<Curve>;

    /// Launch request handed to the executor by the latest dispatch
    async fn get_dispatch(&self, curve_id: &CurveId) -> EngineResult<Option<LaunchRequest>>;

    /// Atomically store the launch request and advance the curve to
    /// `LaunchDispatched`. Replaces the request of a rolled-back dispatch.
    async fn commit_dispatch(&self, curve: &Curve, request: &LaunchRequest) -> EngineResult<Curve>;

    async fn get_launch(&self, curve_id: &CurveId) -> EngineResult<Option<LaunchRecord>>;

    /// Atomically mark the curve launched and store the launch record
    async fn commit_launch(&self, curve: &Curve, record: &LaunchRecord) -> EngineResult<Curve>;
}

/// Vault balance and lock storage
#[async_trait]
pub trait VaultRepository: Send + Sync {
    async fn get_account(&self, user_id: &UserId) -> EngineResult<Option<VaultAccount>>;

    /// Compare-and-swap the account (insert when version is 0 and absent)
    async fn upsert_account(&self, account: &VaultAccount) -> EngineResult<VaultAccount>;

    async fn get_lock(&self, id: &LockId) -> EngineResult<Option<VaultLock>>;

    /// Atomically store a new lock and the account that funds it
    async fn commit_lock(&self, account: &VaultAccount, lock: &VaultLock) -> EngineResult<VaultAccount>;

    /// Atomically store a resolved lock and the account it settled into.
    /// Fails if the stored lock is no longer `Locked`.
    async fn commit_resolution(&self, account: &VaultAccount, lock: &VaultLock) -> EngineResult<VaultAccount>;

    async fn list_locks(&self, query: &LockQuery) -> EngineResult<Vec<VaultLock>>;
}

/// Confirms value movement for trades
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn settle(&self, request: &SettlementRequest) -> Result<SettlementReceipt, CollaboratorError>;
}

/// Creates the external asset and distributes it
#[async_trait]
pub trait LaunchExecutor: Send + Sync {
    /// Execute the launch. Must be idempotent on `request.idempotency_key`.
    async fn execute(&self, request: &LaunchRequest) -> Result<LaunchExecution, CollaboratorError>;

    /// Outcome of an earlier execution with this key, if it completed
    async fn lookup(&self, idempotency_key: &str) -> Result<Option<LaunchExecution>, CollaboratorError>;
}
