//! In-memory adapters
//!
//! A single-process store implementing both repositories with the same
//! version checks a database adapter would enforce, plus a settlement
//! gateway and launch executor that confirm immediately. Used by the CLI
//! simulation and the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use keystone_core::{
    Curve, CurveId, Distribution, ExternalReference, HolderBalance, KeystoneCoreError, LaunchRecord, LockId,
    LockStatus, Snapshot, UserId, VaultAccount, VaultLock,
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::core::{
    CollaboratorError, CurveRepository, EngineResult, LaunchExecution, LaunchExecutor, LaunchRequest, LockQuery,
    SettlementGateway, SettlementReceipt, SettlementRequest, StorageError, VaultRepository,
};

#[derive(Debug, Default)]
struct CurveTables {
    curves: HashMap<CurveId, Curve>,
    holders: HashMap<(CurveId, UserId), HolderBalance>,
    snapshots: HashMap<CurveId, Snapshot>,
    distributions: HashMap<CurveId, Distribution>,
    dispatches: HashMap<CurveId, LaunchRequest>,
    launches: HashMap<CurveId, LaunchRecord>,
}

impl CurveTables {
    /// Verify the incoming curve was read at the stored version
    fn check_curve(&self, curve: &Curve) -> EngineResult<()> {
        let stored = self
            .curves
            .get(&curve.id)
            .ok_or_else(|| StorageError::Missing(format!("curve {}", curve.id)))?;
        if stored.version != curve.version {
            return Err(StorageError::version_conflict(format!("curve {}", curve.id), curve.version, stored.version).into());
        }
        Ok(())
    }

    fn write_curve(&mut self, curve: &Curve) -> Curve {
        let mut next = curve.clone();
        next.version += 1;
        self.curves.insert(next.id, next.clone());
        next
    }
}

#[derive(Debug, Default)]
struct VaultTables {
    accounts: HashMap<UserId, VaultAccount>,
    locks: HashMap<LockId, VaultLock>,
}

impl VaultTables {
    fn check_account(&self, account: &VaultAccount) -> EngineResult<()> {
        let stored_version = self.accounts.get(&account.user_id).map(|a| a.version).unwrap_or(0);
        if stored_version != account.version {
            return Err(StorageError::version_conflict(
                format!("vault account {}", account.user_id),
                account.version,
                stored_version,
            )
            .into());
        }
        Ok(())
    }

    fn write_account(&mut self, account: &VaultAccount) -> VaultAccount {
        let mut next = account.clone();
        next.version += 1;
        self.accounts.insert(next.user_id.clone(), next.clone());
        next
    }
}

/// Version-checked in-memory storage for curves and the vault
#[derive(Debug, Default)]
pub struct MemoryStore {
    curves: RwLock<CurveTables>,
    vault: RwLock<VaultTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CurveRepository for MemoryStore {
    async fn insert_curve(&self, curve: &Curve) -> EngineResult<()> {
        let mut tables = self.curves.write().await;
        if tables.curves.contains_key(&curve.id) {
            return Err(StorageError::AlreadyExists(format!("curve {}", curve.id)).into());
        }
        tables.curves.insert(curve.id, curve.clone());
        Ok(())
    }

    async fn get_curve(&self, id: &CurveId) -> EngineResult<Option<Curve>> {
        Ok(self.curves.read().await.curves.get(id).cloned())
    }

    async fn update_curve(&self, curve: &Curve) -> EngineResult<Curve> {
        let mut tables = self.curves.write().await;
        tables.check_curve(curve)?;
        Ok(tables.write_curve(curve))
    }

    async fn get_holder(&self, curve_id: &CurveId, user_id: &UserId) -> EngineResult<Option<HolderBalance>> {
        let tables = self.curves.read().await;
        Ok(tables.holders.get(&(*curve_id, user_id.clone())).cloned())
    }

    async fn list_holders(&self, curve_id: &CurveId) -> EngineResult<Vec<HolderBalance>> {
        let tables = self.curves.read().await;
        let mut holders: Vec<HolderBalance> = tables
            .holders
            .values()
            .filter(|h| &h.curve_id == curve_id)
            .cloned()
            .collect();
        holders.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(holders)
    }

    async fn commit_trade(&self, curve: &Curve, holder: &HolderBalance) -> EngineResult<Curve> {
        let mut tables = self.curves.write().await;
        tables.check_curve(curve)?;
        tables
            .holders
            .insert((holder.curve_id, holder.user_id.clone()), holder.clone());
        Ok(tables.write_curve(curve))
    }

    async fn get_snapshot(&self, curve_id: &CurveId) -> EngineResult<Option<Snapshot>> {
        Ok(self.curves.read().await.snapshots.get(curve_id).cloned())
    }

    async fn commit_snapshot(&self, curve: &Curve, snapshot: &Snapshot) -> EngineResult<Curve> {
        let mut tables = self.curves.write().await;
        tables.check_curve(curve)?;
        if tables.snapshots.contains_key(&curve.id) {
            return Err(StorageError::AlreadyExists(format!("snapshot {}", curve.id)).into());
        }
        tables.snapshots.insert(curve.id, snapshot.clone());
        Ok(tables.write_curve(curve))
    }

    async fn get_distribution(&self, curve_id: &CurveId) -> EngineResult<Option<Distribution>> {
        Ok(self.curves.read().await.distributions.get(curve_id).cloned())
    }

    async fn commit_distribution(&self, curve: &Curve, distribution: &Distribution) -> EngineResult<Curve> {
        let mut tables = self.curves.write().await;
        tables.check_curve(curve)?;
        if tables.distributions.contains_key(&curve.id) {
            return Err(StorageError::AlreadyExists(format!("distribution {}", curve.id)).into());
        }
        tables.distributions.insert(curve.id, distribution.clone());
        Ok(tables.write_curve(curve))
    }

    async fn get_dispatch(&self, curve_id: &CurveId) -> EngineResult<Option<LaunchRequest>> {
        Ok(self.curves.read().await.dispatches.get(curve_id).cloned())
    }

    async fn commit_dispatch(&self, curve: &Curve, request: &LaunchRequest) -> EngineResult<Curve> {
        let mut tables = self.curves.write().await;
        tables.check_curve(curve)?;
        tables.dispatches.insert(curve.id, request.clone());
        Ok(tables.write_curve(curve))
    }

    async fn get_launch(&self, curve_id: &CurveId) -> EngineResult<Option<LaunchRecord>> {
        Ok(self.curves.read().await.launches.get(curve_id).cloned())
    }

    async fn commit_launch(&self, curve: &Curve, record: &LaunchRecord) -> EngineResult<Curve> {
        let mut tables = self.curves.write().await;
        tables.check_curve(curve)?;
        if tables.launches.contains_key(&curve.id) {
            return Err(StorageError::AlreadyExists(format!("launch {}", curve.id)).into());
        }
        tables.launches.insert(curve.id, record.clone());
        Ok(tables.write_curve(curve))
    }
}

#[async_trait]
impl VaultRepository for MemoryStore {
    async fn get_account(&self, user_id: &UserId) -> EngineResult<Option<VaultAccount>> {
        Ok(self.vault.read().await.accounts.get(user_id).cloned())
    }

    async fn upsert_account(&self, account: &VaultAccount) -> EngineResult<VaultAccount> {
        let mut tables = self.vault.write().await;
        tables.check_account(account)?;
        Ok(tables.write_account(account))
    }

    async fn get_lock(&self, id: &LockId) -> EngineResult<Option<VaultLock>> {
        Ok(self.vault.read().await.locks.get(id).cloned())
    }

    async fn commit_lock(&self, account: &VaultAccount, lock: &VaultLock) -> EngineResult<VaultAccount> {
        let mut tables = self.vault.write().await;
        tables.check_account(account)?;
        if tables.locks.contains_key(&lock.id) {
            return Err(StorageError::AlreadyExists(format!("vault lock {}", lock.id)).into());
        }
        tables.locks.insert(lock.id, lock.clone());
        Ok(tables.write_account(account))
    }

    async fn commit_resolution(&self, account: &VaultAccount, lock: &VaultLock) -> EngineResult<VaultAccount> {
        let mut tables = self.vault.write().await;
        let stored = tables
            .locks
            .get(&lock.id)
            .ok_or_else(|| StorageError::Missing(format!("vault lock {}", lock.id)))?;
        if stored.status != LockStatus::Locked {
            return Err(KeystoneCoreError::AlreadyResolved(stored.status).into());
        }
        tables.check_account(account)?;
        tables.locks.insert(lock.id, lock.clone());
        Ok(tables.write_account(account))
    }

    async fn list_locks(&self, query: &LockQuery) -> EngineResult<Vec<VaultLock>> {
        let tables = self.vault.read().await;
        let mut locks: Vec<VaultLock> = tables
            .locks
            .values()
            .filter(|l| query.user_id.as_ref().map_or(true, |u| &l.user_id == u))
            .filter(|l| query.correlation_id.as_ref().map_or(true, |c| &l.correlation_id == c))
            .filter(|l| query.status.map_or(true, |s| l.status == s))
            .cloned()
            .collect();
        locks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(locks)
    }
}

/// Settlement gateway that confirms every request
#[derive(Debug, Default)]
pub struct InstantSettlement {
    settled: AtomicU64,
}

impl InstantSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of confirmed settlements
    pub fn settled_count(&self) -> u64 {
        self.settled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettlementGateway for InstantSettlement {
    async fn settle(&self, request: &SettlementRequest) -> Result<SettlementReceipt, CollaboratorError> {
        self.settled.fetch_add(1, Ordering::SeqCst);
        debug!(key = %request.idempotency_key(), amount = request.amount, "Settlement confirmed");
        Ok(SettlementReceipt {
            settlement_id: Uuid::new_v4().to_string(),
            curve_id: request.curve_id,
            user_id: request.user_id.clone(),
            side: request.side,
            amount: request.amount,
            settled_at: Utc::now(),
        })
    }
}

/// Launch executor that completes immediately and remembers outcomes by key
#[derive(Debug, Default)]
pub struct SimulatedLaunchExecutor {
    executions: RwLock<HashMap<String, LaunchExecution>>,
}

impl SimulatedLaunchExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn execution_count(&self) -> usize {
        self.executions.read().await.len()
    }
}

#[async_trait]
impl LaunchExecutor for SimulatedLaunchExecutor {
    async fn execute(&self, request: &LaunchRequest) -> Result<LaunchExecution, CollaboratorError> {
        let mut executions = self.executions.write().await;
        let execution = executions
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| LaunchExecution {
                external_reference: ExternalReference {
                    asset_id: format!("asset-{}", request.curve_id),
                    execution_tx: Uuid::new_v4().to_string(),
                },
                executed_at: Utc::now(),
            });
        Ok(execution.clone())
    }

    async fn lookup(&self, idempotency_key: &str) -> Result<Option<LaunchExecution>, CollaboratorError> {
        Ok(self.executions.read().await.get(idempotency_key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::PricingParams;

    #[tokio::test]
    async fn test_curve_update_is_version_checked() {
        let store = MemoryStore::new();
        let curve = Curve::new(UserId::from("owner"), PricingParams::default(), Utc::now());
        store.insert_curve(&curve).await.unwrap();

        let updated = store.update_curve(&curve).await.unwrap();
        assert_eq!(updated.version, 1);

        // Stale copy loses
        let err = store.update_curve(&curve).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_account_insert_requires_version_zero() {
        let store = MemoryStore::new();
        let account = VaultAccount::new(UserId::from("u"));
        let stored = store.upsert_account(&account).await.unwrap();
        assert_eq!(stored.version, 1);
        assert!(store.upsert_account(&account).await.is_err());
        assert!(store.upsert_account(&stored).await.is_ok());
    }

    #[tokio::test]
    async fn test_simulated_executor_is_idempotent() {
        let executor = SimulatedLaunchExecutor::new();
        let request = LaunchRequest {
            idempotency_key: "launch:x".into(),
            curve_id: CurveId::new(),
            distribution: Distribution {
                curve_id: CurveId::new(),
                acquired_quantity: 0,
                allocations: vec![],
                residual: 0,
                residual_policy: Default::default(),
            },
            reserve_to_spend: 1,
            reserve_remainder: 0,
            project_wallet: "wallet".into(),
        };
        let first = executor.execute(&request).await.unwrap();
        let second = executor.execute(&request).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(executor.lookup("launch:x").await.unwrap(), Some(first));
        assert_eq!(executor.execution_count().await, 1);
    }
}
