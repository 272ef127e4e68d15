//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use keystone_core::{CurveId, ExternalReference, UserId};
use keystone_engine::adapters::{InstantSettlement, MemoryStore};
use keystone_engine::config::{EngineConfig, RetryConfig};
use keystone_engine::core::{
    CollaboratorError, CurveRepository, LaunchExecution, LaunchExecutor, LaunchRequest, SettlementGateway,
    SettlementReceipt, SettlementRequest,
};
use keystone_engine::Engine;

pub const COIN: u128 = 1_000_000_000;

/// Config with room to trade large blocks and a 1 coin graduation threshold
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.tiers.wallet_cap_base = 1_000;
    config.graduation.threshold = COIN as u64;
    config.graduation.min_holders = 2;
    config.graduation.min_supply = 1;
    config.graduation.dispatch_timeout_secs = 0;
    config.retry = RetryConfig {
        max_retries: 5,
        base_delay_ms: 1,
        max_delay_ms: 5,
        backoff_multiplier: 2.0,
    };
    config
}

pub fn user(name: &str) -> UserId {
    UserId::from(name)
}

pub struct Harness {
    pub engine: Engine,
    pub store: Arc<MemoryStore>,
    pub settlement: Arc<ScriptedSettlement>,
    pub executor: Arc<ScriptedLaunchExecutor>,
}

pub fn harness(config: EngineConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let settlement = Arc::new(ScriptedSettlement::new(store.clone()));
    let executor = Arc::new(ScriptedLaunchExecutor::default());
    let engine = Engine::new(
        config,
        store.clone(),
        store.clone(),
        settlement.clone(),
        executor.clone(),
    )
    .unwrap();

    Harness {
        engine,
        store,
        settlement,
        executor,
    }
}

/// Create a curve owned by "creator" and buy the given blocks into it
pub async fn funded_curve(harness: &Harness, buys: &[(&str, u64)]) -> CurveId {
    let curve = harness
        .engine
        .market
        .create_curve(user("creator"), None)
        .await
        .unwrap();
    for (name, shares) in buys {
        harness
            .engine
            .market
            .buy(&curve.id, &user(name), *shares, None)
            .await
            .unwrap();
    }
    curve.id
}

/// Settlement gateway that can fail or race a concurrent ledger write
pub struct ScriptedSettlement {
    inner: InstantSettlement,
    store: Arc<MemoryStore>,
    fail_next: Mutex<Option<CollaboratorError>>,
    bump_curve_next: Mutex<bool>,
    pub calls: AtomicU64,
}

impl ScriptedSettlement {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            inner: InstantSettlement::new(),
            store,
            fail_next: Mutex::new(None),
            bump_curve_next: Mutex::new(false),
            calls: AtomicU64::new(0),
        }
    }

    pub fn fail_next(&self, err: CollaboratorError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    /// Next settlement confirms, but the curve version moves underneath it
    pub fn bump_curve_next(&self) {
        *self.bump_curve_next.lock().unwrap() = true;
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettlementGateway for ScriptedSettlement {
    async fn settle(&self, request: &SettlementRequest) -> Result<SettlementReceipt, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.fail_next.lock().unwrap().take();
        if let Some(err) = failure {
            return Err(err);
        }
        let bump = std::mem::take(&mut *self.bump_curve_next.lock().unwrap());
        if bump {
            let curve = self.store.get_curve(&request.curve_id).await.unwrap().unwrap();
            self.store.update_curve(&curve).await.unwrap();
        }
        self.inner.settle(request).await
    }
}

/// Scripted behavior of the next `execute` call
#[derive(Debug, Clone)]
pub enum LaunchScript {
    Succeed,
    /// Fails before anything leaves the process
    NotDispatched,
    /// Executes, but the response is lost
    LoseResponse,
    Reject,
    /// Never answers
    Hang,
}

#[derive(Default)]
pub struct ScriptedLaunchExecutor {
    script: Mutex<VecDeque<LaunchScript>>,
    completed: Mutex<HashMap<String, LaunchExecution>>,
    pub execute_calls: AtomicU64,
    pub lookup_calls: AtomicU64,
}

impl ScriptedLaunchExecutor {
    pub fn push(&self, step: LaunchScript) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn execute_count(&self) -> u64 {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_count(&self) -> u64 {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    fn complete(&self, request: &LaunchRequest) -> LaunchExecution {
        self.completed
            .lock()
            .unwrap()
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| LaunchExecution {
                external_reference: ExternalReference {
                    asset_id: format!("mint-{}", request.curve_id),
                    execution_tx: format!("tx-{}", request.idempotency_key),
                },
                executed_at: Utc::now(),
            })
            .clone()
    }
}

#[async_trait]
impl LaunchExecutor for ScriptedLaunchExecutor {
    async fn execute(&self, request: &LaunchRequest) -> Result<LaunchExecution, CollaboratorError> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front().unwrap_or(LaunchScript::Succeed);
        match step {
            LaunchScript::Succeed => Ok(self.complete(request)),
            LaunchScript::NotDispatched => Err(CollaboratorError::NotDispatched("rpc unreachable".into())),
            LaunchScript::LoseResponse => {
                self.complete(request);
                Err(CollaboratorError::Unavailable("connection reset".into()))
            }
            LaunchScript::Reject => Err(CollaboratorError::Rejected("pool already exists".into())),
            LaunchScript::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok(self.complete(request))
            }
        }
    }

    async fn lookup(&self, idempotency_key: &str) -> Result<Option<LaunchExecution>, CollaboratorError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.completed.lock().unwrap().get(idempotency_key).cloned())
    }
}
