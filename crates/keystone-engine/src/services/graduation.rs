//! Graduation state machine
//!
//! Drives a curve from trading to launch:
//!
//! ```text
//! Trading -> Frozen -> SnapshotTaken -> DistributionPlanned -> LaunchDispatched -> Launched
//!                                              ^                      |
//!                                              +---- not dispatched --+
//! ```
//!
//! Every stage is persisted on the curve before the next one starts, so a
//! crashed or failed launch resumes from the last completed stage. The
//! launch request is stored with the `LaunchDispatched` marker; a resumed
//! launch must match it, and the outcome is looked up by its idempotency key
//! before anything is dispatched again.

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join;
use keystone_core::constants::{BPS_DENOMINATOR, MAX_BPS};
use keystone_core::{
    build_snapshot, compute_distribution, Curve, CurveId, CurvePricingEngine, CurveState, Distribution,
    ExternalReference, FeeSchedule, FrozenCheckpoint, GraduationStage, KeystoneCoreError, LaunchRecord, Snapshot,
    UserId,
};
use tracing::{error, info, instrument, warn};

use crate::config::GraduationConfig;
use crate::core::{
    CollaboratorError, CurveRepository, EngineError, EngineResult, LaunchEligibility, LaunchExecution,
    LaunchExecutor, LaunchParams, LaunchRequest, StorageError,
};
use crate::infrastructure::KeyedLocks;

pub struct GraduationStateMachine {
    repository: Arc<dyn CurveRepository>,
    executor: Arc<dyn LaunchExecutor>,
    fees: FeeSchedule,
    config: GraduationConfig,
    curve_locks: Arc<KeyedLocks<CurveId>>,
}

impl GraduationStateMachine {
    pub fn new(
        repository: Arc<dyn CurveRepository>,
        executor: Arc<dyn LaunchExecutor>,
        fees: FeeSchedule,
        config: GraduationConfig,
        curve_locks: Arc<KeyedLocks<CurveId>>,
    ) -> Self {
        Self {
            repository,
            executor,
            fees,
            config,
            curve_locks,
        }
    }

    async fn load(&self, curve_id: &CurveId) -> EngineResult<Curve> {
        self.repository
            .get_curve(curve_id)
            .await?
            .ok_or(EngineError::CurveNotFound(*curve_id))
    }

    /// Halt trading and record the checkpoint. Owner only.
    #[instrument(skip_all, fields(curve_id = %curve_id, actor = %actor_id))]
    pub async fn freeze(&self, curve_id: &CurveId, actor_id: &UserId) -> EngineResult<FrozenCheckpoint> {
        let _guard = self.curve_locks.lock(curve_id).await;

        let curve = self.load(curve_id).await?;
        if !curve.is_owner(actor_id) {
            warn!("Freeze attempted by non-owner");
            return Err(KeystoneCoreError::Unauthorized.into());
        }
        if curve.state != CurveState::Active {
            return Err(KeystoneCoreError::InvalidStateTransition {
                from: curve.state,
                to: CurveState::Frozen,
            }
            .into());
        }
        let threshold = self.config.threshold as u128;
        if curve.reserve < threshold {
            return Err(KeystoneCoreError::insufficient_reserve(curve.reserve, threshold).into());
        }

        let mut next = curve.clone();
        let checkpoint = next.freeze(Utc::now())?;
        self.repository.update_curve(&next).await?;

        info!(
            frozen_supply = checkpoint.frozen_supply,
            frozen_reserve = checkpoint.frozen_reserve,
            "Curve frozen"
        );
        Ok(checkpoint)
    }

    /// Capture holder percentages of the frozen supply. Returns the stored
    /// snapshot when one already exists.
    #[instrument(skip_all, fields(curve_id = %curve_id))]
    pub async fn snapshot(&self, curve_id: &CurveId) -> EngineResult<Snapshot> {
        let _guard = self.curve_locks.lock(curve_id).await;
        let curve = self.load(curve_id).await?;
        let (_, snapshot) = self.ensure_snapshot(curve).await?;
        Ok(snapshot)
    }

    async fn ensure_snapshot(&self, curve: Curve) -> EngineResult<(Curve, Snapshot)> {
        if curve.stage.has_snapshot() {
            let snapshot = self
                .repository
                .get_snapshot(&curve.id)
                .await?
                .ok_or_else(|| StorageError::Missing(format!("snapshot {}", curve.id)))?;
            return Ok((curve, snapshot));
        }
        if curve.stage != GraduationStage::Frozen {
            return Err(KeystoneCoreError::InvalidStageTransition {
                from: curve.stage,
                to: GraduationStage::SnapshotTaken,
            }
            .into());
        }

        let checkpoint = curve.checkpoint()?.clone();
        let holders = self.repository.list_holders(&curve.id).await?;
        let now = Utc::now();
        let snapshot = build_snapshot(
            curve.id,
            checkpoint.frozen_supply,
            holders.into_iter().map(|h| (h.user_id, h.balance)),
            now,
        )?;

        let mut next = curve;
        next.advance_stage(GraduationStage::SnapshotTaken, now)?;
        let committed = self.repository.commit_snapshot(&next, &snapshot).await?;

        info!(holders = snapshot.holder_count(), "Snapshot taken");
        Ok((committed, snapshot))
    }

    /// Plan the allocation of `acquired_quantity` across the snapshot.
    /// Returns the stored plan when one already exists.
    #[instrument(skip_all, fields(curve_id = %curve_id, acquired_quantity = %acquired_quantity))]
    pub async fn compute_distribution(&self, curve_id: &CurveId, acquired_quantity: u128) -> EngineResult<Distribution> {
        let _guard = self.curve_locks.lock(curve_id).await;
        let curve = self.load(curve_id).await?;
        let (curve, snapshot) = self.ensure_snapshot(curve).await?;
        let (_, distribution) = self.ensure_distribution(curve, &snapshot, acquired_quantity).await?;
        Ok(distribution)
    }

    async fn ensure_distribution(
        &self,
        curve: Curve,
        snapshot: &Snapshot,
        acquired_quantity: u128,
    ) -> EngineResult<(Curve, Distribution)> {
        if curve.stage.has_distribution() {
            let distribution = self
                .repository
                .get_distribution(&curve.id)
                .await?
                .ok_or_else(|| StorageError::Missing(format!("distribution {}", curve.id)))?;
            if distribution.acquired_quantity != acquired_quantity {
                return Err(KeystoneCoreError::InvalidParameter(
                    "acquired quantity differs from the planned distribution",
                )
                .into());
            }
            return Ok((curve, distribution));
        }

        let distribution = compute_distribution(snapshot, acquired_quantity, self.config.residual_policy)?;

        let mut next = curve;
        next.advance_stage(GraduationStage::DistributionPlanned, Utc::now())?;
        let committed = self.repository.commit_distribution(&next, &distribution).await?;

        info!(
            residual = distribution.residual,
            policy = %distribution.residual_policy,
            "Distribution planned"
        );
        Ok((committed, distribution))
    }

    /// Launch the external asset and distribute it to holders.
    ///
    /// Safe to call again after any failure: completed stages are reused
    /// and a dispatched launch is looked up before it is sent again.
    #[instrument(skip_all, fields(curve_id = %curve_id))]
    pub async fn launch(&self, curve_id: &CurveId, params: LaunchParams) -> EngineResult<ExternalReference> {
        let _guard = self.curve_locks.lock(curve_id).await;

        let curve = self.load(curve_id).await?;
        if curve.state == CurveState::Launched {
            return Err(EngineError::AlreadyLaunched(*curve_id));
        }
        if curve.state != CurveState::Frozen {
            return Err(KeystoneCoreError::InvalidStateTransition {
                from: curve.state,
                to: CurveState::Launched,
            }
            .into());
        }

        let checkpoint = curve.checkpoint()?.clone();
        self.validate_launch(&curve, &checkpoint, &params)?;
        let reserve_remainder = checkpoint.frozen_reserve - params.reserve_to_spend;

        let (curve, snapshot) = self.ensure_snapshot(curve).await?;
        let (curve, distribution) = self
            .ensure_distribution(curve, &snapshot, params.acquired_quantity)
            .await?;

        let (curve, request, previous) = if curve.stage == GraduationStage::LaunchDispatched {
            let request = self
                .repository
                .get_dispatch(curve_id)
                .await?
                .ok_or_else(|| StorageError::Missing(format!("dispatched launch {}", curve_id)))?;
            if request.reserve_to_spend != params.reserve_to_spend || request.project_wallet != params.project_wallet {
                warn!(key = %request.idempotency_key, "Resume attempted with different launch params");
                return Err(KeystoneCoreError::InvalidParameter("launch params differ from the dispatched launch").into());
            }

            info!(key = %request.idempotency_key, "Resuming dispatched launch");
            let previous = self
                .executor
                .lookup(&request.idempotency_key)
                .await
                .map_err(|e| self.launch_failed(curve_id, e))?;
            (curve, request, previous)
        } else {
            let request = LaunchRequest {
                idempotency_key: LaunchRequest::key_for(curve_id),
                curve_id: *curve_id,
                distribution,
                reserve_to_spend: params.reserve_to_spend,
                reserve_remainder,
                project_wallet: params.project_wallet,
            };
            let mut next = curve;
            next.advance_stage(GraduationStage::LaunchDispatched, Utc::now())?;
            let committed = self.repository.commit_dispatch(&next, &request).await?;
            (committed, request, None)
        };

        let execution = match previous {
            Some(execution) => execution,
            None => self.dispatch(&curve, &request).await?,
        };

        let now = Utc::now();
        let mut next = curve;
        next.advance_stage(GraduationStage::Launched, now)?;
        next.external_reference = Some(execution.external_reference.clone());

        let record = LaunchRecord {
            curve_id: *curve_id,
            external_reference: execution.external_reference.clone(),
            distribution: request.distribution,
            reserve_spent: request.reserve_to_spend,
            reserve_remainder: request.reserve_remainder,
            project_wallet: request.project_wallet,
            launched_at: now,
        };
        self.repository.commit_launch(&next, &record).await?;

        info!(
            asset_id = %execution.external_reference.asset_id,
            reserve_spent = record.reserve_spent,
            reserve_remainder = record.reserve_remainder,
            "Curve launched"
        );
        Ok(execution.external_reference)
    }

    fn validate_launch(&self, curve: &Curve, checkpoint: &FrozenCheckpoint, params: &LaunchParams) -> EngineResult<()> {
        if params.reserve_to_spend == 0 || params.acquired_quantity == 0 {
            return Err(KeystoneCoreError::InvalidAmount.into());
        }
        if params.reserve_to_spend > checkpoint.frozen_reserve {
            return Err(KeystoneCoreError::insufficient_reserve(checkpoint.frozen_reserve, params.reserve_to_spend).into());
        }
        if params.reserve_to_spend > self.config.max_launch_spend as u128 {
            return Err(EngineError::invalid_parameter(
                "reserve_to_spend",
                &params.reserve_to_spend.to_string(),
                &format!("at most max_launch_spend ({})", self.config.max_launch_spend),
            ));
        }
        if params.project_wallet.is_empty() {
            return Err(EngineError::invalid_parameter("project_wallet", "empty", "non-empty address"));
        }
        if curve.holders < self.config.min_holders {
            return Err(EngineError::NotEligible {
                curve_id: curve.id,
                reason: format!("{} holders, need {}", curve.holders, self.config.min_holders),
            });
        }
        if checkpoint.frozen_supply < self.config.min_supply {
            return Err(EngineError::NotEligible {
                curve_id: curve.id,
                reason: format!("supply {}, need {}", checkpoint.frozen_supply, self.config.min_supply),
            });
        }
        Ok(())
    }

    /// Hand the launch to the executor. A failure the executor reports as
    /// never dispatched rolls the stage back; any other failure leaves the
    /// curve at `LaunchDispatched` so the next attempt looks it up first.
    async fn dispatch(&self, curve: &Curve, request: &LaunchRequest) -> EngineResult<LaunchExecution> {
        let result = match self.config.dispatch_timeout() {
            Some(timeout) => match tokio::time::timeout(timeout, self.executor.execute(request)).await {
                Ok(result) => result,
                Err(_) => Err(CollaboratorError::Timeout(timeout)),
            },
            None => self.executor.execute(request).await,
        };

        match result {
            Ok(execution) => Ok(execution),
            Err(CollaboratorError::NotDispatched(reason)) => {
                warn!(key = %request.idempotency_key, "Launch not dispatched, rolling back: {}", reason);
                let mut previous = curve.clone();
                previous.advance_stage(GraduationStage::DistributionPlanned, Utc::now())?;
                self.repository.update_curve(&previous).await?;
                Err(EngineError::LaunchFailed {
                    curve_id: curve.id,
                    reason,
                    retryable: true,
                })
            }
            Err(e) => Err(self.launch_failed(&curve.id, e)),
        }
    }

    fn launch_failed(&self, curve_id: &CurveId, err: CollaboratorError) -> EngineError {
        error!("Launch of curve {} failed: {}", curve_id, err);
        EngineError::LaunchFailed {
            curve_id: *curve_id,
            reason: err.to_string(),
            retryable: err.is_retryable(),
        }
    }

    /// Reserve, holder and supply standing against the freeze and launch
    /// thresholds
    pub async fn eligibility(&self, curve_id: &CurveId) -> EngineResult<LaunchEligibility> {
        let curve = self.load(curve_id).await?;
        let pricing = CurvePricingEngine::new(curve.pricing, self.fees)?;
        let threshold = self.config.threshold as u128;

        let supply_at_threshold = pricing.supply_for_target_reserve(threshold)?;
        let progress = curve
            .reserve
            .saturating_mul(BPS_DENOMINATOR)
            .checked_div(threshold)
            .unwrap_or(BPS_DENOMINATOR);
        let progress_bps = progress.min(MAX_BPS as u128) as u16;

        let supply = curve.checkpoint.as_ref().map_or(curve.supply, |c| c.frozen_supply);
        let can_launch = curve.state == CurveState::Frozen
            && curve.holders >= self.config.min_holders
            && supply >= self.config.min_supply;

        Ok(LaunchEligibility {
            curve_id: *curve_id,
            reserve: curve.reserve,
            graduation_threshold: threshold,
            holders: curve.holders,
            min_holders: self.config.min_holders,
            supply,
            min_supply: self.config.min_supply,
            supply_at_threshold,
            progress_bps,
            can_freeze: curve.state == CurveState::Active && curve.reserve >= threshold,
            can_launch,
        })
    }

    /// Snapshot and launch record for a curve, read concurrently
    pub async fn graduation_records(
        &self,
        curve_id: &CurveId,
    ) -> EngineResult<(Option<Snapshot>, Option<LaunchRecord>)> {
        try_join(
            self.repository.get_snapshot(curve_id),
            self.repository.get_launch(curve_id),
        )
        .await
    }
}
