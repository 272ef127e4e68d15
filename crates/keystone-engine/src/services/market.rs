//! Curve market service
//!
//! Buys and sells against a curve. Each trade is priced against the curve
//! as read under the per-curve lock, settled with the gateway, and only then
//! committed to the ledger with a version check.

use std::sync::Arc;

use chrono::Utc;
use keystone_core::{
    AccessTierResolver, Curve, CurveId, CurvePricingEngine, FeeSplit, HolderBalance, KeystoneCoreError,
    PricingParams, ReferralRoute, UserId,
};
use tracing::{debug, error, info, instrument};

use crate::config::MarketConfig;
use crate::core::{
    CurveRepository, EngineError, EngineResult, HolderAccess, SettlementGateway, SettlementRequest, TradeReceipt,
    TradeSide,
};
use crate::infrastructure::KeyedLocks;

pub struct CurveMarket {
    repository: Arc<dyn CurveRepository>,
    settlement: Arc<dyn SettlementGateway>,
    /// Default coefficients for new curves and the platform fee schedule
    pricing: CurvePricingEngine,
    tiers: AccessTierResolver,
    config: MarketConfig,
    curve_locks: Arc<KeyedLocks<CurveId>>,
}

impl CurveMarket {
    pub fn new(
        repository: Arc<dyn CurveRepository>,
        settlement: Arc<dyn SettlementGateway>,
        pricing: CurvePricingEngine,
        tiers: AccessTierResolver,
        config: MarketConfig,
        curve_locks: Arc<KeyedLocks<CurveId>>,
    ) -> Self {
        Self {
            repository,
            settlement,
            pricing,
            tiers,
            config,
            curve_locks,
        }
    }

    /// Open a new curve for `owner`. Platform default coefficients apply
    /// when `params` is `None`.
    #[instrument(skip_all, fields(owner = %owner))]
    pub async fn create_curve(&self, owner: UserId, params: Option<PricingParams>) -> EngineResult<Curve> {
        let params = params.unwrap_or(*self.pricing.params());
        params.validate()?;

        let curve = Curve::new(owner, params, Utc::now());
        self.repository.insert_curve(&curve).await?;
        info!(curve_id = %curve.id, "Curve created");
        Ok(curve)
    }

    pub async fn curve(&self, curve_id: &CurveId) -> EngineResult<Curve> {
        self.repository
            .get_curve(curve_id)
            .await?
            .ok_or(EngineError::CurveNotFound(*curve_id))
    }

    pub async fn holder_balance(&self, curve_id: &CurveId, user_id: &UserId) -> EngineResult<u64> {
        Ok(self
            .repository
            .get_holder(curve_id, user_id)
            .await?
            .map(|h| h.balance)
            .unwrap_or(0))
    }

    /// Tier, capabilities and current wallet cap for a holder
    pub async fn access(&self, curve_id: &CurveId, user_id: &UserId) -> EngineResult<HolderAccess> {
        let curve = self.curve(curve_id).await?;
        let balance = self.holder_balance(curve_id, user_id).await?;
        let tier = self.tiers.resolve_tier(balance);

        Ok(HolderAccess {
            curve_id: *curve_id,
            user_id: user_id.clone(),
            balance,
            tier,
            capabilities: self.tiers.capabilities(tier),
            wallet_cap: self.tiers.dynamic_cap(curve.holders)?,
        })
    }

    fn engine_for(&self, curve: &Curve) -> EngineResult<CurvePricingEngine> {
        Ok(CurvePricingEngine::new(curve.pricing, *self.pricing.fees())?)
    }

    /// Buy `shares` for `user_id`
    #[instrument(skip_all, fields(curve_id = %curve_id, user_id = %user_id, shares = shares))]
    pub async fn buy(
        &self,
        curve_id: &CurveId,
        user_id: &UserId,
        shares: u64,
        referrer: Option<UserId>,
    ) -> EngineResult<TradeReceipt> {
        if shares == 0 {
            return Err(KeystoneCoreError::InvalidAmount.into());
        }
        if shares > self.config.max_shares_per_trade {
            return Err(KeystoneCoreError::ExceedsMaxPurchase {
                max: self.config.max_shares_per_trade,
                requested: shares,
            }
            .into());
        }

        let _guard = self.curve_locks.lock(curve_id).await;

        let curve = self.curve(curve_id).await?;
        curve.ensure_trading()?;

        let mut holder = self
            .repository
            .get_holder(curve_id, user_id)
            .await?
            .unwrap_or_else(|| HolderBalance::new(*curve_id, user_id.clone(), Utc::now()));
        self.tiers.check_purchase(holder.balance, shares, curve.holders)?;

        let quote = self.engine_for(&curve)?.quote_buy(curve.supply, shares)?;
        let referral = ReferralRoute::from_referrer(referrer);
        let fees = quote.fees.routed(&referral)?;
        debug!(
            total_cost = quote.total_cost,
            reserve = fees.reserve,
            price_after = quote.price_after,
            "Buy quoted"
        );

        let request = SettlementRequest {
            curve_id: *curve_id,
            user_id: user_id.clone(),
            side: TradeSide::Buy,
            shares,
            amount: quote.total_cost,
            fees,
            referral,
            curve_version: curve.version,
        };
        let receipt = self.settlement.settle(&request).await.map_err(|e| {
            error!("Buy settlement failed for {}: {}", request.idempotency_key(), e);
            e
        })?;

        let now = Utc::now();
        let mut next = curve.clone();
        next.apply_buy(shares, fees.reserve, holder.balance == 0, now)?;
        holder.balance = holder
            .balance
            .checked_add(shares)
            .ok_or(KeystoneCoreError::MathOverflow)?;
        holder.updated_at = now;

        let committed = match self.repository.commit_trade(&next, &holder).await {
            Ok(committed) => committed,
            Err(e) => {
                error!(settlement_id = %receipt.settlement_id, "Ledger commit failed after settlement: {}", e);
                return Err(EngineError::SettlementOrphaned { receipt });
            }
        };

        info!(shares, supply = committed.supply, reserve = committed.reserve, "Buy committed");
        Ok(TradeReceipt {
            curve_id: *curve_id,
            side: TradeSide::Buy,
            shares,
            amount: quote.total_cost,
            fees,
            balance_after: holder.balance,
            supply_after: committed.supply,
            reserve_after: committed.reserve,
            settlement_id: receipt.settlement_id,
        })
    }

    /// Sell `shares` back to the curve. The seller receives the reserve
    /// portion of the units' gross value.
    #[instrument(skip_all, fields(curve_id = %curve_id, user_id = %user_id, shares = shares))]
    pub async fn sell(&self, curve_id: &CurveId, user_id: &UserId, shares: u64) -> EngineResult<TradeReceipt> {
        if shares == 0 {
            return Err(KeystoneCoreError::InvalidAmount.into());
        }

        let _guard = self.curve_locks.lock(curve_id).await;

        let curve = self.curve(curve_id).await?;
        curve.ensure_trading()?;

        let mut holder = self
            .repository
            .get_holder(curve_id, user_id)
            .await?
            .unwrap_or_else(|| HolderBalance::new(*curve_id, user_id.clone(), Utc::now()));
        if holder.balance < shares {
            return Err(KeystoneCoreError::InsufficientShares {
                held: holder.balance,
                requested: shares,
            }
            .into());
        }

        let quote = self.engine_for(&curve)?.quote_sell(curve.supply, shares)?;
        if quote.payout > curve.reserve {
            return Err(KeystoneCoreError::insufficient_reserve(curve.reserve, quote.payout).into());
        }
        debug!(gross = quote.gross_proceeds, payout = quote.payout, "Sell quoted");

        let request = SettlementRequest {
            curve_id: *curve_id,
            user_id: user_id.clone(),
            side: TradeSide::Sell,
            shares,
            amount: quote.payout,
            fees: FeeSplit::default(),
            referral: ReferralRoute::Community,
            curve_version: curve.version,
        };
        let receipt = self.settlement.settle(&request).await.map_err(|e| {
            error!("Sell settlement failed for {}: {}", request.idempotency_key(), e);
            e
        })?;

        let now = Utc::now();
        let mut next = curve.clone();
        next.apply_sell(shares, quote.payout, holder.balance == shares, now)?;
        holder.balance -= shares;
        holder.updated_at = now;

        let committed = match self.repository.commit_trade(&next, &holder).await {
            Ok(committed) => committed,
            Err(e) => {
                error!(settlement_id = %receipt.settlement_id, "Ledger commit failed after settlement: {}", e);
                return Err(EngineError::SettlementOrphaned { receipt });
            }
        };

        info!(shares, supply = committed.supply, reserve = committed.reserve, "Sell committed");
        Ok(TradeReceipt {
            curve_id: *curve_id,
            side: TradeSide::Sell,
            shares,
            amount: quote.payout,
            fees: FeeSplit::default(),
            balance_after: holder.balance,
            supply_after: committed.supply,
            reserve_after: committed.reserve,
            settlement_id: receipt.settlement_id,
        })
    }
}
