//! # Curve Pricing Engine
//!
//! Prices shares along the curve, sums trade costs unit by unit, splits
//! fees and answers "how much supply until the reserve reaches X".

pub mod curve;
pub mod fees;

pub use curve::{price_at, price_sum, PricingParams};
pub use fees::{FeeSchedule, FeeSplit, ReferralRoute};

use crate::constants::MAX_CURVE_SUPPLY;
use crate::errors::{CoreResult, KeystoneCoreError};
use crate::math::{safe_add_u128, safe_add_u64, safe_calculate_bps, safe_div_u128, safe_sub_u128, safe_sub_u64};

/// Quote for buying `shares` at `supply_before`
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuyQuote {
    pub supply_before: u64,
    pub shares: u64,
    pub total_cost: u128,
    pub fees: FeeSplit,
    /// Price of the first share bought
    pub price_before: u128,
    /// Price of the next share after this buy
    pub price_after: u128,
    pub average_price: u128,
}

/// Quote for selling `shares` back at `supply_before`
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SellQuote {
    pub supply_before: u64,
    pub shares: u64,
    /// Sum of the sold units' prices
    pub gross_proceeds: u128,
    /// Reserve-bps portion of the gross paid to the seller
    pub payout: u128,
    /// Gross minus payout, never left the fee layers
    pub retained: u128,
    pub price_before: u128,
    pub price_after: u128,
    pub average_price: u128,
}

/// Pricing for one curve
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CurvePricingEngine {
    params: PricingParams,
    fees: FeeSchedule,
}

impl CurvePricingEngine {
    pub fn new(params: PricingParams, fees: FeeSchedule) -> CoreResult<Self> {
        params.validate()?;
        fees.validate()?;
        Ok(Self { params, fees })
    }

    pub fn params(&self) -> &PricingParams {
        &self.params
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Price of the next share at `supply`
    pub fn price(&self, supply: u64) -> CoreResult<u128> {
        price_at(&self.params, supply)
    }

    /// Cost of minting `n` shares starting at `current_supply`
    pub fn cost_of(&self, current_supply: u64, n: u64) -> CoreResult<u128> {
        let end = safe_add_u64(current_supply, n)?;
        if end > MAX_CURVE_SUPPLY {
            return Err(KeystoneCoreError::SupplyOutOfRange {
                supply: end,
                max: MAX_CURVE_SUPPLY,
            });
        }
        price_sum(&self.params, current_supply, end)
    }

    /// Gross value of the top `n` units when supply is `current_supply`
    pub fn sell_proceeds(&self, current_supply: u64, n: u64) -> CoreResult<u128> {
        let start = safe_sub_u64(current_supply, n)?;
        price_sum(&self.params, start, current_supply)
    }

    pub fn fee_split(&self, total_cost: u128) -> CoreResult<FeeSplit> {
        self.fees.split(total_cost)
    }

    /// Reserve credited by units in `[from, to)`, priced one unit at a time
    fn reserve_between(&self, from: u64, to: u64) -> CoreResult<u128> {
        let mut total = 0u128;
        for s in from..to {
            let split = self.fee_split(self.price(s)?)?;
            total = safe_add_u128(total, split.reserve)?;
        }
        Ok(total)
    }

    /// Minimal supply whose accumulated reserve contribution reaches `target`
    pub fn supply_for_target_reserve(&self, target: u128) -> CoreResult<u64> {
        if target == 0 {
            return Ok(0);
        }

        // Bracket: reserve(low) < target <= reserve(high)
        let mut low = 0u64;
        let mut low_reserve = 0u128;
        let mut high = 1u64;
        loop {
            let high_reserve = safe_add_u128(low_reserve, self.reserve_between(low, high)?)?;
            if high_reserve >= target {
                break;
            }
            if high == MAX_CURVE_SUPPLY {
                return Err(KeystoneCoreError::SupplyOutOfRange {
                    supply: high,
                    max: MAX_CURVE_SUPPLY,
                });
            }
            low = high;
            low_reserve = high_reserve;
            high = high.saturating_mul(2).min(MAX_CURVE_SUPPLY);
        }

        while high - low > 1 {
            let mid = low + (high - low) / 2;
            let mid_reserve = safe_add_u128(low_reserve, self.reserve_between(low, mid)?)?;
            if mid_reserve >= target {
                high = mid;
            } else {
                low = mid;
                low_reserve = mid_reserve;
            }
        }

        Ok(high)
    }

    pub fn quote_buy(&self, supply: u64, shares: u64) -> CoreResult<BuyQuote> {
        if shares == 0 {
            return Err(KeystoneCoreError::InvalidAmount);
        }
        let total_cost = self.cost_of(supply, shares)?;
        let fees = self.fee_split(total_cost)?;

        Ok(BuyQuote {
            supply_before: supply,
            shares,
            total_cost,
            fees,
            price_before: self.price(supply)?,
            price_after: self.price(supply + shares)?,
            average_price: safe_div_u128(total_cost, shares as u128)?,
        })
    }

    pub fn quote_sell(&self, supply: u64, shares: u64) -> CoreResult<SellQuote> {
        if shares == 0 {
            return Err(KeystoneCoreError::InvalidAmount);
        }
        if shares > supply {
            return Err(KeystoneCoreError::InsufficientShares {
                held: supply,
                requested: shares,
            });
        }
        let gross_proceeds = self.sell_proceeds(supply, shares)?;
        let payout = safe_calculate_bps(gross_proceeds, self.fees.reserve_bps)?;

        Ok(SellQuote {
            supply_before: supply,
            shares,
            gross_proceeds,
            payout,
            retained: safe_sub_u128(gross_proceeds, payout)?,
            price_before: self.price(supply - 1)?,
            price_after: self.price(supply - shares)?,
            average_price: safe_div_u128(gross_proceeds, shares as u128)?,
        })
    }
}
