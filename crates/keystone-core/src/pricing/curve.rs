//! # Curve Pricing
//!
//! Price of the next share as a function of supply:
//!
//! ```text
//! P(S) = base + linear * S + exponential * S^1.6
//! ```
//!
//! `S^1.6` is evaluated as `S * S^0.6` where `S^0.6 = (S^3)^(1/5)`. The
//! radicand is scaled by `ROOT_PRECISION^5` so the fifth root carries three
//! decimal digits, then the scale is divided back out after multiplying by
//! the coefficient. Everything is integer math, so a price computed twice is
//! the same price.

use crate::constants::{
    DEFAULT_BASE_PRICE, DEFAULT_EXPONENTIAL_COEFFICIENT, DEFAULT_LINEAR_COEFFICIENT,
    MAX_CURVE_SUPPLY, ROOT_PRECISION, ROOT_PRECISION_POW5,
};
use crate::errors::{CoreResult, KeystoneCoreError};
use crate::math::{integer_root, safe_add_u128, safe_div_u128, safe_mul_u128};

/// Curve coefficients in minor units
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PricingParams {
    /// Price at zero supply
    pub base_price: u128,
    /// Added per share in circulation
    pub linear_coefficient: u128,
    /// Weight of the supply^1.6 term
    pub exponential_coefficient: u128,
}

impl Default for PricingParams {
    fn default() -> Self {
        Self {
            base_price: DEFAULT_BASE_PRICE,
            linear_coefficient: DEFAULT_LINEAR_COEFFICIENT,
            exponential_coefficient: DEFAULT_EXPONENTIAL_COEFFICIENT,
        }
    }
}

impl PricingParams {
    /// A flat curve is not a bonding curve
    pub fn validate(&self) -> CoreResult<()> {
        if self.linear_coefficient == 0 && self.exponential_coefficient == 0 {
            return Err(KeystoneCoreError::InvalidParameter(
                "linear or exponential coefficient must be positive",
            ));
        }
        // Largest price must be representable
        price_at(self, MAX_CURVE_SUPPLY)?;
        Ok(())
    }
}

/// S^1.6 scaled by ROOT_PRECISION
fn scaled_supply_pow_1_6(supply: u128) -> CoreResult<u128> {
    let cube = supply
        .checked_pow(3)
        .ok_or(KeystoneCoreError::MathOverflow)?;
    let radicand = safe_mul_u128(cube, ROOT_PRECISION_POW5)?;
    safe_mul_u128(supply, integer_root(radicand, 5))
}

/// Price of the share minted when supply is `supply`
pub fn price_at(params: &PricingParams, supply: u64) -> CoreResult<u128> {
    if supply > MAX_CURVE_SUPPLY {
        return Err(KeystoneCoreError::SupplyOutOfRange {
            supply,
            max: MAX_CURVE_SUPPLY,
        });
    }
    let s = supply as u128;

    let linear = safe_mul_u128(params.linear_coefficient, s)?;
    let exponential = safe_div_u128(
        safe_mul_u128(params.exponential_coefficient, scaled_supply_pow_1_6(s)?)?,
        ROOT_PRECISION,
    )?;

    safe_add_u128(safe_add_u128(params.base_price, linear)?, exponential)
}

/// Sum of `price_at(s)` for `s` in `[from, to)`
pub fn price_sum(params: &PricingParams, from: u64, to: u64) -> CoreResult<u128> {
    let mut total = 0u128;
    for s in from..to {
        total = safe_add_u128(total, price_at(params, s)?)?;
    }
    Ok(total)
}
