//! # Safe Math Operations
//!
//! Overflow-checked arithmetic for ledger values.

use crate::constants::BPS_DENOMINATOR;
use crate::errors::{CoreResult, KeystoneCoreError};

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    // Binary operations with checked methods
    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        /// Checked binary operation returning a core error on overflow/underflow
        pub fn $fn_name(a: $type, b: $type) -> CoreResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };

    // Division operations with zero check
    (div, $fn_name:ident, $type:ty) => {
        /// Safe division with zero check
        pub fn $fn_name(a: $type, b: $type) -> CoreResult<$type> {
            if b == 0 {
                return Err(KeystoneCoreError::DivisionByZero);
            }
            Ok(a / b)
        }
    };

    // Narrowing casts with only a max check
    (cast_max, $fn_name:ident, $from_type:ty, $to_type:ty, $max_val:expr) => {
        /// Safe narrowing cast
        pub fn $fn_name(value: $from_type) -> CoreResult<$to_type> {
            if value > $max_val {
                return Err(KeystoneCoreError::MathOverflow);
            }
            Ok(value as $to_type)
        }
    };
}

safe_arith!(safe_add_u64, u64, checked_add, KeystoneCoreError::MathOverflow);
safe_arith!(safe_sub_u64, u64, checked_sub, KeystoneCoreError::MathUnderflow);
safe_arith!(safe_mul_u64, u64, checked_mul, KeystoneCoreError::MathOverflow);
safe_arith!(div, safe_div_u64, u64);

safe_arith!(safe_add_u128, u128, checked_add, KeystoneCoreError::MathOverflow);
safe_arith!(safe_sub_u128, u128, checked_sub, KeystoneCoreError::MathUnderflow);
safe_arith!(safe_mul_u128, u128, checked_mul, KeystoneCoreError::MathOverflow);
safe_arith!(div, safe_div_u128, u128);

safe_arith!(cast_max, safe_cast_u128_to_u64, u128, u64, u64::MAX as u128);

/// Portion of `value` at `bps` basis points, rounded down
pub fn safe_calculate_bps(value: u128, bps: u16) -> CoreResult<u128> {
    let result = safe_mul_u128(value, bps as u128)?;
    safe_div_u128(result, BPS_DENOMINATOR)
}

/// floor(a * b / denominator) with checked intermediate
pub fn safe_mul_div_u128(a: u128, b: u128, denominator: u128) -> CoreResult<u128> {
    safe_div_u128(safe_mul_u128(a, b)?, denominator)
}
