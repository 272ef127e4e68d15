//! # Integer Roots
//!
//! Exact floor roots over u128, used to evaluate fractional powers of the
//! supply without floating point.

/// Largest `r` such that `r^degree <= value`
pub fn integer_root(value: u128, degree: u32) -> u128 {
    if value < 2 || degree <= 1 {
        return value;
    }

    // 2^ceil(bits/degree) is strictly above the root
    let bits = 128 - value.leading_zeros();
    let shift = ((bits + degree - 1) / degree).min(127);
    let mut low = 0u128;
    let mut high = 1u128 << shift;

    while low < high {
        let mid = low + (high - low + 1) / 2;
        match mid.checked_pow(degree) {
            Some(power) if power <= value => low = mid,
            _ => high = mid - 1,
        }
    }

    low
}
