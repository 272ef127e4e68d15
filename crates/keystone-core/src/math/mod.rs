//! # Mathematical Functions
//!
//! Checked integer arithmetic and integer roots used by the pricing curve
//! and the graduation math.

pub mod roots;
pub mod safe_math;

// Re-export commonly used functions
pub use roots::*;
pub use safe_math::*;
