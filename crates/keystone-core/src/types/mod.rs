//! # Domain Types
//!
//! Records shared between the pure logic and the orchestration services.

pub mod curve;
pub mod graduation;
pub mod ids;
pub mod vault;

pub use curve::*;
pub use graduation::*;
pub use ids::*;
pub use vault::*;
