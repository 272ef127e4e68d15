//! # Keystone Core - Shared Curve Logic
//!
//! This crate contains the pure economic logic of the creator-curve engine,
//! shared by the orchestration services and any client that needs to quote
//! prices offline. It provides:
//!
//! - Share pricing, cumulative cost and fee allocation (`pricing`)
//! - Capability tiers and the dynamic per-wallet cap (`tiers`)
//! - The decaying activity score used for tie-breaks (`activity`)
//! - Snapshot and distribution math for graduation (`distribution`)
//! - Domain types for curves, holders, vault locks and launch records
//!
//! Nothing in here performs I/O. All monetary values are integer minor units.
//!
//! ## Feature Flags
//!
//! - `client`: Enables serde serialization for off-chain use (on by default)

// Re-export all modules
pub mod activity;
pub mod constants;
pub mod distribution;
pub mod errors;
pub mod math;
pub mod pricing;
pub mod tiers;
pub mod types;

// Re-export commonly used items
pub use activity::{rank_order, score_from_history, ActivityEvent, ActivityKind, ActivityParams, ActivityTracker};
pub use constants::*;
pub use distribution::{build_snapshot, compute_distribution};
pub use errors::{CoreResult, KeystoneCoreError};
pub use pricing::{BuyQuote, CurvePricingEngine, FeeSchedule, FeeSplit, PricingParams, ReferralRoute, SellQuote};
pub use tiers::{AccessTier, AccessTierResolver, Capabilities, TierThresholds, WalletCapParams};
pub use types::*;
