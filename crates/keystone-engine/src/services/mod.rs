//! Engine services
//!
//! - `market`: buy and sell against a curve
//! - `vault`: escrow locks with a single terminal outcome
//! - `graduation`: freeze, snapshot, distribution and launch

pub mod graduation;
pub mod market;
pub mod vault;

pub use graduation::GraduationStateMachine;
pub use market::CurveMarket;
pub use vault::LockedValueVault;
