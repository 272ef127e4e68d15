//! Keystone Engine
//!
//! Orchestration layer for creator bonding curves: trading, the locked value
//! vault and the graduation state machine, wired against storage, settlement
//! and launch collaborators through the ports in [`core`].

pub mod adapters;
pub mod config;
pub mod core;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types
pub use config::{create_example_config, EngineConfig};
pub use crate::core::{EngineError, EngineResult};
pub use infrastructure::Engine;
pub use services::{CurveMarket, GraduationStateMachine, LockedValueVault};
