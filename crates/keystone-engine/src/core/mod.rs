//! Core engine abstractions and types
//!
//! Error taxonomy, collaborator ports and the request types they exchange.
//! Nothing in here depends on a particular storage or settlement backend.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{CollaboratorError, EngineError, EngineResult, StorageError};
pub use traits::{CurveRepository, LaunchExecutor, SettlementGateway, VaultRepository};
pub use types::{
    HolderAccess, LaunchEligibility, LaunchExecution, LaunchParams, LaunchRequest, LockQuery, SettlementReceipt,
    SettlementRequest, TradeReceipt, TradeSide,
};
