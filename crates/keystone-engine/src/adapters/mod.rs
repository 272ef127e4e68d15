//! Adapters implementing the core ports

pub mod memory;

pub use memory::{InstantSettlement, MemoryStore, SimulatedLaunchExecutor};
