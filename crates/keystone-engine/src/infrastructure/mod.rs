//! Infrastructure: concurrency helpers and dependency wiring

pub mod keyed_lock;
pub mod retry;
pub mod service_container;

pub use keyed_lock::KeyedLocks;
pub use retry::retry_on_conflict;
pub use service_container::Engine;
