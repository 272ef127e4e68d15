//! Centralized error types for the engine services

use std::time::Duration;

use keystone_core::{CurveId, KeystoneCoreError, LockId};
use thiserror::Error;

use super::types::SettlementReceipt;

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Curve rule violated: {0}")]
    Core(#[from] KeystoneCoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid {parameter} = {value}: expected {expected}")]
    InvalidConfig {
        parameter: String,
        value: String,
        expected: String,
    },

    #[error("Curve not found: {0}")]
    CurveNotFound(CurveId),

    #[error("Vault lock not found: {0}")]
    LockNotFound(LockId),

    #[error("User {user_id} already holds an open lock for {correlation_id}")]
    DuplicateLock { user_id: String, correlation_id: String },

    #[error("Curve {0} already launched")]
    AlreadyLaunched(CurveId),

    #[error("Curve {curve_id} not eligible for launch: {reason}")]
    NotEligible { curve_id: CurveId, reason: String },

    #[error("Launch of curve {curve_id} failed (retryable: {retryable}): {reason}")]
    LaunchFailed {
        curve_id: CurveId,
        reason: String,
        retryable: bool,
    },

    #[error("Settlement {} confirmed but ledger commit failed; needs reconciliation", receipt.settlement_id)]
    SettlementOrphaned { receipt: SettlementReceipt },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Storage-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Version conflict on {entity}: expected {expected}, found {actual}")]
    VersionConflict {
        entity: String,
        expected: u64,
        actual: u64,
    },

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Record missing: {0}")]
    Missing(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Errors reported by settlement and launch collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The request never left this process; safe to retry as new
    #[error("Request was not dispatched: {0}")]
    NotDispatched(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Create an invalid configuration parameter error
    pub fn invalid_parameter(parameter: &str, value: &str, expected: &str) -> Self {
        Self::InvalidConfig {
            parameter: parameter.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Whether the same call may succeed if repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Storage(StorageError::VersionConflict { .. }) => true,
            EngineError::Storage(StorageError::Backend(_)) => true,
            EngineError::Collaborator(err) => err.is_retryable(),
            EngineError::LaunchFailed { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Core rule violation, if this is one
    pub fn as_core(&self) -> Option<&KeystoneCoreError> {
        match self {
            EngineError::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl StorageError {
    pub fn version_conflict(entity: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::VersionConflict {
            entity: entity.into(),
            expected,
            actual,
        }
    }
}

impl CollaboratorError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CollaboratorError::Rejected(_))
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let conflict: EngineError = StorageError::version_conflict("curve", 1, 2).into();
        assert!(conflict.is_retryable());

        let rejected: EngineError = CollaboratorError::Rejected("no".into()).into();
        assert!(!rejected.is_retryable());

        let timeout: EngineError = CollaboratorError::Timeout(Duration::from_secs(1)).into();
        assert!(timeout.is_retryable());

        let core: EngineError = KeystoneCoreError::InvalidAmount.into();
        assert!(!core.is_retryable());
        assert_eq!(core.as_core(), Some(&KeystoneCoreError::InvalidAmount));
    }

    #[test]
    fn test_invalid_parameter_message() {
        let err = EngineError::invalid_parameter("max_retries", "0", "greater than 0");
        assert_eq!(err.to_string(), "Invalid max_retries = 0: expected greater than 0");
    }
}
