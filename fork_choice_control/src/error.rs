use core::time::Duration;
use std::sync::Arc;

use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("latest finalized state is missing from storage")]
    LatestFinalizedStateMissing,
    // The outcome of recovery is shared by every caller waiting for it, hence the `Arc`.
    #[error("store recovery failed: {error:?}")]
    RecoveryFailed { error: Arc<AnyhowError> },
    #[error("store recovery was shut down before it completed")]
    ShutDown,
    #[error("storage key has incorrect prefix: {key}")]
    IncorrectPrefix { key: String },
    #[error("storage did not respond to initial store request within {timeout:?}")]
    StorageRequestTimedOut { timeout: Duration },
    #[error("store is already initialized")]
    StoreAlreadyInitialized,
    #[error("store is not initialized")]
    StoreNotInitialized,
}

impl Error {
    /// The error that caused recovery to fail, if this is [`Error::RecoveryFailed`].
    #[must_use]
    pub fn recovery_cause(&self) -> Option<&AnyhowError> {
        match self {
            Self::RecoveryFailed { error } => Some(error),
            _ => None,
        }
    }
}
