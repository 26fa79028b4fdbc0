use anyhow::Error as AnyhowError;
use log::{error, info};

/// Receives progress notifications from store recovery.
pub trait InitializationStatus: Send + Sync {
    fn begin_initializing(&self);

    fn finished_initializing(&self);

    fn fatal_error_initializing(&self, error: &AnyhowError);
}

#[derive(Clone, Copy, Default, Debug)]
pub struct LoggingStatus;

impl InitializationStatus for LoggingStatus {
    fn begin_initializing(&self) {
        info!("loading fork choice store from storage…");
    }

    fn finished_initializing(&self) {
        info!("fork choice store loaded");
    }

    fn fatal_error_initializing(&self, error: &AnyhowError) {
        error!("failed to load fork choice store: {error:?}");
    }
}
