use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Error as AnyhowError, Result};
use fork_choice_store::{BlockProvider, Store, StoreBuilder};
use log::{debug, warn};
use parking_lot::Mutex;
use tokio::{
    select,
    sync::watch::{self, Receiver, Sender},
    time::error::Elapsed,
};
use types::{config::Config as ChainConfig, preset::Preset};

use crate::{
    error::Error,
    events::{EventChannels, LifecycleSubscription},
    recovery_config::{RecoveryConfig, RetryPolicy},
    status::InitializationStatus,
    storage::StorageQuery,
};

/// Where [`StoreRecoveryCoordinator`] is in the recovery protocol.
///
/// `Ready` and `Fatal` are terminal.
#[derive(Clone, Debug)]
pub enum RecoveryState<P: Preset> {
    Uninitialized,
    Requesting { attempt: u32 },
    Retrying { attempt: u32 },
    // `None` means storage had nothing persisted. Building an anchor is up to the caller.
    Ready(Option<Arc<Store<P>>>),
    Fatal(Arc<AnyhowError>),
}

impl<P: Preset> RecoveryState<P> {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Fatal(_))
    }

    fn outcome(&self) -> Option<Result<Option<Arc<Store<P>>>>> {
        match self {
            Self::Ready(store) => Some(Ok(store.clone())),
            Self::Fatal(error) => Some(Err(Error::RecoveryFailed {
                error: error.clone(),
            }
            .into())),
            _ => None,
        }
    }
}

/// Rebuilds the [`Store`] from storage at startup.
///
/// Storage requests that time out are retried according to the configured [`RetryPolicy`].
/// Any other failure is fatal. Recovery runs once, in a task spawned by the first call to
/// [`StoreRecoveryCoordinator::initialize`]. Every caller observes the same outcome.
pub struct StoreRecoveryCoordinator<P: Preset, S> {
    chain_config: Arc<ChainConfig>,
    recovery_config: RecoveryConfig,
    storage: Arc<S>,
    block_provider: Arc<dyn BlockProvider>,
    status: Arc<dyn InitializationStatus>,
    event_channels: Arc<EventChannels>,
    lifecycle_subscription: Mutex<Option<LifecycleSubscription>>,
    state_tx: Arc<Sender<RecoveryState<P>>>,
    shutdown_tx: Sender<bool>,
    started: AtomicBool,
}

impl<P: Preset, S: StorageQuery + 'static> StoreRecoveryCoordinator<P, S> {
    #[must_use]
    pub fn new(
        chain_config: Arc<ChainConfig>,
        recovery_config: RecoveryConfig,
        storage: Arc<S>,
        block_provider: Arc<dyn BlockProvider>,
        status: Arc<dyn InitializationStatus>,
        event_channels: Arc<EventChannels>,
    ) -> Self {
        let lifecycle_subscription = LifecycleSubscription::new(&event_channels);

        Self {
            chain_config,
            recovery_config,
            storage,
            block_provider,
            status,
            event_channels,
            lifecycle_subscription: Mutex::new(Some(lifecycle_subscription)),
            state_tx: Arc::new(watch::channel(RecoveryState::Uninitialized).0),
            shutdown_tx: watch::channel(false).0,
            started: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn state(&self) -> RecoveryState<P> {
        self.state_tx.borrow().clone()
    }

    #[must_use]
    pub const fn event_channels(&self) -> &Arc<EventChannels> {
        &self.event_channels
    }

    /// Hands out the lifecycle subscription made at construction. Returns `None` after the first
    /// call.
    pub fn take_lifecycle_subscription(&self) -> Option<LifecycleSubscription> {
        self.lifecycle_subscription.lock().take()
    }

    /// Starts recovery if it has not been started yet and waits for its outcome.
    pub async fn initialize(&self) -> Result<Option<Arc<Store<P>>>> {
        let mut state_rx = self.state_tx.subscribe();

        if !self.started.swap(true, Ordering::AcqRel) {
            tokio::spawn(self.recovery().supervise());
        }

        let state = state_rx.wait_for(RecoveryState::is_terminal).await?.clone();

        state
            .outcome()
            .ok_or(Error::StoreNotInitialized)?
    }

    /// Performs one request without retrying. A timeout is returned as
    /// [`Error::StorageRequestTimedOut`].
    ///
    /// Reports progress like [`StoreRecoveryCoordinator::initialize`] does, but does not affect
    /// the outcome observed through it.
    pub async fn initialize_single_attempt(&self) -> Result<Option<Arc<Store<P>>>> {
        self.recovery().run_single_attempt().await
    }

    /// Aborts recovery if it is still running. The outcome becomes [`Error::ShutDown`].
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    fn recovery(&self) -> Recovery<P, S> {
        Recovery {
            chain_config: self.chain_config.clone(),
            recovery_config: self.recovery_config,
            retry_policy: self.recovery_config.retry_policy(),
            storage: self.storage.clone(),
            block_provider: self.block_provider.clone(),
            status: self.status.clone(),
            state_tx: self.state_tx.clone(),
            shutdown_rx: self.shutdown_tx.subscribe(),
        }
    }
}

struct Recovery<P: Preset, S> {
    chain_config: Arc<ChainConfig>,
    recovery_config: RecoveryConfig,
    retry_policy: RetryPolicy,
    storage: Arc<S>,
    block_provider: Arc<dyn BlockProvider>,
    status: Arc<dyn InitializationStatus>,
    state_tx: Arc<Sender<RecoveryState<P>>>,
    shutdown_rx: Receiver<bool>,
}

impl<P: Preset, S: StorageQuery + 'static> Recovery<P, S> {
    // A panic in storage or in store construction must still end recovery.
    // Otherwise every caller of `initialize` would wait forever.
    async fn supervise(self) {
        let status = self.status.clone();
        let state_tx = self.state_tx.clone();

        if let Err(join_error) = tokio::spawn(self.run()).await {
            let error = AnyhowError::new(join_error).context("store recovery task failed");
            status.fatal_error_initializing(&error);
            state_tx.send_replace(RecoveryState::Fatal(Arc::new(error)));
        }
    }
}

impl<P: Preset, S: StorageQuery> Recovery<P, S> {
    async fn run(self) {
        self.status.begin_initializing();

        let mut shutdown_rx = self.shutdown_rx.clone();

        let result = select! {
            biased;

            _ = shutdown_rx.wait_for(|shut_down| *shut_down) => {
                Err(AnyhowError::from(Error::ShutDown))
            }
            result = self.request_with_retries() => result,
        };

        self.report(&result);

        let state = match result {
            Ok(store) => RecoveryState::Ready(store),
            Err(error) => RecoveryState::Fatal(Arc::new(error)),
        };

        self.state_tx.send_replace(state);
    }

    async fn run_single_attempt(&self) -> Result<Option<Arc<Store<P>>>> {
        self.status.begin_initializing();

        let timeout = self.recovery_config.storage_request_timeout;

        let result = match self.request().await {
            Ok(result) => result.and_then(|builder| self.materialize(builder)),
            Err(_) => Err(Error::StorageRequestTimedOut { timeout }.into()),
        };

        self.report(&result);

        result
    }

    fn report(&self, result: &Result<Option<Arc<Store<P>>>>) {
        match result {
            Ok(_) => self.status.finished_initializing(),
            Err(error) => self.status.fatal_error_initializing(error),
        }
    }

    async fn request_with_retries(&self) -> Result<Option<Arc<Store<P>>>> {
        let timeout = self.recovery_config.storage_request_timeout;
        let mut attempt = 1;

        loop {
            self.state_tx
                .send_replace(RecoveryState::Requesting { attempt });

            match self.request().await {
                Ok(result) => return self.materialize(result?),
                Err(_) if self.retry_policy.should_retry(attempt) => {
                    warn!(
                        "storage did not respond within {timeout:?} (attempt {attempt}), \
                         retrying in {:?}",
                        self.retry_policy.interval,
                    );

                    self.state_tx
                        .send_replace(RecoveryState::Retrying { attempt });

                    tokio::time::sleep(self.retry_policy.interval).await;

                    attempt += 1;
                }
                Err(_) => return Err(Error::StorageRequestTimedOut { timeout }.into()),
            }
        }
    }

    async fn request(&self) -> Result<Result<Option<StoreBuilder>>, Elapsed> {
        tokio::time::timeout(
            self.recovery_config.storage_request_timeout,
            self.storage.request_initial_store(),
        )
        .await
    }

    fn materialize(&self, builder: Option<StoreBuilder>) -> Result<Option<Arc<Store<P>>>> {
        let Some(builder) = builder else {
            debug!("storage has no persisted store");
            return Ok(None);
        };

        let store = builder
            .block_provider(self.block_provider.clone())
            .build(self.chain_config.clone())?;

        Ok(Some(Arc::new(store)))
    }
}
