//! Shared ownership, persistence and recovery of the fork choice store.
//!
//! This crate handles the following concerns:
//! - [Publishing store snapshots and serializing writes](`ChainData`).
//! - [Persistence](`Storage`).
//! - [Rebuilding the store from storage at startup](`StoreRecoveryCoordinator`).
//! - Notifying other components of the application about reorganizations and finalization.

pub use crate::{
    chain_data::ChainData,
    error::Error,
    events::{
        ChainReorgEvent, Event, EventChannels, FinalizedCheckpointEvent, LifecycleSubscription,
        Topic, DEFAULT_MAX_EVENTS,
    },
    recovery::{RecoveryState, StoreRecoveryCoordinator},
    recovery_config::{RecoveryConfig, RetryPolicy, DEFAULT_STORAGE_REQUEST_TIMEOUT},
    status::{InitializationStatus, LoggingStatus},
    storage::{
        FinalizedBlockByRoot, FinalizedRootBySlot, FinalizedStateByRoot, HotBlockByRoot,
        SlotAndBlockRootByStateRoot, Storage, StorageQuery, StorageUpdateChannel,
        VoteByValidatorIndex,
    },
};

mod chain_data;
mod error;
mod events;
mod recovery;
mod recovery_config;
mod status;
mod storage;
