//! The in-memory fork choice [`Store`] and the diffs used to change it.
//!
//! A [`Store`] is created once per process, either from a trusted anchor state
//! ([`Store::genesis`], [`Store::from_anchor`]) or from a persisted [`StoreBuilder`].
//! After that it only changes by applying [`StoreUpdate`]s, each of which is validated in full
//! before any field is touched. Callers that share a store publish a new snapshot after each
//! successful update, so an update is never observed partially applied.
//!
//! Collections are persistent (`im`) so cloning a store to apply an update to it is cheap.

pub use crate::{
    block_provider::{BlockProvider, NullBlockProvider},
    error::Error,
    store::Store,
    store_builder::StoreBuilder,
    store_update::{FinalizedChainData, StoreUpdate, StoreUpdateBuilder},
};

mod block_provider;
mod error;
mod store;
mod store_builder;
mod store_update;
