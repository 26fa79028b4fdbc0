use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use types::phase0::{containers::SignedBeaconBlock, primitives::H256};

/// Looks up blocks that are not held in memory by a [`Store`](crate::Store).
///
/// Injected when a store is materialized. Storage implements this for blocks it has persisted.
#[async_trait]
pub trait BlockProvider: Send + Sync {
    async fn block(&self, block_root: H256) -> Result<Option<Arc<SignedBeaconBlock>>>;
}

/// A [`BlockProvider`] that knows no blocks.
#[derive(Clone, Copy, Default, Debug)]
pub struct NullBlockProvider;

#[async_trait]
impl BlockProvider for NullBlockProvider {
    async fn block(&self, _block_root: H256) -> Result<Option<Arc<SignedBeaconBlock>>> {
        Ok(None)
    }
}
