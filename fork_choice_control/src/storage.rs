use core::iter;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use database::{Database, PrefixableKey, WriteBatch};
use derive_more::Display;
use fork_choice_store::{BlockProvider, StoreBuilder, StoreUpdate};
use im::HashMap;
use itertools::Itertools as _;
use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use types::{
    nonstandard::{SlotAndBlockRoot, VoteTracker},
    phase0::{
        beacon_state::BeaconState,
        containers::{Checkpoint, SignedBeaconBlock},
        primitives::{Slot, UnixSeconds, ValidatorIndex, H256},
    },
};

use crate::error::Error;

const GENESIS_TIME_KEY: &str = "m_genesis_time";
const JUSTIFIED_CHECKPOINT_KEY: &str = "m_justified_checkpoint";
const BEST_JUSTIFIED_CHECKPOINT_KEY: &str = "m_best_justified_checkpoint";
const FINALIZED_CHECKPOINT_KEY: &str = "m_finalized_checkpoint";
const LATEST_FINALIZED_STATE_KEY: &str = "m_latest_finalized_state";

/// Loads the persisted store at startup.
#[async_trait]
pub trait StorageQuery: Send + Sync {
    /// Returns `None` if nothing has been persisted yet.
    async fn request_initial_store(&self) -> Result<Option<StoreBuilder>>;
}

/// Persists store updates as they are applied.
pub trait StorageUpdateChannel: Send + Sync {
    fn on_store_update(&self, update: &StoreUpdate) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    database: Arc<Database>,
}

impl Storage {
    #[must_use]
    pub fn new(database: Database) -> Self {
        Self {
            database: Arc::new(database),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Database::in_memory())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.database.is_empty()
    }

    /// Reads everything needed to rebuild the store.
    ///
    /// Returns `None` if genesis time was never written, which means no anchor was persisted.
    pub fn load_store_builder(&self) -> Result<Option<StoreBuilder>> {
        let Some(genesis_time) = self.get::<UnixSeconds>(GENESIS_TIME_KEY)? else {
            return Ok(None);
        };

        let latest_finalized_state = self
            .get::<BeaconState>(LATEST_FINALIZED_STATE_KEY)?
            .ok_or(Error::LatestFinalizedStateMissing)?;

        let mut builder = StoreBuilder::default()
            .genesis_time(genesis_time)
            .latest_finalized_state(Arc::new(latest_finalized_state))
            .hot_blocks(self.hot_blocks()?)
            .votes(self.votes()?);

        if let Some(checkpoint) = self.get::<Checkpoint>(JUSTIFIED_CHECKPOINT_KEY)? {
            builder = builder.justified_checkpoint(checkpoint);
        }

        if let Some(checkpoint) = self.get::<Checkpoint>(BEST_JUSTIFIED_CHECKPOINT_KEY)? {
            builder = builder.best_justified_checkpoint(checkpoint);
        }

        if let Some(checkpoint) = self.get::<Checkpoint>(FINALIZED_CHECKPOINT_KEY)? {
            builder = builder.finalized_checkpoint(checkpoint);

            if let Some(block) = self.finalized_block_by_root(checkpoint.root)? {
                builder = builder.finalized_block(block);
            }
        }

        Ok(Some(builder))
    }

    pub fn hot_block_by_root(&self, block_root: H256) -> Result<Option<Arc<SignedBeaconBlock>>> {
        self.get(HotBlockByRoot(block_root))
            .map(|block| block.map(Arc::new))
    }

    pub fn finalized_block_by_root(
        &self,
        block_root: H256,
    ) -> Result<Option<Arc<SignedBeaconBlock>>> {
        self.get(FinalizedBlockByRoot(block_root))
            .map(|block| block.map(Arc::new))
    }

    pub fn finalized_state_by_root(&self, block_root: H256) -> Result<Option<Arc<BeaconState>>> {
        self.get(FinalizedStateByRoot(block_root))
            .map(|state| state.map(Arc::new))
    }

    pub fn finalized_root_by_slot(&self, slot: Slot) -> Result<Option<H256>> {
        self.get(FinalizedRootBySlot(slot))
    }

    /// Finds the latest finalized block at or before `slot`.
    ///
    /// Skipped slots have no entry, so this returns the block that was canonical at `slot`.
    pub fn finalized_root_before_or_at_slot(&self, slot: Slot) -> Result<Option<SlotAndBlockRoot>> {
        let Some((key_bytes, value_bytes)) =
            self.database.prev(serialize_key(FinalizedRootBySlot(slot)))?
        else {
            return Ok(None);
        };

        if !FinalizedRootBySlot::has_prefix(&key_bytes) {
            return Ok(None);
        }

        let FinalizedRootBySlot(slot) = FinalizedRootBySlot::try_from(key_bytes.as_slice())?;
        let block_root = deserialize(&value_bytes)?;

        Ok(Some(SlotAndBlockRoot { slot, block_root }))
    }

    pub fn slot_and_block_root_by_state_root(
        &self,
        state_root: H256,
    ) -> Result<Option<SlotAndBlockRoot>> {
        self.get(SlotAndBlockRootByStateRoot(state_root))
    }

    fn hot_blocks(&self) -> Result<HashMap<H256, Arc<SignedBeaconBlock>>> {
        self.database
            .iterator_with_prefix(HotBlockByRoot::PREFIX)
            .map(|result| -> Result<_> {
                let (_, value_bytes) = result?;
                let block = Arc::new(deserialize::<SignedBeaconBlock>(&value_bytes)?);
                Ok((block.root(), block))
            })
            .try_collect()
    }

    fn votes(&self) -> Result<HashMap<ValidatorIndex, VoteTracker>> {
        self.database
            .iterator_with_prefix(VoteByValidatorIndex::PREFIX)
            .map(|result| -> Result<_> {
                let (key_bytes, value_bytes) = result?;
                let VoteByValidatorIndex(validator_index) =
                    VoteByValidatorIndex::try_from(key_bytes.as_slice())?;
                Ok((validator_index, deserialize(&value_bytes)?))
            })
            .try_collect()
    }

    fn get<V: DeserializeOwned>(&self, key: impl core::fmt::Display) -> Result<Option<V>> {
        self.database
            .get(serialize_key(key))?
            .map(|value_bytes| deserialize(&value_bytes))
            .transpose()
    }
}

#[async_trait]
impl StorageQuery for Storage {
    async fn request_initial_store(&self) -> Result<Option<StoreBuilder>> {
        self.load_store_builder()
            .context("failed to load fork choice store from storage")
    }
}

impl StorageUpdateChannel for Storage {
    fn on_store_update(&self, update: &StoreUpdate) -> Result<()> {
        let batch = write_batch(update)?;

        if batch.is_empty() {
            return Ok(());
        }

        self.database.write(batch)
    }
}

#[async_trait]
impl BlockProvider for Storage {
    async fn block(&self, block_root: H256) -> Result<Option<Arc<SignedBeaconBlock>>> {
        if let Some(block) = self.hot_block_by_root(block_root)? {
            return Ok(Some(block));
        }

        self.finalized_block_by_root(block_root)
    }
}

fn write_batch(update: &StoreUpdate) -> Result<WriteBatch> {
    let mut batch = WriteBatch::default();

    if let Some(genesis_time) = update.genesis_time() {
        batch.put(serialize_key(GENESIS_TIME_KEY), serialize(genesis_time)?);
    }

    if let Some(checkpoint) = update.justified_checkpoint() {
        batch.put(serialize_key(JUSTIFIED_CHECKPOINT_KEY), serialize(checkpoint)?);
    }

    if let Some(checkpoint) = update.best_justified_checkpoint() {
        batch.put(
            serialize_key(BEST_JUSTIFIED_CHECKPOINT_KEY),
            serialize(checkpoint)?,
        );
    }

    if let Some(data) = update.finalized_chain_data() {
        let checkpoint = data.finalized_checkpoint;

        batch.put(serialize_key(FINALIZED_CHECKPOINT_KEY), serialize(checkpoint)?);

        batch.put(
            serialize_key(LATEST_FINALIZED_STATE_KEY),
            serialize(&*data.latest_finalized_state)?,
        );

        for (block_root, block) in &data.finalized_blocks {
            batch.put(
                serialize_key(FinalizedBlockByRoot(*block_root)),
                serialize(&**block)?,
            );

            batch.delete(serialize_key(HotBlockByRoot(*block_root)));
        }

        for (block_root, state) in &data.finalized_states {
            batch.put(
                serialize_key(FinalizedStateByRoot(*block_root)),
                serialize(&**state)?,
            );
        }

        // Walk from the finalized block to its ancestors. Blocks on forks that were pruned are
        // not reachable this way and do not get a slot entry.
        let canonical_roots = iter::successors(Some(checkpoint.root), |child_root| {
            data.finalized_child_to_parent.get(child_root).copied()
        })
        .take(data.finalized_blocks.len());

        for block_root in canonical_roots {
            let Some(block) = data.finalized_blocks.get(&block_root) else {
                break;
            };

            batch.put(
                serialize_key(FinalizedRootBySlot(block.message.slot)),
                serialize(block_root)?,
            );
        }
    }

    for (block_root, block) in update.added_hot_blocks() {
        batch.put(
            serialize_key(HotBlockByRoot(*block_root)),
            serialize(&**block)?,
        );
    }

    for block_root in update.deleted_hot_block_roots() {
        batch.delete(serialize_key(HotBlockByRoot(*block_root)));
    }

    for (validator_index, vote) in update.votes() {
        batch.put(
            serialize_key(VoteByValidatorIndex(*validator_index)),
            serialize(vote)?,
        );
    }

    for (state_root, slot_and_block_root) in update.state_roots() {
        batch.put(
            serialize_key(SlotAndBlockRootByStateRoot(*state_root)),
            serialize(slot_and_block_root)?,
        );
    }

    debug!(
        "persisting store update (added hot blocks: {}, deleted hot blocks: {}, votes: {}, \
         finalized: {:?})",
        update.added_hot_blocks().len(),
        update.deleted_hot_block_roots().len(),
        update.votes().len(),
        update.finalized_checkpoint(),
    );

    Ok(batch)
}

#[derive(Display)]
#[display("{}{_0:x}", Self::PREFIX)]
pub struct HotBlockByRoot(pub H256);

impl PrefixableKey for HotBlockByRoot {
    const PREFIX: &'static str = "h";
}

#[derive(Display)]
#[display("{}{_0:x}", Self::PREFIX)]
pub struct FinalizedBlockByRoot(pub H256);

impl PrefixableKey for FinalizedBlockByRoot {
    const PREFIX: &'static str = "f";
}

#[derive(Display)]
#[display("{}{_0:x}", Self::PREFIX)]
pub struct FinalizedStateByRoot(pub H256);

impl PrefixableKey for FinalizedStateByRoot {
    const PREFIX: &'static str = "s";
}

#[derive(Display)]
#[display("{}{_0:020}", Self::PREFIX)]
pub struct FinalizedRootBySlot(pub Slot);

impl PrefixableKey for FinalizedRootBySlot {
    const PREFIX: &'static str = "r";
}

impl TryFrom<&[u8]> for FinalizedRootBySlot {
    type Error = anyhow::Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        parse_numeric_key::<Self>(bytes).map(Self)
    }
}

#[derive(Display)]
#[display("{}{_0:020}", Self::PREFIX)]
pub struct VoteByValidatorIndex(pub ValidatorIndex);

impl TryFrom<&[u8]> for VoteByValidatorIndex {
    type Error = anyhow::Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        parse_numeric_key::<Self>(bytes).map(Self)
    }
}

impl PrefixableKey for VoteByValidatorIndex {
    const PREFIX: &'static str = "v";
}

#[derive(Display)]
#[display("{}{_0:x}", Self::PREFIX)]
pub struct SlotAndBlockRootByStateRoot(pub H256);

impl PrefixableKey for SlotAndBlockRootByStateRoot {
    const PREFIX: &'static str = "t";
}

fn parse_numeric_key<K: PrefixableKey>(bytes: &[u8]) -> Result<u64> {
    let payload = bytes
        .strip_prefix(K::PREFIX.as_bytes())
        .ok_or_else(|| Error::IncorrectPrefix {
            key: String::from_utf8_lossy(bytes).into_owned(),
        })?;

    core::str::from_utf8(payload)?.parse().map_err(Into::into)
}

fn serialize_key(key: impl core::fmt::Display) -> String {
    key.to_string()
}

fn serialize(value: impl Serialize) -> Result<Vec<u8>> {
    bincode::serialize(&value).map_err(Into::into)
}

fn deserialize<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    bincode::deserialize(bytes).map_err(Into::into)
}
