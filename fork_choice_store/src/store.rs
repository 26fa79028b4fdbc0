use core::marker::PhantomData;
use std::sync::Arc;

use anyhow::{ensure, Result};
use derivative::Derivative;
use helper_functions::{accessors, misc};
use im::{hashmap, HashMap};
use log::debug;
use types::{
    config::Config as ChainConfig,
    nonstandard::{SlotAndBlockRoot, VoteTracker},
    phase0::{
        beacon_state::BeaconState,
        consts::GENESIS_SLOT,
        containers::{BeaconBlock, Checkpoint, SignedBeaconBlock},
        primitives::{Epoch, SignatureBytes, Slot, UnixSeconds, ValidatorIndex, H256},
    },
    preset::Preset,
    traits::HashTreeRoot as _,
};

use crate::{
    block_provider::{BlockProvider, NullBlockProvider},
    error::Error,
    store_update::{FinalizedChainData, StoreUpdate},
};

/// The in-memory view of fork choice state.
///
/// Checkpoints are optional. A store with no checkpoints is a legitimate value that has not been
/// anchored yet (see [`Store::empty`]). Every store built from an anchor or restored from storage
/// has all three.
#[derive(Clone, Derivative)]
#[derivative(Debug(bound = ""))]
pub struct Store<P: Preset> {
    #[derivative(Debug = "ignore")]
    chain_config: Arc<ChainConfig>,
    genesis_time: UnixSeconds,
    // Wall-clock time in seconds. Updated by ticks. Never moves backwards.
    time: UnixSeconds,
    justified_checkpoint: Option<Checkpoint>,
    finalized_checkpoint: Option<Checkpoint>,
    best_justified_checkpoint: Option<Checkpoint>,
    blocks: HashMap<H256, Arc<SignedBeaconBlock>>,
    #[derivative(Debug = "ignore")]
    block_states: HashMap<H256, Arc<BeaconState>>,
    #[derivative(Debug = "ignore")]
    checkpoint_states: HashMap<Checkpoint, Arc<BeaconState>>,
    votes: HashMap<ValidatorIndex, VoteTracker>,
    #[derivative(Debug = "ignore")]
    block_provider: Arc<dyn BlockProvider>,
    #[derivative(Debug = "ignore")]
    phantom: PhantomData<P>,
}

impl<P: Preset> Store<P> {
    /// Creates a store with no anchor, no entries and all times set to zero.
    #[must_use]
    pub fn empty(chain_config: Arc<ChainConfig>, block_provider: Arc<dyn BlockProvider>) -> Self {
        Self {
            chain_config,
            genesis_time: 0,
            time: 0,
            justified_checkpoint: None,
            finalized_checkpoint: None,
            best_justified_checkpoint: None,
            blocks: HashMap::new(),
            block_states: HashMap::new(),
            checkpoint_states: HashMap::new(),
            votes: HashMap::new(),
            block_provider,
            phantom: PhantomData,
        }
    }

    /// Creates a store anchored at a genesis state.
    ///
    /// Fails if `genesis_state` is not at [`GENESIS_SLOT`]. Nothing is built in that case.
    pub fn genesis(
        chain_config: Arc<ChainConfig>,
        genesis_state: Arc<BeaconState>,
    ) -> Result<Self> {
        ensure!(
            genesis_state.slot == GENESIS_SLOT,
            Error::GenesisStateHasInvalidSlot {
                slot: genesis_state.slot,
            },
        );

        Ok(Self::from_anchor(chain_config, genesis_state))
    }

    /// Creates a store anchored at an arbitrary trusted state, such as one obtained through
    /// checkpoint sync.
    ///
    /// The state is trusted as is. The anchor block is reconstructed from it and is not signed.
    #[must_use]
    pub fn from_anchor(chain_config: Arc<ChainConfig>, anchor_state: Arc<BeaconState>) -> Self {
        let anchor_block = Arc::new(Self::anchor_block(&anchor_state));
        let anchor_root = anchor_block.root();
        let anchor_epoch = accessors::get_current_epoch::<P>(&anchor_state);

        // If `anchor_state` is a genesis state, this checkpoint differs from the ones inside it.
        // All checkpoints in a genesis state have their `root` set to 0x00…00.
        let checkpoint = Checkpoint {
            epoch: anchor_epoch,
            root: anchor_root,
        };

        let genesis_time = anchor_state.genesis_time;
        let time = misc::compute_timestamp_at_slot(&chain_config, genesis_time, anchor_state.slot);

        debug!(
            "anchoring store (slot: {}, epoch: {anchor_epoch}, root: {anchor_root:?})",
            anchor_state.slot,
        );

        Self {
            chain_config,
            genesis_time,
            time,
            justified_checkpoint: Some(checkpoint),
            finalized_checkpoint: Some(checkpoint),
            best_justified_checkpoint: Some(checkpoint),
            blocks: HashMap::unit(anchor_root, anchor_block),
            block_states: HashMap::unit(anchor_root, anchor_state.clone()),
            checkpoint_states: HashMap::unit(checkpoint, anchor_state),
            votes: HashMap::new(),
            block_provider: Arc::new(NullBlockProvider),
            phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn with_block_provider(self, block_provider: Arc<dyn BlockProvider>) -> Self {
        Self {
            block_provider,
            ..self
        }
    }

    /// Builds the block whose state root commits to `anchor_state`.
    #[must_use]
    pub fn anchor_block(anchor_state: &BeaconState) -> SignedBeaconBlock {
        BeaconBlock {
            slot: anchor_state.slot,
            state_root: anchor_state.hash_tree_root(),
            ..BeaconBlock::default()
        }
        .with_signature(SignatureBytes::empty())
    }

    /// Assembles a store restored from storage.
    ///
    /// Validation is left to [`StoreBuilder::build`](crate::StoreBuilder::build).
    #[expect(clippy::too_many_arguments)]
    pub(crate) fn restore(
        chain_config: Arc<ChainConfig>,
        block_provider: Arc<dyn BlockProvider>,
        genesis_time: UnixSeconds,
        time: UnixSeconds,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        best_justified_checkpoint: Checkpoint,
        blocks: HashMap<H256, Arc<SignedBeaconBlock>>,
        latest_finalized_state: Arc<BeaconState>,
        votes: HashMap<ValidatorIndex, VoteTracker>,
    ) -> Self {
        Self {
            chain_config,
            genesis_time,
            time,
            justified_checkpoint: Some(justified_checkpoint),
            finalized_checkpoint: Some(finalized_checkpoint),
            best_justified_checkpoint: Some(best_justified_checkpoint),
            blocks,
            block_states: HashMap::unit(finalized_checkpoint.root, latest_finalized_state.clone()),
            checkpoint_states: HashMap::unit(finalized_checkpoint, latest_finalized_state),
            votes,
            block_provider,
            phantom: PhantomData,
        }
    }

    /// The update that persists this store's finalized anchor together with its checkpoints.
    ///
    /// Writing it to empty storage makes the store recoverable.
    pub fn anchor_update(&self) -> Result<StoreUpdate> {
        let finalized_checkpoint = self.finalized_checkpoint.ok_or(Error::StoreNotAnchored)?;
        let root = finalized_checkpoint.root;

        let block = self
            .blocks
            .get(&root)
            .cloned()
            .ok_or(Error::StoreNotAnchored)?;

        let state = self
            .checkpoint_states
            .get(&finalized_checkpoint)
            .cloned()
            .ok_or(Error::StoreNotAnchored)?;

        let slot_and_block_root = SlotAndBlockRoot {
            slot: state.slot,
            block_root: root,
        };

        let finalized_chain_data = FinalizedChainData {
            finalized_checkpoint,
            finalized_blocks: hashmap! { root => block.clone() },
            finalized_states: hashmap! { root => state.clone() },
            finalized_child_to_parent: hashmap! { root => block.message.parent_root },
            latest_finalized_state: state,
        };

        Ok(StoreUpdate::new(
            Some(self.genesis_time),
            Some(finalized_chain_data),
            self.justified_checkpoint,
            self.best_justified_checkpoint,
            HashMap::new(),
            im::HashSet::new(),
            self.votes.clone(),
            hashmap! { block.message.state_root => slot_and_block_root },
        ))
    }

    /// Applies `update` as a whole or not at all.
    ///
    /// The update is validated before any field is changed:
    /// - no root may be both added and deleted;
    /// - the resulting checkpoints must satisfy
    ///   `best_justified.epoch >= justified.epoch >= finalized.epoch`.
    ///
    /// `state_roots` only matters to storage and is not kept in memory.
    pub fn apply_update(&mut self, update: &StoreUpdate) -> Result<()> {
        if let Some(root) = update.root_added_and_deleted() {
            return Err(Error::HotBlockAddedAndDeleted { root }.into());
        }

        let justified_checkpoint = update.justified_checkpoint().or(self.justified_checkpoint);
        let finalized_checkpoint = update.finalized_checkpoint().or(self.finalized_checkpoint);
        let best_justified_checkpoint = update
            .best_justified_checkpoint()
            .or(self.best_justified_checkpoint);

        validate_checkpoints(
            justified_checkpoint,
            finalized_checkpoint,
            best_justified_checkpoint,
        )?;

        if let Some(genesis_time) = update.genesis_time() {
            self.genesis_time = genesis_time;
        }

        self.justified_checkpoint = justified_checkpoint;
        self.finalized_checkpoint = finalized_checkpoint;
        self.best_justified_checkpoint = best_justified_checkpoint;

        for (root, block) in update.added_hot_blocks() {
            self.blocks.insert(*root, block.clone());
        }

        for root in update.deleted_hot_block_roots() {
            self.blocks.remove(root);
            self.block_states.remove(root);
        }

        // The finalized block stays in memory as the new anchor of the hot chain.
        // Older finalized blocks are left to storage.
        if let Some(data) = update.finalized_chain_data() {
            let checkpoint = data.finalized_checkpoint;

            for root in data.finalized_blocks.keys() {
                if *root != checkpoint.root {
                    self.blocks.remove(root);
                    self.block_states.remove(root);
                }
            }

            if let Some(block) = data.finalized_blocks.get(&checkpoint.root) {
                self.blocks.insert(checkpoint.root, block.clone());
            }

            self.block_states
                .insert(checkpoint.root, data.latest_finalized_state.clone());

            self.checkpoint_states
                .insert(checkpoint, data.latest_finalized_state.clone());

            self.checkpoint_states
                .retain(|retained, _| retained.epoch >= checkpoint.epoch);
        }

        for (validator_index, vote) in update.votes() {
            self.votes.insert(*validator_index, *vote);
        }

        Ok(())
    }

    /// Advances the store clock. Ticks older than the current time are ignored.
    pub fn apply_tick(&mut self, time: UnixSeconds) -> bool {
        if time <= self.time {
            return false;
        }

        self.time = time;
        true
    }

    /// Returns the block with `block_root` from memory, falling back to the block provider.
    pub async fn retrieve_block(&self, block_root: H256) -> Result<Option<Arc<SignedBeaconBlock>>> {
        if let Some(block) = self.blocks.get(&block_root) {
            return Ok(Some(block.clone()));
        }

        self.block_provider.block(block_root).await
    }

    #[must_use]
    pub const fn chain_config(&self) -> &Arc<ChainConfig> {
        &self.chain_config
    }

    #[must_use]
    pub const fn genesis_time(&self) -> UnixSeconds {
        self.genesis_time
    }

    #[must_use]
    pub const fn time(&self) -> UnixSeconds {
        self.time
    }

    #[must_use]
    pub fn current_slot(&self) -> Slot {
        misc::compute_slot_at_timestamp(&self.chain_config, self.genesis_time, self.time)
            .unwrap_or(GENESIS_SLOT)
    }

    #[must_use]
    pub fn current_epoch(&self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(self.current_slot())
    }

    #[must_use]
    pub const fn justified_checkpoint(&self) -> Option<Checkpoint> {
        self.justified_checkpoint
    }

    #[must_use]
    pub const fn finalized_checkpoint(&self) -> Option<Checkpoint> {
        self.finalized_checkpoint
    }

    #[must_use]
    pub const fn best_justified_checkpoint(&self) -> Option<Checkpoint> {
        self.best_justified_checkpoint
    }

    #[must_use]
    pub fn block(&self, block_root: H256) -> Option<&Arc<SignedBeaconBlock>> {
        self.blocks.get(&block_root)
    }

    #[must_use]
    pub fn contains_block(&self, block_root: H256) -> bool {
        self.blocks.contains_key(&block_root)
    }

    #[must_use]
    pub fn block_state(&self, block_root: H256) -> Option<&Arc<BeaconState>> {
        self.block_states.get(&block_root)
    }

    #[must_use]
    pub fn checkpoint_state(&self, checkpoint: Checkpoint) -> Option<&Arc<BeaconState>> {
        self.checkpoint_states.get(&checkpoint)
    }

    #[must_use]
    pub fn vote(&self, validator_index: ValidatorIndex) -> Option<VoteTracker> {
        self.votes.get(&validator_index).copied()
    }

    #[must_use]
    pub const fn blocks(&self) -> &HashMap<H256, Arc<SignedBeaconBlock>> {
        &self.blocks
    }

    #[must_use]
    pub const fn block_states(&self) -> &HashMap<H256, Arc<BeaconState>> {
        &self.block_states
    }

    #[must_use]
    pub const fn checkpoint_states(&self) -> &HashMap<Checkpoint, Arc<BeaconState>> {
        &self.checkpoint_states
    }

    #[must_use]
    pub const fn votes(&self) -> &HashMap<ValidatorIndex, VoteTracker> {
        &self.votes
    }

    #[must_use]
    pub const fn block_provider(&self) -> &Arc<dyn BlockProvider> {
        &self.block_provider
    }
}

pub(crate) fn validate_checkpoints(
    justified_checkpoint: Option<Checkpoint>,
    finalized_checkpoint: Option<Checkpoint>,
    best_justified_checkpoint: Option<Checkpoint>,
) -> Result<()> {
    if let (Some(justified), Some(finalized)) = (justified_checkpoint, finalized_checkpoint) {
        ensure!(
            justified.epoch >= finalized.epoch,
            Error::JustifiedBeforeFinalized {
                justified,
                finalized,
            },
        );
    }

    if let (Some(best_justified), Some(justified)) =
        (best_justified_checkpoint, justified_checkpoint)
    {
        ensure!(
            best_justified.epoch >= justified.epoch,
            Error::BestJustifiedBeforeJustified {
                best_justified,
                justified,
            },
        );
    }

    Ok(())
}
