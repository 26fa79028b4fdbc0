use std::sync::Arc;

use im::{HashMap, HashSet};
use types::{
    nonstandard::{SlotAndBlockRoot, VoteTracker},
    phase0::{
        beacon_state::BeaconState,
        containers::{Checkpoint, SignedBeaconBlock},
        primitives::{UnixSeconds, ValidatorIndex, H256},
    },
};

/// Everything that enters finalized storage in a single finalization event.
///
/// Which blocks and states belong here is decided by whoever runs fork choice. This is only the
/// payload.
#[derive(Clone, PartialEq, Debug)]
pub struct FinalizedChainData {
    pub finalized_checkpoint: Checkpoint,
    pub finalized_blocks: HashMap<H256, Arc<SignedBeaconBlock>>,
    pub finalized_states: HashMap<H256, Arc<BeaconState>>,
    // Child root to parent root for every block in `finalized_blocks`.
    pub finalized_child_to_parent: HashMap<H256, H256>,
    pub latest_finalized_state: Arc<BeaconState>,
}

/// An atomic diff of a [`Store`](crate::Store).
///
/// Mirrors the fields of the store except for `time`, which is derived from the clock rather than
/// persisted. Values are immutable once built and can be shared freely between threads.
#[derive(Clone, PartialEq, Default, Debug)]
pub struct StoreUpdate {
    genesis_time: Option<UnixSeconds>,
    finalized_chain_data: Option<FinalizedChainData>,
    justified_checkpoint: Option<Checkpoint>,
    best_justified_checkpoint: Option<Checkpoint>,
    added_hot_blocks: HashMap<H256, Arc<SignedBeaconBlock>>,
    deleted_hot_block_roots: HashSet<H256>,
    votes: HashMap<ValidatorIndex, VoteTracker>,
    state_roots: HashMap<H256, SlotAndBlockRoot>,
}

impl StoreUpdate {
    /// Callers that assemble updates incrementally should prefer [`StoreUpdateBuilder`], which
    /// keeps `added_hot_blocks` and `deleted_hot_block_roots` disjoint.
    #[expect(clippy::too_many_arguments)]
    #[must_use]
    pub const fn new(
        genesis_time: Option<UnixSeconds>,
        finalized_chain_data: Option<FinalizedChainData>,
        justified_checkpoint: Option<Checkpoint>,
        best_justified_checkpoint: Option<Checkpoint>,
        added_hot_blocks: HashMap<H256, Arc<SignedBeaconBlock>>,
        deleted_hot_block_roots: HashSet<H256>,
        votes: HashMap<ValidatorIndex, VoteTracker>,
        state_roots: HashMap<H256, SlotAndBlockRoot>,
    ) -> Self {
        Self {
            genesis_time,
            finalized_chain_data,
            justified_checkpoint,
            best_justified_checkpoint,
            added_hot_blocks,
            deleted_hot_block_roots,
            votes,
            state_roots,
        }
    }

    /// Whether applying or persisting this update would have no effect.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genesis_time.is_none()
            && self.finalized_chain_data.is_none()
            && self.justified_checkpoint.is_none()
            && self.best_justified_checkpoint.is_none()
            && self.added_hot_blocks.is_empty()
            && self.deleted_hot_block_roots.is_empty()
            && self.votes.is_empty()
            && self.state_roots.is_empty()
    }

    #[must_use]
    pub const fn genesis_time(&self) -> Option<UnixSeconds> {
        self.genesis_time
    }

    #[must_use]
    pub const fn finalized_chain_data(&self) -> Option<&FinalizedChainData> {
        self.finalized_chain_data.as_ref()
    }

    #[must_use]
    pub const fn justified_checkpoint(&self) -> Option<Checkpoint> {
        self.justified_checkpoint
    }

    #[must_use]
    pub const fn best_justified_checkpoint(&self) -> Option<Checkpoint> {
        self.best_justified_checkpoint
    }

    #[must_use]
    pub const fn added_hot_blocks(&self) -> &HashMap<H256, Arc<SignedBeaconBlock>> {
        &self.added_hot_blocks
    }

    #[must_use]
    pub const fn deleted_hot_block_roots(&self) -> &HashSet<H256> {
        &self.deleted_hot_block_roots
    }

    #[must_use]
    pub const fn votes(&self) -> &HashMap<ValidatorIndex, VoteTracker> {
        &self.votes
    }

    #[must_use]
    pub const fn state_roots(&self) -> &HashMap<H256, SlotAndBlockRoot> {
        &self.state_roots
    }

    // The projections below return owned maps. Cloning an `im` map only bumps a reference count.

    #[must_use]
    pub fn finalized_checkpoint(&self) -> Option<Checkpoint> {
        self.finalized_chain_data
            .as_ref()
            .map(|data| data.finalized_checkpoint)
    }

    #[must_use]
    pub fn finalized_blocks(&self) -> HashMap<H256, Arc<SignedBeaconBlock>> {
        self.finalized_chain_data
            .as_ref()
            .map(|data| data.finalized_blocks.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn finalized_states(&self) -> HashMap<H256, Arc<BeaconState>> {
        self.finalized_chain_data
            .as_ref()
            .map(|data| data.finalized_states.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn finalized_child_to_parent_map(&self) -> HashMap<H256, H256> {
        self.finalized_chain_data
            .as_ref()
            .map(|data| data.finalized_child_to_parent.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn latest_finalized_state(&self) -> Option<Arc<BeaconState>> {
        self.finalized_chain_data
            .as_ref()
            .map(|data| data.latest_finalized_state.clone())
    }

    /// Returns the first root that is both added and deleted, if any.
    #[must_use]
    pub fn root_added_and_deleted(&self) -> Option<H256> {
        self.deleted_hot_block_roots
            .iter()
            .find(|root| self.added_hot_blocks.contains_key(*root))
            .copied()
    }
}

/// Accumulates changes into a [`StoreUpdate`].
///
/// Adding a hot block cancels a pending deletion of the same root and vice versa.
/// Later writes to the same key replace earlier ones.
#[derive(Default)]
pub struct StoreUpdateBuilder {
    update: StoreUpdate,
}

impl StoreUpdateBuilder {
    pub fn genesis_time(&mut self, genesis_time: UnixSeconds) -> &mut Self {
        self.update.genesis_time = Some(genesis_time);
        self
    }

    pub fn justified_checkpoint(&mut self, checkpoint: Checkpoint) -> &mut Self {
        self.update.justified_checkpoint = Some(checkpoint);
        self
    }

    pub fn best_justified_checkpoint(&mut self, checkpoint: Checkpoint) -> &mut Self {
        self.update.best_justified_checkpoint = Some(checkpoint);
        self
    }

    pub fn finalize(&mut self, finalized_chain_data: FinalizedChainData) -> &mut Self {
        self.update.finalized_chain_data = Some(finalized_chain_data);
        self
    }

    pub fn add_hot_block(&mut self, block: Arc<SignedBeaconBlock>) -> &mut Self {
        let root = block.root();
        self.update.deleted_hot_block_roots.remove(&root);
        self.update.added_hot_blocks.insert(root, block);
        self
    }

    pub fn delete_hot_block(&mut self, root: H256) -> &mut Self {
        self.update.added_hot_blocks.remove(&root);
        self.update.deleted_hot_block_roots.insert(root);
        self
    }

    pub fn put_vote(&mut self, validator_index: ValidatorIndex, vote: VoteTracker) -> &mut Self {
        self.update.votes.insert(validator_index, vote);
        self
    }

    pub fn put_state_root(
        &mut self,
        state_root: H256,
        slot_and_block_root: SlotAndBlockRoot,
    ) -> &mut Self {
        self.update
            .state_roots
            .insert(state_root, slot_and_block_root);
        self
    }

    #[must_use]
    pub fn build(&mut self) -> StoreUpdate {
        core::mem::take(&mut self.update)
    }
}
