use std::sync::Arc;

use anyhow::{ensure, Result};
use im::HashMap;
use log::info;
use types::{
    config::Config as ChainConfig,
    nonstandard::VoteTracker,
    phase0::{
        beacon_state::BeaconState,
        containers::{Checkpoint, SignedBeaconBlock},
        primitives::{UnixSeconds, ValidatorIndex, H256},
    },
    preset::Preset,
};

use crate::{
    block_provider::{BlockProvider, NullBlockProvider},
    error::Error,
    store::{validate_checkpoints, Store},
};

/// A [`Store`] as loaded from storage, before it has a block provider and a chain config.
///
/// Every field except the block provider is required. Missing fields are reported by
/// [`StoreBuilder::build`] rather than by the setters, so storage can fill the builder in any
/// order.
#[derive(Default)]
pub struct StoreBuilder {
    genesis_time: Option<UnixSeconds>,
    justified_checkpoint: Option<Checkpoint>,
    finalized_checkpoint: Option<Checkpoint>,
    best_justified_checkpoint: Option<Checkpoint>,
    hot_blocks: HashMap<H256, Arc<SignedBeaconBlock>>,
    votes: HashMap<ValidatorIndex, VoteTracker>,
    finalized_block: Option<Arc<SignedBeaconBlock>>,
    latest_finalized_state: Option<Arc<BeaconState>>,
    block_provider: Option<Arc<dyn BlockProvider>>,
}

impl StoreBuilder {
    #[must_use]
    pub fn genesis_time(mut self, genesis_time: UnixSeconds) -> Self {
        self.genesis_time = Some(genesis_time);
        self
    }

    #[must_use]
    pub fn justified_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.justified_checkpoint = Some(checkpoint);
        self
    }

    #[must_use]
    pub fn finalized_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.finalized_checkpoint = Some(checkpoint);
        self
    }

    #[must_use]
    pub fn best_justified_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.best_justified_checkpoint = Some(checkpoint);
        self
    }

    #[must_use]
    pub fn hot_blocks(mut self, hot_blocks: HashMap<H256, Arc<SignedBeaconBlock>>) -> Self {
        self.hot_blocks = hot_blocks;
        self
    }

    #[must_use]
    pub fn votes(mut self, votes: HashMap<ValidatorIndex, VoteTracker>) -> Self {
        self.votes = votes;
        self
    }

    #[must_use]
    pub fn finalized_block(mut self, block: Arc<SignedBeaconBlock>) -> Self {
        self.finalized_block = Some(block);
        self
    }

    #[must_use]
    pub fn latest_finalized_state(mut self, state: Arc<BeaconState>) -> Self {
        self.latest_finalized_state = Some(state);
        self
    }

    /// Sets the source of blocks that are not kept in memory.
    ///
    /// Defaults to [`NullBlockProvider`].
    #[must_use]
    pub fn block_provider(mut self, block_provider: Arc<dyn BlockProvider>) -> Self {
        self.block_provider = Some(block_provider);
        self
    }

    #[must_use]
    pub const fn has_block_provider(&self) -> bool {
        self.block_provider.is_some()
    }

    /// Completes the store.
    ///
    /// The clock is set to the start of the latest finalized slot. It catches up on the next tick.
    pub fn build<P: Preset>(self, chain_config: Arc<ChainConfig>) -> Result<Store<P>> {
        ensure!(
            chain_config.preset_base == P::NAME,
            Error::PresetMismatch {
                config_preset: chain_config.preset_base,
                store_preset: P::NAME,
            },
        );

        let Self {
            genesis_time,
            justified_checkpoint,
            finalized_checkpoint,
            best_justified_checkpoint,
            mut hot_blocks,
            votes,
            finalized_block,
            latest_finalized_state,
            block_provider,
        } = self;

        let genesis_time = require(genesis_time, "genesis_time")?;
        let justified_checkpoint = require(justified_checkpoint, "justified_checkpoint")?;
        let finalized_checkpoint = require(finalized_checkpoint, "finalized_checkpoint")?;
        let best_justified_checkpoint =
            require(best_justified_checkpoint, "best_justified_checkpoint")?;
        let latest_finalized_state = require(latest_finalized_state, "latest_finalized_state")?;

        validate_checkpoints(
            Some(justified_checkpoint),
            Some(finalized_checkpoint),
            Some(best_justified_checkpoint),
        )?;

        let finalized_block = finalized_block
            .filter(|block| block.root() == finalized_checkpoint.root)
            .ok_or(Error::FinalizedBlockMissing {
                checkpoint: finalized_checkpoint,
            })?;

        hot_blocks.insert(finalized_checkpoint.root, finalized_block);

        let time = helper_functions::misc::compute_timestamp_at_slot(
            &chain_config,
            genesis_time,
            latest_finalized_state.slot,
        );

        info!(
            "restored store from storage \
             (finalized: {finalized_checkpoint:?}, hot blocks: {}, votes: {})",
            hot_blocks.len() - 1,
            votes.len(),
        );

        Ok(Store::restore(
            chain_config,
            block_provider.unwrap_or_else(|| Arc::new(NullBlockProvider)),
            genesis_time,
            time,
            justified_checkpoint,
            finalized_checkpoint,
            best_justified_checkpoint,
            hot_blocks,
            latest_finalized_state,
            votes,
        ))
    }
}

fn require<T>(value: Option<T>, field: &'static str) -> Result<T> {
    value.ok_or_else(|| Error::StoreBuilderMissingField { field }.into())
}

#[cfg(test)]
mod tests {
    use im::hashmap;
    use types::{
        phase0::{containers::BeaconBlock, primitives::SignatureBytes},
        preset::{Minimal, PresetName},
    };

    use super::*;

    fn chain_config() -> Arc<ChainConfig> {
        Arc::new(ChainConfig::minimal())
    }

    fn complete_builder() -> (StoreBuilder, Checkpoint) {
        let state = Arc::new(BeaconState {
            genesis_time: 500,
            slot: 24,
            ..BeaconState::default()
        });

        let finalized_block = Arc::new(Store::<Minimal>::anchor_block(&state));
        let finalized_root = finalized_block.root();

        let hot_block = Arc::new(
            BeaconBlock {
                slot: 25,
                parent_root: finalized_root,
                ..BeaconBlock::default()
            }
            .with_signature(SignatureBytes::repeat_byte(2)),
        );

        let finalized = Checkpoint {
            epoch: 3,
            root: finalized_root,
        };

        let justified = Checkpoint {
            epoch: 3,
            root: finalized_root,
        };

        let builder = StoreBuilder::default()
            .genesis_time(500)
            .justified_checkpoint(justified)
            .finalized_checkpoint(finalized)
            .best_justified_checkpoint(justified)
            .hot_blocks(hashmap! { hot_block.root() => hot_block })
            .votes(hashmap! { 7 => VoteTracker::new(H256::zero(), finalized_root, 3) })
            .finalized_block(finalized_block)
            .latest_finalized_state(state);

        (builder, finalized)
    }

    fn missing_field(result: Result<Store<Minimal>>) -> Option<&'static str> {
        match result.err()?.downcast_ref::<Error>()? {
            Error::StoreBuilderMissingField { field } => Some(*field),
            _ => None,
        }
    }

    #[test]
    fn build_restores_store() -> Result<()> {
        let (builder, finalized) = complete_builder();

        assert!(!builder.has_block_provider());

        let store = builder.build::<Minimal>(chain_config())?;

        assert_eq!(store.genesis_time(), 500);
        assert_eq!(store.time(), 500 + 6 * 24);
        assert_eq!(store.finalized_checkpoint(), Some(finalized));
        assert_eq!(store.justified_checkpoint(), Some(finalized));
        assert_eq!(store.blocks().len(), 2);
        assert!(store.contains_block(finalized.root));
        assert!(store.block_state(finalized.root).is_some());
        assert!(store.checkpoint_state(finalized).is_some());
        assert_eq!(store.vote(7).map(|vote| vote.next_epoch), Some(3));

        Ok(())
    }

    #[test]
    fn build_reports_first_missing_field() {
        let builder = StoreBuilder::default().genesis_time(0);

        assert_eq!(
            missing_field(builder.build(chain_config())),
            Some("justified_checkpoint"),
        );

        assert_eq!(
            missing_field(StoreBuilder::default().build(chain_config())),
            Some("genesis_time"),
        );
    }

    #[test]
    fn build_requires_finalized_block_matching_checkpoint() {
        let (builder, finalized) = complete_builder();

        let other_block = Arc::new(BeaconBlock::default().with_signature(SignatureBytes::zero()));
        let result = builder
            .finalized_block(other_block)
            .build::<Minimal>(chain_config());

        let error = result.expect_err("finalized block does not match checkpoint");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::FinalizedBlockMissing { checkpoint }) if *checkpoint == finalized,
        ));
    }

    #[test]
    fn build_rejects_config_for_other_preset() {
        let (builder, _) = complete_builder();

        let error = builder
            .build::<Minimal>(Arc::new(ChainConfig::mainnet()))
            .expect_err("mainnet config does not match minimal preset");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::PresetMismatch {
                config_preset: PresetName::Mainnet,
                store_preset: PresetName::Minimal,
            }),
        ));
    }

    #[test]
    fn build_rejects_checkpoints_out_of_order() {
        let (builder, finalized) = complete_builder();

        let result = builder
            .justified_checkpoint(Checkpoint {
                epoch: 2,
                ..finalized
            })
            .build::<Minimal>(chain_config());

        let error = result.expect_err("justified checkpoint precedes finalized checkpoint");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::JustifiedBeforeFinalized { .. }),
        ));
    }
}
