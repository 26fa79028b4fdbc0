use std::sync::Arc;

use anyhow::{ensure, Context as _, Result};
use arc_swap::ArcSwapOption;
use fork_choice_store::{Store, StoreUpdate};
use log::{debug, info};
use parking_lot::Mutex;
use types::{
    config::Config as ChainConfig,
    phase0::{beacon_state::BeaconState, primitives::UnixSeconds},
    preset::Preset,
    traits::HashTreeRoot as _,
};

use crate::{
    error::Error,
    events::{ChainReorgEvent, EventChannels},
    storage::StorageUpdateChannel,
};

/// Owner of the shared [`Store`].
///
/// Readers get immutable snapshots through [`ChainData::store`] without locking.
/// Writers are serialized by a single lock. Each write clones the current snapshot, applies the
/// change to the clone, persists it and only then publishes the clone.
pub struct ChainData<P: Preset, U> {
    chain_config: Arc<ChainConfig>,
    store_snapshot: ArcSwapOption<Store<P>>,
    mutation_lock: Mutex<()>,
    update_channel: U,
    event_channels: Arc<EventChannels>,
}

impl<P: Preset, U: StorageUpdateChannel> ChainData<P, U> {
    #[must_use]
    pub fn new(
        chain_config: Arc<ChainConfig>,
        update_channel: U,
        event_channels: Arc<EventChannels>,
    ) -> Self {
        Self {
            chain_config,
            store_snapshot: ArcSwapOption::empty(),
            mutation_lock: Mutex::new(()),
            update_channel,
            event_channels,
        }
    }

    #[must_use]
    pub fn store(&self) -> Option<Arc<Store<P>>> {
        self.store_snapshot.load_full()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.store_snapshot.load().is_some()
    }

    #[must_use]
    pub const fn event_channels(&self) -> &Arc<EventChannels> {
        &self.event_channels
    }

    /// Installs a store that is already persisted, such as one produced by recovery.
    pub fn set_store(&self, store: Arc<Store<P>>) -> Result<()> {
        let _guard = self.mutation_lock.lock();

        ensure!(!self.is_initialized(), Error::StoreAlreadyInitialized);

        self.store_snapshot.store(Some(store));

        Ok(())
    }

    pub fn initialize_from_genesis(
        &self,
        genesis_state: Arc<BeaconState>,
    ) -> Result<Arc<Store<P>>> {
        let store = Store::genesis(self.chain_config.clone(), genesis_state)?;
        self.install_anchor(store)
    }

    pub fn initialize_from_anchor(&self, anchor_state: Arc<BeaconState>) -> Result<Arc<Store<P>>> {
        let store = Store::from_anchor(self.chain_config.clone(), anchor_state);
        self.install_anchor(store)
    }

    /// Applies `update` to the current store, persists it and publishes the result.
    ///
    /// Empty updates are neither persisted nor published. If any step fails, the published store
    /// stays as it was.
    pub fn apply_update(&self, update: &StoreUpdate) -> Result<Arc<Store<P>>> {
        let _guard = self.mutation_lock.lock();

        let current = self.store().ok_or(Error::StoreNotInitialized)?;

        if update.is_empty() {
            return Ok(current);
        }

        let mut store = Store::clone(&current);

        store.apply_update(update)?;

        self.update_channel
            .on_store_update(update)
            .context("failed to persist store update")?;

        let store = Arc::new(store);

        // `ArcSwap::rcu` is not necessary here because writers hold `mutation_lock`.
        self.store_snapshot.store(Some(Arc::clone(&store)));

        if let Some(data) = update.finalized_chain_data() {
            info!("finalized checkpoint: {:?}", data.finalized_checkpoint);

            self.event_channels.send_finalized_checkpoint_event(
                data.finalized_checkpoint,
                data.latest_finalized_state.hash_tree_root(),
            );
        }

        Ok(store)
    }

    /// Advances the clock of the current store. Returns `false` if `time` is not in the future.
    pub fn on_tick(&self, time: UnixSeconds) -> Result<bool> {
        let _guard = self.mutation_lock.lock();

        let current = self.store().ok_or(Error::StoreNotInitialized)?;
        let mut store = Store::clone(&current);

        if !store.apply_tick(time) {
            return Ok(false);
        }

        self.store_snapshot.store(Some(Arc::new(store)));

        Ok(true)
    }

    pub fn notify_chain_reorg(&self, chain_reorg_event: ChainReorgEvent) {
        debug!("chain reorganized: {chain_reorg_event:?}");
        self.event_channels.send_chain_reorg_event(chain_reorg_event);
    }

    fn install_anchor(&self, store: Store<P>) -> Result<Arc<Store<P>>> {
        let _guard = self.mutation_lock.lock();

        ensure!(!self.is_initialized(), Error::StoreAlreadyInitialized);

        let anchor_update = store.anchor_update()?;

        self.update_channel
            .on_store_update(&anchor_update)
            .context("failed to persist anchor")?;

        let store = Arc::new(store);

        info!(
            "initialized store from anchor (finalized: {:?})",
            store.finalized_checkpoint(),
        );

        self.store_snapshot.store(Some(Arc::clone(&store)));

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;
    use fork_choice_store::{FinalizedChainData, StoreUpdateBuilder};
    use im::hashmap;
    use types::{
        phase0::{
            containers::{BeaconBlock, Checkpoint, SignedBeaconBlock},
            primitives::{SignatureBytes, H256},
        },
        preset::Minimal,
        traits::HashTreeRoot as _,
    };

    use crate::{
        events::{Event, Topic},
        storage::Storage,
    };

    use super::*;

    #[derive(Default)]
    struct RecordingChannel {
        updates: Mutex<Vec<StoreUpdate>>,
        fail: bool,
    }

    impl StorageUpdateChannel for RecordingChannel {
        fn on_store_update(&self, update: &StoreUpdate) -> Result<()> {
            if self.fail {
                bail!("storage is read-only");
            }

            self.updates.lock().push(update.clone());

            Ok(())
        }
    }

    fn chain_data<U: StorageUpdateChannel>(update_channel: U) -> ChainData<Minimal, U> {
        ChainData::new(
            Arc::new(ChainConfig::minimal()),
            update_channel,
            Arc::new(EventChannels::default()),
        )
    }

    fn genesis_state() -> Arc<BeaconState> {
        Arc::new(BeaconState {
            genesis_time: 100,
            ..BeaconState::default()
        })
    }

    fn hot_block(slot: u64, parent_root: H256) -> Arc<SignedBeaconBlock> {
        Arc::new(
            BeaconBlock {
                slot,
                parent_root,
                ..BeaconBlock::default()
            }
            .with_signature(SignatureBytes::repeat_byte(3)),
        )
    }

    #[test]
    fn uninitialized_chain_data_rejects_updates() {
        let chain_data = chain_data(RecordingChannel::default());

        assert!(chain_data.store().is_none());

        let error = chain_data
            .apply_update(&StoreUpdate::default())
            .expect_err("store is not initialized");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::StoreNotInitialized),
        ));
    }

    #[test]
    fn initialization_persists_anchor_once() -> Result<()> {
        let chain_data = chain_data(RecordingChannel::default());
        let store = chain_data.initialize_from_genesis(genesis_state())?;

        assert_eq!(chain_data.update_channel.updates.lock().len(), 1);
        assert_eq!(
            chain_data.update_channel.updates.lock()[0],
            store.anchor_update()?,
        );

        let error = chain_data
            .initialize_from_anchor(genesis_state())
            .expect_err("store is already initialized");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::StoreAlreadyInitialized),
        ));

        assert!(chain_data.set_store(store).is_err());
        assert_eq!(chain_data.update_channel.updates.lock().len(), 1);

        Ok(())
    }

    #[test]
    fn invalid_genesis_state_leaves_chain_data_uninitialized() {
        let chain_data = chain_data(RecordingChannel::default());

        let state = Arc::new(BeaconState {
            slot: 1,
            ..BeaconState::default()
        });

        assert!(chain_data.initialize_from_genesis(state).is_err());
        assert!(!chain_data.is_initialized());
        assert!(chain_data.update_channel.updates.lock().is_empty());
    }

    #[test]
    fn empty_update_is_neither_persisted_nor_published() -> Result<()> {
        let chain_data = chain_data(RecordingChannel::default());
        let before = chain_data.initialize_from_genesis(genesis_state())?;

        let after = chain_data.apply_update(&StoreUpdateBuilder::default().build())?;

        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(chain_data.update_channel.updates.lock().len(), 1);

        Ok(())
    }

    #[test]
    fn update_is_persisted_then_published() -> Result<()> {
        let chain_data = chain_data(RecordingChannel::default());
        let before = chain_data.initialize_from_genesis(genesis_state())?;
        let anchor_root = before.finalized_checkpoint().unwrap_or_default().root;
        let block = hot_block(1, anchor_root);

        let update = StoreUpdateBuilder::default()
            .add_hot_block(block.clone())
            .build();

        let after = chain_data.apply_update(&update)?;

        assert!(!before.contains_block(block.root()));
        assert!(after.contains_block(block.root()));
        assert_eq!(chain_data.store().map(|store| store.blocks().len()), Some(2));
        assert_eq!(chain_data.update_channel.updates.lock().last(), Some(&update));

        Ok(())
    }

    #[test]
    fn failed_persistence_keeps_published_store() -> Result<()> {
        let store = Store::<Minimal>::genesis(Arc::new(ChainConfig::minimal()), genesis_state())?;
        let anchor_root = store.finalized_checkpoint().unwrap_or_default().root;

        let chain_data = chain_data(RecordingChannel {
            fail: true,
            ..RecordingChannel::default()
        });

        chain_data.set_store(Arc::new(store))?;

        let update = StoreUpdateBuilder::default()
            .add_hot_block(hot_block(1, anchor_root))
            .build();

        assert!(chain_data.apply_update(&update).is_err());
        assert_eq!(chain_data.store().map(|store| store.blocks().len()), Some(1));

        Ok(())
    }

    #[test]
    fn invalid_update_keeps_published_store() -> Result<()> {
        let chain_data = chain_data(RecordingChannel::default());
        let before = chain_data.initialize_from_anchor(Arc::new(BeaconState {
            slot: 64,
            ..BeaconState::default()
        }))?;

        let update = StoreUpdateBuilder::default()
            .justified_checkpoint(Checkpoint::default())
            .build();

        assert!(chain_data.apply_update(&update).is_err());
        assert!(chain_data
            .store()
            .is_some_and(|store| Arc::ptr_eq(&store, &before)));
        assert_eq!(chain_data.update_channel.updates.lock().len(), 1);

        Ok(())
    }

    #[test]
    fn finalization_sends_finalized_checkpoint_event() -> Result<()> {
        let chain_data = chain_data(Storage::in_memory());
        let mut receiver = chain_data
            .event_channels()
            .receiver_for(Topic::FinalizedCheckpoint);

        let store = chain_data.initialize_from_genesis(genesis_state())?;
        let anchor_root = store.finalized_checkpoint().unwrap_or_default().root;
        let block = hot_block(8, anchor_root);
        let state = Arc::new(BeaconState {
            genesis_time: 100,
            slot: 8,
            ..BeaconState::default()
        });

        let checkpoint = Checkpoint {
            epoch: 1,
            root: block.root(),
        };

        chain_data.apply_update(
            &StoreUpdateBuilder::default()
                .justified_checkpoint(checkpoint)
                .best_justified_checkpoint(checkpoint)
                .finalize(FinalizedChainData {
                    finalized_checkpoint: checkpoint,
                    finalized_blocks: hashmap! { block.root() => block.clone() },
                    finalized_states: hashmap! { block.root() => state.clone() },
                    finalized_child_to_parent: hashmap! { block.root() => anchor_root },
                    latest_finalized_state: state.clone(),
                })
                .build(),
        )?;

        let Event::FinalizedCheckpoint(event) = receiver.try_recv()? else {
            bail!("expected finalized checkpoint event");
        };

        assert_eq!(event.block, block.root());
        assert_eq!(event.state, state.hash_tree_root());
        assert_eq!(event.epoch, 1);

        Ok(())
    }

    #[test]
    fn ticks_publish_only_when_time_advances() -> Result<()> {
        let chain_data = chain_data(RecordingChannel::default());
        let before = chain_data.initialize_from_genesis(genesis_state())?;

        assert!(!chain_data.on_tick(100)?);
        assert!(chain_data
            .store()
            .is_some_and(|store| Arc::ptr_eq(&store, &before)));

        assert!(chain_data.on_tick(112)?);
        assert_eq!(chain_data.store().map(|store| store.current_slot()), Some(2));
        assert!(chain_data.update_channel.updates.lock().len() == 1);

        Ok(())
    }

    #[test]
    fn chain_reorgs_are_republished() -> Result<()> {
        let chain_data = chain_data(RecordingChannel::default());
        let mut receiver = chain_data.event_channels().receiver_for(Topic::ChainReorg);

        let event = ChainReorgEvent {
            slot: 3,
            depth: 1,
            old_head_block: H256::repeat_byte(1),
            new_head_block: H256::repeat_byte(2),
            old_head_state: H256::repeat_byte(3),
            new_head_state: H256::repeat_byte(4),
            epoch: 0,
        };

        chain_data.notify_chain_reorg(event);

        assert_eq!(receiver.try_recv()?, Event::ChainReorg(event));

        Ok(())
    }
}
