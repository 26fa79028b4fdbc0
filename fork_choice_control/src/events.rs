use anyhow::Result;
use log::warn;
use serde::Serialize;
use serde_with::DeserializeFromStr;
use strum::{AsRefStr, EnumString};
use tokio::sync::broadcast::{self, Receiver, Sender};
use types::phase0::{
    containers::Checkpoint,
    primitives::{Epoch, Slot, H256},
};

pub const DEFAULT_MAX_EVENTS: usize = 100;

#[derive(Clone, Copy, PartialEq, Eq, Debug, AsRefStr, EnumString, DeserializeFromStr)]
#[strum(serialize_all = "snake_case")]
pub enum Topic {
    ChainReorg,
    FinalizedCheckpoint,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Event {
    ChainReorg(ChainReorgEvent),
    FinalizedCheckpoint(FinalizedCheckpointEvent),
}

impl Event {
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::ChainReorg(_) => Topic::ChainReorg,
            Self::FinalizedCheckpoint(_) => Topic::FinalizedCheckpoint,
        }
    }
}

/// Broadcast channels for chain lifecycle events.
///
/// Events are only sent when someone is subscribed.
#[derive(Clone, Debug)]
pub struct EventChannels {
    pub chain_reorgs: Sender<Event>,
    pub finalized_checkpoints: Sender<Event>,
}

impl Default for EventChannels {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

impl EventChannels {
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            chain_reorgs: broadcast::channel(max_events).0,
            finalized_checkpoints: broadcast::channel(max_events).0,
        }
    }

    #[must_use]
    pub fn receiver_for(&self, topic: Topic) -> Receiver<Event> {
        match topic {
            Topic::ChainReorg => &self.chain_reorgs,
            Topic::FinalizedCheckpoint => &self.finalized_checkpoints,
        }
        .subscribe()
    }

    pub fn send_chain_reorg_event(&self, chain_reorg_event: ChainReorgEvent) {
        if let Err(error) = self.send_chain_reorg_event_internal(chain_reorg_event) {
            warn!("unable to send chain reorg event: {error}");
        }
    }

    pub fn send_finalized_checkpoint_event(
        &self,
        finalized_checkpoint: Checkpoint,
        state_root: H256,
    ) {
        if let Err(error) =
            self.send_finalized_checkpoint_event_internal(finalized_checkpoint, state_root)
        {
            warn!("unable to send finalized checkpoint event: {error}");
        }
    }

    fn send_chain_reorg_event_internal(&self, chain_reorg_event: ChainReorgEvent) -> Result<()> {
        if self.chain_reorgs.receiver_count() > 0 {
            let event = Event::ChainReorg(chain_reorg_event);
            self.chain_reorgs.send(event)?;
        }

        Ok(())
    }

    fn send_finalized_checkpoint_event_internal(
        &self,
        finalized_checkpoint: Checkpoint,
        state_root: H256,
    ) -> Result<()> {
        if self.finalized_checkpoints.receiver_count() > 0 {
            let Checkpoint { epoch, root } = finalized_checkpoint;

            let finalized_checkpoint_event = FinalizedCheckpointEvent {
                block: root,
                state: state_root,
                epoch,
            };

            let event = Event::FinalizedCheckpoint(finalized_checkpoint_event);
            self.finalized_checkpoints.send(event)?;
        }

        Ok(())
    }
}

/// Subscriptions to every lifecycle topic, taken once when recovery is set up.
#[derive(Debug)]
pub struct LifecycleSubscription {
    pub chain_reorgs: Receiver<Event>,
    pub finalized_checkpoints: Receiver<Event>,
}

impl LifecycleSubscription {
    #[must_use]
    pub fn new(event_channels: &EventChannels) -> Self {
        Self {
            chain_reorgs: event_channels.receiver_for(Topic::ChainReorg),
            finalized_checkpoints: event_channels.receiver_for(Topic::FinalizedCheckpoint),
        }
    }
}

// Reorgs are detected by head selection, which lives outside this crate.
// The event is passed through as received.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct ChainReorgEvent {
    pub slot: Slot,
    pub depth: u64,
    pub old_head_block: H256,
    pub new_head_block: H256,
    pub old_head_state: H256,
    pub new_head_state: H256,
    pub epoch: Epoch,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct FinalizedCheckpointEvent {
    pub block: H256,
    pub state: H256,
    pub epoch: Epoch,
}
