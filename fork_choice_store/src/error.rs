use thiserror::Error;
use types::{
    phase0::{
        containers::Checkpoint,
        primitives::{Slot, H256},
    },
    preset::PresetName,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "best justified checkpoint precedes justified checkpoint \
         (best_justified: {best_justified:?}, justified: {justified:?})"
    )]
    BestJustifiedBeforeJustified {
        best_justified: Checkpoint,
        justified: Checkpoint,
    },
    #[error("finalized block is missing from persisted data: {checkpoint:?}")]
    FinalizedBlockMissing { checkpoint: Checkpoint },
    #[error("genesis state has invalid slot: {slot}")]
    GenesisStateHasInvalidSlot { slot: Slot },
    #[error("store update both adds and deletes hot block {root:?}")]
    HotBlockAddedAndDeleted { root: H256 },
    #[error(
        "justified checkpoint precedes finalized checkpoint \
         (justified: {justified:?}, finalized: {finalized:?})"
    )]
    JustifiedBeforeFinalized {
        justified: Checkpoint,
        finalized: Checkpoint,
    },
    #[error(
        "chain config is for another preset \
         (config preset: {config_preset}, store preset: {store_preset})"
    )]
    PresetMismatch {
        config_preset: PresetName,
        store_preset: PresetName,
    },
    #[error("store builder is missing {field}")]
    StoreBuilderMissingField { field: &'static str },
    #[error("store has no finalized anchor")]
    StoreNotAnchored,
}
