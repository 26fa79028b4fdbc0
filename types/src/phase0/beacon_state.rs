use serde::{Deserialize, Serialize};

use crate::phase0::{
    containers::{BeaconBlockHeader, Checkpoint},
    primitives::{Slot, UnixSeconds, H256},
};

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BeaconState {
    // > Versioning
    pub genesis_time: UnixSeconds,
    pub genesis_validators_root: H256,
    pub slot: Slot,

    // > History
    pub latest_block_header: BeaconBlockHeader,

    // > Finality
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
}
