//! Types that are not part of the consensus containers but are persisted alongside them.

use serde::{Deserialize, Serialize};

use crate::phase0::primitives::{Epoch, Slot, H256};

/// The fork choice vote of one validator.
///
/// `next_*` fields hold the latest vote seen. `current_root` is the vote that head selection has
/// already accounted for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VoteTracker {
    pub current_root: H256,
    pub next_root: H256,
    pub next_epoch: Epoch,
}

impl VoteTracker {
    #[must_use]
    pub const fn new(current_root: H256, next_root: H256, next_epoch: Epoch) -> Self {
        Self {
            current_root,
            next_root,
            next_epoch,
        }
    }
}

/// The slot and block a state root was produced at.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlotAndBlockRoot {
    pub slot: Slot,
    pub block_root: H256,
}
