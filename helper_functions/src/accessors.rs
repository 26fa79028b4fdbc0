use types::{
    phase0::{beacon_state::BeaconState, primitives::Epoch},
    preset::Preset,
};

use crate::misc;

#[must_use]
pub const fn get_current_epoch<P: Preset>(state: &BeaconState) -> Epoch {
    misc::compute_epoch_at_slot::<P>(state.slot)
}
