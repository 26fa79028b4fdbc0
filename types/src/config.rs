use core::num::NonZeroU64;

use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};

use crate::preset::PresetName;

/// Configuration variables customizable at runtime.
///
/// A subset of the consensus configuration. `preset_base` must match the [`Preset`] the store is
/// instantiated with.
///
/// [`Preset`]: crate::preset::Preset
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub preset_base: PresetName,

    // Time parameters
    pub seconds_per_slot: NonZeroU64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Meta
            preset_base: PresetName::Mainnet,

            // Time parameters
            seconds_per_slot: nonzero!(12_u64),
        }
    }
}

impl Config {
    #[must_use]
    pub fn mainnet() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn minimal() -> Self {
        Self {
            preset_base: PresetName::Minimal,
            seconds_per_slot: nonzero!(6_u64),
        }
    }
}
