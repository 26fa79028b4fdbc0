use core::{fmt::Debug, hash::Hash};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum::{Display, EnumString};
use typenum::{NonZero, Unsigned, U32, U8};

/// Compile-time configuration variables.
///
/// Only the parameters that slot and epoch arithmetic depends on are included.
pub trait Preset: Copy + Eq + Ord + Hash + Default + Debug + Send + Sync + 'static {
    type SlotsPerEpoch: Unsigned + NonZero;

    const NAME: PresetName;
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Mainnet;

impl Preset for Mainnet {
    type SlotsPerEpoch = U32;

    const NAME: PresetName = PresetName::Mainnet;
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Minimal;

impl Preset for Minimal {
    type SlotsPerEpoch = U8;

    const NAME: PresetName = PresetName::Minimal;
}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Display, EnumString, DeserializeFromStr, SerializeDisplay,
)]
#[strum(serialize_all = "lowercase")]
pub enum PresetName {
    Mainnet,
    Minimal,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(PresetName::Mainnet, "mainnet")]
    #[test_case(PresetName::Minimal, "minimal")]
    fn preset_name_round_trips_through_string(name: PresetName, string: &str) {
        assert_eq!(name.to_string(), string);
        assert_eq!(string.parse::<PresetName>(), Ok(name));
    }

    #[test]
    fn presets_differ_in_slots_per_epoch() {
        assert_eq!(<<Mainnet as Preset>::SlotsPerEpoch as Unsigned>::U64, 32);
        assert_eq!(<<Minimal as Preset>::SlotsPerEpoch as Unsigned>::U64, 8);
    }
}
