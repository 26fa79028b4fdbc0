use typenum::Unsigned as _;
use types::{
    config::Config,
    phase0::{
        consts::GENESIS_SLOT,
        primitives::{Epoch, Slot, UnixSeconds},
    },
    preset::Preset,
};

#[must_use]
pub const fn compute_epoch_at_slot<P: Preset>(slot: Slot) -> Epoch {
    slot / P::SlotsPerEpoch::U64
}

/// Wall-clock time at the start of `slot`.
///
/// Saturates instead of overflowing. Anchor states are untrusted input at the point this is called.
#[must_use]
pub const fn compute_timestamp_at_slot(
    config: &Config,
    genesis_time: UnixSeconds,
    slot: Slot,
) -> UnixSeconds {
    let slots_since_genesis = slot.saturating_sub(GENESIS_SLOT);
    genesis_time.saturating_add(slots_since_genesis.saturating_mul(config.seconds_per_slot.get()))
}

/// The slot `time` falls in, or `None` if `time` precedes genesis.
#[must_use]
pub const fn compute_slot_at_timestamp(
    config: &Config,
    genesis_time: UnixSeconds,
    time: UnixSeconds,
) -> Option<Slot> {
    match time.checked_sub(genesis_time) {
        Some(since_genesis) => Some(GENESIS_SLOT + since_genesis / config.seconds_per_slot.get()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use nonzero_ext::nonzero;
    use test_case::test_case;
    use types::preset::{Mainnet, Minimal};

    use super::*;

    #[test]
    fn test_epoch_at_slot() {
        assert_eq!(compute_epoch_at_slot::<Minimal>(9), 1);
        assert_eq!(compute_epoch_at_slot::<Minimal>(8), 1);
        assert_eq!(compute_epoch_at_slot::<Minimal>(7), 0);
        assert_eq!(compute_epoch_at_slot::<Mainnet>(63), 1);
    }

    #[test]
    fn timestamp_at_slot_counts_whole_slots_from_genesis() {
        let config = Config {
            seconds_per_slot: nonzero!(12_u64),
            ..Config::default()
        };

        assert_eq!(compute_timestamp_at_slot(&config, 1000, 0), 1000);
        assert_eq!(compute_timestamp_at_slot(&config, 1000, 5), 1060);
        assert_eq!(compute_timestamp_at_slot(&config, 1000, Slot::MAX), UnixSeconds::MAX);
    }

    #[test_case(999 => None)]
    #[test_case(1000 => Some(0))]
    #[test_case(1011 => Some(0))]
    #[test_case(1012 => Some(1))]
    fn test_slot_at_timestamp(time: UnixSeconds) -> Option<Slot> {
        compute_slot_at_timestamp(&Config::mainnet(), 1000, time)
    }
}
