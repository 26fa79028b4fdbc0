use fixed_hash::construct_fixed_hash;
use impl_serde::impl_fixed_hash_serde;

pub use ethereum_types::H256;

pub type Epoch = u64;
pub type Gwei = u64;
pub type Slot = u64;
pub type UnixSeconds = u64;
pub type ValidatorIndex = u64;

// Signatures are kept as raw bytes. Nothing in the chain-data core verifies them.
construct_fixed_hash! {
    pub struct SignatureBytes(96);
}

impl_fixed_hash_serde!(SignatureBytes, 96);

impl SignatureBytes {
    /// The placeholder carried by blocks that are not the product of a validator duty.
    ///
    /// Anchor blocks are built locally from a trusted state and are never signed.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::zero()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.is_zero()
    }
}
