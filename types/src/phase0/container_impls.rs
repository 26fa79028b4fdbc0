use crate::{
    phase0::{
        beacon_state::BeaconState,
        containers::{
            BeaconBlock, BeaconBlockBody, BeaconBlockHeader, Checkpoint, SignedBeaconBlock,
        },
        primitives::{SignatureBytes, H256},
    },
    traits::HashTreeRoot,
};

impl BeaconBlock {
    #[inline]
    #[must_use]
    pub const fn with_signature(self, signature: SignatureBytes) -> SignedBeaconBlock {
        SignedBeaconBlock {
            message: self,
            signature,
        }
    }

    #[must_use]
    pub fn to_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot,
            proposer_index: self.proposer_index,
            parent_root: self.parent_root,
            state_root: self.state_root,
            body_root: self.body.hash_tree_root(),
        }
    }
}

impl SignedBeaconBlock {
    /// The block root. Signatures are not part of it.
    #[inline]
    #[must_use]
    pub fn root(&self) -> H256 {
        self.message.hash_tree_root()
    }
}

impl HashTreeRoot for BeaconBlock {
    // A block and its header share a root.
    fn hash_tree_root(&self) -> H256 {
        self.to_header().hash_tree_root()
    }
}

impl HashTreeRoot for BeaconBlockBody {
    fn hash_tree_root(&self) -> H256 {
        hashing::merkleize(&[
            self.randao_reveal.hash_tree_root(),
            self.graffiti.hash_tree_root(),
        ])
    }
}

impl HashTreeRoot for BeaconBlockHeader {
    fn hash_tree_root(&self) -> H256 {
        hashing::merkleize(&[
            self.slot.hash_tree_root(),
            self.proposer_index.hash_tree_root(),
            self.parent_root.hash_tree_root(),
            self.state_root.hash_tree_root(),
            self.body_root.hash_tree_root(),
        ])
    }
}

impl HashTreeRoot for Checkpoint {
    fn hash_tree_root(&self) -> H256 {
        hashing::merkleize(&[self.epoch.hash_tree_root(), self.root.hash_tree_root()])
    }
}

impl HashTreeRoot for SignedBeaconBlock {
    fn hash_tree_root(&self) -> H256 {
        hashing::merkleize(&[
            self.message.hash_tree_root(),
            self.signature.hash_tree_root(),
        ])
    }
}

impl HashTreeRoot for BeaconState {
    fn hash_tree_root(&self) -> H256 {
        hashing::merkleize(&[
            self.genesis_time.hash_tree_root(),
            self.genesis_validators_root.hash_tree_root(),
            self.slot.hash_tree_root(),
            self.latest_block_header.hash_tree_root(),
            self.current_justified_checkpoint.hash_tree_root(),
            self.finalized_checkpoint.hash_tree_root(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use hashing::hash_256_256;

    use super::*;

    #[test]
    fn block_root_does_not_depend_on_signature() {
        let block = BeaconBlock {
            slot: 3,
            state_root: H256::repeat_byte(1),
            ..BeaconBlock::default()
        };

        let unsigned = block.with_signature(SignatureBytes::empty());
        let signed = block.with_signature(SignatureBytes::repeat_byte(9));

        assert_eq!(unsigned.root(), signed.root());
        assert_ne!(unsigned.hash_tree_root(), signed.hash_tree_root());
    }

    #[test]
    fn checkpoint_root_hashes_epoch_and_root() {
        let checkpoint = Checkpoint {
            epoch: 0,
            root: H256::repeat_byte(2),
        };

        assert_eq!(
            checkpoint.hash_tree_root(),
            hash_256_256(H256::zero(), H256::repeat_byte(2)),
        );
    }

    #[test]
    fn state_root_changes_with_slot() {
        let state = BeaconState::default();
        let later = BeaconState {
            slot: 1,
            ..state.clone()
        };

        assert_ne!(state.hash_tree_root(), later.hash_tree_root());
    }
}
