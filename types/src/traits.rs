use crate::phase0::primitives::{SignatureBytes, H256};

/// Content hash of a value laid out as 32 byte chunks.
///
/// Roots follow the SSZ Merkleization of basic values and fixed-size containers, which is all the
/// chain-data containers are made of. Block roots and state roots are computed with this.
pub trait HashTreeRoot {
    fn hash_tree_root(&self) -> H256;
}

impl HashTreeRoot for u64 {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        let bytes = self.to_le_bytes();
        let mut chunk = H256::zero();
        chunk[..bytes.len()].copy_from_slice(&bytes);
        chunk
    }
}

impl HashTreeRoot for H256 {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        *self
    }
}

impl HashTreeRoot for SignatureBytes {
    fn hash_tree_root(&self) -> H256 {
        let chunks = self
            .as_bytes()
            .chunks_exact(H256::len_bytes())
            .map(H256::from_slice)
            .collect::<Vec<_>>();

        hashing::merkleize(&chunks)
    }
}
