//! SHA-256 primitives used to content-address blocks and states.
//!
//! Only what the chain-data containers need is covered: hashing pairs of 32 byte chunks and binary
//! Merkle trees over at most `2 ^ MAX_DEPTH` chunks.

use ethereum_types::H256;
use generic_array::GenericArray;
use hex_literal::hex;
use sha2::{
    digest::{core_api::BlockSizeUser, generic_array::typenum::Unsigned as _},
    Sha256,
};

pub const MAX_DEPTH: usize = 7;

#[rustfmt::skip]
pub const ZERO_HASHES: [H256; MAX_DEPTH + 1] = [
    H256(hex!("0000000000000000000000000000000000000000000000000000000000000000")),
    H256(hex!("f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b")),
    H256(hex!("db56114e00fdd4c1f85c892bf35ac9a89289aaecb1ebd0a96cde606a748b5d71")),
    H256(hex!("c78009fdf07fc56a11f122370658a353aaa542ed63e44c4bc15ff4cd105ab33c")),
    H256(hex!("536d98837f2dd165a55d5eeae91485954472d56f246df256bf3cae19352a123c")),
    H256(hex!("9efde052aa15429fae05bad4d0b1d7c64da64d03d7a1854a588c2cb8430c0d30")),
    H256(hex!("d88ddfeed400a8755596b21942c1497e114c302e6118290f91e6772976041fa1")),
    H256(hex!("87eb0ddba57e35f6d286673802a4af5975e22506c7cf4c64bb6be5ee11527f2c")),
];

// A 512 bit message fills one block exactly, so its padding gets a block of its own.
#[rustfmt::skip]
const PADDING_BLOCK_FOR_512_BITS: Sha256Block = hex!("
    80000000 00000000 00000000 00000000
    00000000 00000000 00000000 00000000
    00000000 00000000 00000000 00000000
    00000000 00000000 00000000 00000200
");

type Sha256BlockSize = <Sha256 as BlockSizeUser>::BlockSize;
type Sha256Block = [u8; Sha256BlockSize::USIZE];

struct Sha256State([u32; 8]);

impl Default for Sha256State {
    #[rustfmt::skip]
    fn default() -> Self {
        Self([
            0x6a09_e667, 0xbb67_ae85, 0x3c6e_f372, 0xa54f_f53a,
            0x510e_527f, 0x9b05_688c, 0x1f83_d9ab, 0x5be0_cd19,
        ])
    }
}

impl Sha256State {
    fn compress(mut self, blocks: &[GenericArray<u8, Sha256BlockSize>]) -> Self {
        sha2::compress256(&mut self.0, blocks);
        self
    }

    fn output(self) -> H256 {
        let mut output = H256::zero();

        for (chunk, word) in output.as_bytes_mut().chunks_exact_mut(4).zip(self.0) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }

        output
    }
}

#[inline]
#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    let mut block = GenericArray::default();
    block[..32].copy_from_slice(left.as_bytes());
    block[32..].copy_from_slice(right.as_bytes());

    let padding_block = *GenericArray::from_slice(&PADDING_BLOCK_FOR_512_BITS);

    Sha256State::default()
        .compress(&[block, padding_block])
        .output()
}

/// Computes the root of a binary Merkle tree whose leaves are `chunks` padded with zero chunks to
/// the next power of two.
///
/// # Panics
///
/// Panics if there are more than `2 ^ MAX_DEPTH` chunks. Container field counts are fixed at
/// compile time, so this is a programming error rather than a runtime condition.
#[must_use]
pub fn merkleize(chunks: &[H256]) -> H256 {
    let depth = chunks.len().next_power_of_two().trailing_zeros() as usize;

    assert!(depth <= MAX_DEPTH, "too many chunks to merkleize: {}", chunks.len());

    let mut layer = chunks.to_vec();

    for height in 0..depth {
        if layer.len() % 2 == 1 {
            layer.push(ZERO_HASHES[height]);
        }

        layer = layer
            .chunks_exact(2)
            .map(|pair| hash_256_256(pair[0], pair[1]))
            .collect();
    }

    layer.first().copied().unwrap_or(ZERO_HASHES[0])
}

#[cfg(test)]
mod tests {
    use itertools::Itertools as _;
    use test_case::test_case;

    use super::*;

    #[test]
    fn higher_zero_hashes_are_calculated_from_lower_ones() {
        for (lower, higher) in ZERO_HASHES.into_iter().tuple_windows() {
            assert_eq!(hash_256_256(lower, lower), higher);
        }
    }

    #[test_case(1, 0)]
    #[test_case(2, 1)]
    #[test_case(3, 2)]
    #[test_case(4, 2)]
    #[test_case(5, 3)]
    #[test_case(128, 7)]
    fn merkleize_of_zero_chunks_is_zero_hash_of_padded_depth(chunk_count: usize, depth: usize) {
        assert_eq!(
            merkleize(&vec![H256::zero(); chunk_count]),
            ZERO_HASHES[depth],
        );
    }

    #[test]
    fn merkleize_of_single_chunk_is_the_chunk_itself() {
        let chunk = H256::repeat_byte(0xab);

        assert_eq!(merkleize(&[chunk]), chunk);
    }

    #[test]
    fn merkleize_pads_odd_layers_with_zero_hashes() {
        let chunks = [
            H256::repeat_byte(1),
            H256::repeat_byte(2),
            H256::repeat_byte(3),
        ];

        let expected = hash_256_256(
            hash_256_256(chunks[0], chunks[1]),
            hash_256_256(chunks[2], ZERO_HASHES[0]),
        );

        assert_eq!(merkleize(&chunks), expected);
    }
}
