//! Domain-separated hashing over the scalar field.
//!
//! `H` absorbs canonical 32-byte encodings of field elements one after the
//! other and squeezes a field element back out. Node hashing is `H(l, r)`;
//! leaf hashing prefixes a domain tag so a real chunk and a padding leaf can
//! never share a preimage.

use ark_ff::One;

use crate::field::{self, Fe};

const HASH_CONTEXT: &str = "poi-smt 2025-01 field hash v1";

/// Tag absorbed first when hashing a padding (empty) leaf.
pub const DOMAIN_TAG_PADDING: u64 = 0;
/// Tag absorbed first when hashing a real chunk.
pub const DOMAIN_TAG_REAL: u64 = 1;

/// Incremental `H` over field elements.
#[derive(Clone)]
pub struct FieldHasher {
    inner: blake3::Hasher,
}

impl FieldHasher {
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new_derive_key(HASH_CONTEXT),
        }
    }

    pub fn update(&mut self, fe: &Fe) -> &mut Self {
        self.inner.update(&field::to_be_bytes(fe));
        self
    }

    pub fn finalize(&self) -> Fe {
        // 512 bits reduced mod r keeps the output bias negligible
        let mut wide = [0u8; 64];
        self.inner.finalize_xof().fill(&mut wide);
        field::from_be_bytes_mod_order(&wide)
    }
}

impl Default for FieldHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FieldHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldHasher").finish_non_exhaustive()
    }
}

/// `H(e_0, ..., e_n)`
pub fn hash_elements(elements: &[Fe]) -> Fe {
    let mut h = FieldHasher::new();
    for e in elements {
        h.update(e);
    }
    h.finalize()
}

/// Internal node hash: `H(left, right)`.
pub fn hash_nodes(left: &Fe, right: &Fe) -> Fe {
    let mut h = FieldHasher::new();
    h.update(left).update(right);
    h.finalize()
}

/// Absorbs `tag`, then each `element_size`-byte element of `data` multiplied
/// by `randomness`, then zero elements until `num_elements` data elements
/// have been absorbed in total.
///
/// Data longer than `num_elements` elements is absorbed whole, so the result
/// no longer matches the fixed-shape leaf. Callers bound chunks with
/// [`LeafHasher::max_chunk_len`].
pub fn hash_with_domain_tag(
    tag: u64,
    data: &[u8],
    randomness: &Fe,
    element_size: usize,
    num_elements: usize,
) -> Fe {
    let mut h = FieldHasher::new();
    h.update(&Fe::from(tag));

    let fed = data.len().div_ceil(element_size);
    for element in field::bytes_to_elements(data, element_size, fed) {
        h.update(&(element * randomness));
    }

    let zero = Fe::from(0u64);
    for _ in fed..num_elements {
        h.update(&zero);
    }
    h.finalize()
}

/// Hashes a chunk that was already decomposed into field elements, exactly as
/// [`LeafHasher::hash_chunk`] would hash the original bytes.
pub fn hash_leaf_elements(elements: &[Fe]) -> Fe {
    let mut h = FieldHasher::new();
    h.update(&Fe::from(DOMAIN_TAG_REAL));
    for e in elements {
        h.update(e);
    }
    h.finalize()
}

/// The leaf hashing seam used by tree construction and proof rebuilding.
pub trait LeafHash: Sync {
    fn hash_leaf(&self, chunk: &[u8]) -> Fe;
}

impl<F> LeafHash for F
where
    F: Fn(&[u8]) -> Fe + Sync,
{
    fn hash_leaf(&self, chunk: &[u8]) -> Fe {
        self(chunk)
    }
}

/// Fixed-shape leaf hashing: chunks are split into `element_size`-byte field
/// elements and zero-padded to `elements_per_leaf` elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafHasher {
    pub element_size: usize,
    pub elements_per_leaf: usize,
}

impl LeafHasher {
    pub const fn new(element_size: usize, elements_per_leaf: usize) -> Self {
        Self {
            element_size,
            elements_per_leaf,
        }
    }

    /// Real leaf: tag 1, randomness 1.
    pub fn hash_chunk(&self, chunk: &[u8]) -> Fe {
        hash_with_domain_tag(
            DOMAIN_TAG_REAL,
            chunk,
            &Fe::one(),
            self.element_size,
            self.elements_per_leaf,
        )
    }

    /// Padding leaf: tag 0 followed by `elements_per_leaf` zero elements.
    pub fn padding_leaf_hash(&self) -> Fe {
        hash_with_domain_tag(
            DOMAIN_TAG_PADDING,
            &[],
            &Fe::one(),
            self.element_size,
            self.elements_per_leaf,
        )
    }

    /// Longest chunk that fits in `elements_per_leaf` elements.
    pub const fn max_chunk_len(&self) -> usize {
        self.element_size * self.elements_per_leaf
    }

    /// Field-element view of a chunk, as handed to the proving backend.
    pub fn chunk_elements(&self, chunk: &[u8]) -> Vec<Fe> {
        field::bytes_to_elements(chunk, self.element_size, self.elements_per_leaf)
    }
}

impl LeafHash for LeafHasher {
    fn hash_leaf(&self, chunk: &[u8]) -> Fe {
        self.hash_chunk(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASHER: LeafHasher = LeafHasher::new(31, 528);

    #[test]
    fn node_hash_is_order_sensitive() {
        let a = Fe::from(1u64);
        let b = Fe::from(2u64);
        assert_ne!(hash_nodes(&a, &b), hash_nodes(&b, &a));
        assert_eq!(hash_nodes(&a, &b), hash_elements(&[a, b]));
    }

    #[test]
    fn max_chunk_len_fills_every_element() {
        assert_eq!(HASHER.max_chunk_len(), 31 * 528);
        let full = vec![9u8; HASHER.max_chunk_len()];
        assert_eq!(hash_leaf_elements(&HASHER.chunk_elements(&full)), HASHER.hash_chunk(&full));

        let mut over = full;
        over.push(1);
        assert_ne!(hash_leaf_elements(&HASHER.chunk_elements(&over)), HASHER.hash_chunk(&over));
    }

    #[test]
    fn zero_chunk_differs_from_padding_leaf() {
        let zero_chunk = vec![0u8; 31 * 528];
        assert_ne!(HASHER.hash_chunk(&zero_chunk), HASHER.padding_leaf_hash());
        assert_ne!(HASHER.hash_chunk(&[]), HASHER.padding_leaf_hash());
    }

    #[test]
    fn trailing_zero_bytes_are_absorbed_as_padding() {
        // a full-width zero element and an implicit padding element are identical
        let short = vec![7u8; 31];
        let mut long = short.clone();
        long.extend_from_slice(&[0u8; 31]);
        assert_eq!(HASHER.hash_chunk(&short), HASHER.hash_chunk(&long));
    }

    #[test]
    fn element_view_hashes_like_bytes() {
        let chunk: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        let elements = HASHER.chunk_elements(&chunk);
        assert_eq!(elements.len(), 528);
        assert_eq!(hash_leaf_elements(&elements), HASHER.hash_chunk(&chunk));
    }

    #[test]
    fn randomness_scales_elements() {
        let data = [1u8; 62];
        let one = hash_with_domain_tag(DOMAIN_TAG_REAL, &data, &Fe::from(1u64), 31, 4);
        let two = hash_with_domain_tag(DOMAIN_TAG_REAL, &data, &Fe::from(2u64), 31, 4);
        assert_ne!(one, two);
    }

    #[test]
    fn closures_are_leaf_hashers() {
        let f = |chunk: &[u8]| HASHER.hash_chunk(chunk);
        assert_eq!(f.hash_leaf(b"abc"), HASHER.hash_leaf(b"abc"));
    }
}
