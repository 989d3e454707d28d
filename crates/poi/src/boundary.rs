//! File-size (boundary) relation.
//!
//! A single inclusion proof of the last real leaf `N-1` shows that exactly
//! `N` leaves are real: wherever that leaf's ancestor is a left child, its
//! sibling must be the empty-subtree hash for the level, so nothing real
//! exists to the right. The leaf itself must not be the padding leaf.

use serde::{Deserialize, Serialize};
use smt::field::{serde_fe, Fe};
use smt::{ChunkReader, LeafHasher, LeafProof, MerkleProof, ZeroHashes, MAX_DEPTH};

use crate::witness::OpeningSource;
use crate::{PoiError, RelationError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryProof {
    #[serde(with = "serde_fe")]
    pub leaf_hash: Fe,
    pub proof: MerkleProof,
}

impl From<LeafProof> for BoundaryProof {
    fn from(lp: LeafProof) -> Self {
        Self {
            leaf_hash: lp.leaf_hash,
            proof: lp.proof,
        }
    }
}

/// Opens the last real leaf of `source`.
pub fn prove_boundary<S, R>(source: &S, chunks: &R, hasher: &LeafHasher) -> Result<BoundaryProof>
where
    S: OpeningSource + ?Sized,
    R: ChunkReader + ?Sized,
{
    let num_leaves = source.num_leaves();
    if num_leaves == 0 {
        return Err(PoiError::EmptyTree);
    }
    Ok(source.open(num_leaves - 1, chunks, hasher)?.into())
}

pub fn check_boundary(
    root: &Fe,
    num_leaves: u64,
    boundary: &BoundaryProof,
    zero_hashes: &ZeroHashes,
) -> std::result::Result<(), RelationError> {
    let depth = zero_hashes.depth();
    if depth == 0 || depth > MAX_DEPTH {
        return Err(RelationError::Shape(format!("depth {depth} outside 1..={MAX_DEPTH}")));
    }
    let proof = &boundary.proof;
    if proof.siblings.len() != depth || proof.directions.len() != depth {
        return Err(RelationError::Shape(format!(
            "boundary proof has {} levels, expected {depth}",
            proof.siblings.len()
        )));
    }
    let capacity = 1u64 << depth;
    if num_leaves == 0 || num_leaves > capacity {
        return Err(RelationError::BoundaryRange { num_leaves, capacity });
    }

    let last = num_leaves - 1;
    for level in 0..depth {
        let bit = ((last >> level) & 1) as u8;
        if proof.directions[level] != bit {
            return Err(RelationError::BoundaryDirection { level });
        }
        if bit == 0 && proof.siblings[level] != zero_hashes.at(level) {
            return Err(RelationError::BoundarySibling { level });
        }
    }
    if boundary.leaf_hash == zero_hashes.padding_leaf() {
        return Err(RelationError::BoundaryPaddingLeaf);
    }
    if proof.compute_root(&boundary.leaf_hash) != *root {
        return Err(RelationError::BoundaryInclusion);
    }
    Ok(())
}

/// Stand-alone file-size statement: public `(root, num_leaves)`, private
/// boundary proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSizeWitness {
    #[serde(with = "serde_fe")]
    pub root: Fe,
    pub num_leaves: u64,
    pub proof: BoundaryProof,
}

impl FileSizeWitness {
    pub fn prepare<S, R>(source: &S, chunks: &R, hasher: &LeafHasher) -> Result<Self>
    where
        S: OpeningSource + ?Sized,
        R: ChunkReader + ?Sized,
    {
        Ok(Self {
            root: source.root(),
            num_leaves: source.num_leaves(),
            proof: prove_boundary(source, chunks, hasher)?,
        })
    }

    pub fn check(&self, zero_hashes: &ZeroHashes) -> std::result::Result<(), RelationError> {
        check_boundary(&self.root, self.num_leaves, &self.proof, zero_hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smt::{InMemoryChunks, SparseMerkleTree};

    const HASHER: LeafHasher = LeafHasher::new(31, 4);

    fn tree(n: usize, depth: usize) -> (SparseMerkleTree, InMemoryChunks) {
        let chunks: Vec<Vec<u8>> = (0..n).map(|i| vec![i as u8 + 1; 90]).collect();
        let t = SparseMerkleTree::build(&chunks, depth, &HASHER, HASHER.padding_leaf_hash()).unwrap();
        (t, InMemoryChunks::new(chunks))
    }

    #[test]
    fn honest_boundary_holds_for_every_size() {
        for n in 1..=8 {
            let (t, chunks) = tree(n, 3);
            let w = FileSizeWitness::prepare(&t, &chunks, &HASHER).unwrap();
            assert_eq!(w.num_leaves, n as u64);
            assert!(w.check(t.zero_hashes()).is_ok(), "n={n}");
        }
    }

    #[test]
    fn wrong_leaf_count_fails() {
        let (t, chunks) = tree(5, 4);
        let w = FileSizeWitness::prepare(&t, &chunks, &HASHER).unwrap();
        for claimed in [4u64, 6, 8] {
            assert!(
                check_boundary(&t.root(), claimed, &w.proof, t.zero_hashes()).is_err(),
                "claimed {claimed}"
            );
        }
        assert!(matches!(
            check_boundary(&t.root(), 0, &w.proof, t.zero_hashes()),
            Err(RelationError::BoundaryRange { .. })
        ));
        assert!(matches!(
            check_boundary(&t.root(), 17, &w.proof, t.zero_hashes()),
            Err(RelationError::BoundaryRange { .. })
        ));
    }

    #[test]
    fn full_tree_needs_no_zero_siblings() {
        let (t, chunks) = tree(8, 3);
        let b = prove_boundary(&t, &chunks, &HASHER).unwrap();
        assert!(b.proof.directions.iter().all(|d| *d == 1));
        assert!(check_boundary(&t.root(), 8, &b, t.zero_hashes()).is_ok());
    }

    #[test]
    fn oversized_zero_chain_is_rejected() {
        let b = BoundaryProof {
            leaf_hash: Fe::from(1u64),
            proof: MerkleProof {
                siblings: vec![Fe::from(0u64); 64],
                directions: vec![1; 64],
            },
        };
        let zh = ZeroHashes::new(64, HASHER.padding_leaf_hash());
        assert!(matches!(
            check_boundary(&Fe::from(0u64), 1, &b, &zh),
            Err(RelationError::Shape(_))
        ));
    }

    #[test]
    fn empty_tree_has_no_boundary() {
        let (t, chunks) = tree(0, 3);
        assert!(matches!(prove_boundary(&t, &chunks, &HASHER), Err(PoiError::EmptyTree)));
    }
}
