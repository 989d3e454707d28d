//! Proof types

use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::field::{serde_fe, serde_fe_vec, Fe};
use crate::zero::ZeroHashes;
use crate::{Result, SmtError};

/// Fixed-depth inclusion proof.
///
/// `directions[l] == 0`: the running node is the left child at level `l` and
/// `siblings[l]` sits on its right. `1` is the mirror case.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerkleProof {
    /// Sibling hashes from leaf to root
    #[serde(with = "serde_fe_vec")]
    pub siblings: Vec<Fe>,
    pub directions: Vec<u8>,
}

impl MerkleProof {
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    /// Replays the path from `leaf_hash` upward.
    pub fn compute_root(&self, leaf_hash: &Fe) -> Fe {
        self.siblings
            .iter()
            .zip(&self.directions)
            .fold(*leaf_hash, |current, (sibling, dir)| {
                if *dir == 0 {
                    crypto::hash_nodes(&current, sibling)
                } else {
                    crypto::hash_nodes(sibling, &current)
                }
            })
    }

    pub fn verify(&self, leaf_hash: &Fe, root: &Fe) -> bool {
        self.siblings.len() == self.directions.len()
            && self.directions.iter().all(|d| *d <= 1)
            && self.compute_root(leaf_hash) == *root
    }

    /// Leaf position encoded by the direction bits.
    pub fn leaf_index(&self) -> u64 {
        self.directions
            .iter()
            .enumerate()
            .fold(0u64, |acc, (l, d)| acc | (u64::from(*d & 1) << l))
    }

    pub fn check_depth(&self, expected: usize) -> Result<()> {
        if self.siblings.len() != expected || self.directions.len() != expected {
            return Err(SmtError::DepthMismatch {
                expected,
                actual: self.siblings.len(),
            });
        }
        Ok(())
    }

    /// Drops siblings equal to the zero-subtree hash of their level.
    pub fn compress(&self, zero_hashes: &ZeroHashes) -> CompressedProof {
        let mut bitmap = vec![0u8; self.siblings.len().div_ceil(8)];
        let mut siblings = Vec::new();

        for (level, sibling) in self.siblings.iter().enumerate() {
            if *sibling != zero_hashes.at(level) {
                bitmap[level / 8] |= 1 << (level % 8);
                siblings.push(*sibling);
            }
        }

        CompressedProof {
            depth: self.siblings.len() as u32,
            leaf_index: self.leaf_index(),
            bitmap,
            siblings,
        }
    }
}

/// Leaf hash plus its inclusion proof.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeafProof {
    #[serde(with = "serde_fe")]
    pub leaf_hash: Fe,
    pub proof: MerkleProof,
}

impl LeafProof {
    pub fn verify(&self, root: &Fe) -> bool {
        self.proof.verify(&self.leaf_hash, root)
    }
}

/// Transport form of a [`MerkleProof`]: only non-default siblings are kept.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompressedProof {
    pub depth: u32,
    pub leaf_index: u64,
    pub bitmap: Vec<u8>,
    #[serde(with = "serde_fe_vec")]
    pub siblings: Vec<Fe>,
}

impl CompressedProof {
    pub fn decompress(&self, zero_hashes: &ZeroHashes) -> Result<MerkleProof> {
        let depth = self.depth as usize;
        if depth != zero_hashes.depth() || self.bitmap.len() != depth.div_ceil(8) {
            return Err(SmtError::InvalidProof);
        }
        if depth < 64 && self.leaf_index >> depth != 0 {
            return Err(SmtError::InvalidProof);
        }

        let mut sib_iter = self.siblings.iter();
        let mut siblings = Vec::with_capacity(depth);
        let mut directions = Vec::with_capacity(depth);

        for level in 0..depth {
            let present = (self.bitmap[level / 8] >> (level % 8)) & 1 == 1;
            if present {
                let s = sib_iter.next().ok_or(SmtError::InvalidProof)?;
                siblings.push(*s);
            } else {
                siblings.push(zero_hashes.at(level));
            }
            directions.push(((self.leaf_index >> level) & 1) as u8);
        }

        if sib_iter.next().is_some() {
            return Err(SmtError::InvalidProof); // too many siblings
        }
        // unused high bits of the last bitmap byte must stay clear
        if depth % 8 != 0 {
            if let Some(last) = self.bitmap.last() {
                if last >> (depth % 8) != 0 {
                    return Err(SmtError::InvalidProof);
                }
            }
        }

        Ok(MerkleProof { siblings, directions })
    }
}
