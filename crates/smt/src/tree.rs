use std::collections::BTreeMap;
use std::io::{Read, Write};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::codec;
use crate::crypto::{self, LeafHash};
use crate::field::Fe;
use crate::zero::ZeroHashes;
use crate::{LeafProof, MerkleProof, Result, SmtError};

/// Deepest supported tree: node indices are persisted as `u32`.
pub const MAX_DEPTH: usize = 32;

/// Populated nodes of one tree level, keyed by index within the level.
pub type Level = BTreeMap<u64, Fe>;

/// Fixed-depth sparse Merkle tree over a list of chunks.
///
/// Real leaves occupy indices `0..num_leaves`; every other position is the
/// padding leaf and is never stored. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparseMerkleTree {
    root: Fe,
    depth: usize,
    num_leaves: u64,
    /// levels[0] = leaves, levels[depth] = root
    levels: Vec<Level>,
    zero_hashes: ZeroHashes,
}

impl SparseMerkleTree {
    /// Hashes `chunks` in parallel and builds the tree bottom-up.
    pub fn build<C, H>(chunks: &[C], depth: usize, hasher: &H, padding_leaf_hash: Fe) -> Result<Self>
    where
        C: AsRef<[u8]> + Sync,
        H: LeafHash + ?Sized,
    {
        check_shape(depth, chunks.len() as u64)?;
        let leaf_hashes = hash_leaves(chunks.len(), |i| hasher.hash_leaf(chunks[i].as_ref()));
        Self::from_leaf_hashes(leaf_hashes, depth, padding_leaf_hash)
    }

    /// Builds the tree from leaf hashes computed elsewhere.
    pub fn from_leaf_hashes(leaf_hashes: Vec<Fe>, depth: usize, padding_leaf_hash: Fe) -> Result<Self> {
        check_shape(depth, leaf_hashes.len() as u64)?;
        let zero_hashes = ZeroHashes::new(depth, padding_leaf_hash);
        let num_leaves = leaf_hashes.len() as u64;

        let mut levels = Vec::with_capacity(depth + 1);
        levels.push(
            leaf_hashes
                .into_iter()
                .enumerate()
                .map(|(i, h)| (i as u64, h))
                .collect::<Level>(),
        );
        for level in 0..depth {
            let parents = parent_level(&levels[level], &zero_hashes.at(level));
            levels.push(parents);
        }

        let root = levels[depth].get(&0).copied().unwrap_or_else(|| zero_hashes.empty_root());
        info!(leaves = num_leaves, depth, "smt: built");

        Ok(Self {
            root,
            depth,
            num_leaves,
            levels,
            zero_hashes,
        })
    }

    /// Reassembles a tree from deserialized levels. `levels` must have
    /// `depth + 1` entries.
    pub(crate) fn from_parts(depth: usize, num_leaves: u64, levels: Vec<Level>, zero_hashes: ZeroHashes) -> Self {
        let root = levels[depth].get(&0).copied().unwrap_or_else(|| zero_hashes.empty_root());
        Self {
            root,
            depth,
            num_leaves,
            levels,
            zero_hashes,
        }
    }

    pub fn root(&self) -> Fe {
        self.root
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn num_leaves(&self) -> u64 {
        self.num_leaves
    }

    pub fn zero_hashes(&self) -> &ZeroHashes {
        &self.zero_hashes
    }

    pub fn level(&self, level: usize) -> Option<&Level> {
        self.levels.get(level)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Fails unless the tree has the depth the caller was configured for.
    pub fn expect_depth(&self, expected: usize) -> Result<()> {
        if self.depth != expected {
            return Err(SmtError::DepthMismatch {
                expected,
                actual: self.depth,
            });
        }
        Ok(())
    }

    /// Hash at `leaf_index`; positions past the real leaves are the padding leaf.
    pub fn leaf_hash(&self, leaf_index: u64) -> Result<Fe> {
        check_index(leaf_index, self.depth)?;
        Ok(self.levels[0]
            .get(&leaf_index)
            .copied()
            .unwrap_or_else(|| self.zero_hashes.padding_leaf()))
    }

    /// Inclusion proof for any position of the tree, padding included.
    pub fn proof(&self, leaf_index: u64) -> Result<MerkleProof> {
        check_index(leaf_index, self.depth)?;

        let mut siblings = Vec::with_capacity(self.depth);
        let mut directions = Vec::with_capacity(self.depth);
        let mut idx = leaf_index;

        for level in 0..self.depth {
            let sibling = self.levels[level]
                .get(&(idx ^ 1))
                .copied()
                .unwrap_or_else(|| self.zero_hashes.at(level));
            siblings.push(sibling);
            directions.push((idx & 1) as u8);
            idx >>= 1;
        }

        Ok(MerkleProof { siblings, directions })
    }

    pub fn leaf_proof(&self, leaf_index: u64) -> Result<LeafProof> {
        Ok(LeafProof {
            leaf_hash: self.leaf_hash(leaf_index)?,
            proof: self.proof(leaf_index)?,
        })
    }

    /// Writes every populated entry:
    /// `u32 depth | u32 numLeaves | per level { u32 count | (u32 index | 32-byte hash)* }`.
    pub fn save<W: Write>(&self, mut w: W) -> Result<()> {
        codec::write_u32(&mut w, self.depth as u64, "depth")?;
        codec::write_u32(&mut w, self.num_leaves, "leaf count")?;
        for level in &self.levels {
            codec::write_level(&mut w, level)?;
        }
        w.flush()?;
        debug!(depth = self.depth, leaves = self.num_leaves, "smt: saved");
        Ok(())
    }

    /// Reads a tree written by [`save`](Self::save). The padding leaf hash is a
    /// protocol constant and is supplied by the caller, never stored.
    pub fn load<R: Read>(mut r: R, padding_leaf_hash: Fe) -> Result<Self> {
        let (depth, num_leaves) = codec::read_header(&mut r)?;
        let mut levels = Vec::with_capacity(depth + 1);
        for level in 0..=depth {
            levels.push(codec::read_level(&mut r, level, depth)?);
        }
        codec::check_leaf_level(&levels[0], num_leaves)?;

        let zero_hashes = ZeroHashes::new(depth, padding_leaf_hash);
        debug!(depth, leaves = num_leaves, "smt: loaded");
        Ok(Self::from_parts(depth, num_leaves, levels, zero_hashes))
    }
}

pub(crate) fn check_shape(depth: usize, num_leaves: u64) -> Result<()> {
    if depth == 0 || depth > MAX_DEPTH {
        return Err(SmtError::InvalidDepth(depth));
    }
    if num_leaves > 1u64 << depth {
        return Err(SmtError::TooManyLeaves {
            count: num_leaves,
            depth,
        });
    }
    Ok(())
}

pub(crate) fn check_index(leaf_index: u64, depth: usize) -> Result<()> {
    if leaf_index >> depth != 0 {
        return Err(SmtError::LeafIndexOutOfRange {
            index: leaf_index,
            depth,
        });
    }
    Ok(())
}

/// Fork/join leaf hashing: at most one worker per available thread and never
/// more workers than leaves. Output order follows the input indices.
pub(crate) fn hash_leaves<F>(count: usize, hash_one: F) -> Vec<Fe>
where
    F: Fn(usize) -> Fe + Sync + Send,
{
    if count == 0 {
        return Vec::new();
    }
    let workers = rayon::current_num_threads().clamp(1, count);
    (0..count)
        .into_par_iter()
        .with_min_len(count.div_ceil(workers))
        .map(hash_one)
        .collect()
}

/// Hashes every parent that has at least one populated child. Missing
/// children are replaced by `zero`.
pub(crate) fn parent_level(children: &Level, zero: &Fe) -> Level {
    let mut parents = Level::new();
    let mut iter = children.iter().peekable();

    while let Some((&idx, hash)) = iter.next() {
        let (left, right) = if idx & 1 == 0 {
            let right = match iter.peek() {
                Some((&next, next_hash)) if next == idx + 1 => {
                    let h = **next_hash;
                    iter.next();
                    h
                }
                _ => *zero,
            };
            (*hash, right)
        } else {
            // a populated left sibling would have been consumed above
            (*zero, *hash)
        };
        parents.insert(idx >> 1, crypto::hash_nodes(&left, &right));
    }

    parents
}
