//! Checkpointed persistence.
//!
//! Only the levels named by a [`CheckpointScheme`] are written. A proof is
//! rebuilt by splitting the path into segments between consecutive
//! checkpoints and recomputing each segment's subtree concurrently. The
//! bottom segment re-reads and re-hashes chunks unless level 0 is itself a
//! checkpoint; every other segment starts from stored entries and is cheap.
//! Graduated spacing (short gaps near the leaves, long gaps near the root)
//! keeps the segments roughly equal in cost.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunks::ChunkReader;
use crate::codec;
use crate::crypto::LeafHash;
use crate::field::Fe;
use crate::tree::{self, Level, SparseMerkleTree};
use crate::zero::ZeroHashes;
use crate::{LeafProof, MerkleProof, Result, SmtError};

/// Levels to persist, strictly ascending and ending at the tree depth.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointScheme {
    levels: Vec<usize>,
}

impl CheckpointScheme {
    pub fn new(levels: Vec<usize>) -> Self {
        Self { levels }
    }

    /// Level 10 and the root of a depth-20 tree. Smallest footprint, slowest
    /// rebuild (1024 leaf hashes per proof).
    pub fn compact() -> Self {
        Self::new(vec![10, 20])
    }

    /// Gaps of 4, 5, 6 and 5 levels on a depth-20 tree.
    pub fn balanced() -> Self {
        Self::new(vec![4, 9, 15, 20])
    }

    /// Gaps of 3, 4, 5 and 8 levels on a depth-20 tree.
    pub fn fast() -> Self {
        Self::new(vec![3, 7, 12, 20])
    }

    /// Leaves and root only: rebuilding never touches chunk data.
    pub fn leaves_only(depth: usize) -> Self {
        Self::new(vec![0, depth])
    }

    /// Preset name, if this is one of the presets.
    pub fn name(&self) -> Option<&'static str> {
        Self::presets()
            .into_iter()
            .find(|(_, preset)| preset == self)
            .map(|(name, _)| name)
    }

    pub fn presets() -> [(&'static str, Self); 3] {
        [
            ("compact", Self::compact()),
            ("balanced", Self::balanced()),
            ("fast", Self::fast()),
        ]
    }

    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    pub fn contains(&self, level: usize) -> bool {
        self.levels.binary_search(&level).is_ok()
    }

    pub fn validate(&self, depth: usize) -> Result<()> {
        let Some(&last) = self.levels.last() else {
            return Err(SmtError::InvalidScheme("checkpoint scheme has no levels".into()));
        };
        if last != depth {
            return Err(SmtError::InvalidScheme(format!(
                "checkpoint scheme must end with tree depth {depth}, got {last}"
            )));
        }
        if let Some(w) = self.levels.windows(2).find(|w| w[1] <= w[0]) {
            return Err(SmtError::InvalidScheme(format!(
                "checkpoint levels must be sorted ascending: {} <= {}",
                w[1], w[0]
            )));
        }
        Ok(())
    }

    /// Contiguous `[lo, hi)` level ranges between consecutive checkpoints.
    fn segments(&self, leaves_stored: bool) -> Vec<Segment> {
        let mut segments = Vec::with_capacity(self.levels.len());
        let mut prev = 0;
        for &cp in &self.levels {
            if cp > prev {
                segments.push(Segment {
                    lo: prev,
                    hi: cp,
                    needs_chunks: prev == 0 && !leaves_stored,
                });
            }
            prev = cp;
        }
        segments
    }
}

impl fmt::Display for CheckpointScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let levels: Vec<String> = self.levels.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", levels.join(","))
    }
}

/// Accepts a preset name or a comma-separated level list such as `4,9,15,20`.
impl FromStr for CheckpointScheme {
    type Err = SmtError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some((_, scheme)) = Self::presets().into_iter().find(|(name, _)| name.eq_ignore_ascii_case(s)) {
            return Ok(scheme);
        }
        let levels = s
            .trim_matches(|c| c == '[' || c == ']')
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<usize>()
                    .map_err(|_| SmtError::InvalidScheme(format!("bad checkpoint level {part:?}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(levels))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Segment {
    lo: usize,
    hi: usize,
    needs_chunks: bool,
}

struct SegmentOutput {
    /// (absolute level, sibling)
    siblings: Vec<(usize, Fe)>,
    leaf_hash: Option<Fe>,
}

impl SparseMerkleTree {
    /// Writes the checkpoint levels only:
    /// `u32 depth | u32 numLeaves | u32 k | k x u32 level | per level { u32 count | entries }`.
    pub fn save_checkpointed<W: Write>(&self, mut w: W, scheme: &CheckpointScheme) -> Result<()> {
        self.to_checkpointed(scheme)?.save(&mut w)
    }

    /// In-memory reduction to the levels of `scheme`.
    pub fn to_checkpointed(&self, scheme: &CheckpointScheme) -> Result<CheckpointedSparseMerkleTree> {
        scheme.validate(self.depth())?;
        let levels = scheme
            .levels()
            .iter()
            .map(|&l| (l, self.levels()[l].clone()))
            .collect();
        Ok(CheckpointedSparseMerkleTree {
            root: self.root(),
            depth: self.depth(),
            num_leaves: self.num_leaves(),
            scheme: scheme.clone(),
            levels,
            zero_hashes: self.zero_hashes().clone(),
        })
    }
}

/// Reduced view of a [`SparseMerkleTree`] holding only checkpoint levels.
/// Every stored entry equals the one in the full tree that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointedSparseMerkleTree {
    root: Fe,
    depth: usize,
    num_leaves: u64,
    scheme: CheckpointScheme,
    levels: BTreeMap<usize, Level>,
    zero_hashes: ZeroHashes,
}

impl CheckpointedSparseMerkleTree {
    pub fn root(&self) -> Fe {
        self.root
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn num_leaves(&self) -> u64 {
        self.num_leaves
    }

    pub fn scheme(&self) -> &CheckpointScheme {
        &self.scheme
    }

    pub fn zero_hashes(&self) -> &ZeroHashes {
        &self.zero_hashes
    }

    pub fn level(&self, level: usize) -> Option<&Level> {
        self.levels.get(&level)
    }

    /// Number of persisted hashes across all checkpoint levels.
    pub fn stored_entries(&self) -> usize {
        self.levels.values().map(BTreeMap::len).sum()
    }

    pub fn expect_depth(&self, expected: usize) -> Result<()> {
        if self.depth != expected {
            return Err(SmtError::DepthMismatch {
                expected,
                actual: self.depth,
            });
        }
        Ok(())
    }

    pub fn save<W: Write>(&self, mut w: W) -> Result<()> {
        codec::write_u32(&mut w, self.depth as u64, "depth")?;
        codec::write_u32(&mut w, self.num_leaves, "leaf count")?;
        codec::write_u32(&mut w, self.scheme.levels().len() as u64, "checkpoint count")?;
        for &lvl in self.scheme.levels() {
            codec::write_u32(&mut w, lvl as u64, "checkpoint level")?;
        }
        let empty = Level::new();
        for lvl in self.scheme.levels() {
            codec::write_level(&mut w, self.levels.get(lvl).unwrap_or(&empty))?;
        }
        w.flush()?;
        info!(
            depth = self.depth,
            scheme = %self.scheme,
            entries = self.stored_entries(),
            "smt: checkpoint saved"
        );
        Ok(())
    }

    pub fn load<R: Read>(mut r: R, padding_leaf_hash: Fe) -> Result<Self> {
        let (depth, num_leaves) = codec::read_header(&mut r)?;
        let count = codec::read_u32(&mut r, "checkpoint count")? as usize;
        if count > depth + 1 {
            return Err(SmtError::Malformed(format!(
                "{count} checkpoint levels in a tree of depth {depth}"
            )));
        }
        let mut scheme_levels = Vec::with_capacity(count);
        for _ in 0..count {
            scheme_levels.push(codec::read_u32(&mut r, "checkpoint level")? as usize);
        }
        let scheme = CheckpointScheme::new(scheme_levels);
        scheme
            .validate(depth)
            .map_err(|e| SmtError::Malformed(e.to_string()))?;

        let mut levels = BTreeMap::new();
        for &lvl in scheme.levels() {
            let entries = codec::read_level(&mut r, lvl, depth)?;
            if lvl == 0 {
                codec::check_leaf_level(&entries, num_leaves)?;
            }
            levels.insert(lvl, entries);
        }

        let zero_hashes = ZeroHashes::new(depth, padding_leaf_hash);
        let root = levels
            .get(&depth)
            .and_then(|top| top.get(&0))
            .copied()
            .unwrap_or_else(|| zero_hashes.empty_root());
        debug!(depth, leaves = num_leaves, scheme = %scheme, "smt: checkpoint loaded");

        Ok(Self {
            root,
            depth,
            num_leaves,
            scheme,
            levels,
            zero_hashes,
        })
    }

    /// Reconstructs the leaf hash and inclusion proof for `leaf_index`,
    /// identical to what the full tree would return.
    ///
    /// `reader` is only consulted for the bottom segment and only for indices
    /// below [`num_leaves`](Self::num_leaves). The first chunk read error
    /// aborts the rebuild.
    pub fn rebuild_proof<R, H>(&self, leaf_index: u64, reader: &R, hasher: &H) -> Result<LeafProof>
    where
        R: ChunkReader + ?Sized,
        H: LeafHash + ?Sized,
    {
        tree::check_index(leaf_index, self.depth)?;

        let segments = self.scheme.segments(self.levels.contains_key(&0));
        let outputs = segments
            .par_iter()
            .map(|seg| self.rebuild_segment(*seg, leaf_index, segments.len(), reader, hasher))
            .collect::<Result<Vec<_>>>()?;

        let mut siblings: Vec<Fe> = (0..self.depth).map(|l| self.zero_hashes.at(l)).collect();
        let mut leaf_hash = None;
        for out in outputs {
            for (level, sibling) in out.siblings {
                siblings[level] = sibling;
            }
            leaf_hash = leaf_hash.or(out.leaf_hash);
        }
        let directions = (0..self.depth).map(|l| ((leaf_index >> l) & 1) as u8).collect();

        debug!(leaf = leaf_index, segments = segments.len(), "smt: proof rebuilt");
        Ok(LeafProof {
            leaf_hash: leaf_hash.unwrap_or_else(|| self.zero_hashes.padding_leaf()),
            proof: MerkleProof { siblings, directions },
        })
    }

    fn rebuild_segment<R, H>(
        &self,
        seg: Segment,
        leaf_index: u64,
        num_segments: usize,
        reader: &R,
        hasher: &H,
    ) -> Result<SegmentOutput>
    where
        R: ChunkReader + ?Sized,
        H: LeafHash + ?Sized,
    {
        let gap = seg.hi - seg.lo;
        let base_start = (leaf_index >> seg.hi) << gap;
        let base_end = base_start + (1u64 << gap);

        let base = if seg.needs_chunks {
            self.hash_bottom_subtree(base_start, base_end, num_segments, reader, hasher)?
        } else {
            self.levels
                .get(&seg.lo)
                .map(|stored| stored.range(base_start..base_end).map(|(&i, &h)| (i, h)).collect())
                .unwrap_or_default()
        };
        let leaf_hash = (seg.lo == 0)
            .then(|| base.get(&leaf_index).copied().unwrap_or_else(|| self.zero_hashes.padding_leaf()));

        let mut siblings = Vec::with_capacity(gap);
        let mut current = base;
        for level in seg.lo..seg.hi {
            let zero = self.zero_hashes.at(level);
            let node = leaf_index >> level;
            siblings.push((level, current.get(&(node ^ 1)).copied().unwrap_or(zero)));
            if level + 1 < seg.hi {
                current = tree::parent_level(&current, &zero);
            }
        }

        Ok(SegmentOutput { siblings, leaf_hash })
    }

    /// Re-hashes the real leaves in `[start, end)`. The other segments run
    /// alongside, so one thread is left to each of them.
    fn hash_bottom_subtree<R, H>(
        &self,
        start: u64,
        end: u64,
        num_segments: usize,
        reader: &R,
        hasher: &H,
    ) -> Result<Level>
    where
        R: ChunkReader + ?Sized,
        H: LeafHash + ?Sized,
    {
        let end = end.min(self.num_leaves);
        if start >= end {
            return Ok(Level::new());
        }
        let count = (end - start) as usize;

        let mut workers = rayon::current_num_threads();
        if num_segments > 1 && workers > num_segments {
            workers -= num_segments - 1;
        }
        let workers = workers.clamp(1, count);

        let hashes = (0..count)
            .into_par_iter()
            .with_min_len(count.div_ceil(workers))
            .map(|offset| {
                let index = start + offset as u64;
                let chunk = reader
                    .read_chunk(index)
                    .map_err(|source| SmtError::ChunkRead { index, source })?;
                Ok((index, hasher.hash_leaf(&chunk)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(hashes.into_iter().collect())
    }
}
