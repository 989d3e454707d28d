//! Hashes of all-padding subtrees.

use crate::crypto;
use crate::field::Fe;

/// `zh[0]` is the padding leaf hash, `zh[i] = H(zh[i-1], zh[i-1])`.
///
/// Owned by the tree that computed it and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZeroHashes {
    chain: Vec<Fe>,
}

impl ZeroHashes {
    pub fn new(depth: usize, padding_leaf_hash: Fe) -> Self {
        let mut chain = Vec::with_capacity(depth + 1);
        chain.push(padding_leaf_hash);
        for level in 0..depth {
            let prev = chain[level];
            chain.push(crypto::hash_nodes(&prev, &prev));
        }
        Self { chain }
    }

    pub fn depth(&self) -> usize {
        self.chain.len() - 1
    }

    /// Hash of an empty subtree whose root sits at `level`.
    ///
    /// Panics when `level > depth`; callers only index levels of their own tree.
    pub fn at(&self, level: usize) -> Fe {
        self.chain[level]
    }

    pub fn padding_leaf(&self) -> Fe {
        self.chain[0]
    }

    /// Root of a tree with no real leaves.
    pub fn empty_root(&self) -> Fe {
        self.chain[self.depth()]
    }

    pub fn as_slice(&self) -> &[Fe] {
        &self.chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_has_depth_plus_one_entries() {
        let zh = ZeroHashes::new(20, Fe::from(5u64));
        assert_eq!(zh.as_slice().len(), 21);
        assert_eq!(zh.depth(), 20);
        assert_eq!(zh.padding_leaf(), Fe::from(5u64));
        for l in 1..=20 {
            assert_eq!(zh.at(l), crypto::hash_nodes(&zh.at(l - 1), &zh.at(l - 1)));
        }
        assert_eq!(zh.empty_root(), zh.at(20));
    }

    #[test]
    fn chain_is_deterministic() {
        assert_eq!(ZeroHashes::new(8, Fe::from(9u64)), ZeroHashes::new(8, Fe::from(9u64)));
        assert_ne!(ZeroHashes::new(8, Fe::from(9u64)), ZeroHashes::new(8, Fe::from(10u64)));
    }
}
