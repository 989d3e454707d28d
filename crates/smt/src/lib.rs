//! Fixed-depth sparse Merkle accumulator over the BN254 scalar field.
//!
//! Only populated positions are stored; every other position is implicitly
//! the padding leaf, represented by a precomputed zero-subtree chain. Trees
//! can be persisted whole or as a checkpointed subset of levels from which
//! any inclusion proof is rebuilt on demand.

pub mod checkpoint;
pub mod chunks;
mod codec;
pub mod crypto;
pub mod field;
mod proof;
mod tree;
mod zero;

pub use checkpoint::{CheckpointScheme, CheckpointedSparseMerkleTree};
pub use chunks::{split_into_chunks, ChunkReader, FileChunks, InMemoryChunks};
pub use crypto::{hash_nodes, LeafHash, LeafHasher, DOMAIN_TAG_PADDING, DOMAIN_TAG_REAL};
pub use field::Fe;
pub use proof::{CompressedProof, LeafProof, MerkleProof};
pub use tree::{Level, SparseMerkleTree, MAX_DEPTH};
pub use zero::ZeroHashes;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmtError {
    #[error("tree depth {0} is outside 1..={max}", max = MAX_DEPTH)]
    InvalidDepth(usize),

    #[error("{count} leaves do not fit in a tree of depth {depth}")]
    TooManyLeaves { count: u64, depth: usize },

    #[error("leaf index {index} is outside a tree of depth {depth}")]
    LeafIndexOutOfRange { index: u64, depth: usize },

    #[error("proof depth {actual} does not match expected depth {expected}")]
    DepthMismatch { expected: usize, actual: usize },

    #[error("invalid checkpoint scheme: {0}")]
    InvalidScheme(String),

    #[error("malformed tree data: {0}")]
    Malformed(String),

    #[error("failed to read chunk {index}: {source}")]
    ChunkRead {
        index: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid proof")]
    InvalidProof,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SmtError>;
