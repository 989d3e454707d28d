use smt::SmtError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoiError {
    #[error("tree error: {0}")]
    Tree(#[from] SmtError),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("tree has no leaves")]
    EmptyTree,

    #[error("{num_leaves} leaves do not fit in a tree of depth {depth}")]
    TooManyLeaves { num_leaves: u64, depth: usize },

    #[error("opening windows need {needed} bits but the field has {available}")]
    WindowOutOfRange { needed: usize, available: usize },

    #[error("chunk {index} has {len} bytes, a leaf holds at most {max}")]
    ChunkTooLarge { index: u64, len: usize, max: usize },

    #[error("chunk {index} does not hash to the committed leaf")]
    ChunkMismatch { index: u64 },

    #[error("relation violated: {0}")]
    Relation(#[from] RelationError),

    #[error("Serialization error: {0}")]
    Ser(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A witness that does not satisfy the proof-of-inclusion relation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelationError {
    #[error("secret key is zero")]
    ZeroSecretKey,

    #[error("public key is zero")]
    ZeroPublicKey,

    #[error("public key is not the hash of the secret key")]
    KeyMismatch,

    #[error("randomness is zero")]
    ZeroRandomness,

    #[error("malformed witness: {0}")]
    Shape(String),

    #[error("opening {opening}: quotient and leaf index do not reproduce the challenge window")]
    OpeningIndex { opening: usize },

    #[error("opening {opening}: direction at level {level} does not match the leaf index")]
    OpeningDirection { opening: usize, level: usize },

    #[error("opening {opening}: inclusion proof does not reach the root")]
    OpeningInclusion { opening: usize },

    #[error("leaf count {num_leaves} outside 1..={capacity}")]
    BoundaryRange { num_leaves: u64, capacity: u64 },

    #[error("boundary direction at level {level} does not match the last leaf index")]
    BoundaryDirection { level: usize },

    #[error("boundary sibling at level {level} is not the empty-subtree hash")]
    BoundarySibling { level: usize },

    #[error("boundary leaf is the padding leaf")]
    BoundaryPaddingLeaf,

    #[error("boundary proof does not reach the root")]
    BoundaryInclusion,

    #[error("commitment mismatch")]
    Commitment,
}

pub type Result<T> = std::result::Result<T, PoiError>;
