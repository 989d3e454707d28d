//! Protocol parameters.
//!
//! Proving and verifying keys from the trusted setup are bound to the
//! [`CircuitShape`]; changing any of these values requires a new setup.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use smt::field::{Fe, FIELD_BITS};
use smt::{LeafHasher, ZeroHashes, MAX_DEPTH};

use crate::{PoiError, Result};

pub const DEFAULT_DEPTH: usize = 20;
pub const DEFAULT_OPENINGS: usize = 8;
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;
pub const DEFAULT_ELEMENT_SIZE: usize = 31;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoiParams {
    /// Tree depth; files hold at most `2^depth` chunks.
    pub depth: usize,
    /// Leaves opened per proof.
    pub openings: usize,
    /// Chunk size in bytes.
    pub chunk_size: usize,
    /// Bytes per field element. Must stay below the field width.
    pub element_size: usize,
}

impl Default for PoiParams {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            openings: DEFAULT_OPENINGS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            element_size: DEFAULT_ELEMENT_SIZE,
        }
    }
}

/// The parameters a circuit (and its setup keys) is compiled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CircuitShape {
    pub openings: usize,
    pub depth: usize,
    pub elements_per_leaf: usize,
}

impl fmt::Display for CircuitShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poi-o{}-d{}-e{}", self.openings, self.depth, self.elements_per_leaf)
    }
}

impl PoiParams {
    pub fn validate(&self) -> Result<()> {
        if self.depth == 0 || self.depth > MAX_DEPTH {
            return Err(PoiError::InvalidParams(format!(
                "depth {} outside 1..={MAX_DEPTH}",
                self.depth
            )));
        }
        if self.openings == 0 {
            return Err(PoiError::InvalidParams("at least one opening is required".into()));
        }
        check_windows(self.openings, self.depth)?;
        if self.element_size == 0 || self.element_size > 31 {
            return Err(PoiError::InvalidParams(format!(
                "element size {} outside 1..=31",
                self.element_size
            )));
        }
        if self.chunk_size == 0 {
            return Err(PoiError::InvalidParams("chunk size must be positive".into()));
        }
        Ok(())
    }

    pub fn elements_per_leaf(&self) -> usize {
        self.chunk_size.div_ceil(self.element_size)
    }

    pub fn total_leaves(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn leaf_hasher(&self) -> LeafHasher {
        LeafHasher::new(self.element_size, self.elements_per_leaf())
    }

    pub fn padding_leaf_hash(&self) -> Fe {
        self.leaf_hasher().padding_leaf_hash()
    }

    pub fn zero_hashes(&self) -> ZeroHashes {
        ZeroHashes::new(self.depth, self.padding_leaf_hash())
    }

    pub fn circuit_shape(&self) -> CircuitShape {
        CircuitShape {
            openings: self.openings,
            depth: self.depth,
            elements_per_leaf: self.elements_per_leaf(),
        }
    }

    /// Parses and validates. Missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(s).map_err(|e| PoiError::Ser(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// Every opening window must lie inside the randomness' bit width.
pub(crate) fn check_windows(openings: usize, depth: usize) -> Result<()> {
    match openings.checked_mul(depth) {
        Some(needed) if needed <= FIELD_BITS => Ok(()),
        Some(needed) => Err(PoiError::WindowOutOfRange {
            needed,
            available: FIELD_BITS,
        }),
        None => Err(PoiError::InvalidParams(format!(
            "{openings} openings of {depth} bits overflow"
        ))),
    }
}
