//! Deterministic opening selection from challenge randomness.
//!
//! Opening `k` reads bits `k*depth .. (k+1)*depth` of the randomness as a raw
//! index and reduces it modulo the leaf count. The reduction is not uniform
//! when the leaf count does not divide `2^depth`; verifiers replay exactly
//! this reduction, so it must not change.

use ark_ff::{BigInteger, PrimeField};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smt::field::{Fe, FIELD_BITS};
use smt::MAX_DEPTH;
use tracing::debug;

use crate::config::check_windows;
use crate::{PoiError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    pub raw_index: u64,
    pub leaf_index: u64,
    pub quotient: u64,
}

/// `width` bits of `value` starting at bit `offset` (bit 0 least significant).
/// Bits past the field width read as zero.
pub fn bit_window(value: &Fe, offset: usize, width: usize) -> u64 {
    let repr = value.into_bigint();
    (0..width.min(64)).fold(0u64, |acc, i| {
        let pos = offset + i;
        if pos < FIELD_BITS && repr.get_bit(pos) {
            acc | (1 << i)
        } else {
            acc
        }
    })
}

pub fn select_openings(randomness: &Fe, num_leaves: u64, depth: usize, openings: usize) -> Result<Vec<Opening>> {
    if depth == 0 || depth > MAX_DEPTH {
        return Err(PoiError::InvalidParams(format!("depth {depth} outside 1..={MAX_DEPTH}")));
    }
    if num_leaves == 0 {
        return Err(PoiError::EmptyTree);
    }
    if num_leaves > 1u64 << depth {
        return Err(PoiError::TooManyLeaves { num_leaves, depth });
    }
    check_windows(openings, depth)?;

    let selected: Vec<Opening> = (0..openings)
        .into_par_iter()
        .map(|k| {
            let raw_index = bit_window(randomness, k * depth, depth);
            Opening {
                raw_index,
                leaf_index: raw_index % num_leaves,
                quotient: raw_index / num_leaves,
            }
        })
        .collect();

    debug!(num_leaves, depth, openings, "poi: openings selected");
    Ok(selected)
}
