//! The complete proof-of-inclusion relation, checked off-circuit.
//!
//! This is the predicate the proving backend enforces. Running it before
//! handing a witness over turns an unsatisfiable witness into a precise
//! error instead of an opaque proving failure.

use ark_ff::Zero;
use tracing::debug;

use crate::boundary::check_boundary;
use crate::commitment::{derive_agg_msg, derive_commitment};
use crate::config::PoiParams;
use crate::keys::check_key_ownership;
use crate::selector::bit_window;
use crate::witness::Witness;
use crate::RelationError;

pub fn check_witness(params: &PoiParams, witness: &Witness) -> Result<(), RelationError> {
    params
        .validate()
        .map_err(|e| RelationError::Shape(e.to_string()))?;
    witness.validate_shape(params)?;

    let public = &witness.public;
    let private = &witness.private;

    check_key_ownership(&private.secret_key, &public.public_key)?;
    if public.randomness.is_zero() {
        return Err(RelationError::ZeroRandomness);
    }

    let zero_hashes = params.zero_hashes();
    check_boundary(&public.root, public.num_leaves, &private.boundary, &zero_hashes)?;
    let num_leaves = public.num_leaves;

    let leaf_hashes = witness.leaf_hashes();
    for (k, (opening, leaf_hash)) in private.openings.iter().zip(&leaf_hashes).enumerate() {
        let raw = bit_window(&public.randomness, k * params.depth, params.depth);
        let recomposed = opening
            .quotient
            .checked_mul(num_leaves)
            .and_then(|q| q.checked_add(opening.leaf_index));
        if opening.leaf_index >= num_leaves || recomposed != Some(raw) {
            return Err(RelationError::OpeningIndex { opening: k });
        }
        for (level, dir) in opening.proof.directions.iter().enumerate() {
            if u64::from(*dir) != (opening.leaf_index >> level) & 1 {
                return Err(RelationError::OpeningDirection { opening: k, level });
            }
        }
        if opening.proof.compute_root(leaf_hash) != public.root {
            return Err(RelationError::OpeningInclusion { opening: k });
        }
    }

    let agg_msg = derive_agg_msg(&leaf_hashes, &public.randomness);
    let expected = derive_commitment(&private.secret_key, &agg_msg, &public.randomness, &public.public_key);
    if expected != public.commitment {
        return Err(RelationError::Commitment);
    }

    debug!(num_leaves, openings = leaf_hashes.len(), "poi: witness satisfies relation");
    Ok(())
}
