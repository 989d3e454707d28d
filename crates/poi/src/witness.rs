//! Witness assembly for the proving backend.
//!
//! The backend receives public values (commitment, randomness, public key,
//! root, leaf count) and private values (secret key, the opened chunks as
//! field elements with their proofs and index decomposition, and the boundary
//! proof). Nothing here inspects backend proofs; it only builds and checks
//! the witness.

use ark_ff::Zero;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smt::crypto::hash_leaf_elements;
use smt::field::{serde_fe, serde_fe_vec, Fe};
use smt::{
    CheckpointedSparseMerkleTree, ChunkReader, LeafHasher, LeafProof, MerkleProof, SmtError,
    SparseMerkleTree, ZeroHashes,
};
use tracing::info;

use crate::boundary::{prove_boundary, BoundaryProof};
use crate::commitment::{derive_agg_msg, derive_commitment};
use crate::config::PoiParams;
use crate::keys::derive_public_key;
use crate::selector::select_openings;
use crate::{PoiError, RelationError, Result};

/// A committed tree that can produce inclusion proofs for openings.
pub trait OpeningSource: Sync {
    fn root(&self) -> Fe;
    fn depth(&self) -> usize;
    fn num_leaves(&self) -> u64;
    fn zero_hashes(&self) -> &ZeroHashes;

    /// Leaf hash and proof at `leaf_index`. Sources that do not keep every
    /// level may re-read chunks through `chunks`.
    fn open<R: ChunkReader + ?Sized>(
        &self,
        leaf_index: u64,
        chunks: &R,
        hasher: &LeafHasher,
    ) -> std::result::Result<LeafProof, SmtError>;
}

impl OpeningSource for SparseMerkleTree {
    fn root(&self) -> Fe {
        SparseMerkleTree::root(self)
    }

    fn depth(&self) -> usize {
        SparseMerkleTree::depth(self)
    }

    fn num_leaves(&self) -> u64 {
        SparseMerkleTree::num_leaves(self)
    }

    fn zero_hashes(&self) -> &ZeroHashes {
        SparseMerkleTree::zero_hashes(self)
    }

    fn open<R: ChunkReader + ?Sized>(
        &self,
        leaf_index: u64,
        _chunks: &R,
        _hasher: &LeafHasher,
    ) -> std::result::Result<LeafProof, SmtError> {
        self.leaf_proof(leaf_index)
    }
}

impl OpeningSource for CheckpointedSparseMerkleTree {
    fn root(&self) -> Fe {
        CheckpointedSparseMerkleTree::root(self)
    }

    fn depth(&self) -> usize {
        CheckpointedSparseMerkleTree::depth(self)
    }

    fn num_leaves(&self) -> u64 {
        CheckpointedSparseMerkleTree::num_leaves(self)
    }

    fn zero_hashes(&self) -> &ZeroHashes {
        CheckpointedSparseMerkleTree::zero_hashes(self)
    }

    fn open<R: ChunkReader + ?Sized>(
        &self,
        leaf_index: u64,
        chunks: &R,
        hasher: &LeafHasher,
    ) -> std::result::Result<LeafProof, SmtError> {
        self.rebuild_proof(leaf_index, chunks, hasher)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInputs {
    #[serde(with = "serde_fe")]
    pub commitment: Fe,
    #[serde(with = "serde_fe")]
    pub randomness: Fe,
    #[serde(with = "serde_fe")]
    pub public_key: Fe,
    #[serde(with = "serde_fe")]
    pub root: Fe,
    pub num_leaves: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningWitness {
    /// The opened chunk as `elements_per_leaf` field elements
    #[serde(with = "serde_fe_vec")]
    pub elements: Vec<Fe>,
    pub leaf_index: u64,
    pub quotient: u64,
    pub proof: MerkleProof,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateInputs {
    #[serde(with = "serde_fe")]
    pub secret_key: Fe,
    pub openings: Vec<OpeningWitness>,
    pub boundary: BoundaryProof,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub public: PublicInputs,
    pub private: PrivateInputs,
}

impl Witness {
    /// Array sizes the circuit was compiled for.
    pub fn validate_shape(&self, params: &PoiParams) -> std::result::Result<(), RelationError> {
        let openings = &self.private.openings;
        if openings.len() != params.openings {
            return Err(RelationError::Shape(format!(
                "{} openings, expected {}",
                openings.len(),
                params.openings
            )));
        }
        let elements = params.elements_per_leaf();
        for (k, o) in openings.iter().enumerate() {
            if o.elements.len() != elements {
                return Err(RelationError::Shape(format!(
                    "opening {k} has {} elements, expected {elements}",
                    o.elements.len()
                )));
            }
            check_proof_shape(&o.proof, params.depth, &format!("opening {k}"))?;
        }
        check_proof_shape(&self.private.boundary.proof, params.depth, "boundary")
    }

    /// Leaf hashes recomputed from the opened elements.
    pub fn leaf_hashes(&self) -> Vec<Fe> {
        self.private
            .openings
            .iter()
            .map(|o| hash_leaf_elements(&o.elements))
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PoiError::Ser(e.to_string()))
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| PoiError::Ser(e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| PoiError::Ser(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| PoiError::Ser(e.to_string()))
    }
}

fn check_proof_shape(proof: &MerkleProof, depth: usize, what: &str) -> std::result::Result<(), RelationError> {
    if proof.siblings.len() != depth || proof.directions.len() != depth {
        return Err(RelationError::Shape(format!(
            "{what} proof has {}/{} levels, expected {depth}",
            proof.siblings.len(),
            proof.directions.len()
        )));
    }
    if proof.directions.iter().any(|d| *d > 1) {
        return Err(RelationError::Shape(format!("{what} proof has a non-binary direction")));
    }
    Ok(())
}

/// Derives every public and private value from the secret key, the
/// challenge randomness and a committed tree. Openings are computed in
/// parallel; the first failing opening aborts the whole witness.
pub fn prepare_witness<S, R>(
    params: &PoiParams,
    secret_key: &Fe,
    randomness: &Fe,
    source: &S,
    chunks: &R,
) -> Result<Witness>
where
    S: OpeningSource + ?Sized,
    R: ChunkReader + ?Sized,
{
    params.validate()?;
    if source.depth() != params.depth {
        return Err(SmtError::DepthMismatch {
            expected: params.depth,
            actual: source.depth(),
        }
        .into());
    }
    if secret_key.is_zero() {
        return Err(RelationError::ZeroSecretKey.into());
    }
    if randomness.is_zero() {
        return Err(RelationError::ZeroRandomness.into());
    }

    let num_leaves = source.num_leaves();
    let public_key = derive_public_key(secret_key);
    let hasher = params.leaf_hasher();
    let selected = select_openings(randomness, num_leaves, params.depth, params.openings)?;

    let opened = selected
        .par_iter()
        .map(|sel| {
            let chunk = chunks.read_chunk(sel.leaf_index).map_err(|e| SmtError::ChunkRead {
                index: sel.leaf_index,
                source: e,
            })?;
            if chunk.len() > hasher.max_chunk_len() {
                return Err(PoiError::ChunkTooLarge {
                    index: sel.leaf_index,
                    len: chunk.len(),
                    max: hasher.max_chunk_len(),
                });
            }
            let elements = hasher.chunk_elements(&chunk);
            let leaf = source.open(sel.leaf_index, chunks, &hasher)?;
            if hash_leaf_elements(&elements) != leaf.leaf_hash {
                return Err(PoiError::ChunkMismatch { index: sel.leaf_index });
            }
            Ok((
                OpeningWitness {
                    elements,
                    leaf_index: sel.leaf_index,
                    quotient: sel.quotient,
                    proof: leaf.proof,
                },
                leaf.leaf_hash,
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    let (openings, leaf_hashes): (Vec<_>, Vec<_>) = opened.into_iter().unzip();

    let boundary = prove_boundary(source, chunks, &hasher)?;
    let agg_msg = derive_agg_msg(&leaf_hashes, randomness);
    let commitment = derive_commitment(secret_key, &agg_msg, randomness, &public_key);

    info!(
        num_leaves,
        openings = openings.len(),
        shape = %params.circuit_shape(),
        "poi: witness prepared"
    );

    Ok(Witness {
        public: PublicInputs {
            commitment,
            randomness: *randomness,
            public_key,
            root: source.root(),
            num_leaves,
        },
        private: PrivateInputs {
            secret_key: *secret_key,
            openings,
            boundary,
        },
    })
}
