use smt::crypto::FieldHasher;
use smt::field::Fe;

/// `H(leafHash_0, ..., leafHash_{k-1}, randomness)`
pub fn derive_agg_msg(leaf_hashes: &[Fe], randomness: &Fe) -> Fe {
    let mut h = FieldHasher::new();
    for leaf in leaf_hashes {
        h.update(leaf);
    }
    h.update(randomness);
    h.finalize()
}

/// `H(secretKey, aggMsg, randomness, publicKey)`
pub fn derive_commitment(secret_key: &Fe, agg_msg: &Fe, randomness: &Fe, public_key: &Fe) -> Fe {
    let mut h = FieldHasher::new();
    h.update(secret_key).update(agg_msg).update(randomness).update(public_key);
    h.finalize()
}
