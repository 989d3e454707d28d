//! Prover keys and the key-leak relation.

use ark_ff::{UniformRand, Zero};
use rand::Rng;
use serde::{Deserialize, Serialize};
use smt::crypto::hash_elements;
use smt::field::{serde_fe, Fe};

use crate::RelationError;

/// Uniform non-zero secret key.
pub fn generate_secret_key<R: Rng + ?Sized>(rng: &mut R) -> Fe {
    loop {
        let sk = Fe::rand(rng);
        if !sk.is_zero() {
            return sk;
        }
    }
}

/// `pk = H(sk)`
pub fn derive_public_key(secret_key: &Fe) -> Fe {
    hash_elements(&[*secret_key])
}

/// Both keys non-zero and `pk = H(sk)`. A zero key would be trivially known
/// to everyone.
pub fn check_key_ownership(secret_key: &Fe, public_key: &Fe) -> Result<(), RelationError> {
    if secret_key.is_zero() {
        return Err(RelationError::ZeroSecretKey);
    }
    if public_key.is_zero() {
        return Err(RelationError::ZeroPublicKey);
    }
    if derive_public_key(secret_key) != *public_key {
        return Err(RelationError::KeyMismatch);
    }
    Ok(())
}

/// Proof that someone other than the registered prover knows its secret key.
/// The reporter address is public and unconstrained; it only binds the
/// report to whoever filed it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLeakWitness {
    #[serde(with = "serde_fe")]
    pub public_key: Fe,
    #[serde(with = "serde_fe")]
    pub reporter_address: Fe,
    #[serde(with = "serde_fe")]
    pub secret_key: Fe,
}

impl KeyLeakWitness {
    pub fn new(secret_key: Fe, reporter_address: Fe) -> Self {
        Self {
            public_key: derive_public_key(&secret_key),
            reporter_address,
            secret_key,
        }
    }

    pub fn check(&self) -> Result<(), RelationError> {
        check_key_ownership(&self.secret_key, &self.public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_keys_are_owned() {
        let mut rng = StdRng::seed_from_u64(11);
        let sk = generate_secret_key(&mut rng);
        let pk = derive_public_key(&sk);
        assert!(check_key_ownership(&sk, &pk).is_ok());
        assert_eq!(
            check_key_ownership(&(sk + Fe::from(1u64)), &pk),
            Err(RelationError::KeyMismatch)
        );
    }

    #[test]
    fn zero_keys_are_rejected() {
        let zero = Fe::from(0u64);
        assert_eq!(
            check_key_ownership(&zero, &derive_public_key(&zero)),
            Err(RelationError::ZeroSecretKey)
        );
        assert_eq!(
            check_key_ownership(&Fe::from(5u64), &zero),
            Err(RelationError::ZeroPublicKey)
        );
    }

    #[test]
    fn key_leak_binds_reporter_without_constraining_it() {
        let w = KeyLeakWitness::new(Fe::from(42u64), Fe::from(0xdead_beefu64));
        assert!(w.check().is_ok());

        let other = KeyLeakWitness {
            reporter_address: Fe::from(0u64),
            ..w.clone()
        };
        assert!(other.check().is_ok());

        let forged = KeyLeakWitness {
            secret_key: Fe::from(43u64),
            ..w
        };
        assert_eq!(forged.check(), Err(RelationError::KeyMismatch));
    }

    #[test]
    fn key_leak_json_uses_hex() {
        let w = KeyLeakWitness::new(Fe::from(7u64), Fe::from(9u64));
        let json = serde_json::to_value(&w).unwrap();
        assert!(json["secret_key"].as_str().unwrap().starts_with("0x"));
        let back: KeyLeakWitness = serde_json::from_value(json).unwrap();
        assert_eq!(back, w);
    }
}
