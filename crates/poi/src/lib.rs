//! Proof-of-inclusion protocol on top of the sparse Merkle accumulator:
//! parameters, opening selection, keys and commitment, the file-size
//! relation, witness assembly and the off-circuit relation check.

pub mod boundary;
pub mod commitment;
pub mod config;
pub mod error;
pub mod keys;
pub mod relation;
pub mod selector;
pub mod witness;

pub use boundary::*;
pub use commitment::*;
pub use config::*;
pub use error::*;
pub use keys::*;
pub use relation::*;
pub use selector::*;
pub use witness::*;
