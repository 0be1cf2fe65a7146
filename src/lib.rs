//! Merkle tree construction, inclusion proofs and proof verification
//!
//! Leaves are hashed from their string values and each parent is hashed from
//! the hex text of its left child followed by that of its right child. A level
//! with an odd number of nodes pairs its last node with itself.

mod config;
mod error;
mod hash;
mod proof;
mod tree;
mod validation;

pub use crate::{
    config::{Config, MIN_LEVELS},
    error::Error,
    hash::{Blake2s256, DigestProvider, MerkleHash, Sha256, Sha3_256, HASH_LEN},
    proof::{proof, verify, Direction, MerkleProof, ProofStep, Verification},
    tree::{MerkleTree, NodeIndex, TreeNode},
    validation::{validate, ProofBundle, ValidationReport},
};
