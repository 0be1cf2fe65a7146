//! Merkle Tree Errors

use displaydoc::Display;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum Error {
    /// Cannot create a Merkle tree with no leaves
    EmptyInput,
    /// Expected {expected} leaves based on {levels} levels (2..={max_levels} supported), but got {actual}
    InvalidLeafCount {
        levels: u32,
        max_levels: u32,
        expected: usize,
        actual: usize,
    },
    /// Leaf index: {0} has no path in a tree of {1} leaves
    LeafNotFound(usize, usize),
    /// Invalid proof format: {0}
    InvalidProofFormat(String),
    /// Leaf data is not available to reconstruct the Merkle tree
    MissingReconstructionData,
}

impl std::error::Error for Error {}
