//! Proof payloads exchanged with a viewer, and their validation.
//!
//! A [`ProofBundle`] carries everything needed to check one leaf against a root:
//! the claimed root, the leaf value, the proof as JSON text, and optionally the
//! whole leaf sequence so the checked path can be drawn on a rebuilt tree.

use crate::{
    config::{leaf_count, Config},
    error::Error,
    hash::DigestProvider,
    proof::{verify, MerkleProof, Verification},
    tree::{MerkleTree, NodeIndex},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofBundle {
    pub root_hash: String,
    pub leaf_data: String,
    /// JSON array of proof steps
    pub proof: String,
    #[serde(default)]
    pub leaf_data_array: Vec<String>,
}

impl ProofBundle {
    /// Payload proving the leaf at `leaf_index` of `tree`.
    ///
    /// Only full trees of at least two leaves are accepted, since [`validate`]
    /// rebuilds the tree with the strict builder.
    pub fn new<HF: DigestProvider>(tree: &MerkleTree<HF>, leaf_index: usize) -> Result<Self, Error> {
        let actual = tree.num_leaves();
        if actual < 2 || !actual.is_power_of_two() {
            let levels = levels_for(actual);
            return Err(Error::InvalidLeafCount {
                levels,
                max_levels: Config::default().max_levels,
                expected: leaf_count(levels),
                actual,
            });
        }
        let proof = tree.proof(leaf_index)?;
        Ok(Self {
            root_hash: tree.root().to_string(),
            leaf_data: tree.leaves()[leaf_index].clone(),
            proof: proof.to_json(),
            leaf_data_array: tree.leaves().to_vec(),
        })
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A checked proof together with the tree rebuilt from the bundle's leaves
pub struct ValidationReport<HF: DigestProvider> {
    pub proof: MerkleProof<HF>,
    pub verification: Verification,
    pub tree: MerkleTree<HF>,
    /// Nodes of `tree` lying on the recomputed path
    pub highlighted: Vec<NodeIndex>,
}

impl<HF: DigestProvider> fmt::Debug for ValidationReport<HF> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationReport")
            .field("proof", &self.proof)
            .field("verification", &self.verification)
            .field("tree", &self.tree)
            .field("highlighted", &self.highlighted)
            .finish()
    }
}

/// Number of levels of the smallest full tree holding `leaves` leaves
fn levels_for(leaves: usize) -> u32 {
    leaves.next_power_of_two().trailing_zeros() + 1
}

/// Verify the bundle's proof and rebuild its tree.
///
/// Fails if the proof does not parse, if the bundle has no leaf sequence, or if
/// the leaf sequence cannot form a full tree.
pub fn validate<HF: DigestProvider>(
    bundle: &ProofBundle,
    config: &Config,
) -> Result<ValidationReport<HF>, Error> {
    let proof = MerkleProof::<HF>::from_json(&bundle.proof)?;
    let verification = verify(&bundle.leaf_data, &proof, &bundle.root_hash);

    if bundle.leaf_data_array.is_empty() {
        return Err(Error::MissingReconstructionData);
    }
    let levels = levels_for(bundle.leaf_data_array.len());
    let tree = MerkleTree::build_with_config(config, levels, bundle.leaf_data_array.iter().cloned())?;
    let highlighted = tree.highlight(&verification.computed_path);
    debug!(
        is_valid = verification.is_valid,
        levels,
        highlighted = highlighted.len(),
        "validated proof bundle"
    );

    Ok(ValidationReport {
        proof,
        verification,
        tree,
        highlighted,
    })
}
