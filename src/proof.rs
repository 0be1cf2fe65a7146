//! Merkle Proof types, proof derivation and verification.

use crate::{
    error::Error,
    hash::{DigestProvider, MerkleHash},
    tree::MerkleTree,
};
use serde::{Deserialize, Serialize};
use std::{fmt, marker::PhantomData};
use tracing::debug;

/// Side of the path node a proof step's sibling sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

/// Sibling hash for one level of a proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub direction: Direction,
    pub hash: MerkleHash,
}

impl ProofStep {
    pub fn new(direction: Direction, hash: MerkleHash) -> Self {
        Self { direction, hash }
    }
}

/// Merkle Proof for an individual leaf.
///
/// Steps are ordered from the leaf's sibling up to the child of the root. On the
/// wire a proof is a JSON array of `{"direction": "left" | "right", "hash": "<hex>"}`.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerkleProof<HF: DigestProvider> {
    #[serde(skip)]
    _hasher: PhantomData<HF>,
    steps: Vec<ProofStep>,
}

impl<HF: DigestProvider> MerkleProof<HF> {
    pub fn new(steps: Vec<ProofStep>) -> Self {
        Self {
            _hasher: PhantomData,
            steps,
        }
    }

    /// Parse a proof from its JSON form
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|err| Error::InvalidProofFormat(err.to_string()))
    }

    /// Compact JSON array form of the proof
    #[allow(clippy::missing_panics_doc)] // invariant of the system
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .expect("proof steps only hold string fields and always serialize")
    }

    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Hashes recomputed from `leaf_value`, starting with the leaf hash and ending
    /// with the implied root
    pub fn computed_path(&self, leaf_value: &str) -> Vec<MerkleHash> {
        let mut last_hash = HF::hash_leaf(leaf_value);
        let mut path = Vec::with_capacity(self.steps.len() + 1);
        path.push(last_hash);
        for step in &self.steps {
            last_hash = match step.direction {
                Direction::Left => HF::hash_pair(&step.hash, &last_hash),
                Direction::Right => HF::hash_pair(&last_hash, &step.hash),
            };
            path.push(last_hash);
        }
        path
    }

    /// Compute the implied Merkle Root Hash from the pre-calculated path
    pub fn compute_implied_root(&self, leaf_value: &str) -> MerkleHash {
        // computed_path always holds at least the leaf hash
        self.computed_path(leaf_value)
            .pop()
            .unwrap_or_else(|| HF::hash_leaf(leaf_value))
    }
}

impl<HF: DigestProvider> Clone for MerkleProof<HF> {
    fn clone(&self) -> Self {
        Self::new(self.steps.clone())
    }
}

impl<HF: DigestProvider> PartialEq for MerkleProof<HF> {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps
    }
}

impl<HF: DigestProvider> fmt::Debug for MerkleProof<HF> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MerkleProof").field(&self.steps).finish()
    }
}

/// Outcome of checking a proof against a claimed root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub is_valid: bool,
    /// Leaf hash first, recomputed root last
    pub computed_path: Vec<MerkleHash>,
}

/// Calculate a Merkle Proof for the leaf at `leaf_index` of a tree built from
/// `total_leaves` leaves
pub fn proof<HF: DigestProvider>(
    tree: &MerkleTree<HF>,
    leaf_index: usize,
    total_leaves: usize,
) -> Result<MerkleProof<HF>, Error> {
    let (_, links) = tree.descend(leaf_index, total_leaves)?;
    let steps: Vec<ProofStep> = links
        .iter()
        .rev()
        .map(|link| ProofStep::new(link.direction, *tree.nodes()[link.sibling].hash()))
        .collect();
    debug!(leaf_index, total_leaves, steps = steps.len(), "derived merkle proof");
    Ok(MerkleProof::new(steps))
}

/// Recompute the root from `leaf_value` and `proof` and compare it to `claimed_root`.
///
/// The root is compared as text against the lowercase hex form of the recomputed
/// root, so any other spelling of the same digest does not match.
pub fn verify<HF: DigestProvider>(
    leaf_value: &str,
    proof: &MerkleProof<HF>,
    claimed_root: &str,
) -> Verification {
    let computed_path = proof.computed_path(leaf_value);
    let is_valid = computed_path
        .last()
        .map_or(false, |computed| computed.to_hex() == claimed_root);
    debug!(is_valid, steps = proof.len(), "verified merkle proof");
    Verification {
        is_valid,
        computed_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hash::{Blake2s256, Sha256, Sha3_256},
        test_utils::leaf_values,
    };
    use hex_literal::hex;
    use proptest::{prelude::*, proptest};

    fn alice_and_bob() -> MerkleTree<Sha256> {
        MerkleTree::build(2, ["Alice", "Bob"]).unwrap()
    }

    #[test]
    fn test_alice_and_bob_proof() {
        let tree = alice_and_bob();
        let proof = proof(&tree, 0, 2).unwrap();
        assert_eq!(
            proof.steps(),
            &[ProofStep::new(
                Direction::Right,
                MerkleHash(hex!("cd9fb1e148ccd8442e5aa74904cc73bf6fb54d1d54d333bd596aa9bb4bb4e961"))
            )]
        );

        let root = tree.root().to_string();
        let verification = verify("Alice", &proof, &root);
        assert!(verification.is_valid);
        assert_eq!(
            verification.computed_path,
            vec![Sha256::hash_leaf("Alice"), *tree.root()]
        );
        assert!(!verify("Alice", &proof, "deadbeef").is_valid);
        assert!(!verify("Bob", &proof, &root).is_valid);

        let proof = tree.proof(1).unwrap();
        assert_eq!(
            proof.steps(),
            &[ProofStep::new(Direction::Left, Sha256::hash_leaf("Alice"))]
        );
        assert!(verify("Bob", &proof, &root).is_valid);
    }

    #[test]
    fn test_proof_is_ordered_leaf_to_root() {
        let values = leaf_values(8);
        let tree = MerkleTree::<Sha256>::build(4, values.clone()).unwrap();
        let proof = tree.proof(5).unwrap();

        // leaves 0..8, level 1 8..12, level 2 12..14, root 14
        let nodes = tree.nodes();
        assert_eq!(
            proof.steps(),
            &[
                ProofStep::new(Direction::Left, *nodes[4].hash()),
                ProofStep::new(Direction::Right, *nodes[11].hash()),
                ProofStep::new(Direction::Left, *nodes[12].hash()),
            ]
        );
        assert_eq!(proof.computed_path(&values[5]), tree.path_hashes(5).unwrap());
    }

    #[test]
    fn test_proof_for_every_leaf_verifies() {
        for levels in 2..7 {
            let values = leaf_values(1 << (levels - 1));
            let tree = MerkleTree::<Sha3_256>::build(levels, values.clone()).unwrap();
            let root = tree.root().to_string();
            for (index, value) in values.iter().enumerate() {
                let proof = proof(&tree, index, values.len()).unwrap();
                assert_eq!(proof.len(), levels as usize - 1);
                assert!(verify(value, &proof, &root).is_valid);
                assert_eq!(&proof.compute_implied_root(value), tree.root());
            }
        }
    }

    #[test]
    fn test_relaxed_tree_proofs_verify() {
        for count in 1..12 {
            let values = leaf_values(count);
            let tree = MerkleTree::<Blake2s256>::from_leaves(values.clone()).unwrap();
            let root = tree.root().to_string();
            for (index, value) in values.iter().enumerate() {
                let proof = tree.proof(index).unwrap();
                assert!(verify(value, &proof, &root).is_valid, "{count} leaves, index {index}");
            }
        }
    }

    #[test]
    fn test_duplicated_leaf_proof_uses_itself_as_sibling() {
        let tree = MerkleTree::<Sha256>::from_leaves(["a", "b", "c"]).unwrap();
        let proof = tree.proof(2).unwrap();
        assert_eq!(proof.steps()[0], ProofStep::new(Direction::Right, Sha256::hash_leaf("c")));
        assert!(verify("c", &proof, &tree.root().to_string()).is_valid);
    }

    #[test]
    fn test_missing_leaf() {
        let tree = MerkleTree::<Sha256>::build(3, leaf_values(4)).unwrap();
        assert_eq!(proof(&tree, 4, 4).unwrap_err(), Error::LeafNotFound(4, 4));
        assert_eq!(proof(&tree, 1, 8).unwrap_err(), Error::LeafNotFound(1, 8));
        assert_eq!(proof(&tree, 0, 2).unwrap_err(), Error::LeafNotFound(0, 2));
    }

    #[test]
    fn test_json_wire_format() {
        let tree = alice_and_bob();
        let proof = tree.proof(0).unwrap();
        let json = proof.to_json();
        assert_eq!(
            json,
            r#"[{"direction":"right","hash":"cd9fb1e148ccd8442e5aa74904cc73bf6fb54d1d54d333bd596aa9bb4bb4e961"}]"#
        );
        assert_eq!(MerkleProof::<Sha256>::from_json(&json).unwrap(), proof);

        let with_extra_field = r#"[{"direction":"right","hash":"cd9fb1e148ccd8442e5aa74904cc73bf6fb54d1d54d333bd596aa9bb4bb4e961","note":"bob"}]"#;
        assert_eq!(MerkleProof::<Sha256>::from_json(with_extra_field).unwrap(), proof);
        assert!(MerkleProof::<Sha256>::from_json("[]").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_proofs_are_rejected() {
        let hash = Sha256::hash_leaf("Bob");
        let malformed = [
            String::from("not json"),
            String::from(r#"{"direction":"left"}"#),
            format!(r#"[{{"hash":"{hash}"}}]"#),
            String::from(r#"[{"direction":"left"}]"#),
            format!(r#"[{{"direction":"up","hash":"{hash}"}}]"#),
            String::from(r#"[{"direction":"left","hash":42}]"#),
            String::from(r#"[{"direction":"left","hash":"deadbeef"}]"#),
            String::from(r#"[null]"#),
            format!(r#"[{{"direction":"left","hash":"{}"}}]"#, hash.to_hex().to_uppercase()),
        ];
        for json in &malformed {
            assert!(
                matches!(
                    MerkleProof::<Sha256>::from_json(json),
                    Err(Error::InvalidProofFormat(_))
                ),
                "{json}"
            );
        }
    }

    #[test]
    fn test_roots_and_proofs_compare_as_lowercase_text() {
        let tree = alice_and_bob();
        let proof = tree.proof(0).unwrap();
        let root = tree.root().to_hex();
        assert!(verify("Alice", &proof, &root).is_valid);
        assert!(!verify("Alice", &proof, &root.to_uppercase()).is_valid);
        assert!(!verify("Alice", &proof, &format!(" {root}")).is_valid);

        let shouted = format!(
            r#"[{{"direction":"right","hash":"{}"}}]"#,
            proof.steps()[0].hash.to_hex().to_uppercase()
        );
        assert!(matches!(
            MerkleProof::<Sha256>::from_json(&shouted),
            Err(Error::InvalidProofFormat(_))
        ));
    }

    #[test]
    fn test_implied_root_is_end_of_computed_path() {
        let values = leaf_values(4);
        let tree = MerkleTree::<Sha256>::build(3, values.clone()).unwrap();
        for (index, value) in values.iter().enumerate() {
            let proof = tree.proof(index).unwrap();
            let path = proof.computed_path(value);
            assert_eq!(path.last(), Some(&proof.compute_implied_root(value)));
        }
        let empty = MerkleProof::<Sha256>::new(Vec::new());
        assert_eq!(empty.compute_implied_root("x"), Sha256::hash_leaf("x"));
    }

    proptest! {
        #[test]
        fn test_tampering_invalidates_proof(
            levels in 2u32..7,
            leaf_seed in any::<usize>(),
            step_seed in any::<usize>(),
            byte in 0usize..32,
            flip in 1u8..=255,
        ) {
            let values = leaf_values(1 << (levels - 1));
            let index = leaf_seed % values.len();
            let tree = MerkleTree::<Sha256>::build(levels, values.clone()).unwrap();
            let root = tree.root().to_string();
            let proof = tree.proof(index).unwrap();
            prop_assert!(verify(&values[index], &proof, &root).is_valid);

            let mut steps = proof.steps().to_vec();
            let at = step_seed % steps.len();
            steps[at].hash.0[byte] ^= flip;
            let tampered = MerkleProof::<Sha256>::new(steps);
            prop_assert!(!verify(&values[index], &tampered, &root).is_valid);

            let mut claimed = *tree.root();
            claimed.0[byte] ^= flip;
            prop_assert!(!verify(&values[index], &proof, &claimed.to_string()).is_valid);

            let altered = format!("{}?", values[index]);
            prop_assert!(!verify(&altered, &proof, &root).is_valid);
        }
    }
}
