//! Merkle Tree data structure.
//!
//! Nodes live in a flat arena. Leaves take the first slots in input order, every
//! folded level is appended after the level it was folded from, and the root is
//! the last slot. When a level has an odd number of nodes its last node becomes
//! both children of its parent, which shows up as `children == Some((i, i))`.

use crate::{
    config::{leaf_count, Config},
    error::Error,
    hash::{DigestProvider, MerkleHash, Sha256},
    proof::{self, Direction, MerkleProof},
};
use std::{fmt, marker::PhantomData, mem, ops::Range};
use tracing::{debug, trace};

/// Position of a node in the tree's arena
pub type NodeIndex = usize;

/// A single node of a [`MerkleTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeNode {
    hash: MerkleHash,
    children: Option<(NodeIndex, NodeIndex)>,
}

impl TreeNode {
    fn leaf(hash: MerkleHash) -> Self {
        Self {
            hash,
            children: None,
        }
    }

    fn branch(hash: MerkleHash, left: NodeIndex, right: NodeIndex) -> Self {
        Self {
            hash,
            children: Some((left, right)),
        }
    }

    pub fn hash(&self) -> &MerkleHash {
        &self.hash
    }

    /// Left and right child, `None` for leaves
    pub fn children(&self) -> Option<(NodeIndex, NodeIndex)> {
        self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// One step down from a parent towards a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link {
    pub(crate) parent: NodeIndex,
    pub(crate) sibling: NodeIndex,
    /// Side of the parent the sibling sits on
    pub(crate) direction: Direction,
}

/// Merkle Tree data structure
pub struct MerkleTree<HF: DigestProvider = Sha256> {
    _hasher: PhantomData<HF>,
    nodes: Vec<TreeNode>,
    leaves: Vec<String>,
}

impl<HF: DigestProvider> MerkleTree<HF> {
    /// Build a tree with `levels` levels from exactly `2^(levels - 1)` leaf values
    pub fn build<I>(levels: u32, leaf_values: I) -> Result<Self, Error>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::build_with_config(&Config::default(), levels, leaf_values)
    }

    /// Same as [`MerkleTree::build`] with the range of `levels` bounded by `config`
    pub fn build_with_config<I>(config: &Config, levels: u32, leaf_values: I) -> Result<Self, Error>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let leaves: Vec<String> = leaf_values.into_iter().map(Into::into).collect();
        if leaves.is_empty() {
            return Err(Error::EmptyInput);
        }
        let expected = match config.expected_leaves(levels) {
            Some(expected) if expected == leaves.len() => expected,
            expected => {
                return Err(Error::InvalidLeafCount {
                    levels,
                    max_levels: config.max_levels,
                    expected: expected.unwrap_or_else(|| leaf_count(levels)),
                    actual: leaves.len(),
                })
            }
        };

        let tree = Self::from_values(leaves);
        debug!(levels, leaves = expected, root = %tree.root(), "built merkle tree");
        Ok(tree)
    }

    /// Build a tree from any non-empty number of leaf values
    pub fn from_leaves<I>(leaf_values: I) -> Result<Self, Error>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let leaves: Vec<String> = leaf_values.into_iter().map(Into::into).collect();
        if leaves.is_empty() {
            return Err(Error::EmptyInput);
        }
        let tree = Self::from_values(leaves);
        debug!(leaves = tree.num_leaves(), root = %tree.root(), "built merkle tree");
        Ok(tree)
    }

    fn from_values(leaves: Vec<String>) -> Self {
        let mut nodes = Vec::with_capacity(2 * leaves.len());
        nodes.extend(leaves.iter().map(|value| TreeNode::leaf(HF::hash_leaf(value))));

        let mut level = 0..nodes.len();
        while level.len() > 1 {
            level = Self::fold_level(&mut nodes, level);
            trace!(nodes = level.len(), "folded level");
        }
        Self {
            _hasher: PhantomData,
            nodes,
            leaves,
        }
    }

    /// Pair up the nodes of `level` left to right and append their parents
    fn fold_level(nodes: &mut Vec<TreeNode>, level: Range<NodeIndex>) -> Range<NodeIndex> {
        let start = nodes.len();
        for left in level.clone().step_by(2) {
            let right = if left + 1 < level.end { left + 1 } else { left };
            let hash = HF::hash_pair(&nodes[left].hash, &nodes[right].hash);
            nodes.push(TreeNode::branch(hash, left, right));
        }
        start..nodes.len()
    }

    /// Get the merkle root of the tree
    pub fn root(&self) -> &MerkleHash {
        &self.root_node().hash
    }

    pub fn root_node(&self) -> &TreeNode {
        &self.nodes[self.root_index()]
    }

    pub fn root_index(&self) -> NodeIndex {
        self.nodes.len() - 1
    }

    pub fn node(&self, index: NodeIndex) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn leaves(&self) -> &[String] {
        &self.leaves
    }

    /// Get the number of leaves in the tree
    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Number of edges between a leaf and the root
    pub fn depth(&self) -> u32 {
        self.num_leaves().next_power_of_two().trailing_zeros()
    }

    /// Replace a leaf value and rebuild the tree.
    ///
    /// Returns the hashes on the path from the changed leaf up to the new root.
    pub fn set(&mut self, leaf_index: usize, value: impl Into<String>) -> Result<Vec<MerkleHash>, Error> {
        let num_leaves = self.num_leaves();
        let slot = self
            .leaves
            .get_mut(leaf_index)
            .ok_or(Error::LeafNotFound(leaf_index, num_leaves))?;
        *slot = value.into();
        *self = Self::from_values(mem::take(&mut self.leaves));
        self.path_hashes(leaf_index)
    }

    /// Calculate a Merkle Proof for a leaf of this tree
    pub fn proof(&self, leaf_index: usize) -> Result<MerkleProof<HF>, Error> {
        proof::proof(self, leaf_index, self.num_leaves())
    }

    /// Node indices from the leaf at `leaf_index` up to the root
    pub fn path(&self, leaf_index: usize) -> Result<Vec<NodeIndex>, Error> {
        let (leaf, links) = self.descend(leaf_index, self.num_leaves())?;
        let mut path = Vec::with_capacity(links.len() + 1);
        path.push(leaf);
        path.extend(links.iter().rev().map(|link| link.parent));
        Ok(path)
    }

    /// Hashes from the leaf at `leaf_index` up to the root
    pub fn path_hashes(&self, leaf_index: usize) -> Result<Vec<MerkleHash>, Error> {
        Ok(self
            .path(leaf_index)?
            .into_iter()
            .map(|index| self.nodes[index].hash)
            .collect())
    }

    /// Indices of every node whose hash is one of `hashes`
    pub fn highlight(&self, hashes: &[MerkleHash]) -> Vec<NodeIndex> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| hashes.contains(&node.hash))
            .map(|(index, _)| index)
            .collect()
    }

    /// Walk from the root to the leaf at `leaf_index`.
    ///
    /// The root covers `total_leaves.next_power_of_two()` leaf positions and every
    /// child covers half of its parent's. Returns the leaf and the links taken,
    /// root first.
    pub(crate) fn descend(
        &self,
        leaf_index: usize,
        total_leaves: usize,
    ) -> Result<(NodeIndex, Vec<Link>), Error> {
        let not_found = || Error::LeafNotFound(leaf_index, total_leaves);
        if total_leaves != self.num_leaves() || leaf_index >= total_leaves {
            return Err(not_found());
        }

        let mut links = Vec::new();
        let mut node = self.root_index();
        let mut start = 0;
        let mut span = total_leaves.next_power_of_two();
        while let Some((left, right)) = self.nodes[node].children {
            span /= 2;
            if span == 0 {
                return Err(not_found());
            }
            if leaf_index < start + span {
                links.push(Link {
                    parent: node,
                    sibling: right,
                    direction: Direction::Right,
                });
                node = left;
            } else {
                links.push(Link {
                    parent: node,
                    sibling: left,
                    direction: Direction::Left,
                });
                node = right;
                start += span;
            }
        }
        if span != 1 || start != leaf_index {
            return Err(not_found());
        }
        Ok((node, links))
    }
}

impl<HF: DigestProvider> Clone for MerkleTree<HF> {
    fn clone(&self) -> Self {
        Self {
            _hasher: PhantomData,
            nodes: self.nodes.clone(),
            leaves: self.leaves.clone(),
        }
    }
}

impl<HF: DigestProvider> fmt::Debug for MerkleTree<HF> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerkleTree")
            .field("root", self.root())
            .field("leaves", &self.leaves)
            .field("nodes", &self.nodes)
            .finish()
    }
}
