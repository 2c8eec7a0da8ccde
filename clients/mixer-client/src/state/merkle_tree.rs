//! Off-chain Merkle accumulator for commitment leaves
//!
//! Mirrors the program's fixed-depth Poseidon tree so a depositor can build
//! the membership witness for the withdraw circuit.
//!
//! # Layout
//! Nodes are addressed by `(level, index)`: level 0 holds the leaves, level
//! `depth` holds the root at index 0. Only non-default nodes are stored;
//! a missing node reads as the empty-subtree value for its level:
//!
//! ```text
//! zeros[0]   = 0
//! zeros[i+1] = Poseidon(zeros[i], zeros[i])
//! ```
//!
//! # Consistency
//! The accumulator performs no locking. Interleaved inserts from several
//! callers corrupt it silently, so one session owns one accumulator. Before
//! a withdrawal the local tree must be reconciled against the on-chain root.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::crypto::field::FieldElement;
use crate::crypto::poseidon::FieldHasher;
use crate::error::{MixerError, Result};

/// Tree depth shared with the circuit and the program.
pub const DEFAULT_TREE_DEPTH: u8 = 20;

/// Minimum supported tree depth
pub const MIN_TREE_DEPTH: u8 = 1;

/// Maximum supported tree depth (leaf indices stay within u64 arithmetic)
pub const MAX_TREE_DEPTH: u8 = 32;

/// Number of recent roots remembered, matching the program's window.
pub const DEFAULT_ROOT_HISTORY_SIZE: u16 = 100;

/// Canonical empty leaf.
pub const ZERO_LEAF: FieldElement = FieldElement::ZERO;

/// Merkle path for one leaf, bound to the tree state it was taken from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProof {
    pub leaf_index: u64,

    /// Sibling hash at each level, leaf level first
    pub path_elements: Vec<FieldElement>,

    /// `true` when the path node at that level is a right child
    pub path_indices: Vec<bool>,

    /// Root the path resolves to
    pub root: FieldElement,

    /// Tree version at generation time
    pub version: u64,
}

impl MembershipProof {
    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }

    /// Path directions as circuit inputs (0 = left, 1 = right).
    pub fn path_bits(&self) -> Vec<u8> {
        self.path_indices.iter().map(|&right| u8::from(right)).collect()
    }

    /// Sibling hashes as 32-byte big-endian values.
    pub fn path_bytes(&self) -> Vec<[u8; 32]> {
        self.path_elements.iter().map(FieldElement::to_bytes_be).collect()
    }
}

/// Fixed-depth sparse Merkle accumulator.
///
/// Starts uninitialized; [`MerkleAccumulator::initialize`] must run exactly
/// once before any other operation.
#[derive(Clone)]
pub struct MerkleAccumulator {
    hasher: Arc<dyn FieldHasher>,

    /// Tree depth (immutable)
    depth: u8,

    /// Empty-subtree value per level, `depth + 1` entries once initialized
    zeros: Option<Vec<FieldElement>>,

    /// Non-default nodes keyed by `(level, index)`
    nodes: HashMap<(u8, u64), FieldElement>,

    /// Bumped on every insert; identifies a tree snapshot
    version: u64,

    /// One past the highest leaf index inserted so far
    next_leaf_index: u64,

    /// Recent roots, oldest first
    root_history: VecDeque<FieldElement>,

    root_history_size: usize,
}

impl MerkleAccumulator {
    pub fn new(depth: u8, hasher: Arc<dyn FieldHasher>) -> Result<Self> {
        Self::with_root_history(depth, DEFAULT_ROOT_HISTORY_SIZE, hasher)
    }

    pub fn with_root_history(
        depth: u8,
        root_history_size: u16,
        hasher: Arc<dyn FieldHasher>,
    ) -> Result<Self> {
        if !(MIN_TREE_DEPTH..=MAX_TREE_DEPTH).contains(&depth) {
            return Err(MixerError::InvalidTreeDepth(depth));
        }

        Ok(Self {
            hasher,
            depth,
            zeros: None,
            nodes: HashMap::new(),
            version: 0,
            next_leaf_index: 0,
            root_history: VecDeque::with_capacity(root_history_size as usize),
            root_history_size: usize::from(root_history_size.max(1)),
        })
    }

    /// Rebuild a ready tree from an ordered leaf list (leaf `i` at index `i`).
    pub fn from_leaves(
        depth: u8,
        hasher: Arc<dyn FieldHasher>,
        leaves: &[FieldElement],
    ) -> Result<Self> {
        let mut tree = Self::new(depth, hasher)?;
        tree.initialize()?;
        for (index, leaf) in leaves.iter().enumerate() {
            tree.insert_leaf(index as u64, *leaf)?;
        }
        Ok(tree)
    }

    /// Compute the empty-subtree value for every level.
    ///
    /// These must match the circuit's and the program's zero values exactly.
    pub fn initialize(&mut self) -> Result<()> {
        if self.zeros.is_some() {
            return Err(MixerError::AlreadyInitialized);
        }

        let mut zeros = Vec::with_capacity(usize::from(self.depth) + 1);
        zeros.push(ZERO_LEAF);
        for level in 0..usize::from(self.depth) {
            let below = zeros[level];
            zeros.push(self.hasher.hash2(&below, &below)?);
        }

        let empty_root = zeros[usize::from(self.depth)];
        self.zeros = Some(zeros);
        self.remember_root(empty_root);

        info!(depth = self.depth, empty_root = %empty_root, "Merkle accumulator initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.zeros.is_some()
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Number of leaf slots: `2^depth`.
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// One past the highest leaf index inserted so far.
    pub fn next_leaf_index(&self) -> u64 {
        self.next_leaf_index
    }

    /// Empty-subtree values, `zeros[level]`.
    pub fn zeros(&self) -> Result<&[FieldElement]> {
        self.zeros.as_deref().ok_or(MixerError::NotInitialized)
    }

    /// Node at `(level, index)`, or the level default when never written.
    pub fn node(&self, level: u8, index: u64) -> Result<FieldElement> {
        let zeros = self.zeros()?;
        if level > self.depth || index >= (1u64 << (self.depth - level)) {
            return Err(MixerError::LeafIndexOutOfRange {
                index,
                capacity: 1u64 << (self.depth - level.min(self.depth)),
            });
        }
        Ok(self
            .nodes
            .get(&(level, index))
            .copied()
            .unwrap_or(zeros[usize::from(level)]))
    }

    /// Leaf inserted at `index`, if any.
    pub fn leaf(&self, index: u64) -> Option<FieldElement> {
        self.nodes.get(&(0, index)).copied()
    }

    pub fn root(&self) -> Result<FieldElement> {
        self.node(self.depth, 0)
    }

    fn check_index(&self, leaf_index: u64) -> Result<()> {
        if leaf_index >= self.capacity() {
            return Err(MixerError::LeafIndexOutOfRange {
                index: leaf_index,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    /// Set a leaf and recompute its path to the root. Returns the new root.
    ///
    /// Indices are assigned by the program's deposit counter; the accumulator
    /// does not enforce monotonicity or reject overwrites.
    pub fn insert_leaf(&mut self, leaf_index: u64, leaf: FieldElement) -> Result<FieldElement> {
        let zeros = self.zeros.as_ref().ok_or(MixerError::NotInitialized)?;
        self.check_index(leaf_index)?;

        // Hash the whole path first so a failure leaves the tree untouched.
        let mut updates = Vec::with_capacity(usize::from(self.depth) + 1);
        updates.push(((0u8, leaf_index), leaf));

        let mut current_index = leaf_index;
        let mut current_hash = leaf;

        for level in 0..self.depth {
            let sibling = self
                .nodes
                .get(&(level, current_index ^ 1))
                .copied()
                .unwrap_or(zeros[usize::from(level)]);

            current_hash = if current_index & 1 == 0 {
                self.hasher.hash2(&current_hash, &sibling)?
            } else {
                self.hasher.hash2(&sibling, &current_hash)?
            };

            current_index >>= 1;
            updates.push(((level + 1, current_index), current_hash));
        }

        self.nodes.extend(updates);
        self.version += 1;
        self.next_leaf_index = self.next_leaf_index.max(leaf_index + 1);
        self.remember_root(current_hash);

        debug!(leaf_index, root = %current_hash, version = self.version, "Leaf inserted");
        Ok(current_hash)
    }

    /// Collect the sibling path for an inserted leaf. Read-only.
    ///
    /// The proof is only valid against the current root; it carries the tree
    /// version so a later insert makes it detectably stale.
    pub fn generate_membership_proof(&self, leaf_index: u64) -> Result<MembershipProof> {
        let zeros = self.zeros()?;
        self.check_index(leaf_index)?;
        if self.leaf(leaf_index).is_none() {
            return Err(MixerError::UnknownLeaf(leaf_index));
        }

        let mut path_elements = Vec::with_capacity(usize::from(self.depth));
        let mut path_indices = Vec::with_capacity(usize::from(self.depth));
        let mut current_index = leaf_index;

        for level in 0..self.depth {
            let sibling = self
                .nodes
                .get(&(level, current_index ^ 1))
                .copied()
                .unwrap_or(zeros[usize::from(level)]);

            path_elements.push(sibling);
            path_indices.push(current_index & 1 == 1);
            current_index >>= 1;
        }

        Ok(MembershipProof {
            leaf_index,
            path_elements,
            path_indices,
            root: self.root()?,
            version: self.version,
        })
    }

    /// Recompute the root from `leaf` and the proof path and compare it with
    /// the current root.
    ///
    /// A path of the wrong length, or whose directions disagree with
    /// `leaf_index`, does not verify.
    pub fn verify_membership_proof(
        &self,
        leaf: &FieldElement,
        leaf_index: u64,
        proof: &MembershipProof,
    ) -> Result<bool> {
        let root = self.root()?;
        let depth = usize::from(self.depth);

        if proof.path_elements.len() != depth || proof.path_indices.len() != depth {
            return Ok(false);
        }
        if leaf_index >= self.capacity() {
            return Ok(false);
        }

        let mut current_hash = *leaf;
        let mut current_index = leaf_index;

        for (sibling, &is_right) in proof.path_elements.iter().zip(&proof.path_indices) {
            if is_right != (current_index & 1 == 1) {
                return Ok(false);
            }
            current_hash = if is_right {
                self.hasher.hash2(sibling, &current_hash)?
            } else {
                self.hasher.hash2(&current_hash, sibling)?
            };
            current_index >>= 1;
        }

        Ok(current_hash == root)
    }

    /// Fail if `proof` was taken from an older state of this tree.
    pub fn ensure_fresh(&self, proof: &MembershipProof) -> Result<()> {
        let root = self.root()?;
        if proof.version != self.version || proof.root != root {
            warn!(
                proof_version = proof.version,
                tree_version = self.version,
                "Membership proof is stale"
            );
            return Err(MixerError::StaleProof {
                proof_version: proof.version,
                tree_version: self.version,
            });
        }
        Ok(())
    }

    /// Check if a root exists in recent history.
    pub fn is_known_root(&self, root: &FieldElement) -> bool {
        self.root_history.iter().any(|r| r == root)
    }

    /// Replay leaves starting at `start_index` and require the result to
    /// equal the authoritative on-chain root. On any error the tree is left
    /// as it was.
    pub fn reconcile(
        &mut self,
        start_index: u64,
        leaves: &[FieldElement],
        authoritative_root: &FieldElement,
    ) -> Result<()> {
        // Replay into a copy; the tree only changes once the roots agree.
        let mut staged = self.clone();
        for (offset, leaf) in leaves.iter().enumerate() {
            staged.insert_leaf(start_index + offset as u64, *leaf)?;
        }

        let local_root = staged.root()?;
        if local_root != *authoritative_root {
            warn!(
                expected = %authoritative_root,
                actual = %local_root,
                "Local tree diverges from the authoritative root"
            );
            return Err(MixerError::RootMismatch {
                expected: authoritative_root.to_string(),
                actual: local_root.to_string(),
            });
        }

        *self = staged;
        debug!(replayed = leaves.len(), root = %local_root, "Tree reconciled");
        Ok(())
    }

    fn remember_root(&mut self, root: FieldElement) {
        if self.root_history.len() == self.root_history_size {
            self.root_history.pop_front();
        }
        self.root_history.push_back(root);
    }
}
