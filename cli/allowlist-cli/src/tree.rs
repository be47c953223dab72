//! Binary Merkle tree over entitlement leaves.
//!
//! Internal nodes are `Keccak256(left || right)`. A level of odd length
//! duplicates its trailing node as its own sibling, so every parent hashes
//! exactly 64 bytes; the same rule drives proof generation and must be
//! mirrored by any verifier. Pair order is positional, never sorted; each
//! proof step records the side its sibling sits on.
//!
//! Leaf and internal hashing share one unprefixed Keccak-256. A 52-byte
//! entry encoding (see [`crate::codec`]) cannot collide with a 64-byte
//! inner-node pre-image, but callers feeding pre-hashed leaves from other
//! sources must keep that distinction themselves.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Side on which a proof sibling sits relative to the running hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Right,
}

/// One step of an authentication path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: [u8; 32],
    pub position: Position,
}

/// Authentication path from a leaf to the root, leaf-adjacent step first.
///
/// A proof is self-contained once generated: verifying it needs only the
/// leaf hash and the published root, not the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub steps: Vec<ProofStep>,
}

/// Errors from tree construction and proof generation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("Cannot build a Merkle tree from zero leaves")]
    EmptyInput,

    #[error("Leaf index {index} is out of bounds for tree with {leaf_count} leaves")]
    IndexOutOfRange { index: usize, leaf_count: usize },

    #[error("Invalid tree structure: level {level} has {actual} nodes but expected {expected}")]
    MalformedLevels {
        level: usize,
        actual: usize,
        expected: usize,
    },
}

/// A binary Merkle tree with all levels retained.
///
/// `levels[0]` holds the leaves in input order; the last level is the
/// single root. Keeping every level lets proofs for arbitrary indices be
/// derived without rebuilding.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Builds a tree bottom-up from an ordered sequence of leaf hashes.
    ///
    /// Duplicate leaves are kept as-is; the engine does not deduplicate.
    ///
    /// # Errors
    /// Fails with [`TreeError::EmptyInput`] when `leaves` is empty.
    pub fn build(leaves: Vec<[u8; 32]>) -> Result<Self, TreeError> {
        if leaves.is_empty() {
            return Err(TreeError::EmptyInput);
        }

        let mut levels = vec![leaves];
        while levels.last().unwrap().len() > 1 {
            let prev = levels.last().unwrap();
            let mut next = Vec::with_capacity(prev.len().div_ceil(2));
            for pair in prev.chunks(2) {
                let left = pair[0];
                let right = if pair.len() == 2 { pair[1] } else { left };
                next.push(hash_pair(&left, &right));
            }
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// Wraps externally assembled levels, for trees reloaded from storage.
    ///
    /// Only the level shape is checked (`len(level[i+1]) ==
    /// ceil(len(level[i]) / 2)`, final level of one node); hash consistency
    /// is not recomputed, so a corrupted node surfaces later as a proof
    /// that fails verification.
    pub fn from_levels(levels: Vec<Vec<[u8; 32]>>) -> Result<Self, TreeError> {
        if levels.first().is_none_or(|leaves| leaves.is_empty()) {
            return Err(TreeError::EmptyInput);
        }
        for level_num in 1..levels.len() {
            let expected = levels[level_num - 1].len().div_ceil(2);
            if levels[level_num].len() != expected {
                return Err(TreeError::MalformedLevels {
                    level: level_num,
                    actual: levels[level_num].len(),
                    expected,
                });
            }
        }
        let last = levels.last().unwrap();
        if last.len() != 1 {
            return Err(TreeError::MalformedLevels {
                level: levels.len() - 1,
                actual: last.len(),
                expected: 1,
            });
        }
        Ok(Self { levels })
    }

    /// The Merkle root.
    pub fn root(&self) -> [u8; 32] {
        self.levels.last().unwrap()[0]
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// All levels, bottom-up. `levels()[0]` is the leaf level.
    pub fn levels(&self) -> &[Vec<[u8; 32]>] {
        &self.levels
    }

    /// Derives the authentication path for the leaf at `leaf_index`.
    ///
    /// At each level the sibling of an even index is the node to its right,
    /// or the node itself when it is the unpaired trailing node; the
    /// sibling of an odd index is the node to its left. A single-leaf tree
    /// yields an empty proof.
    ///
    /// # Errors
    /// Fails with [`TreeError::IndexOutOfRange`] when `leaf_index` is not a
    /// leaf position; the tree itself remains usable.
    pub fn prove_for(&self, leaf_index: usize) -> Result<MerkleProof, TreeError> {
        if leaf_index >= self.leaf_count() {
            return Err(TreeError::IndexOutOfRange {
                index: leaf_index,
                leaf_count: self.leaf_count(),
            });
        }

        let mut steps = Vec::with_capacity(self.levels.len() - 1);
        let mut idx = leaf_index;

        for level in &self.levels[..self.levels.len() - 1] {
            let step = if idx % 2 == 0 {
                let sibling_idx = if idx + 1 < level.len() { idx + 1 } else { idx };
                ProofStep {
                    sibling: level[sibling_idx],
                    position: Position::Right,
                }
            } else {
                ProofStep {
                    sibling: level[idx - 1],
                    position: Position::Left,
                }
            };
            steps.push(step);
            idx /= 2;
        }

        Ok(MerkleProof { steps })
    }
}

/// Hashes two child nodes into their parent: `Keccak256(left || right)`.
pub fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let hash = Keccak256::new()
        .chain_update(left)
        .chain_update(right)
        .finalize();
    hash.into()
}

/// Replays an authentication path and compares the result to a root.
///
/// A mismatched proof returns `false`; it is an expected outcome for
/// "entry not present with that amount", never an error.
pub fn verify(leaf: [u8; 32], proof: &MerkleProof, expected_root: [u8; 32]) -> bool {
    let mut current = leaf;
    for step in &proof.steps {
        current = match step.position {
            Position::Left => hash_pair(&step.sibling, &current),
            Position::Right => hash_pair(&current, &step.sibling),
        };
    }
    current == expected_root
}
