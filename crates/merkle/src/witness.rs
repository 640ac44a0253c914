//! Merkle witnesses and root recomputation

use serde::{Deserialize, Serialize};

use crate::error::{MerkleError, MerkleResult};
use crate::field::Field;
use crate::hasher::FieldHasher;

/// Membership witness for a tree with `DEPTH + 1` levels.
///
/// `path[i]` is the sibling at level `i` (leaves are level 0) and
/// `is_left[i]` tells whether the running node is the left child there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWitness", into = "RawWitness")]
pub struct MerkleWitness<const DEPTH: usize> {
    path: [Field; DEPTH],
    is_left: [bool; DEPTH],
}

/// Witness for a height-8 tree (128 leaves)
pub type MerkleWitness8 = MerkleWitness<7>;

/// Witness for a height-20 tree (524288 leaves)
pub type MerkleWitness20 = MerkleWitness<19>;

impl<const DEPTH: usize> MerkleWitness<DEPTH> {
    /// Create a witness from sibling hashes and direction bits
    pub const fn new(path: [Field; DEPTH], is_left: [bool; DEPTH]) -> Self {
        Self { path, is_left }
    }

    /// Build from `(sibling, is_left)` steps ordered leaf to root
    pub fn from_steps(steps: &[(Field, bool)]) -> MerkleResult<Self> {
        if steps.len() != DEPTH {
            return Err(MerkleError::InvalidWitnessLength {
                expected: DEPTH,
                got: steps.len(),
            });
        }
        let mut path = [Field::ZERO; DEPTH];
        let mut is_left = [false; DEPTH];
        for (level, (sibling, left)) in steps.iter().enumerate() {
            path[level] = *sibling;
            is_left[level] = *left;
        }
        Ok(Self { path, is_left })
    }

    /// Height of the tree this witness belongs to
    pub const fn height() -> usize {
        DEPTH + 1
    }

    /// Sibling hashes, leaf to root
    pub const fn path(&self) -> &[Field; DEPTH] {
        &self.path
    }

    /// Direction bits, leaf to root
    pub const fn is_left(&self) -> &[bool; DEPTH] {
        &self.is_left
    }

    /// Fold `leaf` up the path and return the resulting root
    pub fn calculate_root<H: FieldHasher>(&self, leaf: &Field) -> Field {
        let mut hash = *leaf;
        for (sibling, is_left) in self.path.iter().zip(self.is_left.iter()) {
            let (left, right) = if *is_left {
                (hash, *sibling)
            } else {
                (*sibling, hash)
            };
            hash = H::hash_pair(&left, &right);
        }
        hash
    }

    /// Leaf index encoded by the direction bits
    pub fn calculate_index(&self) -> u64 {
        self.is_left
            .iter()
            .enumerate()
            .filter(|(_, left)| !**left)
            .fold(0u64, |index, (level, _)| index | (1u64 << level))
    }
}

/// Wire form of a witness
#[derive(Clone, Debug, Serialize, Deserialize)]
struct RawWitness {
    path: Vec<Field>,
    is_left: Vec<bool>,
}

impl<const DEPTH: usize> From<MerkleWitness<DEPTH>> for RawWitness {
    fn from(witness: MerkleWitness<DEPTH>) -> Self {
        Self {
            path: witness.path.to_vec(),
            is_left: witness.is_left.to_vec(),
        }
    }
}

impl<const DEPTH: usize> TryFrom<RawWitness> for MerkleWitness<DEPTH> {
    type Error = MerkleError;

    fn try_from(raw: RawWitness) -> Result<Self, Self::Error> {
        let got = raw.path.len().max(raw.is_left.len());
        let path = <[Field; DEPTH]>::try_from(raw.path).map_err(|v| {
            MerkleError::InvalidWitnessLength {
                expected: DEPTH,
                got: v.len(),
            }
        })?;
        let is_left = <[bool; DEPTH]>::try_from(raw.is_left)
            .map_err(|_| MerkleError::InvalidWitnessLength { expected: DEPTH, got })?;
        Ok(Self { path, is_left })
    }
}
