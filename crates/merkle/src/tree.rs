//! Fixed-height binary Merkle tree

use std::collections::HashMap;
use std::marker::PhantomData;

use crate::error::{MerkleError, MerkleResult};
use crate::field::Field;
use crate::hasher::{FieldHasher, Keccak256Hasher};
use crate::witness::MerkleWitness;

/// Complete binary tree with `DEPTH + 1` levels and `2^DEPTH` leaves.
///
/// Only nodes that differ from the empty subtree at their level are stored, so a
/// height-20 tree costs memory proportional to the number of written leaves.
#[derive(Clone, Debug)]
pub struct MerkleTree<const DEPTH: usize, H: FieldHasher = Keccak256Hasher> {
    /// `nodes[level][index]`, level 0 holds the leaves
    nodes: Vec<HashMap<u64, Field>>,
    /// Empty subtree hash per level
    zeros: Vec<Field>,
    _hasher: PhantomData<H>,
}

/// Height-8 tree
pub type MerkleTree8<H = Keccak256Hasher> = MerkleTree<7, H>;

/// Height-20 tree
pub type MerkleTree20<H = Keccak256Hasher> = MerkleTree<19, H>;

impl<const DEPTH: usize, H: FieldHasher> MerkleTree<DEPTH, H> {
    const DEPTH_FITS: () = assert!(DEPTH < 64, "tree depth must be below 64");

    /// Create an empty tree
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::DEPTH_FITS;

        let mut zeros = Vec::with_capacity(DEPTH + 1);
        zeros.push(Field::ZERO);
        for level in 0..DEPTH {
            let below = zeros[level];
            zeros.push(H::hash_pair(&below, &below));
        }

        Self {
            nodes: vec![HashMap::new(); DEPTH + 1],
            zeros,
            _hasher: PhantomData,
        }
    }

    /// Number of levels including leaves and root
    pub const fn height() -> usize {
        DEPTH + 1
    }

    /// Number of leaves
    pub const fn leaf_count() -> u64 {
        1u64 << DEPTH
    }

    /// Root hash
    pub fn root(&self) -> Field {
        self.get(DEPTH, 0)
    }

    /// Node hash at `level`, `index`, or `None` outside the tree
    pub fn node(&self, level: usize, index: u64) -> Option<Field> {
        if level > DEPTH || index >= 1u64 << (DEPTH - level) {
            return None;
        }
        Some(self.get(level, index))
    }

    /// Leaf content at `index`
    pub fn leaf(&self, index: u64) -> MerkleResult<Field> {
        Self::check_index(index)?;
        Ok(self.get(0, index))
    }

    /// Write a leaf and rehash its path to the root
    pub fn set_leaf(&mut self, index: u64, value: Field) -> MerkleResult<()> {
        Self::check_index(index)?;
        self.store(0, index, value);

        let mut current = index;
        for level in 1..=DEPTH {
            current /= 2;
            let left = self.get(level - 1, current * 2);
            let right = self.get(level - 1, current * 2 + 1);
            self.store(level, current, H::hash_pair(&left, &right));
        }
        Ok(())
    }

    /// Write leaves `0..values.len()`
    pub fn fill(&mut self, values: &[Field]) -> MerkleResult<()> {
        for (index, value) in values.iter().enumerate() {
            self.set_leaf(index as u64, *value)?;
        }
        Ok(())
    }

    /// Sibling path for the leaf at `index`
    pub fn witness(&self, index: u64) -> MerkleResult<MerkleWitness<DEPTH>> {
        Self::check_index(index)?;

        let mut path = [Field::ZERO; DEPTH];
        let mut is_left = [false; DEPTH];
        let mut current = index;
        for level in 0..DEPTH {
            let left = current % 2 == 0;
            let sibling = if left { current + 1 } else { current - 1 };
            path[level] = self.get(level, sibling);
            is_left[level] = left;
            current /= 2;
        }
        Ok(MerkleWitness::new(path, is_left))
    }

    /// Check that the witness for `index` reproduces the current root
    pub fn validate(&self, index: u64) -> MerkleResult<bool> {
        let witness = self.witness(index)?;
        let leaf = self.get(0, index);
        Ok(witness.calculate_root::<H>(&leaf) == self.root())
    }

    /// Number of non-empty leaves
    pub fn occupied(&self) -> usize {
        self.nodes[0].len()
    }

    fn get(&self, level: usize, index: u64) -> Field {
        self.nodes[level]
            .get(&index)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    fn store(&mut self, level: usize, index: u64, value: Field) {
        if value == self.zeros[level] {
            self.nodes[level].remove(&index);
        } else {
            self.nodes[level].insert(index, value);
        }
    }

    fn check_index(index: u64) -> MerkleResult<()> {
        if index >= Self::leaf_count() {
            return Err(MerkleError::IndexOutOfRange {
                index,
                leaf_count: Self::leaf_count(),
            });
        }
        Ok(())
    }
}

impl<const DEPTH: usize, H: FieldHasher> Default for MerkleTree<DEPTH, H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Sha256Hasher;
    use rand::Rng;

    #[test]
    fn test_empty_tree() {
        let tree = MerkleTree8::<Keccak256Hasher>::new();
        let mut expected = Field::ZERO;
        for _ in 0..7 {
            expected = Keccak256Hasher::hash_pair(&expected, &expected);
        }
        assert_eq!(tree.root(), expected);
        assert_eq!(MerkleTree8::<Keccak256Hasher>::leaf_count(), 128);
        assert_eq!(tree.occupied(), 0);
    }

    #[test]
    fn test_index_out_of_range() {
        let mut tree = MerkleTree8::<Keccak256Hasher>::new();
        assert!(tree.witness(127).is_ok());
        assert_eq!(
            tree.witness(128).unwrap_err(),
            MerkleError::IndexOutOfRange {
                index: 128,
                leaf_count: 128
            }
        );
        assert!(tree.set_leaf(128, Field::ONE).is_err());
    }

    #[test]
    fn test_node_bounds() {
        let mut tree = MerkleTree::<3, Keccak256Hasher>::new();
        tree.set_leaf(5, Field::from_u64(7)).unwrap();

        assert_eq!(tree.node(0, 5), Some(Field::from_u64(7)));
        assert_eq!(tree.node(3, 0), Some(tree.root()));
        let parent = Keccak256Hasher::hash_pair(&Field::ZERO, &Field::from_u64(7));
        assert_eq!(tree.node(1, 2), Some(parent));

        assert_eq!(tree.node(0, 8), None);
        assert_eq!(tree.node(2, 2), None);
        assert_eq!(tree.node(4, 0), None);
    }

    #[test]
    fn test_root_is_order_independent() {
        let values: Vec<Field> = (1..=20).map(Field::from_u64).collect();

        let mut forward = MerkleTree8::<Keccak256Hasher>::new();
        forward.fill(&values).unwrap();

        let mut backward = MerkleTree8::<Keccak256Hasher>::new();
        for (i, v) in values.iter().enumerate().rev() {
            backward.set_leaf(i as u64, *v).unwrap();
        }

        assert_eq!(forward.root(), backward.root());
    }

    #[test]
    fn test_hundred_values() {
        let mut tree = MerkleTree8::<Keccak256Hasher>::new();
        for i in 0..100u64 {
            tree.set_leaf(i, Field::from_u64(i + 1)).unwrap();
        }

        let witness = tree.witness(7).unwrap();
        assert_eq!(
            witness.calculate_root::<Keccak256Hasher>(&Field::from_u64(8)),
            tree.root()
        );
        let witness = tree.witness(57).unwrap();
        assert_eq!(witness.calculate_index(), 57);
        assert_eq!(
            witness.calculate_root::<Keccak256Hasher>(&Field::from_u64(58)),
            tree.root()
        );
    }

    #[test]
    fn test_witness_round_trip_random() {
        let mut rng = rand::thread_rng();
        let mut tree = MerkleTree20::<Sha256Hasher>::new();
        let mut written = Vec::new();
        for _ in 0..50 {
            let index = rng.gen_range(0..MerkleTree20::<Sha256Hasher>::leaf_count());
            let value = Field::from_u64(rng.gen());
            tree.set_leaf(index, value).unwrap();
            written.push(index);
        }
        for index in written {
            assert!(tree.validate(index).unwrap());
            let witness = tree.witness(index).unwrap();
            assert_eq!(witness.calculate_index(), index);
        }
        assert!(tree.validate(0).unwrap());
    }

    #[test]
    fn test_update_moves_root() {
        let mut tree = MerkleTree20::<Keccak256Hasher>::new();
        let before = tree.root();
        let witness = tree.witness(522).unwrap();

        tree.set_leaf(522, Field::from_u64(9)).unwrap();
        assert_ne!(tree.root(), before);

        // the pre-update witness still has the right siblings
        assert_eq!(
            witness.calculate_root::<Keccak256Hasher>(&Field::from_u64(9)),
            tree.root()
        );
        assert_eq!(witness.calculate_root::<Keccak256Hasher>(&Field::ZERO), before);

        // writing zero back restores the empty root and storage
        tree.set_leaf(522, Field::ZERO).unwrap();
        assert_eq!(tree.root(), before);
        assert_eq!(tree.occupied(), 0);
    }
}
