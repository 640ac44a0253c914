//! Fixed-height Merkle tree for the deposit tree
//!
//! This crate provides:
//! - [`Field`]: 256-bit values stored in leaves and nodes
//! - [`FieldHasher`]: the node hash, shared by the off-chain tree and the contract
//! - [`MerkleTree`]: the full tree kept by the off-chain mirror
//! - [`MerkleWitness`]: sibling paths and root recomputation
//! - [`LeafValue`]: encoding of raw values and public keys into leaves

mod codec;
mod error;
mod field;
mod hasher;
mod tree;
mod witness;

pub use codec::{LeafValue, PublicKey};
pub use error::{MerkleError, MerkleResult};
pub use field::{Field, FIELD_BYTES};
pub use hasher::{FieldHasher, Keccak256Hasher, Sha256Hasher};
pub use tree::{MerkleTree, MerkleTree20, MerkleTree8};
pub use witness::{MerkleWitness, MerkleWitness20, MerkleWitness8};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_witness() {
        let mut tree = MerkleTree8::<Keccak256Hasher>::new();
        let key = PublicKey::new(Field::from_u64(1), false);
        let leaf = LeafValue::from(key).encode::<Keccak256Hasher>();

        tree.set_leaf(3, leaf).unwrap();

        let witness = tree.witness(3).unwrap();
        assert_eq!(witness.calculate_root::<Keccak256Hasher>(&leaf), tree.root());
        assert_ne!(
            witness.calculate_root::<Keccak256Hasher>(&Field::ZERO),
            tree.root()
        );
    }
}
