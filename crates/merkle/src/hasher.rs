//! Field hashers for tree nodes and leaf encodings
//!
//! The hash is a configuration point: the off-chain tree and the contract are
//! both generic over [`FieldHasher`] so they cannot disagree on it.

use sha2::{Digest, Sha256};
use std::fmt::Debug;
use tiny_keccak::{Hasher, Keccak};

use crate::field::{Field, FIELD_BYTES};

/// Hash a sequence of field values into one field value
pub trait FieldHasher: Clone + Copy + Debug + Default + Send + Sync + 'static {
    /// Hash an ordered list of fields
    fn hash_fields(inputs: &[Field]) -> Field;

    /// Hash two children into their parent node
    fn hash_pair(left: &Field, right: &Field) -> Field {
        Self::hash_fields(&[*left, *right])
    }
}

/// Keccak256 hasher
#[derive(Clone, Copy, Debug, Default)]
pub struct Keccak256Hasher;

impl FieldHasher for Keccak256Hasher {
    fn hash_fields(inputs: &[Field]) -> Field {
        let mut hasher = Keccak::v256();
        for input in inputs {
            hasher.update(input.as_bytes());
        }
        let mut output = [0u8; FIELD_BYTES];
        hasher.finalize(&mut output);
        Field::from_bytes(output)
    }
}

/// SHA-256 hasher
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hasher;

impl FieldHasher for Sha256Hasher {
    fn hash_fields(inputs: &[Field]) -> Field {
        let mut hasher = Sha256::new();
        for input in inputs {
            hasher.update(input.as_bytes());
        }
        let mut output = [0u8; FIELD_BYTES];
        output.copy_from_slice(&hasher.finalize());
        Field::from_bytes(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_pair() {
        let left = Field::from_u64(1);
        let right = Field::from_u64(2);
        let hash = Keccak256Hasher::hash_pair(&left, &right);
        assert_ne!(hash, Field::ZERO);
        assert_eq!(hash, Keccak256Hasher::hash_fields(&[left, right]));
        assert_ne!(hash, Keccak256Hasher::hash_pair(&right, &left));
    }

    #[test]
    fn test_hashers_differ() {
        let inputs = [Field::from_u64(7)];
        assert_ne!(
            Keccak256Hasher::hash_fields(&inputs),
            Sha256Hasher::hash_fields(&inputs)
        );
    }
}
