//! Leaf value codec
//!
//! Maps application values onto leaf contents. Raw values are stored verbatim,
//! addresses are stored as the hash of the public key's field encoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MerkleError;
use crate::field::Field;
use crate::hasher::FieldHasher;

/// A public identity, as a curve point x-coordinate plus y-parity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    /// x-coordinate
    pub x: Field,
    /// Whether y is odd
    pub is_odd: bool,
}

impl PublicKey {
    /// Create a public key
    pub const fn new(x: Field, is_odd: bool) -> Self {
        Self { x, is_odd }
    }

    /// Field encoding `[x, is_odd]`
    pub fn to_fields(&self) -> [Field; 2] {
        [self.x, Field::from(self.is_odd)]
    }

    /// Leaf content identifying this key
    pub fn leaf<H: FieldHasher>(&self) -> Field {
        H::hash_fields(&self.to_fields())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.is_odd as u8)
    }
}

impl FromStr for PublicKey {
    type Err = MerkleError;

    /// Parses `<x>` or `<x>:<parity>` where parity is `0` or `1`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, parity) = match s.split_once(':') {
            Some((x, parity)) => (x, parity),
            None => (s, "0"),
        };
        let is_odd = match parity.trim() {
            "0" => false,
            "1" => true,
            other => {
                return Err(MerkleError::InvalidPublicKey(format!(
                    "parity must be 0 or 1, got {}",
                    other
                )))
            }
        };
        let x = x
            .parse()
            .map_err(|e: MerkleError| MerkleError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { x, is_odd })
    }
}

/// Application value destined for a leaf
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LeafValue {
    /// Empty slot (also a consumed deposit)
    Empty,
    /// Raw field element
    Raw(Field),
    /// Hashed public key
    Address(PublicKey),
}

impl LeafValue {
    /// Encode into the field stored in the tree
    pub fn encode<H: FieldHasher>(&self) -> Field {
        match self {
            Self::Empty => Field::ZERO,
            Self::Raw(value) => *value,
            Self::Address(key) => key.leaf::<H>(),
        }
    }
}

impl From<Field> for LeafValue {
    fn from(value: Field) -> Self {
        Self::Raw(value)
    }
}

impl From<PublicKey> for LeafValue {
    fn from(key: PublicKey) -> Self {
        Self::Address(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Keccak256Hasher;

    #[test]
    fn test_encodings() {
        assert_eq!(LeafValue::Empty.encode::<Keccak256Hasher>(), Field::ZERO);
        assert_eq!(
            LeafValue::Raw(Field::from_u64(9)).encode::<Keccak256Hasher>(),
            Field::from_u64(9)
        );

        let key = PublicKey::new(Field::from_u64(42), true);
        let leaf = LeafValue::Address(key).encode::<Keccak256Hasher>();
        assert_eq!(
            leaf,
            Keccak256Hasher::hash_fields(&[Field::from_u64(42), Field::ONE])
        );
        // parity is part of the identity
        let flipped = PublicKey::new(Field::from_u64(42), false);
        assert_ne!(leaf, flipped.leaf::<Keccak256Hasher>());
    }

    #[test]
    fn test_public_key_parse() {
        let key: PublicKey = "0x2a:1".parse().unwrap();
        assert_eq!(key, PublicKey::new(Field::from_u64(42), true));
        assert_eq!(key.to_string().parse::<PublicKey>().unwrap(), key);

        let even: PublicKey = "42".parse().unwrap();
        assert!(!even.is_odd);
        assert!("42:2".parse::<PublicKey>().is_err());
    }
}
