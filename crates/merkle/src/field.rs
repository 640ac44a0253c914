//! 256-bit field values shared by leaves, nodes and secrets

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::MerkleError;

/// Width of a field value in bytes
pub const FIELD_BYTES: usize = 32;

/// A 256-bit value stored big-endian.
///
/// Leaves, internal nodes, roots and deposit secrets are all `Field`s. The
/// numeric helpers only look at the low 64 bits, which is where every
/// application value of this crate lives.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Field([u8; FIELD_BYTES]);

impl Field {
    /// The zero value, also the canonical empty leaf
    pub const ZERO: Self = Self([0u8; FIELD_BYTES]);

    /// The value one
    pub const ONE: Self = Self::from_u64(1);

    /// Create from raw big-endian bytes
    pub const fn from_bytes(bytes: [u8; FIELD_BYTES]) -> Self {
        Self(bytes)
    }

    /// Create from a `u64`
    pub const fn from_u64(value: u64) -> Self {
        let be = value.to_be_bytes();
        let mut bytes = [0u8; FIELD_BYTES];
        let mut i = 0;
        while i < 8 {
            bytes[FIELD_BYTES - 8 + i] = be[i];
            i += 1;
        }
        Self(bytes)
    }

    /// Raw big-endian bytes
    pub const fn as_bytes(&self) -> &[u8; FIELD_BYTES] {
        &self.0
    }

    /// Returns the value as `u64` if it fits
    pub fn to_u64(&self) -> Option<u64> {
        let (high, low) = self.0.split_at(FIELD_BYTES - 8);
        if high.iter().any(|b| *b != 0) {
            return None;
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(low);
        Some(u64::from_be_bytes(buf))
    }

    /// Number of significant bits (0 for zero)
    pub fn bit_len(&self) -> u32 {
        for (i, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                let remaining = (FIELD_BYTES - i - 1) as u32;
                return remaining * 8 + (8 - byte.leading_zeros());
            }
        }
        0
    }

    /// Bitwise AND of the low 64 bits with `mask`
    pub fn and_low(&self, mask: u64) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[FIELD_BYTES - 8..]);
        u64::from_be_bytes(buf) & mask
    }

    /// Parse from a hex string, with or without `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, MerkleError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() || digits.len() > FIELD_BYTES * 2 {
            return Err(MerkleError::InvalidField(format!("bad hex length: {}", s)));
        }
        let padded = format!("{:0>width$}", digits, width = FIELD_BYTES * 2);
        let bytes = hex::decode(padded)
            .map_err(|e| MerkleError::InvalidField(format!("invalid hex {}: {}", s, e)))?;
        let mut out = [0u8; FIELD_BYTES];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl From<u64> for Field {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Self::from_u64(value as u64)
    }
}

impl From<[u8; FIELD_BYTES]> for Field {
    fn from(bytes: [u8; FIELD_BYTES]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Field {
    type Err = MerkleError;

    /// Accepts `0x`-prefixed hex or a decimal `u64`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("0x") {
            return Self::from_hex(s);
        }
        s.parse::<u64>()
            .map(Self::from_u64)
            .map_err(|e| MerkleError::InvalidField(format!("invalid decimal {}: {}", s, e)))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_u64() {
            Some(v) => write!(f, "Field({})", v),
            None => write!(f, "Field({})", self),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
