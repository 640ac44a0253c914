//! Error types for tree and witness operations

use thiserror::Error;

/// Errors from the Merkle layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    /// Leaf index beyond the tree's capacity
    #[error("leaf index {index} out of range for tree with {leaf_count} leaves")]
    IndexOutOfRange {
        /// Requested index
        index: u64,
        /// Leaves in the tree
        leaf_count: u64,
    },

    /// Witness path of the wrong length for the tree height
    #[error("witness length mismatch: expected {expected}, got {got}")]
    InvalidWitnessLength {
        /// Tree depth
        expected: usize,
        /// Supplied path length
        got: usize,
    },

    /// Field value could not be decoded
    #[error("invalid field encoding: {0}")]
    InvalidField(String),

    /// Public key could not be decoded
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// Result alias for Merkle operations
pub type MerkleResult<T> = Result<T, MerkleError>;
