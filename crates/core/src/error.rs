//! Contract error taxonomy

use std::fmt;
use thiserror::Error;

use mytree_merkle::Field;

use crate::flags::{FlagError, Flags, Rule};

/// Committed state field guarded by a precondition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateField {
    /// `tree_root`
    TreeRoot,
    /// `messages_received`
    MessagesReceived,
    /// `saved_messages`
    SavedMessages,
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TreeRoot => write!(f, "treeRoot"),
            Self::MessagesReceived => write!(f, "messagesReceived"),
            Self::SavedMessages => write!(f, "savedMessages"),
        }
    }
}

/// Reasons a transaction is rejected. Any error aborts the whole call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// `initState` after the contract was initialized
    #[error("contract already initialized")]
    AlreadyInitialized,

    /// Any method other than `initState` before initialization
    #[error("contract not initialized")]
    NotInitialized,

    /// The transaction was built against a state that is no longer committed.
    /// Refetch state and witness, then resubmit.
    #[error("stale {field}: transaction expects {expected:?}, committed {actual:?}")]
    StaleState {
        /// Field that moved
        field: StateField,
        /// Value the transaction read
        expected: Field,
        /// Committed value
        actual: Field,
    },

    /// Witness and claimed leaf do not reproduce the committed root. Also what a
    /// repeated deposit fails with, since its leaf has been zeroed.
    #[error("invalid witness: computed root {computed} does not match {expected}")]
    InvalidWitness {
        /// Committed root
        expected: Field,
        /// Root recomputed from the witness
        computed: Field,
    },

    /// Secret breaks a flag rule
    #[error("invalid flags for secret {secret:?}")]
    InvalidFlags {
        /// Rejected secret
        secret: Field,
    },

    /// Secret could not be decoded into flags
    #[error(transparent)]
    Flag(#[from] FlagError),

    /// Method name not in the dispatch table
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// Call arguments do not belong to the dispatched method
    #[error("arguments do not match method {0}")]
    ArgumentMismatch(&'static str),
}

impl ContractError {
    /// Whether refetching state and resubmitting may succeed
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleState { .. })
    }

    /// Flag rules broken by the secret of an `InvalidFlags` rejection
    pub fn broken_rules(&self) -> Vec<Rule> {
        match self {
            Self::InvalidFlags { secret } => Flags::decode(secret)
                .map(|flags| flags.violations())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broken_rules() {
        let err = ContractError::InvalidFlags {
            secret: Field::from_u64(21),
        };
        assert_eq!(err.broken_rules(), vec![Rule::Implication, Rule::MutualExclusion]);
        assert!(ContractError::NotInitialized.broken_rules().is_empty());
    }
}
