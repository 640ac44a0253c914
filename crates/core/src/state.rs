//! Committed contract state

use serde::{Deserialize, Serialize};

use mytree_merkle::Field;

use crate::error::{ContractError, StateField};

/// Persisted contract fields
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    /// Set by `initState`, never cleared
    pub initialized: bool,
    /// Current committed root
    pub tree_root: Field,
    /// Number of accepted deposits
    pub messages_received: u64,
    /// Rolling hash over deposited secrets
    pub saved_messages: Field,
}

impl ContractState {
    /// Snapshot of the fields a transaction may assert on
    pub fn snapshot(&self) -> Preconditions {
        Preconditions {
            tree_root: self.tree_root,
            messages_received: self.messages_received,
            saved_messages: self.saved_messages,
        }
    }

    /// Assert `expected` still matches for the given fields
    pub fn require(
        &self,
        expected: &Preconditions,
        fields: &[StateField],
    ) -> Result<(), ContractError> {
        for field in fields {
            let (want, have) = match field {
                StateField::TreeRoot => (expected.tree_root, self.tree_root),
                StateField::MessagesReceived => (
                    Field::from_u64(expected.messages_received),
                    Field::from_u64(self.messages_received),
                ),
                StateField::SavedMessages => (expected.saved_messages, self.saved_messages),
            };
            if want != have {
                return Err(ContractError::StaleState {
                    field: *field,
                    expected: want,
                    actual: have,
                });
            }
        }
        Ok(())
    }
}

/// State values a transaction was built against
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preconditions {
    /// Expected `tree_root`
    pub tree_root: Field,
    /// Expected `messages_received`
    pub messages_received: u64,
    /// Expected `saved_messages`
    pub saved_messages: Field,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_reports_first_stale_field() {
        let state = ContractState {
            initialized: true,
            tree_root: Field::from_u64(1),
            messages_received: 3,
            saved_messages: Field::from_u64(7),
        };
        let mut pre = state.snapshot();
        assert!(state
            .require(&pre, &[StateField::TreeRoot, StateField::MessagesReceived])
            .is_ok());

        pre.messages_received = 2;
        // counter is not checked when not listed
        assert!(state.require(&pre, &[StateField::TreeRoot]).is_ok());
        assert_eq!(
            state.require(&pre, &[StateField::TreeRoot, StateField::MessagesReceived]),
            Err(ContractError::StaleState {
                field: StateField::MessagesReceived,
                expected: Field::from_u64(2),
                actual: Field::from_u64(3),
            })
        );
    }
}
