//! Contract events

use serde::{Deserialize, Serialize};

use mytree_merkle::Field;

/// Event emitted by a committed call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    /// A deposit was accepted
    MessageReceived {
        /// Deposited secret
        secret: Field,
    },
}

impl Event {
    /// Event name as indexed externally
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MessageReceived { .. } => "message-received",
        }
    }
}
