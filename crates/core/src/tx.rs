//! Transaction structure

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tiny_keccak::{Hasher, Keccak};

use mytree_merkle::{Field, MerkleWitness, PublicKey};

use crate::error::ContractError;
use crate::state::Preconditions;

/// Contract method names
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    /// Set the initial root, once
    InitState,
    /// Write a raw value into a leaf
    AddValue,
    /// Register a public key in an empty leaf
    AddAddress,
    /// Prove membership, consume the leaf and record a secret
    Deposit,
    /// Evaluate the flag rules on a secret
    CheckFlags,
}

impl Method {
    /// All methods in dispatch order
    pub const ALL: [Self; 5] = [
        Self::InitState,
        Self::AddValue,
        Self::AddAddress,
        Self::Deposit,
        Self::CheckFlags,
    ];

    /// External method name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InitState => "initState",
            Self::AddValue => "addValue",
            Self::AddAddress => "addAddress",
            Self::Deposit => "deposit",
            Self::CheckFlags => "checkFlags",
        }
    }

    const fn tag(&self) -> u8 {
        match self {
            Self::InitState => 0,
            Self::AddValue => 1,
            Self::AddAddress => 2,
            Self::Deposit => 3,
            Self::CheckFlags => 4,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ContractError::UnknownMethod(s.to_string()))
    }
}

/// Method arguments
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Call<const DEPTH: usize> {
    /// `initState(root)`
    InitState {
        /// Root of the mirror at deployment
        root: Field,
    },
    /// `addValue(witness, valueBefore?, valueAfter)`
    #[serde(rename_all = "camelCase")]
    AddValue {
        /// Path to the written leaf
        witness: MerkleWitness<DEPTH>,
        /// Asserted current leaf, unchecked when absent
        value_before: Option<Field>,
        /// New leaf
        value_after: Field,
    },
    /// `addAddress(witness, address)`
    AddAddress {
        /// Path to an empty slot
        witness: MerkleWitness<DEPTH>,
        /// Key to register
        address: PublicKey,
    },
    /// `deposit(witness, secret)`
    Deposit {
        /// Path to the sender's leaf
        witness: MerkleWitness<DEPTH>,
        /// Flag-checked secret
        secret: Field,
    },
    /// `checkFlags(secret)`
    CheckFlags {
        /// Secret to evaluate
        secret: Field,
    },
}

impl<const DEPTH: usize> Call<DEPTH> {
    /// Method this call dispatches to
    pub const fn method(&self) -> Method {
        match self {
            Self::InitState { .. } => Method::InitState,
            Self::AddValue { .. } => Method::AddValue,
            Self::AddAddress { .. } => Method::AddAddress,
            Self::Deposit { .. } => Method::Deposit,
            Self::CheckFlags { .. } => Method::CheckFlags,
        }
    }

    fn hash_into(&self, hasher: &mut Keccak) {
        hasher.update(&[self.method().tag()]);
        match self {
            Self::InitState { root } => hasher.update(root.as_bytes()),
            Self::AddValue {
                witness,
                value_before,
                value_after,
            } => {
                hash_witness(hasher, witness);
                match value_before {
                    Some(value) => {
                        hasher.update(&[1]);
                        hasher.update(value.as_bytes());
                    }
                    None => hasher.update(&[0]),
                }
                hasher.update(value_after.as_bytes());
            }
            Self::AddAddress { witness, address } => {
                hash_witness(hasher, witness);
                for field in address.to_fields() {
                    hasher.update(field.as_bytes());
                }
            }
            Self::Deposit { witness, secret } => {
                hash_witness(hasher, witness);
                hasher.update(secret.as_bytes());
            }
            Self::CheckFlags { secret } => hasher.update(secret.as_bytes()),
        }
    }
}

fn hash_witness<const DEPTH: usize>(hasher: &mut Keccak, witness: &MerkleWitness<DEPTH>) {
    for (sibling, is_left) in witness.path().iter().zip(witness.is_left().iter()) {
        hasher.update(sibling.as_bytes());
        hasher.update(&[u8::from(*is_left)]);
    }
}

/// A call submitted by a sender against a state snapshot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction<const DEPTH: usize> {
    /// Calling identity
    pub sender: PublicKey,
    /// Method and arguments
    pub call: Call<DEPTH>,
    /// State the caller read when building the call
    pub preconditions: Preconditions,
}

impl<const DEPTH: usize> Transaction<DEPTH> {
    /// Create a transaction
    pub const fn new(sender: PublicKey, call: Call<DEPTH>, preconditions: Preconditions) -> Self {
        Self {
            sender,
            call,
            preconditions,
        }
    }

    /// Compute transaction hash
    pub fn hash(&self) -> Field {
        let mut hasher = Keccak::v256();
        for field in self.sender.to_fields() {
            hasher.update(field.as_bytes());
        }
        self.call.hash_into(&mut hasher);
        hasher.update(self.preconditions.tree_root.as_bytes());
        hasher.update(&self.preconditions.messages_received.to_le_bytes());
        hasher.update(self.preconditions.saved_messages.as_bytes());

        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        Field::from_bytes(output)
    }
}
