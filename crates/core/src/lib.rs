//! Deposit tree contract logic
//!
//! This crate contains the state machine shared by every party that has to
//! agree on a transition:
//! - The host ledger that commits transactions
//! - Clients building transactions against the off-chain tree

pub mod contract;
pub mod error;
pub mod event;
pub mod flags;
pub mod state;
pub mod tx;

pub use contract::{CallContext, Commit, TransitionFn, TreeContract, TreeContract8};
pub use error::{ContractError, StateField};
pub use event::Event;
pub use flags::{check_flags, FlagError, Flags, Rule};
pub use state::{ContractState, Preconditions};
pub use tx::{Call, Method, Transaction};

pub use mytree_merkle::{Field, FieldHasher, Keccak256Hasher, MerkleWitness, PublicKey};
