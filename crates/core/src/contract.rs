//! Tree state contract
//!
//! Every method is a pure transition `(&ContractState, &CallContext, &Call) ->
//! Result<Commit>`. Nothing is written in place: the caller swaps in
//! `Commit::state` only when the whole call succeeded, so a failing assertion
//! anywhere leaves the committed state untouched.

use std::marker::PhantomData;

use mytree_merkle::{Field, FieldHasher, Keccak256Hasher, LeafValue, PublicKey};

use crate::error::{ContractError, StateField};
use crate::event::Event;
use crate::flags::check_flags;
use crate::state::ContractState;
use crate::tx::{Call, Method, Transaction};

/// Who is calling
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// Calling identity
    pub sender: PublicKey,
}

/// Result of a successful call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    /// State to commit
    pub state: ContractState,
    /// Events to append after commit
    pub events: Vec<Event>,
    /// Return value, for `checkFlags`
    pub returned: Option<bool>,
}

impl Commit {
    fn state(state: ContractState) -> Self {
        Self {
            state,
            events: Vec::new(),
            returned: None,
        }
    }
}

/// A method implementation
pub type TransitionFn<const DEPTH: usize> =
    fn(&ContractState, &CallContext, &Call<DEPTH>) -> Result<Commit, ContractError>;

/// The contract over a height `DEPTH + 1` tree hashed with `H`
#[derive(Clone, Copy, Debug, Default)]
pub struct TreeContract<const DEPTH: usize, H: FieldHasher = Keccak256Hasher> {
    _hasher: PhantomData<H>,
}

/// Contract over a height-8 tree
pub type TreeContract8<H = Keccak256Hasher> = TreeContract<7, H>;

impl<const DEPTH: usize, H: FieldHasher> TreeContract<DEPTH, H> {
    /// Look a method up by name
    pub fn method(name: &str) -> Result<TransitionFn<DEPTH>, ContractError> {
        let method: Method = name.parse()?;
        Ok(Self::dispatch(method))
    }

    /// Transition function for `method`
    pub fn dispatch(method: Method) -> TransitionFn<DEPTH> {
        match method {
            Method::InitState => Self::init_state,
            Method::AddValue => Self::add_value,
            Method::AddAddress => Self::add_address,
            Method::Deposit => Self::deposit,
            Method::CheckFlags => Self::check_flags,
        }
    }

    /// Apply a transaction to `state`
    pub fn apply(state: &ContractState, tx: &Transaction<DEPTH>) -> Result<Commit, ContractError> {
        let method = tx.call.method();
        state.require(&tx.preconditions, Self::reads(method))?;
        let ctx = CallContext { sender: tx.sender };
        Self::dispatch(method)(state, &ctx, &tx.call)
    }

    /// Fields each method asserts on before running
    pub const fn reads(method: Method) -> &'static [StateField] {
        match method {
            Method::InitState | Method::CheckFlags => &[],
            Method::AddValue | Method::AddAddress => &[StateField::TreeRoot],
            Method::Deposit => &[
                StateField::TreeRoot,
                StateField::MessagesReceived,
                StateField::SavedMessages,
            ],
        }
    }

    fn init_state(
        state: &ContractState,
        _ctx: &CallContext,
        call: &Call<DEPTH>,
    ) -> Result<Commit, ContractError> {
        let Call::InitState { root } = call else {
            return Err(ContractError::ArgumentMismatch(Method::InitState.as_str()));
        };
        if state.initialized {
            return Err(ContractError::AlreadyInitialized);
        }

        let mut next = state.clone();
        next.initialized = true;
        next.tree_root = *root;
        Ok(Commit::state(next))
    }

    fn add_value(
        state: &ContractState,
        _ctx: &CallContext,
        call: &Call<DEPTH>,
    ) -> Result<Commit, ContractError> {
        let Call::AddValue {
            witness,
            value_before,
            value_after,
        } = call
        else {
            return Err(ContractError::ArgumentMismatch(Method::AddValue.as_str()));
        };
        Self::require_initialized(state)?;

        if let Some(before) = value_before {
            let leaf = LeafValue::Raw(*before).encode::<H>();
            Self::require_member(state, witness.calculate_root::<H>(&leaf))?;
        }

        let mut next = state.clone();
        let after = LeafValue::Raw(*value_after).encode::<H>();
        next.tree_root = witness.calculate_root::<H>(&after);
        Ok(Commit::state(next))
    }

    fn add_address(
        state: &ContractState,
        _ctx: &CallContext,
        call: &Call<DEPTH>,
    ) -> Result<Commit, ContractError> {
        let Call::AddAddress { witness, address } = call else {
            return Err(ContractError::ArgumentMismatch(Method::AddAddress.as_str()));
        };
        Self::require_initialized(state)?;

        // slot must be empty
        let empty = LeafValue::Empty.encode::<H>();
        Self::require_member(state, witness.calculate_root::<H>(&empty))?;

        let mut next = state.clone();
        let leaf = LeafValue::Address(*address).encode::<H>();
        next.tree_root = witness.calculate_root::<H>(&leaf);
        Ok(Commit::state(next))
    }

    fn deposit(
        state: &ContractState,
        ctx: &CallContext,
        call: &Call<DEPTH>,
    ) -> Result<Commit, ContractError> {
        let Call::Deposit { witness, secret } = call else {
            return Err(ContractError::ArgumentMismatch(Method::Deposit.as_str()));
        };
        Self::require_initialized(state)?;

        let member = LeafValue::Address(ctx.sender).encode::<H>();
        Self::require_member(state, witness.calculate_root::<H>(&member))?;

        // consume the leaf so the same witness cannot deposit twice
        let mut next = state.clone();
        next.tree_root = witness.calculate_root::<H>(&LeafValue::Empty.encode::<H>());

        if !check_flags(secret)? {
            return Err(ContractError::InvalidFlags { secret: *secret });
        }

        next.messages_received += 1;
        next.saved_messages = H::hash_pair(&state.saved_messages, secret);

        Ok(Commit {
            state: next,
            events: vec![Event::MessageReceived { secret: *secret }],
            returned: None,
        })
    }

    fn check_flags(
        state: &ContractState,
        _ctx: &CallContext,
        call: &Call<DEPTH>,
    ) -> Result<Commit, ContractError> {
        let Call::CheckFlags { secret } = call else {
            return Err(ContractError::ArgumentMismatch(Method::CheckFlags.as_str()));
        };
        let valid = check_flags(secret)?;
        Ok(Commit {
            state: state.clone(),
            events: Vec::new(),
            returned: Some(valid),
        })
    }

    fn require_initialized(state: &ContractState) -> Result<(), ContractError> {
        if !state.initialized {
            return Err(ContractError::NotInitialized);
        }
        Ok(())
    }

    fn require_member(state: &ContractState, computed: Field) -> Result<(), ContractError> {
        if computed != state.tree_root {
            return Err(ContractError::InvalidWitness {
                expected: state.tree_root,
                computed,
            });
        }
        Ok(())
    }
}
