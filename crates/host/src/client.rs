//! Client keeping the mirror in lock-step with the ledger

use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use mytree_core::{Call, Transaction};
use mytree_merkle::{Field, FieldHasher, Keccak256Hasher, LeafValue, PublicKey};

use crate::ledger::{Receipt, Submitter};
use crate::mirror::Mirror;

/// The mirror and the ledger disagree on the root after a commit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mirror root {mirror} diverged from committed root {committed}")]
pub struct MirrorDiverged {
    /// Root computed by the mirror
    pub mirror: Field,
    /// Root held by the ledger
    pub committed: Field,
}

/// Builds transactions from mirror witnesses and applies accepted leaf writes
/// back to the mirror.
///
/// Calls through one client are serialized, so a witness is never taken from
/// a tree that is about to change. Submissions by other parties can still make
/// a snapshot stale; those come back as `ContractError::StaleState`.
#[derive(Debug)]
pub struct TreeClient<const DEPTH: usize, S, H: FieldHasher = Keccak256Hasher> {
    mirror: Arc<Mirror<DEPTH, H>>,
    ledger: Arc<S>,
    lock: Mutex<()>,
}

impl<const DEPTH: usize, S, H> TreeClient<DEPTH, S, H>
where
    S: Submitter<DEPTH>,
    H: FieldHasher,
{
    /// Create a client over a mirror and a ledger
    pub fn new(mirror: Arc<Mirror<DEPTH, H>>, ledger: Arc<S>) -> Self {
        Self {
            mirror,
            ledger,
            lock: Mutex::new(()),
        }
    }

    /// The mirror
    pub fn mirror(&self) -> &Arc<Mirror<DEPTH, H>> {
        &self.mirror
    }

    /// The ledger
    pub fn ledger(&self) -> &Arc<S> {
        &self.ledger
    }

    /// Initialize the contract with the mirror's current root
    pub async fn init(&self, sender: PublicKey) -> Result<Receipt> {
        let _guard = self.lock.lock().await;
        let root = self.mirror.root().await;
        info!("Initializing contract with root {}", root);
        self.execute(sender, Call::InitState { root }).await
    }

    /// Write a raw value, asserting the mirror's current leaf as the prior value
    pub async fn add_value(&self, sender: PublicKey, index: u64, value: Field) -> Result<Receipt> {
        let _guard = self.lock.lock().await;
        let witness = self.mirror.witness(index).await?;
        let before = self.mirror.leaf(index).await?;
        let call = Call::AddValue {
            witness,
            value_before: Some(before),
            value_after: value,
        };
        self.execute(sender, call).await
    }

    /// Register `address` in the empty slot `index`
    pub async fn add_address(
        &self,
        sender: PublicKey,
        index: u64,
        address: PublicKey,
    ) -> Result<Receipt> {
        let _guard = self.lock.lock().await;
        let witness = self.mirror.witness(index).await?;
        self.execute(sender, Call::AddAddress { witness, address }).await
    }

    /// Deposit `secret` as the member registered at `index`
    pub async fn deposit(&self, sender: PublicKey, index: u64, secret: Field) -> Result<Receipt> {
        let _guard = self.lock.lock().await;
        let witness = self.mirror.witness(index).await?;
        self.execute(sender, Call::Deposit { witness, secret }).await
    }

    /// Evaluate the flag rules through the contract
    pub async fn check_flags(&self, sender: PublicKey, secret: Field) -> Result<bool> {
        let receipt = self.execute(sender, Call::CheckFlags { secret }).await?;
        Ok(receipt.returned.unwrap_or(false))
    }

    /// Submit a transaction built elsewhere and apply its leaf write to the mirror
    pub async fn submit(&self, tx: Transaction<DEPTH>) -> Result<Receipt> {
        let _guard = self.lock.lock().await;
        let write = leaf_write::<DEPTH, H>(&tx.call);
        let receipt = self.ledger.submit(tx).await?;
        self.sync(write, receipt).await
    }

    async fn execute(&self, sender: PublicKey, call: Call<DEPTH>) -> Result<Receipt> {
        let snapshot = self.ledger.state().await.snapshot();
        let write = leaf_write::<DEPTH, H>(&call);
        let receipt = self
            .ledger
            .submit(Transaction::new(sender, call, snapshot))
            .await?;
        self.sync(write, receipt).await
    }

    async fn sync(&self, write: Option<(u64, Field)>, receipt: Receipt) -> Result<Receipt> {
        if let Some((index, value)) = write {
            // the mirror is only written once the resulting root is known to match
            let mirror = self
                .mirror
                .witness(index)
                .await?
                .calculate_root::<H>(&value);
            if mirror != receipt.state.tree_root {
                warn!("Mirror diverged at leaf {}", index);
                return Err(MirrorDiverged {
                    mirror,
                    committed: receipt.state.tree_root,
                }
                .into());
            }
            self.mirror.set_leaf(index, value).await?;
        }
        Ok(receipt)
    }
}

/// Leaf index and encoded value written by an accepted call
fn leaf_write<const DEPTH: usize, H: FieldHasher>(call: &Call<DEPTH>) -> Option<(u64, Field)> {
    let (witness, value) = match call {
        Call::AddValue {
            witness,
            value_after,
            ..
        } => (witness, LeafValue::Raw(*value_after)),
        Call::AddAddress { witness, address } => (witness, LeafValue::Address(*address)),
        Call::Deposit { witness, .. } => (witness, LeafValue::Empty),
        Call::InitState { .. } | Call::CheckFlags { .. } => return None,
    };
    Some((witness.calculate_index(), value.encode::<H>()))
}
