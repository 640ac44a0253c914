//! Submission layer
//!
//! Transactions are applied one at a time under a lock. The contract returns
//! the next state without touching the current one, and the ledger swaps it in
//! only on success, so a rejected transaction leaves no trace besides the
//! rejection counter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use mytree_core::{ContractError, ContractState, Event, Method, Transaction, TreeContract};
use mytree_merkle::{Field, FieldHasher, Keccak256Hasher};

/// An event with its position in the log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Sequence number, starting at 0
    pub seq: u64,
    /// Transaction that emitted it
    pub tx_hash: Field,
    /// The event
    pub event: Event,
}

/// Result of an accepted transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash
    pub tx_hash: Field,
    /// Method that ran
    pub method: Method,
    /// Return value, for `checkFlags`
    pub returned: Option<bool>,
    /// Events appended by this transaction
    pub events: Vec<EventRecord>,
    /// State after commit
    pub state: ContractState,
}

/// Ledger counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    /// Committed transactions
    pub accepted: u64,
    /// Rejected transactions
    pub rejected: u64,
}

/// Accepts or rejects transactions against the committed state
#[async_trait]
pub trait Submitter<const DEPTH: usize>: Send + Sync {
    /// Committed state
    async fn state(&self) -> ContractState;

    /// Apply a transaction atomically
    async fn submit(&self, tx: Transaction<DEPTH>) -> Result<Receipt, ContractError>;

    /// Up to `limit` events starting at sequence number `from`
    async fn events(&self, from: u64, limit: usize) -> Vec<EventRecord>;
}

#[derive(Debug, Default)]
struct LedgerInner {
    state: ContractState,
    events: Vec<EventRecord>,
    stats: LedgerStats,
}

/// In-process ledger
#[derive(Debug, Default)]
pub struct LocalLedger<const DEPTH: usize, H: FieldHasher = Keccak256Hasher> {
    inner: Mutex<LedgerInner>,
    _hasher: PhantomData<H>,
}

impl<const DEPTH: usize, H: FieldHasher> LocalLedger<DEPTH, H> {
    /// Create an uninitialized ledger
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerInner::default()),
            _hasher: PhantomData,
        }
    }

    /// Accepted and rejected counts
    pub async fn stats(&self) -> LedgerStats {
        self.inner.lock().await.stats
    }
}

#[async_trait]
impl<const DEPTH: usize, H: FieldHasher> Submitter<DEPTH> for LocalLedger<DEPTH, H> {
    async fn state(&self) -> ContractState {
        self.inner.lock().await.state.clone()
    }

    async fn submit(&self, tx: Transaction<DEPTH>) -> Result<Receipt, ContractError> {
        let tx_hash = tx.hash();
        let method = tx.call.method();
        let mut inner = self.inner.lock().await;

        let commit = match TreeContract::<DEPTH, H>::apply(&inner.state, &tx) {
            Ok(commit) => commit,
            Err(e) => {
                inner.stats.rejected += 1;
                let rules = e.broken_rules();
                if rules.is_empty() {
                    warn!("Rejected {} {}: {}", method, tx_hash, e);
                } else {
                    let rules: Vec<String> = rules.iter().map(ToString::to_string).collect();
                    warn!("Rejected {} {}: {} ({})", method, tx_hash, e, rules.join(", "));
                }
                return Err(e);
            }
        };

        let first = inner.events.len() as u64;
        let events: Vec<EventRecord> = commit
            .events
            .into_iter()
            .enumerate()
            .map(|(i, event)| EventRecord {
                seq: first + i as u64,
                tx_hash,
                event,
            })
            .collect();
        for record in &events {
            debug!("Event {} #{}", record.event.name(), record.seq);
        }

        inner.state = commit.state;
        inner.events.extend(events.iter().cloned());
        inner.stats.accepted += 1;
        info!(
            "Committed {} {}: root={}, messages={}",
            method, tx_hash, inner.state.tree_root, inner.state.messages_received
        );

        Ok(Receipt {
            tx_hash,
            method,
            returned: commit.returned,
            events,
            state: inner.state.clone(),
        })
    }

    async fn events(&self, from: u64, limit: usize) -> Vec<EventRecord> {
        let inner = self.inner.lock().await;
        inner
            .events
            .iter()
            .skip(from as usize)
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mytree_core::Call;
    use mytree_merkle::{MerkleTree, PublicKey};

    fn sender() -> PublicKey {
        PublicKey::new(Field::from_u64(1), false)
    }

    #[tokio::test]
    async fn test_reject_leaves_state() {
        let ledger = LocalLedger::<3, Keccak256Hasher>::new();
        let tree = MerkleTree::<3, Keccak256Hasher>::new();

        let init = Call::InitState { root: tree.root() };
        let snapshot = ledger.state().await.snapshot();
        ledger
            .submit(Transaction::new(sender(), init.clone(), snapshot))
            .await
            .unwrap();
        let committed = ledger.state().await;

        let err = ledger
            .submit(Transaction::new(sender(), init, committed.snapshot()))
            .await
            .unwrap_err();
        assert_eq!(err, ContractError::AlreadyInitialized);
        assert_eq!(ledger.state().await, committed);
        assert_eq!(
            ledger.stats().await,
            LedgerStats {
                accepted: 1,
                rejected: 1
            }
        );
    }

    #[tokio::test]
    async fn test_check_flags_returns_value() {
        let ledger = LocalLedger::<3, Keccak256Hasher>::new();
        let snapshot = ledger.state().await.snapshot();
        let receipt = ledger
            .submit(Transaction::new(
                sender(),
                Call::CheckFlags {
                    secret: Field::from_u64(28),
                },
                snapshot,
            ))
            .await
            .unwrap();
        assert_eq!(receipt.method, Method::CheckFlags);
        assert_eq!(receipt.returned, Some(true));
        assert!(receipt.events.is_empty());
        assert!(ledger.events(0, 10).await.is_empty());
    }
}
