//! Host-side services for the deposit tree
//!
//! - [`Mirror`]: the full off-chain tree that witnesses are taken from
//! - [`LocalLedger`]: the submission layer committing transactions atomically
//! - [`TreeClient`]: builds transactions and keeps the mirror in lock-step

pub mod client;
pub mod config;
pub mod ledger;
pub mod mirror;

pub use client::{MirrorDiverged, TreeClient};
pub use config::{Config, Member};
pub use ledger::{EventRecord, LedgerStats, LocalLedger, Receipt, Submitter};
pub use mirror::Mirror;
