//! State Indexer
//!
//! Consumes ledger events in block order and maintains the projections the
//! transaction assembler and query surface read: the per-address balance
//! log, the token registration mirror and the mirror of on-chain registry
//! and credential list nodes. Accepted events are journaled so the
//! projections can be rebuilt, and snapshots bound recovery time.
//!
//! # Modules
//! - `events`: Ledger event model and chain points
//! - `balance`: Balance log rows and per-address deltas
//! - `store`: Projection tables, queries and rollback truncation
//! - `ingest`: Ordered, idempotent, atomic event ingestion
//! - `journal`: CRC32C-checksummed append-only event journal
//! - `snapshot`: Hashed, optionally compressed state snapshots
//! - `recovery`: Rebuild, snapshot recovery and journaled ingestion

pub mod balance;
pub mod errors;
pub mod events;
pub mod ingest;
pub mod journal;
pub mod recovery;
pub mod snapshot;
pub mod store;

pub use errors::IndexerError;
pub use events::{ChainPoint, LedgerEvent, ObservedTx};
pub use ingest::{Indexer, IndexerConfig, IngestOutcome, Planned};
pub use store::IndexerState;
