//! Recovery and journaled ingestion
//!
//! Projections are rebuilt either from scratch (empty state + full journal)
//! or from the latest snapshot plus the journal entries after it. Both paths
//! replay through [`Indexer::ingest`], so they produce the same state.

use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::errors::IndexerError;
use crate::events::LedgerEvent;
use crate::ingest::{IndexerConfig, Indexer, IngestOutcome};
use crate::journal::{JournalConfig, JournalEntry, JournalError, JournalReader, JournalWriter};
use crate::snapshot::{Snapshot, SnapshotConfig, SnapshotError, SnapshotStore};
use crate::store::IndexerState;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Replay of sequence {sequence} failed: {source}")]
    Replay { sequence: u64, source: IndexerError },

    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),

    #[error("State hash divergence: expected {expected}, got {actual} at sequence {sequence}")]
    HashDivergence {
        expected: String,
        actual: String,
        sequence: u64,
    },
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// 0 when no snapshot was used
    pub snapshot_sequence: u64,
    pub replayed: u64,
    pub final_sequence: u64,
    pub state_hash: String,
    pub elapsed_ms: u64,
}

fn replay(
    indexer: &mut Indexer,
    entries: Vec<JournalEntry>,
) -> Result<(u64, Option<u64>), RecoveryError> {
    let mut replayed = 0;
    let mut last = None;
    for entry in entries {
        let event = entry.event()?;
        indexer.ingest(&event).map_err(|source| RecoveryError::Replay {
            sequence: entry.sequence,
            source,
        })?;
        replayed += 1;
        last = Some(entry.sequence);
    }
    Ok((replayed, last))
}

fn check_hash(
    state: &IndexerState,
    expected: Option<&str>,
    sequence: u64,
) -> Result<String, RecoveryError> {
    let actual = state.state_hash()?;
    if let Some(expected) = expected {
        if expected != actual {
            error!(expected = expected, actual = %actual, sequence = sequence, "State hash divergence");
            return Err(RecoveryError::HashDivergence {
                expected: expected.to_string(),
                actual,
                sequence,
            });
        }
    }
    Ok(actual)
}

/// Replay the whole journal into an empty state
pub fn rebuild(
    config: IndexerConfig,
    journal_dir: &Path,
    expected_hash: Option<&str>,
) -> Result<(Indexer, RecoveryReport), RecoveryError> {
    let start = Instant::now();
    let mut indexer = Indexer::new(config);
    let entries = JournalReader::open(journal_dir)?.read_after(0)?;
    let (replayed, last) = replay(&mut indexer, entries)?;
    let final_sequence = last.unwrap_or(0);
    let state_hash = check_hash(indexer.state(), expected_hash, final_sequence)?;

    let report = RecoveryReport {
        snapshot_sequence: 0,
        replayed,
        final_sequence,
        state_hash,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    info!(replayed = replayed, final_sequence = final_sequence, "Indexer rebuilt from journal");
    Ok((indexer, report))
}

/// Latest snapshot plus the journal entries after it
///
/// Falls back to [`rebuild`] when no snapshot exists.
pub fn recover(
    config: IndexerConfig,
    journal_dir: &Path,
    snapshots: &SnapshotStore,
    expected_hash: Option<&str>,
) -> Result<(Indexer, RecoveryReport), RecoveryError> {
    let start = Instant::now();
    let snapshot = match snapshots.load_latest() {
        Ok(snapshot) => snapshot,
        Err(SnapshotError::NoSnapshots) => {
            info!("No snapshots found, rebuilding from journal");
            return rebuild(config, journal_dir, expected_hash);
        }
        Err(e) => return Err(e.into()),
    };

    let snapshot_sequence = snapshot.sequence;
    let mut indexer = Indexer::with_state(config, snapshot.state);
    let entries = JournalReader::open(journal_dir)?.read_after(snapshot_sequence)?;
    let (replayed, last) = replay(&mut indexer, entries)?;
    let final_sequence = last.unwrap_or(snapshot_sequence);
    let state_hash = check_hash(indexer.state(), expected_hash, final_sequence)?;

    let report = RecoveryReport {
        snapshot_sequence,
        replayed,
        final_sequence,
        state_hash,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        snapshot_sequence = snapshot_sequence,
        replayed = replayed,
        final_sequence = final_sequence,
        elapsed_ms = report.elapsed_ms,
        "Indexer recovered"
    );
    Ok((indexer, report))
}

// ── Journaled Indexer ───────────────────────────────────────────────

/// Indexer whose accepted events are persisted to the journal
///
/// An event is checked against the state, journaled if it would change the
/// state, and only then applied in memory. If the journal write fails the
/// state is untouched, so the follower fetches the event again from the same
/// cursor.
pub struct JournaledIndexer {
    indexer: Indexer,
    journal: JournalWriter,
    snapshots: Option<SnapshotStore>,
    last_snapshot_seq: u64,
}

impl JournaledIndexer {
    /// Recover from disk and open the journal for appending
    pub fn open(
        config: IndexerConfig,
        journal: JournalConfig,
        snapshots: Option<SnapshotConfig>,
    ) -> Result<(Self, RecoveryReport), RecoveryError> {
        let snapshots = snapshots.map(SnapshotStore::new);
        let (indexer, report) = match &snapshots {
            Some(store) => recover(config, &journal.dir, store, None)?,
            None => rebuild(config, &journal.dir, None)?,
        };
        let writer = JournalWriter::open(journal)?;
        if writer.next_sequence() != report.final_sequence + 1 {
            warn!(
                next_sequence = writer.next_sequence(),
                final_sequence = report.final_sequence,
                "Journal tail was not replayed"
            );
        }
        Ok((
            Self {
                indexer,
                journal: writer,
                snapshots,
                last_snapshot_seq: report.snapshot_sequence,
            },
            report,
        ))
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    pub fn state(&self) -> &IndexerState {
        self.indexer.state()
    }

    pub fn ingest(&mut self, event: &LedgerEvent) -> Result<IngestOutcome, RecoveryError> {
        let planned = self.indexer.prepare(event)?;
        if !planned.changes_state() {
            return Ok(self.indexer.commit(planned));
        }

        let entry = self.journal.write_event(event)?;
        let outcome = self.indexer.commit(planned);
        self.maybe_snapshot(entry.sequence)?;
        Ok(outcome)
    }

    /// Write a snapshot now, regardless of the interval
    pub fn snapshot(&mut self) -> Result<Option<u64>, RecoveryError> {
        let sequence = self.journal.next_sequence().saturating_sub(1);
        let Some(store) = &self.snapshots else {
            return Ok(None);
        };
        self.journal.sync()?;
        store.write(&Snapshot::new(sequence, self.indexer.state().clone())?)?;
        store.cleanup()?;
        self.last_snapshot_seq = sequence;
        Ok(Some(sequence))
    }

    fn maybe_snapshot(&mut self, sequence: u64) -> Result<(), RecoveryError> {
        let due = self
            .snapshots
            .as_ref()
            .is_some_and(|s| s.config().should_snapshot(self.last_snapshot_seq, sequence));
        if due {
            self.snapshot()?;
        }
        Ok(())
    }
}
