//! Projection snapshots
//!
//! Point-in-time copies of [`IndexerState`] tagged with the journal sequence
//! they include. Files are bincode, optionally zstd-compressed, written via a
//! temp file and rename, and verified against a SHA-256 state hash on load.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::errors::IndexerError;
use crate::store::IndexerState;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("No snapshots found")]
    NoSnapshots,
}

impl From<bincode::Error> for SnapshotError {
    fn from(e: bincode::Error) -> Self {
        SnapshotError::Serialization(e.to_string())
    }
}

impl From<IndexerError> for SnapshotError {
    fn from(e: IndexerError) -> Self {
        SnapshotError::Serialization(e.to_string())
    }
}

// ── Snapshot ────────────────────────────────────────────────────────

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Last journal sequence folded into `state`
    pub sequence: u64,
    pub state: IndexerState,
    /// SHA-256 of the bincode-encoded state
    pub checksum: String,
}

impl Snapshot {
    pub fn new(sequence: u64, state: IndexerState) -> Result<Self, SnapshotError> {
        let checksum = state.state_hash()?;
        Ok(Self {
            version: SNAPSHOT_VERSION,
            sequence,
            state,
            checksum,
        })
    }

    pub fn verify_integrity(&self) -> Result<(), SnapshotError> {
        let actual = self.state.state_hash()?;
        if actual != self.checksum {
            return Err(SnapshotError::IntegrityFailure {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }
}

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub dir: PathBuf,
    pub compress: bool,
    /// Snapshot once this many journal entries accumulated since the last one
    pub event_interval: u64,
    /// Snapshots retained after cleanup
    pub keep: usize,
}

impl SnapshotConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            compress: true,
            event_interval: 10_000,
            keep: 3,
        }
    }

    pub fn should_snapshot(&self, last_snapshot_seq: u64, current_seq: u64) -> bool {
        current_seq >= last_snapshot_seq + self.event_interval
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// Reads and writes snapshot files in one directory
pub struct SnapshotStore {
    config: SnapshotConfig,
}

impl SnapshotStore {
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn write(&self, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.config.dir)?;

        let data = bincode::serialize(snapshot)?;
        let (data, ext) = if self.config.compress {
            let compressed = zstd::encode_all(data.as_slice(), 3)
                .map_err(|e| SnapshotError::Compression(e.to_string()))?;
            (compressed, "snap.zst")
        } else {
            (data, "snap")
        };

        let filename = format!("snapshot-{:012}.{}", snapshot.sequence, ext);
        let path = self.config.dir.join(&filename);
        let tmp_path = self.config.dir.join(format!("{}.tmp", filename));
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        info!(
            sequence = snapshot.sequence,
            bytes = data.len(),
            path = %path.display(),
            "Snapshot written"
        );
        Ok(path)
    }

    pub fn load(&self, path: &Path) -> Result<Snapshot, SnapshotError> {
        let data = fs::read(path)?;
        let data = if path.extension().is_some_and(|e| e == "zst") {
            zstd::decode_all(data.as_slice()).map_err(|e| SnapshotError::Compression(e.to_string()))?
        } else {
            data
        };

        let snapshot: Snapshot = bincode::deserialize(&data)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        snapshot.verify_integrity()?;
        debug!(sequence = snapshot.sequence, path = %path.display(), "Snapshot loaded");
        Ok(snapshot)
    }

    pub fn load_latest(&self) -> Result<Snapshot, SnapshotError> {
        let (_, path) = self.list()?.pop().ok_or(SnapshotError::NoSnapshots)?;
        self.load(&path)
    }

    /// `(sequence, path)` pairs in ascending sequence order
    pub fn list(&self) -> Result<Vec<(u64, PathBuf)>, SnapshotError> {
        if !self.config.dir.exists() {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        for entry in fs::read_dir(&self.config.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(seq) = parse_sequence(&name) {
                results.push((seq, entry.path()));
            }
        }
        results.sort_by_key(|(seq, _)| *seq);
        Ok(results)
    }

    /// Remove all but the newest `keep` snapshots
    pub fn cleanup(&self) -> Result<Vec<PathBuf>, SnapshotError> {
        let snapshots = self.list()?;
        let excess = snapshots.len().saturating_sub(self.config.keep);
        let mut removed = Vec::with_capacity(excess);
        for (_, path) in snapshots.into_iter().take(excess) {
            fs::remove_file(&path)?;
            removed.push(path);
        }
        Ok(removed)
    }
}

fn parse_sequence(filename: &str) -> Option<u64> {
    let rest = filename.strip_prefix("snapshot-")?;
    let seq = rest
        .strip_suffix(".snap.zst")
        .or_else(|| rest.strip_suffix(".snap"))?;
    seq.parse().ok()
}

// ── Tests ───────────────────────────────────────────────────────────
