//! Raw event journal
//!
//! Append-only, CRC32C-checksummed log of the [`LedgerEvent`]s accepted from
//! the chain follower. The projections in [`crate::store`] are rebuildable
//! from it.
//!
//! # Binary Format (per entry)
//! ```text
//! [body_len: u32]
//! [sequence: u64]
//! [slot:     u64]
//! [event_type_len: u16][event_type: bytes]
//! [payload_len: u32][payload: bincode LedgerEvent]
//! [checksum: u32]  // CRC32C over sequence+slot+event_type+payload
//! ```

use crc32c::crc32c;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::events::LedgerEvent;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Sequence error: expected {expected}, got {got}")]
    SequenceError { expected: u64, got: u64 },

    #[error("Checksum mismatch at byte offset {offset}: entry seq={sequence}")]
    ChecksumMismatch { offset: u64, sequence: u64 },
}

impl From<bincode::Error> for JournalError {
    fn from(e: bincode::Error) -> Self {
        JournalError::Serialization(e.to_string())
    }
}

// ── Journal Entry ───────────────────────────────────────────────────

const MIN_BODY_LEN: usize = 8 + 8 + 2 + 4 + 4;
const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Gapless, starting at 1
    pub sequence: u64,
    pub slot: u64,
    pub event_type: String,
    pub payload: Vec<u8>,
    pub checksum: u32,
}

impl JournalEntry {
    pub fn new(sequence: u64, slot: u64, event_type: String, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(sequence, slot, &event_type, &payload);
        Self {
            sequence,
            slot,
            event_type,
            payload,
            checksum,
        }
    }

    pub fn from_event(sequence: u64, event: &LedgerEvent) -> Result<Self, JournalError> {
        let payload = bincode::serialize(event)?;
        Ok(Self::new(
            sequence,
            event.slot(),
            event.event_type_label().to_string(),
            payload,
        ))
    }

    pub fn event(&self) -> Result<LedgerEvent, JournalError> {
        Ok(bincode::deserialize(&self.payload)?)
    }

    pub fn compute_checksum(sequence: u64, slot: u64, event_type: &str, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(16 + event_type.len() + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&slot.to_le_bytes());
        buf.extend_from_slice(event_type.as_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.sequence, self.slot, &self.event_type, &self.payload)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let event_type = self.event_type.as_bytes();
        let body_len = (MIN_BODY_LEN + event_type.len() + self.payload.len()) as u32;

        let mut buf = Vec::with_capacity(4 + body_len as usize);
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.slot.to_le_bytes());
        buf.extend_from_slice(&(event_type.len() as u16).to_le_bytes());
        buf.extend_from_slice(event_type);
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parse one entry, returning it with the number of bytes consumed
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), JournalError> {
        let mut cursor = ByteCursor::new(data);
        let body_len = cursor.u32()? as usize;
        if !(MIN_BODY_LEN..=MAX_BODY_LEN).contains(&body_len) {
            return Err(JournalError::Serialization(format!(
                "Implausible body length: {}",
                body_len
            )));
        }
        let total = 4 + body_len;
        if data.len() < total {
            return Err(JournalError::Serialization(format!(
                "Incomplete entry: need {} bytes, have {}",
                total,
                data.len()
            )));
        }

        let mut body = ByteCursor::new(&data[4..total]);
        let sequence = body.u64()?;
        let slot = body.u64()?;
        let event_type_len = body.u16()? as usize;
        let event_type = String::from_utf8(body.take(event_type_len)?.to_vec())
            .map_err(|e| JournalError::Serialization(e.to_string()))?;
        let payload_len = body.u32()? as usize;
        let payload = body.take(payload_len)?.to_vec();
        let checksum = body.u32()?;

        Ok((
            Self {
                sequence,
                slot,
                event_type,
                payload,
                checksum,
            },
            total,
        ))
    }
}

struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], JournalError> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.data.len()).ok_or_else(|| {
            JournalError::Serialization(format!(
                "field of {} bytes exceeds remaining {} bytes",
                n,
                self.data.len() - self.pos
            ))
        })?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], JournalError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, JournalError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, JournalError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, JournalError> {
        Ok(u64::from_le_bytes(self.array()?))
    }
}

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    EveryWrite,
    EveryN(usize),
    /// Only when a file is rotated or on explicit `sync`
    OnRotation,
}

#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub dir: PathBuf,
    /// Rotate once the current file reaches this size (default 64 MiB)
    pub max_file_size: u64,
    pub fsync_policy: FsyncPolicy,
}

impl JournalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_size: 64 * 1024 * 1024,
            fsync_policy: FsyncPolicy::EveryWrite,
        }
    }
}

fn journal_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("journal-{:06}.bin", index))
}

fn journal_index(name: &str) -> Option<u64> {
    name.strip_prefix("journal-")?.strip_suffix(".bin")?.parse().ok()
}

fn discover_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>, JournalError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<(u64, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let idx = journal_index(&e.file_name().to_string_lossy())?;
            Some((idx, e.path()))
        })
        .collect();
    files.sort_by_key(|(idx, _)| *idx);
    Ok(files)
}

// ── Writer ──────────────────────────────────────────────────────────

pub struct JournalWriter {
    config: JournalConfig,
    writer: BufWriter<File>,
    file_index: u64,
    current_file_size: u64,
    next_sequence: u64,
    writes_since_fsync: usize,
}

impl JournalWriter {
    /// Open for appending, continuing after the last entry on disk
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)?;
        let file_index = discover_files(&config.dir)?.last().map(|(i, _)| *i).unwrap_or(0);
        let last_sequence = JournalReader::open(&config.dir)?.recover_entries().0.last().map(|e| e.sequence);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(journal_path(&config.dir, file_index))?;
        let current_file_size = file.metadata()?.len();

        Ok(Self {
            config,
            writer: BufWriter::new(file),
            file_index,
            current_file_size,
            next_sequence: last_sequence.map_or(1, |s| s + 1),
            writes_since_fsync: 0,
        })
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        if entry.sequence != self.next_sequence {
            return Err(JournalError::SequenceError {
                expected: self.next_sequence,
                got: entry.sequence,
            });
        }
        if self.current_file_size >= self.config.max_file_size {
            self.rotate()?;
        }

        let bytes = entry.to_bytes();
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        self.current_file_size += bytes.len() as u64;
        self.next_sequence = entry.sequence + 1;
        self.writes_since_fsync += 1;

        let should_fsync = match self.config.fsync_policy {
            FsyncPolicy::EveryWrite => true,
            FsyncPolicy::EveryN(n) => self.writes_since_fsync >= n,
            FsyncPolicy::OnRotation => false,
        };
        if should_fsync {
            self.writer.get_ref().sync_data()?;
            self.writes_since_fsync = 0;
        }
        Ok(())
    }

    /// Serialize and append `event` under the next sequence number
    pub fn write_event(&mut self, event: &LedgerEvent) -> Result<JournalEntry, JournalError> {
        let entry = JournalEntry::from_event(self.next_sequence, event)?;
        self.append(&entry)?;
        Ok(entry)
    }

    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.writes_since_fsync = 0;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), JournalError> {
        self.sync()?;
        self.file_index += 1;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(journal_path(&self.config.dir, self.file_index))?;
        self.writer = BufWriter::new(file);
        self.current_file_size = 0;
        Ok(())
    }
}

// ── Reader ──────────────────────────────────────────────────────────

/// Sequential reader over every journal file in a directory
pub struct JournalReader {
    files: Vec<PathBuf>,
    current_file_idx: usize,
    data: Vec<u8>,
    pos: usize,
    global_offset: u64,
    truncated_tail: bool,
}

impl JournalReader {
    pub fn open(dir: &Path) -> Result<Self, JournalError> {
        let files = discover_files(dir)?.into_iter().map(|(_, p)| p).collect();
        let mut reader = Self {
            files,
            current_file_idx: 0,
            data: Vec::new(),
            pos: 0,
            global_offset: 0,
            truncated_tail: false,
        };
        reader.load_current_file()?;
        Ok(reader)
    }

    /// Next entry with a valid checksum, `None` at the end of the journal
    ///
    /// An unparseable remainder of a file is treated as a torn write and
    /// skipped.
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>, JournalError> {
        loop {
            if self.pos >= self.data.len() && !self.advance_file()? {
                return Ok(None);
            }
            if self.pos >= self.data.len() {
                continue;
            }

            let offset = self.global_offset;
            match JournalEntry::from_bytes(&self.data[self.pos..]) {
                Ok((entry, consumed)) => {
                    self.pos += consumed;
                    self.global_offset += consumed as u64;
                    if !entry.verify_checksum() {
                        return Err(JournalError::ChecksumMismatch {
                            offset,
                            sequence: entry.sequence,
                        });
                    }
                    return Ok(Some(entry));
                }
                Err(e) => {
                    warn!(offset = offset, error = %e, "Truncated journal tail skipped");
                    self.truncated_tail = true;
                    self.global_offset += (self.data.len() - self.pos) as u64;
                    self.pos = self.data.len();
                }
            }
        }
    }

    pub fn read_all(&mut self) -> Result<Vec<JournalEntry>, JournalError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Entries with `sequence > after`, checked to be gapless
    pub fn read_after(&mut self, after: u64) -> Result<Vec<JournalEntry>, JournalError> {
        let mut entries = Vec::new();
        let mut expected = after + 1;
        while let Some(entry) = self.next_entry()? {
            if entry.sequence <= after {
                continue;
            }
            if entry.sequence != expected {
                return Err(JournalError::SequenceError {
                    expected,
                    got: entry.sequence,
                });
            }
            expected += 1;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Valid prefix of the journal; stops at the first corrupt entry
    pub fn recover_entries(&mut self) -> (Vec<JournalEntry>, Option<JournalError>) {
        let mut entries = Vec::new();
        loop {
            match self.next_entry() {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => return (entries, None),
                Err(e) => return (entries, Some(e)),
            }
        }
    }

    pub fn current_offset(&self) -> u64 {
        self.global_offset
    }

    pub fn saw_truncated_tail(&self) -> bool {
        self.truncated_tail
    }

    fn load_current_file(&mut self) -> Result<(), JournalError> {
        self.data.clear();
        self.pos = 0;
        if let Some(path) = self.files.get(self.current_file_idx) {
            File::open(path)?.read_to_end(&mut self.data)?;
        }
        Ok(())
    }

    fn advance_file(&mut self) -> Result<bool, JournalError> {
        if self.current_file_idx + 1 >= self.files.len() {
            return Ok(false);
        }
        self.current_file_idx += 1;
        self.load_current_file()?;
        Ok(true)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
