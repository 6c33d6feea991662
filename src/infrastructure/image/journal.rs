//! Append-only journal of disk cache mutations.
//!
//! One record per line, fields separated by a single space:
//! `DIRTY <key>`, `CLEAN <key> <size>`, `REMOVE <key>`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use lru::LruCache;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, trace, warn};

/// File name of the journal inside the cache directory.
pub const JOURNAL_FILE: &str = "journal.txt";

const JOURNAL_TMP_FILE: &str = "journal.txt.tmp";

/// A single journal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    /// A write for the key has started.
    Dirty(String),
    /// A write for the key completed with the given size in bytes.
    Clean(String, u64),
    /// The key was removed.
    Remove(String),
}

impl JournalRecord {
    /// Parses one journal line. Returns `None` for blank or malformed lines.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let op = parts.next()?;
        let key = parts.next()?.to_string();
        let record = match op {
            "DIRTY" => Self::Dirty(key),
            "CLEAN" => Self::Clean(key, parts.next()?.parse().ok()?),
            "REMOVE" => Self::Remove(key),
            _ => return None,
        };
        parts.next().is_none().then_some(record)
    }

    /// Key this record refers to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Dirty(key) | Self::Clean(key, _) | Self::Remove(key) => key,
        }
    }
}

impl std::fmt::Display for JournalRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dirty(key) => write!(f, "DIRTY {key}"),
            Self::Clean(key, size) => write!(f, "CLEAN {key} {size}"),
            Self::Remove(key) => write!(f, "REMOVE {key}"),
        }
    }
}

/// Outcome of replaying a journal against the files present on disk.
pub struct Replay {
    /// Live entries with their sizes, in recency order.
    pub index: LruCache<String, u64>,
    /// Sum of live entry sizes.
    pub total_size: u64,
    /// Keys whose last write never completed.
    pub dirty: HashSet<String>,
}

/// Replays `records` in order.
///
/// `file_exists` reports whether the backing file for a key is present; a
/// `CLEAN` record whose file is gone is dropped. Keys still dirty at the end
/// are left out of the index even if an earlier `CLEAN` installed them.
pub fn replay<F>(records: &[JournalRecord], file_exists: F) -> Replay
where
    F: Fn(&str) -> bool,
{
    let mut index: LruCache<String, u64> = LruCache::unbounded();
    let mut total_size = 0u64;
    let mut dirty = HashSet::new();

    for record in records {
        match record {
            JournalRecord::Dirty(key) => {
                dirty.insert(key.clone());
            }
            JournalRecord::Clean(key, size) => {
                if file_exists(key) {
                    if let Some(old) = index.put(key.clone(), *size) {
                        total_size -= old;
                    }
                    total_size += size;
                    dirty.remove(key);
                } else {
                    trace!(key = %key, "Dropping journal entry with missing file");
                }
            }
            JournalRecord::Remove(key) => {
                if let Some(old) = index.pop(key) {
                    total_size -= old;
                }
                dirty.remove(key);
            }
        }
    }

    for key in &dirty {
        if let Some(size) = index.pop(key) {
            total_size -= size;
            trace!(key = %key, "Dropping entry whose last write never finished");
        }
    }

    Replay {
        index,
        total_size,
        dirty,
    }
}

/// Handle to the journal file. Not synchronized; the owner serializes access.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl Journal {
    /// Creates a handle for the journal in `dir`. Does not touch the filesystem.
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(JOURNAL_FILE),
            tmp_path: dir.join(JOURNAL_TMP_FILE),
        }
    }

    /// Returns true if `name` is the temporary file left by an interrupted rewrite.
    #[must_use]
    pub fn is_temp_file(name: &str) -> bool {
        name == JOURNAL_TMP_FILE
    }

    /// Reads all well-formed records. A missing journal reads as empty.
    ///
    /// # Errors
    /// Returns the I/O error if the journal exists but cannot be read.
    pub async fn read_records(&self) -> std::io::Result<Vec<JournalRecord>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut records = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match JournalRecord::parse(line) {
                Some(record) => records.push(record),
                None => warn!(line = %line, "Skipping malformed journal line"),
            }
        }
        Ok(records)
    }

    /// Appends a record. Failures are logged and otherwise ignored.
    pub async fn append(&self, record: &JournalRecord) {
        if let Err(e) = self.try_append(record).await {
            error!(record = %record, error = %e, "Failed to write journal");
        }
    }

    async fn try_append(&self, record: &JournalRecord) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{record}\n").as_bytes()).await?;
        file.flush().await
    }

    /// Truncates the journal to an empty file.
    ///
    /// # Errors
    /// Returns the I/O error if the file cannot be recreated.
    pub async fn reset(&self) -> std::io::Result<()> {
        fs::write(&self.path, b"").await
    }

    /// Atomically replaces the journal with `records`.
    ///
    /// # Errors
    /// Returns the I/O error if the temporary file cannot be written or renamed.
    pub async fn rewrite(&self, records: &[JournalRecord]) -> std::io::Result<()> {
        let mut content = String::new();
        for record in records {
            content.push_str(&record.to_string());
            content.push('\n');
        }
        fs::write(&self.tmp_path, content).await?;
        fs::rename(&self.tmp_path, &self.path).await
    }
}
