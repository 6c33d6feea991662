//! Journaled, size-bounded LRU store of files keyed by filesystem-safe names.
//!
//! Every public operation holds one async mutex for its full duration, so the
//! index, the running size and the journal never interleave partial updates.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use lru::LruCache;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::domain::ports::{CacheError, CacheResult};

use super::journal::{Journal, JournalRecord, replay};

/// Redundant journal records tolerated before the journal is compacted on open.
const COMPACTION_THRESHOLD: usize = 2000;

const TMP_SUFFIX: &str = ".tmp";

struct StoreState {
    index: LruCache<String, u64>,
    current_size: u64,
    journal: Journal,
}

/// Removes a temporary file when dropped unless disarmed.
///
/// Covers writes abandoned mid-flight when the owning future is dropped.
struct TempFileGuard {
    path: Option<PathBuf>,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take()
            && let Err(e) = std::fs::remove_file(&path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %e, "Failed to remove temp file");
        }
    }
}

/// Persistent LRU mapping keys to files, with crash recovery through a journal.
pub struct JournaledLruStore {
    dir: PathBuf,
    max_size: u64,
    state: Mutex<StoreState>,
}

impl std::fmt::Debug for JournaledLruStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournaledLruStore")
            .field("dir", &self.dir)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl JournaledLruStore {
    /// Opens the store in `dir`, replaying its journal.
    ///
    /// Files of unfinished or removed writes are deleted, then entries are
    /// evicted until the store fits `max_size`. Files whose names the journal
    /// never mentions are left alone.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or listed, or the
    /// journal exists but cannot be read.
    pub async fn open(dir: PathBuf, max_size: u64) -> CacheResult<Self> {
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::IoError(format!("Failed to create cache dir: {e}")))?;

        let journal = Journal::new(&dir);
        let records = journal
            .read_records()
            .await
            .map_err(|e| CacheError::IoError(format!("Failed to read journal: {e}")))?;

        let existing = list_files(&dir).await?;
        let replayed = replay(&records, |key| existing.contains(key));

        let journaled: HashSet<&str> = records
            .iter()
            .map(JournalRecord::key)
            .filter(|key| is_valid_key(key))
            .collect();
        let mut stray = 0usize;
        for name in &existing {
            if replayed.index.contains(name.as_str()) || !is_leftover(name, &journaled) {
                continue;
            }
            remove_file_logged(&dir.join(name)).await;
            stray += 1;
        }

        let mut state = StoreState {
            index: replayed.index,
            current_size: replayed.total_size,
            journal,
        };

        info!(
            dir = %dir.display(),
            records = records.len(),
            entries = state.index.len(),
            size = state.current_size,
            dirty = replayed.dirty.len(),
            stray = stray,
            "Replayed disk cache journal"
        );

        evict_to_budget(&dir, &mut state, max_size).await;

        let redundant = records.len().saturating_sub(state.index.len());
        if redundant > COMPACTION_THRESHOLD && redundant > state.index.len() {
            compact(&mut state).await;
        }

        Ok(Self {
            dir,
            max_size,
            state: Mutex::new(state),
        })
    }

    /// Byte budget.
    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Writes `bytes` under `key`, replacing any previous entry.
    ///
    /// Keys are file names and journal tokens, so only `[0-9a-z]+` is accepted.
    ///
    /// On failure the temp file is removed, `REMOVE key` is journaled and no
    /// entry remains for `key`.
    ///
    /// # Errors
    /// Returns error if `key` is not a valid entry name, or the payload cannot
    /// be written or renamed into place.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> CacheResult<()> {
        if !is_valid_key(key) {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        let mut state = self.state.lock().await;
        state
            .journal
            .append(&JournalRecord::Dirty(key.to_string()))
            .await;

        let tmp_path = self.dir.join(format!("{key}{TMP_SUFFIX}"));
        let path = self.entry_path(key);
        let mut guard = TempFileGuard::new(tmp_path.clone());

        match write_then_rename(&tmp_path, &path, bytes).await {
            Ok(()) => {
                guard.disarm();
                let size = bytes.len() as u64;
                if let Some(old) = state.index.put(key.to_string(), size) {
                    state.current_size -= old;
                }
                state.current_size += size;
                state
                    .journal
                    .append(&JournalRecord::Clean(key.to_string(), size))
                    .await;
                debug!(key = %key, size = size, "Stored entry on disk");
                evict_to_budget(&self.dir, &mut state, self.max_size).await;
                Ok(())
            }
            Err(e) => {
                drop(guard);
                if let Some(old) = state.index.pop(key) {
                    state.current_size -= old;
                    remove_file_logged(&path).await;
                }
                state
                    .journal
                    .append(&JournalRecord::Remove(key.to_string()))
                    .await;
                warn!(key = %key, error = %e, "Failed to write disk cache entry");
                Err(e)
            }
        }
    }

    /// Reads the bytes for `key`, marking it most recently used.
    ///
    /// An indexed entry whose file cannot be read is removed.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.get_verified(key, Ok::<_, std::convert::Infallible>)
            .await
    }

    /// Reads the bytes for `key` and passes them through `verify` on a
    /// blocking thread, under the store lock.
    ///
    /// If the file is unreadable or `verify` fails, the entry is deleted and
    /// journaled as removed so it is never served again.
    pub async fn get_verified<T, E, F>(&self, key: &str, verify: F) -> Option<T>
    where
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
        F: FnOnce(Vec<u8>) -> Result<T, E> + Send + 'static,
    {
        let mut state = self.state.lock().await;
        if state.index.get(key).is_none() {
            trace!(key = %key, "Disk store miss");
            return None;
        }

        let path = self.entry_path(key);
        let reason = match fs::read(&path).await {
            Ok(bytes) => match tokio::task::spawn_blocking(move || verify(bytes)).await {
                Ok(Ok(value)) => {
                    trace!(key = %key, "Disk store hit");
                    return Some(value);
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("verification task failed: {e}"),
            },
            Err(e) => format!("read failed: {e}"),
        };

        warn!(key = %key, reason = %reason, "Removing unreadable disk cache entry");
        Self::remove_locked(&self.dir, &mut state, key).await;
        None
    }

    /// Removes `key`. Returns true if an entry was present.
    pub async fn remove(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        Self::remove_locked(&self.dir, &mut state, key).await
    }

    async fn remove_locked(dir: &Path, state: &mut StoreState, key: &str) -> bool {
        let Some(size) = state.index.pop(key) else {
            return false;
        };
        state.current_size -= size;
        remove_file_logged(&dir.join(key)).await;
        state
            .journal
            .append(&JournalRecord::Remove(key.to_string()))
            .await;
        debug!(key = %key, "Removed disk cache entry");
        true
    }

    /// Deletes every entry and truncates the journal.
    ///
    /// # Errors
    /// Returns error if the journal cannot be recreated.
    pub async fn clear(&self) -> CacheResult<()> {
        let mut state = self.state.lock().await;
        let keys: Vec<String> = state.index.iter().map(|(k, _)| k.clone()).collect();
        for key in &keys {
            remove_file_logged(&self.entry_path(key)).await;
        }
        state.index.clear();
        state.current_size = 0;
        state
            .journal
            .reset()
            .await
            .map_err(|e| CacheError::IoError(format!("Failed to reset journal: {e}")))?;
        debug!(removed = keys.len(), "Cleared disk store");
        Ok(())
    }

    /// Returns true if `key` is indexed. Does not affect recency.
    pub async fn contains(&self, key: &str) -> bool {
        self.state.lock().await.index.contains(key)
    }

    /// Number of indexed entries.
    pub async fn len(&self) -> usize {
        self.state.lock().await.index.len()
    }

    /// Returns true if no entries are indexed.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Sum of indexed entry sizes in bytes.
    pub async fn current_size(&self) -> u64 {
        self.state.lock().await.current_size
    }

    /// Keys from least to most recently used.
    pub async fn keys_lru_first(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.index.iter().rev().map(|(k, _)| k.clone()).collect()
    }
}

/// Entry names: non-empty, lowercase ASCII letters and digits only.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Returns true for a file this store wrote for a journaled key, or for the
/// journal's own temp file.
fn is_leftover(name: &str, journaled: &HashSet<&str>) -> bool {
    if Journal::is_temp_file(name) {
        return true;
    }
    let key = name.strip_suffix(TMP_SUFFIX).unwrap_or(name);
    journaled.contains(key)
}

async fn write_then_rename(tmp_path: &Path, path: &Path, bytes: &[u8]) -> CacheResult<()> {
    let mut file = fs::File::create(tmp_path)
        .await
        .map_err(|e| CacheError::IoError(format!("Failed to create temp file: {e}")))?;
    file.write_all(bytes)
        .await
        .map_err(|e| CacheError::IoError(format!("Failed to write temp file: {e}")))?;
    file.flush()
        .await
        .map_err(|e| CacheError::IoError(format!("Failed to flush temp file: {e}")))?;
    drop(file);
    fs::rename(tmp_path, path)
        .await
        .map_err(|e| CacheError::IoError(format!("Failed to rename temp file: {e}")))
}

/// Evicts least recently used entries until the store fits `max_size`.
async fn evict_to_budget(dir: &Path, state: &mut StoreState, max_size: u64) {
    while state.current_size > max_size {
        let Some((key, size)) = state.index.pop_lru() else {
            break;
        };
        state.current_size -= size;
        remove_file_logged(&dir.join(&key)).await;
        state.journal.append(&JournalRecord::Remove(key.clone())).await;
        debug!(
            key = %key,
            size = size,
            current_size = state.current_size,
            max_size = max_size,
            "Evicted disk cache entry"
        );
    }
}

/// Rewrites the journal as one `CLEAN` record per live entry, oldest first.
async fn compact(state: &mut StoreState) {
    let records: Vec<JournalRecord> = state
        .index
        .iter()
        .rev()
        .map(|(k, size)| JournalRecord::Clean(k.clone(), *size))
        .collect();
    match state.journal.rewrite(&records).await {
        Ok(()) => debug!(records = records.len(), "Compacted disk cache journal"),
        Err(e) => warn!(error = %e, "Failed to compact disk cache journal"),
    }
}

async fn list_files(dir: &Path) -> CacheResult<HashSet<String>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| CacheError::IoError(format!("Failed to read cache dir: {e}")))?;
    let mut names = HashSet::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
        if is_file && let Some(name) = entry.file_name().to_str() {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

async fn remove_file_logged(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "Failed to remove cache file");
    }
}
