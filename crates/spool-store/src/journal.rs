// ABOUTME: Two-file journaled store: producers append to a write journal, the drain reads from a read journal.
// ABOUTME: Entries are newline-framed line pairs; the read side is addressed from the tail and truncated on pop.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use spool_core::{EOL, encoded_len};
use thiserror::Error;

use crate::backend::{BackendKind, CacheBackend, RawEntry};
use crate::index::LineIndex;

/// File name of the journal producers append to.
pub const WRITE_JOURNAL: &str = "data_write";

/// File name of the journal the drain loop consumes.
pub const READ_JOURNAL: &str = "data_read";

/// Errors raised while opening a store. Once open, the store never returns
/// errors; failed operations are logged and report `false`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create cache directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create journal file {path}: {source}")]
    FileCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open journal file {path}: {source}")]
    FileHandleCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to recover journal {path}: {source}")]
    RecoveryFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

struct Journals {
    write: File,
    read: File,
}

/// A size-capped, crash-safe entry store backed by two journal files.
///
/// New entries are appended to `data_write`. When the read side runs dry,
/// the whole write journal is moved onto the end of `data_read` and the line
/// index is rebuilt. Peek and pop work on the *last* entry of the read
/// journal, so delivery order within one merge cycle is newest first; this
/// keeps pop a single truncate instead of a rewrite of the file.
pub struct JournaledStore {
    dir: PathBuf,
    write_path: PathBuf,
    read_path: PathBuf,
    journals: Option<Journals>,
    read_index: LineIndex,
    write_entries: usize,
    max_size: u64,
    current_size: u64,
    size_limit_reached: bool,
    size_warnings: u64,
}

impl JournaledStore {
    /// Open (or create) the journals inside `dir`, repairing any torn tail
    /// left by an interrupted write and rebuilding the line index.
    pub fn open(dir: &Path, max_size: u64) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|source| StoreError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source,
        })?;

        let write_path = dir.join(WRITE_JOURNAL);
        let read_path = dir.join(READ_JOURNAL);

        let mut write = open_journal(&write_path)?;
        let mut read = open_journal(&read_path)?;

        let read_index = recover_journal(&mut read, &read_path)?;
        let write_index = recover_journal(&mut write, &write_path)?;

        let mut store = Self {
            dir: dir.to_path_buf(),
            write_path,
            read_path,
            journals: Some(Journals { write, read }),
            read_index,
            write_entries: write_index.entry_count(),
            max_size,
            current_size: 0,
            size_limit_reached: false,
            size_warnings: 0,
        };
        store.refresh_size();

        tracing::info!(
            dir = %store.dir.display(),
            ready = store.read_index.entry_count(),
            buffered = store.write_entries,
            bytes = store.current_size,
            "opened journaled store"
        );

        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn read_path(&self) -> &Path {
        &self.read_path
    }

    pub fn write_path(&self) -> &Path {
        &self.write_path
    }

    pub fn is_closed(&self) -> bool {
        self.journals.is_none()
    }

    /// Complete entries in the read journal.
    pub fn number_of_batches(&self) -> usize {
        self.read_index.entry_count()
    }

    /// Entries appended to the write journal since the last merge.
    pub fn buffered_entries(&self) -> usize {
        self.write_entries
    }

    /// Bytes currently held across both journals.
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// How many times the store has crossed into the over-limit state.
    pub fn size_warnings(&self) -> u64 {
        self.size_warnings
    }

    /// True if anything is left to deliver. Merges the write journal first
    /// when the read journal is empty.
    pub fn has_content(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        if !self.read_index.is_empty() {
            return true;
        }
        if self.write_entries > 0 {
            self.merge();
            return !self.read_index.is_empty();
        }
        false
    }

    /// True if an entry with these escaped lines fits under the size cap.
    pub fn can_write(&mut self, destination: &str, body: &str) -> bool {
        self.check_capacity(encoded_len(destination, body))
    }

    /// True if `raw` bytes of already-framed content fit under the size cap.
    pub fn can_write_raw(&mut self, raw: &str) -> bool {
        self.check_capacity(raw.len() as u64)
    }

    /// Append one entry to the write journal.
    ///
    /// Both lines must already be escaped. Returns false, leaving the store
    /// untouched, when the store is closed, a line contains a raw newline,
    /// the entry would exceed the size cap, or the append fails.
    pub fn write(&mut self, destination: &str, body: &str) -> bool {
        if self.is_closed() {
            tracing::debug!("write rejected, store is closed");
            return false;
        }
        if destination.contains(EOL) || body.contains(EOL) {
            tracing::warn!(
                destination = %destination,
                "refusing to write entry containing an unescaped line break"
            );
            return false;
        }
        if !self.can_write(destination, body) {
            return false;
        }

        let mut record = String::with_capacity(destination.len() + body.len() + 2 * EOL.len());
        record.push_str(destination);
        record.push_str(EOL);
        record.push_str(body);
        record.push_str(EOL);

        let Some(journals) = self.journals.as_mut() else {
            return false;
        };

        let before = match journals.write.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::error!(error = %e, "failed to stat write journal");
                return false;
            }
        };

        if let Err(e) = journals
            .write
            .write_all(record.as_bytes())
            .and_then(|_| journals.write.sync_data())
        {
            tracing::error!(error = %e, "failed to append to write journal");
            if let Err(e) = journals.write.set_len(before) {
                tracing::error!(error = %e, "failed to roll back partial append");
            }
            return false;
        }

        self.write_entries += 1;
        self.current_size += record.len() as u64;
        true
    }

    /// The most recently merged entry of the read journal, without removing it.
    ///
    /// If the file no longer matches the line index, the index is rebuilt
    /// from disk and the tail is read once more.
    pub fn peek(&mut self) -> Option<RawEntry> {
        if self.is_closed() {
            return None;
        }
        if self.read_index.is_empty() && self.write_entries > 0 {
            self.merge();
        }

        match self.read_tail()? {
            Ok(entry) => Some(entry),
            Err((expected, found)) => {
                tracing::warn!(expected, found, "read journal out of step with its index, rebuilding");
                self.rebuild_read_index();
                self.read_tail()?.ok()
            }
        }
    }

    /// Read the entry the index places at the end of the read journal.
    /// `Err((expected, found))` when the bytes on disk disagree with the index.
    fn read_tail(&mut self) -> Option<Result<RawEntry, (u64, u64)>> {
        let (dest_len, body_len) = self.read_index.last_entry()?;
        let entry_len = dest_len + body_len + 2 * EOL.len() as u64;
        let file_size = self.read_index.byte_len();

        let journals = self.journals.as_mut()?;
        let record = match read_from(&mut journals.read, file_size - entry_len) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "failed to read tail of read journal");
                return None;
            }
        };

        if record.len() as u64 != entry_len {
            return Some(Err((entry_len, record.len() as u64)));
        }

        let dest_end = dest_len as usize;
        let body_start = dest_end + EOL.len();
        let body_end = body_start + body_len as usize;

        Some(Ok(RawEntry {
            destination: record[..dest_end].to_vec(),
            body: record[body_start..body_end].to_vec(),
        }))
    }

    /// Remove the last entry of the read journal by truncating the file.
    pub fn pop(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        let Some(entry_len) = self.read_index.last_entry_len() else {
            tracing::warn!("pop requested but the read journal holds no complete entry");
            return false;
        };
        let new_len = self.read_index.byte_len() - entry_len;

        let Some(journals) = self.journals.as_mut() else {
            return false;
        };
        if let Err(e) = journals
            .read
            .set_len(new_len)
            .and_then(|_| journals.read.sync_data())
        {
            tracing::error!(error = %e, "failed to truncate read journal");
            return false;
        }

        self.read_index.pop_entry();
        self.refresh_size();
        true
    }

    /// Empty both journals.
    pub fn clear(&mut self) {
        if let Some(journals) = self.journals.as_mut() {
            for (file, path) in [
                (&mut journals.read, &self.read_path),
                (&mut journals.write, &self.write_path),
            ] {
                if let Err(e) = file.set_len(0).and_then(|_| file.sync_all()) {
                    tracing::error!(path = %path.display(), error = %e, "failed to clear journal");
                }
            }
        }
        self.read_index = LineIndex::default();
        self.write_entries = 0;
        self.size_limit_reached = false;
        self.refresh_size();
    }

    /// Current usage as a fraction of the size cap, measured from the files.
    pub fn fill_ratio(&self) -> f64 {
        if self.max_size == 0 {
            return 1.0;
        }
        let used = journal_len(&self.read_path) + journal_len(&self.write_path);
        (used as f64 / self.max_size as f64).clamp(0.0, 1.0)
    }

    /// Flush and release both journals. Later operations fail safely.
    pub fn close(&mut self) {
        let Some(journals) = self.journals.take() else {
            return;
        };
        for (file, path) in [
            (&journals.read, &self.read_path),
            (&journals.write, &self.write_path),
        ] {
            if let Err(e) = file.sync_all() {
                tracing::error!(path = %path.display(), error = %e, "failed to flush journal on close");
            }
        }
        tracing::info!(dir = %self.dir.display(), "closed journaled store");
    }

    fn check_capacity(&mut self, additional: u64) -> bool {
        if self.is_closed() {
            return false;
        }
        let fits = self.current_size.saturating_add(additional) <= self.max_size;
        if fits {
            if self.size_limit_reached {
                self.size_limit_reached = false;
                tracing::info!(
                    current = self.current_size,
                    max = self.max_size,
                    "cache back under its size limit"
                );
            }
        } else if !self.size_limit_reached {
            self.size_limit_reached = true;
            self.size_warnings += 1;
            tracing::warn!(
                current = self.current_size,
                max = self.max_size,
                "cache size limit reached, new entries will be dropped"
            );
        }
        fits
    }

    /// Move the whole write journal onto the end of the read journal.
    fn merge(&mut self) -> bool {
        let Some(journals) = self.journals.as_mut() else {
            return false;
        };

        let pending = match read_from(&mut journals.write, 0) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to read write journal for merge");
                return false;
            }
        };
        if pending.is_empty() {
            self.write_entries = 0;
            return false;
        }

        let read_len = match journals.read.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::error!(error = %e, "failed to stat read journal for merge");
                return false;
            }
        };

        if let Err(e) = journals
            .read
            .write_all(&pending)
            .and_then(|_| journals.read.sync_data())
        {
            tracing::error!(error = %e, "failed to append write journal onto read journal");
            if let Err(e) = journals.read.set_len(read_len) {
                tracing::error!(error = %e, "failed to roll back partial merge");
            }
            return false;
        }

        // Entries are on both sides until this truncate lands; a failure here
        // means they get delivered twice, never lost.
        if let Err(e) = journals
            .write
            .set_len(0)
            .and_then(|_| journals.write.sync_data())
        {
            tracing::error!(error = %e, "failed to truncate write journal after merge");
        }

        self.write_entries = 0;
        self.rebuild_read_index();

        tracing::debug!(
            merged_bytes = pending.len(),
            ready = self.read_index.entry_count(),
            "merged write journal into read journal"
        );
        true
    }

    fn rebuild_read_index(&mut self) {
        if let Some(journals) = self.journals.as_mut() {
            match read_from(&mut journals.read, 0) {
                Ok(bytes) => {
                    let scan = LineIndex::scan(&bytes);
                    if scan.valid_len < bytes.len() as u64 {
                        tracing::warn!(
                            discarded = bytes.len() as u64 - scan.valid_len,
                            "dropping incomplete entry at end of read journal"
                        );
                        if let Err(e) = journals.read.set_len(scan.valid_len) {
                            tracing::error!(error = %e, "failed to truncate read journal");
                        }
                    }
                    self.read_index = scan.index;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to rescan read journal");
                    self.read_index = LineIndex::default();
                }
            }
        }
        self.refresh_size();
    }

    fn refresh_size(&mut self) {
        self.current_size = journal_len(&self.read_path) + journal_len(&self.write_path);
    }
}

impl CacheBackend for JournaledStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Journal
    }

    fn has_content(&mut self) -> bool {
        JournaledStore::has_content(self)
    }

    fn ready_count(&self) -> usize {
        self.number_of_batches()
    }

    fn write(&mut self, destination: &str, body: &str) -> bool {
        JournaledStore::write(self, destination, body)
    }

    fn peek(&mut self) -> Option<RawEntry> {
        JournaledStore::peek(self)
    }

    fn pop(&mut self) -> bool {
        JournaledStore::pop(self)
    }

    fn clear(&mut self) {
        JournaledStore::clear(self)
    }

    fn fill_ratio(&self) -> f64 {
        JournaledStore::fill_ratio(self)
    }

    fn close(&mut self) {
        JournaledStore::close(self)
    }
}

fn open_journal(path: &Path) -> Result<File, StoreError> {
    if !path.exists() {
        File::create(path).map_err(|source| StoreError::FileCreationFailed {
            path: path.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .read(true)
        .append(true)
        .open(path)
        .map_err(|source| StoreError::FileHandleCreationFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Scan a journal on open and cut off anything after its last complete entry.
fn recover_journal(file: &mut File, path: &Path) -> Result<LineIndex, StoreError> {
    let recovery_err = |source| StoreError::RecoveryFailed {
        path: path.to_path_buf(),
        source,
    };

    let bytes = read_from(file, 0).map_err(recovery_err)?;
    let scan = LineIndex::scan(&bytes);

    if scan.valid_len < bytes.len() as u64 {
        tracing::warn!(
            path = %path.display(),
            discarded = bytes.len() as u64 - scan.valid_len,
            "truncating torn journal tail"
        );
        file.set_len(scan.valid_len)
            .and_then(|_| file.sync_all())
            .map_err(recovery_err)?;
    }

    Ok(scan.index)
}

fn read_from(file: &mut File, offset: u64) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

fn journal_len(path: &Path) -> u64 {
    fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Destination + body that occupy exactly 100 bytes on disk.
    fn hundred_byte_entry(tag: usize) -> (String, String) {
        let destination = format!("https://x.io/e{:02}", tag % 100);
        let body = "a".repeat(98 - destination.len());
        (destination, body)
    }

    fn open(dir: &TempDir) -> JournaledStore {
        JournaledStore::open(dir.path(), 100 * 1024 * 1024).unwrap()
    }

    fn peek_body(store: &mut JournaledStore) -> String {
        let raw = store.peek().expect("entry should be available");
        String::from_utf8(raw.body).unwrap()
    }

    #[test]
    fn open_creates_both_journals() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("nested").join("cache");

        let store = JournaledStore::open(&cache_dir, 1024).unwrap();

        assert!(cache_dir.join("data_write").exists());
        assert!(cache_dir.join("data_read").exists());
        assert_eq!(store.number_of_batches(), 0);
        assert_eq!(store.current_size(), 0);
    }

    #[test]
    fn open_fails_when_directory_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = JournaledStore::open(&blocker.join("cache"), 1024)
            .err()
            .expect("open should fail");
        assert!(
            matches!(err, StoreError::DirectoryCreationFailed { .. }),
            "expected DirectoryCreationFailed, got: {}",
            err
        );
    }

    #[test]
    fn write_uses_two_line_framing() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        assert!(store.write("https://a.io/events", "{\"k\":1}"));

        let on_disk = fs::read(dir.path().join("data_write")).unwrap();
        assert_eq!(on_disk, b"https://a.io/events\n{\"k\":1}\n");
        assert_eq!(store.buffered_entries(), 1);
        assert_eq!(store.current_size(), on_disk.len() as u64);
    }

    #[test]
    fn three_writes_then_pop_leaves_two_batches() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        for i in 0..3 {
            assert!(store.write("https://a.io", &format!("body {}", i)));
        }
        assert!(store.has_content());
        assert_eq!(store.number_of_batches(), 3);
        assert_eq!(store.buffered_entries(), 0);

        assert!(store.pop());
        assert_eq!(store.number_of_batches(), 2);
    }

    #[test]
    fn peek_returns_newest_entry_first() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        store.write("https://a.io", "first");
        store.write("https://a.io", "second");
        store.write("https://a.io", "third");

        assert_eq!(peek_body(&mut store), "third");
        assert!(store.pop());
        assert_eq!(peek_body(&mut store), "second");
        assert!(store.pop());
        assert_eq!(peek_body(&mut store), "first");
        assert!(store.pop());
        assert!(store.peek().is_none());
        assert!(!store.has_content());
    }

    #[test]
    fn peek_is_idempotent_until_pop() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.write("https://a.io", "only");

        assert_eq!(peek_body(&mut store), "only");
        assert_eq!(peek_body(&mut store), "only");
        assert_eq!(store.number_of_batches(), 1);
    }

    #[test]
    fn writes_during_drain_wait_for_next_merge() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        store.write("https://a.io", "old");
        assert!(store.has_content());
        store.write("https://a.io", "new");

        // Read journal is non-empty, so no merge happens yet.
        assert_eq!(peek_body(&mut store), "old");
        assert_eq!(store.buffered_entries(), 1);
        assert!(store.pop());

        assert_eq!(peek_body(&mut store), "new");
        assert_eq!(store.buffered_entries(), 0);
    }

    #[test]
    fn pop_on_empty_store_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        assert!(!store.pop());
        assert_eq!(store.current_size(), 0);
    }

    #[test]
    fn pop_truncates_read_journal_exactly() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.write("https://a.io", "one");
        store.write("https://b.io", "two");
        store.has_content();

        assert!(store.pop());

        let on_disk = fs::read(dir.path().join("data_read")).unwrap();
        assert_eq!(on_disk, b"https://a.io\none\n");
        assert_eq!(store.current_size(), on_disk.len() as u64);
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(&dir);
            assert!(store.write("https://a.io", "durable"));
            // dropped without close, as if the process died
        }

        let mut store = open(&dir);
        assert_eq!(store.buffered_entries(), 1);
        assert!(store.has_content());
        assert_eq!(peek_body(&mut store), "durable");
    }

    #[test]
    fn reopen_keeps_read_and_write_journals_apart() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(&dir);
            store.write("https://a.io", "merged");
            store.has_content();
            store.write("https://a.io", "buffered");
            store.close();
        }

        let mut store = open(&dir);
        assert_eq!(store.number_of_batches(), 1);
        assert_eq!(store.buffered_entries(), 1);
        assert_eq!(peek_body(&mut store), "merged");
    }

    #[test]
    fn reopen_repairs_torn_read_journal() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(&dir);
            store.write("https://a.io", "one");
            store.write("https://a.io", "two");
            store.has_content();
            store.close();
        }

        let read_path = dir.path().join("data_read");
        let clean_len = fs::metadata(&read_path).unwrap().len();
        let mut file = OpenOptions::new().append(true).open(&read_path).unwrap();
        write!(file, "https://a.io\npartial bo").unwrap();
        drop(file);

        let mut store = open(&dir);
        assert_eq!(store.number_of_batches(), 2);
        assert_eq!(fs::metadata(&read_path).unwrap().len(), clean_len);
        assert_eq!(peek_body(&mut store), "two");
    }

    #[test]
    fn reopen_repairs_torn_write_journal() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(&dir);
            store.write("https://a.io", "complete");
        }

        let write_path = dir.path().join("data_write");
        let mut file = OpenOptions::new().append(true).open(&write_path).unwrap();
        write!(file, "https://a.io\n").unwrap();
        drop(file);

        let mut store = open(&dir);
        assert_eq!(store.buffered_entries(), 1);
        assert_eq!(peek_body(&mut store), "complete");
        assert!(store.pop());
        assert!(!store.has_content());
    }

    #[test]
    fn size_cap_rejects_newest_and_warns_once() {
        let dir = TempDir::new().unwrap();
        let mut store = JournaledStore::open(dir.path(), 1000).unwrap();

        for i in 0..10 {
            let (dest, body) = hundred_byte_entry(i);
            assert!(store.write(&dest, &body), "write {} should fit", i);
        }
        assert_eq!(store.current_size(), 1000);

        let (dest, body) = hundred_byte_entry(10);
        assert!(!store.write(&dest, &body), "11th write should be rejected");
        assert!(!store.write(&dest, &body));
        assert!(!store.can_write(&dest, &body));
        assert_eq!(store.size_warnings(), 1);
        assert_eq!(store.current_size(), 1000);

        assert!(store.peek().is_some());
        assert!(store.pop());
        assert!(store.write(&dest, &body), "write after pop should fit");
        assert_eq!(store.size_warnings(), 1);
        assert!(store.current_size() <= store.max_size());
    }

    #[test]
    fn size_warning_rearms_after_dropping_below_cap() {
        let dir = TempDir::new().unwrap();
        let mut store = JournaledStore::open(dir.path(), 200).unwrap();

        let (dest, body) = hundred_byte_entry(0);
        store.write(&dest, &body);
        store.write(&dest, &body);
        assert!(!store.write(&dest, &body));

        store.has_content();
        store.pop();
        assert!(store.write(&dest, &body));
        assert!(!store.write(&dest, &body));

        assert_eq!(store.size_warnings(), 2);
    }

    #[test]
    fn can_write_raw_counts_bytes() {
        let dir = TempDir::new().unwrap();
        let mut store = JournaledStore::open(dir.path(), 10).unwrap();
        assert!(store.can_write_raw("0123456789"));
        assert!(!store.can_write_raw("0123456789a"));
    }

    #[test]
    fn sizes_are_utf8_bytes() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.write("https://a.io", "é");
        assert_eq!(store.current_size(), (12 + 2 + 2) as u64);
    }

    #[test]
    fn fill_ratio_reflects_files() {
        let dir = TempDir::new().unwrap();
        let mut store = JournaledStore::open(dir.path(), 1000).unwrap();
        assert_eq!(store.fill_ratio(), 0.0);

        let (dest, body) = hundred_byte_entry(0);
        store.write(&dest, &body);
        assert!((store.fill_ratio() - 0.1).abs() < f64::EPSILON);

        let zero_cap = JournaledStore::open(&dir.path().join("other"), 0).unwrap();
        assert_eq!(zero_cap.fill_ratio(), 1.0);
    }

    #[test]
    fn peek_rebuilds_index_when_read_journal_changed_underneath() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.write("https://a.io", "first");
        store.write("https://a.io", "second");
        assert!(store.has_content());

        let mut file = OpenOptions::new()
            .append(true)
            .open(store.read_path())
            .unwrap();
        file.write_all(b"partial line").unwrap();
        drop(file);

        assert_eq!(peek_body(&mut store), "second");
        assert_eq!(store.number_of_batches(), 2);
        assert_eq!(
            fs::read(store.read_path()).unwrap(),
            b"https://a.io\nfirst\nhttps://a.io\nsecond\n"
        );
    }

    #[test]
    fn write_rejects_unescaped_newline() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        assert!(!store.write("https://a.io", "line\nbreak"));
        assert_eq!(store.buffered_entries(), 0);
        assert_eq!(store.current_size(), 0);
    }

    #[test]
    fn closed_store_fails_safely() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.write("https://a.io", "kept");
        store.close();

        assert!(store.is_closed());
        assert!(!store.write("https://a.io", "late"));
        assert!(!store.has_content());
        assert!(store.peek().is_none());
        assert!(!store.pop());
        store.close();

        let mut reopened = open(&dir);
        assert_eq!(peek_body(&mut reopened), "kept");
    }

    #[test]
    fn clear_empties_both_journals() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.write("https://a.io", "one");
        store.has_content();
        store.write("https://a.io", "two");

        store.clear();

        assert!(!store.has_content());
        assert_eq!(store.current_size(), 0);
        assert_eq!(fs::metadata(dir.path().join("data_read")).unwrap().len(), 0);
        assert_eq!(fs::metadata(dir.path().join("data_write")).unwrap().len(), 0);
    }
}
