//! Append-only, file-backed document store.
//!
//! Each mutation appends one record to the collection log:
//!
//! ```text
//! | len: u32 LE | CBOR(LogEntry) |
//! ```
//!
//! On open the log is replayed into memory. A torn final record (crash in
//! the middle of an append) is truncated away; an undecodable record that
//! is followed by more data is reported as corruption.

use crate::dir::sync_directory;
use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::query::{Query, UpdateOptions};
use crate::store::{check_update_target, DocumentStore};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const LEN_PREFIX: usize = 4;

#[derive(Debug, Serialize, Deserialize)]
enum LogEntry {
    Put(Document),
    Delete(String),
}

/// Log statistics, as reported by [`FileStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStats {
    /// Records in the log, superseded ones included.
    pub records: usize,
    /// Live documents.
    pub live: usize,
    /// Log size in bytes.
    pub bytes: u64,
}

#[derive(Debug)]
struct Inner {
    file: File,
    docs: BTreeMap<String, Document>,
    records: usize,
    size: u64,
}

/// A document store persisted as an append-only log.
///
/// Reads are served from memory; every write is appended to the log before
/// it becomes visible.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    sync_on_write: bool,
    inner: RwLock<Inner>,
}

impl FileStore {
    /// Opens or creates the log at `path` and replays it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or a record in the
    /// middle of the log cannot be decoded.
    pub fn open(path: &Path, sync_on_write: bool) -> StoreResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let (docs, records, valid_len) = replay(&data)?;
        if valid_len < data.len() {
            tracing::warn!(
                path = %path.display(),
                discarded = data.len() - valid_len,
                "truncating torn record at end of document log"
            );
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            sync_on_write,
            inner: RwLock::new(Inner {
                file,
                docs,
                records,
                size: valid_len as u64,
            }),
        })
    }

    /// Returns the log path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns record and size counters.
    pub fn stats(&self) -> LogStats {
        let inner = self.inner.read();
        LogStats {
            records: inner.records,
            live: inner.docs.len(),
            bytes: inner.size,
        }
    }

    /// Rewrites the log so it holds exactly one record per live document.
    ///
    /// Uses write-then-rename, so a crash leaves either the old or the new
    /// log in place.
    pub fn compact(&self) -> StoreResult<LogStats> {
        let mut inner = self.inner.write();

        let mut buf = Vec::new();
        for doc in inner.docs.values() {
            encode_entry(&LogEntry::Put(doc.clone()), &mut buf)?;
        }

        let mut temp_path = self.path.as_os_str().to_owned();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        let mut temp = File::create(&temp_path)?;
        temp.write_all(&buf)?;
        temp.sync_all()?;
        drop(temp);

        fs::rename(&temp_path, &self.path)?;
        if let Some(parent) = self.path.parent() {
            sync_directory(parent)?;
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.seek(SeekFrom::End(0))?;
        inner.file = file;
        inner.records = inner.docs.len();
        inner.size = buf.len() as u64;

        Ok(LogStats {
            records: inner.records,
            live: inner.docs.len(),
            bytes: inner.size,
        })
    }

    fn append(&self, inner: &mut Inner, entries: &[LogEntry]) -> StoreResult<()> {
        let mut buf = Vec::new();
        for entry in entries {
            encode_entry(entry, &mut buf)?;
        }

        if let Err(e) = self.write_out(inner, &buf) {
            if let Err(rollback) = inner.rollback() {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %rollback,
                    "cannot discard partial record after failed append"
                );
            }
            return Err(e);
        }

        inner.records += entries.len();
        inner.size += buf.len() as u64;
        Ok(())
    }

    fn write_out(&self, inner: &mut Inner, buf: &[u8]) -> StoreResult<()> {
        inner.file.write_all(buf)?;
        if self.sync_on_write {
            inner.file.sync_data()?;
        } else {
            inner.file.flush()?;
        }
        Ok(())
    }
}

impl Inner {
    /// Cuts the log back to the last complete record.
    fn rollback(&mut self) -> StoreResult<()> {
        self.file.set_len(self.size)?;
        self.file.seek(SeekFrom::Start(self.size))?;
        Ok(())
    }
}

impl DocumentStore for FileStore {
    fn find(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let inner = self.inner.read();
        let found = match query {
            Query::Id(id) => inner.docs.get(id).cloned().into_iter().collect(),
            _ => inner
                .docs
                .values()
                .filter(|d| query.matches(&d.id))
                .cloned()
                .collect(),
        };
        Ok(found)
    }

    fn update(&self, query: &Query, doc: Document, options: UpdateOptions) -> StoreResult<usize> {
        check_update_target(query, &doc)?;

        let mut inner = self.inner.write();
        if !inner.docs.contains_key(&doc.id) && !options.upsert {
            return Ok(0);
        }

        let entry = LogEntry::Put(doc);
        self.append(&mut inner, std::slice::from_ref(&entry))?;
        if let LogEntry::Put(doc) = entry {
            inner.docs.insert(doc.id.clone(), doc);
        }
        Ok(1)
    }

    fn remove(&self, query: &Query) -> StoreResult<usize> {
        let mut inner = self.inner.write();
        let ids: Vec<String> = inner
            .docs
            .keys()
            .filter(|id| query.matches(id))
            .cloned()
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let entries: Vec<LogEntry> = ids.iter().cloned().map(LogEntry::Delete).collect();
        self.append(&mut inner, &entries)?;
        for id in &ids {
            inner.docs.remove(id);
        }
        Ok(ids.len())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.inner.read().docs.len())
    }
}

fn encode_entry(entry: &LogEntry, buf: &mut Vec<u8>) -> StoreResult<()> {
    let mut payload = Vec::new();
    ciborium::ser::into_writer(entry, &mut payload).map_err(StoreError::codec)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::codec("log record exceeds 4 GiB"))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(())
}

/// Replays a log image, returning the live documents, the record count and
/// the length of the valid prefix.
fn replay(data: &[u8]) -> StoreResult<(BTreeMap<String, Document>, usize, usize)> {
    let mut docs = BTreeMap::new();
    let mut records = 0;
    let mut offset = 0;

    while offset + LEN_PREFIX <= data.len() {
        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(&data[offset..offset + LEN_PREFIX]);
        let start = offset + LEN_PREFIX;
        let end = start + u32::from_le_bytes(len_bytes) as usize;
        if end > data.len() {
            break;
        }

        match ciborium::de::from_reader::<LogEntry, _>(&data[start..end]) {
            Ok(LogEntry::Put(doc)) => {
                docs.insert(doc.id.clone(), doc);
            }
            Ok(LogEntry::Delete(id)) => {
                docs.remove(&id);
            }
            Err(e) if end < data.len() => {
                return Err(StoreError::corrupted(format!(
                    "undecodable record at offset {offset}: {e}"
                )));
            }
            Err(_) => break,
        }

        records += 1;
        offset = end;
    }

    Ok((docs, records, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn doc(id: &str, mtime: i64) -> Document {
        Document::new(id, json!({"n": mtime, "tag": "x"}).as_object().cloned().unwrap())
            .with_times(1, mtime)
    }

    #[test]
    fn persists_across_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notes");

        {
            let store = FileStore::open(&path, true).unwrap();
            store
                .update(&Query::id("a"), doc("a", 10), UpdateOptions::upsert())
                .unwrap();
            store
                .update(&Query::id("b"), doc("b", 20), UpdateOptions::upsert())
                .unwrap();
            store
                .update(&Query::id("a"), doc("a", 30), UpdateOptions::upsert())
                .unwrap();
            store.remove(&Query::id("b")).unwrap();
        }

        let store = FileStore::open(&path, true).unwrap();
        let all = store.find(&Query::All).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], doc("a", 30));
        assert_eq!(store.stats().records, 4);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notes");

        {
            let store = FileStore::open(&path, false).unwrap();
            store
                .update(&Query::id("a"), doc("a", 1), UpdateOptions::upsert())
                .unwrap();
        }
        let good_len = fs::metadata(&path).unwrap().len();

        // Half-written record: a length prefix promising more than exists.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&100u32.to_le_bytes()).unwrap();
        file.write_all(&[0xA1, 0x63]).unwrap();
        drop(file);

        let store = FileStore::open(&path, false).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);

        // Appends after recovery land on a clean boundary.
        store
            .update(&Query::id("b"), doc("b", 2), UpdateOptions::upsert())
            .unwrap();
        drop(store);
        assert_eq!(FileStore::open(&path, false).unwrap().len().unwrap(), 2);
    }

    #[test]
    fn failed_append_leaves_log_readable() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notes");
        let store = FileStore::open(&path, false).unwrap();
        store
            .update(&Query::id("a"), doc("a", 1), UpdateOptions::upsert())
            .unwrap();

        // A write_all that gave up halfway through a record.
        {
            let mut inner = store.inner.write();
            inner.file.write_all(&64u32.to_le_bytes()).unwrap();
            inner.file.write_all(&[0xA2, 0x61]).unwrap();
            inner.rollback().unwrap();
        }

        store
            .update(&Query::id("b"), doc("b", 2), UpdateOptions::upsert())
            .unwrap();
        drop(store);

        let reopened = FileStore::open(&path, false).unwrap();
        assert_eq!(reopened.get("a").unwrap(), Some(doc("a", 1)));
        assert_eq!(reopened.get("b").unwrap(), Some(doc("b", 2)));
        assert_eq!(reopened.stats().records, 2);
    }

    #[test]
    fn corrupt_middle_record_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notes");

        let mut data = Vec::new();
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
        encode_entry(&LogEntry::Put(doc("a", 1)), &mut data).unwrap();
        fs::write(&path, &data).unwrap();

        let result = FileStore::open(&path, false);
        assert!(matches!(result, Err(StoreError::Corrupted(_))));
    }

    #[test]
    fn compaction_drops_superseded_records() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notes");
        let store = FileStore::open(&path, false).unwrap();

        for mtime in 1..=5 {
            store
                .update(&Query::id("a"), doc("a", mtime), UpdateOptions::upsert())
                .unwrap();
        }
        store
            .update(&Query::id("b"), doc("b", 1), UpdateOptions::upsert())
            .unwrap();
        store.remove(&Query::id("b")).unwrap();
        assert_eq!(store.stats().records, 7);

        let stats = store.compact().unwrap();
        assert_eq!(stats.records, 1);
        assert_eq!(stats.live, 1);

        store
            .update(&Query::id("c"), doc("c", 9), UpdateOptions::upsert())
            .unwrap();
        drop(store);

        let reopened = FileStore::open(&path, false).unwrap();
        assert_eq!(reopened.get("a").unwrap(), Some(doc("a", 5)));
        assert_eq!(reopened.get("c").unwrap(), Some(doc("c", 9)));
        assert_eq!(reopened.stats().records, 2);
    }
}
