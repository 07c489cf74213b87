//! Whole-document cache for the answering layer.
//!
//! Unlike the chunk index, this cache holds complete documents (content
//! plus an optional pre-written summary) keyed by document id. Entries
//! refresh lazily: a load compares the backing file's modification time
//! against the cached value and reloads only when the file advanced.
//!
//! Locking is per entry, so unrelated documents load concurrently. An
//! `updating` flag under each entry's lock guarantees at most one
//! in-flight reload per document; concurrent callers wait on the entry's
//! condition variable until the reload completes instead of duplicating
//! the read.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use parking_lot::{Condvar, Mutex};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Extensions tried, in order, when resolving a document id to a file.
const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

/// Approximate characters per token for sizing documents.
const CHARS_PER_TOKEN: usize = 4;

/// A cached document with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub content: String,
    /// Pre-written summary from the sidecar file, if one exists.
    pub summary: Option<String>,
    /// Modification time of the backing file, seconds since the epoch.
    pub last_modified: u64,
    pub token_count: usize,
    pub content_hash: String,
}

#[derive(Default)]
struct EntryState {
    document: Option<CachedDocument>,
    updating: bool,
}

struct CacheEntry {
    state: Mutex<EntryState>,
    updated: Condvar,
}

impl CacheEntry {
    fn new() -> Self {
        Self {
            state: Mutex::new(EntryState::default()),
            updated: Condvar::new(),
        }
    }
}

/// Counters for observing cache behavior.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub entries: usize,
    pub reloads: u64,
}

pub struct DocumentCache {
    source_dir: PathBuf,
    summary_dir: PathBuf,
    entries: Mutex<HashMap<String, Arc<CacheEntry>>>,
    reloads: AtomicU64,
}

impl DocumentCache {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        summary_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            summary_dir: summary_dir.into(),
            entries: Mutex::new(HashMap::new()),
            reloads: AtomicU64::new(0),
        }
    }

    /// Load a document, reading from disk only when the cached copy is
    /// missing or older than the backing file. Returns `None` when no
    /// backing file exists for the id.
    pub fn load(&self, document_id: &str) -> Result<Option<CachedDocument>> {
        let Some((path, last_modified)) = self.resolve(document_id) else {
            debug!(document = document_id, "no backing file");
            return Ok(None);
        };

        let entry = {
            let mut entries = self.entries.lock();
            entries
                .entry(document_id.to_string())
                .or_insert_with(|| Arc::new(CacheEntry::new()))
                .clone()
        };

        let mut state = entry.state.lock();
        loop {
            if let Some(doc) = &state.document
                && doc.last_modified >= last_modified
            {
                return Ok(Some(doc.clone()));
            }
            if state.updating {
                // Another caller is already reloading this entry; wait
                // for it to finish rather than reading the file twice.
                entry.updated.wait(&mut state);
                continue;
            }
            break;
        }

        state.updating = true;
        drop(state);

        let loaded = self.read_document(document_id, &path, last_modified);

        let mut state = entry.state.lock();
        state.updating = false;
        let result = match loaded {
            Ok(Some(doc)) => {
                self.reloads.fetch_add(1, Ordering::Relaxed);
                state.document = Some(doc.clone());
                Ok(Some(doc))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        entry.updated.notify_all();
        result
    }

    /// Remove entries whose cached modification time is older than the
    /// TTL. The sweep is unconditional: the backing file is not
    /// re-checked before eviction.
    pub fn cleanup_expired(&self, ttl: Duration) {
        let now = unix_now();
        let mut entries = self.entries.lock();
        let before = entries.len();

        entries.retain(|_, entry| {
            let state = entry.state.lock();
            match &state.document {
                Some(doc) => {
                    now.saturating_sub(doc.last_modified) <= ttl.as_secs()
                }
                None => true,
            }
        });

        let evicted = before - entries.len();
        if evicted > 0 {
            info!(evicted, "evicted expired cached documents");
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.lock().len(),
            reloads: self.reloads.load(Ordering::Relaxed),
        }
    }

    /// Resolve a document id to its backing file and mtime.
    fn resolve(&self, document_id: &str) -> Option<(PathBuf, u64)> {
        for ext in DOCUMENT_EXTENSIONS {
            let path = self.source_dir.join(format!("{document_id}.{ext}"));
            if let Ok(meta) = std::fs::metadata(&path) {
                let mtime = meta
                    .modified()
                    .unwrap_or(UNIX_EPOCH)
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                return Some((path, mtime));
            }
        }
        None
    }

    fn read_document(
        &self,
        document_id: &str,
        path: &Path,
        last_modified: u64,
    ) -> Result<Option<CachedDocument>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between stat and read.
                warn!(document = document_id, "backing file vanished");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let summary = self.load_summary(document_id);
        let content_hash = {
            let digest = Sha256::digest(content.as_bytes());
            digest.iter().map(|b| format!("{b:02x}")).collect()
        };

        debug!(
            document = document_id,
            bytes = content.len(),
            "loaded document into cache"
        );

        Ok(Some(CachedDocument {
            token_count: content.chars().count() / CHARS_PER_TOKEN,
            content,
            summary,
            last_modified,
            content_hash,
        }))
    }

    fn load_summary(&self, document_id: &str) -> Option<String> {
        let path = self
            .summary_dir
            .join(format!("{document_id}_summary.txt"));
        std::fs::read_to_string(path).ok()
    }
}

impl std::fmt::Debug for DocumentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCache")
            .field("source_dir", &self.source_dir)
            .finish_non_exhaustive()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, tempfile::TempDir, DocumentCache) {
        let source = tempfile::tempdir().unwrap();
        let summary = tempfile::tempdir().unwrap();
        let cache = DocumentCache::new(source.path(), summary.path());
        (source, summary, cache)
    }

    fn bump_mtime(path: &Path, forward: Duration) {
        let file = std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap();
        file.set_modified(SystemTime::now() + forward).unwrap();
    }

    #[test]
    fn missing_document_is_none() {
        let (_s, _m, cache) = setup();
        assert!(cache.load("ghost").unwrap().is_none());
    }

    #[test]
    fn first_load_reads_file() {
        let (source, _m, cache) = setup();
        std::fs::write(source.path().join("guide.txt"), "hello world")
            .unwrap();

        let doc = cache.load("guide").unwrap().unwrap();
        assert_eq!(doc.content, "hello world");
        assert!(doc.summary.is_none());
        assert_eq!(doc.token_count, "hello world".len() / CHARS_PER_TOKEN);
        assert!(!doc.content_hash.is_empty());
        assert_eq!(cache.stats().reloads, 1);
    }

    #[test]
    fn unchanged_file_serves_from_cache() {
        let (source, _m, cache) = setup();
        std::fs::write(source.path().join("guide.txt"), "stable").unwrap();

        let first = cache.load("guide").unwrap().unwrap();
        let second = cache.load("guide").unwrap().unwrap();

        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(cache.stats().reloads, 1);
    }

    #[test]
    fn modified_file_is_reloaded() {
        let (source, _m, cache) = setup();
        let path = source.path().join("guide.txt");
        std::fs::write(&path, "version one").unwrap();
        assert_eq!(cache.load("guide").unwrap().unwrap().content, "version one");

        std::fs::write(&path, "version two").unwrap();
        bump_mtime(&path, Duration::from_secs(5));

        let doc = cache.load("guide").unwrap().unwrap();
        assert_eq!(doc.content, "version two");
        assert_eq!(cache.stats().reloads, 2);
    }

    #[test]
    fn resolves_markdown_extensions() {
        let (source, _m, cache) = setup();
        std::fs::write(source.path().join("notes.md"), "# markdown").unwrap();

        let doc = cache.load("notes").unwrap().unwrap();
        assert_eq!(doc.content, "# markdown");
    }

    #[test]
    fn summary_sidecar_is_loaded() {
        let (source, summary, cache) = setup();
        std::fs::write(source.path().join("guide.txt"), "long body").unwrap();
        std::fs::write(
            summary.path().join("guide_summary.txt"),
            "short summary",
        )
        .unwrap();

        let doc = cache.load("guide").unwrap().unwrap();
        assert_eq!(doc.summary.as_deref(), Some("short summary"));
    }

    #[test]
    fn concurrent_loads_read_once() {
        let (source, _m, cache) = setup();
        std::fs::write(source.path().join("guide.txt"), "shared content")
            .unwrap();

        let cache = Arc::new(cache);
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.load("guide").unwrap().unwrap()
                })
            })
            .collect();

        for handle in handles {
            let doc = handle.join().unwrap();
            assert_eq!(doc.content, "shared content");
        }
        assert_eq!(cache.stats().reloads, 1);
    }

    #[test]
    fn cleanup_evicts_old_entries_only() {
        let (source, _m, cache) = setup();
        let old = source.path().join("old.txt");
        let fresh = source.path().join("fresh.txt");
        std::fs::write(&old, "old content").unwrap();
        std::fs::write(&fresh, "fresh content").unwrap();

        // Age the old document's mtime well past the TTL.
        let file = std::fs::File::options().write(true).open(&old).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(600))
            .unwrap();

        cache.load("old").unwrap().unwrap();
        cache.load("fresh").unwrap().unwrap();
        assert_eq!(cache.stats().entries, 2);

        cache.cleanup_expired(Duration::from_secs(300));
        assert_eq!(cache.stats().entries, 1);
    }
}
