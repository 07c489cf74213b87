//! Orchestration of full and incremental index builds, plus the
//! in-memory index cache that searches read from.
//!
//! Mutation is guarded per collection: a lazily populated registry hands
//! out one lock per collection key, so rebuilds of the same collection
//! serialize while unrelated collections index concurrently. Searches
//! never take a build lock; they read the currently published
//! `Arc<CollectionIndex>` snapshot, and a rebuild publishes its
//! replacement only after the new state is fully built and persisted.
//! Readers therefore always observe a complete index, old or new.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::{
    chunking::{self, ChunkRecord},
    collection_id::CollectionId,
    error::Result,
    matrix,
    ranker::{self, SearchHit},
    store::{self, CollectionIndex, FileEntry, INDEX_TYPE, IndexMetadata},
    tokenizer::Tokenizer,
    vocabulary::Vocabulary,
    walker,
};

/// Chunk geometry for index builds.
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    pub chunk_size: usize,
    pub overlap_size: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            chunk_size: chunking::DEFAULT_CHUNK_SIZE,
            overlap_size: chunking::DEFAULT_OVERLAP_SIZE,
        }
    }
}

/// Result of an index operation, reported to the caller instead of
/// raised: indexing failures degrade to `success = false` plus a
/// human-readable message.
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub success: bool,
    pub message: String,
}

/// Summary of a collection's persisted index, read from metadata alone.
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub files_count: usize,
    pub total_chunks: usize,
    pub total_unique_words: usize,
    pub last_updated: String,
    pub files: Vec<String>,
    pub index_type: String,
    pub matrix_shape: [usize; 2],
    pub chunk_size: usize,
    pub overlap_size: usize,
    pub supported_formats: Vec<String>,
}

/// A source file read and hashed during change detection.
struct SourceFile {
    filename: String,
    content: String,
    content_hash: String,
}

pub struct IndexManager {
    index_dir: PathBuf,
    options: IndexOptions,
    tokenizer: Tokenizer,
    /// Published index snapshots, keyed by collection key. Entries are
    /// replaced wholesale; concurrent readers keep their own `Arc`.
    cache: RwLock<HashMap<String, Arc<CollectionIndex>>>,
    /// One build lock per collection key, created on first use.
    build_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IndexManager {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self::with_options(index_dir, IndexOptions::default())
    }

    pub fn with_options(
        index_dir: impl Into<PathBuf>,
        options: IndexOptions,
    ) -> Self {
        Self {
            index_dir: index_dir.into(),
            options,
            tokenizer: Tokenizer::default(),
            cache: RwLock::new(HashMap::new()),
            build_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Index a collection's source directory, incrementally unless
    /// `force` is set.
    ///
    /// Change detection is hash-based: new and changed files are
    /// re-chunked and re-tokenized, deleted files' chunks are dropped,
    /// and unchanged files' chunk records are retained verbatim. The
    /// vocabulary and matrix are always rebuilt over the union so term
    /// ids stay consistent. When nothing changed, the call is a no-op
    /// that touches no persisted state.
    pub fn index(
        &self,
        id: &CollectionId,
        files_dir: &Path,
        force: bool,
    ) -> IndexOutcome {
        let lock = self.build_lock(id);
        let _guard = lock.lock();

        match self.rebuild(id, files_dir, force) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(collection = %id, error = %e, "indexing failed");
                IndexOutcome {
                    success: false,
                    message: format!("indexing failed: {e}"),
                }
            }
        }
    }

    /// Rank a collection's chunks against a query.
    ///
    /// Loads the persisted index into the cache on first access. A
    /// missing or corrupt index degrades to an empty result with a
    /// warning; search never surfaces an error to the caller.
    pub fn search(
        &self,
        id: &CollectionId,
        query: &str,
        top_k: usize,
    ) -> Vec<SearchHit> {
        let Some(index) = self.cached_or_load(id) else {
            return Vec::new();
        };
        ranker::search(&index, &self.tokenizer, query, top_k)
    }

    /// Summarize a collection's index from metadata, without loading the
    /// matrix. Returns `None` when the collection has never been indexed
    /// or its metadata is unreadable.
    pub fn get_index_info(&self, id: &CollectionId) -> Option<IndexInfo> {
        let dir = self.collection_dir(id);
        match store::load_metadata(&dir) {
            Ok(Some(meta)) => Some(IndexInfo {
                files_count: meta.files.len(),
                files: meta.files.keys().cloned().collect(),
                total_chunks: meta.total_chunks,
                total_unique_words: meta.total_unique_words,
                last_updated: meta.last_updated,
                index_type: meta.index_type,
                matrix_shape: meta.matrix_shape,
                chunk_size: meta.chunk_size,
                overlap_size: meta.overlap_size,
                supported_formats: meta.supported_formats,
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(collection = %id, error = %e, "unreadable index metadata");
                None
            }
        }
    }

    /// Evict one collection's cached index, or every cached index.
    /// The next search or index call reloads from disk.
    pub fn clear_cache(&self, id: Option<&CollectionId>) {
        let mut cache = self.cache.write();
        match id {
            Some(id) => {
                cache.remove(&id.key());
                info!(collection = %id, "cleared cached index");
            }
            None => {
                cache.clear();
                info!("cleared all cached indexes");
            }
        }
    }

    fn collection_dir(&self, id: &CollectionId) -> PathBuf {
        self.index_dir.join(id.key())
    }

    fn build_lock(&self, id: &CollectionId) -> Arc<Mutex<()>> {
        let mut locks = self.build_locks.lock();
        locks.entry(id.key()).or_default().clone()
    }

    fn cached_or_load(&self, id: &CollectionId) -> Option<Arc<CollectionIndex>> {
        let key = id.key();
        if let Some(index) = self.cache.read().get(&key) {
            return Some(index.clone());
        }

        match store::load(&self.collection_dir(id)) {
            Ok(index) => {
                let index = Arc::new(index);
                let mut cache = self.cache.write();
                // Another thread may have loaded concurrently; keep the
                // first published snapshot.
                Some(
                    cache
                        .entry(key)
                        .or_insert_with(|| index.clone())
                        .clone(),
                )
            }
            Err(e) if e.is_absent_index() => {
                warn!(collection = %id, error = %e, "no usable index on disk");
                None
            }
            Err(e) => {
                warn!(collection = %id, error = %e, "failed to load index");
                None
            }
        }
    }

    fn rebuild(
        &self,
        id: &CollectionId,
        files_dir: &Path,
        force: bool,
    ) -> Result<IndexOutcome> {
        let dir = self.collection_dir(id);

        let existing_metadata = if force {
            None
        } else {
            match store::load_metadata(&dir) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(
                        collection = %id,
                        error = %e,
                        "treating unreadable metadata as absent index"
                    );
                    None
                }
            }
        };

        let discovered = walker::discover_files(files_dir)?;

        // Read and hash every eligible file up front. Files that cannot
        // be read are skipped here and keep their previous state: their
        // old chunks and metadata entry survive this rebuild.
        let sources: Vec<SourceFile> = discovered
            .par_iter()
            .filter_map(|file| match std::fs::read(&file.path) {
                Ok(bytes) => Some(SourceFile {
                    filename: file.filename.clone(),
                    content: String::from_utf8_lossy(&bytes).into_owned(),
                    content_hash: hex_digest(&bytes),
                }),
                Err(e) => {
                    warn!(
                        file = %file.filename,
                        error = %e,
                        "skipping unreadable source file"
                    );
                    None
                }
            })
            .collect();

        let present: HashSet<&str> = discovered
            .iter()
            .map(|f| f.filename.as_str())
            .collect();

        let empty = IndexMetadata::default();
        let known = existing_metadata.as_ref().unwrap_or(&empty);

        let to_index: Vec<&SourceFile> = sources
            .iter()
            .filter(|source| {
                force
                    || known
                        .files
                        .get(&source.filename)
                        .is_none_or(|entry| entry.content_hash != source.content_hash)
            })
            .collect();

        let removed: Vec<String> = known
            .files
            .keys()
            .filter(|name| !present.contains(name.as_str()))
            .cloned()
            .collect();

        if to_index.is_empty() && removed.is_empty() && !force {
            debug!(collection = %id, "no changes detected");
            return Ok(IndexOutcome {
                success: true,
                message: "index is up to date".to_string(),
            });
        }

        // Chunks of unchanged files are carried over verbatim; changed
        // and removed files lose their old chunks here.
        let replaced: HashSet<&str> =
            to_index.iter().map(|s| s.filename.as_str()).collect();
        let retained: Vec<ChunkRecord> = if force {
            Vec::new()
        } else {
            match store::load_chunks(&dir) {
                Ok(Some(chunks)) => chunks
                    .into_iter()
                    .filter(|c| {
                        present.contains(c.filename.as_str())
                            && !replaced.contains(c.filename.as_str())
                    })
                    .collect(),
                Ok(None) => Vec::new(),
                Err(e) => {
                    warn!(
                        collection = %id,
                        error = %e,
                        "previous chunk records unreadable, re-indexing all files"
                    );
                    Vec::new()
                }
            }
        };

        info!(
            collection = %id,
            changed = to_index.len(),
            removed = removed.len(),
            retained = retained.len(),
            "rebuilding index"
        );

        let new_chunks: Vec<ChunkRecord> = to_index
            .par_iter()
            .flat_map_iter(|source| {
                let windows = chunking::split_into_chunks(
                    &source.content,
                    self.options.chunk_size,
                    self.options.overlap_size,
                );
                windows
                    .into_iter()
                    .enumerate()
                    .filter_map(|(chunk_index, text)| {
                        let tokens = self.tokenizer.tokenize(&text);
                        (!tokens.is_empty()).then(|| ChunkRecord {
                            filename: source.filename.clone(),
                            chunk_index,
                            text,
                            tokens,
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let new_chunk_count = new_chunks.len();
        let mut all_chunks = retained;
        all_chunks.extend(new_chunks);

        if all_chunks.is_empty() {
            return Ok(IndexOutcome {
                success: false,
                message: "no indexable content found".to_string(),
            });
        }

        // The vocabulary and matrix cover the union of retained and new
        // chunks: term ids must stay globally consistent within the
        // index, so they are always rebuilt from scratch.
        let token_lists: Vec<Vec<String>> =
            all_chunks.iter().map(|c| c.tokens.clone()).collect();
        let vocabulary = Vocabulary::build(&token_lists);
        let tf = matrix::build_tf(&token_lists, &vocabulary);
        let (weighted, idf) = matrix::build_tfidf(&tf);

        let now = Utc::now().to_rfc3339();
        let mut metadata =
            existing_metadata.unwrap_or_default();
        for name in &removed {
            metadata.files.remove(name);
        }
        for source in &to_index {
            let chunk_count = all_chunks
                .iter()
                .filter(|c| c.filename == source.filename)
                .count();
            metadata.files.insert(
                source.filename.clone(),
                FileEntry {
                    content_hash: source.content_hash.clone(),
                    chunk_count,
                    indexed_at: now.clone(),
                },
            );
        }
        metadata.last_updated = now;
        metadata.total_chunks = all_chunks.len();
        metadata.index_type = INDEX_TYPE.to_string();
        metadata.total_unique_words = vocabulary.len();
        metadata.matrix_shape = weighted.shape();
        metadata.chunk_size = self.options.chunk_size;
        metadata.overlap_size = self.options.overlap_size;
        metadata.supported_formats = walker::TEXT_EXTENSIONS
            .iter()
            .map(|s| s.to_string())
            .collect();

        let index = CollectionIndex {
            vocabulary,
            idf,
            matrix: weighted,
            chunks: all_chunks,
            metadata,
        };

        // Persist before publishing: if the write fails, the previous
        // snapshot keeps serving searches.
        store::save(&dir, &index)?;

        let total_chunks = index.chunks.len();
        self.cache.write().insert(id.key(), Arc::new(index));

        let mut message = format!(
            "updated {} file(s), {} new chunk(s), {} chunk(s) in index",
            to_index.len(),
            new_chunk_count,
            total_chunks
        );
        if !removed.is_empty() {
            message.push_str(&format!(", removed {} file(s)", removed.len()));
        }

        info!(collection = %id, "{message}");
        Ok(IndexOutcome {
            success: true,
            message,
        })
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
