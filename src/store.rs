//! Durable on-disk representation of one collection's index.
//!
//! Each collection owns a directory with four files:
//!
//! - `metadata.json` — per-file bookkeeping and index statistics
//! - `matrix.bin.gz` — weighted matrix + IDF vector, gzip-compressed
//! - `vocabulary.json` — term → id mapping
//! - `chunks.json` — chunk records, index-aligned with matrix rows
//!
//! Binary format of `matrix.bin.gz` (after decompression):
//! - 4 bytes: magic `RGL1`
//! - 4 bytes: row count (u32 LE)
//! - 4 bytes: column count (u32 LE)
//! - rows * cols * 4 bytes: weighted matrix, f32 LE row-major
//! - cols * 4 bytes: IDF vector, f32 LE
//!
//! Writes are full rewrites performed after the new state is completely
//! built in memory. The loader validates the magic and the exact payload
//! length, so a truncated file from a crash mid-write classifies as
//! [`Error::Corrupt`] and the collection is rebuilt from source.

use std::{
    collections::BTreeMap,
    io::{Read, Write},
    path::Path,
};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Deserialize, Serialize};

use crate::{
    chunking::ChunkRecord,
    error::{Error, Result},
    matrix::Matrix,
    vocabulary::Vocabulary,
};

pub const METADATA_FILE: &str = "metadata.json";
pub const MATRIX_FILE: &str = "matrix.bin.gz";
pub const VOCABULARY_FILE: &str = "vocabulary.json";
pub const CHUNKS_FILE: &str = "chunks.json";

/// Tag identifying this engine and on-disk format version.
pub const INDEX_TYPE: &str = "tfidf_dense_v1";

const MATRIX_MAGIC: &[u8; 4] = b"RGL1";
const MATRIX_HEADER: usize = 12;

/// Bookkeeping for one indexed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub content_hash: String,
    pub chunk_count: usize,
    pub indexed_at: String,
}

/// Per-collection index metadata, persisted as `metadata.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    #[serde(default)]
    pub files: BTreeMap<String, FileEntry>,
    pub last_updated: String,
    pub total_chunks: usize,
    pub index_type: String,
    pub total_unique_words: usize,
    pub matrix_shape: [usize; 2],
    pub chunk_size: usize,
    pub overlap_size: usize,
    pub supported_formats: Vec<String>,
}

/// The unit of retrieval: everything needed to score a query against one
/// collection. Replaced wholesale on rebuild, never mutated in place.
#[derive(Debug, Clone)]
pub struct CollectionIndex {
    pub vocabulary: Vocabulary,
    pub idf: Vec<f32>,
    pub matrix: Matrix,
    pub chunks: Vec<ChunkRecord>,
    pub metadata: IndexMetadata,
}

/// Whether persisted index state exists for this directory.
pub fn exists(dir: &Path) -> bool {
    dir.join(MATRIX_FILE).is_file()
}

/// Persist a collection index as a full rewrite of all four files.
pub fn save(dir: &Path, index: &CollectionIndex) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    write_matrix(&dir.join(MATRIX_FILE), &index.matrix, &index.idf)?;

    let vocab_json = serde_json::to_vec(&index.vocabulary)?;
    std::fs::write(dir.join(VOCABULARY_FILE), vocab_json)?;

    let chunks_json = serde_json::to_vec(&index.chunks)?;
    std::fs::write(dir.join(CHUNKS_FILE), chunks_json)?;

    let metadata_json = serde_json::to_vec_pretty(&index.metadata)?;
    std::fs::write(dir.join(METADATA_FILE), metadata_json)?;

    Ok(())
}

/// Load a collection index from disk.
///
/// Returns [`Error::NotFound`] when no index has been persisted and
/// [`Error::Corrupt`] when any file fails validation; both are treated
/// as "absent" by the manager.
pub fn load(dir: &Path) -> Result<CollectionIndex> {
    let matrix_path = dir.join(MATRIX_FILE);
    if !matrix_path.is_file() {
        return Err(Error::NotFound {
            kind: "index",
            name: dir.display().to_string(),
        });
    }

    let (matrix, idf) = read_matrix(&matrix_path)?;

    let vocabulary: Vocabulary =
        read_json(&dir.join(VOCABULARY_FILE))?;
    let chunks: Vec<ChunkRecord> = read_json(&dir.join(CHUNKS_FILE))?;
    let metadata: IndexMetadata = read_json(&dir.join(METADATA_FILE))?;

    if chunks.len() != matrix.rows {
        return Err(Error::corrupt(
            dir.join(CHUNKS_FILE),
            format!(
                "chunk count {} does not match matrix rows {}",
                chunks.len(),
                matrix.rows
            ),
        ));
    }
    if vocabulary.len() != matrix.cols || idf.len() != matrix.cols {
        return Err(Error::corrupt(
            dir.join(VOCABULARY_FILE),
            format!(
                "vocabulary size {} / idf length {} do not match matrix columns {}",
                vocabulary.len(),
                idf.len(),
                matrix.cols
            ),
        ));
    }

    Ok(CollectionIndex {
        vocabulary,
        idf,
        matrix,
        chunks,
        metadata,
    })
}

/// Read only the chunk records, without touching the matrix. Used by
/// incremental rebuilds to retain unchanged files' chunks verbatim.
///
/// Returns `Ok(None)` when no chunk file has been persisted.
pub fn load_chunks(dir: &Path) -> Result<Option<Vec<ChunkRecord>>> {
    let path = dir.join(CHUNKS_FILE);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| Error::corrupt(path, e.to_string()))
}

/// Read only the metadata file, without touching the matrix.
///
/// Returns `Ok(None)` when the collection has never been indexed.
pub fn load_metadata(dir: &Path) -> Result<Option<IndexMetadata>> {
    let path = dir.join(METADATA_FILE);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| Error::corrupt(path, e.to_string()))
}

fn write_matrix(path: &Path, matrix: &Matrix, idf: &[f32]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());

    encoder.write_all(MATRIX_MAGIC)?;
    encoder.write_all(&(matrix.rows as u32).to_le_bytes())?;
    encoder.write_all(&(matrix.cols as u32).to_le_bytes())?;
    encoder.write_all(bytemuck::cast_slice(&matrix.data))?;
    encoder.write_all(bytemuck::cast_slice(idf))?;
    encoder.finish()?;

    Ok(())
}

fn read_matrix(path: &Path) -> Result<(Matrix, Vec<f32>)> {
    let file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    GzDecoder::new(file)
        .read_to_end(&mut bytes)
        .map_err(|e| Error::corrupt(path, format!("gzip: {e}")))?;

    if bytes.len() < MATRIX_HEADER {
        return Err(Error::corrupt(path, "file shorter than header"));
    }
    if &bytes[0..4] != MATRIX_MAGIC {
        return Err(Error::corrupt(path, "bad magic"));
    }

    let rows = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    let cols = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;

    let matrix_bytes = rows
        .checked_mul(cols)
        .and_then(|cells| cells.checked_mul(4))
        .ok_or_else(|| Error::corrupt(path, "dimension overflow"))?;
    let expected = MATRIX_HEADER + matrix_bytes + cols * 4;
    if bytes.len() != expected {
        return Err(Error::corrupt(
            path,
            format!("expected {expected} bytes, found {}", bytes.len()),
        ));
    }

    let split = MATRIX_HEADER + matrix_bytes;
    let data: Vec<f32> =
        bytemuck::pod_collect_to_vec(&bytes[MATRIX_HEADER..split]);
    let idf: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes[split..]);

    Ok((Matrix { rows, cols, data }, idf))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::corrupt(path, "missing alongside matrix file")
        } else {
            e.into()
        }
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::corrupt(path, e.to_string()))
}
