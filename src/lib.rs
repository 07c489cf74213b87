//! raglite - a lexical retrieval engine for grounded question answering.
//!
//! raglite indexes per-owner collections of text documents into TF-IDF
//! weighted chunk matrices, maintains them incrementally with hash-based
//! change detection, and ranks chunks against queries by cosine
//! similarity. A separate whole-document cache serves complete documents
//! to the answering layer with per-entry reload deduplication.
//!
//! # Quick start
//!
//! ```no_run
//! use raglite::{CollectionId, DataDir, IndexManager};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let manager = IndexManager::new(data_dir.index_dir().unwrap());
//! let id = CollectionId::new("alice", "notes");
//!
//! let outcome = manager.index(&id, std::path::Path::new("./docs"), false);
//! println!("{}", outcome.message);
//!
//! for hit in manager.search(&id, "how are chunks ranked", 5) {
//!     println!(
//!         "{}#{} ({:.3})",
//!         hit.filename, hit.chunk_index, hit.relevance
//!     );
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod collection_id;
pub mod data_dir;
pub mod doc_cache;
pub mod error;
pub mod manager;
pub mod matrix;
pub mod ranker;
pub mod store;
pub mod tokenizer;
pub mod vocabulary;
pub mod walker;

pub use collection_id::CollectionId;
pub use data_dir::DataDir;
pub use doc_cache::DocumentCache;
pub use error::{Error, Result};
pub use manager::IndexManager;
