use std::path::{Path, PathBuf};

use crate::error::Result;

/// File extensions recognized as indexable text. Anything else in a
/// collection directory is ignored by the indexer entirely.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "c", "cfg", "cpp", "css", "csv", "go", "h", "html", "ini", "java", "js",
    "json", "log", "markdown", "md", "py", "rs", "rst", "sh", "sql", "toml",
    "ts", "txt", "xml", "yaml", "yml",
];

/// A discovered source file within a collection directory.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// File name within the collection directory.
    pub filename: String,
    /// Fully resolved path for reading.
    pub path: PathBuf,
}

/// List the indexable files of a collection directory.
///
/// Collections are flat upload directories, so this does not recurse.
/// Hidden files and files without a supported extension are skipped.
/// A missing directory yields an empty list rather than an error.
pub fn discover_files(dir: &Path) -> Result<Vec<DiscoveredFile>> {
    let mut results = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(results);
        }
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();

        if name.starts_with('.') {
            continue;
        }
        if !entry.file_type()?.is_file() {
            continue;
        }
        if !is_text_file(&name) {
            continue;
        }

        results.push(DiscoveredFile {
            filename: name,
            path: entry.path(),
        });
    }

    results.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(results)
}

/// Whether a file name carries one of the supported text extensions.
pub fn is_text_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            TEXT_EXTENSIONS.contains(&ext.as_str())
        })
}
