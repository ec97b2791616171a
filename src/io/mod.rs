pub mod fs;
pub mod reader;

pub use fs::{DiskFileSystem, FileSystem, MemoryFileSystem, PathInfo, PathMatcher, TraversalMode};
pub use reader::Reader;

use std::path::{Path, PathBuf};

/// Lower-cased extension of `path` without the dot, or an empty string.
#[must_use]
pub fn extension_lowercase(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Returns true if `path` has one of `extensions` (compared case-insensitively, without dots).
#[must_use]
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = extension_lowercase(path);
    extensions.iter().any(|candidate| candidate.eq_ignore_ascii_case(&ext))
}

/// Parses a path stored inside a model file, converting backslashes to separators.
#[must_use]
pub fn parse_model_path(raw: &str) -> PathBuf {
    PathBuf::from(raw.trim().replace('\\', "/"))
}
