//! Virtual File System
//!
//! Model parsers never touch the operating system directly. Skins, material
//! libraries and external buffers are looked up through a [`FileSystem`],
//! with paths relative to the game's asset root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::errors::{ForgeError, Result};
use crate::io::reader::Reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathInfo {
    File,
    Directory,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalMode {
    /// Direct children only.
    Flat,
    /// All descendants.
    Recursive,
}

/// Selects entries returned by [`FileSystem::find`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatcher {
    /// Case-insensitive glob on the file name, supporting `*` and `?`.
    FilenameGlob(String),
    /// Case-insensitive match on any of the given extensions (with or without the dot).
    Extension(Vec<String>),
    /// Every file.
    AnyFile,
}

impl PathMatcher {
    pub fn filename_glob(pattern: impl Into<String>) -> Self {
        Self::FilenameGlob(pattern.into())
    }

    #[must_use]
    pub fn matches(&self, path: &Path, info: PathInfo) -> bool {
        if info != PathInfo::File {
            return false;
        }
        match self {
            Self::FilenameGlob(pattern) => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| glob_match(pattern, name)),
            Self::Extension(extensions) => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| {
                    extensions
                        .iter()
                        .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(ext))
                }),
            Self::AnyFile => true,
        }
    }
}

/// Case-insensitive wildcard match of `text` against `pattern`.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
    let text: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(c) if *c == '?' || *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    backtrack = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

pub trait FileSystem: Send + Sync {
    fn path_info(&self, path: &Path) -> PathInfo;

    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Lists entries below `directory` accepted by `matcher`, sorted by path.
    fn find(
        &self,
        directory: &Path,
        mode: TraversalMode,
        matcher: &PathMatcher,
    ) -> Result<Vec<PathBuf>>;

    fn open_file(&self, path: &Path) -> Result<Reader> {
        self.read_file(path).map(Reader::from)
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.path_info(path) != PathInfo::Unknown
    }
}

impl<F: FileSystem + ?Sized> FileSystem for Arc<F> {
    fn path_info(&self, path: &Path) -> PathInfo {
        (**self).path_info(path)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        (**self).read_file(path)
    }

    fn find(
        &self,
        directory: &Path,
        mode: TraversalMode,
        matcher: &PathMatcher,
    ) -> Result<Vec<PathBuf>> {
        (**self).find(directory, mode, matcher)
    }
}

// ============================================================================
// Disk File System
// ============================================================================

/// File system rooted at a directory on disk.
pub struct DiskFileSystem {
    root: PathBuf,
}

impl DiskFileSystem {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collect(
        &self,
        directory: &Path,
        mode: TraversalMode,
        matcher: &PathMatcher,
        out: &mut Vec<PathBuf>,
    ) -> Result<()> {
        for entry in std::fs::read_dir(self.root.join(directory))? {
            let entry = entry?;
            let relative = directory.join(entry.file_name());
            let file_type = entry.file_type()?;
            let info = if file_type.is_dir() {
                PathInfo::Directory
            } else {
                PathInfo::File
            };

            if matcher.matches(&relative, info) {
                out.push(relative.clone());
            }
            if info == PathInfo::Directory && mode == TraversalMode::Recursive {
                self.collect(&relative, mode, matcher, out)?;
            }
        }
        Ok(())
    }
}

impl FileSystem for DiskFileSystem {
    fn path_info(&self, path: &Path) -> PathInfo {
        match std::fs::metadata(self.root.join(path)) {
            Ok(meta) if meta.is_file() => PathInfo::File,
            Ok(meta) if meta.is_dir() => PathInfo::Directory,
            _ => PathInfo::Unknown,
        }
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        if self.path_info(path) != PathInfo::File {
            return Err(ForgeError::FileNotFound(path.to_path_buf()));
        }
        Ok(std::fs::read(self.root.join(path))?)
    }

    fn find(
        &self,
        directory: &Path,
        mode: TraversalMode,
        matcher: &PathMatcher,
    ) -> Result<Vec<PathBuf>> {
        if self.path_info(directory) != PathInfo::Directory {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        self.collect(directory, mode, matcher, &mut out)?;
        out.sort();
        Ok(out)
    }
}

// ============================================================================
// In-Memory File System
// ============================================================================

/// File system backed by a map of paths to byte buffers.
///
/// Directories exist implicitly as ancestors of stored files.
#[derive(Default, Clone)]
pub struct MemoryFileSystem {
    files: FxHashMap<PathBuf, Arc<[u8]>>,
}

impl MemoryFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, data: impl Into<Arc<[u8]>>) {
        self.files.insert(path.as_ref().to_path_buf(), data.into());
    }

    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>, data: impl Into<Arc<[u8]>>) -> Self {
        self.add_file(path, data);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileSystem for MemoryFileSystem {
    fn path_info(&self, path: &Path) -> PathInfo {
        if self.files.contains_key(path) {
            PathInfo::File
        } else if path.as_os_str().is_empty()
            || self.files.keys().any(|file| file.starts_with(path))
        {
            PathInfo::Directory
        } else {
            PathInfo::Unknown
        }
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .map(|data| data.to_vec())
            .ok_or_else(|| ForgeError::FileNotFound(path.to_path_buf()))
    }

    fn open_file(&self, path: &Path) -> Result<Reader> {
        self.files
            .get(path)
            .map(|data| Reader::from_bytes(Arc::clone(data)))
            .ok_or_else(|| ForgeError::FileNotFound(path.to_path_buf()))
    }

    fn find(
        &self,
        directory: &Path,
        mode: TraversalMode,
        matcher: &PathMatcher,
    ) -> Result<Vec<PathBuf>> {
        let mut out: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|file| match mode {
                TraversalMode::Flat => file.parent() == Some(directory),
                TraversalMode::Recursive => file.starts_with(directory),
            })
            .filter(|file| matcher.matches(file, PathInfo::File))
            .cloned()
            .collect();
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("skin.*", "skin.wal"));
        assert!(glob_match("skin.*", "SKIN.PNG"));
        assert!(!glob_match("skin.*", "skin2.wal"));
        assert!(glob_match("*.md?", "model.md2"));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("a*b*c", "aXXbYY"));
        assert!(glob_match("*", ""));
    }

    #[test]
    fn test_memory_fs_path_info() {
        let fs = MemoryFileSystem::new().with_file("models/a/skin.wal", vec![0u8; 4]);
        assert_eq!(fs.path_info(Path::new("models/a/skin.wal")), PathInfo::File);
        assert_eq!(fs.path_info(Path::new("models/a")), PathInfo::Directory);
        assert_eq!(fs.path_info(Path::new("models/b")), PathInfo::Unknown);
    }

    #[test]
    fn test_memory_fs_find_flat() {
        let fs = MemoryFileSystem::new()
            .with_file("m/skin.wal", vec![0u8])
            .with_file("m/skin.png", vec![0u8])
            .with_file("m/other.wal", vec![0u8])
            .with_file("m/sub/skin.tga", vec![0u8]);

        let found = fs
            .find(
                Path::new("m"),
                TraversalMode::Flat,
                &PathMatcher::filename_glob("skin.*"),
            )
            .unwrap();
        assert_eq!(
            found,
            vec![PathBuf::from("m/skin.png"), PathBuf::from("m/skin.wal")]
        );

        let recursive = fs
            .find(
                Path::new("m"),
                TraversalMode::Recursive,
                &PathMatcher::Extension(vec!["tga".to_string()]),
            )
            .unwrap();
        assert_eq!(recursive, vec![PathBuf::from("m/sub/skin.tga")]);
    }

    #[test]
    fn test_memory_fs_missing_file() {
        let fs = MemoryFileSystem::new();
        assert!(matches!(
            fs.read_file(Path::new("nope.mdl")),
            Err(ForgeError::FileNotFound(_))
        ));
    }
}
