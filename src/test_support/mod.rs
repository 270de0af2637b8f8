//! Test utilities for ninja2bazel unit tests.
//!
//! [`MockSourceTree`] is an in-memory file tree implementing
//! [`SourceTree`], so the parser, the include resolvers and the visitor can
//! run without touching the disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use ninja2bazel::test_support::MockSourceTree;
//!
//! let tree = MockSourceTree::new()
//!     .with_file("/src/a.cc", "#include \"a.h\"\n")
//!     .with_file("/src/a.h", "");
//! ```

pub mod fixtures;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::util::fs::SourceTree;

pub use fixtures::*;

/// In-memory source tree.
#[derive(Debug, Clone, Default)]
pub struct MockSourceTree {
    files: HashMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
}

impl MockSourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, creating its parent directories.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.files.insert(path, content.into());
    }

    /// Add a directory and all of its parents.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let mut current = Some(path.as_ref());
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() || !self.dirs.insert(dir.to_path_buf()) {
                break;
            }
            current = dir.parent();
        }
    }

    /// Builder form of [`add_file`](Self::add_file).
    pub fn with_file(mut self, path: impl AsRef<Path>, content: impl Into<String>) -> Self {
        self.add_file(path, content);
        self
    }

    /// Builder form of [`add_dir`](Self::add_dir).
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.add_dir(path);
        self
    }

    /// Number of files in the tree.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl SourceTree for MockSourceTree {
    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("file not found: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_tree() {
        let tree = MockSourceTree::new()
            .with_file("/src/include/a.h", "#pragma once\n")
            .with_dir("/build/gen");

        assert!(tree.is_file(Path::new("/src/include/a.h")));
        assert!(tree.is_dir(Path::new("/src/include")));
        assert!(tree.is_dir(Path::new("/src")));
        assert!(tree.is_dir(Path::new("/build/gen")));
        assert!(!tree.exists(Path::new("/src/b.h")));
        assert_eq!(
            tree.read_to_string(Path::new("/src/include/a.h")).unwrap(),
            "#pragma once\n"
        );
        assert!(tree.read_to_string(Path::new("/src/b.h")).is_err());
        assert_eq!(tree.file_count(), 1);
    }
}
