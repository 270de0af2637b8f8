//! Header and import discovery.
//!
//! The build graph says which file a compile action reads but not which
//! headers that file pulls in. The resolvers here scan sources for
//! `#include` and proto `import` statements and attribute each one to a
//! file of the tree, an import wrapper, or a generated output.
//!
//! Both resolvers memoize per (file, include-dir set) for the lifetime of a
//! run and break include cycles by returning an empty result on re-entry.

mod cpp;
mod proto;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::core::graph::{BuildGraph, NodeId};
use crate::core::target::TargetId;
use crate::util::fs::normalize_path;

pub use cpp::CppResolver;
pub use proto::{proto_include_dirs, ProtoImport, ProtoImports, ProtoResolver};

/// What scanning one file (and everything it includes) found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeResult {
    /// Headers of the tree, with the include directory that found them.
    pub found: BTreeSet<(PathBuf, PathBuf)>,
    /// Include names nothing could resolve.
    pub unresolved: BTreeSet<String>,
    /// Import wrappers declaring an included header.
    pub imports: BTreeSet<TargetId>,
    /// Outputs of build actions, with the include directory that found them.
    pub generated: BTreeSet<(NodeId, PathBuf)>,
}

impl IncludeResult {
    /// Union `other` into `self`.
    pub fn merge(&mut self, other: &IncludeResult) {
        self.found.extend(other.found.iter().cloned());
        self.unresolved.extend(other.unresolved.iter().cloned());
        self.imports.extend(other.imports.iter().copied());
        self.generated.extend(other.generated.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
            && self.unresolved.is_empty()
            && self.imports.is_empty()
            && self.generated.is_empty()
    }
}

/// Outputs of the build graph indexed by absolute path.
#[derive(Debug, Default)]
pub struct GeneratedFiles {
    by_path: HashMap<PathBuf, NodeId>,
}

impl GeneratedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every output of a non-phony action. Relative names live in
    /// `build_dir`.
    pub fn from_graph(graph: &BuildGraph, build_dir: Option<&Path>) -> Self {
        let mut files = GeneratedFiles::new();
        for (_, action) in graph.actions() {
            if action.is_phony() {
                continue;
            }
            for &out in &action.outputs {
                let name = Path::new(&graph.node(out).name);
                let path = match build_dir {
                    Some(dir) if name.is_relative() => dir.join(name),
                    _ => name.to_path_buf(),
                };
                files.insert(&path, out);
            }
        }
        tracing::debug!("{} generated files indexed", files.by_path.len());
        files
    }

    pub fn insert(&mut self, path: &Path, node: NodeId) {
        self.by_path.insert(normalize_path(path), node);
    }

    /// The node producing the file at `path`.
    pub fn get(&self, path: &Path) -> Option<NodeId> {
        self.by_path.get(&normalize_path(path)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// Extract the `-I` directories of a compile command's `INCLUDES` value.
///
/// Both `-Idir` and `-I dir` are accepted. Relative directories are
/// resolved against `build_dir`. Order is preserved, duplicates dropped.
pub fn parse_include_dirs(includes: &str, build_dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    let mut tokens = includes.split_whitespace();
    while let Some(token) = tokens.next() {
        let raw = match token.strip_prefix("-I") {
            Some("") => match tokens.next() {
                Some(next) => next,
                None => break,
            },
            Some(dir) => dir,
            None => continue,
        };
        let dir = Path::new(raw);
        let dir = if dir.is_relative() {
            normalize_path(&build_dir.join(dir))
        } else {
            normalize_path(dir)
        };
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}
