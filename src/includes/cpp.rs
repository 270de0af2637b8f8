//! `#include` resolution for C and C++ sources.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;

use super::{GeneratedFiles, IncludeResult};
use crate::imports::ImportIndex;
use crate::util::fs::{normalize_path, SourceTree};

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*#\s*include\s*([<"])([^>"]+)[>"]"#).expect("valid regex")
});

type ScanKey = (PathBuf, usize);

/// Memoizing `#include` scanner.
///
/// Results are cached per (file, include-dir set) for the lifetime of the
/// resolver; asking twice for the same file with the same directories
/// returns the same `Rc`.
pub struct CppResolver<'a> {
    tree: &'a dyn SourceTree,
    imports: &'a ImportIndex,
    generated: &'a GeneratedFiles,
    system_dirs: &'a [PathBuf],
    /// Headers outside these directories are resolved but not dependencies.
    project_dirs: Vec<PathBuf>,
    include_sets: HashMap<Vec<PathBuf>, usize>,
    cache: HashMap<ScanKey, Rc<IncludeResult>>,
    seen: HashSet<ScanKey>,
}

impl<'a> CppResolver<'a> {
    pub fn new(
        tree: &'a dyn SourceTree,
        imports: &'a ImportIndex,
        generated: &'a GeneratedFiles,
    ) -> Self {
        CppResolver {
            tree,
            imports,
            generated,
            system_dirs: &[],
            project_dirs: Vec::new(),
            include_sets: HashMap::new(),
            cache: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    /// Directories the compiler searches on its own.
    pub fn with_system_dirs(mut self, dirs: &'a [PathBuf]) -> Self {
        self.system_dirs = dirs;
        self
    }

    /// Add a directory whose headers count as dependencies (the source
    /// tree, the build tree).
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dirs.push(dir.into());
        self
    }

    /// Number of cached scans.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn include_set(&mut self, dirs: &[PathBuf]) -> usize {
        let next = self.include_sets.len();
        *self.include_sets.entry(dirs.to_vec()).or_insert(next)
    }

    /// Scan `file` and, transitively, every header it includes.
    pub fn resolve(&mut self, file: &Path, include_dirs: &[PathBuf]) -> Rc<IncludeResult> {
        let key = (normalize_path(file), self.include_set(include_dirs));
        if let Some(hit) = self.cache.get(&key) {
            return Rc::clone(hit);
        }
        if !self.seen.insert(key.clone()) {
            tracing::trace!("include cycle through {}", file.display());
            return Rc::new(IncludeResult::default());
        }
        let result = Rc::new(self.scan(&key.0, include_dirs));
        self.cache.insert(key, Rc::clone(&result));
        result
    }

    fn scan(&mut self, file: &Path, include_dirs: &[PathBuf]) -> IncludeResult {
        let mut result = IncludeResult::default();
        let content = match self.tree.read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("cannot scan {}: {:#}", file.display(), e);
                return result;
            }
        };
        let current_dir = file.parent().map(Path::to_path_buf).unwrap_or_default();

        for line in content.lines() {
            let Some(caps) = INCLUDE.captures(line) else {
                continue;
            };
            let quoted = &caps[1] == "\"";
            let name = caps[2].trim();

            if quoted {
                let local = normalize_path(&current_dir.join(name));
                if self.tree.is_file(&local) {
                    self.record_found(&mut result, local, current_dir.clone(), include_dirs);
                    continue;
                }
            }
            if self.search(&mut result, name, include_dirs) {
                continue;
            }
            if self.is_system_header(name) {
                continue;
            }
            if name.ends_with(".pb.h") {
                tracing::debug!("{} is left to the proto rules", name);
                continue;
            }
            tracing::debug!("{} included from {} not found", name, file.display());
            result.unresolved.insert(name.to_string());
        }
        result
    }

    /// Look `name` up in the include directories, in order.
    fn search(&mut self, result: &mut IncludeResult, name: &str, include_dirs: &[PathBuf]) -> bool {
        for dir in include_dirs {
            let candidate = normalize_path(&dir.join(name));
            if let Some(import) = self.imports.header(&candidate.to_string_lossy()) {
                result.imports.insert(import);
                return true;
            }
            if let Some(node) = self.generated.get(&candidate) {
                result.generated.insert((node, dir.clone()));
                return true;
            }
            if self.tree.is_file(&candidate) {
                self.record_found(result, candidate, dir.clone(), include_dirs);
                return true;
            }
        }
        false
    }

    fn record_found(
        &mut self,
        result: &mut IncludeResult,
        path: PathBuf,
        dir: PathBuf,
        include_dirs: &[PathBuf],
    ) {
        if !self.in_project(&path) {
            tracing::trace!("{} is outside the project", path.display());
            return;
        }
        let nested = self.resolve(&path, include_dirs);
        result.found.insert((path, dir));
        result.merge(&nested);
    }

    fn in_project(&self, path: &Path) -> bool {
        self.project_dirs.is_empty() || self.project_dirs.iter().any(|d| path.starts_with(d))
    }

    fn is_system_header(&self, name: &str) -> bool {
        self.system_dirs
            .iter()
            .any(|dir| self.tree.is_file(&dir.join(name)))
    }
}
