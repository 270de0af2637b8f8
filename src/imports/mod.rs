//! Pre-built libraries described by `cc_import` descriptor files.
//!
//! Descriptors are parsed into [`ImportDecl`]s, registered as
//! [`TargetKind::CcImport`] targets and indexed by library artifact and
//! header path, so the parser and the include resolver can attribute a path
//! to the import providing it.

mod parser;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::registry::TargetRegistry;
use crate::core::target::{label, TargetDetails, TargetId, TargetKind};
use crate::util::fs::{normalize_path, read_to_string};

pub use parser::{parse_descriptor, ImportDecl, ImportParseError};

/// Repository every import wrapper is referenced from.
pub const IMPORT_REPOSITORY: &str = "@cpp_ext_libs//";

/// Lookup from artifact and header paths to import targets.
#[derive(Debug, Default)]
pub struct ImportIndex {
    libraries: HashMap<String, TargetId>,
    headers: HashMap<String, TargetId>,
    ids: Vec<TargetId>,
}

impl ImportIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the imports of one descriptor file, rendered into
    /// `physical_location`.
    pub fn register(
        &mut self,
        registry: &mut TargetRegistry,
        decls: Vec<ImportDecl>,
        physical_location: &str,
    ) {
        let mut declared = Vec::with_capacity(decls.len());
        for decl in &decls {
            let id = registry.get_or_insert(TargetKind::CcImport, &decl.name, IMPORT_REPOSITORY, || {
                TargetDetails::Import(decl.import.clone())
            });
            let target = registry.get_mut(id);
            target.details = TargetDetails::Import(decl.import.clone());
            target.physical_location = Some(physical_location.to_string());

            for lib in decl.import.libraries() {
                self.libraries.insert(normalized(lib), id);
            }
            for hdr in &decl.import.hdrs {
                self.headers.insert(normalized(hdr), id);
            }
            if !self.ids.contains(&id) {
                self.ids.push(id);
            }
            declared.push(id);
        }

        for (decl, id) in decls.iter().zip(declared) {
            for dep in &decl.deps {
                let dep_id = resolve_dep(registry, dep);
                registry.add_dep(id, dep_id);
            }
        }
        tracing::debug!("{} imports registered", self.ids.len());
    }

    /// Import providing the library artifact at `path`.
    pub fn library(&self, path: &str) -> Option<TargetId> {
        self.libraries.get(&normalized(path)).copied()
    }

    /// Import declaring the header at `path`.
    pub fn header(&self, path: &str) -> Option<TargetId> {
        self.headers.get(&normalized(path)).copied()
    }

    /// All registered imports.
    pub fn ids(&self) -> &[TargetId] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn normalized(path: &str) -> String {
    normalize_path(Path::new(path)).to_string_lossy().into_owned()
}

/// A dependency of an import: another import (`":name"` or `"name"`) or a
/// label defined elsewhere.
fn resolve_dep(registry: &mut TargetRegistry, dep: &str) -> TargetId {
    if label::is_absolute(dep) {
        let (location, name) = match dep.rsplit_once(':') {
            Some((location, name)) if !name.is_empty() => (location.to_string(), name.to_string()),
            _ => (dep.to_string(), dep.rsplit('/').next().unwrap_or(dep).to_string()),
        };
        return registry.get_or_insert(TargetKind::External, &name, &location, || {
            TargetDetails::External
        });
    }
    let name = dep.trim_start_matches(':');
    match registry.find(TargetKind::CcImport, name, IMPORT_REPOSITORY) {
        Some(id) => id,
        None => registry.get_or_insert(TargetKind::External, name, IMPORT_REPOSITORY, || {
            TargetDetails::External
        }),
    }
}

/// Read and parse a descriptor file. Globs are expanded against the
/// directory holding it.
pub fn load_descriptor(path: &Path) -> Result<Vec<ImportDecl>> {
    let text = read_to_string(path)?;
    let base = path.parent().unwrap_or(Path::new("."));
    parse_descriptor(&text, base).with_context(|| format!("failed to parse {}", path.display()))
}
