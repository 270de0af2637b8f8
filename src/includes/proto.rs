//! `import` resolution for `.proto` files.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;

use crate::util::fs::{normalize_path, SourceTree};

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*import\s+(?:public\s+|weak\s+)?"([^"]+)"\s*;"#).expect("valid regex")
});

/// Imports under this prefix come from the protobuf repository.
const WELL_KNOWN_PREFIX: &str = "google/";

/// One resolved `import` statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtoImport {
    /// A well-known proto shipped with protobuf, by import name.
    External(String),
    /// A file of the tree and the search root that found it.
    Local { path: PathBuf, root: PathBuf },
}

/// Imports of a file and of everything it imports, keyed by file.
pub type ProtoImports = BTreeMap<PathBuf, Vec<ProtoImport>>;

/// Memoizing `import` scanner.
pub struct ProtoResolver<'a> {
    tree: &'a dyn SourceTree,
    cache: HashMap<(PathBuf, Vec<PathBuf>), Rc<ProtoImports>>,
    seen: HashSet<(PathBuf, Vec<PathBuf>)>,
}

impl<'a> ProtoResolver<'a> {
    pub fn new(tree: &'a dyn SourceTree) -> Self {
        ProtoResolver {
            tree,
            cache: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    /// Scan `file` and every proto it imports, searching `roots` in order.
    pub fn resolve(&mut self, file: &Path, roots: &[PathBuf]) -> Rc<ProtoImports> {
        let key = (normalize_path(file), roots.to_vec());
        if let Some(hit) = self.cache.get(&key) {
            return Rc::clone(hit);
        }
        if !self.seen.insert(key.clone()) {
            return Rc::new(ProtoImports::new());
        }

        let mut result = ProtoImports::new();
        let mut own = Vec::new();
        match self.tree.read_to_string(&key.0) {
            Ok(content) => {
                for caps in content.lines().filter_map(|l| IMPORT.captures(l)) {
                    let name = &caps[1];
                    if name.starts_with(WELL_KNOWN_PREFIX) {
                        own.push(ProtoImport::External(name.to_string()));
                        continue;
                    }
                    let found = roots
                        .iter()
                        .map(|root| (root, normalize_path(&root.join(name))))
                        .find(|(_, candidate)| self.tree.is_file(candidate));
                    match found {
                        Some((root, path)) => {
                            let nested = self.resolve(&path, roots);
                            result.extend(nested.iter().map(|(k, v)| (k.clone(), v.clone())));
                            own.push(ProtoImport::Local {
                                path,
                                root: root.clone(),
                            });
                        }
                        None => tracing::debug!("import {} of {} not found", name, file.display()),
                    }
                }
            }
            Err(e) => tracing::debug!("cannot scan {}: {:#}", file.display(), e),
        }
        result.insert(key.0.clone(), own);

        let result = Rc::new(result);
        self.cache.insert(key, Rc::clone(&result));
        result
    }
}

/// Search roots of a protoc invocation (`-I`, `--proto_path`), in order.
pub fn proto_include_dirs(command: &str) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    let mut tokens = command.split_whitespace();
    while let Some(token) = tokens.next() {
        let value = if token == "-I" || token == "--proto_path" {
            tokens.next()
        } else if let Some(dir) = token.strip_prefix("--proto_path=") {
            Some(dir)
        } else {
            token.strip_prefix("-I").filter(|d| !d.is_empty())
        };
        if let Some(dir) = value {
            let dir = PathBuf::from(dir);
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockSourceTree;

    #[test]
    fn test_resolve_imports() {
        let tree = MockSourceTree::new()
            .with_file(
                "/src/proto/api.proto",
                "syntax = \"proto3\";\nimport \"common/types.proto\";\nimport \"google/protobuf/any.proto\";\nimport \"nope.proto\";\n",
            )
            .with_file("/src/proto/common/types.proto", "import public \"common/base.proto\";\n")
            .with_file("/src/proto/common/base.proto", "");
        let mut resolver = ProtoResolver::new(&tree);
        let roots = vec![PathBuf::from("/src/proto")];

        let result = resolver.resolve(Path::new("/src/proto/api.proto"), &roots);
        let api = &result[Path::new("/src/proto/api.proto")];
        assert_eq!(
            api,
            &vec![
                ProtoImport::Local {
                    path: PathBuf::from("/src/proto/common/types.proto"),
                    root: PathBuf::from("/src/proto"),
                },
                ProtoImport::External("google/protobuf/any.proto".to_string()),
            ]
        );
        assert_eq!(result[Path::new("/src/proto/common/types.proto")].len(), 1);
        assert!(result[Path::new("/src/proto/common/base.proto")].is_empty());

        let again = resolver.resolve(Path::new("/src/proto/api.proto"), &roots);
        assert!(Rc::ptr_eq(&result, &again));
    }

    #[test]
    fn test_import_cycle_terminates() {
        let tree = MockSourceTree::new()
            .with_file("/p/a.proto", "import \"b.proto\";\n")
            .with_file("/p/b.proto", "import \"a.proto\";\n");
        let mut resolver = ProtoResolver::new(&tree);
        let result = resolver.resolve(Path::new("/p/a.proto"), &[PathBuf::from("/p")]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_proto_include_dirs() {
        let dirs = proto_include_dirs(
            "/usr/bin/protoc --cpp_out /build/gen -I /src/proto --proto_path=/src/common -I/src/proto /src/proto/api.proto",
        );
        assert_eq!(
            dirs,
            vec![PathBuf::from("/src/proto"), PathBuf::from("/src/common")]
        );
    }
}
