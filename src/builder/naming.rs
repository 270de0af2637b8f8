//! Package and target naming.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::graph::FileNode;

static PROTO_OUTPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)(\.grpc)?\.pb\.(cc|h|cc\.o)$").expect("valid regex")
});
static PROTO_SOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)\.proto$").expect("valid regex"));
static CMAKE_FILES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/?CMakeFiles/[^/]+").expect("valid regex"));
static SHARED_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.so(\.\d+)*$").expect("valid regex"));

/// Package and file name of a node inside its package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlace {
    pub package: String,
    pub name: String,
}

/// Package remapping: a package starting with a key moves under the value.
#[derive(Debug, Clone, Default)]
pub struct Remap {
    rules: BTreeMap<String, String>,
}

impl Remap {
    pub fn new(rules: BTreeMap<String, String>) -> Self {
        Remap { rules }
    }

    /// Apply the longest matching rule to `package`.
    pub fn apply(&self, package: &str) -> String {
        let matched = self
            .rules
            .iter()
            .filter(|(from, _)| {
                package == from.as_str()
                    || package
                        .strip_prefix(from.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(from, _)| from.len());
        match matched {
            Some((from, to)) => format!("{}{}", to, &package[from.len()..]),
            None => package.to_string(),
        }
    }
}

/// Package a node renders into: the prefix for outputs of the build dir,
/// otherwise the first directory of its name.
pub fn package_of(node: &FileNode) -> String {
    place(&node.short_name, node.location.as_deref()).package
}

/// Where a file node lives as a label.
pub fn file_place(node: &FileNode) -> FilePlace {
    place(&node.short_name, node.location.as_deref())
}

/// Place of a file given its short name and output-directory prefix.
///
/// Outputs of the build dir keep their whole name inside the prefix package;
/// other files drop the package directory.
pub fn place(short_name: &str, location: Option<&str>) -> FilePlace {
    let location = location.map(|l| l.trim_end_matches('/')).filter(|l| !l.is_empty());
    if let Some(location) = location {
        return FilePlace {
            package: location.to_string(),
            name: short_name.to_string(),
        };
    }
    match short_name.split_once('/') {
        Some((first, rest)) => FilePlace {
            package: first.to_string(),
            name: rest.to_string(),
        },
        None => FilePlace {
            package: String::new(),
            name: short_name.to_string(),
        },
    }
}

/// File name of a path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Library name of an archive or shared object: `xar/liblogging.a` is
/// `logging`.
pub fn library_name(short_name: &str) -> String {
    let file = basename(short_name);
    let file = file.strip_suffix(".a").unwrap_or(file);
    let file = SHARED_SUFFIX.replace(file, "");
    file.strip_prefix("lib")
        .filter(|f| !f.is_empty())
        .unwrap_or(file.as_ref())
        .to_string()
}

/// Name of the test built from a `*_test` link output.
pub fn test_name(short_name: &str) -> Option<String> {
    basename(short_name)
        .strip_suffix("_test")
        .filter(|stem| !stem.is_empty())
        .map(|stem| format!("test_{}", stem))
}

/// Name of the shared-library wrapper around `library`.
pub fn shared_name(library: &str) -> String {
    format!("shared_{}", library)
}

/// Turn a path into a target-name fragment.
pub fn flatten(path: &str) -> String {
    path.replace(['/', '.'], "_")
}

/// Assigns every proto a short unique name: the shortest `_`-joined suffix
/// of its path no other proto claimed first.
#[derive(Debug, Default)]
pub struct ProtoNames {
    assigned: HashMap<String, String>,
    taken: BTreeSet<String>,
}

impl ProtoNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name for the proto behind a `.proto`, `.pb.h`, `.pb.cc` or
    /// `.grpc.pb.*` path.
    pub fn name_for(&mut self, path: &str) -> Option<String> {
        let stem = Self::stem(path)?;
        if let Some(name) = self.assigned.get(&stem) {
            return Some(name.clone());
        }
        let parts: Vec<&str> = stem.split('/').filter(|p| !p.is_empty()).collect();
        let mut name = parts.join("_");
        for len in 1..=parts.len() {
            let candidate = parts[parts.len() - len..].join("_");
            if !self.taken.contains(&candidate) {
                name = candidate;
                break;
            }
        }
        self.taken.insert(name.clone());
        self.assigned.insert(stem, name.clone());
        Some(name)
    }

    /// Path of the proto without extension and CMake object directories.
    fn stem(path: &str) -> Option<String> {
        let stem = PROTO_OUTPUT
            .captures(path)
            .or_else(|| PROTO_SOURCE.captures(path))
            .map(|caps| caps[1].to_string())?;
        Some(CMAKE_FILES.replace_all(&stem, "").into_owned())
    }
}

/// Whether `path` is a gRPC stub generated by protoc.
pub fn is_grpc_output(path: &str) -> bool {
    PROTO_OUTPUT
        .captures(path)
        .is_some_and(|caps| caps.get(2).is_some())
}

/// Whether `path` is a tool the wrapper runs through `python3`.
pub fn is_python(path: &str) -> bool {
    Path::new(path).extension().is_some_and(|e| e == "py")
}
