//! Core target types.
//!
//! A [`Target`] is one declaration in a generated build file. The shared
//! record (name, package, deps, headers, sources) lives on `Target`; the
//! variant-specific attributes live in [`TargetDetails`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::cc_import::CcImport;
use super::language::Language;

/// Index of a target in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub(crate) usize);

impl TargetId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Import wrappers are ordinary targets; nodes of the build graph refer to
/// them by target id.
pub type ImportId = TargetId;

/// The kind of declaration a target renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    CcLibrary,
    CcBinary,
    CcTest,
    CcSharedLibrary,
    Genrule,
    GenruleOutput,
    ProtoLibrary,
    CcProtoLibrary,
    CcGrpcLibrary,
    CcImport,
    ExportedFile,
    ShBinary,
    /// A label defined outside the generated files.
    External,
    /// A hand-written label replacing a build-graph node.
    ManuallyGenerated,
}

impl TargetKind {
    /// Rule name used in the generated file.
    pub fn rule_name(&self) -> &'static str {
        match self {
            TargetKind::CcLibrary => "cc_library",
            TargetKind::CcBinary => "cc_binary",
            TargetKind::CcTest => "cc_test",
            TargetKind::CcSharedLibrary => "cc_shared_library",
            TargetKind::Genrule => "genrule",
            TargetKind::GenruleOutput => "genrule_output",
            TargetKind::ProtoLibrary => "proto_library",
            TargetKind::CcProtoLibrary => "cc_proto_library",
            TargetKind::CcGrpcLibrary => "cc_grpc_library",
            TargetKind::CcImport => "cc_import",
            TargetKind::ExportedFile => "exports_files",
            TargetKind::ShBinary => "sh_binary",
            TargetKind::External => "external",
            TargetKind::ManuallyGenerated => "manually_generated",
        }
    }

    /// Whether the target renders its own declaration.
    pub fn is_declared(&self) -> bool {
        !matches!(
            self,
            TargetKind::GenruleOutput
                | TargetKind::ExportedFile
                | TargetKind::External
                | TargetKind::ManuallyGenerated
        )
    }

    /// Whether the target is one of the C/C++ rules.
    pub fn is_cc(&self) -> bool {
        matches!(
            self,
            TargetKind::CcLibrary
                | TargetKind::CcBinary
                | TargetKind::CcTest
                | TargetKind::CcSharedLibrary
        )
    }

    /// Whether a dependency edge from `self` to `dep` makes sense.
    pub fn accepts_dep(&self, dep: TargetKind) -> bool {
        use TargetKind::*;
        match self {
            CcLibrary | CcBinary | CcTest | CcSharedLibrary => matches!(
                dep,
                CcLibrary
                    | CcSharedLibrary
                    | CcProtoLibrary
                    | CcGrpcLibrary
                    | CcImport
                    | External
                    | ManuallyGenerated
            ),
            ProtoLibrary | CcProtoLibrary => matches!(dep, ProtoLibrary | External),
            CcGrpcLibrary => matches!(dep, CcProtoLibrary | External),
            CcImport => matches!(dep, CcImport | External),
            Genrule | GenruleOutput | ExportedFile | ShBinary | External
            | ManuallyGenerated => false,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rule_name())
    }
}

/// Which C/C++ rule a target renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CcRule {
    Library,
    Binary,
    Test,
    SharedLibrary,
}

impl CcRule {
    pub fn kind(&self) -> TargetKind {
        match self {
            CcRule::Library => TargetKind::CcLibrary,
            CcRule::Binary => TargetKind::CcBinary,
            CcRule::Test => TargetKind::CcTest,
            CcRule::SharedLibrary => TargetKind::CcSharedLibrary,
        }
    }
}

/// An include directory of a C/C++ target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IncludeDir {
    /// Path relative to the root dir (or to the output dir when generated).
    pub path: String,
    /// Lives in the output tree.
    pub generated: bool,
}

impl IncludeDir {
    pub fn source(path: impl Into<String>) -> Self {
        IncludeDir {
            path: path.into(),
            generated: false,
        }
    }

    pub fn generated(path: impl Into<String>) -> Self {
        IncludeDir {
            path: path.into(),
            generated: true,
        }
    }
}

/// What compiling one source file added to its target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contribution {
    pub language: Language,
    pub copts: BTreeSet<String>,
    pub defines: BTreeSet<String>,
    pub kept_defines: BTreeSet<String>,
    pub hdrs: BTreeSet<TargetId>,
    pub deps: BTreeSet<TargetId>,
    pub include_dirs: BTreeSet<IncludeDir>,
}

/// Attributes of `cc_library`, `cc_binary`, `cc_test` and `cc_shared_library`.
#[derive(Debug, Clone)]
pub struct CcAttrs {
    pub rule: CcRule,
    pub copts: BTreeSet<String>,
    /// Defines local to the target (rendered as `-D` copts).
    pub defines: BTreeSet<String>,
    /// Allow-listed defines (rendered as `defines`).
    pub kept_defines: BTreeSet<String>,
    pub linkopts: BTreeSet<String>,
    pub include_dirs: BTreeSet<IncludeDir>,
    pub data: BTreeSet<TargetId>,
    /// Per source file, keyed by the source target.
    pub contributions: BTreeMap<TargetId, Contribution>,
}

impl CcAttrs {
    pub fn new(rule: CcRule) -> Self {
        CcAttrs {
            rule,
            copts: BTreeSet::new(),
            defines: BTreeSet::new(),
            kept_defines: BTreeSet::new(),
            linkopts: BTreeSet::new(),
            include_dirs: BTreeSet::new(),
            data: BTreeSet::new(),
            contributions: BTreeMap::new(),
        }
    }
}

/// Attributes of a `genrule`.
#[derive(Debug, Clone, Default)]
pub struct GenruleAttrs {
    pub cmd: String,
    /// Output names relative to the package.
    pub outs: BTreeSet<String>,
    /// Alternative output name -> declared output name.
    pub aliases: BTreeMap<String, String>,
    pub tools: BTreeSet<TargetId>,
    pub local: bool,
    /// Working directory relative to the build dir.
    pub run_dir: Option<String>,
}

impl GenruleAttrs {
    /// Map an output name (possibly an alias) to the declared output.
    pub fn output(&self, name: &str) -> Option<&str> {
        let name = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.outs.get(name).map(String::as_str)
    }
}

/// Variant-specific attributes.
#[derive(Debug, Clone)]
pub enum TargetDetails {
    Cc(CcAttrs),
    Genrule(GenruleAttrs),
    /// One declared output of a genrule.
    GenruleOutput { rule: TargetId },
    ProtoLibrary { strip_import_prefix: Option<String> },
    CcProtoLibrary,
    CcGrpcLibrary,
    Import(CcImport),
    ExportedFile,
    /// Wrapper script around the tool of a custom command.
    ShBinary,
    External,
    ManuallyGenerated,
}

impl TargetDetails {
    pub fn kind(&self) -> TargetKind {
        match self {
            TargetDetails::Cc(attrs) => attrs.rule.kind(),
            TargetDetails::Genrule(_) => TargetKind::Genrule,
            TargetDetails::GenruleOutput { .. } => TargetKind::GenruleOutput,
            TargetDetails::ProtoLibrary { .. } => TargetKind::ProtoLibrary,
            TargetDetails::CcProtoLibrary => TargetKind::CcProtoLibrary,
            TargetDetails::CcGrpcLibrary => TargetKind::CcGrpcLibrary,
            TargetDetails::Import(_) => TargetKind::CcImport,
            TargetDetails::ExportedFile => TargetKind::ExportedFile,
            TargetDetails::ShBinary => TargetKind::ShBinary,
            TargetDetails::External => TargetKind::External,
            TargetDetails::ManuallyGenerated => TargetKind::ManuallyGenerated,
        }
    }
}

/// A declaration in a generated build file.
#[derive(Debug, Clone)]
pub struct Target {
    /// Name inside its package (file path for exported files).
    pub name: String,
    /// Package the target renders into. May be an absolute label prefix
    /// (`//pkg`, `@repo//`) for targets defined elsewhere.
    pub location: String,
    /// Directory the declaration is physically written to, when it differs
    /// from `location`.
    pub physical_location: Option<String>,
    pub deps: BTreeSet<TargetId>,
    pub hdrs: BTreeSet<TargetId>,
    pub srcs: BTreeSet<TargetId>,
    pub details: TargetDetails,
}

impl Target {
    pub fn new(name: impl Into<String>, location: impl Into<String>, details: TargetDetails) -> Self {
        Target {
            name: name.into(),
            location: location.into(),
            physical_location: None,
            deps: BTreeSet::new(),
            hdrs: BTreeSet::new(),
            srcs: BTreeSet::new(),
            details,
        }
    }

    pub fn kind(&self) -> TargetKind {
        self.details.kind()
    }

    /// Directory whose build file holds this declaration.
    pub fn output_dir(&self) -> &str {
        self.physical_location.as_deref().unwrap_or(&self.location)
    }

    pub fn cc(&self) -> Option<&CcAttrs> {
        match &self.details {
            TargetDetails::Cc(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn cc_mut(&mut self) -> Option<&mut CcAttrs> {
        match &mut self.details {
            TargetDetails::Cc(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn genrule(&self) -> Option<&GenruleAttrs> {
        match &self.details {
            TargetDetails::Genrule(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn genrule_mut(&mut self) -> Option<&mut GenruleAttrs> {
        match &mut self.details {
            TargetDetails::Genrule(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn import(&self) -> Option<&CcImport> {
        match &self.details {
            TargetDetails::Import(import) => Some(import),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}:{})", self.kind(), self.location, self.name)
    }
}
