//! `load()` statements.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::target::{label, TargetKind};

/// Extension file providing `kind`, or `None` for native rules.
pub fn load_file(kind: TargetKind) -> Option<&'static str> {
    match kind {
        TargetKind::CcLibrary
        | TargetKind::CcBinary
        | TargetKind::CcTest
        | TargetKind::CcSharedLibrary
        | TargetKind::CcImport
        | TargetKind::CcProtoLibrary => Some("@rules_cc//cc:defs.bzl"),
        TargetKind::ProtoLibrary => Some("@rules_proto//proto:defs.bzl"),
        TargetKind::CcGrpcLibrary => Some("@com_github_grpc_grpc//bazel:cc_grpc_library.bzl"),
        TargetKind::ShBinary => Some("@rules_shell//shell:sh_binary.bzl"),
        TargetKind::Genrule
        | TargetKind::GenruleOutput
        | TargetKind::ExportedFile
        | TargetKind::External
        | TargetKind::ManuallyGenerated => None,
    }
}

/// Symbols to load, grouped by file.
#[derive(Debug, Default)]
pub struct Loads {
    files: BTreeMap<&'static str, BTreeSet<&'static str>>,
}

impl Loads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: &'static str, symbol: &'static str) {
        self.files.entry(file).or_default().insert(symbol);
    }

    /// Record the rule `kind` renders as.
    pub fn add_kind(&mut self, kind: TargetKind) {
        if let Some(file) = load_file(kind) {
            self.add(file, kind.rule_name());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// One `load()` per file, ordered by file.
    pub fn render(&self) -> Vec<String> {
        let mut files: Vec<&&'static str> = self.files.keys().collect();
        files.sort_by(|a, b| label::compare_load_files(a, b));
        files
            .into_iter()
            .map(|file| {
                let symbols: Vec<String> = self.files[*file]
                    .iter()
                    .map(|s| format!("\"{}\"", s))
                    .collect();
                format!("load(\"{}\", {})", file, symbols.join(", "))
            })
            .collect()
    }
}
