//! Target definitions - what gets declared.
//!
//! A Target is one rule (or file reference) in a generated build file:
//! C/C++ libraries and binaries, genrules and their outputs, proto
//! libraries, import wrappers around pre-built artifacts, and plain files.

mod cc_import;
mod core;
pub mod label;
mod language;

use thiserror::Error;

pub use self::cc_import::CcImport;
pub use self::core::{
    CcAttrs, CcRule, Contribution, GenruleAttrs, ImportId, IncludeDir, Target, TargetDetails,
    TargetId, TargetKind,
};
pub use self::language::{is_header, is_source, Language};

/// Invariant violations detected on the target model.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("{target} ({kind}) cannot depend on {dep} ({dep_kind})")]
    IncompatibleDependency {
        target: String,
        kind: TargetKind,
        dep: String,
        dep_kind: TargetKind,
    },

    #[error("genrule `{rule}` has no output named `{output}`")]
    UnknownOutput { rule: String, output: String },
}
