//! Target synthesis.
//!
//! This module turns a parsed build graph into targets: it walks the graph
//! from the top-level outputs, classifies every action by the command it
//! runs and records the resulting libraries, binaries, genrules and proto
//! rules in a [`TargetRegistry`].

pub mod classify;
pub mod command;
mod errors;
pub mod flags;
pub mod naming;
mod visitor;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::registry::TargetRegistry;
use crate::imports::ImportIndex;
use crate::includes::GeneratedFiles;
use crate::ninja::ParsedNinja;
use crate::util::fs::SourceTree;

pub use classify::{classify, CommandKind};
pub use command::{core_command, CoreCommand};
pub use errors::BuildError;
pub use flags::{CompileFlags, FlagFilter};
pub use naming::{ProtoNames, Remap};
pub use visitor::{top_level_outputs, BuildVisitor, Synthesis, PROTOBUF_REPOSITORY};

/// Settings of one synthesis run.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Root of the source tree.
    pub root_dir: PathBuf,
    /// Directory the build file lives in.
    pub build_dir: PathBuf,
    /// Package prefix of everything generated in the build dir.
    pub prefix: String,
    /// Defines rendered as `defines` instead of `-D` copts.
    pub keep_defines: Vec<String>,
    /// Compiler flag prefixes to drop.
    pub drop_flags: Vec<String>,
    /// Package prefix -> replacement, for source files.
    pub remap: BTreeMap<String, String>,
    /// Directories the compiler searches on its own.
    pub system_includes: Vec<PathBuf>,
}

/// Populate `registry` from a parsed build file.
///
/// Fails when the graph references files that neither exist nor are
/// produced, when the requested outputs do not exist, or when a top-level
/// output is built by a command that cannot be classified.
pub fn synthesize(
    parsed: &ParsedNinja,
    tree: &dyn SourceTree,
    imports: &ImportIndex,
    registry: &mut TargetRegistry,
    options: &BuildOptions,
    requested: &[String],
) -> Result<Synthesis, BuildError> {
    if !parsed.missing.is_empty() {
        return Err(BuildError::MissingDependencies {
            missing: parsed.missing.iter().cloned().collect(),
        });
    }
    let top_level = top_level_outputs(&parsed.graph, requested)?;
    tracing::info!("translating {} top-level outputs", top_level.len());

    let generated = GeneratedFiles::from_graph(&parsed.graph, Some(&options.build_dir));
    BuildVisitor::new(&parsed.graph, tree, imports, &generated, registry, options).run(top_level)
}
