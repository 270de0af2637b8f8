//! Implementation of `ninja2bazel generate`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::builder::{synthesize, BuildOptions};
use crate::core::registry::TargetRegistry;
use crate::imports::{load_descriptor, ImportIndex};
use crate::ninja::{NinjaParser, ParseOptions, ParsedNinja};
use crate::render::{render, BuildFiles};
use crate::util::diagnostic::Diagnostic;
use crate::util::fs::{ensure_dir, normalize_path, write_string, SourceTree};

/// Options for the translation.
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// The `build.ninja` file to translate.
    pub ninja_file: PathBuf,

    /// Root of the source tree build files are written into.
    pub root_dir: PathBuf,

    /// Directory (relative to the root) that generated outputs belong to.
    pub prefix: String,

    /// Build-graph name -> hand-written label.
    pub manually_generated: BTreeMap<String, String>,

    /// Package prefix remapping for source files.
    pub remap: BTreeMap<String, String>,

    /// Import descriptor files.
    pub import_files: Vec<PathBuf>,

    /// Outputs to translate (empty = inputs of `all`).
    pub targets: Vec<String>,

    /// Defines kept as `defines`.
    pub keep_defines: Vec<String>,

    /// Extra compiler flags to drop.
    pub drop_flags: Vec<String>,

    /// Directories the compiler searches on its own.
    pub system_includes: Vec<PathBuf>,
}

/// Result of a translation.
#[derive(Debug)]
pub struct Translation {
    /// Build file content per directory relative to the root.
    pub files: BuildFiles,

    /// Number of emitted targets.
    pub targets: usize,

    /// Aggregated report of includes that could not be resolved.
    pub unresolved: Option<Diagnostic>,
}

/// Translate a ninja build file into build files for the source tree.
pub fn translate(tree: &dyn SourceTree, opts: &TranslateOptions) -> Result<Translation> {
    let root_dir = normalize_path(&opts.root_dir);
    let prefix = opts.prefix.trim_matches('/').to_string();
    if !prefix.is_empty() && !tree.is_dir(&root_dir.join(&prefix)) {
        bail!(
            "prefix `{}` is not a directory under {}",
            prefix,
            root_dir.display()
        );
    }

    let mut registry = TargetRegistry::new();
    let mut imports = ImportIndex::new();
    for file in &opts.import_files {
        let path = if file.is_absolute() {
            normalize_path(file)
        } else {
            normalize_path(&root_dir.join(file))
        };
        let location = descriptor_location(&root_dir, &path)?;
        let decls = load_descriptor(&path)?;
        tracing::debug!("{} imports from {}", decls.len(), path.display());
        imports.register(&mut registry, decls, &location);
    }

    let parsed = parse(tree, opts, &root_dir, &prefix, &imports)?;
    let build_dir = match &parsed.workdir {
        Some(workdir) => PathBuf::from(workdir.trim_end_matches('/')),
        None => opts
            .ninja_file
            .parent()
            .map(normalize_path)
            .unwrap_or_default(),
    };

    let options = BuildOptions {
        root_dir: root_dir.clone(),
        build_dir,
        prefix,
        keep_defines: opts.keep_defines.clone(),
        drop_flags: opts.drop_flags.clone(),
        remap: opts.remap.clone(),
        system_includes: opts.system_includes.clone(),
    };
    let synthesis = synthesize(&parsed, tree, &imports, &mut registry, &options, &opts.targets)
        .context("failed to synthesize targets")?;

    let files = render(&registry).context("failed to render build files")?;
    let targets = registry.emitted().count();
    tracing::info!(
        "{} targets in {} build files",
        targets,
        files.len()
    );

    Ok(Translation {
        files,
        targets,
        unresolved: synthesis.unresolved_report(),
    })
}

/// Parse the ninja file with the translation's overrides.
pub(crate) fn parse(
    tree: &dyn SourceTree,
    opts: &TranslateOptions,
    root_dir: &Path,
    prefix: &str,
    imports: &ImportIndex,
) -> Result<ParsedNinja> {
    let mut parse_options = ParseOptions::new(root_dir.to_string_lossy(), prefix);
    parse_options.manually_generated = opts.manually_generated.clone();
    NinjaParser::new(tree, &parse_options, imports)
        .parse_file(&opts.ninja_file)
        .with_context(|| format!("failed to parse {}", opts.ninja_file.display()))
}

/// Directory a descriptor's imports render into.
fn descriptor_location(root_dir: &Path, path: &Path) -> Result<String> {
    let dir = path.parent().unwrap_or(Path::new(""));
    match dir.strip_prefix(root_dir) {
        Ok(relative) => Ok(relative.to_string_lossy().into_owned()),
        Err(_) => bail!(
            "import descriptor {} is outside of {}",
            path.display(),
            root_dir.display()
        ),
    }
}

/// Write each build file to `<root>/<dir>/<file_name>`.
///
/// Returns the written paths.
pub fn write_build_files(root: &Path, files: &BuildFiles, file_name: &str) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for (dir, content) in files {
        let dir_path = root.join(dir);
        ensure_dir(&dir_path)?;
        let path = dir_path.join(file_name);
        write_string(&path, content)?;
        tracing::debug!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}
