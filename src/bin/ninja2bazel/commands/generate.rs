//! `ninja2bazel generate` command

use anyhow::Result;

use crate::cli::GenerateArgs;
use ninja2bazel::builder::BuildError;
use ninja2bazel::ops::{translate, write_build_files, TranslateOptions};
use ninja2bazel::util::config::{global_config_path, load_config, project_config_path};
use ninja2bazel::util::diagnostic::emit;
use ninja2bazel::util::process::compiler_include_dirs;
use ninja2bazel::util::DiskTree;

pub fn execute(args: GenerateArgs, color: bool) -> Result<()> {
    let root_dir = std::path::absolute(&args.rootdir)?;

    // Load configuration (global + project)
    let config = load_config(global_config_path().as_deref(), &project_config_path(&root_dir));
    let translate_config = config.translate;

    // CLI overrides config; maps and lists add to it
    let prefix = args
        .prefix
        .or(translate_config.prefix)
        .unwrap_or_default();

    let mut manually_generated = translate_config.manually_generated;
    manually_generated.extend(args.manually_generated);

    let mut remap = translate_config.remap;
    remap.extend(args.remap);

    let mut keep_defines = translate_config.keep_defines;
    keep_defines.extend(args.keep_define);

    let mut drop_flags = translate_config.drop_flags;
    drop_flags.extend(args.drop_flag);

    let targets = if args.target.is_empty() {
        translate_config.targets
    } else {
        args.target
    };

    let mut import_files = config.imports.files;
    import_files.extend(args.imports);

    // System include directories: compiler query plus configured extras
    let mut system_includes = Vec::new();
    if !args.no_system_includes && config.compiler.query_system_includes() {
        let compiler = args
            .compiler
            .unwrap_or_else(|| config.compiler.path().to_string());
        match compiler_include_dirs(&compiler) {
            Ok(dirs) => system_includes.extend(dirs),
            Err(e) => tracing::warn!("could not query system includes: {:#}", e),
        }
    }
    system_includes.extend(config.compiler.extra_system_includes);

    let opts = TranslateOptions {
        ninja_file: std::path::absolute(&args.ninja_file)?,
        root_dir: root_dir.clone(),
        prefix,
        manually_generated,
        remap,
        import_files,
        targets,
        keep_defines,
        drop_flags,
        system_includes,
    };

    let translation = match translate(&DiskTree, &opts) {
        Ok(translation) => translation,
        Err(e) => {
            if let Some(build_error) = e.downcast_ref::<BuildError>() {
                emit(&build_error.to_diagnostic(), color);
            }
            return Err(e);
        }
    };

    if let Some(report) = &translation.unresolved {
        emit(report, color);
    }

    let file_name = config.output.file_name();
    if args.dry_run {
        for (dir, content) in &translation.files {
            let path = if dir.is_empty() {
                file_name.to_string()
            } else {
                format!("{}/{}", dir, file_name)
            };
            println!("# {}", path);
            print!("{}", content);
            println!();
        }
        return Ok(());
    }

    let written = write_build_files(&root_dir, &translation.files, file_name)?;
    eprintln!(
        "    Finished {} targets in {} build files",
        translation.targets,
        written.len()
    );

    Ok(())
}
