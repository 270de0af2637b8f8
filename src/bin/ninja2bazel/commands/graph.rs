//! `ninja2bazel graph` command

use anyhow::Result;

use crate::cli::GraphArgs;
use ninja2bazel::ops::{print_graph, TranslateOptions};
use ninja2bazel::util::config::{global_config_path, load_config, project_config_path};
use ninja2bazel::util::DiskTree;

pub fn execute(args: GraphArgs) -> Result<()> {
    let config = load_config(
        global_config_path().as_deref(),
        &project_config_path(&args.rootdir),
    );

    let targets = if args.target.is_empty() {
        config.translate.targets
    } else {
        args.target
    };

    let opts = TranslateOptions {
        ninja_file: std::path::absolute(&args.ninja_file)?,
        root_dir: std::path::absolute(&args.rootdir)?,
        prefix: config.translate.prefix.unwrap_or_default(),
        manually_generated: config.translate.manually_generated,
        targets,
        ..TranslateOptions::default()
    };

    print!("{}", print_graph(&DiskTree, &opts, args.depth)?);
    Ok(())
}
