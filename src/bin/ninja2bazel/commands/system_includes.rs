//! `ninja2bazel system-includes` command

use anyhow::Result;

use crate::cli::SystemIncludesArgs;
use ninja2bazel::util::config::{global_config_path, Config};
use ninja2bazel::util::process::compiler_include_dirs;

pub fn execute(args: SystemIncludesArgs) -> Result<()> {
    let config = global_config_path()
        .map(|path| Config::load_or_default(&path))
        .unwrap_or_default();
    let compiler = args
        .compiler
        .unwrap_or_else(|| config.compiler.path().to_string());

    for dir in compiler_include_dirs(&compiler)? {
        println!("{}", dir.display());
    }
    Ok(())
}
