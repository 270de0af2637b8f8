//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// ninja2bazel - Translate CMake-generated ninja files into Bazel BUILD files
#[derive(Parser)]
#[command(name = "ninja2bazel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate BUILD files from a ninja build file
    Generate(GenerateArgs),

    /// Print the dependency tree of the top-level outputs
    Graph(GraphArgs),

    /// Print the include directories the compiler searches by default
    SystemIncludes(SystemIncludesArgs),
}

#[derive(Args)]
pub struct GenerateArgs {
    /// The build.ninja file to translate
    pub ninja_file: PathBuf,

    /// Root of the source tree
    pub rootdir: PathBuf,

    /// Replace a build-graph file with a hand-written label (NAME=//pkg:target)
    #[arg(short = 'm', long = "manually-generated", value_parser = parse_key_value)]
    pub manually_generated: Vec<(String, String)>,

    /// Move source packages under another package (FROM=TO)
    #[arg(long, value_parser = parse_key_value)]
    pub remap: Vec<(String, String)>,

    /// Directory under the root that generated outputs belong to
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// cc_import descriptor files
    #[arg(long = "imports")]
    pub imports: Vec<PathBuf>,

    /// Outputs to translate (defaults to the inputs of `all`)
    #[arg(long)]
    pub target: Vec<String>,

    /// Defines rendered as `defines` instead of copts
    #[arg(long = "keep-define")]
    pub keep_define: Vec<String>,

    /// Additional compiler flags to drop
    #[arg(long = "drop-flag", allow_hyphen_values = true)]
    pub drop_flag: Vec<String>,

    /// Compiler queried for system include directories
    #[arg(long, env = "NINJA2BAZEL_COMPILER")]
    pub compiler: Option<String>,

    /// Do not query the compiler for system include directories
    #[arg(long)]
    pub no_system_includes: bool,

    /// Print the generated files instead of writing them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct GraphArgs {
    /// The build.ninja file to inspect
    pub ninja_file: PathBuf,

    /// Root of the source tree
    pub rootdir: PathBuf,

    /// Outputs to print (defaults to the inputs of `all`)
    #[arg(long)]
    pub target: Vec<String>,

    /// Maximum depth to display
    #[arg(short, long)]
    pub depth: Option<usize>,
}

#[derive(Args)]
pub struct SystemIncludesArgs {
    /// Compiler to query
    #[arg(long, env = "NINJA2BAZEL_COMPILER")]
    pub compiler: Option<String>,
}

/// Parse a `KEY=VALUE` argument.
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok((key.to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{}`", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("gen/version.h=//tools:version_h").unwrap(),
            ("gen/version.h".to_string(), "//tools:version_h".to_string())
        );
        assert!(parse_key_value("gen/version.h").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_generate_args() {
        let cli = Cli::try_parse_from([
            "ninja2bazel",
            "generate",
            "build/build.ninja",
            ".",
            "-m",
            "a.h=//x:a",
            "--remap",
            "third=//vendor",
            "--drop-flag",
            "-fno-rtti",
            "--dry-run",
        ])
        .unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.manually_generated, vec![("a.h".to_string(), "//x:a".to_string())]);
        assert_eq!(args.drop_flag, vec!["-fno-rtti"]);
        assert!(args.dry_run);

        assert!(Cli::try_parse_from(["ninja2bazel", "generate", "b.ninja", ".", "-m", "broken"]).is_err());
    }
}
