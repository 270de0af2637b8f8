//! ninja2bazel CLI - Translate CMake-generated ninja files into Bazel BUILD files

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("ninja2bazel=debug")
    } else {
        EnvFilter::new("ninja2bazel=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let color = !cli.no_color && std::io::stderr().is_terminal();

    // Execute command
    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, color),
        Commands::Graph(args) => commands::graph::execute(args),
        Commands::SystemIncludes(args) => commands::system_includes::execute(args),
    }
}
