//! Parse error types.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::core::graph::GraphError;

/// A build file the parser cannot make sense of. Always fatal.
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("{}:{line}: unknown rule `{rule}`", file.display())]
    #[diagnostic(
        code(ninja::unknown_rule),
        help("rules must be declared before the build statements using them")
    )]
    UnknownRule {
        file: PathBuf,
        line: usize,
        rule: String,
    },

    #[error("{}:{line}: rule `{rule}` has no command", file.display())]
    #[diagnostic(code(ninja::missing_command))]
    MissingCommand {
        file: PathBuf,
        line: usize,
        rule: String,
    },

    #[error("{}:{line}: malformed build statement: {reason}", file.display())]
    #[diagnostic(
        code(ninja::malformed_build),
        help("expected `build <outputs>: <rule> <inputs> [| <implicit>] [|| <order-only>]`")
    )]
    MalformedBuild {
        file: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{}:{line}: cannot parse `{text}`", file.display())]
    #[diagnostic(code(ninja::malformed_line))]
    MalformedLine {
        file: PathBuf,
        line: usize,
        text: String,
    },

    #[error("cannot read {}: {message}", path.display())]
    #[diagnostic(code(ninja::unreadable))]
    Unreadable { path: PathBuf, message: String },

    #[error(transparent)]
    #[diagnostic(code(ninja::graph))]
    Graph(#[from] GraphError),
}
