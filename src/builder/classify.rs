//! Command classification.
//!
//! Each pattern is its own predicate over a resolved command line; the
//! classifier only fixes the order they are tried in.

use std::path::Path;

use crate::core::graph::Action;

/// Rule name CMake gives to `add_custom_command` edges.
pub const CUSTOM_COMMAND_RULE: &str = "CUSTOM_COMMAND";

/// Wrappers that run the real compiler as their first argument.
const LAUNCHERS: &[&str] = &["ccache", "sccache", "distcc", "icecc"];

/// What kind of target an action turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Compile one translation unit into an object file.
    Compile,
    /// Bundle object files into a static archive.
    Archive,
    /// Link an executable, or a shared object when `shared` is set.
    Link { shared: bool },
    /// Run protoc.
    Protoc,
    /// CMake housekeeping (`cmake -E ...`); contributes nothing.
    CmakeUtility,
    /// Any other custom command.
    Custom,
    /// Nothing we know how to express.
    Unknown,
}

/// Classify an action whose command resolved to `command`.
pub fn classify(action: &Action, command: &str) -> CommandKind {
    let custom = action.rule.name == CUSTOM_COMMAND_RULE;
    if !custom {
        if is_compile_command(command) {
            return CommandKind::Compile;
        }
        if is_archive_command(command) {
            return CommandKind::Archive;
        }
        if is_cpp_command(command) {
            return CommandKind::Link {
                shared: action.var("SONAME").is_some_and(|s| !s.is_empty()),
            };
        }
    }
    if is_protoc_command(command) {
        return CommandKind::Protoc;
    }
    if is_cmake_utility(command) {
        return CommandKind::CmakeUtility;
    }
    if custom {
        return CommandKind::Custom;
    }
    CommandKind::Unknown
}

/// File name of the tool a command runs, launchers skipped.
pub fn tool_name(command: &str) -> Option<&str> {
    command
        .split_whitespace()
        .map(|token| {
            Path::new(token)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(token)
        })
        .find(|name| !LAUNCHERS.contains(name))
}

/// Whether the command runs a C or C++ compiler driver.
pub fn is_cpp_command(command: &str) -> bool {
    let Some(tool) = tool_name(command) else {
        return false;
    };
    if tool.starts_with("clang-") && !tool[6..].starts_with(|c: char| c.is_ascii_digit()) {
        // clang-tidy, clang-format
        return false;
    }
    tool == "cc"
        || tool.contains("clang")
        || tool.contains("gcc")
        || tool.contains("g++")
        || tool.contains("c++")
}

/// Whether the command compiles without linking.
pub fn is_compile_command(command: &str) -> bool {
    is_cpp_command(command) && command.split_whitespace().any(|t| t == "-c")
}

/// Whether the command builds a static archive.
pub fn is_archive_command(command: &str) -> bool {
    matches!(tool_name(command), Some(tool) if tool == "ar" || tool.ends_with("-ar"))
}

/// Whether the command runs the protobuf compiler.
pub fn is_protoc_command(command: &str) -> bool {
    command.split_whitespace().any(|token| {
        Path::new(token)
            .file_name()
            .is_some_and(|name| name == "protoc")
    })
}

/// Whether the command is CMake's portable shell (`cmake -E ...`).
pub fn is_cmake_utility(command: &str) -> bool {
    let mut tokens = command.split_whitespace();
    let is_cmake = tokens
        .next()
        .and_then(|t| Path::new(t).file_name())
        .is_some_and(|name| name == "cmake");
    is_cmake && tokens.next() == Some("-E")
}
