//! Ninja front end.
//!
//! Reads `build.ninja` files as written by CMake into a
//! [`BuildGraph`](crate::core::graph::BuildGraph):
//!
//! - [`lexer`]: comments, continuations, tokens
//! - [`scope`]: variable scopes, rule lookup and `$` expansion
//! - [`parser`]: statements, path classification, alias handling

mod errors;
pub mod lexer;
pub mod parser;
pub mod scope;

pub use errors::ParseError;
pub use parser::{NinjaParser, ParseOptions, ParsedNinja};
pub use scope::evaluate;

/// Phony targets CMake always generates that are never worth translating.
pub const IGNORED_TARGETS: &[&str] = &[
    "edit_cache",
    "rebuild_cache",
    "clean",
    "help",
    "install",
    "build.ninja",
    "list_install_components",
    "install/local",
    "install/strip",
];
