//! High-level operations.
//!
//! This module contains the implementation of ninja2bazel commands.

pub mod graph;
pub mod translate;

pub use graph::print_graph;
pub use translate::{translate, write_build_files, TranslateOptions, Translation};
