//! ninja2bazel - translate CMake-generated ninja build files into Bazel
//!
//! This crate provides the core library functionality for ninja2bazel:
//! parsing `build.ninja`, resolving includes, synthesizing targets and
//! rendering `BUILD.bazel` files.

pub mod builder;
pub mod core;
pub mod imports;
pub mod includes;
pub mod ninja;
pub mod ops;
pub mod render;
pub mod util;

/// Test utilities for ninja2bazel unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides an in-memory source tree and build file
/// fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{BuildGraph, Target, TargetKind, TargetRegistry};
pub use ops::{translate, TranslateOptions, Translation};
