//! Core data structures.
//!
//! - The build graph parsed from a ninja file (nodes and actions)
//! - The target model the generated build files are rendered from
//! - The registry owning the targets of one run

pub mod graph;
pub mod registry;
pub mod target;

pub use graph::{Action, ActionId, BuildGraph, FileNode, NodeId, NodeKind, Rule};
pub use registry::TargetRegistry;
pub use target::{Target, TargetId, TargetKind};
