//! Command implementations

pub mod generate;
pub mod graph;
pub mod system_includes;
