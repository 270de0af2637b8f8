//! Implementation of `ninja2bazel graph`.

use std::collections::HashSet;

use anyhow::Result;

use crate::builder::top_level_outputs;
use crate::core::graph::{BuildGraph, NodeId};
use crate::imports::ImportIndex;
use crate::ops::translate::{parse, TranslateOptions};
use crate::util::fs::{normalize_path, SourceTree};

/// Render the dependency tree of the top-level outputs.
///
/// Every node shows the rule producing it; nodes already printed are marked
/// with `(*)` and not expanded again.
pub fn print_graph(
    tree: &dyn SourceTree,
    opts: &TranslateOptions,
    max_depth: Option<usize>,
) -> Result<String> {
    let root_dir = normalize_path(&opts.root_dir);
    let prefix = opts.prefix.trim_matches('/');
    let parsed = parse(tree, opts, &root_dir, prefix, &ImportIndex::new())?;
    let top_level = top_level_outputs(&parsed.graph, &opts.targets)?;

    let mut out = String::new();
    let mut seen = HashSet::new();
    for node in top_level {
        format_node(
            &parsed.graph,
            node,
            0,
            max_depth.unwrap_or(usize::MAX),
            &mut seen,
            &mut out,
        );
    }
    Ok(out)
}

fn format_node(
    graph: &BuildGraph,
    id: NodeId,
    depth: usize,
    max_depth: usize,
    seen: &mut HashSet<NodeId>,
    out: &mut String,
) {
    if depth > max_depth {
        return;
    }
    let id = graph.resolve(id);
    let node = graph.node(id);
    let is_duplicate = !seen.insert(id);

    let prefix = if depth == 0 {
        String::new()
    } else {
        format!("{}├── ", "│   ".repeat(depth - 1))
    };
    let rule = node
        .producer
        .map(|aid| format!(" [{}]", graph.action(aid).rule.name))
        .unwrap_or_default();
    let dup_marker = if is_duplicate { " (*)" } else { "" };
    out.push_str(&format!("{}{}{}{}\n", prefix, node.short_name, rule, dup_marker));

    if is_duplicate {
        return;
    }
    let Some(aid) = node.producer else {
        return;
    };
    let action = graph.action(aid);
    for &child in action.inputs.iter().chain(&action.depends) {
        format_node(graph, child, depth + 1, max_depth, seen, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures;
    use std::path::PathBuf;

    #[test]
    fn test_print_graph() {
        let tree = fixtures::library_tree().with_file("/build/build.ninja", fixtures::LIBRARY_AND_BINARY);
        let opts = TranslateOptions {
            ninja_file: PathBuf::from("/build/build.ninja"),
            root_dir: PathBuf::from(fixtures::ROOT_DIR),
            targets: vec!["xar/liblogging.a".to_string()],
            ..TranslateOptions::default()
        };
        let out = print_graph(&tree, &opts, None).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "xar/liblogging.a [CXX_STATIC_LIBRARY_LINKER]");
        assert_eq!(lines[1], "├── xar/CMakeFiles/logging.dir/Logging.cpp.o [CXX_COMPILER]");
        assert!(lines[2].starts_with("│   ├── "));
        assert!(lines[2].ends_with("xar/Logging.cpp"));
    }

    #[test]
    fn test_print_graph_depth_limit() {
        let tree = fixtures::library_tree().with_file("/build/build.ninja", fixtures::LIBRARY_AND_BINARY);
        let opts = TranslateOptions {
            ninja_file: PathBuf::from("/build/build.ninja"),
            root_dir: PathBuf::from(fixtures::ROOT_DIR),
            targets: vec!["xar/liblogging.a".to_string()],
            ..TranslateOptions::default()
        };
        let out = print_graph(&tree, &opts, Some(0)).unwrap();
        assert_eq!(out.lines().count(), 1);
    }
}
