//! Ninja build file parser.
//!
//! Turns the text of a `build.ninja` (and the files it includes) into a
//! [`BuildGraph`]. Besides the plain ninja semantics the parser classifies
//! every referenced path: files of the source or build tree, artifacts from
//! outside both trees (possibly provided by an import descriptor), names
//! replaced by hand-written labels, and names nothing produces yet.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;

use super::errors::ParseError;
use super::lexer::{logical_lines, split_binding, split_tokens, strip_unescaped_colon, Line};
use super::scope::{expand, ScopeStack};
use crate::core::graph::{Action, BuildGraph, FileNode, NodeId, NodeKind, Rule};
use crate::imports::ImportIndex;
use crate::util::fs::{normalize_path, strip_dir_prefix, SourceTree};

/// Top-level statements the translation has no use for.
const IGNORED_STANZAS: &[&str] = &["ninja_required_version", "default"];

/// Runtime libraries the proto rules bring on their own.
static PROTO_RUNTIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*/lib(grpc|protobuf)(\.|\+).*").expect("valid regex"));
static ARES_RUNTIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*ares\.").expect("valid regex"));

/// Inputs of a parse that do not come from the build file itself.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Root of the source tree. Stored with a trailing `/`.
    pub root_dir: String,
    /// Output-directory prefix given to everything generated in the build dir.
    pub prefix: String,
    /// Build-graph name -> hand-written label (`//pkg:target`).
    pub manually_generated: BTreeMap<String, String>,
}

impl ParseOptions {
    pub fn new(root_dir: impl Into<String>, prefix: impl Into<String>) -> Self {
        let mut root_dir = root_dir.into();
        if !root_dir.ends_with('/') {
            root_dir.push('/');
        }
        ParseOptions {
            root_dir,
            prefix: prefix.into(),
            manually_generated: BTreeMap::new(),
        }
    }
}

/// Result of parsing a build file.
#[derive(Debug)]
pub struct ParsedNinja {
    pub graph: BuildGraph,
    /// Names still referenced but neither on disk nor produced.
    pub missing: BTreeSet<String>,
    /// Build directory recorded by CMake (with a trailing `/`), if any.
    pub workdir: Option<String>,
}

/// Streaming parser over one top-level build file and its includes.
pub struct NinjaParser<'a> {
    tree: &'a dyn SourceTree,
    options: &'a ParseOptions,
    imports: &'a ImportIndex,
    graph: BuildGraph,
    scopes: ScopeStack,
    missing: BTreeMap<String, NodeId>,
    /// Directory of the top-level file; relative paths are looked up there.
    base_dir: PathBuf,
    /// Files being parsed, innermost last.
    files: Vec<PathBuf>,
}

impl<'a> NinjaParser<'a> {
    pub fn new(
        tree: &'a dyn SourceTree,
        options: &'a ParseOptions,
        imports: &'a ImportIndex,
    ) -> Self {
        NinjaParser {
            tree,
            options,
            imports,
            graph: BuildGraph::new(),
            scopes: ScopeStack::new(),
            missing: BTreeMap::new(),
            base_dir: PathBuf::new(),
            files: Vec::new(),
        }
    }

    /// Parse the build file at `path` and everything it includes.
    pub fn parse_file(mut self, path: &Path) -> Result<ParsedNinja, ParseError> {
        self.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.parse_included(path)?;
        self.finish()
    }

    /// Parse build file content as if it lived at `path`.
    pub fn parse_str(mut self, content: &str, path: &Path) -> Result<ParsedNinja, ParseError> {
        self.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.files.push(path.to_path_buf());
        self.parse_content(content)?;
        self.files.pop();
        self.finish()
    }

    fn finish(mut self) -> Result<ParsedNinja, ParseError> {
        self.graph.resolve_aliases();
        if let Some(all) = self.graph.output("all") {
            self.graph.prune_transitive_phony(all);
        }
        self.graph.check_single_writer()?;

        let missing: BTreeSet<String> = self
            .missing
            .into_keys()
            .filter(|name| !name.ends_with(".dir"))
            .collect();
        let workdir = self.scopes.lookup("cmake_ninja_workdir").map(with_slash);

        tracing::debug!(
            "parsed {} nodes and {} build statements",
            self.graph.node_count(),
            self.graph.action_count()
        );
        Ok(ParsedNinja {
            graph: self.graph,
            missing,
            workdir,
        })
    }

    fn current_file(&self) -> PathBuf {
        self.files.last().cloned().unwrap_or_default()
    }

    fn parse_included(&mut self, path: &Path) -> Result<(), ParseError> {
        let content = self
            .tree
            .read_to_string(path)
            .map_err(|e| ParseError::Unreadable {
                path: path.to_path_buf(),
                message: format!("{:#}", e),
            })?;
        tracing::debug!("parsing {}", path.display());
        self.files.push(path.to_path_buf());
        let result = self.parse_content(&content);
        self.files.pop();
        result
    }

    fn parse_content(&mut self, content: &str) -> Result<(), ParseError> {
        let lines = logical_lines(content);
        let mut index = 0;

        while index < lines.len() {
            let line = &lines[index];
            index += 1;

            let block_end = index
                + lines[index..]
                    .iter()
                    .take_while(|l| l.indented)
                    .count();
            let block = &lines[index..block_end];

            if line.indented {
                return Err(self.malformed(line));
            }

            let tokens = split_tokens(&line.text);
            let Some(keyword) = tokens.first().map(String::as_str) else {
                continue;
            };

            match keyword {
                "rule" => {
                    self.handle_rule(line, &tokens, block)?;
                    index = block_end;
                }
                "build" => {
                    let bindings = self.bindings(block)?;
                    self.handle_build(line, &tokens[1..], bindings)?;
                    index = block_end;
                }
                "pool" => {
                    index = block_end;
                }
                "include" | "subninja" => {
                    let Some(raw) = tokens.get(1) else {
                        return Err(self.malformed(line));
                    };
                    let target = expand(raw, |n| self.scopes.lookup(n).map(str::to_string), &[]);
                    let dir = self
                        .current_file()
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    let path = dir.join(target);
                    if keyword == "subninja" {
                        self.scopes.push();
                        let result = self.parse_included(&path);
                        self.scopes.pop();
                        result?;
                    } else {
                        self.parse_included(&path)?;
                    }
                }
                k if IGNORED_STANZAS.contains(&k) => {}
                _ => match split_binding(&line.text) {
                    Some((name, value)) => self.scopes.set(name, value),
                    None => return Err(self.malformed(line)),
                },
            }
        }
        Ok(())
    }

    fn malformed(&self, line: &Line) -> ParseError {
        ParseError::MalformedLine {
            file: self.current_file(),
            line: line.number,
            text: line.text.clone(),
        }
    }

    fn bindings(&self, block: &[Line]) -> Result<Vec<(String, String)>, ParseError> {
        block
            .iter()
            .map(|l| {
                split_binding(&l.text)
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| self.malformed(l))
            })
            .collect()
    }

    fn handle_rule(&mut self, line: &Line, tokens: &[String], block: &[Line]) -> Result<(), ParseError> {
        let Some(name) = tokens.get(1) else {
            return Err(self.malformed(line));
        };
        let mut rule = Rule::new(name.clone());
        for (k, v) in self.bindings(block)? {
            rule.vars.insert(k, v);
        }
        if rule.command().is_none() {
            return Err(ParseError::MissingCommand {
                file: self.current_file(),
                line: line.number,
                rule: name.clone(),
            });
        }
        self.scopes.add_rule(rule);
        Ok(())
    }

    fn malformed_build(&self, line: &Line, reason: &str) -> ParseError {
        ParseError::MalformedBuild {
            file: self.current_file(),
            line: line.number,
            reason: reason.to_string(),
        }
    }

    fn handle_build(
        &mut self,
        line: &Line,
        tokens: &[String],
        bindings: Vec<(String, String)>,
    ) -> Result<(), ParseError> {
        let mut edge_vars: BTreeMap<String, String> = BTreeMap::new();
        for (name, raw) in bindings {
            let value = expand(
                &raw,
                |n| {
                    edge_vars
                        .get(n)
                        .cloned()
                        .or_else(|| self.scopes.lookup(n).map(str::to_string))
                },
                &[],
            );
            edge_vars.insert(name, value);
        }
        let resolve = |raw: &str| {
            expand(
                raw,
                |n| {
                    edge_vars
                        .get(n)
                        .cloned()
                        .or_else(|| self.scopes.lookup(n).map(str::to_string))
                },
                &[],
            )
        };

        // Outputs, up to the token carrying the colon.
        let mut raw_outputs: Vec<(String, bool)> = Vec::new();
        let mut implicit = false;
        let mut rest = None;
        for (i, token) in tokens.iter().enumerate() {
            if token == "|" {
                implicit = true;
                continue;
            }
            if token == ":" {
                rest = Some(i + 1);
                break;
            }
            if let Some(body) = strip_unescaped_colon(token) {
                if !body.is_empty() {
                    raw_outputs.push((resolve(body), implicit));
                }
                rest = Some(i + 1);
                break;
            }
            raw_outputs.push((resolve(token), implicit));
        }
        let Some(rest) = rest else {
            return Err(self.malformed_build(line, "missing `:`"));
        };
        if raw_outputs.is_empty() {
            return Err(self.malformed_build(line, "no outputs"));
        }
        let Some(rule_name) = tokens.get(rest) else {
            return Err(self.malformed_build(line, "missing rule name"));
        };
        let Some(rule) = self.scopes.rule(rule_name) else {
            return Err(ParseError::UnknownRule {
                file: self.current_file(),
                line: line.number,
                rule: rule_name.clone(),
            });
        };

        let mut raw_inputs = Vec::new();
        let mut raw_depends = Vec::new();
        let mut raw_order_only = Vec::new();
        let mut section = 0;
        for token in &tokens[rest + 1..] {
            match token.as_str() {
                "|" => section = 1,
                "||" => section = 2,
                "|@" => section = 3,
                _ => {
                    let value = resolve(token);
                    match section {
                        0 => raw_inputs.push(value),
                        1 => raw_depends.push(value),
                        2 => raw_order_only.push(value),
                        _ => {}
                    }
                }
            }
        }

        let workdir = self
            .scopes
            .lookup("cmake_ninja_workdir")
            .map(with_slash)
            .unwrap_or_default();

        if rule.name == crate::core::graph::PHONY && raw_inputs.is_empty() {
            raw_depends.retain(|d| !self.tree.is_dir(&self.on_disk_path(d)));
        }

        if let Some(libs) = edge_vars.get("LINK_LIBRARIES") {
            for lib in libs.split_whitespace() {
                if (lib.ends_with(".a") || lib.ends_with(".so")) && !lib.starts_with('/') {
                    raw_depends.push(lib.to_string());
                }
            }
        }

        let mut inputs = Vec::with_capacity(raw_inputs.len());
        for name in &raw_inputs {
            let id = self.input_node(name, &workdir);
            if !inputs.contains(&id) {
                inputs.push(id);
            }
        }

        let mut depends = Vec::new();
        for name in &raw_depends {
            if PROTO_RUNTIME.is_match(name) || ARES_RUNTIME.is_match(name) {
                continue;
            }
            let id = self.depend_node(name, &workdir);
            if !depends.contains(&id) {
                depends.push(id);
            }
        }

        let order_only: Vec<NodeId> = raw_order_only
            .iter()
            .map(|name| self.node(name, &workdir))
            .collect();

        let mut outputs = Vec::with_capacity(raw_outputs.len());
        for (name, implicit) in &raw_outputs {
            let id = self.node(name, &workdir);
            if self.missing.remove(name).is_some() {
                tracing::debug!("{} is produced after being referenced", name);
            }
            let node = self.graph.node_mut(id);
            node.implicit = *implicit;
            if matches!(node.kind, NodeKind::Other | NodeKind::Unknown) {
                node.kind = NodeKind::Known;
            }
            self.graph.register_output(name.clone(), id);
            if !outputs.contains(&id) {
                outputs.push(id);
            }
        }

        // The same output spelled relative and absolute: keep the absolute one.
        if !workdir.is_empty() {
            for &id in &outputs {
                let name = self.graph.node(id).name.clone();
                let full = format!("{}{}", workdir, name);
                if let Some(&other) = outputs
                    .iter()
                    .find(|&&o| o != id && self.graph.node(o).name == full)
                {
                    tracing::debug!("{} is an alias of {}", name, full);
                    self.graph.node_mut(id).alias = Some(other);
                    self.graph.register_output(name, other);
                }
            }
        }

        if rule.name == crate::core::graph::PHONY
            && outputs.len() == 1
            && inputs.len() == 1
            && depends.is_empty()
            && inputs[0] != outputs[0]
        {
            self.graph.node_mut(outputs[0]).alias = Some(inputs[0]);
        }

        let mut vars = self.scopes.flatten();
        vars.extend(edge_vars.clone());

        let mut action = Action::new(Rc::clone(&rule));
        action.outputs = outputs;
        action.inputs = inputs;
        action.depends = depends;
        action.order_only = order_only;
        action.vars = vars;
        self.graph.add_action(action)?;
        Ok(())
    }

    /// Where a build-file path lives on disk.
    fn on_disk_path(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Split a name into its short form and the output-directory prefix.
    fn short_name(&self, name: &str, workdir: &str) -> (String, Option<String>) {
        if let Some(rest) = name.strip_prefix(self.options.root_dir.as_str()) {
            return (rest.to_string(), None);
        }
        if let Some(rest) = strip_dir_prefix(name, workdir) {
            return (rest.to_string(), Some(self.options.prefix.clone()));
        }
        if !self.options.prefix.is_empty() && !name.starts_with('/') {
            return (name.to_string(), Some(self.options.prefix.clone()));
        }
        (name.to_string(), None)
    }

    fn node(&mut self, name: &str, workdir: &str) -> NodeId {
        let (short, location) = self.short_name(name, workdir);
        self.graph
            .intern_with(name, || FileNode::new(name, short).with_location(location))
    }

    fn manual_node(&mut self, name: &str) -> Option<NodeId> {
        let label = self.options.manually_generated.get(name)?.clone();
        tracing::info!("replacing {} with {}", name, label);
        let id = self
            .graph
            .intern_with(&label, || FileNode::new(label.as_str(), label.as_str()));
        self.graph.node_mut(id).kind = NodeKind::ManuallyGenerated;
        Some(id)
    }

    fn input_node(&mut self, name: &str, workdir: &str) -> NodeId {
        let path = self.on_disk_path(name);
        if self.tree.exists(&path) {
            let real = normalize_path(&path);
            let real = real.to_string_lossy();
            let in_tree = !name.starts_with('/')
                || (!workdir.is_empty() && real.starts_with(workdir))
                || real.starts_with(self.options.root_dir.as_str());
            if in_tree {
                let id = self.node(name, workdir);
                self.graph.node_mut(id).mark_file();
                return id;
            }
            if let Some(id) = self.manual_node(name) {
                return id;
            }
            return self.external_node(name, workdir);
        }

        if let Some(id) = self.graph.output(name) {
            return id;
        }
        if let Some(stripped) = strip_dir_prefix(name, workdir) {
            if let Some(id) = self.graph.output(stripped) {
                return id;
            }
        }
        if let Some(id) = self.manual_node(name) {
            return id;
        }
        let id = self.node(name, workdir);
        self.graph.node_mut(id).kind = NodeKind::Unknown;
        self.missing.insert(name.to_string(), id);
        id
    }

    fn external_node(&mut self, name: &str, workdir: &str) -> NodeId {
        let id = self.node(name, workdir);
        let import = self.imports.library(name);
        let node = self.graph.node_mut(id);
        if node.kind != NodeKind::External {
            match import {
                Some(_) => tracing::debug!("{} is provided by an import", name),
                None if name.ends_with("CMakeLists.txt") || name.ends_with(".cmake") => {}
                None => tracing::debug!("marking {} as external", name),
            }
        }
        node.kind = NodeKind::External;
        node.import = import;
        id
    }

    fn depend_node(&mut self, name: &str, workdir: &str) -> NodeId {
        if let Some(id) = self.graph.output(name) {
            return id;
        }
        if name.starts_with('/') || name.ends_with("CMakeLists.txt") || name.ends_with(".cmake") {
            return self.external_node(name, workdir);
        }
        let id = self.node(name, workdir);
        if self.tree.is_file(&self.on_disk_path(name)) {
            self.graph.node_mut(id).mark_file();
            return id;
        }
        let node = self.graph.node_mut(id);
        if node.kind != NodeKind::Known {
            node.kind = NodeKind::Unknown;
            self.missing.insert(name.to_string(), id);
        }
        id
    }
}

fn with_slash(dir: &str) -> String {
    if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{}/", dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockSourceTree;

    const SIMPLE: &str = r#"
cmake_ninja_workdir = /build/

rule CXX_COMPILER
  command = clang++ $DEFINES $FLAGS -c $in -o $out
  description = Building CXX object $out

rule CXX_STATIC_LIBRARY_LINKER
  command = /usr/bin/ar qc $TARGET_FILE $LINK_FLAGS $in

build xar/CMakeFiles/logging.dir/Logging.cpp.o: CXX_COMPILER /src/xar/Logging.cpp
  FLAGS = -O2 -Wall
  INCLUDES = -I/src

build xar/liblogging.a: CXX_STATIC_LIBRARY_LINKER xar/CMakeFiles/logging.dir/Logging.cpp.o
  TARGET_FILE = xar/liblogging.a

build logging: phony xar/liblogging.a
build all: phony logging
"#;

    fn parse(tree: &MockSourceTree, content: &str) -> Result<ParsedNinja, ParseError> {
        let options = ParseOptions::new("/src", "");
        let imports = ImportIndex::default();
        NinjaParser::new(tree, &options, &imports).parse_str(content, Path::new("/build/build.ninja"))
    }

    #[test]
    fn test_parse_simple_graph() {
        let tree = MockSourceTree::new().with_file("/src/xar/Logging.cpp", "");
        let parsed = parse(&tree, SIMPLE).unwrap();
        let graph = &parsed.graph;

        assert!(parsed.missing.is_empty());
        assert_eq!(parsed.workdir.as_deref(), Some("/build/"));

        let src = graph.find("/src/xar/Logging.cpp").unwrap();
        assert!(graph.node(src).is_file);
        assert_eq!(graph.node(src).short_name, "xar/Logging.cpp");

        let lib = graph.output("xar/liblogging.a").unwrap();
        let producer = graph.node(lib).producer.unwrap();
        assert_eq!(graph.action(producer).rule.name, "CXX_STATIC_LIBRARY_LINKER");

        // `all` reads the library through the `logging` alias.
        let all = graph.output("all").unwrap();
        let top = graph.node(all).producer.unwrap();
        assert_eq!(graph.action(top).inputs, vec![lib]);
    }

    #[test]
    fn test_edge_vars_override_scope() {
        let tree = MockSourceTree::new().with_file("/src/xar/Logging.cpp", "");
        let parsed = parse(&tree, SIMPLE).unwrap();
        let obj = parsed
            .graph
            .output("xar/CMakeFiles/logging.dir/Logging.cpp.o")
            .unwrap();
        let action = parsed.graph.action(parsed.graph.node(obj).producer.unwrap());
        assert_eq!(action.var("FLAGS"), Some("-O2 -Wall"));
        assert_eq!(action.workdir(), Some("/build/"));
    }

    #[test]
    fn test_unknown_rule_is_fatal() {
        let tree = MockSourceTree::new();
        let err = parse(&tree, "build out: NOPE in\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownRule { ref rule, .. } if rule == "NOPE"));
    }

    #[test]
    fn test_rule_without_command_is_fatal() {
        let tree = MockSourceTree::new();
        let err = parse(&tree, "rule CC\n  description = cc\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingCommand { .. }));
    }

    #[test]
    fn test_build_without_colon_is_fatal() {
        let tree = MockSourceTree::new();
        let err = parse(&tree, "build out phony in\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedBuild { .. }));
    }

    #[test]
    fn test_missing_inputs_are_reported() {
        let tree = MockSourceTree::new();
        let content = "rule CC\n  command = cc $in -o $out\nbuild a.o: CC gen.c lib.dir\n";
        let parsed = parse(&tree, content).unwrap();
        assert_eq!(parsed.missing.into_iter().collect::<Vec<_>>(), vec!["gen.c"]);
    }

    #[test]
    fn test_produced_later_is_not_missing() {
        let tree = MockSourceTree::new();
        let content = "rule CC\n  command = cc $in -o $out\n\
                       build a.o: CC gen.c\n\
                       build gen.c: CC gen.y\n";
        let tree = tree.with_file("/build/gen.y", "");
        let parsed = parse(&tree, content).unwrap();
        assert!(parsed.missing.is_empty());
        let gen = parsed.graph.find("gen.c").unwrap();
        assert!(parsed.graph.node(gen).producer.is_some());
    }

    #[test]
    fn test_include_and_subninja_scopes() {
        let tree = MockSourceTree::new()
            .with_file(
                "/build/rules.ninja",
                "rule CC\n  command = cc $in -o $out\nflags = -g\n",
            )
            .with_file(
                "/build/sub.ninja",
                "flags = -O3\nrule LOCAL\n  command = local $in\nbuild b.o: LOCAL /src/b.c\n",
            )
            .with_file("/src/a.c", "")
            .with_file("/src/b.c", "");
        let content = "include rules.ninja\nsubninja sub.ninja\nbuild a.o: CC /src/a.c\n";
        let parsed = parse(&tree, content).unwrap();
        let graph = &parsed.graph;

        let a = graph.action(graph.node(graph.output("a.o").unwrap()).producer.unwrap());
        assert_eq!(a.var("flags"), Some("-g"));
        let b = graph.action(graph.node(graph.output("b.o").unwrap()).producer.unwrap());
        assert_eq!(b.var("flags"), Some("-O3"));

        let err = parse(&tree, "subninja sub.ninja\nbuild c.o: LOCAL /src/a.c\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownRule { .. }));
    }

    #[test]
    fn test_external_inputs_and_imports() {
        let tree = MockSourceTree::new()
            .with_file("/src/main.c", "")
            .with_file("/usr/lib/libz.so", "");
        let content = "rule LINK\n  command = cc $in -o $out $LINK_LIBRARIES\n\
                       build app: LINK /src/main.c /usr/lib/libz.so | /usr/lib/libzstd.a \
                       /opt/grpc/lib/libgrpc++.a\n";
        let parsed = parse(&tree, content).unwrap();
        let graph = &parsed.graph;

        let zlib = graph.find("/usr/lib/libz.so").unwrap();
        assert!(graph.node(zlib).is_external());
        assert!(graph.find("/opt/grpc/lib/libgrpc++.a").is_none());
        let action = graph.action(graph.node(graph.output("app").unwrap()).producer.unwrap());
        assert_eq!(action.depends.len(), 1);
    }

    #[test]
    fn test_manually_generated_inputs() {
        let tree = MockSourceTree::new();
        let mut options = ParseOptions::new("/src", "");
        options
            .manually_generated
            .insert("gen/version.h".to_string(), "//tools:version_h".to_string());
        let imports = ImportIndex::default();
        let content = "rule CC\n  command = cc $in -o $out\nbuild a.o: CC gen/version.h\n";
        let parsed = NinjaParser::new(&tree, &options, &imports)
            .parse_str(content, Path::new("/build/build.ninja"))
            .unwrap();
        assert!(parsed.missing.is_empty());
        let label = parsed.graph.find("//tools:version_h").unwrap();
        assert_eq!(parsed.graph.node(label).kind, NodeKind::ManuallyGenerated);
    }

    #[test]
    fn test_workdir_duplicate_outputs_alias() {
        let tree = MockSourceTree::new();
        let content = "cmake_ninja_workdir = /build\n\
                       rule GEN\n  command = gen $out\n\
                       build version.h /build/version.h: GEN\n";
        let parsed = parse(&tree, content).unwrap();
        let graph = &parsed.graph;
        let full = graph.find("/build/version.h").unwrap();
        let short = graph.find("version.h").unwrap();
        assert_eq!(graph.node(short).alias, Some(full));
        assert_eq!(graph.output("version.h"), Some(full));
    }
}
