//! Build graph model.
//!
//! The parsed low-level build graph is bipartite: [`FileNode`]s are connected
//! through [`Action`]s. Both live in a [`BuildGraph`] arena and refer to each
//! other by index, so a node can point at its producer and an action at its
//! inputs without shared ownership. The graph only grows during a run.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::core::target::ImportId;

/// Name of the no-op rule.
pub const PHONY: &str = "phony";

/// Index of a [`FileNode`] in a [`BuildGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of an [`Action`] in a [`BuildGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(usize);

impl ActionId {
    /// Position of the action in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// What the parser learned about a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    /// Not classified yet.
    #[default]
    Other,
    /// Referenced but neither on disk nor produced (yet).
    Unknown,
    /// A file on disk or an output of an edge.
    Known,
    /// Supplied from outside the source and build trees.
    External,
    /// Replaced by a hand-written label.
    ManuallyGenerated,
}

/// A file or phony name in the build graph.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// Canonical name as written in the build file (after variable expansion).
    pub name: String,
    /// Name relative to the root dir or the build dir.
    pub short_name: String,
    /// Output-directory prefix for nodes produced inside the build dir.
    pub location: Option<String>,
    /// Declared as an implicit output (`|` in the output list).
    pub implicit: bool,
    /// Exists on disk inside the source or build tree.
    pub is_file: bool,
    /// One of the outputs the translation was asked for.
    pub top_level: bool,
    pub kind: NodeKind,
    /// Readers of this node are redirected to the alias.
    pub alias: Option<NodeId>,
    /// The single action producing this node.
    pub producer: Option<ActionId>,
    /// Actions reading this node.
    pub used_by: Vec<ActionId>,
    /// Attached import descriptor, for pre-built libraries.
    pub import: Option<ImportId>,
}

impl FileNode {
    /// Create an unclassified node.
    pub fn new(name: impl Into<String>, short_name: impl Into<String>) -> Self {
        FileNode {
            name: name.into(),
            short_name: short_name.into(),
            location: None,
            implicit: false,
            is_file: false,
            top_level: false,
            kind: NodeKind::Other,
            alias: None,
            producer: None,
            used_by: Vec::new(),
            import: None,
        }
    }

    /// Set the output-directory prefix.
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Mark as a file that exists in the source or build tree.
    pub fn mark_file(&mut self) {
        self.kind = NodeKind::Known;
        self.is_file = true;
    }

    /// Whether the node comes from outside the trees we translate.
    pub fn is_external(&self) -> bool {
        self.kind == NodeKind::External
    }
}

/// A rule template: a name plus its unexpanded bindings (`command`, ...).
#[derive(Debug, Clone, Default)]
pub struct Rule {
    pub name: String,
    pub vars: BTreeMap<String, String>,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Rule {
            name: name.into(),
            vars: BTreeMap::new(),
        }
    }

    /// The predefined no-op rule.
    pub fn phony() -> Self {
        Rule::new(PHONY)
    }

    /// The command template, if any.
    pub fn command(&self) -> Option<&str> {
        self.vars.get("command").map(String::as_str)
    }
}

/// A build edge.
#[derive(Debug, Clone)]
pub struct Action {
    pub rule: Rc<Rule>,
    /// Explicit then implicit outputs, in declaration order.
    pub outputs: Vec<NodeId>,
    /// Explicit inputs, in declaration order.
    pub inputs: Vec<NodeId>,
    /// Implicit dependencies (`|`).
    pub depends: Vec<NodeId>,
    /// Order-only dependencies (`||`).
    pub order_only: Vec<NodeId>,
    /// Enclosing scope bindings overlaid with the edge's own bindings.
    pub vars: BTreeMap<String, String>,
}

impl Action {
    pub fn new(rule: Rc<Rule>) -> Self {
        Action {
            rule,
            outputs: Vec::new(),
            inputs: Vec::new(),
            depends: Vec::new(),
            order_only: Vec::new(),
            vars: BTreeMap::new(),
        }
    }

    pub fn is_phony(&self) -> bool {
        self.rule.name == PHONY
    }

    /// Look up an edge or scope variable.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// The build directory recorded by CMake, if any.
    pub fn workdir(&self) -> Option<&str> {
        self.var("cmake_ninja_workdir").filter(|w| !w.is_empty())
    }
}

/// Errors raised when the single-writer invariant breaks.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("`{output}` is produced by more than one build statement")]
    DuplicateProducer { output: String },

    #[error("`{output}` lists a producer that does not list it as an output")]
    DanglingProducer { output: String },
}

#[derive(Debug, Clone, Copy)]
enum DepList {
    Inputs,
    Depends,
    OrderOnly,
}

/// Arena holding every node and action of one run.
#[derive(Debug, Default)]
pub struct BuildGraph {
    nodes: Vec<FileNode>,
    actions: Vec<Action>,
    by_name: HashMap<String, NodeId>,
    outputs: HashMap<String, NodeId>,
}

impl BuildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> &FileNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut FileNode {
        &mut self.nodes[id.0]
    }

    pub fn action(&self, id: ActionId) -> &Action {
        &self.actions[id.0]
    }

    /// All nodes with their ids.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &FileNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// All actions with their ids.
    pub fn actions(&self) -> impl Iterator<Item = (ActionId, &Action)> {
        self.actions.iter().enumerate().map(|(i, a)| (ActionId(i), a))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Find a node by its canonical name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Return the node called `name`, creating it with `make` on first use.
    pub fn intern_with(&mut self, name: &str, make: impl FnOnce() -> FileNode) -> NodeId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = NodeId(self.nodes.len());
        let node = make();
        debug_assert_eq!(node.name, name);
        self.nodes.push(node);
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Return the node called `name`, creating a bare node on first use.
    pub fn intern(&mut self, name: &str) -> NodeId {
        self.intern_with(name, || FileNode::new(name, name))
    }

    /// Record `id` in the index of named outputs.
    pub fn register_output(&mut self, name: impl Into<String>, id: NodeId) {
        self.outputs.insert(name.into(), id);
    }

    /// Look up a named output.
    pub fn output(&self, name: &str) -> Option<NodeId> {
        self.outputs.get(name).copied()
    }

    /// Add an action, wiring producer and user back-references.
    ///
    /// Fails if one of the outputs already has a producer.
    pub fn add_action(&mut self, action: Action) -> Result<ActionId, GraphError> {
        let id = ActionId(self.actions.len());
        for &out in &action.outputs {
            if self.nodes[out.0].producer.is_some() {
                return Err(GraphError::DuplicateProducer {
                    output: self.nodes[out.0].name.clone(),
                });
            }
        }
        for &out in &action.outputs {
            self.nodes[out.0].producer = Some(id);
        }
        for &dep in action
            .inputs
            .iter()
            .chain(&action.depends)
            .chain(&action.order_only)
        {
            self.nodes[dep.0].used_by.push(id);
        }
        self.actions.push(action);
        Ok(id)
    }

    /// Verify that every producer back-reference is consistent.
    pub fn check_single_writer(&self) -> Result<(), GraphError> {
        let mut seen: HashMap<NodeId, ActionId> = HashMap::new();
        for (aid, action) in self.actions() {
            for &out in &action.outputs {
                if seen.insert(out, aid).is_some() {
                    return Err(GraphError::DuplicateProducer {
                        output: self.node(out).name.clone(),
                    });
                }
            }
        }
        for (nid, node) in self.nodes() {
            if let Some(producer) = node.producer {
                if seen.get(&nid) != Some(&producer) {
                    return Err(GraphError::DanglingProducer {
                        output: node.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Follow the alias chain of `id` to its concrete node.
    pub fn resolve(&self, id: NodeId) -> NodeId {
        let mut current = id;
        let mut hops = 0;
        while let Some(next) = self.nodes[current.0].alias {
            if next == id || hops > self.nodes.len() {
                break;
            }
            current = next;
            hops += 1;
        }
        current
    }

    /// Rewrite every action's dependency lists to point at concrete nodes.
    ///
    /// Idempotent: a second call finds nothing to rewrite.
    pub fn resolve_aliases(&mut self) {
        for index in 0..self.actions.len() {
            let aid = ActionId(index);
            for list in [DepList::Inputs, DepList::Depends, DepList::OrderOnly] {
                let current = self.dep_list(aid, list).to_vec();
                if current.iter().all(|&n| self.nodes[n.0].alias.is_none()) {
                    continue;
                }
                let mut rewritten = Vec::with_capacity(current.len());
                for n in current {
                    let target = self.resolve(n);
                    if target != n && !self.nodes[target.0].used_by.contains(&aid) {
                        self.nodes[target.0].used_by.push(aid);
                    }
                    if !rewritten.contains(&target) {
                        rewritten.push(target);
                    }
                }
                *self.dep_list_mut(aid, list) = rewritten;
            }
        }
    }

    fn dep_list(&self, id: ActionId, list: DepList) -> &[NodeId] {
        let action = &self.actions[id.0];
        match list {
            DepList::Inputs => &action.inputs,
            DepList::Depends => &action.depends,
            DepList::OrderOnly => &action.order_only,
        }
    }

    fn dep_list_mut(&mut self, id: ActionId, list: DepList) -> &mut Vec<NodeId> {
        let action = &mut self.actions[id.0];
        match list {
            DepList::Inputs => &mut action.inputs,
            DepList::Depends => &mut action.depends,
            DepList::OrderOnly => &mut action.order_only,
        }
    }

    /// Whether the node is produced by the no-op rule.
    pub fn is_phony_output(&self, id: NodeId) -> bool {
        self.nodes[id.0]
            .producer
            .is_some_and(|p| self.actions[p.0].is_phony())
    }

    /// Whether a phony action only groups other phony names (or nothing).
    pub fn can_be_pruned(&self, id: ActionId) -> bool {
        let action = &self.actions[id.0];
        if !action.is_phony() || !action.depends.is_empty() {
            return false;
        }
        action.inputs.iter().all(|&i| self.is_phony_output(i))
    }

    /// Whether nothing real hides behind `id`: no file, no external
    /// artifact, only phony names that group CMake housekeeping.
    pub fn deps_are_virtual(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.0];
        if node.is_file {
            return false;
        }
        let Some(producer) = node.producer else {
            if node.is_external() {
                return false;
            }
            tracing::debug!(
                "{} is neither a file nor produced by anything, assuming it is virtual",
                node.name
            );
            return true;
        };
        for &dep in &self.actions[producer.0].depends {
            if let Some(dep_producer) = self.nodes[dep.0].producer {
                let dep_action = &self.actions[dep_producer.0];
                if dep_action.is_phony() {
                    if dep_action.inputs.is_empty() && dep_action.depends.is_empty() {
                        return true;
                    }
                    let command = dep_action.var("COMMAND").unwrap_or_default();
                    if ["/ctest ", "/ccmake ", "/cmake "]
                        .iter()
                        .any(|tool| command.contains(tool))
                    {
                        return true;
                    }
                }
            }
            if !self.deps_are_virtual(dep) {
                return false;
            }
        }
        false
    }

    /// Collapse phony actions that only group other phony names.
    ///
    /// Starting from the producer of `root`, every reference to a prunable
    /// phony output is replaced by that action's own inputs.
    pub fn prune_transitive_phony(&mut self, root: NodeId) {
        let Some(start) = self.nodes[root.0].producer else {
            return;
        };
        let mut visited = HashSet::new();
        self.prune_from(start, &mut visited);
    }

    fn prune_from(&mut self, id: ActionId, visited: &mut HashSet<ActionId>) {
        if !visited.insert(id) {
            return;
        }
        for list in [DepList::Inputs, DepList::Depends] {
            let children = self.dep_list(id, list).to_vec();
            let mut changed = false;
            let mut rewritten = Vec::with_capacity(children.len());
            for child in children {
                if let Some(child_action) = self.nodes[child.0].producer {
                    self.prune_from(child_action, visited);
                    if self.can_be_pruned(child_action) {
                        tracing::debug!("pruning {}", self.describe(child_action));
                        changed = true;
                        for input in self.actions[child_action.0].inputs.clone() {
                            if !rewritten.contains(&input) {
                                rewritten.push(input);
                            }
                        }
                        continue;
                    }
                }
                if !rewritten.contains(&child) {
                    rewritten.push(child);
                }
            }
            if changed {
                *self.dep_list_mut(id, list) = rewritten;
            }
        }
    }

    /// One-line description of an action for logs.
    pub fn describe(&self, id: ActionId) -> String {
        let action = &self.actions[id.0];
        let names = |ids: &[NodeId]| {
            ids.iter()
                .map(|n| self.nodes[n.0].name.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        };
        format!(
            "{} => {} => {}",
            names(&action.inputs),
            action.rule.name,
            names(&action.outputs)
        )
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
