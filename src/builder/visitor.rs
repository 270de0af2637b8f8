//! Build-graph traversal.
//!
//! [`BuildVisitor`] walks the graph depth-first from the top-level outputs.
//! Every non-phony action is classified once and turned into targets; the
//! target being populated travels down the walk as the "current" target so
//! that children can attach themselves to it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use super::classify::{classify, is_protoc_command, CommandKind, CUSTOM_COMMAND_RULE};
use super::command::{
    core_command, strip_root, tool_invocation, wrapper_script, ArgRewriter, CommandInput,
    CoreCommand,
};
use super::errors::BuildError;
use super::flags::{linkopts, FlagFilter};
use super::naming::{
    basename, file_place, flatten, is_grpc_output, library_name, package_of, place, shared_name,
    test_name, FilePlace, ProtoNames, Remap,
};
use super::BuildOptions;
use crate::core::graph::{ActionId, BuildGraph, NodeId, NodeKind};
use crate::core::registry::TargetRegistry;
use crate::core::target::{
    is_header, is_source, label, CcAttrs, CcRule, Contribution, GenruleAttrs, IncludeDir,
    Language, TargetDetails, TargetId, TargetKind,
};
use crate::imports::ImportIndex;
use crate::includes::{
    parse_include_dirs, proto_include_dirs, CppResolver, GeneratedFiles, IncludeResult,
    ProtoImport, ProtoImports, ProtoResolver,
};
use crate::ninja::IGNORED_TARGETS;
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::fs::{normalize_path, strip_dir_prefix, SourceTree};

/// Repository of the protobuf runtime and well-known protos.
pub const PROTOBUF_REPOSITORY: &str = "@com_google_protobuf//";

/// Import name that stands for the protobuf runtime.
const PROTOBUF_IMPORT: &str = "protobuf";

/// Outcome of a traversal, beyond the targets left in the registry.
#[derive(Debug, Default)]
pub struct Synthesis {
    /// Top-level outputs the walk started from.
    pub top_level: Vec<NodeId>,
    /// Unresolved include name -> files that include it.
    pub unresolved: BTreeMap<String, BTreeSet<String>>,
}

impl Synthesis {
    /// Warning listing the includes nothing could resolve.
    pub fn unresolved_report(&self) -> Option<Diagnostic> {
        if self.unresolved.is_empty() {
            return None;
        }
        let mut diag = Diagnostic::warning(format!(
            "{} includes could not be resolved",
            self.unresolved.len()
        ));
        for (name, from) in self.unresolved.iter().take(20) {
            let from: Vec<&str> = from.iter().map(String::as_str).collect();
            diag = diag.with_context(format!("{} (from {})", name, from.join(", ")));
        }
        if self.unresolved.len() > 20 {
            diag = diag.with_context(format!("... and {} more", self.unresolved.len() - 20));
        }
        Some(
            diag.with_suggestion(suggestions::UNRESOLVED_INCLUDES)
                .with_suggestion(suggestions::SYSTEM_INCLUDES),
        )
    }
}

/// Outputs the traversal starts from: the inputs of `all`, or the
/// requested outputs when any are given.
pub fn top_level_outputs(graph: &BuildGraph, requested: &[String]) -> Result<Vec<NodeId>, BuildError> {
    let mut tops = Vec::new();
    if requested.is_empty() {
        let all = graph.output("all").ok_or(BuildError::MissingAll)?;
        let producer = graph.node(all).producer.ok_or(BuildError::MissingAll)?;
        let action = graph.action(producer);
        for &input in action.inputs.iter().chain(&action.depends) {
            let id = graph.resolve(input);
            if IGNORED_TARGETS.contains(&graph.node(id).name.as_str()) || tops.contains(&id) {
                continue;
            }
            tops.push(id);
        }
        return Ok(tops);
    }

    for name in requested {
        if IGNORED_TARGETS.contains(&name.as_str()) {
            warn!("skipping `{}`, it is never translated", name);
            continue;
        }
        let id = graph
            .output(name)
            .or_else(|| graph.find(name))
            .ok_or_else(|| BuildError::UnknownTarget { name: name.clone() })?;
        let id = graph.resolve(id);
        if !tops.contains(&id) {
            tops.push(id);
        }
    }
    Ok(tops)
}

/// Where the walk currently is.
#[derive(Debug, Clone, Copy, Default)]
struct VisitContext {
    /// Target children attach to.
    current: Option<TargetId>,
    /// Reached through a phony group.
    parent_is_phony: bool,
}

impl VisitContext {
    fn within(current: TargetId) -> Self {
        VisitContext {
            current: Some(current),
            parent_is_phony: false,
        }
    }
}

/// Depth-first visitor turning build actions into targets.
pub struct BuildVisitor<'a> {
    graph: &'a BuildGraph,
    options: &'a BuildOptions,
    registry: &'a mut TargetRegistry,
    cpp: CppResolver<'a>,
    protos: ProtoResolver<'a>,
    flags: FlagFilter,
    remap: Remap,
    proto_names: ProtoNames,
    /// Action -> the target it became.
    associated: HashMap<ActionId, TargetId>,
    /// Library target -> the action that created it.
    owners: HashMap<TargetId, ActionId>,
    visited: HashSet<(NodeId, Option<TargetId>)>,
    /// Proto libraries whose imports were already added.
    proto_done: HashSet<TargetId>,
    unresolved: BTreeMap<String, BTreeSet<String>>,
}

impl<'a> BuildVisitor<'a> {
    pub fn new(
        graph: &'a BuildGraph,
        tree: &'a dyn SourceTree,
        imports: &'a ImportIndex,
        generated: &'a GeneratedFiles,
        registry: &'a mut TargetRegistry,
        options: &'a BuildOptions,
    ) -> Self {
        let cpp = CppResolver::new(tree, imports, generated)
            .with_system_dirs(&options.system_includes)
            .with_project_dir(&options.root_dir)
            .with_project_dir(&options.build_dir);
        BuildVisitor {
            graph,
            options,
            registry,
            cpp,
            protos: ProtoResolver::new(tree),
            flags: FlagFilter::new(
                options.keep_defines.iter().cloned(),
                options.drop_flags.clone(),
            ),
            remap: Remap::new(options.remap.clone()),
            proto_names: ProtoNames::new(),
            associated: HashMap::new(),
            owners: HashMap::new(),
            visited: HashSet::new(),
            proto_done: HashSet::new(),
            unresolved: BTreeMap::new(),
        }
    }

    /// Visit every top-level output, then post-process the registry.
    pub fn run(mut self, top_level: Vec<NodeId>) -> Result<Synthesis, BuildError> {
        for &id in &top_level {
            self.visit(id, VisitContext::default())?;
        }
        self.registry.split_mixed_languages();
        debug!(
            "{} targets, {} cached include scans",
            self.registry.len(),
            self.cpp.cached()
        );
        Ok(Synthesis {
            top_level,
            unresolved: self.unresolved,
        })
    }

    fn visit(&mut self, id: NodeId, ctx: VisitContext) -> Result<(), BuildError> {
        let graph = self.graph;
        let id = graph.resolve(id);
        if !self.visited.insert((id, ctx.current)) {
            return Ok(());
        }
        match graph.node(id).producer {
            None => {
                self.visit_leaf(id, ctx);
                Ok(())
            }
            Some(aid) if graph.action(aid).is_phony() => {
                let ctx = VisitContext {
                    current: ctx.current,
                    parent_is_phony: true,
                };
                self.visit_children(aid, ctx)
            }
            Some(aid) => self.visit_produced(id, aid, ctx),
        }
    }

    /// Visit the inputs of an action, then the implicit dependencies that
    /// lead to real work.
    fn visit_children(&mut self, aid: ActionId, ctx: VisitContext) -> Result<(), BuildError> {
        let graph = self.graph;
        let action = graph.action(aid);
        let by_name = |a: &NodeId, b: &NodeId| graph.node(*a).name.cmp(&graph.node(*b).name);

        let mut inputs = action.inputs.clone();
        inputs.sort_by(by_name);
        for input in inputs {
            self.visit(input, ctx)?;
        }

        let mut depends: Vec<NodeId> = action
            .depends
            .iter()
            .copied()
            .filter(|&d| !graph.deps_are_virtual(d))
            .collect();
        depends.sort_by(by_name);
        for dep in depends {
            self.visit(dep, ctx)?;
        }
        Ok(())
    }

    fn visit_leaf(&mut self, id: NodeId, ctx: VisitContext) {
        let graph = self.graph;
        let node = graph.node(id);
        match node.kind {
            NodeKind::ManuallyGenerated => self.attach_manual(id, ctx.current),
            NodeKind::External => match node.import {
                Some(import) => {
                    self.attach_import(ctx.current, import);
                }
                None => debug!("{} is outside the tree and not an import", node.name),
            },
            _ if node.is_file => {
                let Some(current) = ctx.current else {
                    if ctx.parent_is_phony {
                        debug!("{} is only reachable through phony targets", node.name);
                    }
                    return;
                };
                match self.registry.get(current).kind() {
                    TargetKind::Genrule => {
                        let file = self.exported_file(&file_place(node));
                        self.registry.add_src(current, file);
                    }
                    kind => trace!("{} is an input of a {}", node.name, kind),
                }
            }
            _ => debug!("nothing produces {} and it is not a file", node.name),
        }
    }

    fn visit_produced(&mut self, id: NodeId, aid: ActionId, ctx: VisitContext) -> Result<(), BuildError> {
        let graph = self.graph;
        let action = graph.action(aid);
        let Some(core) = core_command(graph, action) else {
            if action.rule.name == CUSTOM_COMMAND_RULE {
                return self.visit_children(aid, ctx);
            }
            let command = action.rule.command().unwrap_or_default().to_string();
            return self.unrecognized(id, command, ctx);
        };

        match classify(action, &core.command) {
            CommandKind::Compile => self.compile(aid, ctx),
            CommandKind::Archive => self.library(id, aid, ctx, false),
            CommandKind::Link { shared: true } => self.library(id, aid, ctx, true),
            CommandKind::Link { shared: false } => self.executable(id, aid, ctx),
            CommandKind::Protoc => {
                let target = if self.proto_names.name_for(&graph.node(id).short_name).is_some() {
                    self.proto_family(aid, id)?
                } else {
                    self.proto_library(aid, &core)
                };
                self.attach(ctx.current, target);
                Ok(())
            }
            CommandKind::CmakeUtility => self.visit_children(aid, ctx),
            CommandKind::Custom => self.custom(id, aid, &core, ctx),
            CommandKind::Unknown => self.unrecognized(id, core.command, ctx),
        }
    }

    fn unrecognized(&mut self, id: NodeId, command: String, ctx: VisitContext) -> Result<(), BuildError> {
        let output = self.graph.node(id).name.clone();
        if ctx.current.is_none() {
            return Err(BuildError::UnrecognizedCommand { output, command });
        }
        warn!("skipping {}: don't know what `{}` builds", output, command);
        Ok(())
    }

    // C/C++

    fn executable(&mut self, id: NodeId, aid: ActionId, ctx: VisitContext) -> Result<(), BuildError> {
        if let Some(&target) = self.associated.get(&aid) {
            self.attach(ctx.current, target);
            return Ok(());
        }
        let graph = self.graph;
        let node = graph.node(id);
        let place = file_place(node);
        let (rule, name) = match test_name(&node.short_name) {
            Some(name) => (CcRule::Test, name),
            None => (CcRule::Binary, place.name.clone()),
        };
        let target = self.registry.get_or_insert(rule.kind(), &name, &place.package, || {
            TargetDetails::Cc(CcAttrs::new(rule))
        });
        self.own(target, aid);
        self.attach(ctx.current, target);
        self.visit_children(aid, VisitContext::within(target))
    }

    fn library(&mut self, id: NodeId, aid: ActionId, ctx: VisitContext, shared: bool) -> Result<(), BuildError> {
        if let Some(&target) = self.associated.get(&aid) {
            self.attach(ctx.current, target);
            return Ok(());
        }
        let node = self.graph.node(id);
        let place = file_place(node);
        let name = self.library_name_for(aid, &place);
        let library = self.registry.get_or_insert(TargetKind::CcLibrary, &name, &place.package, || {
            TargetDetails::Cc(CcAttrs::new(CcRule::Library))
        });
        self.own(library, aid);

        if shared {
            let wrapper = self.registry.get_or_insert(
                TargetKind::CcSharedLibrary,
                &shared_name(&name),
                &place.package,
                || TargetDetails::Cc(CcAttrs::new(CcRule::SharedLibrary)),
            );
            self.registry.add_dep(wrapper, library);
            self.registry.emit(wrapper);
        }

        self.attach(ctx.current, library);
        self.visit_children(aid, VisitContext::within(library))
    }

    /// Name of the library built by `aid`. Two archives with the same stem
    /// in one package fall back to their directory-qualified name.
    fn library_name_for(&self, aid: ActionId, place: &FilePlace) -> String {
        let name = library_name(&place.name);
        let taken = self
            .registry
            .find(TargetKind::CcLibrary, &name, &place.package)
            .and_then(|id| self.owners.get(&id))
            .is_some_and(|&owner| owner != aid);
        if !taken {
            return name;
        }
        match place.name.rsplit_once('/') {
            Some((dir, _)) => format!("{}_{}", flatten(dir), name),
            None => flatten(&place.name),
        }
    }

    /// Record `target` as the translation of `aid` and emit it.
    fn own(&mut self, target: TargetId, aid: ActionId) {
        let action = self.graph.action(aid);
        let opts = linkopts(action.var("LINK_LIBRARIES").unwrap_or_default());
        if let Some(attrs) = self.registry.get_mut(target).cc_mut() {
            attrs.linkopts.extend(opts);
        }
        self.associated.insert(aid, target);
        self.owners.insert(target, aid);
        self.registry.emit(target);
    }

    fn compile(&mut self, aid: ActionId, ctx: VisitContext) -> Result<(), BuildError> {
        let graph = self.graph;
        let action = graph.action(aid);
        let Some(current) = ctx.current else {
            debug!("{} is not part of a library or binary", graph.describe(aid));
            return Ok(());
        };
        let Some(&source) = action.inputs.first() else {
            return Ok(());
        };
        let source = graph.resolve(source);
        let src_node = graph.node(source);

        let flags = self.flags.compile_flags(
            action.var("DEFINES").unwrap_or_default(),
            action.var("FLAGS").unwrap_or_default(),
        );
        if src_node.producer.is_some() || src_node.kind == NodeKind::ManuallyGenerated {
            if let Some(attrs) = self.registry.get_mut(current).cc_mut() {
                attrs.copts.extend(flags.copts.iter().cloned());
                attrs.defines.extend(flags.defines.iter().cloned());
                attrs.kept_defines.extend(flags.kept_defines.iter().cloned());
            }
        }

        if let Some(producer) = src_node.producer {
            if self.is_protoc_action(producer) {
                let family = self.proto_family(producer, source)?;
                self.attach(Some(current), family);
                return Ok(());
            }
            return self.visit(source, VisitContext::within(current));
        }
        if src_node.kind == NodeKind::ManuallyGenerated {
            self.attach_manual(source, Some(current));
            return Ok(());
        }
        if !self.registry.get(current).kind().is_cc() {
            debug!("ignoring {} compiled under a non-C/C++ target", src_node.name);
            return Ok(());
        }

        let src = self.exported_file(&file_place(src_node));
        self.registry.add_src(current, src);

        let mut contribution = Contribution {
            language: Language::from_path(&src_node.short_name).unwrap_or_default(),
            copts: flags.copts,
            defines: flags.defines,
            kept_defines: flags.kept_defines,
            ..Contribution::default()
        };

        let include_dirs = parse_include_dirs(
            action.var("INCLUDES").unwrap_or_default(),
            &self.options.build_dir,
        );
        let path = self.absolute(&src_node.name);
        let result = self.cpp.resolve(&path, &include_dirs);
        self.apply_includes(current, &src_node.short_name, &result, &mut contribution)?;

        if let Some(attrs) = self.registry.get_mut(current).cc_mut() {
            attrs.copts.extend(contribution.copts.iter().cloned());
            attrs.defines.extend(contribution.defines.iter().cloned());
            attrs.kept_defines.extend(contribution.kept_defines.iter().cloned());
            attrs.include_dirs.extend(contribution.include_dirs.iter().cloned());
            attrs.contributions.insert(src, contribution);
        }

        let mut depends: Vec<NodeId> = action
            .depends
            .iter()
            .copied()
            .filter(|&d| !graph.deps_are_virtual(d))
            .collect();
        depends.sort_by(|a, b| graph.node(*a).name.cmp(&graph.node(*b).name));
        for dep in depends {
            self.visit(dep, VisitContext::within(current))?;
        }
        Ok(())
    }

    fn apply_includes(
        &mut self,
        current: TargetId,
        from: &str,
        result: &IncludeResult,
        contribution: &mut Contribution,
    ) -> Result<(), BuildError> {
        // A header found next to its includer implies that directory too.
        for (path, dir) in &result.found {
            if let Some(place) = self.place_of_path(path) {
                let hdr = self.exported_file(&place);
                self.registry.add_hdr(current, hdr);
                contribution.hdrs.insert(hdr);
            }
            if let Some(dir) = self.include_dir(dir, false) {
                contribution.include_dirs.insert(dir);
            }
        }
        for &import in &result.imports {
            if let Some(dep) = self.attach_import(Some(current), import) {
                contribution.deps.insert(dep);
            }
        }
        for (node, dir) in &result.generated {
            self.attach_generated(current, *node)?;
            if let Some(dir) = self.include_dir(dir, true) {
                contribution.include_dirs.insert(dir);
            }
        }
        for name in &result.unresolved {
            self.unresolved
                .entry(name.clone())
                .or_default()
                .insert(from.to_string());
        }
        Ok(())
    }

    /// Attach a generated header to `current` through whatever produces it.
    fn attach_generated(&mut self, current: TargetId, node: NodeId) -> Result<(), BuildError> {
        let Some(producer) = self.graph.node(node).producer else {
            return Ok(());
        };
        if self.is_protoc_action(producer) {
            let family = self.proto_family(producer, node)?;
            self.attach(Some(current), family);
            return Ok(());
        }
        self.visit(node, VisitContext::within(current))
    }

    // Imports and hand-written labels

    /// Attach an import to `current`; returns the target that was attached.
    fn attach_import(&mut self, current: Option<TargetId>, import: TargetId) -> Option<TargetId> {
        let current = current?;
        if self.registry.get(import).name == PROTOBUF_IMPORT {
            let any = self
                .registry
                .get_or_insert(TargetKind::External, "any_proto", PROTOBUF_REPOSITORY, || {
                    TargetDetails::External
                });
            let location = self.registry.get(current).location.clone();
            let any_cc = self
                .registry
                .get_or_insert(TargetKind::CcProtoLibrary, "any_cc_proto", &location, || {
                    TargetDetails::CcProtoLibrary
                });
            self.registry.add_dep(any_cc, any);
            self.registry.emit(any_cc);
            self.attach(Some(current), any_cc);
            return Some(any_cc);
        }
        self.emit_import(import);
        self.attach(Some(current), import);
        Some(import)
    }

    /// Emit an import and the imports it depends on.
    fn emit_import(&mut self, import: TargetId) {
        if self.registry.is_emitted(import) {
            return;
        }
        self.registry.emit(import);
        let deps: Vec<TargetId> = self.registry.get(import).deps.iter().copied().collect();
        for dep in deps {
            if self.registry.get(dep).kind() == TargetKind::CcImport {
                self.emit_import(dep);
            }
        }
    }

    fn attach_manual(&mut self, id: NodeId, current: Option<TargetId>) {
        let Some(current) = current else {
            return;
        };
        let name = self.graph.node(id).name.clone();
        let target = self
            .registry
            .get_or_insert(TargetKind::ManuallyGenerated, &name, "", || {
                TargetDetails::ManuallyGenerated
            });
        let file = name.rsplit(':').next().unwrap_or(&name);
        if !self.registry.get(current).kind().is_cc() {
            self.attach(Some(current), target);
        } else if is_source(file) {
            self.registry.add_src(current, target);
        } else if is_header(file) {
            self.registry.add_hdr(current, target);
        } else {
            self.registry.add_dep(current, target);
        }
    }

    // Protobuf

    fn is_protoc_action(&self, aid: ActionId) -> bool {
        core_command(self.graph, self.graph.action(aid))
            .is_some_and(|core| is_protoc_command(&core.command))
    }

    /// The `proto_library`, `cc_proto_library` and (for gRPC stubs)
    /// `cc_grpc_library` behind one protoc output. Returns the target C/C++
    /// code should depend on.
    fn proto_family(&mut self, aid: ActionId, output: NodeId) -> Result<TargetId, BuildError> {
        let graph = self.graph;
        let Some(core) = core_command(graph, graph.action(aid)) else {
            return Err(BuildError::UnrecognizedCommand {
                output: graph.node(output).name.clone(),
                command: graph.describe(aid),
            });
        };
        let proto = self.proto_library(aid, &core);
        let node = graph.node(output);
        let Some(name) = self.proto_names.name_for(&node.short_name) else {
            return Ok(proto);
        };
        let package = package_of(node);

        let cc = self.registry.get_or_insert(
            TargetKind::CcProtoLibrary,
            &format!("{}_cc_proto", name),
            &package,
            || TargetDetails::CcProtoLibrary,
        );
        self.registry.add_dep(cc, proto);
        self.registry.emit(cc);
        if !is_grpc_output(&node.short_name) {
            return Ok(cc);
        }

        let grpc = self.registry.get_or_insert(
            TargetKind::CcGrpcLibrary,
            &format!("{}_cc_grpc", name),
            &package,
            || TargetDetails::CcGrpcLibrary,
        );
        self.registry.add_src(grpc, proto);
        self.registry.add_dep(grpc, cc);
        self.registry.emit(grpc);
        Ok(grpc)
    }

    /// The `proto_library` compiled by a protoc action.
    fn proto_library(&mut self, aid: ActionId, core: &CoreCommand) -> TargetId {
        if let Some(&target) = self.associated.get(&aid) {
            return target;
        }
        let graph = self.graph;
        let action = graph.action(aid);
        let sources: Vec<NodeId> = action
            .inputs
            .iter()
            .map(|&i| graph.resolve(i))
            .filter(|&i| graph.node(i).short_name.ends_with(".proto"))
            .collect();
        let first_output = graph.node(graph.resolve(action.outputs[0]));
        let key = sources
            .first()
            .map(|&s| graph.node(s).short_name.as_str())
            .unwrap_or(first_output.short_name.as_str());
        let name = self
            .proto_names
            .name_for(key)
            .unwrap_or_else(|| flatten(basename(key)));
        let package = package_of(first_output);

        let library = self.registry.get_or_insert(
            TargetKind::ProtoLibrary,
            &format!("{}_proto", name),
            &package,
            || TargetDetails::ProtoLibrary {
                strip_import_prefix: None,
            },
        );
        self.registry.emit(library);
        self.associated.insert(aid, library);

        let roots: Vec<PathBuf> = proto_include_dirs(&core.command)
            .into_iter()
            .map(|root| self.absolute(&root.to_string_lossy()))
            .collect();
        for source in sources {
            let path = self.absolute(&graph.node(source).name);
            self.populate_proto(library, &path, &roots, &package);
        }
        library
    }

    /// Add `path` as a source of `library`, then its imports as deps.
    fn populate_proto(&mut self, library: TargetId, path: &Path, roots: &[PathBuf], package: &str) {
        if let Some(place) = self.place_of_path(path) {
            let src = self.exported_file(&place);
            self.registry.add_src(library, src);
        }
        let root = roots.iter().find(|r| path.starts_with(r));
        if let Some(prefix) = root.and_then(|r| self.strip_import_prefix(r)) {
            self.registry.get_mut(library).details = TargetDetails::ProtoLibrary {
                strip_import_prefix: Some(prefix),
            };
        }
        if !self.proto_done.insert(library) {
            return;
        }
        let imports = self.protos.resolve(path, roots);
        self.add_proto_imports(library, path, &imports, package);
    }

    fn add_proto_imports(&mut self, library: TargetId, file: &Path, imports: &ProtoImports, package: &str) {
        let Some(list) = imports.get(&normalize_path(file)) else {
            return;
        };
        for import in list {
            match import {
                ProtoImport::External(name) => {
                    let stem = basename(name).trim_end_matches(".proto");
                    let dep = self.registry.get_or_insert(
                        TargetKind::External,
                        &format!("{}_proto", stem),
                        PROTOBUF_REPOSITORY,
                        || TargetDetails::External,
                    );
                    self.registry.add_dep(library, dep);
                }
                ProtoImport::Local { path, root } => {
                    let Ok(relative) = path.strip_prefix(&self.options.root_dir) else {
                        debug!("proto import {} is outside the source tree", path.display());
                        continue;
                    };
                    let Some(name) = self.proto_names.name_for(&relative.to_string_lossy()) else {
                        continue;
                    };
                    let dep = self.registry.get_or_insert(
                        TargetKind::ProtoLibrary,
                        &format!("{}_proto", name),
                        package,
                        || TargetDetails::ProtoLibrary {
                            strip_import_prefix: None,
                        },
                    );
                    self.registry.emit(dep);
                    self.registry.add_dep(library, dep);
                    if self.proto_done.insert(dep) {
                        if let Some(place) = self.place_of_path(path) {
                            let src = self.exported_file(&place);
                            self.registry.add_src(dep, src);
                        }
                        if let Some(prefix) = self.strip_import_prefix(root) {
                            self.registry.get_mut(dep).details = TargetDetails::ProtoLibrary {
                                strip_import_prefix: Some(prefix),
                            };
                        }
                        self.add_proto_imports(dep, path, imports, package);
                    }
                }
            }
        }
    }

    /// `strip_import_prefix` for protos found under `root`.
    fn strip_import_prefix(&self, root: &Path) -> Option<String> {
        let relative = root.strip_prefix(&self.options.root_dir).ok()?;
        let relative = relative.to_string_lossy();
        if relative.is_empty() {
            None
        } else {
            Some(format!("/{}", relative))
        }
    }

    // Custom commands

    fn custom(&mut self, id: NodeId, aid: ActionId, core: &CoreCommand, ctx: VisitContext) -> Result<(), BuildError> {
        let (genrule, created) = match self.associated.get(&aid) {
            Some(&genrule) => (genrule, false),
            None => (self.create_genrule(aid, core), true),
        };
        self.attach_output(ctx.current, genrule, id);
        if created {
            self.visit_children(aid, VisitContext::within(genrule))?;
        }
        Ok(())
    }

    fn create_genrule(&mut self, aid: ActionId, core: &CoreCommand) -> TargetId {
        let graph = self.graph;
        let action = graph.action(aid);
        let first = graph.node(graph.resolve(action.outputs[0]));
        let package = package_of(first);
        let base = flatten(&first.short_name);
        let workdir = action.workdir().unwrap_or_default();

        let mut attrs = GenruleAttrs {
            local: true,
            run_dir: core.run_dir.clone(),
            ..GenruleAttrs::default()
        };
        for &out in &action.outputs {
            let node = graph.node(graph.resolve(out));
            let out_place = file_place(node);
            let declared = if out_place.package == package {
                out_place.name
            } else {
                node.short_name.clone()
            };
            let raw = graph.node(out).name.as_str();
            let raw = strip_dir_prefix(raw, workdir).unwrap_or(raw);
            if raw != declared {
                attrs.aliases.insert(raw.to_string(), declared.clone());
            }
            attrs.outs.insert(declared);
        }

        let root = self.options.root_dir.to_string_lossy().into_owned();
        let mut inputs = Vec::new();
        let mut srcs = Vec::new();
        for &input in &action.inputs {
            let node = graph.node(graph.resolve(input));
            let input_place = file_place(node);
            let from_tree = node.producer.is_none() && node.is_file;
            let location = if from_tree {
                self.remap.apply(&input_place.package)
            } else {
                input_place.package.clone()
            };
            inputs.push(CommandInput {
                name: strip_root(&node.name, &root),
                label: label::label(&input_place.name, &location, &package),
            });
            if from_tree {
                srcs.push(self.exported_file(&input_place));
            }
        }

        let command = strip_root(&core.command, &root);
        let mut tokens = command.split_whitespace();
        let tool = tokens.next().unwrap_or_default().to_string();
        let rewriter = ArgRewriter {
            workdir,
            outs: &attrs.outs,
            inputs: &inputs,
        };
        let args = rewriter.rewrite(tokens).join(" ");

        let mut tools = BTreeSet::new();
        let built_tool = inputs
            .iter()
            .zip(&action.inputs)
            .find(|(input, _)| input.name == tool)
            .filter(|(_, node)| graph.node(graph.resolve(**node)).producer.is_some());
        attrs.cmd = match built_tool {
            Some((input, _)) => format!("$(location {}) {}", input.label, args),
            None => {
                let script = self.tool_script(&base, &package, &tool, core.run_dir.as_deref());
                tools.insert(script);
                format!("./$(location :{}) {}", self.registry.get(script).name, args)
            }
        }
        .trim_end()
        .to_string();
        attrs.tools = tools;

        let genrule = self.registry.get_or_insert(
            TargetKind::Genrule,
            &format!("{}_command", base),
            &package,
            || TargetDetails::Genrule(GenruleAttrs::default()),
        );
        self.registry.get_mut(genrule).details = TargetDetails::Genrule(attrs);
        for src in srcs {
            self.registry.add_src(genrule, src);
        }
        self.registry.emit(genrule);
        self.associated.insert(aid, genrule);
        genrule
    }

    /// The `sh_binary` wrapping a custom command's tool, and the genrule
    /// writing its script.
    fn tool_script(&mut self, base: &str, package: &str, tool: &str, run_dir: Option<&str>) -> TargetId {
        let root = self.options.root_dir.to_string_lossy().into_owned();
        let name = format!("{}_cmd", base);
        let script = format!("{}.sh", name);

        let mut attrs = GenruleAttrs {
            cmd: wrapper_script(&root, &tool_invocation(&root, tool), run_dir),
            ..GenruleAttrs::default()
        };
        attrs.outs.insert(script.clone());
        let build = self.registry.get_or_insert(
            TargetKind::Genrule,
            &format!("{}_build", name),
            package,
            || TargetDetails::Genrule(GenruleAttrs::default()),
        );
        self.registry.get_mut(build).details = TargetDetails::Genrule(attrs);
        self.registry.emit(build);

        let output = self
            .registry
            .get_or_insert(TargetKind::GenruleOutput, &script, package, || {
                TargetDetails::GenruleOutput { rule: build }
            });
        let binary = self
            .registry
            .get_or_insert(TargetKind::ShBinary, &name, package, || TargetDetails::ShBinary);
        self.registry.add_src(binary, output);
        self.registry.emit(binary);
        binary
    }

    /// Make one output of `genrule` visible to `current`.
    fn attach_output(&mut self, current: Option<TargetId>, genrule: TargetId, output: NodeId) {
        let Some(current) = current else {
            return;
        };
        let graph = self.graph;
        let node = graph.node(output);
        let genrule_target = self.registry.get(genrule);
        let package = genrule_target.location.clone();
        let wanted = place(&node.short_name, node.location.as_deref());
        let wanted = if wanted.package == package {
            wanted.name
        } else {
            node.short_name.clone()
        };
        let Some(out) = genrule_target
            .genrule()
            .and_then(|attrs| attrs.output(&wanted))
            .map(str::to_string)
        else {
            debug!("{} is not a declared output of {}", wanted, genrule_target);
            return;
        };

        let handle = self
            .registry
            .get_or_insert(TargetKind::GenruleOutput, &out, &package, || {
                TargetDetails::GenruleOutput { rule: genrule }
            });
        let kind = self.registry.get(current).kind();
        if kind.is_cc() {
            if is_source(&out) {
                self.registry.add_src(current, handle);
            } else if is_header(&out) {
                self.registry.add_hdr(current, handle);
            } else if let Some(attrs) = self.registry.get_mut(current).cc_mut() {
                attrs.data.insert(handle);
            }
        } else if kind == TargetKind::Genrule {
            self.registry.add_src(current, handle);
        } else {
            debug!("not attaching {} to a {}", out, kind);
        }
    }

    // Shared helpers

    /// Attach `child` to `parent` the way the parent's rule consumes it.
    fn attach(&mut self, parent: Option<TargetId>, child: TargetId) {
        let Some(parent) = parent else {
            return;
        };
        if parent == child {
            return;
        }
        let parent_kind = self.registry.get(parent).kind();
        let child_kind = self.registry.get(child).kind();
        if parent_kind == TargetKind::Genrule {
            if matches!(
                child_kind,
                TargetKind::CcBinary | TargetKind::CcTest | TargetKind::ShBinary
            ) {
                if let Some(attrs) = self.registry.get_mut(parent).genrule_mut() {
                    attrs.tools.insert(child);
                }
            } else {
                self.registry.add_src(parent, child);
            }
        } else if parent_kind.accepts_dep(child_kind) {
            self.registry.add_dep(parent, child);
        } else {
            debug!(
                "{} does not take {} as a dependency",
                self.registry.get(parent),
                self.registry.get(child)
            );
        }
    }

    /// The exported-file target for a file of the tree.
    fn exported_file(&mut self, place: &FilePlace) -> TargetId {
        let package = self.remap.apply(&place.package);
        self.registry
            .get_or_insert(TargetKind::ExportedFile, &place.name, &package, || {
                TargetDetails::ExportedFile
            })
    }

    /// Absolute form of a graph name; relative names live in the build dir.
    fn absolute(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.options.build_dir.join(path))
        }
    }

    /// Place of a file found on disk, in the build dir or the source tree.
    fn place_of_path(&self, path: &Path) -> Option<FilePlace> {
        if let Ok(relative) = path.strip_prefix(&self.options.build_dir) {
            return Some(place(&relative.to_string_lossy(), Some(&self.options.prefix)));
        }
        let relative = path.strip_prefix(&self.options.root_dir).ok()?;
        Some(place(&relative.to_string_lossy(), None))
    }

    /// Include directory as written in the generated target.
    fn include_dir(&self, dir: &Path, generated: bool) -> Option<IncludeDir> {
        if let Ok(relative) = dir.strip_prefix(&self.options.build_dir) {
            let relative = relative.to_string_lossy();
            let path = match (self.options.prefix.trim_end_matches('/'), relative.as_ref()) {
                ("", rel) => rel.to_string(),
                (prefix, "") => prefix.to_string(),
                (prefix, rel) => format!("{}/{}", prefix, rel),
            };
            return Some(if generated {
                IncludeDir::generated(path)
            } else {
                IncludeDir::source(path)
            });
        }
        let relative = dir.strip_prefix(&self.options.root_dir).ok()?;
        let relative = relative.to_string_lossy();
        Some(IncludeDir::source(if relative.is_empty() {
            ".".to_string()
        } else {
            relative.into_owned()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures::{self, parse_fixture};
    use crate::test_support::MockSourceTree;

    fn run(tree: &MockSourceTree, content: &str) -> (TargetRegistry, Synthesis) {
        run_with(tree, content, fixtures::build_options())
    }

    fn run_with(
        tree: &MockSourceTree,
        content: &str,
        options: BuildOptions,
    ) -> (TargetRegistry, Synthesis) {
        let parsed = parse_fixture(tree, content);
        let imports = ImportIndex::new();
        let generated = GeneratedFiles::from_graph(&parsed.graph, Some(&options.build_dir));
        let mut registry = TargetRegistry::new();
        let top = top_level_outputs(&parsed.graph, &[]).unwrap();
        let synthesis = BuildVisitor::new(
            &parsed.graph,
            tree,
            &imports,
            &generated,
            &mut registry,
            &options,
        )
        .run(top)
        .unwrap();
        (registry, synthesis)
    }

    fn find(registry: &TargetRegistry, kind: TargetKind, name: &str, location: &str) -> TargetId {
        registry
            .find(kind, name, location)
            .unwrap_or_else(|| panic!("no {} {}:{}", kind, location, name))
    }

    #[test]
    fn test_library_and_binary() {
        let tree = fixtures::library_tree();
        let options = BuildOptions {
            keep_defines: vec!["KEEP".into()],
            ..fixtures::build_options()
        };
        let (registry, synthesis) = run_with(&tree, fixtures::LIBRARY_AND_BINARY, options);

        let lib = find(&registry, TargetKind::CcLibrary, "logging", "xar");
        let app = find(&registry, TargetKind::CcBinary, "app", "xar");
        assert!(registry.is_emitted(lib) && registry.is_emitted(app));
        assert!(registry.get(app).deps.contains(&lib));

        let src = find(&registry, TargetKind::ExportedFile, "Logging.cpp", "xar");
        let hdr = find(&registry, TargetKind::ExportedFile, "Logging.h", "xar");
        assert!(registry.get(lib).srcs.contains(&src));
        assert!(registry.get(lib).hdrs.contains(&hdr));

        let attrs = registry.get(lib).cc().unwrap();
        assert!(attrs.kept_defines.contains("KEEP"));
        assert!(attrs.defines.contains("DEF2"));
        assert!(attrs.copts.contains("-Wall"));
        assert!(!attrs.copts.iter().any(|c| c.starts_with("-O")));
        assert!(attrs.include_dirs.contains(&IncludeDir::source(".")));

        let app_attrs = registry.get(app).cc().unwrap();
        assert!(app_attrs.linkopts.contains("-lpthread"));
        assert_eq!(synthesis.top_level.len(), 2);
        assert!(synthesis.unresolved_report().is_none());
    }

    #[test]
    fn test_sibling_header_implies_include_dir() {
        let tree = fixtures::library_tree()
            .with_file("/src/xar/Logging.cpp", "#include \"Logging.h\"\n");
        let (registry, _) = run(&tree, fixtures::LIBRARY_AND_BINARY);

        let lib = find(&registry, TargetKind::CcLibrary, "logging", "xar");
        let hdr = find(&registry, TargetKind::ExportedFile, "Logging.h", "xar");
        assert!(registry.get(lib).hdrs.contains(&hdr));
        let attrs = registry.get(lib).cc().unwrap();
        assert!(attrs.include_dirs.contains(&IncludeDir::source("xar")));
    }

    #[test]
    fn test_generated_source_keeps_compile_flags() {
        let tree = MockSourceTree::new()
            .with_file("/src/tools/gen.py", "print('int x;')\n")
            .with_dir("/build/gen");
        let content = r#"
cmake_ninja_workdir = /build/

rule CUSTOM_COMMAND
  command = $COMMAND

rule CXX_COMPILER
  command = /usr/bin/c++ $DEFINES $INCLUDES $FLAGS -o $out -c $in

rule CXX_STATIC_LIBRARY_LINKER
  command = /usr/bin/ar qc $TARGET_FILE $in

build gen/gen.cc: CUSTOM_COMMAND /src/tools/gen.py
  COMMAND = cd /build/gen && /usr/bin/python3 /src/tools/gen.py --out /build/gen/gen.cc

build core/CMakeFiles/core.dir/__/gen/gen.cc.o: CXX_COMPILER gen/gen.cc
  DEFINES = -DFOO
  FLAGS = -Wextra

build core/libcore.a: CXX_STATIC_LIBRARY_LINKER core/CMakeFiles/core.dir/__/gen/gen.cc.o
  TARGET_FILE = core/libcore.a

build all: phony core/libcore.a
"#;
        let (registry, _) = run(&tree, content);

        let lib = find(&registry, TargetKind::CcLibrary, "core", "core");
        let attrs = registry.get(lib).cc().unwrap();
        assert!(attrs.defines.contains("FOO"));
        assert!(attrs.copts.contains("-Wextra"));
        find(&registry, TargetKind::Genrule, "gen_gen_cc_command", "gen");
    }

    #[test]
    fn test_unresolved_includes_are_collected() {
        let tree = fixtures::library_tree().with_file(
            "/src/xar/Logging.cpp",
            "#include \"xar/Logging.h\"\n#include <folly/Likely.h>\n",
        );
        let (_, synthesis) = run(&tree, fixtures::LIBRARY_AND_BINARY);
        let from = synthesis.unresolved.get("folly/Likely.h").unwrap();
        assert!(from.contains("xar/Logging.cpp"));
        let report = synthesis.unresolved_report().unwrap().format(false);
        assert!(report.contains("folly/Likely.h (from xar/Logging.cpp)"));
    }

    #[test]
    fn test_shared_library_gets_wrapper() {
        let tree = MockSourceTree::new().with_file("/src/lib/foo.cc", "");
        let (registry, _) = run(&tree, fixtures::SHARED_LIBRARY);
        let lib = find(&registry, TargetKind::CcLibrary, "foo", "lib");
        let wrapper = find(&registry, TargetKind::CcSharedLibrary, "shared_foo", "lib");
        assert!(registry.is_emitted(wrapper));
        assert!(registry.get(wrapper).deps.contains(&lib));
    }

    #[test]
    fn test_custom_command_becomes_genrule() {
        let tree = fixtures::custom_command_tree();
        let (registry, _) = run(&tree, fixtures::CUSTOM_COMMAND);

        let genrule = find(&registry, TargetKind::Genrule, "gen_version_h_command", "gen");
        let attrs = registry.get(genrule).genrule().unwrap();
        assert!(attrs.outs.contains("version.h"));
        assert!(attrs.cmd.starts_with("./$(location :gen_version_h_cmd)"));
        assert!(attrs.cmd.contains("$(location :version.h)"));
        assert!(attrs.cmd.contains("$(location //tools:version.json)"));
        assert!(attrs.local);

        let script = find(&registry, TargetKind::ShBinary, "gen_version_h_cmd", "gen");
        assert!(attrs.tools.contains(&script));
        let build = find(&registry, TargetKind::Genrule, "gen_version_h_cmd_build", "gen");
        let build_attrs = registry.get(build).genrule().unwrap();
        assert!(build_attrs.outs.contains("gen_version_h_cmd.sh"));
        assert!(build_attrs.cmd.contains("exec /usr/bin/python3 \"$${args[@]}\""));
        assert!(attrs.cmd.contains("$(location //tools:gen.py)"));

        // The library compiling against the header lists it.
        let lib = find(&registry, TargetKind::CcLibrary, "core", "core");
        let out = find(&registry, TargetKind::GenruleOutput, "version.h", "gen");
        assert!(registry.get(lib).hdrs.contains(&out));
        assert!(registry
            .get(lib)
            .cc()
            .unwrap()
            .include_dirs
            .contains(&IncludeDir::generated("gen")));
    }

    #[test]
    fn test_protoc_outputs_become_proto_family() {
        let tree = fixtures::proto_tree();
        let (registry, _) = run(&tree, fixtures::PROTOBUF);

        let proto = find(&registry, TargetKind::ProtoLibrary, "api_proto", "proto");
        let cc = find(&registry, TargetKind::CcProtoLibrary, "api_cc_proto", "proto");
        let grpc = find(&registry, TargetKind::CcGrpcLibrary, "api_cc_grpc", "proto");
        assert!(registry.get(cc).deps.contains(&proto));
        assert!(registry.get(grpc).srcs.contains(&proto));
        assert!(registry.get(grpc).deps.contains(&cc));

        let common = find(&registry, TargetKind::ProtoLibrary, "types_proto", "proto");
        assert!(registry.get(proto).deps.contains(&common));
        let timestamp = find(
            &registry,
            TargetKind::External,
            "timestamp_proto",
            PROTOBUF_REPOSITORY,
        );
        assert!(registry.get(common).deps.contains(&timestamp));

        let server = find(&registry, TargetKind::CcBinary, "server", "server");
        assert!(registry.get(server).deps.contains(&grpc));
        for (id, _) in registry.emitted() {
            registry.check_dependencies(id).unwrap();
        }
    }

    #[test]
    fn test_unknown_command_at_top_level_is_fatal() {
        let tree = MockSourceTree::new();
        let parsed = parse_fixture(
            &tree,
            "rule WEIRD\n  command = /opt/tool -o $out\nbuild out.bin: WEIRD\nbuild all: phony out.bin\n",
        );
        let options = fixtures::build_options();
        let imports = ImportIndex::new();
        let generated = GeneratedFiles::new();
        let mut registry = TargetRegistry::new();
        let top = top_level_outputs(&parsed.graph, &[]).unwrap();
        let err = BuildVisitor::new(&parsed.graph, &tree, &imports, &generated, &mut registry, &options)
            .run(top)
            .unwrap_err();
        assert!(matches!(err, BuildError::UnrecognizedCommand { ref output, .. } if output == "out.bin"));
    }

    #[test]
    fn test_top_level_outputs() {
        let tree = fixtures::library_tree();
        let parsed = parse_fixture(&tree, fixtures::LIBRARY_AND_BINARY);
        let graph = &parsed.graph;

        let all = top_level_outputs(graph, &[]).unwrap();
        assert_eq!(all.len(), 2);

        let one = top_level_outputs(graph, &["xar/app".to_string()]).unwrap();
        assert_eq!(one, vec![graph.output("xar/app").unwrap()]);

        let err = top_level_outputs(graph, &["nope".to_string()]).unwrap_err();
        assert!(matches!(err, BuildError::UnknownTarget { .. }));

        let empty = parse_fixture(&tree, "rule CC\n  command = cc $in -o $out\n");
        assert!(matches!(
            top_level_outputs(&empty.graph, &[]),
            Err(BuildError::MissingAll)
        ));
    }
}
