//! Target registry.
//!
//! The registry owns every [`Target`] of a run and guarantees at most one
//! instance per (kind, name, package). It also answers closure queries over
//! the dependency edges; those are memoized and only valid once synthesis
//! stops mutating the targets.

use std::cell::{OnceCell, RefCell};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use crate::core::target::label::{self, compare_labels};
use crate::core::target::{
    CcAttrs, CcRule, Language, Target, TargetDetails, TargetError, TargetId, TargetKind,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TargetKey {
    kind: TargetKind,
    name: String,
    location: String,
}

type Closure = Rc<BTreeSet<TargetId>>;

/// Owner of all targets of one translation run.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: Vec<Target>,
    index: HashMap<TargetKey, TargetId>,
    emitted: BTreeSet<TargetId>,
    graph: OnceCell<DiGraph<TargetId, ()>>,
    deps_cache: RefCell<HashMap<TargetId, Closure>>,
    hdrs_cache: RefCell<HashMap<TargetId, Closure>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the target with this identity, creating it with `make` first
    /// if it does not exist.
    pub fn get_or_insert(
        &mut self,
        kind: TargetKind,
        name: &str,
        location: &str,
        make: impl FnOnce() -> TargetDetails,
    ) -> TargetId {
        let key = TargetKey {
            kind,
            name: name.to_string(),
            location: location.to_string(),
        };
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let details = make();
        debug_assert_eq!(details.kind(), kind);
        let id = TargetId(self.targets.len());
        self.targets.push(Target::new(name, location, details));
        self.index.insert(key, id);
        self.invalidate();
        id
    }

    /// Find an existing target.
    pub fn find(&self, kind: TargetKind, name: &str, location: &str) -> Option<TargetId> {
        self.index
            .get(&TargetKey {
                kind,
                name: name.to_string(),
                location: location.to_string(),
            })
            .copied()
    }

    pub fn get(&self, id: TargetId) -> &Target {
        &self.targets[id.0]
    }

    /// Mutable access; drops every memoized closure.
    pub fn get_mut(&mut self, id: TargetId) -> &mut Target {
        self.invalidate();
        &mut self.targets[id.0]
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// All targets with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &Target)> {
        self.targets.iter().enumerate().map(|(i, t)| (TargetId(i), t))
    }

    /// Add a dependency edge. Self edges are ignored.
    pub fn add_dep(&mut self, from: TargetId, to: TargetId) {
        if from == to {
            return;
        }
        if self.targets[from.0].deps.insert(to) {
            self.invalidate();
        }
    }

    pub fn add_hdr(&mut self, to: TargetId, hdr: TargetId) {
        if self.targets[to.0].hdrs.insert(hdr) {
            self.invalidate();
        }
    }

    pub fn add_src(&mut self, to: TargetId, src: TargetId) {
        self.targets[to.0].srcs.insert(src);
    }

    /// Mark a target as part of the output.
    pub fn emit(&mut self, id: TargetId) {
        self.emitted.insert(id);
    }

    pub fn is_emitted(&self, id: TargetId) -> bool {
        self.emitted.contains(&id)
    }

    /// Targets that are rendered, in creation order.
    pub fn emitted(&self) -> impl Iterator<Item = (TargetId, &Target)> {
        self.emitted.iter().map(|&id| (id, &self.targets[id.0]))
    }

    fn invalidate(&mut self) {
        self.graph.take();
        self.deps_cache.get_mut().clear();
        self.hdrs_cache.get_mut().clear();
    }

    fn dep_graph(&self) -> &DiGraph<TargetId, ()> {
        self.graph.get_or_init(|| {
            let mut graph = DiGraph::with_capacity(self.targets.len(), self.targets.len());
            for i in 0..self.targets.len() {
                graph.add_node(TargetId(i));
            }
            for (i, target) in self.targets.iter().enumerate() {
                for dep in &target.deps {
                    graph.add_edge(NodeIndex::new(i), NodeIndex::new(dep.0), ());
                }
            }
            graph
        })
    }

    /// Every target reachable through dependency edges, excluding `id`
    /// itself unless it sits on a cycle through itself.
    pub fn all_deps(&self, id: TargetId) -> Closure {
        if let Some(cached) = self.deps_cache.borrow().get(&id) {
            return Rc::clone(cached);
        }
        let graph = self.dep_graph();
        let mut dfs = Dfs::new(graph, NodeIndex::new(id.0));
        let mut closure = BTreeSet::new();
        while let Some(node) = dfs.next(graph) {
            if node.index() != id.0 {
                closure.insert(graph[node]);
            }
        }
        let closure = Rc::new(closure);
        self.deps_cache.borrow_mut().insert(id, Rc::clone(&closure));
        closure
    }

    /// Own headers plus the headers of every transitive dependency.
    pub fn all_headers(&self, id: TargetId) -> Closure {
        if let Some(cached) = self.hdrs_cache.borrow().get(&id) {
            return Rc::clone(cached);
        }
        let mut headers = self.targets[id.0].hdrs.clone();
        for dep in self.all_deps(id).iter() {
            headers.extend(self.targets[dep.0].hdrs.iter().copied());
        }
        let headers = Rc::new(headers);
        self.hdrs_cache.borrow_mut().insert(id, Rc::clone(&headers));
        headers
    }

    /// Direct dependencies that are not already reachable through another
    /// direct dependency. Of mutually dependent entries only the one with
    /// the lowest label is kept.
    pub fn emitted_deps(&self, id: TargetId) -> Vec<TargetId> {
        let direct = &self.targets[id.0].deps;
        direct
            .iter()
            .copied()
            .filter(|&d| {
                !direct.iter().any(|&other| {
                    other != d
                        && self.all_deps(other).contains(&d)
                        && (!self.all_deps(d).contains(&other)
                            || compare_labels(&self.absolute_label(other), &self.absolute_label(d))
                                == Ordering::Less)
                })
            })
            .collect()
    }

    fn absolute_label(&self, id: TargetId) -> String {
        let target = &self.targets[id.0];
        label::label(&target.name, &target.location, "")
    }

    /// Own headers that no dependency already provides.
    pub fn emitted_headers(&self, id: TargetId) -> Vec<TargetId> {
        let mut provided = BTreeSet::new();
        for dep in &self.targets[id.0].deps {
            provided.extend(self.all_headers(*dep).iter().copied());
        }
        self.targets[id.0]
            .hdrs
            .iter()
            .copied()
            .filter(|h| !provided.contains(h))
            .collect()
    }

    /// Fail if a dependency (or grpc source) has a variant the target's
    /// rule cannot consume.
    pub fn check_dependencies(&self, id: TargetId) -> Result<(), TargetError> {
        let target = &self.targets[id.0];
        let kind = target.kind();
        let incompatible = |dep: TargetId| {
            let dep = &self.targets[dep.0];
            TargetError::IncompatibleDependency {
                target: target.name.clone(),
                kind,
                dep: dep.name.clone(),
                dep_kind: dep.kind(),
            }
        };
        for &dep in &target.deps {
            if !kind.accepts_dep(self.targets[dep.0].kind()) {
                return Err(incompatible(dep));
            }
        }
        if kind == TargetKind::CcGrpcLibrary {
            for &src in &target.srcs {
                if self.targets[src.0].kind() != TargetKind::ProtoLibrary {
                    return Err(incompatible(src));
                }
            }
        }
        Ok(())
    }

    fn source_language(&self, src: TargetId) -> Option<Language> {
        Language::from_path(&self.targets[src.0].name)
    }

    /// Factor the C sources of every library mixing C and C++ into an
    /// auxiliary `_<name>_c` library the original depends on.
    pub fn split_mixed_languages(&mut self) {
        let candidates: Vec<TargetId> = self
            .emitted
            .iter()
            .copied()
            .filter(|&id| {
                let target = &self.targets[id.0];
                if target.kind() != TargetKind::CcLibrary {
                    return false;
                }
                let langs: BTreeSet<Language> = target
                    .srcs
                    .iter()
                    .filter_map(|&s| self.source_language(s))
                    .collect();
                langs.len() > 1
            })
            .collect();

        for id in candidates {
            self.split_library(id);
        }
    }

    fn split_library(&mut self, id: TargetId) {
        let (name, location) = {
            let t = &self.targets[id.0];
            (t.name.clone(), t.location.clone())
        };
        let c_srcs: Vec<TargetId> = self.targets[id.0]
            .srcs
            .iter()
            .copied()
            .filter(|&s| self.source_language(s) == Some(Language::C))
            .collect();

        let aux_name = format!("_{}_c", name);
        tracing::debug!("splitting C sources of {} into {}", name, aux_name);
        let aux = self.get_or_insert(TargetKind::CcLibrary, &aux_name, &location, || {
            TargetDetails::Cc(CcAttrs::new(CcRule::Library))
        });

        let original = &mut self.targets[id.0];
        let Some(attrs) = original.cc_mut() else {
            return;
        };
        let mut aux_attrs = CcAttrs::new(CcRule::Library);
        let mut aux_hdrs = BTreeSet::new();
        let mut aux_deps = BTreeSet::new();

        let has_contributions = c_srcs.iter().any(|s| attrs.contributions.contains_key(s));
        if has_contributions {
            for src in &c_srcs {
                if let Some(contribution) = attrs.contributions.remove(src) {
                    aux_attrs.copts.extend(contribution.copts.iter().cloned());
                    aux_attrs.defines.extend(contribution.defines.iter().cloned());
                    aux_attrs
                        .kept_defines
                        .extend(contribution.kept_defines.iter().cloned());
                    aux_attrs
                        .include_dirs
                        .extend(contribution.include_dirs.iter().cloned());
                    aux_hdrs.extend(contribution.hdrs.iter().copied());
                    aux_deps.extend(contribution.deps.iter().copied());
                    aux_attrs.contributions.insert(*src, contribution);
                }
            }
            if !attrs.contributions.is_empty() {
                attrs.copts.clear();
                attrs.defines.clear();
                attrs.kept_defines.clear();
                attrs.include_dirs.clear();
                for contribution in attrs.contributions.values() {
                    attrs.copts.extend(contribution.copts.iter().cloned());
                    attrs.defines.extend(contribution.defines.iter().cloned());
                    attrs
                        .kept_defines
                        .extend(contribution.kept_defines.iter().cloned());
                    attrs
                        .include_dirs
                        .extend(contribution.include_dirs.iter().cloned());
                }
            }
        } else {
            aux_attrs.copts = attrs.copts.clone();
            aux_attrs.defines = attrs.defines.clone();
            aux_attrs.kept_defines = attrs.kept_defines.clone();
            aux_attrs.include_dirs = attrs.include_dirs.clone();
            aux_hdrs = original.hdrs.clone();
            aux_deps = original.deps.clone();
        }

        for src in &c_srcs {
            original.srcs.remove(src);
        }

        let aux_target = &mut self.targets[aux.0];
        aux_target.srcs.extend(c_srcs);
        aux_target.hdrs.extend(aux_hdrs);
        aux_target.deps.extend(aux_deps.into_iter().filter(|&d| d != aux));
        aux_target.details = TargetDetails::Cc(aux_attrs);

        self.add_dep(id, aux);
        self.emit(aux);
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::{Contribution, IncludeDir};

    fn library(registry: &mut TargetRegistry, name: &str) -> TargetId {
        let id = registry.get_or_insert(TargetKind::CcLibrary, name, "src", || {
            TargetDetails::Cc(CcAttrs::new(CcRule::Library))
        });
        registry.emit(id);
        id
    }

    fn file(registry: &mut TargetRegistry, name: &str) -> TargetId {
        registry.get_or_insert(TargetKind::ExportedFile, name, "src", || {
            TargetDetails::ExportedFile
        })
    }

    #[test]
    fn test_get_or_insert_is_unique() {
        let mut registry = TargetRegistry::new();
        let a = library(&mut registry, "a");
        let again = library(&mut registry, "a");
        assert_eq!(a, again);
        let file = file(&mut registry, "a");
        assert_ne!(a, file);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_closures_are_transitive_and_memoized() {
        let mut registry = TargetRegistry::new();
        let a = library(&mut registry, "a");
        let b = library(&mut registry, "b");
        let c = library(&mut registry, "c");
        let h = file(&mut registry, "c.h");
        registry.add_dep(a, b);
        registry.add_dep(b, c);
        registry.add_hdr(c, h);

        let deps = registry.all_deps(a);
        assert!(deps.contains(&b) && deps.contains(&c));
        assert!(!deps.contains(&a));
        assert!(Rc::ptr_eq(&deps, &registry.all_deps(a)));
        assert!(registry.all_headers(a).contains(&h));

        for d in registry.all_deps(a).iter() {
            for dd in registry.all_deps(*d).iter() {
                assert!(registry.all_deps(a).contains(dd));
            }
        }
    }

    #[test]
    fn test_emitted_deps_drop_redundant_edges() {
        let mut registry = TargetRegistry::new();
        let app = library(&mut registry, "app");
        let a = library(&mut registry, "a");
        let b = library(&mut registry, "b");
        registry.add_dep(app, a);
        registry.add_dep(app, b);
        registry.add_dep(a, b);
        assert_eq!(registry.emitted_deps(app), vec![a]);

        let h = file(&mut registry, "b.h");
        registry.add_hdr(b, h);
        registry.add_hdr(app, h);
        assert!(registry.emitted_headers(app).is_empty());
    }

    #[test]
    fn test_emitted_deps_keep_one_of_a_cycle() {
        let mut registry = TargetRegistry::new();
        let app = library(&mut registry, "app");
        let a = library(&mut registry, "a");
        let b = library(&mut registry, "b");
        registry.add_dep(app, a);
        registry.add_dep(app, b);
        registry.add_dep(a, b);
        registry.add_dep(b, a);
        assert_eq!(registry.emitted_deps(app), vec![a]);
    }

    #[test]
    fn test_incompatible_dependency() {
        let mut registry = TargetRegistry::new();
        let proto = registry.get_or_insert(TargetKind::ProtoLibrary, "foo_proto", "src", || {
            TargetDetails::ProtoLibrary {
                strip_import_prefix: None,
            }
        });
        let lib = library(&mut registry, "lib");
        registry.add_dep(proto, lib);
        let err = registry.check_dependencies(proto).unwrap_err();
        assert!(matches!(err, TargetError::IncompatibleDependency { .. }));
        assert!(registry.check_dependencies(lib).is_ok());
    }

    #[test]
    fn test_split_mixed_languages() {
        let mut registry = TargetRegistry::new();
        let lib = library(&mut registry, "lib");
        let dep = library(&mut registry, "dep");
        let c_src = file(&mut registry, "a.c");
        let cpp_src = file(&mut registry, "b.cpp");
        let header = file(&mut registry, "lib.h");
        registry.add_src(lib, c_src);
        registry.add_src(lib, cpp_src);

        let mut c_part = Contribution {
            language: Language::C,
            ..Default::default()
        };
        c_part.copts.insert("-Wno-pointer-sign".to_string());
        c_part.hdrs.insert(header);
        c_part.deps.insert(dep);
        c_part.include_dirs.insert(IncludeDir::source("src"));
        let mut cpp_part = Contribution::default();
        cpp_part.copts.insert("-Wall".to_string());

        {
            let attrs = registry.get_mut(lib).cc_mut().unwrap();
            attrs.copts.insert("-Wno-pointer-sign".to_string());
            attrs.copts.insert("-Wall".to_string());
            attrs.contributions.insert(c_src, c_part);
            attrs.contributions.insert(cpp_src, cpp_part);
        }
        registry.add_hdr(lib, header);
        registry.add_dep(lib, dep);

        registry.split_mixed_languages();

        let aux = registry
            .find(TargetKind::CcLibrary, "_lib_c", "src")
            .unwrap();
        assert!(registry.is_emitted(aux));
        let aux_target = registry.get(aux);
        assert!(aux_target.srcs.contains(&c_src));
        assert!(!aux_target.srcs.contains(&cpp_src));
        assert!(aux_target.hdrs.contains(&header));
        assert!(aux_target.deps.contains(&dep));
        assert!(aux_target.cc().unwrap().copts.contains("-Wno-pointer-sign"));

        let lib_target = registry.get(lib);
        assert!(lib_target.deps.contains(&aux));
        assert!(!lib_target.srcs.contains(&c_src));
        assert!(lib_target.srcs.contains(&cpp_src));
        let copts = &lib_target.cc().unwrap().copts;
        assert!(copts.contains("-Wall"));
        assert!(!copts.contains("-Wno-pointer-sign"));
    }
}
