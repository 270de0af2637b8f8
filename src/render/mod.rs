//! Build file rendering.
//!
//! Every emitted target is written to the build file of its output
//! directory. A file holds, in order: the `load()` statements, the hoisted
//! `common_*` flag lists, the `exports_files()` of files other packages
//! reference, and the declarations sorted by name.

mod cc_import;
mod common;
mod loads;
mod rules;

use std::collections::{BTreeMap, BTreeSet};

use crate::core::registry::TargetRegistry;
use crate::core::target::{label, TargetError, TargetId, TargetKind};

use common::CommonFlags;
use loads::Loads;
use rules::Scope;

/// Rendered build files, keyed by directory relative to the root dir.
pub type BuildFiles = BTreeMap<String, String>;

/// A Starlark string literal.
pub(crate) fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Writer for one rule invocation, one attribute per line.
pub(crate) struct RuleWriter {
    lines: Vec<String>,
}

impl RuleWriter {
    pub fn new(rule: &str, name: &str) -> Self {
        RuleWriter {
            lines: vec![format!("{}(", rule), format!("    name = {},", quote(name))],
        }
    }

    pub fn string(&mut self, attr: &str, value: &str) {
        self.raw(attr, &quote(value));
    }

    pub fn raw(&mut self, attr: &str, value: &str) {
        self.lines.push(format!("    {} = {},", attr, value));
    }

    /// A string list; skipped when empty.
    pub fn list(&mut self, attr: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        let value = list_value(items, "    ");
        self.raw(attr, &value);
    }

    /// `<base> + [...]`, or just `<base>` when nothing is added.
    pub fn sum(&mut self, attr: &str, base: &str, items: &[String]) {
        if items.is_empty() {
            self.raw(attr, base);
        } else {
            let value = format!("{} + {}", base, list_value(items, "    "));
            self.raw(attr, &value);
        }
    }

    pub fn public(&mut self) {
        self.raw("visibility", "[\"//visibility:public\"]");
    }

    pub fn finish(mut self) -> Vec<String> {
        self.lines.push(")".to_string());
        self.lines
    }
}

/// One item on a single line, more items one per line.
fn list_value(items: &[String], indent: &str) -> String {
    match items {
        [single] => format!("[{}]", quote(single)),
        _ => {
            let mut value = String::from("[\n");
            for item in items {
                value.push_str(&format!("{}    {},\n", indent, quote(item)));
            }
            value.push_str(indent);
            value.push(']');
            value
        }
    }
}

/// Render the build file of every directory holding an emitted target.
///
/// Fails when a target depends on a variant its rule cannot consume, or
/// references a genrule output the rule does not declare.
pub fn render(registry: &TargetRegistry) -> Result<BuildFiles, TargetError> {
    let mut by_dir: BTreeMap<String, Vec<TargetId>> = BTreeMap::new();
    for (id, target) in registry.emitted() {
        let dir = target.output_dir();
        if !target.kind().is_declared() || label::is_absolute(dir) {
            continue;
        }
        by_dir.entry(dir.to_string()).or_default().push(id);
    }

    let exports = exported_files(registry, &by_dir);
    let dirs: BTreeSet<&String> = by_dir.keys().chain(exports.keys()).collect();

    let mut files = BuildFiles::new();
    for dir in dirs {
        let ids = by_dir.get(dir).map(Vec::as_slice).unwrap_or_default();
        let content = render_dir(registry, dir, ids, exports.get(dir))?;
        tracing::debug!("rendered {} targets for '{}'", ids.len(), dir);
        files.insert(dir.clone(), content);
    }
    Ok(files)
}

/// Files referenced from another directory, per owning package.
fn exported_files(
    registry: &TargetRegistry,
    by_dir: &BTreeMap<String, Vec<TargetId>>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut exports: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (dir, ids) in by_dir {
        for &id in ids {
            let target = registry.get(id);
            let data = target.cc().into_iter().flat_map(|attrs| attrs.data.iter());
            let referenced = target.srcs.iter().chain(&target.hdrs).chain(data);
            for &file in referenced {
                let file = registry.get(file);
                if file.kind() == TargetKind::ExportedFile
                    && &file.location != dir
                    && !label::is_absolute(&file.location)
                {
                    exports
                        .entry(file.location.clone())
                        .or_default()
                        .insert(file.name.clone());
                }
            }
        }
    }
    exports
}

fn render_dir(
    registry: &TargetRegistry,
    dir: &str,
    ids: &[TargetId],
    exports: Option<&BTreeSet<String>>,
) -> Result<String, TargetError> {
    let mut ids = ids.to_vec();
    ids.sort_by(|a, b| {
        let (a, b) = (registry.get(*a), registry.get(*b));
        a.name.cmp(&b.name).then(a.kind().cmp(&b.kind()))
    });

    let flag_sets: Vec<_> = ids
        .iter()
        .map(|&id| registry.get(id))
        .filter(|target| target.kind() != TargetKind::CcSharedLibrary)
        .filter_map(|target| target.cc())
        .map(rules::flag_sets)
        .collect();
    let scope = Scope {
        registry,
        dir,
        common: CommonFlags::compute(&flag_sets),
    };

    let mut loads = Loads::new();
    for &id in &ids {
        let target = registry.get(id);
        match target.import() {
            Some(import) if import.alias.is_some() => {}
            Some(import) => {
                loads.add_kind(TargetKind::CcImport);
                if !import.skip_wrapping {
                    loads.add_kind(TargetKind::CcLibrary);
                }
            }
            None => loads.add_kind(target.kind()),
        }
    }

    let locations: BTreeSet<&str> = ids
        .iter()
        .map(|&id| registry.get(id).location.as_str())
        .collect();
    let annotate = locations.len() > 1;

    let mut sections: Vec<Vec<String>> = Vec::new();
    if !loads.is_empty() {
        sections.push(loads.render());
    }
    if !scope.common.is_empty() {
        let mut definitions = scope.common.definitions();
        definitions.pop();
        sections.push(definitions);
    }
    if let Some(files) = exports {
        let files: Vec<String> = files.iter().cloned().collect();
        sections.push(vec![format!("exports_files({})", list_value(&files, ""))]);
    }
    for &id in &ids {
        let target = registry.get(id);
        for (i, mut declaration) in rules::declarations(&scope, id)?.into_iter().enumerate() {
            if annotate && i == 0 {
                declaration.insert(0, format!("# Location {}", location_comment(&target.location)));
            }
            sections.push(declaration);
        }
    }

    let mut content = sections
        .into_iter()
        .map(|lines| lines.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n");
    content.push('\n');
    Ok(content)
}

fn location_comment(location: &str) -> String {
    if label::is_absolute(location) {
        location.to_string()
    } else {
        format!("//{}", location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::{CcAttrs, CcRule, CcImport, TargetDetails};

    fn library(registry: &mut TargetRegistry, name: &str, location: &str) -> TargetId {
        let id = registry.get_or_insert(TargetKind::CcLibrary, name, location, || {
            TargetDetails::Cc(CcAttrs::new(CcRule::Library))
        });
        registry.emit(id);
        id
    }

    fn file(registry: &mut TargetRegistry, name: &str, location: &str) -> TargetId {
        registry.get_or_insert(TargetKind::ExportedFile, name, location, || {
            TargetDetails::ExportedFile
        })
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn test_list_layout() {
        let mut rule = RuleWriter::new("cc_library", "a");
        rule.list("srcs", &["a.cc".to_string()]);
        rule.list("hdrs", &[]);
        rule.list("deps", &[":b".to_string(), ":c".to_string()]);
        rule.sum("copts", "common_copts", &[]);
        assert_eq!(
            rule.finish().join("\n"),
            "cc_library(\n    name = \"a\",\n    srcs = [\"a.cc\"],\n    deps = [\n        \":b\",\n        \":c\",\n    ],\n    copts = common_copts,\n)"
        );
    }

    #[test]
    fn test_render_library_and_binary() {
        let mut registry = TargetRegistry::new();
        let lib = library(&mut registry, "logging", "xar");
        let src = file(&mut registry, "Logging.cpp", "xar");
        let hdr = file(&mut registry, "Logging.h", "xar");
        registry.add_src(lib, src);
        registry.add_hdr(lib, hdr);

        let app = registry.get_or_insert(TargetKind::CcBinary, "app", "tools", || {
            TargetDetails::Cc(CcAttrs::new(CcRule::Binary))
        });
        registry.emit(app);
        let main = file(&mut registry, "main.cpp", "tools");
        registry.add_src(app, main);
        registry.add_dep(app, lib);

        let files = render(&registry).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(
            files["xar"],
            "load(\"@rules_cc//cc:defs.bzl\", \"cc_library\")\n\n\
             cc_library(\n    name = \"logging\",\n    srcs = [\"Logging.cpp\"],\n    hdrs = [\"Logging.h\"],\n    visibility = [\"//visibility:public\"],\n)\n"
        );
        assert!(files["tools"].contains("    deps = [\"//xar:logging\"],"));
        assert!(files["tools"].starts_with("load(\"@rules_cc//cc:defs.bzl\", \"cc_binary\")"));
    }

    #[test]
    fn test_files_used_elsewhere_are_exported() {
        let mut registry = TargetRegistry::new();
        let lib = library(&mut registry, "core", "core");
        let src = file(&mut registry, "shared/util.cc", "common");
        registry.add_src(lib, src);

        let files = render(&registry).unwrap();
        assert_eq!(files["common"], "exports_files([\"shared/util.cc\"])\n");
        assert!(files["core"].contains("srcs = [\"//common:shared/util.cc\"],"));
    }

    #[test]
    fn test_common_flags_are_hoisted() {
        let mut registry = TargetRegistry::new();
        for name in ["a", "b", "c"] {
            let id = library(&mut registry, name, "lib");
            let attrs = registry.get_mut(id).cc_mut().unwrap();
            attrs.copts.insert("-Wall".to_string());
            if name == "c" {
                attrs.copts.insert("-Wextra".to_string());
            }
        }
        let files = render(&registry).unwrap();
        let content = &files["lib"];
        assert!(content.contains("common_copts = [\n    \"-Wall\",\n]"));
        assert!(content.contains("    copts = common_copts,\n"));
        assert!(content.contains("    copts = common_copts + [\"-Wextra\"],\n"));
    }

    #[test]
    fn test_imports_render_in_descriptor_dir() {
        let mut registry = TargetRegistry::new();
        let zlib = registry.get_or_insert(TargetKind::CcImport, "zlib", "@cpp_ext_libs//", || {
            TargetDetails::Import(CcImport {
                hdrs: vec!["/opt/z/include/z.h".to_string()],
                static_library: Some("/opt/z/lib/libz.a".to_string()),
                ..CcImport::default()
            })
        });
        registry.get_mut(zlib).physical_location = Some("third_party".to_string());
        registry.emit(zlib);
        let lib = library(&mut registry, "core", "core");
        registry.add_dep(lib, zlib);

        let files = render(&registry).unwrap();
        assert!(files["third_party"]
            .starts_with("load(\"@rules_cc//cc:defs.bzl\", \"cc_import\", \"cc_library\")"));
        assert!(files["third_party"].contains("name = \"raw_zlib\""));
        assert!(files["core"].contains("deps = [\"@cpp_ext_libs//:zlib\"],"));
    }

    #[test]
    fn test_incompatible_dependency_fails() {
        let mut registry = TargetRegistry::new();
        let proto = registry.get_or_insert(TargetKind::ProtoLibrary, "api_proto", "proto", || {
            TargetDetails::ProtoLibrary {
                strip_import_prefix: None,
            }
        });
        registry.emit(proto);
        let lib = library(&mut registry, "core", "proto");
        registry.add_dep(proto, lib);
        assert!(matches!(
            render(&registry),
            Err(TargetError::IncompatibleDependency { .. })
        ));
    }
}
