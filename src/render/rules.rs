//! Declarations of individual targets.

use std::collections::{BTreeMap, BTreeSet};

use super::cc_import::render_import;
use super::common::CommonFlags;
use super::RuleWriter;
use crate::core::registry::TargetRegistry;
use crate::core::target::{
    label, CcAttrs, IncludeDir, Target, TargetDetails, TargetError, TargetId, TargetKind,
};

/// gRPC runtime every `cc_grpc_library` links against.
const GRPC_RUNTIME: &str = "@com_github_grpc_grpc//:grpc++";

/// Rendering context of one output directory.
pub struct Scope<'a> {
    pub registry: &'a TargetRegistry,
    pub dir: &'a str,
    pub common: CommonFlags,
}

impl Scope<'_> {
    /// Label of `id` as written in this directory.
    ///
    /// Files of the same package are written bare. Genrule outputs must be
    /// declared by their rule.
    pub fn reference(&self, id: TargetId) -> Result<String, TargetError> {
        let target = self.registry.get(id);
        match target.kind() {
            TargetKind::GenruleOutput => {
                if let TargetDetails::GenruleOutput { rule } = target.details {
                    let rule = self.registry.get(rule);
                    let declared = rule
                        .genrule()
                        .is_some_and(|attrs| attrs.output(&target.name).is_some());
                    if !declared {
                        return Err(TargetError::UnknownOutput {
                            rule: rule.to_string(),
                            output: target.name.clone(),
                        });
                    }
                }
            }
            TargetKind::ExportedFile if target.location == self.dir => {
                return Ok(target.name.clone());
            }
            _ => {}
        }
        Ok(label::label(&target.name, &target.location, self.dir))
    }

    /// Sorted, deduplicated labels.
    pub fn references(
        &self,
        ids: impl IntoIterator<Item = TargetId>,
    ) -> Result<Vec<String>, TargetError> {
        let mut labels = ids
            .into_iter()
            .map(|id| self.reference(id))
            .collect::<Result<Vec<_>, _>>()?;
        label::sort_labels(&mut labels);
        Ok(labels)
    }
}

/// `-I` flag of an include directory.
pub fn include_flag(dir: &IncludeDir) -> String {
    match (dir.generated, dir.path.as_str()) {
        (true, "") => "-I$(GENDIR)".to_string(),
        (true, path) => format!("-I$(GENDIR)/{}", path),
        (false, path) => format!("-I{}", path),
    }
}

/// Flag attributes of a C/C++ target as rendered: local defines and include
/// directories become copts, allow-listed defines stay `defines`.
pub fn flag_sets(attrs: &CcAttrs) -> BTreeMap<&'static str, BTreeSet<String>> {
    let mut copts = attrs.copts.clone();
    copts.extend(attrs.defines.iter().map(|d| format!("-D{}", d)));
    copts.extend(attrs.include_dirs.iter().map(include_flag));

    let mut sets = BTreeMap::new();
    sets.insert("copts", copts);
    sets.insert("defines", attrs.kept_defines.clone());
    sets.insert("linkopts", attrs.linkopts.clone());
    sets
}

/// Every declaration `id` renders as.
pub fn declarations(scope: &Scope<'_>, id: TargetId) -> Result<Vec<Vec<String>>, TargetError> {
    let registry = scope.registry;
    registry.check_dependencies(id)?;
    let target = registry.get(id);

    let declaration = match target.kind() {
        TargetKind::CcLibrary | TargetKind::CcBinary | TargetKind::CcTest => {
            cc_rule(scope, id, target)?
        }
        TargetKind::CcSharedLibrary => {
            let mut rule = RuleWriter::new(target.kind().rule_name(), &target.name);
            rule.list("deps", &scope.references(registry.emitted_deps(id))?);
            rule.public();
            rule.finish()
        }
        TargetKind::Genrule => genrule(scope, target)?,
        TargetKind::ProtoLibrary => {
            let mut rule = RuleWriter::new("proto_library", &target.name);
            rule.list("srcs", &scope.references(target.srcs.iter().copied())?);
            if let TargetDetails::ProtoLibrary {
                strip_import_prefix: Some(prefix),
            } = &target.details
            {
                rule.string("strip_import_prefix", prefix);
            }
            rule.list("deps", &scope.references(registry.emitted_deps(id))?);
            rule.public();
            rule.finish()
        }
        TargetKind::CcProtoLibrary => {
            let mut rule = RuleWriter::new("cc_proto_library", &target.name);
            rule.list("deps", &scope.references(target.deps.iter().copied())?);
            rule.public();
            rule.finish()
        }
        TargetKind::CcGrpcLibrary => {
            let mut rule = RuleWriter::new("cc_grpc_library", &target.name);
            rule.list("srcs", &scope.references(target.srcs.iter().copied())?);
            rule.raw("grpc_only", "True");
            let mut deps = scope.references(target.deps.iter().copied())?;
            deps.push(GRPC_RUNTIME.to_string());
            label::sort_labels(&mut deps);
            rule.list("deps", &deps);
            rule.public();
            rule.finish()
        }
        TargetKind::ShBinary => {
            let mut rule = RuleWriter::new("sh_binary", &target.name);
            rule.list("srcs", &scope.references(target.srcs.iter().copied())?);
            rule.finish()
        }
        TargetKind::CcImport => {
            let deps = scope.references(target.deps.iter().copied())?;
            return Ok(match target.import() {
                Some(import) => render_import(&target.name, import, &deps),
                None => Vec::new(),
            });
        }
        TargetKind::GenruleOutput
        | TargetKind::ExportedFile
        | TargetKind::External
        | TargetKind::ManuallyGenerated => return Ok(Vec::new()),
    };
    Ok(vec![declaration])
}

fn cc_rule(scope: &Scope<'_>, id: TargetId, target: &Target) -> Result<Vec<String>, TargetError> {
    let registry = scope.registry;
    let kind = target.kind();
    let mut rule = RuleWriter::new(kind.rule_name(), &target.name);

    let headers = registry.emitted_headers(id);
    if kind == TargetKind::CcLibrary {
        rule.list("srcs", &scope.references(target.srcs.iter().copied())?);
        rule.list("hdrs", &scope.references(headers)?);
    } else {
        let srcs = target.srcs.iter().copied().chain(headers);
        rule.list("srcs", &scope.references(srcs)?);
    }

    if let Some(attrs) = target.cc() {
        for (attr, values) in flag_sets(attrs) {
            match scope.common.get(attr).filter(|common| common.is_subset(&values)) {
                Some(common) => {
                    let rest: Vec<String> = values.difference(common).cloned().collect();
                    rule.sum(attr, &format!("common_{}", attr), &rest);
                }
                None => {
                    let values: Vec<String> = values.into_iter().collect();
                    rule.list(attr, &values);
                }
            }
        }
        rule.list("data", &scope.references(attrs.data.iter().copied())?);
    }

    rule.list("deps", &scope.references(registry.emitted_deps(id))?);
    if kind == TargetKind::CcLibrary || kind == TargetKind::CcBinary {
        rule.public();
    }
    Ok(rule.finish())
}

fn genrule(scope: &Scope<'_>, target: &Target) -> Result<Vec<String>, TargetError> {
    let mut rule = RuleWriter::new("genrule", &target.name);
    rule.list("srcs", &scope.references(target.srcs.iter().copied())?);
    let Some(attrs) = target.genrule() else {
        return Ok(rule.finish());
    };
    let outs: Vec<String> = attrs.outs.iter().cloned().collect();
    rule.list("outs", &outs);
    rule.raw("cmd", &triple_quote(&attrs.cmd));
    if attrs.local {
        rule.raw("local", "True");
    }
    rule.list("tools", &scope.references(attrs.tools.iter().copied())?);
    rule.public();
    Ok(rule.finish())
}

/// A `"""`-delimited string literal.
fn triple_quote(s: &str) -> String {
    let mut escaped = s.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"");
    if escaped.ends_with('"') {
        escaped.pop();
        escaped.push_str("\\\"");
    }
    format!("\"\"\"{}\"\"\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::{CcRule, GenruleAttrs};

    #[test]
    fn test_include_flags() {
        assert_eq!(include_flag(&IncludeDir::source("xar")), "-Ixar");
        assert_eq!(include_flag(&IncludeDir::generated("gen")), "-I$(GENDIR)/gen");
        assert_eq!(include_flag(&IncludeDir::generated("")), "-I$(GENDIR)");
    }

    #[test]
    fn test_flag_sets_fold_defines_and_includes_into_copts() {
        let mut attrs = CcAttrs::new(CcRule::Library);
        attrs.copts.insert("-Wall".to_string());
        attrs.defines.insert("DEF2".to_string());
        attrs.kept_defines.insert("KEEP".to_string());
        attrs.include_dirs.insert(IncludeDir::source("."));
        let sets = flag_sets(&attrs);
        let copts: Vec<&str> = sets["copts"].iter().map(String::as_str).collect();
        assert_eq!(copts, vec!["-DDEF2", "-I.", "-Wall"]);
        assert_eq!(sets["defines"].len(), 1);
        assert!(sets["linkopts"].is_empty());
    }

    #[test]
    fn test_triple_quote() {
        assert_eq!(triple_quote("echo \"a\\b\""), "\"\"\"echo \"a\\\\b\\\"\"\"\"");
        assert_eq!(triple_quote("cd gen && ./run"), "\"\"\"cd gen && ./run\"\"\"");
    }

    #[test]
    fn test_undeclared_genrule_output_is_rejected() {
        let mut registry = TargetRegistry::new();
        let rule = registry.get_or_insert(TargetKind::Genrule, "gen_command", "gen", || {
            TargetDetails::Genrule(GenruleAttrs::default())
        });
        let out = registry.get_or_insert(TargetKind::GenruleOutput, "missing.h", "gen", || {
            TargetDetails::GenruleOutput { rule }
        });
        let scope = Scope {
            registry: &registry,
            dir: "gen",
            common: CommonFlags::default(),
        };
        assert!(matches!(
            scope.reference(out),
            Err(TargetError::UnknownOutput { ref output, .. }) if output == "missing.h"
        ));
    }

    #[test]
    fn test_references_are_sorted_by_class() {
        let mut registry = TargetRegistry::new();
        let remote = registry.get_or_insert(TargetKind::CcLibrary, "util", "base", || {
            TargetDetails::Cc(CcAttrs::new(CcRule::Library))
        });
        let local = registry.get_or_insert(TargetKind::CcLibrary, "core", "app", || {
            TargetDetails::Cc(CcAttrs::new(CcRule::Library))
        });
        let external = registry.get_or_insert(TargetKind::External, "zlib", "@zlib//", || {
            TargetDetails::External
        });
        let scope = Scope {
            registry: &registry,
            dir: "app",
            common: CommonFlags::default(),
        };
        assert_eq!(
            scope.references([external, remote, local]).unwrap(),
            vec![":core", "//base:util", "@zlib//:zlib"]
        );
    }
}
