//! Rendering of pre-built library imports.
//!
//! An import renders as a `cc_library` wrapper exposing the include
//! directories, around a `raw_<name>` `cc_import` holding the artifacts.
//! Artifacts are referenced inside the import repository, where an absolute
//! path `/usr/lib/libz.a` lives at `_usr/lib/libz.a`.

use std::collections::{BTreeMap, BTreeSet};

use super::{quote, RuleWriter};
use crate::core::target::CcImport;

/// Include directories the compiler already searches.
const SYSTEM_INCLUDE_DIRS: &[&str] = &["/usr/include", "/usr/local/include"];

/// Path of an absolute file inside the import repository.
pub fn repository_path(path: &str) -> String {
    match path.strip_prefix('/') {
        Some(rest) => format!("_{}", rest),
        None => path.to_string(),
    }
}

/// Smallest set of directories covering `paths`: their longest common
/// directory, or its children where the paths first diverge.
pub fn common_dirs(paths: &[&str]) -> Vec<String> {
    let split: Vec<Vec<&str>> = paths
        .iter()
        .map(|p| {
            let mut parts: Vec<&str> = p.split('/').collect();
            parts.pop();
            parts
        })
        .collect();
    let depth = split.iter().map(Vec::len).min().unwrap_or(0);

    let mut common: Vec<&str> = Vec::new();
    for level in 0..depth {
        let values: BTreeSet<&str> = split.iter().map(|parts| parts[level]).collect();
        if values.len() == 1 {
            common.extend(values);
            continue;
        }
        return values
            .into_iter()
            .map(|value| {
                let mut dir = common.clone();
                dir.push(value);
                dir.join("/")
            })
            .collect();
    }
    vec![common.join("/")]
}

/// The `hdrs` value and the include directories derived from the headers.
fn headers(import: &CcImport) -> (String, BTreeSet<String>) {
    let mut dirs = BTreeSet::new();
    let value = match import.hdrs.as_slice() {
        [] => "[]".to_string(),
        [single] => {
            if let Some((dir, _)) = single.rsplit_once('/') {
                if !dir.is_empty() && !SYSTEM_INCLUDE_DIRS.contains(&dir) {
                    dirs.insert(repository_path(dir));
                }
            }
            format!("[{}]", quote(&repository_path(single)))
        }
        many => {
            let mut by_ext: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for hdr in many {
                let ext = hdr.rsplit('.').next().unwrap_or_default();
                by_ext.entry(ext).or_default().push(hdr);
            }
            let mut globs = Vec::new();
            for (ext, hdrs) in by_ext {
                for dir in common_dirs(&hdrs) {
                    globs.push(quote(&format!("{}/**/*.{}", repository_path(&dir), ext)));
                    dirs.insert(repository_path(&dir));
                }
            }
            if globs.len() == 1 {
                format!("glob([{}])", globs[0])
            } else {
                let items: Vec<String> = globs.iter().map(|g| format!("        {},", g)).collect();
                format!("glob([\n{}\n    ])", items.join("\n"))
            }
        }
    };
    (value, dirs)
}

/// Declarations of one import. `deps` are rendered labels.
pub fn render_import(name: &str, import: &CcImport, deps: &[String]) -> Vec<Vec<String>> {
    if let Some(actual) = &import.alias {
        let mut rule = RuleWriter::new("alias", name);
        rule.string("actual", actual);
        rule.raw("tags", "[\"manual\"]");
        rule.public();
        return vec![rule.finish()];
    }

    let (hdrs, mut dirs) = headers(import);
    if let Some(includes) = &import.includes {
        dirs = includes.iter().map(|d| repository_path(d)).collect();
    }

    let mut declarations = Vec::new();
    let raw_name = if import.skip_wrapping {
        name.to_string()
    } else {
        let raw_name = format!("raw_{}", name);
        let mut wrapper = RuleWriter::new("cc_library", name);
        let dirs: Vec<String> = dirs.into_iter().collect();
        wrapper.list("includes", &dirs);
        wrapper.public();
        wrapper.list("deps", &[format!(":{}", raw_name)]);
        declarations.push(wrapper.finish());
        raw_name
    };

    let mut rule = RuleWriter::new("cc_import", &raw_name);
    rule.raw("hdrs", &hdrs);
    if import.system_provided {
        rule.raw("system_provided", "True");
        if let Some(lib) = &import.shared_library {
            rule.string("interface_library", &repository_path(lib));
        }
    } else if let Some(lib) = &import.shared_library {
        rule.string("shared_library", &repository_path(lib));
    }
    if let Some(lib) = &import.static_library {
        rule.string("static_library", &repository_path(lib));
    }
    rule.public();
    rule.list("deps", deps);
    declarations.push(rule.finish());
    declarations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_dirs() {
        assert_eq!(
            common_dirs(&["/opt/z/include/z.h", "/opt/z/include/zconf.h"]),
            vec!["/opt/z/include"]
        );
        assert_eq!(
            common_dirs(&["/opt/z/include/a/x.h", "/opt/z/include/b/y.h", "/opt/z/include/a/w.h"]),
            vec!["/opt/z/include/a", "/opt/z/include/b"]
        );
        assert_eq!(repository_path("/usr/lib/libz.a"), "_usr/lib/libz.a");
    }

    #[test]
    fn test_wrapped_import() {
        let import = CcImport {
            hdrs: vec!["/opt/z/include/z.h".to_string(), "/opt/z/include/zconf.h".to_string()],
            static_library: Some("/opt/z/lib/libz.a".to_string()),
            ..CcImport::default()
        };
        let decls = render_import("zlib", &import, &[]);
        assert_eq!(decls.len(), 2);
        let wrapper = decls[0].join("\n");
        assert!(wrapper.starts_with("cc_library(\n    name = \"zlib\","));
        assert!(wrapper.contains("includes = [\"_opt/z/include\"],"));
        assert!(wrapper.contains("deps = [\":raw_zlib\"],"));
        let raw = decls[1].join("\n");
        assert!(raw.contains("name = \"raw_zlib\","));
        assert!(raw.contains("hdrs = glob([\"_opt/z/include/**/*.h\"]),"));
        assert!(raw.contains("static_library = \"_opt/z/lib/libz.a\","));
    }

    #[test]
    fn test_system_provided_unwrapped_import() {
        let import = CcImport {
            hdrs: vec!["/usr/include/zstd.h".to_string()],
            shared_library: Some("/usr/lib/libzstd.so".to_string()),
            system_provided: true,
            skip_wrapping: true,
            ..CcImport::default()
        };
        let decls = render_import("zstd", &import, &["//third:common".to_string()]);
        assert_eq!(decls.len(), 1);
        let raw = decls[0].join("\n");
        assert!(raw.contains("name = \"zstd\","));
        assert!(raw.contains("hdrs = [\"_usr/include/zstd.h\"],"));
        assert!(raw.contains("system_provided = True,"));
        assert!(raw.contains("interface_library = \"_usr/lib/libzstd.so\","));
        assert!(raw.contains("deps = [\"//third:common\"],"));
    }

    #[test]
    fn test_alias_import_ignores_artifacts() {
        let import = CcImport {
            hdrs: vec!["/opt/a.h".to_string()],
            alias: Some("@boost//:headers".to_string()),
            ..CcImport::default()
        };
        let decls = render_import("boost", &import, &[]);
        assert_eq!(
            decls,
            vec![vec![
                "alias(".to_string(),
                "    name = \"boost\",".to_string(),
                "    actual = \"@boost//:headers\",".to_string(),
                "    tags = [\"manual\"],".to_string(),
                "    visibility = [\"//visibility:public\"],".to_string(),
                ")".to_string(),
            ]]
        );
    }
}
