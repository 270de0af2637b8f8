//! Compiler and linker flag filtering.

use std::collections::BTreeSet;

/// Flags taking their value as the next argument; both are dropped.
const DROP_WITH_VALUE: &[&str] = &["-arch", "-isysroot", "-target", "-L"];

/// Flags dropped by prefix. They describe the toolchain, not the target.
const DROP_PREFIXES: &[&str] = &[
    "-std=", "-g", "-O", "-march", "-mtune", "-mcpu", "-fPIC", "--sysroot", "-L", "-l", "-Wl,",
];

/// Defines never carried over.
const DROP_DEFINES: &[&str] = &["NDEBUG"];

/// Flags and defines of one compile action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileFlags {
    pub copts: BTreeSet<String>,
    pub defines: BTreeSet<String>,
    /// Defines on the allowlist.
    pub kept_defines: BTreeSet<String>,
}

/// Splits `DEFINES` and `FLAGS` into what the generated targets declare.
#[derive(Debug, Clone, Default)]
pub struct FlagFilter {
    keep_defines: BTreeSet<String>,
    drop_flags: Vec<String>,
}

impl FlagFilter {
    pub fn new(keep_defines: impl IntoIterator<Item = String>, drop_flags: Vec<String>) -> Self {
        FlagFilter {
            keep_defines: keep_defines.into_iter().collect(),
            drop_flags,
        }
    }

    /// Filter the `DEFINES` and `FLAGS` variables of a compile action.
    pub fn compile_flags(&self, defines: &str, flags: &str) -> CompileFlags {
        let mut result = CompileFlags::default();
        for token in defines.split_whitespace() {
            if let Some(define) = token.strip_prefix("-D") {
                self.add_define(&mut result, define);
            }
        }

        let mut tokens = flags.split_whitespace();
        while let Some(token) = tokens.next() {
            if DROP_WITH_VALUE.contains(&token) {
                tokens.next();
                continue;
            }
            if let Some(define) = token.strip_prefix("-D") {
                self.add_define(&mut result, define);
                continue;
            }
            if self.is_dropped(token) {
                continue;
            }
            result.copts.insert(token.to_string());
        }
        result
    }

    fn add_define(&self, result: &mut CompileFlags, define: &str) {
        let define = define.replace('"', "");
        let name = define.split('=').next().unwrap_or_default();
        if name.is_empty() || DROP_DEFINES.contains(&name) {
            return;
        }
        if self.keep_defines.contains(name) {
            result.kept_defines.insert(define);
        } else {
            result.defines.insert(define);
        }
    }

    fn is_dropped(&self, flag: &str) -> bool {
        DROP_PREFIXES.iter().any(|p| flag.starts_with(p))
            || self.drop_flags.iter().any(|p| flag.starts_with(p.as_str()))
    }
}

/// Library flags of a link action that survive as `linkopts`.
pub fn linkopts(link_libraries: &str) -> BTreeSet<String> {
    link_libraries
        .split_whitespace()
        .filter(|lib| (lib.starts_with("-l") && lib.len() > 2) || *lib == "-pthread")
        .map(str::to_string)
        .collect()
}
