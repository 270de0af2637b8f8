//! Command extraction and custom-command rewriting.
//!
//! A rule's command template usually chains housekeeping steps around the
//! one invocation that matters (`cd dir && tool ... && cmake -E touch`).
//! [`core_command`] digs that invocation out; the rest of this module turns
//! a custom command into the pieces of a `genrule`.

use std::collections::BTreeSet;

use super::classify::{is_cmake_utility, CUSTOM_COMMAND_RULE};
use super::naming::is_python;
use crate::core::graph::{Action, BuildGraph};
use crate::ninja::evaluate;
use crate::util::fs::strip_dir_prefix;

/// Variables kept unexpanded while looking for the core command.
const PLACEHOLDERS: &[&str] = &["in", "out", "TARGET_FILE"];

/// Output-directory reference used in place of the build directory.
pub const RULE_DIR: &str = "$(RULEDIR)/";

/// The invocation an action exists for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreCommand {
    pub command: String,
    /// Directory the command runs in, relative to the build directory.
    pub run_dir: Option<String>,
}

/// Extract the core command of an action.
///
/// Returns `None` when the action has no command or only runs CMake
/// housekeeping.
pub fn core_command(graph: &BuildGraph, action: &Action) -> Option<CoreCommand> {
    action.rule.command()?;
    let resolved = evaluate(graph, action, "command", PLACEHOLDERS);
    let custom = action.rule.name == CUSTOM_COMMAND_RULE;
    let workdir = action.workdir().unwrap_or_default();

    let mut run_dir = None;
    let mut fallback = None;
    for part in resolved.split("&&").map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(dir) = part.strip_prefix("cd ") {
            run_dir = Some(relative_run_dir(dir.trim(), workdir));
            continue;
        }
        if part == ":" || part.starts_with('$') || is_cmake_utility(part) {
            continue;
        }
        let is_core = if custom {
            action
                .inputs
                .iter()
                .map(|&i| graph.node(i))
                .any(|n| n.is_file && part.contains(n.name.as_str()))
        } else {
            part.contains("$in") && (part.contains("$out") || part.contains("$TARGET_FILE"))
        };
        if is_core {
            return Some(CoreCommand {
                command: part.to_string(),
                run_dir,
            });
        }
        fallback.get_or_insert(part);
    }
    fallback.map(|part| CoreCommand {
        command: part.to_string(),
        run_dir,
    })
}

fn relative_run_dir(dir: &str, workdir: &str) -> String {
    strip_dir_prefix(dir, workdir).unwrap_or(dir).to_string()
}

/// Remove every occurrence of the root directory, leaving paths relative
/// to it.
pub fn strip_root(command: &str, root_dir: &str) -> String {
    let root = root_dir.trim_end_matches('/');
    if root.is_empty() {
        return command.to_string();
    }
    command
        .replace(&format!("{}/", root), "")
        .replace(root, ".")
}

/// An input of a custom command as it appears on the command line, and its
/// label as seen from the genrule's package.
#[derive(Debug, Clone)]
pub struct CommandInput {
    pub name: String,
    pub label: String,
}

/// Everything needed to rewrite the arguments of a custom command.
#[derive(Debug)]
pub struct ArgRewriter<'a> {
    /// Build directory as written in the command.
    pub workdir: &'a str,
    /// Declared outputs of the genrule.
    pub outs: &'a BTreeSet<String>,
    pub inputs: &'a [CommandInput],
}

impl ArgRewriter<'_> {
    /// Rewrite arguments naming inputs or outputs into `$(location)`
    /// references. Paths into the build directory are redirected to the
    /// rule's output directory.
    pub fn rewrite<'s>(&self, args: impl IntoIterator<Item = &'s str>) -> Vec<String> {
        let mut rewritten = Vec::new();
        for arg in args {
            if arg.starts_with('-') {
                rewritten.push(self.redirect(arg));
                continue;
            }
            if let Some(out) = self.output_for(arg) {
                rewritten.push(format!("$(location :{})", out));
                continue;
            }
            if let Some(input) = self.inputs.iter().find(|i| i.name == arg) {
                rewritten.push(format!("$(location {})", input.label));
                continue;
            }
            rewritten.push(self.redirect(arg));
        }
        rewritten
    }

    /// Declared output named by `arg`: the output it spells out, else the
    /// longest output it ends with, else the only output sharing its file
    /// name.
    fn output_for(&self, arg: &str) -> Option<&str> {
        let relative = strip_dir_prefix(arg, self.workdir).unwrap_or(arg);
        if let Some(out) = self.outs.get(relative) {
            return Some(out);
        }
        let suffix = self
            .outs
            .iter()
            .filter(|out| relative.ends_with(&format!("/{}", out)))
            .max_by_key(|out| out.len());
        if let Some(out) = suffix {
            return Some(out);
        }
        let base = relative.rsplit('/').next().unwrap_or(relative);
        if base.is_empty() {
            return None;
        }
        let mut named = self
            .outs
            .iter()
            .filter(|out| out.as_str() == base || out.ends_with(&format!("/{}", base)));
        match (named.next(), named.next()) {
            (Some(out), None) => Some(out),
            (Some(_), Some(_)) => {
                tracing::debug!("{} matches several outputs, left as is", arg);
                None
            }
            _ => None,
        }
    }

    fn redirect(&self, arg: &str) -> String {
        let workdir = self.workdir.trim_end_matches('/');
        if workdir.is_empty() || !arg.contains(workdir) {
            return arg.to_string();
        }
        arg.replace(&format!("{}/", workdir), RULE_DIR)
            .replace(workdir, RULE_DIR.trim_end_matches('/'))
    }
}

/// Genrule command writing the wrapper script around a custom command's
/// tool.
///
/// The script turns arguments naming files of the execution root into
/// absolute paths, puts the source root on `PYTHONPATH` and runs the tool
/// from `run_dir` when one is given. `$` is doubled for make-variable
/// expansion; `$@` is the script itself.
pub fn wrapper_script(root_dir: &str, tool: &str, run_dir: Option<&str>) -> String {
    let root = root_dir.trim_end_matches('/');
    let mut script = String::from("cat > $@ <<'EOF'\n");
    script.push_str("#!/bin/bash\n");
    script.push_str("set -e\n");
    script.push_str("cur=$$(pwd)\n");
    script.push_str("args=()\n");
    script.push_str("for arg in \"$$@\"; do\n");
    script.push_str("  if [[ \"$$arg\" == bazel-out/* || -e \"$$cur/$$arg\" ]]; then\n");
    script.push_str("    args+=(\"$$cur/$$arg\")\n");
    script.push_str("  else\n");
    script.push_str("    args+=(\"$$arg\")\n");
    script.push_str("  fi\n");
    script.push_str("done\n");
    script.push_str(&format!("export PYTHONPATH={}:$${{PYTHONPATH:-}}\n", root));
    if let Some(dir) = run_dir.filter(|d| !d.is_empty()) {
        script.push_str(&format!("mkdir -p {dir} && cd {dir}\n"));
    }
    script.push_str(&format!("exec {} \"$${{args[@]}}\"\n", tool));
    script.push_str("EOF\n");
    script.push_str("chmod a+x $@");
    script
}

/// Command line of the tool as the wrapper runs it: relative tools are
/// anchored at the source root, Python scripts go through `python3`.
pub fn tool_invocation(root_dir: &str, tool: &str) -> String {
    let root = root_dir.trim_end_matches('/');
    let path = if tool.starts_with('/') || root.is_empty() || !tool.contains('/') {
        tool.to_string()
    } else {
        format!("{}/{}", root, tool.trim_start_matches("./"))
    };
    if is_python(tool) {
        format!("python3 {}", path)
    } else {
        path
    }
}
