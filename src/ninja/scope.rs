//! Variable scopes and `$` expansion.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::core::graph::{Action, BuildGraph, Rule, PHONY};

/// One level of the scope stack: the bindings and rules of a file.
#[derive(Debug, Default)]
struct Frame {
    vars: BTreeMap<String, String>,
    rules: HashMap<String, Rc<Rule>>,
}

/// Stack of variable scopes. `subninja` pushes a frame, `include` does not.
#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<Frame>,
    phony: Rc<Rule>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        ScopeStack {
            frames: vec![Frame::default()],
            phony: Rc::new(Rule::phony()),
        }
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Look a variable up from the innermost scope outwards.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.vars.get(name))
            .map(String::as_str)
    }

    /// Bind a variable in the innermost scope. The value is expanded first.
    pub fn set(&mut self, name: &str, raw_value: &str) {
        let value = expand(raw_value, |n| self.lookup(n).map(str::to_string), &[]);
        if let Some(frame) = self.frames.last_mut() {
            frame.vars.insert(name.to_string(), value);
        }
    }

    pub fn add_rule(&mut self, rule: Rule) {
        if let Some(frame) = self.frames.last_mut() {
            frame.rules.insert(rule.name.clone(), Rc::new(rule));
        }
    }

    pub fn rule(&self, name: &str) -> Option<Rc<Rule>> {
        if name == PHONY {
            return Some(Rc::clone(&self.phony));
        }
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.rules.get(name))
            .cloned()
    }

    /// All visible bindings, inner scopes shadowing outer ones.
    pub fn flatten(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        for frame in &self.frames {
            for (k, v) in &frame.vars {
                vars.insert(k.clone(), v.clone());
            }
        }
        vars
    }
}

/// Characters of an unbraced `$name` reference; `-` needs `${name}`.
fn is_var_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Expand `$name`, `${name}` and the `$$`, `$ `, `$:` escapes.
///
/// Unknown variables expand to nothing. Names listed in `except` are left as
/// literal `$name` references.
pub fn expand<F>(text: &str, lookup: F, except: &[&str]) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match after.chars().next() {
            Some(c @ ('$' | ' ' | ':')) => {
                out.push(c);
                rest = &after[1..];
            }
            Some('{') => match after.find('}') {
                Some(end) => {
                    push_var(&mut out, &after[1..end], &lookup, except);
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[pos..]);
                    rest = "";
                }
            },
            Some(c) if is_var_char(c) => {
                let end = after
                    .find(|ch: char| !is_var_char(ch))
                    .unwrap_or(after.len());
                push_var(&mut out, &after[..end], &lookup, except);
                rest = &after[end..];
            }
            _ => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn push_var<F>(out: &mut String, name: &str, lookup: &F, except: &[&str])
where
    F: Fn(&str) -> Option<String>,
{
    if except.contains(&name) {
        out.push('$');
        out.push_str(name);
    } else if let Some(value) = lookup(name) {
        out.push_str(&value);
    }
}

/// Evaluate a rule binding (usually `command`) for an action.
///
/// Lookup order: `$in`/`$out`, the action's edge and scope bindings, then
/// the rule's own bindings (expanded recursively).
pub fn evaluate(graph: &BuildGraph, action: &Action, name: &str, except: &[&str]) -> String {
    let Some(raw) = action.rule.vars.get(name) else {
        return action.var(name).unwrap_or_default().to_string();
    };
    evaluate_raw(graph, action, raw, except, 0)
}

fn evaluate_raw(
    graph: &BuildGraph,
    action: &Action,
    raw: &str,
    except: &[&str],
    depth: usize,
) -> String {
    let lookup = |n: &str| -> Option<String> {
        match n {
            "in" => Some(join_names(graph, &action.inputs, false)),
            "out" => Some(join_names(graph, &action.outputs, true)),
            "in_newline" => Some(
                action
                    .inputs
                    .iter()
                    .map(|&i| graph.node(i).name.clone())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => {
                if let Some(v) = action.var(n) {
                    return Some(v.to_string());
                }
                if depth < 8 {
                    if let Some(rule_raw) = action.rule.vars.get(n) {
                        return Some(evaluate_raw(graph, action, rule_raw, except, depth + 1));
                    }
                }
                None
            }
        }
    };
    expand(raw, lookup, except)
}

fn join_names(graph: &BuildGraph, ids: &[crate::core::graph::NodeId], explicit_only: bool) -> String {
    ids.iter()
        .map(|&i| graph.node(i))
        .filter(|n| !(explicit_only && n.implicit))
        .map(|n| n.name.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_in<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |n| {
            vars.iter()
                .find(|(k, _)| *k == n)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_expand_variables() {
        let vars = [("root", "/src"), ("FLAGS", "-O2")];
        assert_eq!(expand("$root/a.cc", lookup_in(&vars), &[]), "/src/a.cc");
        assert_eq!(expand("${root}x", lookup_in(&vars), &[]), "/srcx");
        assert_eq!(expand("cc $FLAGS $unknown-x", lookup_in(&vars), &[]), "cc -O2 -x");
    }

    #[test]
    fn test_expand_escapes() {
        let vars = [];
        assert_eq!(expand("a$ b$:c$$d", lookup_in(&vars), &[]), "a b:c$d");
    }

    #[test]
    fn test_expand_keeps_excepted_names() {
        let vars = [("in", "a.cc"), ("FLAGS", "-g")];
        assert_eq!(
            expand("cc $FLAGS -c $in -o $out", lookup_in(&vars), &["in", "out"]),
            "cc -g -c $in -o $out"
        );
    }

    #[test]
    fn test_scope_stack_shadowing() {
        let mut scopes = ScopeStack::new();
        scopes.set("a", "1");
        scopes.set("b", "$a-2");
        scopes.set("a-b", "x");
        scopes.set("c", "${a-b}$a.o");
        assert_eq!(scopes.lookup("c"), Some("x1.o"));
        scopes.push();
        scopes.set("a", "3");
        assert_eq!(scopes.lookup("a"), Some("3"));
        assert_eq!(scopes.lookup("b"), Some("1-2"));
        assert_eq!(scopes.flatten().get("a").map(String::as_str), Some("3"));
        scopes.pop();
        assert_eq!(scopes.lookup("a"), Some("1"));
    }

    #[test]
    fn test_rules_are_scoped() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.add_rule(Rule::new("CXX"));
        assert!(scopes.rule("CXX").is_some());
        scopes.pop();
        assert!(scopes.rule("CXX").is_none());
        assert!(scopes.rule("phony").is_some());
    }
}
