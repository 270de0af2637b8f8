//! Directory-level shared flags.
//!
//! Flags carried by nearly every C/C++ target of a directory are hoisted into
//! `common_copts`, `common_defines` and `common_linkopts` constants at the top
//! of the file.

use std::collections::{BTreeMap, BTreeSet};

/// Percentage of a directory's targets a flag must appear in to be hoisted.
const SHARE_PERCENT: usize = 95;

/// Flag attributes that can be hoisted, in rendering order.
pub const COMMON_ATTRS: &[&str] = &["copts", "defines", "linkopts"];

/// Minimum number of sets a flag must appear in: 95% of them, rounded up.
pub fn threshold(sets: usize) -> usize {
    (sets * SHARE_PERCENT).div_ceil(100)
}

/// Flags present in at least [`threshold`] of `sets`.
///
/// Fewer than two sets never share anything.
pub fn common_flags(sets: &[&BTreeSet<String>]) -> BTreeSet<String> {
    if sets.len() < 2 {
        return BTreeSet::new();
    }
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for set in sets {
        for flag in set.iter() {
            *counts.entry(flag.as_str()).or_default() += 1;
        }
    }
    let needed = threshold(sets.len());
    counts
        .into_iter()
        .filter(|&(_, count)| count >= needed)
        .map(|(flag, _)| flag.to_string())
        .collect()
}

/// Hoisted flags of one directory, per attribute.
#[derive(Debug, Clone, Default)]
pub struct CommonFlags {
    by_attr: BTreeMap<&'static str, BTreeSet<String>>,
}

impl CommonFlags {
    /// Compute the shared flags of every attribute from per-target values.
    pub fn compute(per_target: &[BTreeMap<&'static str, BTreeSet<String>>]) -> Self {
        let mut by_attr = BTreeMap::new();
        for &attr in COMMON_ATTRS {
            let sets: Vec<&BTreeSet<String>> =
                per_target.iter().filter_map(|t| t.get(attr)).collect();
            let common = common_flags(&sets);
            if !common.is_empty() {
                by_attr.insert(attr, common);
            }
        }
        CommonFlags { by_attr }
    }

    pub fn get(&self, attr: &str) -> Option<&BTreeSet<String>> {
        self.by_attr.get(attr)
    }

    pub fn is_empty(&self) -> bool {
        self.by_attr.is_empty()
    }

    /// `common_<attr> = [...]` definitions, already quoted.
    pub fn definitions(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for &attr in COMMON_ATTRS {
            let Some(flags) = self.by_attr.get(attr) else {
                continue;
            };
            lines.push(format!("common_{} = [", attr));
            for flag in flags {
                lines.push(format!("    {},", super::quote(flag)));
            }
            lines.push("]".to_string());
            lines.push(String::new());
        }
        lines
    }
}
