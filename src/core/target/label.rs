//! Label formatting and ordering.
//!
//! Labels are rendered relative to the package that references them:
//! `":name"` inside the same package, `"//pkg:name"` from another package,
//! and as-is for locations that are already absolute (`//pkg`, `@repo//`).

use std::cmp::Ordering;

/// Package part of a reference to a target in `location` from package `from`.
pub fn package_prefix(location: &str, from: &str) -> String {
    if is_absolute(location) {
        location.to_string()
    } else if location != from {
        format!("//{}", location)
    } else {
        String::new()
    }
}

/// Whether `s` already names a package or label on its own.
pub fn is_absolute(s: &str) -> bool {
    s.starts_with("//") || s.starts_with('@')
}

/// Name part of a label (`:name`).
pub fn target_name(name: &str) -> String {
    if name.starts_with(':') {
        name.to_string()
    } else {
        format!(":{}", name)
    }
}

/// Full label of `name` in `location`, as referenced from package `from`.
pub fn label(name: &str, location: &str, from: &str) -> String {
    if is_absolute(name) {
        return name.to_string();
    }
    format!("{}{}", package_prefix(location, from), target_name(name))
}

/// Ordering class of a rendered label: same package, same repository,
/// other, external repository.
pub fn prefix_class(label: &str) -> u8 {
    match label.as_bytes().first() {
        Some(b':') => 0,
        Some(b'/') => 1,
        Some(b'@') => 3,
        _ => 2,
    }
}

/// Total order on rendered labels: by prefix class, then lexicographically.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    prefix_class(a)
        .cmp(&prefix_class(b))
        .then_with(|| a.cmp(b))
}

/// Sort rendered labels in place and drop duplicates.
pub fn sort_labels(labels: &mut Vec<String>) {
    labels.sort_by(|a, b| compare_labels(a, b));
    labels.dedup();
}

/// Order `load()` files: external repositories first, then by path with
/// `:` and `/` sorting before every other character.
pub fn compare_load_files(a: &str, b: &str) -> Ordering {
    let key = |s: &str| -> (u8, Vec<u8>) {
        let class = if s.starts_with('@') { 0 } else { 1 };
        let bytes = s
            .bytes()
            .map(|c| match c {
                b':' => 0,
                b'/' => 1,
                other => other,
            })
            .collect();
        (class, bytes)
    };
    key(a).cmp(&key(b))
}
