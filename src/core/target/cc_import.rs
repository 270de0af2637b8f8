//! Pre-built library descriptors.

/// A pre-built library: headers plus static and/or shared artifacts.
///
/// Paths are absolute as written in (or globbed from) the descriptor file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CcImport {
    /// Header files.
    pub hdrs: Vec<String>,
    /// Explicit include directories, overriding the ones derived from `hdrs`.
    pub includes: Option<Vec<String>>,
    pub static_library: Option<String>,
    /// Shared object, or interface library when system provided.
    pub shared_library: Option<String>,
    /// The library ships with the system.
    pub system_provided: bool,
    /// Emit the raw `cc_import` without a `cc_library` wrapper.
    pub skip_wrapping: bool,
    /// Redirect to another label instead of describing the artifacts.
    pub alias: Option<String>,
}

impl CcImport {
    /// Library artifacts described by this import.
    pub fn libraries(&self) -> impl Iterator<Item = &str> {
        self.static_library
            .iter()
            .chain(self.shared_library.iter())
            .map(String::as_str)
    }

    /// Whether `path` is one of this import's library artifacts.
    pub fn provides_library(&self, path: &str) -> bool {
        self.libraries().any(|lib| lib == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provides_library() {
        let import = CcImport {
            static_library: Some("/usr/lib/libzstd.a".to_string()),
            shared_library: Some("/usr/lib/libzstd.so".to_string()),
            ..Default::default()
        };
        assert!(import.provides_library("/usr/lib/libzstd.a"));
        assert!(import.provides_library("/usr/lib/libzstd.so"));
        assert!(!import.provides_library("/usr/lib/libz.so"));
        assert_eq!(import.libraries().count(), 2);
    }
}
