//! Source languages and file-type detection.

use std::path::Path;

/// Source language of a compiled file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Language {
    /// C language
    C,
    /// C++ language (default)
    #[default]
    Cxx,
}

impl Language {
    /// Get the language name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
        }
    }

    /// Detect the language of a source file from its extension.
    ///
    /// Returns `None` for headers and anything that is not compiled.
    pub fn from_path(path: &str) -> Option<Language> {
        match extension(path)? {
            "c" => Some(Language::C),
            "cc" | "cpp" | "cxx" | "c++" | "C" => Some(Language::Cxx),
            _ => None,
        }
    }
}

/// Whether the file is a C or C++ header.
pub fn is_header(path: &str) -> bool {
    matches!(extension(path), Some("h" | "hh" | "hpp" | "hxx" | "tcc" | "inc"))
}

/// Whether the file is a C or C++ translation unit.
pub fn is_source(path: &str) -> bool {
    Language::from_path(path).is_some()
}

fn extension(path: &str) -> Option<&str> {
    Path::new(path).extension().and_then(|e| e.to_str())
}
