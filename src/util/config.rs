//! Configuration file support.
//!
//! Two configuration file locations are read:
//! - Global: `~/.ninja2bazel/config.toml` - User-wide defaults
//! - Project: `<rootdir>/.ninja2bazel/config.toml` - Per source tree overrides
//!
//! Project config takes precedence over global config, and command-line flags
//! take precedence over both.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default compiler queried for system include directories.
pub const DEFAULT_COMPILER: &str = "clang++";

/// Default name of the generated build files.
pub const DEFAULT_BUILD_FILE: &str = "BUILD.bazel";

/// ninja2bazel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Translation settings
    pub translate: TranslateConfig,

    /// Compiler used to discover system headers
    pub compiler: CompilerConfig,

    /// Import descriptor files
    pub imports: ImportsConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// Translation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Directory (relative to the root) receiving generated outputs
    pub prefix: Option<String>,

    /// Defines that are always kept as `defines`
    pub keep_defines: Vec<String>,

    /// Extra compiler flags to drop
    pub drop_flags: Vec<String>,

    /// Top-level outputs to translate (defaults to the inputs of `all`)
    pub targets: Vec<String>,

    /// Build-graph names replaced by hand-written labels
    pub manually_generated: BTreeMap<String, String>,

    /// Package remaps applied to exported files
    pub remap: BTreeMap<String, String>,
}

/// Compiler settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Compiler executable (default: clang++)
    pub path: Option<String>,

    /// Ask the compiler for its include search list (default: true)
    pub query_system_includes: Option<bool>,

    /// Additional system include directories
    pub extra_system_includes: Vec<PathBuf>,
}

impl CompilerConfig {
    /// The compiler to query.
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_COMPILER)
    }

    /// Whether the compiler should be queried at all.
    pub fn query_system_includes(&self) -> bool {
        self.query_system_includes.unwrap_or(true)
    }
}

/// Import descriptor settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportsConfig {
    /// Descriptor files, relative to the root dir
    pub files: Vec<PathBuf>,
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Name of the generated build files (default: BUILD.bazel)
    pub file_name: Option<String>,
}

impl OutputConfig {
    pub fn file_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or(DEFAULT_BUILD_FILE)
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// Lists are replaced when the other side sets them; maps are merged
    /// key by key.
    pub fn merge(&mut self, other: Config) {
        let Config {
            translate,
            compiler,
            imports,
            output,
        } = other;

        if translate.prefix.is_some() {
            self.translate.prefix = translate.prefix;
        }
        if !translate.keep_defines.is_empty() {
            self.translate.keep_defines = translate.keep_defines;
        }
        if !translate.drop_flags.is_empty() {
            self.translate.drop_flags = translate.drop_flags;
        }
        if !translate.targets.is_empty() {
            self.translate.targets = translate.targets;
        }
        self.translate
            .manually_generated
            .extend(translate.manually_generated);
        self.translate.remap.extend(translate.remap);

        if compiler.path.is_some() {
            self.compiler.path = compiler.path;
        }
        if compiler.query_system_includes.is_some() {
            self.compiler.query_system_includes = compiler.query_system_includes;
        }
        if !compiler.extra_system_includes.is_empty() {
            self.compiler.extra_system_includes = compiler.extra_system_includes;
        }

        if !imports.files.is_empty() {
            self.imports.files = imports.files;
        }

        if output.file_name.is_some() {
            self.output.file_name = output.file_name;
        }
    }
}

/// Get the global config directory (~/.ninja2bazel).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".ninja2bazel"))
}

/// Get the global config path (~/.ninja2bazel/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (<rootdir>/.ninja2bazel/config.toml).
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(".ninja2bazel").join("config.toml")
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config
/// 2. Global config
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.translate.prefix.is_none());
        assert_eq!(config.compiler.path(), "clang++");
        assert!(config.compiler.query_system_includes());
        assert_eq!(config.output.file_name(), "BUILD.bazel");
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[translate]
prefix = "generated"
keep_defines = ["FOLLY_XLOG_STRIP_PREFIXES"]

[translate.manually_generated]
"gen/version.h" = "//tools:version_h"

[compiler]
path = "g++"
query_system_includes = false

[imports]
files = ["third_party/imports.bzl"]
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.translate.prefix.as_deref(), Some("generated"));
        assert_eq!(config.translate.keep_defines, vec!["FOLLY_XLOG_STRIP_PREFIXES"]);
        assert_eq!(
            config.translate.manually_generated.get("gen/version.h"),
            Some(&"//tools:version_h".to_string())
        );
        assert_eq!(config.compiler.path(), "g++");
        assert!(!config.compiler.query_system_includes());
        assert_eq!(
            config.imports.files,
            vec![PathBuf::from("third_party/imports.bzl")]
        );
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.translate.prefix = Some("out".to_string());
        base.compiler.path = Some("g++".to_string());
        base.translate
            .remap
            .insert("a".to_string(), "b".to_string());

        let mut project = Config::default();
        project.compiler.path = Some("clang++-17".to_string());
        project
            .translate
            .remap
            .insert("c".to_string(), "d".to_string());

        base.merge(project);

        assert_eq!(base.compiler.path(), "clang++-17");
        assert_eq!(base.translate.prefix.as_deref(), Some("out"));
        assert_eq!(base.translate.remap.len(), 2);
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        let project_path = tmp.path().join("project.toml");

        std::fs::write(
            &global_path,
            r#"
[compiler]
path = "g++"

[output]
file_name = "BUILD"
"#,
        )
        .unwrap();

        std::fs::write(
            &project_path,
            r#"
[compiler]
path = "clang++"
"#,
        )
        .unwrap();

        let config = load_config(Some(&global_path), &project_path);
        assert_eq!(config.compiler.path(), "clang++");
        assert_eq!(config.output.file_name(), "BUILD");
    }

    #[test]
    fn test_invalid_config_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[translate\nprefix = 3").unwrap();

        assert!(Config::load(&path).is_err());
        let config = Config::load_or_default(&path);
        assert!(config.translate.prefix.is_none());
    }
}
