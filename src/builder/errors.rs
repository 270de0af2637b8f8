//! Synthesis error types and diagnostics.

use thiserror::Error;

use crate::core::target::TargetError;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error while turning the build graph into targets.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("don't know what kind of target `{output}` is")]
    UnrecognizedCommand { output: String, command: String },

    #[error("{} referenced files are neither on disk nor produced", missing.len())]
    MissingDependencies { missing: Vec<String> },

    #[error("the build graph has no `all` target")]
    MissingAll,

    #[error("unknown top-level output `{name}`")]
    UnknownTarget { name: String },

    #[error(transparent)]
    Target(#[from] TargetError),
}

impl BuildError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BuildError::UnrecognizedCommand { output, command } => {
                Diagnostic::error(format!("cannot classify the command producing `{}`", output))
                    .with_context(format!("command: {}", command))
                    .with_suggestion(suggestions::UNKNOWN_COMMAND)
            }

            BuildError::MissingDependencies { missing } => {
                let mut diag = Diagnostic::error(format!(
                    "{} files are referenced but neither on disk nor produced",
                    missing.len()
                ));
                for name in missing.iter().take(20) {
                    diag = diag.with_context(name.clone());
                }
                if missing.len() > 20 {
                    diag = diag.with_context(format!("... and {} more", missing.len() - 20));
                }
                diag.with_suggestion(
                    "run the translation against a configured (and ideally built) build tree",
                )
                .with_suggestion(suggestions::UNKNOWN_COMMAND)
            }

            BuildError::MissingAll => Diagnostic::error("the build graph has no `all` target")
                .with_suggestion(suggestions::NO_ALL_TARGET),

            BuildError::UnknownTarget { name } => {
                Diagnostic::error(format!("`{}` is not an output of the build graph", name))
                    .with_suggestion("list the outputs with `ninja -t targets`")
            }

            BuildError::Target(e) => Diagnostic::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_command_diagnostic() {
        let err = BuildError::UnrecognizedCommand {
            output: "tools/gen".to_string(),
            command: "/opt/weird/tool -o tools/gen".to_string(),
        };
        let output = err.to_diagnostic().format(false);
        assert!(output.contains("tools/gen"));
        assert!(output.contains("/opt/weird/tool"));
    }

    #[test]
    fn test_missing_dependencies_diagnostic() {
        let err = BuildError::MissingDependencies {
            missing: (0..25).map(|i| format!("gen/f{}.h", i)).collect(),
        };
        assert_eq!(
            err.to_string(),
            "25 referenced files are neither on disk nor produced"
        );
        let output = err.to_diagnostic().format(false);
        assert!(output.contains("gen/f0.h"));
        assert!(output.contains("and 5 more"));
    }
}
