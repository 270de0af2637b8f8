//! Subprocess execution and compiler queries.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{bail, Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Set stdin data. An empty buffer closes stdin right away.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Execute the command and wait for completion.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();

        cmd.stdin(if self.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        if let Some(ref stdin_data) = self.stdin {
            use std::io::Write;
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(stdin_data)?;
            }
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;

        Ok(output)
    }

    /// Execute and require success.
    pub fn exec_and_check(&self) -> Result<Output> {
        let output = self.exec()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` failed with exit code {:?}\n{}",
                self.display_command(),
                output.status.code(),
                stderr
            );
        }
        Ok(output)
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

const SEARCH_START: &str = "#include <...> search starts here:";
const SEARCH_END: &str = "End of search list.";

/// Ask `compiler` for its system include directories.
///
/// Runs the preprocessor in verbose mode on an empty C++ translation unit
/// and scrapes the search list it prints on stderr.
pub fn compiler_include_dirs(compiler: &str) -> Result<Vec<PathBuf>> {
    let program = find_executable(compiler)
        .with_context(|| format!("compiler `{}` not found in PATH", compiler))?;

    let output = ProcessBuilder::new(&program)
        .args(["-Wp,-v", "-x", "c++", "-", "-fsyntax-only"])
        .stdin(Vec::new())
        .exec_and_check()?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let dirs = parse_search_list(&stderr);
    tracing::debug!("{} reports {} system include dirs", compiler, dirs.len());
    Ok(dirs)
}

/// Extract the `#include <...>` search list from verbose preprocessor output.
pub fn parse_search_list(text: &str) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut inside = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed == SEARCH_START {
            inside = true;
            continue;
        }
        if trimmed == SEARCH_END {
            break;
        }
        if inside && !trimmed.is_empty() {
            // macOS marks framework dirs with a suffix
            let dir = trimmed.trim_end_matches(" (framework directory)");
            dirs.push(PathBuf::from(dir));
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_builder() {
        let output = ProcessBuilder::new("echo").arg("hello").exec().unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("hello"));
    }

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("clang++").args(["-Wp,-v", "-x", "c++", "-"]);

        assert_eq!(pb.display_command(), "clang++ -Wp,-v -x c++ -");
    }

    #[test]
    fn test_parse_search_list() {
        let stderr = "\
clang -cc1 version 17.0.6 based upon LLVM 17.0.6 default target x86_64-pc-linux-gnu
ignoring nonexistent directory \"/include\"
#include \"...\" search starts here:
#include <...> search starts here:
 /usr/lib/gcc/x86_64-linux-gnu/13/../../../../include/c++/13
 /usr/local/include
 /usr/include
End of search list.
";
        let dirs = parse_search_list(stderr);
        assert_eq!(dirs.len(), 3);
        assert_eq!(dirs[1], PathBuf::from("/usr/local/include"));
        assert_eq!(dirs[2], PathBuf::from("/usr/include"));
    }

    #[test]
    fn test_parse_search_list_empty() {
        assert!(parse_search_list("error: unknown argument").is_empty());
    }
}
