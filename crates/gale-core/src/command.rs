//! # Command Plans
//!
//! Shell commands described as data. gale-core builds these; the runner in
//! apps/gale executes them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// How a command is run and how its result is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CmdMode {
    /// Inherit the terminal; wait for completion.
    Foreground,
    /// Start, track and return immediately; output goes to a log file.
    Background,
    /// Wait for completion and return stdout only.
    Capture,
    /// Replace the gale process with the command.
    Replace,
    /// Open the command in a separate terminal emulator window.
    NewTerminal,
}

impl fmt::Display for CmdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Foreground => "foreground",
            Self::Background => "background",
            Self::Capture => "capture",
            Self::Replace => "replace",
            Self::NewTerminal => "new terminal",
        };
        f.write_str(name)
    }
}

/// A shell command to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    /// Command line, interpreted by `sh -c`.
    pub cmd: String,
    /// Human readable description of what the command is doing.
    pub desc: String,
    pub mode: CmdMode,
    /// Working directory; `None` means the west topdir.
    pub cwd: Option<PathBuf>,
    /// If set, a non-zero exit status is an error; otherwise only a warning.
    pub fatal: bool,
}

impl CommandSpec {
    /// Create a fatal command without a working directory.
    pub fn new(cmd: impl Into<String>, desc: impl Into<String>, mode: CmdMode) -> Self {
        Self {
            cmd: cmd.into(),
            desc: desc.into(),
            mode,
            cwd: None,
            fatal: true,
        }
    }

    #[must_use]
    pub fn in_dir(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn non_fatal(mut self) -> Self {
        self.fatal = false;
        self
    }
}

/// Quote a string for POSIX `sh`.
///
/// Strings made only of safe characters are returned unchanged.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
