use std::path::PathBuf;

use thiserror::Error;

use crate::manifest::ManifestIssue;

/// Result alias used throughout gale-core.
pub type Result<T> = std::result::Result<T, GaleError>;

/// Errors from the gale workspace model.
#[derive(Debug, Error)]
pub enum GaleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(#[from] serde_yaml::Error),

    #[error("Manifest {path} has {} issue(s)", issues.len())]
    InvalidManifest {
        path: PathBuf,
        issues: Vec<ManifestIssue>,
    },

    #[error("Failed to read environment file: {0}")]
    EnvFile(#[from] dotenvy::Error),

    #[error("Environment file for board '{board}' not found: {path}")]
    MissingEnvironment { board: String, path: PathBuf },

    #[error("Unknown {kind} '{value}' (expected one of: {expected})")]
    Unknown {
        kind: &'static str,
        value: String,
        expected: String,
    },

    #[error("Build directory for the target '{triplet}' does not exist: {dir} (run 'gale build' on the target first)")]
    MissingBuildDir { triplet: String, dir: PathBuf },

    #[error("CMakeCache for the target '{triplet}' does not exist: {path}")]
    MissingCMakeCache { triplet: String, path: PathBuf },

    #[error("CMakeCache {path} does not define {key}")]
    UndefinedCacheKey { path: PathBuf, key: String },

    #[error("Cannot load and save build arguments simultaneously; the same arguments would build up")]
    ConflictingBuildArgs,

    #[error("Output binary '{0}' does not exist; use build first")]
    MissingBinary(PathBuf),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Command `{cmd}` failed: {output}")]
    CommandFailed {
        cmd: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Invalid working directory {0}")]
    InvalidWorkingDir(PathBuf),

    #[error("This command must be run from within a virtual environment")]
    NotInVirtualEnv,

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("requirements.txt not found at {0}")]
    MissingRequirements(PathBuf),

    #[error("{service} failed to start on port {port}")]
    ServiceNotStarted { service: &'static str, port: u16 },

    #[error("Interrupted")]
    Interrupted,
}
