//! # CLI Errors

use gale_core::GaleError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] GaleError),

    #[error("Failed to write JSON output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// The user pressed Ctrl+C; not a failure.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Core(GaleError::Interrupted))
    }

    /// Exit status of the process when a command ends with this error.
    pub fn exit_code(&self) -> u8 {
        if self.is_interrupted() { 0 } else { 1 }
    }
}
