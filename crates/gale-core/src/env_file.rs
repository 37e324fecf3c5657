//! # Environment Files
//!
//! Boards (and the QEMU setup) describe their build variables in dotenv
//! style files. They are sourced before building: variables are added to
//! the environment of every child process, without replacing variables the
//! user already exported.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Substrings (lowercase) of variable names worth showing after sourcing.
pub const INTERESTING_KEYWORDS: [&str; 3] = ["zephyr", "west", "board"];

/// Variables read from a dotenv file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    path: PathBuf,
    vars: Vec<(String, String)>,
}

impl EnvFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let vars = dotenvy::from_path_iter(path)?.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            path: path.to_path_buf(),
            vars,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }
}

/// Whether a variable is related to the build setup (zephyr, west, board).
pub fn is_interesting(key: &str) -> bool {
    let key = key.to_lowercase();
    INTERESTING_KEYWORDS.iter().any(|word| key.contains(word))
}
