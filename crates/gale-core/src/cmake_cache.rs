//! # CMake Cache
//!
//! Reader for the `CMakeCache.txt` a build leaves behind. gale uses it to
//! locate toolchain programs (gdb, CodeChecker) and build products.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{GaleError, Result};

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([^\s:]+):\w*=(.*)$").expect("valid CMakeCache pattern"))
}

/// Values parsed from a `CMakeCache.txt` file.
#[derive(Debug, Clone, Default)]
pub struct CMakeCache {
    path: PathBuf,
    /// `KEY:TYPE=VALUE` entries; empty values are stored as `None`.
    values: BTreeMap<String, Option<String>>,
}

impl CMakeCache {
    /// Read and parse the cache at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(path, &content))
    }

    /// Parse cache content. Comments and malformed lines are skipped.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Self {
        let values = content
            .lines()
            .filter_map(|line| {
                let caps = line_pattern().captures(line.trim())?;
                let key = caps.get(1)?.as_str().to_string();
                let value = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                Some((key, (!value.is_empty()).then(|| value.to_string())))
            })
            .collect();
        Self {
            path: path.into(),
            values,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn values(&self) -> &BTreeMap<String, Option<String>> {
        &self.values
    }

    /// Value of `key`; undefined or empty keys are an error.
    pub fn get(&self, key: &str) -> Result<&str> {
        self.values
            .get(key)
            .and_then(|value| value.as_deref())
            .ok_or_else(|| GaleError::UndefinedCacheKey {
                path: self.path.clone(),
                key: key.to_string(),
            })
    }

    pub fn gdb(&self) -> Result<&str> {
        self.get("CMAKE_GDB")
    }

    pub fn zephyr_base(&self) -> Result<&str> {
        self.get("ZEPHYR_BASE")
    }

    /// Native executable (BabbleSim / native_sim boards).
    pub fn exe_path(&self) -> Result<&str> {
        self.get("BYPRODUCT_KERNEL_EXE_NAME")
    }

    pub fn elf_path(&self) -> Result<&str> {
        self.get("BYPRODUCT_KERNEL_ELF_NAME")
    }

    /// BabbleSim build output (bin/ and lib/).
    pub fn bsim_out_path(&self) -> Result<&str> {
        self.get("BSIM_OUT_PATH")
    }

    pub fn codechecker_exe(&self) -> Result<&str> {
        self.get("CODECHECKER_EXE")
    }
}
