//! # Registry
//!
//! The projects, boards and targets gale knows how to handle.
//!
//! These are fixed relationships: a target always belongs to the same
//! project (CMakeLists.txt), a board always reads its environment file from
//! the shared project. Anything not listed here can still be built by hand
//! with `west build`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{GaleError, Result};
use crate::layout::WorkspaceLayout;

fn lookup<T: Copy>(
    kind: &'static str,
    value: &str,
    all: &[T],
    names: impl Fn(T) -> &'static [&'static str],
) -> Result<T> {
    all.iter()
        .copied()
        .find(|item| names(*item).contains(&value))
        .ok_or_else(|| GaleError::Unknown {
            kind,
            value: value.to_string(),
            expected: all
                .iter()
                .map(|item| names(*item)[0])
                .collect::<Vec<_>>()
                .join(", "),
        })
}

// =============================================================================
// PROJECTS
// =============================================================================

/// A repository of the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Project {
    Manifest,
    SensorApp,
    HmiApp,
    Shared,
    Zephyr,
}

impl Project {
    pub const ALL: [Self; 5] = [
        Self::Manifest,
        Self::SensorApp,
        Self::HmiApp,
        Self::Shared,
        Self::Zephyr,
    ];

    /// Human readable name without any semantic meaning.
    pub fn name(self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::SensorApp => "sensor-app",
            Self::HmiApp => "hmi-app",
            Self::Shared => "shared",
            Self::Zephyr => "zephyr",
        }
    }

    fn names(self) -> &'static [&'static str] {
        match self {
            Self::Manifest => &["manifest"],
            Self::SensorApp => &["sensor-app", "sensor_app"],
            Self::HmiApp => &["hmi-app", "hmi_app"],
            Self::Shared => &["shared"],
            Self::Zephyr => &["zephyr"],
        }
    }

    /// The directory holding the project's checkout (and CMakeLists.txt).
    pub fn dir(self, layout: &WorkspaceLayout) -> PathBuf {
        match self {
            Self::Manifest => layout.manifest_dir().to_path_buf(),
            Self::SensorApp => layout.projects_dir().join("sensor_app"),
            Self::HmiApp => layout.projects_dir().join("hmi_app"),
            Self::Shared => layout.projects_dir().join("shared"),
            Self::Zephyr => layout.projects_dir().join("zephyr"),
        }
    }

    /// Third-party (upstream) repository; gale never commits to these.
    pub fn is_upstream(self) -> bool {
        matches!(self, Self::Zephyr)
    }

    pub fn is_user(self) -> bool {
        !self.is_upstream()
    }

    /// Projects owned by the Gale developers.
    pub fn user_projects() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(|p| p.is_user())
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Project {
    type Err = GaleError;

    fn from_str(s: &str) -> Result<Self> {
        lookup("project", s, &Self::ALL, Self::names)
    }
}

// =============================================================================
// BOARDS
// =============================================================================

/// A board the applications can be built for.
///
/// The board's environment file defines the overlays, Kconfig fragments and
/// other variables used by the build system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Board {
    Nrf54l15Dk,
    Nrf54l15Bsim,
    Nrf5340Bsim,
}

impl Board {
    pub const ALL: [Self; 3] = [Self::Nrf54l15Dk, Self::Nrf54l15Bsim, Self::Nrf5340Bsim];

    pub fn name(self) -> &'static str {
        match self {
            Self::Nrf54l15Dk => "nrf54l15dk",
            Self::Nrf54l15Bsim => "nrf54l15bsim",
            Self::Nrf5340Bsim => "nrf5340bsim",
        }
    }

    /// Board qualifier passed to `west build -b`.
    pub fn west_board(self) -> &'static str {
        match self {
            Self::Nrf54l15Dk => "nrf54l15dk/nrf54l15/cpuapp",
            Self::Nrf54l15Bsim => "nrf54l15bsim/nrf54l15/cpuapp",
            Self::Nrf5340Bsim => "nrf5340bsim/nrf5340/cpuapp",
        }
    }

    /// Directory holding the board's environment file.
    pub fn dir(self, layout: &WorkspaceLayout) -> PathBuf {
        Project::Shared.dir(layout).join("boards").join(self.name())
    }

    /// Path of the environment file; it must exist.
    pub fn env_file(self, layout: &WorkspaceLayout) -> Result<PathBuf> {
        let file = self.dir(layout).join("environment");
        if !file.exists() {
            return Err(GaleError::MissingEnvironment {
                board: self.name().to_string(),
                path: file,
            });
        }
        Ok(file)
    }

    /// Simulated board; builds a native BabbleSim executable.
    pub fn is_bsim(self) -> bool {
        self.name().contains("bsim")
    }

    /// The simulated flash is split into application and network cores.
    pub fn has_split_flash(self) -> bool {
        matches!(self, Self::Nrf5340Bsim)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Board {
    type Err = GaleError;

    fn from_str(s: &str) -> Result<Self> {
        lookup("board", s, &Self::ALL, |board| match board {
            Self::Nrf54l15Dk => &["nrf54l15dk"],
            Self::Nrf54l15Bsim => &["nrf54l15bsim"],
            Self::Nrf5340Bsim => &["nrf5340bsim"],
        })
    }
}

// =============================================================================
// TARGETS
// =============================================================================

/// A CMake target gale can build, run and debug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    HmiApp,
    SensorApp,
}

impl Target {
    pub const ALL: [Self; 2] = [Self::HmiApp, Self::SensorApp];

    pub fn name(self) -> &'static str {
        match self {
            Self::HmiApp => "hmi_app",
            Self::SensorApp => "sensor_app",
        }
    }

    /// The project (CMakeLists.txt) this target belongs to.
    pub fn project(self) -> Project {
        match self {
            Self::HmiApp => Project::HmiApp,
            Self::SensorApp => Project::SensorApp,
        }
    }

    /// Name of the target inside the CMakeLists.txt.
    pub fn cmake_target(self) -> &'static str {
        self.name()
    }

    /// Subdirectory inside the build directory (sysbuild image name).
    pub fn build_subdir(self) -> Option<&'static str> {
        Some(self.name())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = GaleError;

    fn from_str(s: &str) -> Result<Self> {
        lookup("target", s, &Self::ALL, |target| match target {
            Self::HmiApp => &["hmi_app", "hmi"],
            Self::SensorApp => &["sensor_app", "sensor"],
        })
    }
}

// =============================================================================
// BUILD TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    #[default]
    Standard,
    /// Static code analysis with CodeChecker.
    Sca,
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standard => "standard",
            Self::Sca => "sca",
        })
    }
}

impl FromStr for BuildType {
    type Err = GaleError;

    fn from_str(s: &str) -> Result<Self> {
        lookup("build type", s, &[Self::Standard, Self::Sca], |ty| match ty {
            Self::Standard => &["standard"],
            Self::Sca => &["sca"],
        })
    }
}
