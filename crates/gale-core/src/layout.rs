//! # Workspace Layout
//!
//! Directory layout of a Gale west workspace:
//!
//! ```text
//! <topdir>/                 west topdir (contains .west/)
//! └── gale/                 manifest repository (west.yml, requirements.txt)
//!     └── projects/         where west pulls projects and modules into
//!         ├── hmi_app/
//!         ├── sensor_app/
//!         ├── shared/
//!         ├── zephyr/
//!         └── tools/bsim/   BabbleSim build
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Name of the manifest repository directory inside the topdir.
pub const MANIFEST_DIR_NAME: &str = "gale";

/// Resolved directories of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceLayout {
    topdir: PathBuf,
    manifest_dir: PathBuf,
    projects_dir: PathBuf,
}

impl WorkspaceLayout {
    pub fn from_topdir(topdir: impl Into<PathBuf>) -> Self {
        let topdir = topdir.into();
        let manifest_dir = topdir.join(MANIFEST_DIR_NAME);
        let projects_dir = manifest_dir.join("projects");
        Self {
            topdir,
            manifest_dir,
            projects_dir,
        }
    }

    /// The west topdir; default working directory for commands.
    pub fn topdir(&self) -> &Path {
        &self.topdir
    }

    /// Root of the manifest repository.
    pub fn manifest_dir(&self) -> &Path {
        &self.manifest_dir
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.manifest_dir.join("west.yml")
    }

    pub fn requirements_file(&self) -> PathBuf {
        self.manifest_dir.join("requirements.txt")
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Directory used by some Zephyr modules.
    pub fn tools_dir(&self) -> PathBuf {
        self.projects_dir.join("tools")
    }

    /// Directory used to build and use BabbleSim.
    pub fn bsim_dir(&self) -> PathBuf {
        self.tools_dir().join("bsim")
    }
}
