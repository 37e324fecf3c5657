//! # Gale Core
//!
//! The workspace model behind the `gale` tool.
//!
//! This crate knows where things live in a Gale workspace and which commands
//! build, run, emulate and analyse its applications. It never starts a
//! process itself: operations return [`CommandSpec`] plans that the
//! application layer (apps/gale) executes.
//!
//! ## Modules
//!
//! - [`manifest`]: the west manifest (`west.yml`), group filters, validation
//! - [`layout`]: directory layout derived from the west topdir
//! - [`registry`]: projects, boards, targets and build types
//! - [`cmake_cache`]: `CMakeCache.txt` reader
//! - [`build`]: build configurations, build caches and cached build arguments
//! - [`bsim`], [`emulate`], [`sca`]: run plans for BabbleSim, QEMU and CodeChecker
//! - [`repos`]: multi-repository git operations
//! - [`env_file`]: board environment files
//! - [`command`]: command plans and shell quoting

pub mod bsim;
pub mod build;
pub mod cmake_cache;
pub mod command;
pub mod emulate;
pub mod env_file;
pub mod layout;
pub mod manifest;
pub mod registry;
pub mod repos;
pub mod sca;

mod error;

pub use build::{BuildCache, Configuration, Triplet};
pub use cmake_cache::CMakeCache;
pub use command::{CmdMode, CommandSpec, shell_quote};
pub use error::{GaleError, Result};
pub use layout::WorkspaceLayout;
pub use manifest::{GroupFilter, Manifest, ManifestIssue};
pub use registry::{Board, BuildType, Project, Target};
