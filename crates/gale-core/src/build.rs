//! # Build Configurations
//!
//! A configuration is one (board, target, build type) combination. It owns
//! a build directory, knows the `west build` invocation for it, and caches
//! the extra build arguments of the latest build so `--rebuild` can apply
//! them again. The cache lives in the standard build directory and is read
//! by the SCA configuration of the same board and target too.
//!
//! ```text
//! <project>/build/<board>_<project>_<target>/      root build dir (sysbuild)
//! └── <target>/                                     target build dir
//!     ├── CMakeCache.txt
//!     └── build_args.txt                            cached build arguments, one per line
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cmake_cache::CMakeCache;
use crate::command::{CmdMode, CommandSpec, shell_quote};
use crate::error::{GaleError, Result};
use crate::layout::WorkspaceLayout;
use crate::registry::{Board, BuildType, Project, Target};

/// File (inside the target build dir) holding the cached build arguments.
pub const BUILD_ARGS_FILE: &str = "build_args.txt";

// =============================================================================
// TRIPLET
// =============================================================================

/// Uniquely identifies a build configuration: `<board>:<project>:<target>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Triplet {
    pub board: Board,
    pub target: Target,
    pub build_type: BuildType,
}

impl Triplet {
    pub fn new(board: Board, target: Target, build_type: BuildType) -> Self {
        Self {
            board,
            target,
            build_type,
        }
    }

    /// Directory-safe form of the triplet.
    pub fn dir_name(&self) -> String {
        self.to_string().replace(':', "_")
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.board,
            self.target.project(),
            self.target
        )?;
        if self.build_type == BuildType::Sca {
            f.write_str(":sca")?;
        }
        Ok(())
    }
}

// =============================================================================
// BUILD OPTIONS
// =============================================================================

/// Flags for a single build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Pass `--pristine` to `west build`.
    pub pristine: bool,
    /// Pass `--cmake-only` to `west build`.
    pub cmake_only: bool,
    /// Append the cached arguments of the latest build.
    pub load_args: bool,
    /// Cache the given arguments for later rebuilds.
    pub save_args: bool,
}

/// The command for one build, with the arguments that went into it.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub command: CommandSpec,
    /// All arguments passed after `--`.
    pub args: Vec<String>,
    /// Arguments to write to the build-args cache once the build succeeded.
    pub args_to_save: Option<Vec<String>>,
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Clone)]
pub struct Configuration {
    triplet: Triplet,
    project_dir: PathBuf,
    shared_dir: PathBuf,
    root_build_dir: PathBuf,
    target_build_dir: PathBuf,
    build_args_file: PathBuf,
}

impl Configuration {
    pub fn new(layout: &WorkspaceLayout, board: Board, target: Target, build_type: BuildType) -> Self {
        let triplet = Triplet::new(board, target, build_type);
        let project_dir = target.project().dir(layout);
        let (root_build_dir, target_build_dir) = build_dirs(&project_dir, triplet);
        let (_, standard_build_dir) =
            build_dirs(&project_dir, Triplet::new(board, target, BuildType::Standard));
        Self {
            triplet,
            project_dir,
            shared_dir: Project::Shared.dir(layout),
            root_build_dir,
            target_build_dir,
            build_args_file: standard_build_dir.join(BUILD_ARGS_FILE),
        }
    }

    pub fn triplet(&self) -> Triplet {
        self.triplet
    }

    pub fn board(&self) -> Board {
        self.triplet.board
    }

    pub fn target(&self) -> Target {
        self.triplet.target
    }

    pub fn build_type(&self) -> BuildType {
        self.triplet.build_type
    }

    /// Directory of the target's CMakeLists.txt.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Directory passed to `west build -d`.
    pub fn root_build_dir(&self) -> &Path {
        &self.root_build_dir
    }

    /// Build directory of the target image itself.
    pub fn target_build_dir(&self) -> &Path {
        &self.target_build_dir
    }

    /// Cache of the extra arguments given to the latest standard build.
    pub fn build_args_file(&self) -> &Path {
        &self.build_args_file
    }

    /// CMake arguments implied by the build type.
    pub fn build_type_args(&self) -> Vec<String> {
        match self.build_type() {
            BuildType::Standard => Vec::new(),
            BuildType::Sca => {
                let codechecker_dir = self.shared_dir.join("share").join("codechecker");
                // Spaces are not allowed inside the option; CodeChecker takes ';' instead.
                let analyze_opts = format!("--skip={} ", codechecker_dir.join("skipfile.txt").display())
                    .replace(' ', ";");
                vec![
                    "-DZEPHYR_SCA_VARIANT=codechecker".to_string(),
                    format!("-DCODECHECKER_NAME={}", self.target()),
                    format!(
                        "-DCODECHECKER_CONFIG_FILE={}",
                        codechecker_dir.join(".codechecker.json").display()
                    ),
                    format!("-DCODECHECKER_ANALYZE_OPTS={}", analyze_opts),
                    "-DCODECHECKER_PARSE_SKIP=1".to_string(),
                ]
            }
        }
    }

    /// Plan a build with the given extra CMake arguments.
    pub fn plan_build(&self, extra_args: &[String], options: BuildOptions) -> Result<BuildPlan> {
        if options.load_args && options.save_args {
            return Err(GaleError::ConflictingBuildArgs);
        }

        let mut args = extra_args.to_vec();
        args.extend(self.build_type_args());
        if options.load_args {
            args.extend(self.load_build_args()?);
        }

        let mut cmd = format!(
            "west build -s {} -d {} -t {} -b {} --sysbuild",
            self.project_dir.display(),
            self.root_build_dir.display(),
            self.target().cmake_target(),
            self.board().west_board(),
        );
        if options.pristine {
            cmd.push_str(" --pristine");
        }
        if options.cmake_only {
            cmd.push_str(" --cmake-only");
        }
        cmd.push_str(" --");
        for arg in &args {
            cmd.push(' ');
            cmd.push_str(&shell_quote(arg));
        }

        let command = CommandSpec::new(
            cmd,
            format!(
                "Building target '{}' for board '{}'",
                self.target(),
                self.board()
            ),
            CmdMode::Foreground,
        );
        Ok(BuildPlan {
            command,
            args,
            args_to_save: options.save_args.then(|| extra_args.to_vec()),
        })
    }

    /// Write the arguments to the build-args cache, one per line.
    pub fn save_build_args(&self, args: &[String]) -> Result<PathBuf> {
        let path = self.build_args_file.clone();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, args.join("\n"))?;
        Ok(path)
    }

    /// Read the cached build arguments; a missing cache yields none.
    pub fn load_build_args(&self) -> Result<Vec<String>> {
        match std::fs::read_to_string(&self.build_args_file) {
            Ok(content) => Ok(content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Build cache of a previously built configuration.
    pub fn build_cache(&self) -> Result<BuildCache> {
        BuildCache::load(self)
    }

    /// Flash a hardware board from the build directory.
    pub fn flash_command(&self, extra_args: &[String]) -> CommandSpec {
        let mut cmd = format!("west flash -d {}", self.root_build_dir.display());
        for arg in extra_args {
            cmd.push(' ');
            cmd.push_str(&shell_quote(arg));
        }
        CommandSpec::new(
            cmd,
            format!("Flashing target '{}' onto board '{}'", self.target(), self.board()),
            CmdMode::Foreground,
        )
        .in_dir(&self.project_dir)
    }

    /// Flash and attach a debugger on a hardware board.
    pub fn debug_command(&self) -> CommandSpec {
        CommandSpec::new(
            format!("west debug -d {}", self.root_build_dir.display()),
            format!("Debugging target '{}' on board '{}'", self.target(), self.board()),
            CmdMode::Foreground,
        )
        .in_dir(&self.project_dir)
    }
}

/// Root and target build directories of a configuration.
fn build_dirs(project_dir: &Path, triplet: Triplet) -> (PathBuf, PathBuf) {
    let root_build_dir = project_dir.join("build").join(triplet.dir_name());
    let target_build_dir = match triplet.target.build_subdir() {
        Some(subdir) => root_build_dir.join(subdir),
        None => root_build_dir.clone(),
    };
    (root_build_dir, target_build_dir)
}

// =============================================================================
// BUILD CACHE
// =============================================================================

/// Generated values of a built configuration (CMake cache and artifacts).
#[derive(Debug, Clone)]
pub struct BuildCache {
    pub triplet: Triplet,
    /// Directory where the CMakeCache.txt and other build artifacts are stored.
    pub build_dir: PathBuf,
    pub cmake_cache: CMakeCache,
}

impl BuildCache {
    /// Load the cache of a configuration; it must have been built before.
    pub fn load(config: &Configuration) -> Result<Self> {
        let build_dir = config.target_build_dir().to_path_buf();
        let triplet = config.triplet();
        if !build_dir.exists() {
            return Err(GaleError::MissingBuildDir {
                triplet: triplet.to_string(),
                dir: build_dir,
            });
        }

        let cache_file = build_dir.join("CMakeCache.txt");
        if !cache_file.exists() {
            return Err(GaleError::MissingCMakeCache {
                triplet: triplet.to_string(),
                path: cache_file,
            });
        }

        Ok(Self {
            triplet,
            cmake_cache: CMakeCache::load(&cache_file)?,
            build_dir,
        })
    }

    pub fn board(&self) -> Board {
        self.triplet.board
    }

    pub fn target(&self) -> Target {
        self.triplet.target
    }
}
