//! # Command Line Arguments
//!
//! clap derive definitions for the `gale` command. Boards, targets and
//! applications are parsed with their `FromStr` implementations from
//! gale-core, so unknown names list the valid ones.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gale_core::repos::DEFAULT_GROUP;
use gale_core::{Board, Target};

/// Terminal emulator used for commands opened in a new window.
pub const DEFAULT_TERMINAL: &str = "x-terminal-emulator";

#[derive(Debug, Parser)]
#[command(name = "gale")]
#[command(version, about = "Workspace management tool for Gale", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the commands instead of running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// West workspace directory (default: output of `west topdir`)
    #[arg(long, global = true, env = "GALE_TOPDIR")]
    pub topdir: Option<PathBuf>,

    /// Terminal emulator for commands opened in a new window
    #[arg(long, global = true, env = "GALE_TERMINAL", default_value = DEFAULT_TERMINAL)]
    pub terminal: String,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install system packages needed by the workspace
    Setup,

    /// Install the Python requirements of the workspace
    Install,

    /// Check out a branch in every Gale repository
    Checkout {
        branch: String,

        /// Use `west forall` on a manifest group (`--group=<name>`) instead of the known projects
        #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = DEFAULT_GROUP)]
        group: Option<String>,
    },

    /// Commit all changes and push, in every Gale repository
    Push {
        message: String,

        /// Use `west forall` on a manifest group (`--group=<name>`) instead of the known projects
        #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = DEFAULT_GROUP)]
        group: Option<String>,
    },

    /// Build a target for a board
    Build(BuildArgs),

    /// Run a built target (BabbleSim) or flash it (hardware)
    Run(RunArgs),

    /// Build and run an application in QEMU
    Emulate {
        /// Application to emulate
        app: Target,

        /// Start a gdb server and attach gdb
        #[arg(long)]
        debug: bool,
    },

    /// Analyse a target with CodeChecker
    Sca(TargetArgs),

    /// Open a serial monitor
    Monitor {
        /// Serial port or pseudo terminal
        #[arg(short, long)]
        port: String,

        /// Open the monitor in a new terminal window
        #[arg(long)]
        new_terminal: bool,
    },

    /// Show projects, boards and targets
    Info {
        #[arg(long)]
        json: bool,
    },

    /// Inspect the west manifest
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },
}

#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    #[arg(short, long)]
    pub board: Board,

    #[arg(short, long)]
    pub target: Target,
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Remove the build directory first
    #[arg(short, long)]
    pub pristine: bool,

    /// Only run CMake
    #[arg(long)]
    pub cmake_only: bool,

    /// Extra CMake arguments, remembered for later rebuilds
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Rebuild with the remembered build arguments first
    #[arg(long)]
    pub rebuild: bool,

    /// Slow the simulation down to wall-clock time
    #[arg(long)]
    pub real_time: bool,

    /// Debug with gdb
    #[arg(long)]
    pub gdb: bool,

    /// Check the app with valgrind
    #[arg(long)]
    pub valgrind: bool,

    /// Do not record CTF trace data
    #[arg(long)]
    pub no_tracing: bool,

    /// Extra arguments for the executable or the flash runner
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum ManifestAction {
    /// Validate the manifest and print every issue
    Check {
        /// Manifest file (default: the workspace's west.yml)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// List the projects of the manifest
    List {
        /// Manifest file (default: the workspace's west.yml)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Include projects disabled by the group filter
        #[arg(long)]
        all: bool,

        /// Extra group filter entries, e.g. +optional,-gale
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        group_filter: Vec<String>,

        #[arg(long)]
        json: bool,
    },
}

impl ManifestAction {
    pub fn file(&self) -> Option<&PathBuf> {
        match self {
            Self::Check { file } | Self::List { file, .. } => file.as_ref(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn build_collects_trailing_args() {
        let cli = Cli::try_parse_from([
            "gale", "build", "-b", "nrf54l15dk", "-t", "hmi", "--pristine", "--", "-DCONFIG_DEBUG=y",
        ])
        .unwrap();
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.target.board, Board::Nrf54l15Dk);
                assert_eq!(args.target.target, Target::HmiApp);
                assert!(args.pristine);
                assert_eq!(args.args, vec!["-DCONFIG_DEBUG=y"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn unknown_board_is_rejected() {
        let err = Cli::try_parse_from(["gale", "sca", "-b", "esp32", "-t", "hmi_app"]).unwrap_err();
        assert!(err.to_string().contains("nrf54l15dk"));
    }

    #[test]
    fn group_defaults_when_flag_has_no_value() {
        let cli = Cli::try_parse_from(["gale", "checkout", "main", "--group"]).unwrap();
        match cli.command {
            Commands::Checkout { branch, group } => {
                assert_eq!(branch, "main");
                assert_eq!(group.as_deref(), Some(DEFAULT_GROUP));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["gale", "push", "wip"]).unwrap();
        assert!(matches!(cli.command, Commands::Push { group: None, .. }));
    }

    #[test]
    fn group_value_needs_equals_sign() {
        let cli = Cli::try_parse_from(["gale", "checkout", "--group", "main"]).unwrap();
        match cli.command {
            Commands::Checkout { branch, group } => {
                assert_eq!(branch, "main");
                assert_eq!(group.as_deref(), Some(DEFAULT_GROUP));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["gale", "push", "--group=zephyr", "Bump versions"]).unwrap();
        match cli.command {
            Commands::Push { message, group } => {
                assert_eq!(message, "Bump versions");
                assert_eq!(group.as_deref(), Some("zephyr"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["gale", "info", "--json", "--dry-run", "--topdir", "/ws"]).unwrap();
        assert!(cli.global.dry_run);
        assert_eq!(cli.global.topdir, Some(PathBuf::from("/ws")));
        assert!(matches!(cli.command, Commands::Info { json: true }));
    }

    #[test]
    fn group_filter_accepts_signed_list() {
        let cli = Cli::try_parse_from([
            "gale", "manifest", "list", "--group-filter", "-gale,+optional",
        ])
        .unwrap();
        match cli.command {
            Commands::Manifest {
                action: ManifestAction::List { group_filter, .. },
            } => assert_eq!(group_filter, vec!["-gale", "+optional"]),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
