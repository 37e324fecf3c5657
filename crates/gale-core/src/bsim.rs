//! # BabbleSim Runs
//!
//! A target built for a BabbleSim board is a native executable. Running it
//! means assembling a simulation:
//!
//! 1. copy the BabbleSim binaries/libraries and the target binary to a run directory
//! 2. pick a common simulation id
//! 3. run the target device
//! 4. run optional devices (the handbrake, for real time execution)
//! 5. run the PHY, which starts the simulation proper
//!
//! [`plan`] computes all of this; the runner performs the copies and starts
//! the commands in order.

use std::path::{Path, PathBuf};

use crate::build::BuildCache;
use crate::command::{CmdMode, CommandSpec, shell_quote};
use crate::error::{GaleError, Result};
use crate::layout::WorkspaceLayout;
use crate::registry::Project;

/// How often the handbrake pokes the simulation, in microseconds.
///
/// Lower values improve responsiveness at the cost of overhead; it should
/// not go below 2 ms. Also used as the app's max resync offset.
pub const HANDBRAKE_PERIOD_US: u32 = 5_000;

const PHY_EXE: &str = "bs_2G4_phy_v1";
const HANDBRAKE_EXE: &str = "bs_device_handbrake";

/// Flags for a BabbleSim run.
#[derive(Debug, Clone, Default)]
pub struct BsimOptions {
    /// Run the app under gdb (TUI) in a new terminal.
    pub gdb: bool,
    /// Run the app under valgrind.
    pub valgrind: bool,
    /// Slow the simulation down to wall-clock time.
    pub real_time: bool,
    /// Store CTF trace data in the results directory.
    pub tracing: bool,
    /// Extra arguments for the app executable.
    pub extra_args: Vec<String>,
}

/// A file system step done before any device starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyStep {
    /// Copy a directory tree, merging into an existing destination.
    Dir { from: PathBuf, to: PathBuf },
    File { from: PathBuf, to: PathBuf },
}

/// Everything needed to run one simulation.
#[derive(Debug, Clone)]
pub struct BsimRun {
    pub run_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub results_dir: PathBuf,
    pub sim_id: String,
    pub copies: Vec<CopyStep>,
    /// Devices, started in order before the PHY.
    pub devices: Vec<CommandSpec>,
    /// Runs in the foreground; returns when the simulation ends.
    pub phy: CommandSpec,
}

impl BsimRun {
    /// Directories to create before copying.
    pub fn dirs(&self) -> [&Path; 2] {
        [&self.run_dir, &self.results_dir]
    }
}

/// Plan a simulation of a target built for a BabbleSim board.
pub fn plan(layout: &WorkspaceLayout, cache: &BuildCache, options: &BsimOptions) -> Result<BsimRun> {
    if options.gdb && options.valgrind {
        return Err(GaleError::InvalidOptions(
            "gdb and valgrind cannot be used together".to_string(),
        ));
    }
    let board = cache.board();
    if !board.is_bsim() {
        return Err(GaleError::InvalidOptions(format!(
            "board '{}' is not a BabbleSim board",
            board
        )));
    }

    let cmake = &cache.cmake_cache;
    let exe = PathBuf::from(cmake.exe_path()?);
    if !exe.exists() {
        return Err(GaleError::MissingBinary(exe));
    }
    let exe_name = exe
        .file_name()
        .ok_or_else(|| GaleError::MissingBinary(exe.clone()))?
        .to_owned();

    // Inputs
    let bsim_out = PathBuf::from(cmake.bsim_out_path()?);

    // Outputs
    let target = cache.target();
    let run_dir = target
        .project()
        .dir(layout)
        .join("bsim")
        .join(cache.triplet.dir_name());
    let bin_dir = run_dir.join("bin");
    let lib_dir = run_dir.join("lib");
    let results_dir = run_dir.join("results");
    let final_exe = bin_dir.join(exe_name);

    let mut copies = vec![
        CopyStep::Dir {
            from: bsim_out.join("bin"),
            to: bin_dir.clone(),
        },
        CopyStep::Dir {
            from: bsim_out.join("lib"),
            to: lib_dir,
        },
        CopyStep::File {
            from: exe,
            to: final_exe.clone(),
        },
    ];

    // All devices sharing the simulation id share the same PHY.
    let sim_id = target.name().to_string();
    let mut common_args = Vec::new();

    if options.tracing {
        copies.push(CopyStep::File {
            from: Project::Zephyr
                .dir(layout)
                .join("subsys/tracing/ctf/tsdl/metadata"),
            to: results_dir.join("metadata"),
        });
        common_args.push(format!(
            "--trace-file={}",
            results_dir.join("trace_data").display()
        ));
    }

    // Persistent storage for the simulated flash.
    if board.has_split_flash() {
        common_args.push(format!(
            "--flash_app_file={}",
            results_dir.join("flash_app.bin").display()
        ));
        common_args.push(format!(
            "--flash_net_file={}",
            results_dir.join("flash_net.bin").display()
        ));
    } else {
        common_args.push(format!(
            "--flash_file={}",
            results_dir.join("flash.bin").display()
        ));
    }

    if options.real_time {
        // Max resync offset: how far the app may drift from PHY time.
        common_args.push(format!("--mro={}", HANDBRAKE_PERIOD_US));
    }
    common_args.extend(options.extra_args.iter().map(|arg| shell_quote(arg)));

    let mut devices = Vec::new();
    let mut num_devices = 0u32;

    let app = if options.gdb {
        let gdb = cmake.gdb()?;
        let gdbinit = Project::Shared.dir(layout).join("share/gdb/.gdbconf");
        // gdb owns this terminal, so the app waits until the UART is attached by hand.
        let attach = r"echo App\ halted\ until\ UART\ attached!\ Use:\ gale\ monitor\ --port\ %s";
        format!(
            "{} --tui -x {} --args {} -s={} -d={} --uart_pty_wait --uart0_pty_attach_cmd=\"{}\" --uart1_pty_attach_cmd=\"{}\" {}",
            gdb,
            gdbinit.display(),
            final_exe.display(),
            sim_id,
            num_devices,
            attach,
            attach,
            common_args.join(" ")
        )
    } else {
        let attach = "gale monitor --port %s --new-terminal";
        let prefix = if options.valgrind {
            "valgrind --leak-check=full "
        } else {
            ""
        };
        format!(
            "{}{} -s={} -d={} --uart_pty_wait --uart1_pty_attach_cmd=\"{}\" --uart4_pty_attach_cmd=\"{}\" {}",
            prefix,
            final_exe.display(),
            sim_id,
            num_devices,
            attach,
            attach,
            common_args.join(" ")
        )
    };
    num_devices += 1;
    let app_mode = if options.gdb {
        CmdMode::NewTerminal
    } else {
        CmdMode::Background
    };
    devices.push(
        CommandSpec::new(
            app.trim_end().to_string(),
            format!("Running target '{}' device in BabbleSim", target),
            app_mode,
        )
        .in_dir(&bin_dir),
    );

    if options.real_time {
        devices.push(
            CommandSpec::new(
                format!(
                    "./{} -s={} -d={} --pp={}",
                    HANDBRAKE_EXE, sim_id, num_devices, HANDBRAKE_PERIOD_US
                ),
                "Running handbrake device in BabbleSim",
                CmdMode::Background,
            )
            .in_dir(&bin_dir),
        );
        num_devices += 1;
    }

    let phy = CommandSpec::new(
        format!("./{} -s={} -D={}", PHY_EXE, sim_id, num_devices),
        "Starting BabbleSim PHY",
        CmdMode::Foreground,
    )
    .in_dir(&bin_dir);

    Ok(BsimRun {
        run_dir,
        bin_dir,
        results_dir,
        sim_id,
        copies,
        devices,
        phy,
    })
}
