//! # QEMU Emulation
//!
//! Builds and runs an application in QEMU using the shared QEMU Kconfig
//! fragment and devicetree overlay. In debug mode the QEMU gdb server runs
//! in the background while gdb attaches in the foreground.

use std::path::PathBuf;

use crate::cmake_cache::CMakeCache;
use crate::command::{CmdMode, CommandSpec};
use crate::error::Result;
use crate::layout::WorkspaceLayout;
use crate::registry::{Project, Target};

/// Commands for one emulation session.
#[derive(Debug, Clone)]
pub struct EmulationPlan {
    /// Environment file exporting the QEMU board and friends.
    pub env_file: PathBuf,
    pub build_dir: PathBuf,
    /// Build-and-run (or build-and-serve, when debugging).
    pub build: CommandSpec,
    /// gdb session attached to the debug server.
    pub debugger: Option<CommandSpec>,
}

/// Build directory used for QEMU builds of a target.
pub fn build_dir(layout: &WorkspaceLayout, target: Target) -> PathBuf {
    target.project().dir(layout).join("build_qemu")
}

/// Plan an emulation run.
///
/// Debugging reads gdb and the Zephyr base from the existing QEMU build, so
/// the target must have been emulated once before.
pub fn plan(layout: &WorkspaceLayout, target: Target, debug: bool) -> Result<EmulationPlan> {
    let shared = Project::Shared.dir(layout);
    let project_dir = target.project().dir(layout);
    let build_dir = build_dir(layout, target);

    let cmake_target = if debug { "debugserver_qemu" } else { "run" };
    let cmd = format!(
        "west build -d {} --extra-conf {} --extra-dtc-overlay {} -t {}",
        build_dir.display(),
        shared.join("kconfig/qemu.conf").display(),
        shared.join("devicetree/qemu.overlay").display(),
        cmake_target
    );
    let desc = format!("Emulating target '{}' in QEMU", target);

    if !debug {
        return Ok(EmulationPlan {
            env_file: shared.join("env_qemu"),
            build: CommandSpec::new(cmd, desc, CmdMode::Foreground).in_dir(&project_dir),
            build_dir,
            debugger: None,
        });
    }

    let cache = CMakeCache::load(build_dir.join("CMakeCache.txt"))?;
    let debugger = CommandSpec::new(
        format!(
            "{} -ex='dir {}' -x {} {}",
            cache.gdb()?,
            cache.zephyr_base()?,
            shared.join("gdb/.qemu_gdbconf").display(),
            build_dir.join("zephyr/zephyr.elf").display()
        ),
        "Attaching gdb to QEMU",
        CmdMode::Foreground,
    );

    Ok(EmulationPlan {
        env_file: shared.join("env_qemu"),
        build: CommandSpec::new(cmd, desc, CmdMode::Background).in_dir(&project_dir),
        build_dir,
        debugger: Some(debugger),
    })
}
