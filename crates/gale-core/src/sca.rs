//! # Static Code Analysis
//!
//! CodeChecker analysis of a target:
//! 1. build the target with SCA enabled (pristine, reusing cached build arguments)
//! 2. start the CodeChecker server
//! 3. store the analysis results into the server
//! 4. open the server's web UI

use crate::build::{BuildCache, BuildOptions, Configuration};
use crate::command::{CmdMode, CommandSpec};
use crate::error::Result;

/// Port the CodeChecker server listens on.
pub const SERVER_PORT: u16 = 8001;

/// Seconds to wait for the server to accept connections.
pub const SERVER_START_TIMEOUT_SECS: u64 = 10;

/// Build options for the analysis build.
pub fn build_options() -> BuildOptions {
    BuildOptions {
        pristine: true,
        load_args: true,
        ..BuildOptions::default()
    }
}

/// Commands run after the analysis build.
#[derive(Debug, Clone)]
pub struct ScaPlan {
    pub server: CommandSpec,
    pub store: CommandSpec,
    pub browse: CommandSpec,
}

pub fn plan(config: &Configuration, cache: &BuildCache) -> Result<ScaPlan> {
    let codechecker = cache.cmake_cache.codechecker_exe()?;
    let results = cache
        .build_dir
        .join("sca")
        .join("codechecker")
        .join("codechecker.plist");

    let server = CommandSpec::new(
        format!("{} server", codechecker),
        "Starting CodeChecker server",
        CmdMode::NewTerminal,
    )
    .in_dir(&cache.build_dir);

    let store = CommandSpec::new(
        format!("{} store {} -n {}", codechecker, results.display(), config.target()),
        "Storing analysis results into CodeChecker server",
        CmdMode::Foreground,
    )
    .in_dir(&cache.build_dir);

    let browse = CommandSpec::new(
        format!("{} http://localhost:{}", browser_command(), SERVER_PORT),
        "Opening CodeChecker in browser",
        CmdMode::Foreground,
    )
    .in_dir(&cache.build_dir);

    Ok(ScaPlan {
        server,
        store,
        browse,
    })
}

fn browser_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}
