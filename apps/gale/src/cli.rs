//! # CLI Commands
//!
//! One `cmd_*` function per `gale` subcommand. Paths and command lines come
//! from gale-core; this module sources environments, feeds the plans to the
//! [`Runner`] and renders reports.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gale_core::build::BuildOptions;
use gale_core::repos::{self, RepoScope};
use gale_core::{
    Board, BuildType, CmdMode, CommandSpec, Configuration, GaleError, GroupFilter, Manifest,
    Project, Target, WorkspaceLayout, bsim, emulate, sca, shell_quote,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::args::{BuildArgs, GlobalArgs, RunArgs, TargetArgs};
use crate::error::Result;
use crate::runner::{Runner, RunnerConfig};

/// System packages needed to emulate the applications.
pub const SYSTEM_PACKAGES: [&str; 2] = ["qemu-system", "qemu-user-static"];

// =============================================================================
// CONTEXT
// =============================================================================

/// Workspace layout plus the runner executing its commands.
pub struct Context {
    pub layout: WorkspaceLayout,
    pub runner: Runner,
}

impl Context {
    pub fn new(layout: WorkspaceLayout, global: &GlobalArgs) -> Self {
        let runner = Runner::new(RunnerConfig {
            dry_run: global.dry_run,
            terminal: global.terminal.clone(),
            default_cwd: layout.topdir().to_path_buf(),
            log_dir: layout.topdir().join(".gale").join("logs"),
        });
        Self { layout, runner }
    }

    /// Build the context from `--topdir`, falling back to `west topdir`.
    pub async fn discover(global: &GlobalArgs) -> Result<Self> {
        let topdir = match &global.topdir {
            Some(topdir) => topdir.clone(),
            None => west_topdir(&global.terminal).await?,
        };
        debug!(topdir = %topdir.display(), "workspace");
        Ok(Self::new(WorkspaceLayout::from_topdir(topdir), global))
    }
}

/// Ask west for the workspace directory. Runs even in dry-run mode.
async fn west_topdir(terminal: &str) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let mut runner = Runner::new(RunnerConfig {
        dry_run: false,
        terminal: terminal.to_string(),
        default_cwd: cwd.clone(),
        log_dir: std::env::temp_dir(),
    });
    let spec = CommandSpec::new("west topdir", "Locating west workspace", CmdMode::Capture);
    let topdir = runner.run(&spec).await?;
    Ok(PathBuf::from(topdir))
}

/// Active Python virtual environment, from `VIRTUAL_ENV`.
pub fn virtual_env() -> Option<PathBuf> {
    std::env::var_os("VIRTUAL_ENV")
        .filter(|venv| !venv.is_empty())
        .map(PathBuf::from)
}

fn require_virtual_env(venv: Option<&Path>) -> Result<&Path> {
    venv.ok_or_else(|| GaleError::NotInVirtualEnv.into())
}

// =============================================================================
// SETUP / INSTALL
// =============================================================================

/// Package installation command for a platform (`std::env::consts::OS`).
pub fn install_packages_command(os: &str, packages: &[&str]) -> Result<CommandSpec> {
    match os {
        "linux" => Ok(CommandSpec::new(
            format!("sudo apt install {}", packages.join(" ")),
            format!("Installing system packages: {}", packages.join(", ")),
            CmdMode::Foreground,
        )),
        "windows" => Err(GaleError::UnsupportedPlatform(
            "don't know how to install packages on Windows".to_string(),
        )
        .into()),
        other => Err(GaleError::UnsupportedPlatform(other.to_string()).into()),
    }
}

pub async fn cmd_setup(ctx: &mut Context, venv: Option<&Path>) -> Result<()> {
    require_virtual_env(venv)?;
    info!("Installing dependencies for QEMU...");
    let spec = install_packages_command(std::env::consts::OS, &SYSTEM_PACKAGES)?;
    ctx.runner.run(&spec).await?;
    Ok(())
}

pub async fn cmd_install(ctx: &mut Context, venv: Option<&Path>) -> Result<()> {
    let venv = require_virtual_env(venv)?;
    let requirements = ctx.layout.requirements_file();
    if !requirements.exists() {
        return Err(GaleError::MissingRequirements(requirements).into());
    }

    let python = if cfg!(windows) {
        venv.join("Scripts").join("python")
    } else {
        venv.join("bin").join("python")
    };
    let spec = CommandSpec::new(
        format!(
            "{} -m pip install -r {}",
            shell_quote(&python.display().to_string()),
            shell_quote(&requirements.display().to_string())
        ),
        format!("Installing requirements from {}", requirements.display()),
        CmdMode::Foreground,
    );
    ctx.runner.run(&spec).await?;
    Ok(())
}

// =============================================================================
// REPOSITORIES
// =============================================================================

fn repo_scope(group: Option<&str>) -> RepoScope {
    match group {
        Some(group) => RepoScope::WestGroup(group.to_string()),
        None => RepoScope::UserProjects,
    }
}

pub async fn cmd_checkout(ctx: &mut Context, branch: &str, group: Option<&str>) -> Result<()> {
    info!("Checking out branch '{}' in all gale repositories...", branch);
    let specs = repos::plan(
        &ctx.layout,
        &repo_scope(group),
        &repos::checkout_command(branch),
        "Checking out",
    );
    ctx.runner.run_all(&specs).await?;
    Ok(())
}

pub async fn cmd_push(ctx: &mut Context, message: &str, group: Option<&str>) -> Result<()> {
    info!("Committing and pushing changes in all gale repositories...");
    let specs = repos::plan(
        &ctx.layout,
        &repo_scope(group),
        &repos::push_command(message),
        "Pushing",
    );
    ctx.runner.run_all(&specs).await?;
    Ok(())
}

// =============================================================================
// BUILD / RUN
// =============================================================================

pub async fn cmd_build(ctx: &mut Context, args: &BuildArgs) -> Result<()> {
    let TargetArgs { board, target } = args.target;
    let config = Configuration::new(&ctx.layout, board, target, BuildType::Standard);
    ctx.runner.source_env(&board.env_file(&ctx.layout)?)?;

    let plan = config.plan_build(
        &args.args,
        BuildOptions {
            pristine: args.pristine,
            cmake_only: args.cmake_only,
            save_args: true,
            ..BuildOptions::default()
        },
    )?;
    ctx.runner.run(&plan.command).await?;

    if ctx.runner.is_dry_run() {
        return Ok(());
    }
    if let Some(saved) = &plan.args_to_save {
        let path = config.save_build_args(saved)?;
        debug!(path = %path.display(), "saved build arguments");
    }
    if !args.cmake_only {
        report_artifact(&config);
    }
    Ok(())
}

/// Log where the built binary ended up.
fn report_artifact(config: &Configuration) {
    let artifact = config.build_cache().and_then(|cache| {
        let name = if config.board().is_bsim() {
            cache.cmake_cache.exe_path()?
        } else {
            cache.cmake_cache.elf_path()?
        };
        Ok(cache.build_dir.join(name))
    });
    match artifact {
        Ok(path) => info!("Built {}", path.display()),
        Err(e) => debug!(error = %e, "no artifact to report"),
    }
}

pub async fn cmd_run(ctx: &mut Context, args: &RunArgs) -> Result<()> {
    let TargetArgs { board, target } = args.target;
    let config = Configuration::new(&ctx.layout, board, target, BuildType::Standard);

    if args.rebuild {
        ctx.runner.source_env(&board.env_file(&ctx.layout)?)?;
        let plan = config.plan_build(
            &[],
            BuildOptions {
                load_args: true,
                ..BuildOptions::default()
            },
        )?;
        ctx.runner.run(&plan.command).await?;
    }

    if !board.is_bsim() {
        if args.valgrind || args.real_time {
            return Err(GaleError::InvalidOptions(format!(
                "--valgrind and --real-time need a BabbleSim board, not '{}'",
                board
            ))
            .into());
        }
        let spec = if args.gdb {
            config.debug_command()
        } else {
            config.flash_command(&args.args)
        };
        ctx.runner.run(&spec).await?;
        return Ok(());
    }

    let cache = config.build_cache()?;
    let run = bsim::plan(
        &ctx.layout,
        &cache,
        &bsim::BsimOptions {
            gdb: args.gdb,
            valgrind: args.valgrind,
            real_time: args.real_time,
            tracing: !args.no_tracing,
            extra_args: args.args.clone(),
        },
    )?;

    for dir in run.dirs() {
        ctx.runner.create_dir(dir)?;
    }
    for step in &run.copies {
        ctx.runner.copy(step)?;
    }
    info!(sim_id = %run.sim_id, results = %run.results_dir.display(), "Starting simulation");
    ctx.runner.run_all(&run.devices).await?;
    ctx.runner.run(&run.phy).await?;
    ctx.runner.finish().await?;
    Ok(())
}

// =============================================================================
// EMULATE / SCA / MONITOR
// =============================================================================

pub async fn cmd_emulate(ctx: &mut Context, app: Target, debug: bool, venv: Option<&Path>) -> Result<()> {
    require_virtual_env(venv)?;
    let plan = emulate::plan(&ctx.layout, app, debug)?;
    ctx.runner.source_env(&plan.env_file)?;

    ctx.runner.run(&plan.build).await?;
    if let Some(debugger) = &plan.debugger {
        ctx.runner.run(debugger).await?;
    }
    ctx.runner.finish().await?;
    Ok(())
}

pub async fn cmd_sca(ctx: &mut Context, args: &TargetArgs) -> Result<()> {
    let config = Configuration::new(&ctx.layout, args.board, args.target, BuildType::Sca);
    ctx.runner.source_env(&args.board.env_file(&ctx.layout)?)?;

    let build = config.plan_build(&[], sca::build_options())?;
    ctx.runner.run(&build.command).await?;

    let cache = config.build_cache()?;
    let plan = sca::plan(&config, &cache)?;
    ctx.runner.run(&plan.server).await?;
    ctx.runner
        .wait_for_port(
            "CodeChecker server",
            sca::SERVER_PORT,
            Duration::from_secs(sca::SERVER_START_TIMEOUT_SECS),
        )
        .await?;
    ctx.runner.run(&plan.store).await?;
    ctx.runner.run(&plan.browse).await?;
    Ok(())
}

/// Serial monitor on `port`.
pub fn monitor_command(port: &str, new_terminal: bool) -> CommandSpec {
    let mode = if new_terminal {
        CmdMode::NewTerminal
    } else {
        CmdMode::Replace
    };
    CommandSpec::new(
        format!("picocom --quiet {}", shell_quote(port)),
        format!("Opening monitor on {}", port),
        mode,
    )
}

/// Runs without a workspace: the monitor works from any directory.
pub async fn cmd_monitor(runner: &mut Runner, port: &str, new_terminal: bool) -> Result<()> {
    runner.run(&monitor_command(port, new_terminal)).await?;
    Ok(())
}

// =============================================================================
// INFO
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct InfoReport {
    pub topdir: PathBuf,
    pub manifest: PathBuf,
    pub projects: Vec<ProjectInfo>,
    pub boards: Vec<BoardInfo>,
    pub targets: Vec<TargetInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectInfo {
    pub name: &'static str,
    pub path: PathBuf,
    pub upstream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardInfo {
    pub name: &'static str,
    pub west_board: &'static str,
    pub bsim: bool,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetInfo {
    pub name: &'static str,
    pub project: &'static str,
    pub path: PathBuf,
}

pub fn cmd_info(layout: &WorkspaceLayout) -> InfoReport {
    InfoReport {
        topdir: layout.topdir().to_path_buf(),
        manifest: layout.manifest_file(),
        projects: Project::ALL
            .iter()
            .map(|project| ProjectInfo {
                name: project.name(),
                path: project.dir(layout),
                upstream: project.is_upstream(),
            })
            .collect(),
        boards: Board::ALL
            .iter()
            .map(|board| BoardInfo {
                name: board.name(),
                west_board: board.west_board(),
                bsim: board.is_bsim(),
                path: board.dir(layout),
            })
            .collect(),
        targets: Target::ALL
            .iter()
            .map(|target| TargetInfo {
                name: target.name(),
                project: target.project().name(),
                path: target.project().dir(layout),
            })
            .collect(),
    }
}

impl fmt::Display for InfoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Workspace: {}", self.topdir.display())?;
        writeln!(f, "Manifest:  {}", self.manifest.display())?;
        writeln!(f)?;
        writeln!(f, "Projects:")?;
        for project in &self.projects {
            let note = if project.upstream { " (upstream)" } else { "" };
            writeln!(f, "  {:<12} {}{}", project.name, project.path.display(), note)?;
        }
        writeln!(f, "Boards:")?;
        for board in &self.boards {
            writeln!(f, "  {:<14} {}", board.name, board.west_board)?;
        }
        writeln!(f, "Targets:")?;
        for target in &self.targets {
            writeln!(f, "  {:<12} {}", target.name, target.path.display())?;
        }
        Ok(())
    }
}

// =============================================================================
// MANIFEST
// =============================================================================

/// Validate a manifest file, logging every issue.
pub fn cmd_manifest_check(path: &Path) -> Result<Manifest> {
    let manifest = Manifest::load(path)?;
    for issue in manifest.validate() {
        warn!("{}", issue);
    }
    manifest.check()?;
    info!(projects = manifest.projects.len(), "Manifest {} is valid", path.display());
    Ok(manifest)
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectListing {
    pub name: String,
    pub path: String,
    pub revision: String,
    pub url: Option<String>,
    pub groups: Vec<String>,
    pub active: bool,
}

pub fn cmd_manifest_list(path: &Path, all: bool, group_filter: &[String]) -> Result<Vec<ProjectListing>> {
    let manifest = Manifest::load(path)?;
    let extra = GroupFilter::parse(group_filter)?;
    let active: Vec<&str> = manifest
        .active_projects(&extra)
        .into_iter()
        .map(|project| project.name.as_str())
        .collect();

    Ok(manifest
        .projects
        .iter()
        .map(|project| ProjectListing {
            name: project.name.clone(),
            path: project.effective_path().to_string(),
            revision: manifest.revision_of(project).to_string(),
            url: manifest.resolve_url(project),
            groups: project.groups.clone(),
            active: active.contains(&project.name.as_str()),
        })
        .filter(|listing| all || listing.active)
        .collect())
}

/// Plain text table of a project listing.
pub fn render_listing(listing: &[ProjectListing]) -> String {
    let mut out = String::new();
    for project in listing {
        let marker = if project.active { ' ' } else { '-' };
        out.push_str(&format!(
            "{}{:<16} {:<32} {:<12} {}",
            marker,
            project.name,
            project.path,
            project.revision,
            project.url.as_deref().unwrap_or("?")
        ));
        if !project.groups.is_empty() {
            out.push_str(&format!(" [{}]", project.groups.join(",")));
        }
        out.push('\n');
    }
    out
}

/// Print a report as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn packages_install_on_linux_only() {
        let spec = install_packages_command("linux", &SYSTEM_PACKAGES).unwrap();
        assert_eq!(spec.cmd, "sudo apt install qemu-system qemu-user-static");
        assert!(install_packages_command("windows", &SYSTEM_PACKAGES).is_err());
        assert!(install_packages_command("macos", &SYSTEM_PACKAGES).is_err());
    }

    #[test]
    fn monitor_replaces_or_opens_terminal() {
        let spec = monitor_command("/dev/pts/4", false);
        assert_eq!(spec.cmd, "picocom --quiet /dev/pts/4");
        assert_eq!(spec.mode, CmdMode::Replace);
        assert_eq!(monitor_command("/dev/pts/4", true).mode, CmdMode::NewTerminal);
    }

    #[test]
    fn info_lists_every_known_name() {
        let layout = WorkspaceLayout::from_topdir("/ws");
        let report = cmd_info(&layout);
        assert_eq!(report.projects.len(), Project::ALL.len());
        assert_eq!(report.boards.len(), Board::ALL.len());
        assert_eq!(report.targets.len(), Target::ALL.len());

        let text = report.to_string();
        assert!(text.contains("zephyr"));
        assert!(text.contains("(upstream)"));
        assert!(text.contains("nrf5340bsim"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["targets"][0]["name"], "hmi_app");
    }

    #[test]
    fn listing_marks_inactive_projects() {
        let listing = vec![
            ProjectListing {
                name: "zephyr".to_string(),
                path: "gale/projects/zephyr".to_string(),
                revision: "main".to_string(),
                url: None,
                groups: vec![],
                active: true,
            },
            ProjectListing {
                name: "docs".to_string(),
                path: "docs".to_string(),
                revision: "master".to_string(),
                url: Some("https://x/docs".to_string()),
                groups: vec!["optional".to_string()],
                active: false,
            },
        ];
        let text = render_listing(&listing);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with(" zephyr"));
        assert!(lines[0].ends_with('?'));
        assert!(lines[1].starts_with("-docs"));
        assert!(lines[1].ends_with("[optional]"));
    }
}
