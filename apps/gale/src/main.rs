//! # gale
//!
//! Workspace management tool for Gale.
//!
//! Exits with 0 on success or Ctrl+C, 1 on error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gale::args::{Cli, Commands, GlobalArgs, ManifestAction};
use gale::cli::{self, Context};
use gale::error::Result;
use gale::logging;
use gale::runner::{Runner, RunnerConfig};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.global.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_interrupted() {
                info!("Interrupted");
            } else {
                // Manifest issues were already logged one by one.
                error!("{}", e);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli { global, command } = cli;
    debug!(?command, "Running command");
    let venv = cli::virtual_env();

    match command {
        Commands::Setup => {
            let mut ctx = Context::discover(&global).await?;
            cli::cmd_setup(&mut ctx, venv.as_deref()).await
        }
        Commands::Install => {
            let mut ctx = Context::discover(&global).await?;
            cli::cmd_install(&mut ctx, venv.as_deref()).await
        }
        Commands::Checkout { branch, group } => {
            let mut ctx = Context::discover(&global).await?;
            cli::cmd_checkout(&mut ctx, &branch, group.as_deref()).await
        }
        Commands::Push { message, group } => {
            let mut ctx = Context::discover(&global).await?;
            cli::cmd_push(&mut ctx, &message, group.as_deref()).await
        }
        Commands::Build(args) => {
            let mut ctx = Context::discover(&global).await?;
            cli::cmd_build(&mut ctx, &args).await
        }
        Commands::Run(args) => {
            let mut ctx = Context::discover(&global).await?;
            cli::cmd_run(&mut ctx, &args).await
        }
        Commands::Emulate { app, debug } => {
            let mut ctx = Context::discover(&global).await?;
            cli::cmd_emulate(&mut ctx, app, debug, venv.as_deref()).await
        }
        Commands::Sca(args) => {
            let mut ctx = Context::discover(&global).await?;
            cli::cmd_sca(&mut ctx, &args).await
        }
        Commands::Monitor { port, new_terminal } => {
            let mut runner = Runner::new(RunnerConfig {
                dry_run: global.dry_run,
                terminal: global.terminal.clone(),
                default_cwd: std::env::current_dir()?,
                log_dir: std::env::temp_dir(),
            });
            cli::cmd_monitor(&mut runner, &port, new_terminal).await
        }
        Commands::Info { json } => {
            let ctx = Context::discover(&global).await?;
            let report = cli::cmd_info(&ctx.layout);
            if json {
                cli::print_json(&report)
            } else {
                print!("{}", report);
                Ok(())
            }
        }
        Commands::Manifest { action } => {
            let path = manifest_path(&global, &action).await?;
            match action {
                ManifestAction::Check { .. } => cli::cmd_manifest_check(&path).map(|_| ()),
                ManifestAction::List {
                    all,
                    group_filter,
                    json,
                    ..
                } => {
                    let listing = cli::cmd_manifest_list(&path, all, &group_filter)?;
                    if json {
                        cli::print_json(&listing)
                    } else {
                        print!("{}", cli::render_listing(&listing));
                        Ok(())
                    }
                }
            }
        }
    }
}

/// `--file`, or the workspace's west.yml.
async fn manifest_path(global: &GlobalArgs, action: &ManifestAction) -> Result<PathBuf> {
    match action.file() {
        Some(file) => Ok(file.clone()),
        None => Ok(Context::discover(global).await?.layout.manifest_file()),
    }
}
