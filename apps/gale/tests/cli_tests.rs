//! Integration tests for gale CLI commands.
//!
//! Uses tempfile workspaces and dry-run runners: commands are recorded,
//! never executed.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use gale::args::{BuildArgs, GlobalArgs, RunArgs, TargetArgs};
use gale::cli::{
    Context, cmd_build, cmd_checkout, cmd_emulate, cmd_info, cmd_install, cmd_manifest_check,
    cmd_manifest_list, cmd_push, cmd_run, cmd_sca, cmd_setup,
};
use gale::error::CliError;
use gale_core::{Board, BuildType, CmdMode, Configuration, GaleError, Project, Target, WorkspaceLayout};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

const FIXTURE_MANIFEST: &str = include_str!("fixtures/west.yml");

/// Create a workspace with board environments and the QEMU environment.
fn create_workspace() -> TempDir {
    let temp = tempfile::tempdir().expect("Failed to create temp dir");
    let layout = WorkspaceLayout::from_topdir(temp.path());

    for project in Project::ALL {
        std::fs::create_dir_all(project.dir(&layout)).unwrap();
    }
    for board in Board::ALL {
        let dir = board.dir(&layout);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("environment"),
            format!("GALE_IT_BOARD={}\n", board.west_board()),
        )
        .unwrap();
    }
    std::fs::write(
        Project::Shared.dir(&layout).join("env_qemu"),
        "GALE_IT_QEMU_BOARD=qemu_cortex_m3\n",
    )
    .unwrap();
    std::fs::write(layout.manifest_file(), FIXTURE_MANIFEST).unwrap();
    temp
}

fn dry_run_context(temp: &TempDir) -> Context {
    let global = GlobalArgs {
        verbose: false,
        dry_run: true,
        topdir: Some(temp.path().to_path_buf()),
        terminal: "true".to_string(),
    };
    Context::new(WorkspaceLayout::from_topdir(temp.path()), &global)
}

/// Pretend a configuration was built: CMakeCache.txt plus the given entries.
fn fake_build(ctx: &Context, board: Board, target: Target, build_type: BuildType, cache: &str) -> Configuration {
    let config = Configuration::new(&ctx.layout, board, target, build_type);
    std::fs::create_dir_all(config.target_build_dir()).unwrap();
    std::fs::write(config.target_build_dir().join("CMakeCache.txt"), cache).unwrap();
    config
}

/// Fake BabbleSim output tree and app executable; returns the CMakeCache content.
fn fake_bsim_outputs(temp: &TempDir) -> String {
    let bsim_out = temp.path().join("bsim_out");
    std::fs::create_dir_all(bsim_out.join("bin")).unwrap();
    std::fs::create_dir_all(bsim_out.join("lib")).unwrap();
    let exe = temp.path().join("zephyr.exe");
    std::fs::write(&exe, "").unwrap();
    format!(
        "BYPRODUCT_KERNEL_EXE_NAME:FILEPATH={}\nBSIM_OUT_PATH:PATH={}\nCMAKE_GDB:FILEPATH=/sdk/bin/gdb\n",
        exe.display(),
        bsim_out.display()
    )
}

fn target_args(board: Board, target: Target) -> TargetArgs {
    TargetArgs { board, target }
}

fn run_args(board: Board) -> RunArgs {
    RunArgs {
        target: target_args(board, Target::HmiApp),
        rebuild: false,
        real_time: false,
        gdb: false,
        valgrind: false,
        no_tracing: true,
        args: vec![],
    }
}

fn recorded_cmds(ctx: &Context) -> Vec<String> {
    ctx.runner.recorded().iter().map(|spec| spec.cmd.clone()).collect()
}

fn manifest_path(temp: &TempDir) -> PathBuf {
    WorkspaceLayout::from_topdir(temp.path()).manifest_file()
}

// =============================================================================
// BUILD COMMAND TESTS
// =============================================================================

#[tokio::test]
async fn test_build_records_west_build() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);
    let args = BuildArgs {
        target: target_args(Board::Nrf54l15Dk, Target::HmiApp),
        pristine: true,
        cmake_only: false,
        args: vec!["-DCONFIG_DEBUG_OPTIMIZATIONS=y".to_string()],
    };

    cmd_build(&mut ctx, &args).await.unwrap();

    let cmds = recorded_cmds(&ctx);
    assert_eq!(cmds.len(), 1);
    assert!(cmds[0].starts_with("west build -s "));
    assert!(cmds[0].contains("-t hmi_app -b nrf54l15dk/nrf54l15/cpuapp --sysbuild --pristine"));
    assert!(cmds[0].ends_with("-- -DCONFIG_DEBUG_OPTIMIZATIONS=y"));

    // The board environment was sourced for the child processes
    assert!(
        ctx.runner
            .env_overlay()
            .iter()
            .any(|(k, v)| k == "GALE_IT_BOARD" && v == "nrf54l15dk/nrf54l15/cpuapp")
    );
}

#[tokio::test]
async fn test_build_dry_run_does_not_save_args() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);
    let args = BuildArgs {
        target: target_args(Board::Nrf54l15Bsim, Target::SensorApp),
        pristine: false,
        cmake_only: true,
        args: vec!["-DEXTRA=1".to_string()],
    };

    cmd_build(&mut ctx, &args).await.unwrap();

    let config = Configuration::new(&ctx.layout, Board::Nrf54l15Bsim, Target::SensorApp, BuildType::Standard);
    assert!(!config.build_args_file().exists());
    assert!(recorded_cmds(&ctx)[0].contains("--cmake-only"));
}

#[tokio::test]
async fn test_build_without_board_environment_fails() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);
    std::fs::remove_file(Board::Nrf5340Bsim.dir(&ctx.layout).join("environment")).unwrap();

    let args = BuildArgs {
        target: target_args(Board::Nrf5340Bsim, Target::HmiApp),
        pristine: false,
        cmake_only: false,
        args: vec![],
    };
    let result = cmd_build(&mut ctx, &args).await;
    assert!(matches!(
        result,
        Err(CliError::Core(GaleError::MissingEnvironment { .. }))
    ));
    assert!(ctx.runner.recorded().is_empty());
}

// =============================================================================
// RUN COMMAND TESTS
// =============================================================================

#[tokio::test]
async fn test_run_flashes_hardware_board() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);

    cmd_run(&mut ctx, &run_args(Board::Nrf54l15Dk)).await.unwrap();

    let cmds = recorded_cmds(&ctx);
    assert_eq!(cmds.len(), 1);
    assert!(cmds[0].starts_with("west flash -d "));
}

#[tokio::test]
async fn test_run_debugs_hardware_board_with_gdb() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);
    let mut args = run_args(Board::Nrf54l15Dk);
    args.gdb = true;

    cmd_run(&mut ctx, &args).await.unwrap();
    assert!(recorded_cmds(&ctx)[0].starts_with("west debug -d "));
}

#[tokio::test]
async fn test_run_rejects_valgrind_on_hardware() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);
    let mut args = run_args(Board::Nrf54l15Dk);
    args.valgrind = true;

    let result = cmd_run(&mut ctx, &args).await;
    assert!(matches!(
        result,
        Err(CliError::Core(GaleError::InvalidOptions(_)))
    ));
}

#[tokio::test]
async fn test_run_bsim_needs_a_build() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);

    let result = cmd_run(&mut ctx, &run_args(Board::Nrf54l15Bsim)).await;
    assert!(matches!(
        result,
        Err(CliError::Core(GaleError::MissingBuildDir { .. }))
    ));
}

#[tokio::test]
async fn test_run_bsim_starts_devices_then_phy() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);
    let cache = fake_bsim_outputs(&temp);
    fake_build(&ctx, Board::Nrf54l15Bsim, Target::HmiApp, BuildType::Standard, &cache);

    let mut args = run_args(Board::Nrf54l15Bsim);
    args.real_time = true;
    args.rebuild = true;
    cmd_run(&mut ctx, &args).await.unwrap();

    let recorded = ctx.runner.recorded();
    assert_eq!(recorded.len(), 4);
    assert!(recorded[0].cmd.starts_with("west build "));
    assert_eq!(recorded[1].mode, CmdMode::Background);
    assert!(recorded[1].cmd.contains("zephyr.exe -s=hmi_app -d=0"));
    assert!(recorded[1].cmd.contains("--mro=5000"));
    assert!(recorded[2].cmd.starts_with("./bs_device_handbrake -s=hmi_app -d=1"));
    assert_eq!(recorded[3].cmd, "./bs_2G4_phy_v1 -s=hmi_app -D=2");
    assert_eq!(recorded[3].mode, CmdMode::Foreground);
}

// =============================================================================
// REPOSITORY COMMAND TESTS
// =============================================================================

#[tokio::test]
async fn test_checkout_runs_in_user_projects() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);

    cmd_checkout(&mut ctx, "feature/ble", None).await.unwrap();

    let recorded = ctx.runner.recorded();
    assert_eq!(recorded.len(), 4);
    assert!(recorded.iter().all(|spec| !spec.fatal));
    assert!(
        recorded
            .iter()
            .all(|spec| spec.cwd.as_deref() != Some(Project::Zephyr.dir(&ctx.layout).as_path()))
    );
}

#[tokio::test]
async fn test_push_with_group_uses_west_forall() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);

    cmd_push(&mut ctx, "Bump versions", Some("gale")).await.unwrap();

    let cmds = recorded_cmds(&ctx);
    assert_eq!(cmds.len(), 2);
    assert!(cmds[0].starts_with("west forall -g gale -c "));
    assert_eq!(cmds[1], gale_core::repos::push_command("Bump versions"));
    assert!(cmds[1].starts_with("test -z \"$(git status --porcelain)\" || "));
}

// =============================================================================
// EMULATE / SCA / SETUP TESTS
// =============================================================================

#[tokio::test]
async fn test_emulate_requires_virtual_env() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);

    let result = cmd_emulate(&mut ctx, Target::HmiApp, false, None).await;
    assert!(matches!(result, Err(CliError::Core(GaleError::NotInVirtualEnv))));
}

#[tokio::test]
async fn test_emulate_sources_qemu_environment() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);

    cmd_emulate(&mut ctx, Target::SensorApp, false, Some(Path::new("/venv")))
        .await
        .unwrap();

    let cmds = recorded_cmds(&ctx);
    assert_eq!(cmds.len(), 1);
    assert!(cmds[0].ends_with("-t run"));
    assert!(
        ctx.runner
            .env_overlay()
            .iter()
            .any(|(k, _)| k == "GALE_IT_QEMU_BOARD")
    );
}

#[tokio::test]
async fn test_sca_builds_then_serves_results() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);
    fake_build(
        &ctx,
        Board::Nrf54l15Dk,
        Target::HmiApp,
        BuildType::Sca,
        "CODECHECKER_EXE:FILEPATH=/venv/bin/CodeChecker\n",
    );

    cmd_sca(&mut ctx, &target_args(Board::Nrf54l15Dk, Target::HmiApp))
        .await
        .unwrap();

    let recorded = ctx.runner.recorded();
    assert_eq!(recorded.len(), 4);
    assert!(recorded[0].cmd.contains("--pristine"));
    assert!(recorded[0].cmd.contains("-DZEPHYR_SCA_VARIANT=codechecker"));
    assert_eq!(recorded[1].cmd, "/venv/bin/CodeChecker server");
    assert_eq!(recorded[1].mode, CmdMode::NewTerminal);
    assert!(recorded[2].cmd.contains(" store "));
    assert!(recorded[3].cmd.ends_with("http://localhost:8001"));
}

#[tokio::test]
async fn test_setup_requires_virtual_env() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);

    let result = cmd_setup(&mut ctx, None).await;
    assert!(matches!(result, Err(CliError::Core(GaleError::NotInVirtualEnv))));
}

#[tokio::test]
async fn test_install_needs_requirements_file() {
    let temp = create_workspace();
    let mut ctx = dry_run_context(&temp);
    let venv = Path::new("/venv");

    let result = cmd_install(&mut ctx, Some(venv)).await;
    assert!(matches!(
        result,
        Err(CliError::Core(GaleError::MissingRequirements(_)))
    ));

    std::fs::write(ctx.layout.requirements_file(), "west>=1.2\n").unwrap();
    cmd_install(&mut ctx, Some(venv)).await.unwrap();
    let cmds = recorded_cmds(&ctx);
    assert!(cmds[0].starts_with("/venv/bin/python -m pip install -r "));
}

// =============================================================================
// INFO / MANIFEST TESTS
// =============================================================================

#[test]
fn test_info_reports_workspace_paths() {
    let temp = create_workspace();
    let layout = WorkspaceLayout::from_topdir(temp.path());

    let report = cmd_info(&layout);
    assert_eq!(report.topdir, temp.path());
    let hmi = report.targets.iter().find(|t| t.name == "hmi_app").unwrap();
    assert_eq!(hmi.path, Project::HmiApp.dir(&layout));
}

#[test]
fn test_manifest_check_accepts_fixture() {
    let temp = create_workspace();
    let manifest = cmd_manifest_check(&manifest_path(&temp)).unwrap();
    assert_eq!(manifest.projects.len(), 5);
}

#[test]
fn test_manifest_check_reports_every_issue() {
    let temp = create_workspace();
    let path = temp.path().join("broken.yml");
    std::fs::write(
        &path,
        "manifest:\n  group-filter: [+gale]\n  projects:\n    - {name: a, url: https://x/a, path: p, groups: [tools]}\n    - {name: b, url: https://x/b, path: p/}\n",
    )
    .unwrap();

    let err = match cmd_manifest_check(&path) {
        Err(err) => err,
        Ok(manifest) => panic!("{} projects accepted", manifest.projects.len()),
    };
    match &err {
        CliError::Core(GaleError::InvalidManifest { path: p, issues }) => {
            assert_eq!(p, &path);
            assert_eq!(issues.len(), 2);
            // The issues are logged while checking; the final error is only a summary.
            let summary = err.to_string();
            assert!(summary.ends_with("has 2 issue(s)"));
            assert!(issues.iter().all(|issue| !summary.contains(&issue.to_string())));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_manifest_check_missing_file() {
    let temp = create_workspace();
    let result = cmd_manifest_check(&temp.path().join("absent.yml"));
    assert!(matches!(result, Err(CliError::Core(GaleError::Io(_)))));
}

#[test]
fn test_manifest_list_applies_group_filter() {
    let temp = create_workspace();
    let path = manifest_path(&temp);

    let active = cmd_manifest_list(&path, false, &[]).unwrap();
    let names: Vec<&str> = active.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["gale-shared", "gale-hmi-app", "gale-sensor-app", "sdk-zephyr"]
    );
    let zephyr = &active[3];
    assert_eq!(zephyr.revision, "v3.7.99-ncs1");
    assert_eq!(zephyr.url.as_deref(), Some("https://github.com/nrfconnect/sdk-zephyr"));

    let all = cmd_manifest_list(&path, true, &[]).unwrap();
    assert_eq!(all.len(), 5);
    assert!(!all[4].active);

    let docs_only = cmd_manifest_list(&path, false, &["+docs".to_string(), "-gale".to_string()]).unwrap();
    let names: Vec<&str> = docs_only.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["sdk-zephyr", "gale-docs"]);
}

#[test]
fn test_manifest_list_rejects_unsigned_filter() {
    let temp = create_workspace();
    let result = cmd_manifest_list(&manifest_path(&temp), false, &["docs".to_string()]);
    assert!(matches!(
        result,
        Err(CliError::Core(GaleError::InvalidOptions(_)))
    ));
}
