//! # Process Runner
//!
//! Executes the [`CommandSpec`] plans produced by gale-core.
//!
//! Every command runs through `sh -c`. Depending on its [`CmdMode`] the
//! runner waits for it, tracks it in the background, captures its output,
//! replaces the gale process with it, or opens it in a new terminal.
//!
//! ## Interrupts
//!
//! Ctrl+C reaches every process of the terminal's process group, so children
//! usually stop on their own. The runner gives each tracked process (newest
//! first) a short grace period, kills what is left, and reports
//! [`GaleError::Interrupted`].

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use gale_core::bsim::CopyStep;
use gale_core::env_file::{self, EnvFile};
use gale_core::{CmdMode, CommandSpec, GaleError, Result};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Time a process gets to exit after an interrupt before it is killed.
pub const TERMINATE_GRACE: Duration = Duration::from_millis(100);

/// Delay between two connection attempts in [`Runner::wait_for_port`].
const PORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const SIGINT: i32 = 2;
const SIGTERM: i32 = 15;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Log and record commands without running them.
    pub dry_run: bool,
    /// Terminal emulator for [`CmdMode::NewTerminal`]; run as `<terminal> -e sh -c <cmd>`.
    pub terminal: String,
    /// Working directory of commands that do not name one.
    pub default_cwd: PathBuf,
    /// Where background processes write their output.
    pub log_dir: PathBuf,
}

struct BackgroundProcess {
    spec: CommandSpec,
    child: Child,
    log: PathBuf,
}

/// Runs commands and keeps track of background processes.
pub struct Runner {
    config: RunnerConfig,
    env_overlay: Vec<(String, String)>,
    background: Vec<BackgroundProcess>,
    recorded: Vec<CommandSpec>,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            env_overlay: Vec::new(),
            background: Vec::new(),
            recorded: Vec::new(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Commands seen so far in dry-run mode.
    pub fn recorded(&self) -> &[CommandSpec] {
        &self.recorded
    }

    /// Variables added to every child environment.
    pub fn env_overlay(&self) -> &[(String, String)] {
        &self.env_overlay
    }

    /// Number of background processes still tracked.
    pub fn background_count(&self) -> usize {
        self.background.len()
    }

    // =========================================================================
    // ENVIRONMENT
    // =========================================================================

    /// Source a dotenv file for all following commands.
    ///
    /// Variables already exported, or sourced earlier, keep their value.
    pub fn source_env(&mut self, path: &Path) -> Result<()> {
        let file = EnvFile::load(path)?;
        info!(path = %path.display(), "Sourcing environment");

        for (key, value) in file.vars() {
            let sourced = self.env_overlay.iter().any(|(k, _)| k == key);
            if sourced || std::env::var_os(key).is_some() {
                debug!(%key, "already set, keeping existing value");
                continue;
            }
            if env_file::is_interesting(key) {
                info!("  {}={}", key, value);
            }
            self.env_overlay.push((key.clone(), value.clone()));
        }
        Ok(())
    }

    // =========================================================================
    // EXECUTION
    // =========================================================================

    /// Run a command according to its mode. Returns captured stdout for
    /// [`CmdMode::Capture`] and an empty string otherwise.
    pub async fn run(&mut self, spec: &CommandSpec) -> Result<String> {
        let cwd = spec
            .cwd
            .clone()
            .unwrap_or_else(|| self.config.default_cwd.clone());

        info!("{}", spec.desc);
        info!(cmd = %spec.cmd, cwd = %cwd.display(), mode = %spec.mode, "running");

        if self.config.dry_run {
            self.recorded.push(spec.clone());
            return Ok(String::new());
        }
        if !cwd.is_dir() {
            return Err(GaleError::InvalidWorkingDir(cwd));
        }

        match spec.mode {
            CmdMode::Foreground => self.run_foreground(spec, &cwd).await.map(|()| String::new()),
            CmdMode::Background => self.spawn_background(spec, &cwd).map(|()| String::new()),
            CmdMode::Capture => self.run_capture(spec, &cwd).await,
            CmdMode::Replace => self.replace(spec, &cwd),
            CmdMode::NewTerminal => self.open_terminal(spec, &cwd).map(|()| String::new()),
        }
    }

    /// Run every command in order, stopping at the first error.
    pub async fn run_all(&mut self, specs: &[CommandSpec]) -> Result<()> {
        for spec in specs {
            self.run(spec).await?;
        }
        Ok(())
    }

    fn shell(&self, spec: &CommandSpec, cwd: &Path) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&spec.cmd).current_dir(cwd);
        cmd.envs(self.env_overlay.iter().map(|(k, v)| (k, v)));
        cmd
    }

    async fn run_foreground(&mut self, spec: &CommandSpec, cwd: &Path) -> Result<()> {
        let mut child = self.shell(spec, cwd).spawn()?;

        tokio::select! {
            status = child.wait() => check_status(spec, status?, None),
            _ = tokio::signal::ctrl_c() => {
                terminate(&mut child, &spec.desc).await;
                self.terminate_all().await;
                Err(GaleError::Interrupted)
            }
        }
    }

    async fn run_capture(&mut self, spec: &CommandSpec, cwd: &Path) -> Result<String> {
        let child = self
            .shell(spec, cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        tokio::select! {
            output = child.wait_with_output() => {
                let output = output?;
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                check_status(spec, output.status, Some(stderr))?;
                Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            _ = tokio::signal::ctrl_c() => {
                self.terminate_all().await;
                Err(GaleError::Interrupted)
            }
        }
    }

    fn spawn_background(&mut self, spec: &CommandSpec, cwd: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.config.log_dir)?;
        let log = self.config.log_dir.join(format!(
            "{}-{}.log",
            self.background.len(),
            log_stem(&spec.desc)
        ));
        let file = std::fs::File::create(&log)?;
        let stderr = file.try_clone()?;

        let child = self
            .shell(spec, cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(file))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()?;

        info!(pid = ?child.id(), "Started in background; follow with: tail -f {}", log.display());
        self.background.push(BackgroundProcess {
            spec: spec.clone(),
            child,
            log,
        });
        Ok(())
    }

    #[cfg(unix)]
    fn replace(&mut self, spec: &CommandSpec, cwd: &Path) -> Result<String> {
        use std::os::unix::process::CommandExt;

        let mut cmd = std::process::Command::new("sh");
        cmd.arg("-c").arg(&spec.cmd).current_dir(cwd);
        cmd.envs(self.env_overlay.iter().map(|(k, v)| (k, v)));
        // Only returns on failure.
        Err(cmd.exec().into())
    }

    #[cfg(not(unix))]
    fn replace(&mut self, _spec: &CommandSpec, _cwd: &Path) -> Result<String> {
        Err(GaleError::UnsupportedPlatform(std::env::consts::OS.to_string()))
    }

    fn open_terminal(&mut self, spec: &CommandSpec, cwd: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.config.terminal);
        cmd.arg("-e")
            .arg("sh")
            .arg("-c")
            .arg(&spec.cmd)
            .current_dir(cwd)
            .envs(self.env_overlay.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let child = cmd.spawn()?;
        debug!(pid = ?child.id(), terminal = %self.config.terminal, "opened new terminal");
        Ok(())
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Wait for all background processes, oldest first.
    pub async fn finish(&mut self) -> Result<()> {
        let mut pending = std::mem::take(&mut self.background);
        pending.reverse();

        while let Some(mut process) = pending.pop() {
            let status = tokio::select! {
                status = process.child.wait() => status?,
                _ = tokio::signal::ctrl_c() => {
                    terminate(&mut process.child, &process.spec.desc).await;
                    pending.reverse();
                    self.background = pending;
                    self.terminate_all().await;
                    return Err(GaleError::Interrupted);
                }
            };
            debug!(log = %process.log.display(), "background process exited");
            check_status(&process.spec, status, None)?;
        }
        Ok(())
    }

    /// Stop every tracked process, newest first. Returns the descriptions
    /// of the stopped processes in the order they were stopped.
    pub async fn terminate_all(&mut self) -> Vec<String> {
        let mut stopped = Vec::with_capacity(self.background.len());
        while let Some(mut process) = self.background.pop() {
            terminate(&mut process.child, &process.spec.desc).await;
            stopped.push(process.spec.desc);
        }
        stopped
    }

    /// Wait until something listens on a localhost port.
    pub async fn wait_for_port(&self, service: &'static str, port: u16, timeout: Duration) -> Result<()> {
        if self.config.dry_run {
            return Ok(());
        }
        info!("Waiting for {} on port {}", service, port);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if is_localhost_port_open(port).await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(GaleError::ServiceNotStarted { service, port });
            }
            tokio::time::sleep(PORT_POLL_INTERVAL).await;
        }
    }

    // =========================================================================
    // FILE SYSTEM
    // =========================================================================

    pub fn create_dir(&self, dir: &Path) -> Result<()> {
        debug!(dir = %dir.display(), "creating directory");
        if !self.config.dry_run {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn copy(&self, step: &CopyStep) -> Result<()> {
        let (from, to) = match step {
            CopyStep::Dir { from, to } | CopyStep::File { from, to } => (from, to),
        };
        debug!(from = %from.display(), to = %to.display(), "copying");
        if self.config.dry_run {
            return Ok(());
        }
        match step {
            CopyStep::Dir { .. } => copy_dir_all(from, to),
            CopyStep::File { .. } => {
                if let Some(parent) = to.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(from, to)?;
                Ok(())
            }
        }
    }
}

/// Give a process [`TERMINATE_GRACE`] to exit, then kill it.
async fn terminate(child: &mut Child, desc: &str) {
    if tokio::time::timeout(TERMINATE_GRACE, child.wait()).await.is_ok() {
        debug!(%desc, "process exited");
        return;
    }
    warn!(%desc, "process did not exit, killing it");
    if let Err(e) = child.start_kill() {
        debug!(%desc, error = %e, "kill failed");
    }
    let _ = child.wait().await;
}

fn check_status(spec: &CommandSpec, status: ExitStatus, stderr: Option<String>) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    if was_terminated(&status) {
        info!("{}: terminated", spec.desc);
        return Ok(());
    }

    let code = status.code();
    let output = match stderr.filter(|s| !s.is_empty()) {
        Some(stderr) => stderr,
        None => code
            .map(|c| format!("code {}", c))
            .unwrap_or_else(|| "killed by a signal".to_string()),
    };
    if spec.fatal {
        return Err(GaleError::CommandFailed {
            cmd: spec.cmd.clone(),
            code,
            output,
        });
    }
    warn!(cmd = %spec.cmd, "{} failed: {}", spec.desc, output);
    Ok(())
}

/// Killed by SIGINT or SIGTERM, directly or as reported by the shell (128 + n).
fn was_terminated(status: &ExitStatus) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if matches!(status.signal(), Some(SIGINT | SIGTERM)) {
            return true;
        }
    }
    matches!(status.code(), Some(c) if c == 128 + SIGINT || c == 128 + SIGTERM)
}

fn log_stem(desc: &str) -> String {
    let stem: String = desc
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    stem.split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Copy a directory tree, merging into `to` and overwriting files.
pub fn copy_dir_all(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

pub async fn is_localhost_port_open(port: u16) -> bool {
    tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok()
}
