//! MPV process detection and supervision.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::process::{Child, Command};

use super::socket::SocketPath;

#[derive(Error, Debug)]
pub enum ProcessError {
  #[error("MPV executable not found")]
  NotFound,
  #[error("Failed to spawn MPV: {0}")]
  SpawnFailed(#[from] io::Error),
}

/// Find MPV executable in common locations.
pub fn find_mpv() -> Option<PathBuf> {
  if let Ok(path) = which::which("mpv") {
    return Some(path);
  }

  #[cfg(target_os = "macos")]
  let common_paths = [
    "/usr/local/bin/mpv",
    "/opt/homebrew/bin/mpv",
    "/Applications/mpv.app/Contents/MacOS/mpv",
  ];
  #[cfg(not(target_os = "macos"))]
  let common_paths = ["/usr/bin/mpv", "/usr/local/bin/mpv"];

  common_paths
    .into_iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}

/// Command-line flags for headless operation bound to `socket`.
pub fn engine_args(socket: &SocketPath, initial_volume: u8, extra_args: &[String]) -> Vec<String> {
  let mut args = vec![
    "--idle=yes".to_string(),
    "--no-video".to_string(),
    "--no-terminal".to_string(),
    format!("--input-ipc-server={}", socket),
    format!("--volume={}", initial_volume.min(100)),
  ];
  args.extend(extra_args.iter().cloned());
  args
}

/// Handle to a running engine subprocess.
///
/// The child is killed when the handle is dropped, so an aborted startup
/// never leaves an orphan behind.
pub struct EngineProcess {
  child: Child,
  pid: Option<u32>,
}

impl EngineProcess {
  /// Spawn MPV with its IPC server bound to `socket`.
  pub fn spawn(
    mpv_path: Option<&PathBuf>,
    socket: &SocketPath,
    initial_volume: u8,
    extra_args: &[String],
  ) -> Result<Self, ProcessError> {
    let mpv_exe = mpv_path
      .cloned()
      .or_else(find_mpv)
      .ok_or(ProcessError::NotFound)?;

    let args = engine_args(socket, initial_volume, extra_args);
    log::info!("Spawning MPV: {:?} with IPC: {}", mpv_exe, socket);
    log::debug!("MPV args: {:?}", args);

    let child = Command::new(&mpv_exe)
      .args(&args)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .kill_on_drop(true)
      .spawn()?;

    let pid = child.id();
    log::info!("MPV started (pid: {:?})", pid);
    Ok(Self { child, pid })
  }

  pub fn pid(&self) -> Option<u32> {
    self.pid
  }

  /// Send SIGKILL. Safe to call repeatedly or after the process has exited.
  pub fn kill(&mut self) {
    match self.child.start_kill() {
      Ok(()) => log::info!("Sent kill to MPV (pid: {:?})", self.pid),
      // Already reaped or already exited.
      Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
      Err(e) => log::warn!("kill() failed for MPV (pid: {:?}): {}", self.pid, e),
    }
  }

  /// Exit status if the process has already terminated.
  pub fn try_exited(&mut self) -> Option<ExitStatus> {
    match self.child.try_wait() {
      Ok(status) => status,
      Err(e) => {
        log::warn!("try_wait() failed for MPV: {}", e);
        None
      }
    }
  }

  /// Wait for the process to exit and reap it.
  pub async fn wait(&mut self) -> io::Result<ExitStatus> {
    let status = self.child.wait().await?;
    log::info!("MPV process exited with: {}", status);
    Ok(status)
  }
}
