//! Player error types.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use super::ipc::CommandError;
use super::process::ProcessError;

/// Reasons the engine could not be brought to a running state.
#[derive(Debug, Error)]
pub enum StartupError {
  #[error("Failed to clean up stale socket: {0}")]
  SocketCleanup(#[source] io::Error),

  #[error(transparent)]
  Spawn(#[from] ProcessError),

  #[error("MPV socket not ready after {0:?}")]
  ReadinessTimeout(Duration),

  #[error("MPV exited during startup: {0}")]
  EngineExited(ExitStatus),

  #[error("Could not open MPV event connection: {0}")]
  EventConnection(#[source] io::Error),

  #[error("Failed to observe property {property}: {source}")]
  ObserveProperty {
    property: &'static str,
    #[source]
    source: io::Error,
  },

  #[error("Startup cancelled")]
  Cancelled,

  #[error("Player cannot start from state {0:?}")]
  InvalidState(super::LifecycleState),
}

/// Errors returned by [`super::Player`] operations.
#[derive(Debug, Error)]
pub enum PlayerError {
  #[error("Startup failed: {0}")]
  Startup(#[from] StartupError),

  #[error("Command failed: {0}")]
  Command(#[from] CommandError),

  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  #[error("Player is not running")]
  NotRunning,
}
