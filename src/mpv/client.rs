//! High-level player: engine lifecycle plus the command API.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{PlayerError, StartupError};
use super::ipc::{wait_for_socket, CommandSender, EventListener};
use super::process::EngineProcess;
use super::protocol::{LoadMode, MpvCommand};
use super::socket::SocketPath;
use super::state::{PlaybackState, StateStore, Subscription};
use crate::config::PlayerConfig;

/// Where the player is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  Unstarted,
  Starting,
  Running,
  ShuttingDown,
  Stopped,
}

/// Resources that exist only while the engine is running.
struct Engine {
  process: EngineProcess,
  listener: JoinHandle<()>,
  listener_cancel: CancellationToken,
}

/// Owns one MPV subprocess and mirrors its playback state.
///
/// State is updated only from MPV's event stream; command methods never
/// touch it, so a snapshot always reflects what the engine last reported.
pub struct Player {
  config: PlayerConfig,
  socket: SocketPath,
  sender: CommandSender,
  cancel: CancellationToken,
  lifecycle: Mutex<LifecycleState>,
  store: Arc<StateStore>,
  engine: tokio::sync::Mutex<Option<Engine>>,
}

impl Player {
  /// Create an unstarted player. Cancelling `cancel` aborts startup, stops
  /// the event listener and fails in-flight commands.
  pub fn new(config: PlayerConfig, cancel: CancellationToken) -> Self {
    let socket = config
      .socket_path
      .clone()
      .map(SocketPath::fixed)
      .unwrap_or_else(SocketPath::unique);
    let sender = CommandSender::new(&socket, config.command_timeout);
    let store = Arc::new(StateStore::new(config.subscriber_capacity));

    Self {
      config,
      socket,
      sender,
      cancel,
      lifecycle: Mutex::new(LifecycleState::Unstarted),
      store,
      engine: tokio::sync::Mutex::new(None),
    }
  }

  /// Create and start a player. No instance is returned if startup fails.
  pub async fn spawn(config: PlayerConfig, cancel: CancellationToken) -> Result<Self, PlayerError> {
    let player = Self::new(config, cancel);
    player.start().await?;
    Ok(player)
  }

  /// Start MPV, wait for its socket, register observers and start listening.
  ///
  /// Allowed from `Unstarted` or `Stopped`. Any failure kills the engine and
  /// leaves the player `Stopped`.
  pub async fn start(&self) -> Result<(), PlayerError> {
    {
      let mut lifecycle = self.lifecycle.lock();
      match *lifecycle {
        LifecycleState::Unstarted | LifecycleState::Stopped => *lifecycle = LifecycleState::Starting,
        other => return Err(StartupError::InvalidState(other).into()),
      }
    }
    log::info!("Starting player (socket: {})", self.socket);

    match self.launch().await {
      Ok(engine) => {
        *self.engine.lock().await = Some(engine);
        self.set_lifecycle(LifecycleState::Running);
        log::info!("Player running");
        Ok(())
      }
      Err(e) => {
        log::error!("Player startup failed: {}", e);
        if let Err(e) = self.socket.cleanup() {
          log::warn!("Failed to remove socket after failed startup: {}", e);
        }
        self.set_lifecycle(LifecycleState::Stopped);
        Err(e.into())
      }
    }
  }

  async fn launch(&self) -> Result<Engine, StartupError> {
    self.socket.cleanup().map_err(StartupError::SocketCleanup)?;
    self.store.broadcaster().reopen();

    let mut process = EngineProcess::spawn(
      self.config.mpv_path.as_ref(),
      &self.socket,
      self.config.initial_volume,
      &self.config.extra_args,
    )?;

    let connected = match wait_for_socket(
      self.socket.as_path(),
      self.config.startup_timeout,
      &self.cancel,
      &mut process,
    )
    .await
    {
      Ok(()) => EventListener::connect(&self.socket, self.config.command_timeout).await,
      Err(e) => Err(e),
    };

    let (reader, writer) = match connected {
      Ok(halves) => halves,
      Err(e) => {
        process.kill();
        if let Err(wait_err) = process.wait().await {
          log::warn!("Failed to reap MPV after startup failure: {}", wait_err);
        }
        return Err(e);
      }
    };

    let listener_cancel = self.cancel.child_token();
    let listener = EventListener::spawn(reader, writer, self.store.clone(), listener_cancel.clone());

    Ok(Engine {
      process,
      listener,
      listener_cancel,
    })
  }

  /// Ask MPV to quit, force-kill it if that does not work in time, then
  /// release every resource. A no-op unless the player is running.
  pub async fn shutdown(&self) {
    {
      let mut lifecycle = self.lifecycle.lock();
      if *lifecycle != LifecycleState::Running {
        log::debug!("shutdown() ignored in state {:?}", *lifecycle);
        return;
      }
      *lifecycle = LifecycleState::ShuttingDown;
    }
    log::info!("Shutting down player");

    let engine = self.engine.lock().await.take();
    if let Some(Engine {
      mut process,
      listener,
      listener_cancel,
    }) = engine
    {
      log::info!("Stopping MPV (pid: {:?})", process.pid());
      let deadline = Instant::now() + self.config.shutdown_timeout;

      // Sent with a fresh token so a cancelled player can still quit cleanly.
      let quit = tokio::time::timeout_at(
        deadline,
        self.sender.send(&MpvCommand::quit(), &CancellationToken::new()),
      )
      .await;

      let exited = match quit {
        Ok(Ok(())) => match tokio::time::timeout_at(deadline, process.wait()).await {
          Ok(Ok(_)) => true,
          Ok(Err(e)) => {
            log::warn!("Waiting for MPV failed: {}", e);
            false
          }
          Err(_) => {
            log::warn!("MPV did not exit within {:?}", self.config.shutdown_timeout);
            false
          }
        },
        Ok(Err(e)) => {
          log::warn!("Graceful quit failed: {}", e);
          false
        }
        Err(_) => {
          log::warn!("Graceful quit timed out");
          false
        }
      };

      if !exited {
        process.kill();
      }

      listener_cancel.cancel();
      if let Err(e) = listener.await {
        log::error!("MPV event listener panicked: {}", e);
      }

      if !exited {
        if let Err(e) = process.wait().await {
          log::error!("Failed to reap MPV: {}", e);
        }
      }
    }

    log::debug!(
      "Closing {} subscriber channel(s)",
      self.store.broadcaster().subscriber_count()
    );
    self.store.broadcaster().close();
    if let Err(e) = self.socket.cleanup() {
      log::error!("Failed to remove socket {}: {}", self.socket, e);
    }
    self.set_lifecycle(LifecycleState::Stopped);
    log::info!("Player stopped");
  }

  /// Load a file or URL. Remote page URLs must already be resolved to a stream.
  pub async fn load_file(&self, path: &str, mode: LoadMode) -> Result<(), PlayerError> {
    if path.trim().is_empty() {
      return Err(PlayerError::InvalidArgument("path cannot be empty".to_string()));
    }
    log::info!("Loading file: {} ({})", path, mode.as_str());
    self.send(MpvCommand::loadfile(path, mode)).await
  }

  pub async fn toggle_pause(&self) -> Result<(), PlayerError> {
    self.send(MpvCommand::cycle("pause")).await
  }

  pub async fn stop(&self) -> Result<(), PlayerError> {
    self.send(MpvCommand::stop()).await
  }

  /// Set volume (0-100). Out-of-range values are rejected before any I/O.
  pub async fn set_volume(&self, volume: i32) -> Result<(), PlayerError> {
    let volume = u8::try_from(volume)
      .ok()
      .filter(|v| *v <= 100)
      .ok_or_else(|| {
        PlayerError::InvalidArgument(format!("volume must be between 0 and 100, got {}", volume))
      })?;
    self.send(MpvCommand::set_volume(volume)).await
  }

  /// Seek relative to the current position. Negative seeks backwards.
  pub async fn seek(&self, seconds: f64) -> Result<(), PlayerError> {
    if !seconds.is_finite() {
      return Err(PlayerError::InvalidArgument(format!(
        "seek offset must be finite, got {}",
        seconds
      )));
    }
    self.send(MpvCommand::seek(seconds)).await
  }

  async fn send(&self, cmd: MpvCommand) -> Result<(), PlayerError> {
    if self.lifecycle() != LifecycleState::Running {
      return Err(PlayerError::NotRunning);
    }
    self.sender.send(&cmd, &self.cancel).await.map_err(|e| {
      log::warn!("MPV command {:?} failed: {}", cmd.command.first(), e);
      e.into()
    })
  }

  /// Current playback state.
  pub fn get_state(&self) -> PlaybackState {
    self.store.snapshot()
  }

  /// Receive a snapshot after every state change. The stream ends on shutdown.
  pub fn subscribe(&self) -> Subscription {
    self.store.subscribe()
  }

  pub fn lifecycle(&self) -> LifecycleState {
    *self.lifecycle.lock()
  }

  fn set_lifecycle(&self, state: LifecycleState) {
    *self.lifecycle.lock() = state;
  }

  pub fn socket_path(&self) -> &Path {
    self.socket.as_path()
  }
}

impl Drop for Player {
  fn drop(&mut self) {
    // The process itself is killed on drop; stop the listener and the socket file.
    if let Some(engine) = self.engine.get_mut().take() {
      log::warn!("Player dropped while running, killing MPV");
      engine.listener_cancel.cancel();
      drop(engine);
      if let Err(e) = self.socket.cleanup() {
        log::warn!("Failed to remove socket {} on drop: {}", self.socket, e);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  fn unstarted() -> Player {
    let dir = std::env::temp_dir().join("tunecli-never-started.sock");
    let config = PlayerConfig {
      mpv_path: Some(PathBuf::from("/nonexistent/mpv")),
      socket_path: Some(dir),
      ..PlayerConfig::default()
    };
    Player::new(config, CancellationToken::new())
  }

  #[tokio::test]
  async fn test_volume_validated_before_io() {
    let player = unstarted();
    for volume in [-1, 101, 255, 256, i32::MIN, i32::MAX] {
      assert!(
        matches!(player.set_volume(volume).await, Err(PlayerError::InvalidArgument(_))),
        "volume {} should be rejected",
        volume
      );
    }
    for volume in [0, 50, 100] {
      assert!(matches!(player.set_volume(volume).await, Err(PlayerError::NotRunning)));
    }
  }

  #[tokio::test]
  async fn test_blank_path_rejected_for_every_mode() {
    let player = unstarted();
    for mode in [LoadMode::Replace, LoadMode::Append, LoadMode::AppendPlay] {
      for path in ["", " ", "\t\n", "   \r\n "] {
        assert!(matches!(
          player.load_file(path, mode).await,
          Err(PlayerError::InvalidArgument(_))
        ));
      }
    }
    assert!(matches!(
      player.load_file("song.mp3", LoadMode::Replace).await,
      Err(PlayerError::NotRunning)
    ));
  }

  #[tokio::test]
  async fn test_seek_rejects_non_finite() {
    let player = unstarted();
    assert!(matches!(player.seek(f64::NAN).await, Err(PlayerError::InvalidArgument(_))));
    assert!(matches!(player.seek(f64::INFINITY).await, Err(PlayerError::InvalidArgument(_))));
    assert!(matches!(player.seek(-5.0).await, Err(PlayerError::NotRunning)));
  }

  #[tokio::test]
  async fn test_unstarted_defaults() {
    let player = unstarted();
    assert_eq!(player.lifecycle(), LifecycleState::Unstarted);
    assert_eq!(player.get_state(), PlaybackState::default());

    player.shutdown().await;
    assert_eq!(player.lifecycle(), LifecycleState::Unstarted);
    assert!(matches!(player.toggle_pause().await, Err(PlayerError::NotRunning)));
    assert!(matches!(player.stop().await, Err(PlayerError::NotRunning)));
  }

  #[tokio::test]
  async fn test_spawn_failure_leaves_player_stopped() {
    let player = unstarted();
    let result = player.start().await;
    assert!(matches!(
      result,
      Err(PlayerError::Startup(StartupError::Spawn(_)))
    ));
    assert_eq!(player.lifecycle(), LifecycleState::Stopped);
    assert!(!player.socket_path().exists());
  }

  #[test]
  fn test_unique_socket_by_default() {
    let a = Player::new(PlayerConfig::default(), CancellationToken::new());
    let b = Player::new(PlayerConfig::default(), CancellationToken::new());
    assert_ne!(a.socket_path(), b.socket_path());
  }
}
