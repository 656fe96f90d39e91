//! Unix socket plumbing for MPV's JSON IPC.
//!
//! Commands go out over one short-lived connection each. Events come in over
//! a single long-lived connection owned by the listener task.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::error::StartupError;
use super::process::EngineProcess;
use super::protocol::{MpvCommand, MpvMessage, OBSERVED_PROPERTIES};
use super::socket::SocketPath;
use super::state::StateStore;

/// Interval between connect attempts while waiting for the socket.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum CommandError {
  #[error("Command timed out after {0:?}")]
  Timeout(Duration),
  #[error("Could not connect to MPV socket: {0}")]
  Connect(#[source] io::Error),
  #[error("Could not write command: {0}")]
  Write(#[source] io::Error),
  #[error("Could not encode command: {0}")]
  Encode(#[from] serde_json::Error),
  #[error("Command cancelled")]
  Cancelled,
}

/// Writes one command per connection, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct CommandSender {
  path: PathBuf,
  timeout: Duration,
}

impl CommandSender {
  pub fn new(socket: &SocketPath, timeout: Duration) -> Self {
    Self {
      path: socket.as_path().to_path_buf(),
      timeout,
    }
  }

  /// Connect, write `cmd` as one JSON line, close.
  ///
  /// Fails fast once `cancel` fires.
  pub async fn send(&self, cmd: &MpvCommand, cancel: &CancellationToken) -> Result<(), CommandError> {
    let line = cmd.to_line()?;
    log::debug!("Sending MPV command: {}", String::from_utf8_lossy(&line).trim_end());

    let exchange = async {
      let mut stream = UnixStream::connect(&self.path)
        .await
        .map_err(CommandError::Connect)?;
      stream.write_all(&line).await.map_err(CommandError::Write)?;
      stream.shutdown().await.map_err(CommandError::Write)?;
      Ok::<(), CommandError>(())
    };

    tokio::select! {
      biased;
      _ = cancel.cancelled() => Err(CommandError::Cancelled),
      result = tokio::time::timeout(self.timeout, exchange) => match result {
        Ok(result) => result,
        Err(_) => {
          log::warn!("MPV command timed out after {:?}", self.timeout);
          Err(CommandError::Timeout(self.timeout))
        }
      },
    }
  }
}

/// Poll until the engine's socket accepts a connection.
///
/// Gives up when `timeout` elapses, the engine exits, or `cancel` fires.
pub async fn wait_for_socket(
  path: &Path,
  timeout: Duration,
  cancel: &CancellationToken,
  process: &mut EngineProcess,
) -> Result<(), StartupError> {
  let deadline = tokio::time::sleep(timeout);
  tokio::pin!(deadline);

  let mut ticker = tokio::time::interval(READY_POLL_INTERVAL);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(StartupError::Cancelled),
      _ = &mut deadline => return Err(StartupError::ReadinessTimeout(timeout)),
      _ = ticker.tick() => {
        if let Some(status) = process.try_exited() {
          return Err(StartupError::EngineExited(status));
        }
        match UnixStream::connect(path).await {
          Ok(_) => {
            log::info!("MPV socket ready at {}", path.display());
            return Ok(());
          }
          Err(e) => log::trace!("MPV socket not ready yet: {}", e),
        }
      }
    }
  }
}

/// Send one `observe_property` per tracked property on the event connection.
///
/// MPV delivers property changes only to the connection that registered them.
pub async fn register_observers<W>(writer: &mut W, timeout: Duration) -> Result<(), StartupError>
where
  W: AsyncWrite + Unpin,
{
  for (id, property) in OBSERVED_PROPERTIES {
    let line = MpvCommand::observe_property(id, property)
      .to_line()
      .map_err(|e| StartupError::ObserveProperty {
        property,
        source: e.into(),
      })?;

    let write = async {
      writer.write_all(&line).await?;
      writer.flush().await?;
      Ok::<(), io::Error>(())
    };
    match tokio::time::timeout(timeout, write).await {
      Ok(Ok(())) => log::debug!("Observing {} (id {})", property, id),
      Ok(Err(source)) => return Err(StartupError::ObserveProperty { property, source }),
      Err(_) => {
        return Err(StartupError::ObserveProperty {
          property,
          source: io::Error::new(io::ErrorKind::TimedOut, "write timed out"),
        })
      }
    }
  }
  Ok(())
}

/// Decode one line from the event stream and fold it into `store`.
///
/// Returns whether the state changed. Replies and malformed lines are skipped.
pub fn handle_line(line: &str, store: &StateStore) -> bool {
  if line.is_empty() {
    return false;
  }

  match MpvMessage::parse(line) {
    Ok(MpvMessage::Event(event)) => {
      log::trace!("MPV event: {:?}", event);
      store.apply_event(&event)
    }
    Ok(MpvMessage::Response(response)) => {
      if !response.is_success() {
        log::warn!(
          "MPV rejected command on event connection (request {:?}): {}",
          response.request_id,
          response.error
        );
      }
      false
    }
    Err(e) => {
      log::debug!("Skipping malformed MPV line: {} - {}", e, line);
      false
    }
  }
}

/// The background task that keeps [`StateStore`] in sync with the engine.
pub struct EventListener;

impl EventListener {
  /// Open the dedicated event connection and register observers on it.
  pub async fn connect(
    socket: &SocketPath,
    timeout: Duration,
  ) -> Result<(tokio::net::unix::OwnedReadHalf, tokio::net::unix::OwnedWriteHalf), StartupError> {
    let stream = tokio::time::timeout(timeout, UnixStream::connect(socket.as_path()))
      .await
      .map_err(|_| {
        StartupError::EventConnection(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))
      })?
      .map_err(StartupError::EventConnection)?;

    let (reader, mut writer) = stream.into_split();
    register_observers(&mut writer, timeout).await?;
    Ok((reader, writer))
  }

  /// Spawn the read loop. `writer` is held open for the loop's lifetime,
  /// since MPV drops a client whose write side is closed.
  pub fn spawn<R, W>(
    reader: R,
    writer: W,
    store: Arc<StateStore>,
    cancel: CancellationToken,
  ) -> JoinHandle<()>
  where
    R: AsyncRead + Send + Unpin + 'static,
    W: Send + 'static,
  {
    tokio::spawn(async move {
      let _writer = writer;
      Self::run(reader, &store, &cancel).await;
    })
  }

  /// Read newline-delimited JSON until EOF, a read error, or cancellation.
  pub async fn run<R: AsyncRead + Unpin>(reader: R, store: &StateStore, cancel: &CancellationToken) {
    log::info!("MPV event listener started");
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
      buf.clear();
      let read = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
          log::info!("MPV event listener cancelled");
          break;
        }
        read = reader.read_until(b'\n', &mut buf) => read,
      };

      match read {
        Ok(0) => {
          log::info!("MPV event stream closed");
          break;
        }
        Ok(_) => match std::str::from_utf8(&buf) {
          Ok(line) => {
            handle_line(line.trim(), store);
          }
          Err(e) => log::debug!("Skipping non-UTF-8 MPV line: {}", e),
        },
        Err(e) => {
          log::error!("MPV event read error: {}", e);
          break;
        }
      }
    }
  }
}
