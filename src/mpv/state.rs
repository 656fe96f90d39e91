//! Playback state snapshot and its fan-out to subscribers.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};

use super::protocol::{EngineEvent, PropertyChange};

/// Snapshot of what the engine is doing.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
  pub is_playing: bool,
  /// Empty when nothing is loaded.
  pub title: String,
  /// 0-100.
  pub volume: u8,
  /// Seconds into the current media.
  pub position: f64,
  /// Seconds, 0 when unknown (live streams).
  pub duration: f64,
  /// Last recoverable error, empty when none.
  pub last_error: String,
}

impl Default for PlaybackState {
  fn default() -> Self {
    Self {
      is_playing: false,
      title: String::new(),
      volume: 100,
      position: 0.0,
      duration: 0.0,
      last_error: String::new(),
    }
  }
}

impl PlaybackState {
  /// Nothing loaded, regardless of `is_playing`.
  pub fn is_stopped(&self) -> bool {
    self.title.is_empty()
  }

  /// Fold one engine event into the state.
  pub fn apply_event(&mut self, event: &EngineEvent) {
    match event {
      EngineEvent::PropertyChange(change) => self.apply_property(change),
      EngineEvent::Idle => self.is_playing = false,
      EngineEvent::EndFile { reason, file_error } => {
        self.is_playing = false;
        if reason.as_deref() == Some("error") {
          self.last_error = file_error
            .clone()
            .unwrap_or_else(|| "playback error".to_string());
        }
      }
      EngineEvent::PlaybackRestart => {
        self.is_playing = true;
        self.last_error.clear();
      }
      EngineEvent::Other(_) => {}
    }
  }

  fn apply_property(&mut self, change: &PropertyChange) {
    match change {
      PropertyChange::Pause(paused) => self.is_playing = !paused,
      PropertyChange::MediaTitle(title) => self.title = display_title(title),
      PropertyChange::Volume(volume) => self.volume = volume.round().clamp(0.0, 100.0) as u8,
      PropertyChange::TimePos(pos) => self.position = pos.unwrap_or(0.0).max(0.0),
      PropertyChange::Duration(duration) => self.duration = duration.unwrap_or(0.0).max(0.0),
      PropertyChange::Mismatched { name } => {
        log::debug!("Ignoring {} change with unexpected data type", name);
      }
      PropertyChange::Unknown { .. } => {}
    }
  }
}

/// Trimmed title; a filesystem path is reduced to its file name. Metadata
/// titles and URLs are kept as they are, even when they contain `/`.
fn display_title(raw: &str) -> String {
  let title = raw.trim();
  if !looks_like_path(title) {
    return title.to_string();
  }
  Path::new(title)
    .file_name()
    .map(|name| name.to_string_lossy().trim().to_string())
    .filter(|name| !name.is_empty())
    .unwrap_or_else(|| title.to_string())
}

fn looks_like_path(title: &str) -> bool {
  !title.contains("://")
    && (title.starts_with("~/")
      || title.starts_with("./")
      || title.starts_with("../")
      || Path::new(title).is_absolute())
}

/// Receiving end of a state subscription.
///
/// Notifications can be dropped when the buffer is full, so treat them as a
/// hint and read [`StateStore::snapshot`] for the authoritative value.
/// Each call to `subscribe` yields an independent stream.
#[derive(Debug)]
pub struct Subscription {
  rx: Receiver<PlaybackState>,
}

impl Subscription {
  /// Next snapshot, or `None` once the player has shut down.
  pub async fn recv(&self) -> Option<PlaybackState> {
    self.rx.recv().await.ok()
  }

  /// Blocking variant for non-async consumers.
  pub fn recv_blocking(&self) -> Option<PlaybackState> {
    self.rx.recv_blocking().ok()
  }

  pub fn try_recv(&self) -> Option<PlaybackState> {
    self.rx.try_recv().ok()
  }

  /// Skip to the most recent buffered snapshot, if any.
  pub fn latest(&self) -> Option<PlaybackState> {
    let mut latest = None;
    while let Ok(state) = self.rx.try_recv() {
      latest = Some(state);
    }
    latest
  }

  pub fn is_closed(&self) -> bool {
    self.rx.is_closed()
  }
}

/// Non-blocking fan-out of snapshots to bounded subscriber channels.
pub struct Broadcaster {
  subscribers: Mutex<Vec<Sender<PlaybackState>>>,
  capacity: usize,
  closed: AtomicBool,
}

impl Broadcaster {
  pub fn new(capacity: usize) -> Self {
    Self {
      subscribers: Mutex::new(Vec::new()),
      capacity: capacity.max(1),
      closed: AtomicBool::new(false),
    }
  }

  pub fn subscribe(&self) -> Subscription {
    let (tx, rx) = async_channel::bounded(self.capacity);
    let mut subscribers = self.subscribers.lock();
    if self.closed.load(Ordering::Acquire) {
      tx.close();
    } else {
      subscribers.push(tx);
    }
    Subscription { rx }
  }

  /// Deliver `state` to every subscriber with room for it.
  pub fn publish(&self, state: &PlaybackState) {
    let mut subscribers = self.subscribers.lock();
    subscribers.retain(|tx| match tx.try_send(state.clone()) {
      Ok(()) => true,
      Err(TrySendError::Full(_)) => {
        log::debug!("Subscriber buffer full, dropping notification");
        true
      }
      Err(TrySendError::Closed(_)) => false,
    });
  }

  /// Close every channel; subscribers see end-of-stream once drained.
  pub fn close(&self) {
    let mut subscribers = self.subscribers.lock();
    self.closed.store(true, Ordering::Release);
    for tx in subscribers.drain(..) {
      tx.close();
    }
  }

  /// Accept subscribers again after a restart.
  pub fn reopen(&self) {
    let _subscribers = self.subscribers.lock();
    self.closed.store(false, Ordering::Release);
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscribers.lock().len()
  }
}

/// Lock-guarded playback state plus its broadcaster.
///
/// The event listener is the only writer. The write lock is released before
/// anything is published.
pub struct StateStore {
  state: RwLock<PlaybackState>,
  broadcaster: Broadcaster,
}

impl StateStore {
  pub fn new(subscriber_capacity: usize) -> Self {
    Self {
      state: RwLock::new(PlaybackState::default()),
      broadcaster: Broadcaster::new(subscriber_capacity),
    }
  }

  pub fn snapshot(&self) -> PlaybackState {
    self.state.read().clone()
  }

  pub fn subscribe(&self) -> Subscription {
    self.broadcaster.subscribe()
  }

  pub fn broadcaster(&self) -> &Broadcaster {
    &self.broadcaster
  }

  /// Apply `event`; publish once if any field changed. Returns whether it did.
  pub fn apply_event(&self, event: &EngineEvent) -> bool {
    let snapshot = {
      let mut state = self.state.write();
      let before = state.clone();
      state.apply_event(event);
      if *state == before {
        return false;
      }
      state.clone()
    };

    self.broadcaster.publish(&snapshot);
    true
  }
}
