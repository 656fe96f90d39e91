//! MPV JSON IPC protocol types.
//!
//! Reference: https://mpv.io/manual/master/#json-ipc

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Properties observed on the event connection, with their observer IDs.
pub const OBSERVED_PROPERTIES: [(i64, &str); 5] = [
  (1, "pause"),
  (2, "media-title"),
  (3, "volume"),
  (4, "time-pos"),
  (5, "duration"),
];

/// How `loadfile` treats the current playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
  /// Stop current playback and play the new file.
  #[default]
  Replace,
  /// Append to the playlist.
  Append,
  /// Append, and start playing if nothing is playing.
  AppendPlay,
}

impl LoadMode {
  pub fn as_str(self) -> &'static str {
    match self {
      LoadMode::Replace => "replace",
      LoadMode::Append => "append",
      LoadMode::AppendPlay => "append-play",
    }
  }
}

/// Command sent to MPV via IPC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MpvCommand {
  pub command: Vec<Value>,
}

impl MpvCommand {
  pub fn new(args: Vec<Value>) -> Self {
    Self { command: args }
  }

  /// Load a file or URL.
  pub fn loadfile(url: &str, mode: LoadMode) -> Self {
    Self::new(vec!["loadfile".into(), url.into(), mode.as_str().into()])
  }

  /// Cycle (toggle) a property.
  pub fn cycle(property: &str) -> Self {
    Self::new(vec!["cycle".into(), property.into()])
  }

  /// Stop playback and clear the playlist.
  pub fn stop() -> Self {
    Self::new(vec!["stop".into()])
  }

  /// Set volume (0-100).
  pub fn set_volume(volume: u8) -> Self {
    Self::new(vec!["set_property".into(), "volume".into(), volume.into()])
  }

  /// Seek relative to the current position, in seconds.
  pub fn seek(seconds: f64) -> Self {
    Self::new(vec!["seek".into(), seconds.into()])
  }

  /// Observe a property for changes.
  pub fn observe_property(id: i64, name: &str) -> Self {
    Self::new(vec!["observe_property".into(), id.into(), name.into()])
  }

  /// Quit MPV.
  pub fn quit() -> Self {
    Self::new(vec!["quit".into()])
  }

  /// Encode as one newline-terminated JSON line.
  pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
    let mut line = serde_json::to_vec(self)?;
    line.push(b'\n');
    Ok(line)
  }
}

/// Reply to a command, as seen on the event connection.
#[derive(Debug, Clone, PartialEq)]
pub struct MpvResponse {
  /// "success" or error message.
  pub error: String,
  pub request_id: Option<i64>,
}

impl MpvResponse {
  pub fn is_success(&self) -> bool {
    self.error == "success"
  }
}

/// Change of an observed property, typed by property name.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyChange {
  Pause(bool),
  MediaTitle(String),
  Volume(f64),
  /// `None` when mpv reports the value as unavailable.
  TimePos(Option<f64>),
  Duration(Option<f64>),
  /// Known property carrying data of an unexpected type.
  Mismatched { name: String },
  /// Property this client does not track.
  Unknown { name: String },
}

impl PropertyChange {
  fn from_wire(name: Option<String>, data: Option<Value>) -> Self {
    let name = name.unwrap_or_default();
    let mismatched = |name: String| PropertyChange::Mismatched { name };

    match name.as_str() {
      "pause" => match data.as_ref().and_then(Value::as_bool) {
        Some(paused) => PropertyChange::Pause(paused),
        None => mismatched(name),
      },
      "media-title" => match data {
        Some(Value::String(title)) => PropertyChange::MediaTitle(title),
        _ => mismatched(name),
      },
      "volume" => match data.as_ref().and_then(Value::as_f64) {
        Some(volume) => PropertyChange::Volume(volume),
        None => mismatched(name),
      },
      "time-pos" => match optional_number(data) {
        Ok(pos) => PropertyChange::TimePos(pos),
        Err(()) => mismatched(name),
      },
      "duration" => match optional_number(data) {
        Ok(duration) => PropertyChange::Duration(duration),
        Err(()) => mismatched(name),
      },
      _ => PropertyChange::Unknown { name },
    }
  }
}

/// Null or absent is `Ok(None)`; any non-number is an error.
fn optional_number(data: Option<Value>) -> Result<Option<f64>, ()> {
  match data {
    None | Some(Value::Null) => Ok(None),
    Some(value) => value.as_f64().map(Some).ok_or(()),
  }
}

/// Event sent by MPV.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
  PropertyChange(PropertyChange),
  Idle,
  EndFile {
    /// "eof", "stop", "quit", "error", "redirect".
    reason: Option<String>,
    file_error: Option<String>,
  },
  PlaybackRestart,
  /// Any other event kind.
  Other(String),
}

/// Loose shape of every line MPV writes to an IPC client.
#[derive(Debug, Deserialize)]
struct RawMessage {
  event: Option<String>,
  name: Option<String>,
  data: Option<Value>,
  reason: Option<String>,
  file_error: Option<String>,
  error: Option<String>,
  request_id: Option<i64>,
}

/// Message received from MPV IPC (either response or event).
#[derive(Debug, Clone, PartialEq)]
pub enum MpvMessage {
  Response(MpvResponse),
  Event(EngineEvent),
}

impl MpvMessage {
  /// Parse a JSON line from MPV.
  pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
    let raw: RawMessage = serde_json::from_str(line)?;

    let Some(event) = raw.event else {
      return Ok(MpvMessage::Response(MpvResponse {
        error: raw.error.unwrap_or_default(),
        request_id: raw.request_id,
      }));
    };

    let event = match event.as_str() {
      "property-change" => EngineEvent::PropertyChange(PropertyChange::from_wire(raw.name, raw.data)),
      "idle" => EngineEvent::Idle,
      "end-file" => EngineEvent::EndFile {
        reason: raw.reason,
        file_error: raw.file_error,
      },
      "playback-restart" => EngineEvent::PlaybackRestart,
      _ => EngineEvent::Other(event),
    };
    Ok(MpvMessage::Event(event))
  }
}
