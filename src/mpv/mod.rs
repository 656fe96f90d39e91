//! MPV IPC module - spawns and controls an external headless MPV via JSON IPC.
//!
//! Architecture:
//! - `socket.rs` - per-instance IPC socket path and stale-socket cleanup
//! - `process.rs` - MPV binary detection and process supervision
//! - `protocol.rs` - JSON command encoding and typed event decoding
//! - `ipc.rs` - command sender, startup readiness wait, event listener
//! - `state.rs` - playback snapshot store and subscriber fan-out
//! - `client.rs` - `Player`, the lifecycle controller and public API

mod client;
mod error;
mod ipc;
mod process;
mod protocol;
mod socket;
mod state;

pub use client::{LifecycleState, Player};
pub use error::{PlayerError, StartupError};
pub use ipc::CommandError;
pub use process::{find_mpv, ProcessError};
pub use protocol::{EngineEvent, LoadMode, MpvCommand, PropertyChange};
pub use state::{PlaybackState, Subscription};
