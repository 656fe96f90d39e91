//! tunecli: drives a headless MPV over its JSON IPC socket and republishes
//! playback state to any number of observers.

pub mod config;
pub mod mpv;
pub mod resolver;
pub mod scanner;

pub use config::{AppConfig, PlayerConfig, RadioStation};
pub use mpv::{LifecycleState, LoadMode, PlaybackState, Player, PlayerError, Subscription};
