//! Resolve video-site page URLs into direct audio stream URLs with yt-dlp.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ResolveError {
  #[error("yt-dlp executable not found")]
  NotFound,
  #[error("yt-dlp failed: {0}")]
  Failed(String),
  #[error("yt-dlp returned an empty stream URL")]
  Empty,
  #[error("yt-dlp timed out after {0:?}")]
  Timeout(Duration),
  #[error("Failed to run yt-dlp: {0}")]
  Io(#[from] std::io::Error),
}

/// Whether `url` needs resolving before MPV can play it.
pub fn needs_resolving(url: &str) -> bool {
  url.contains("youtube.com") || url.contains("youtu.be")
}

/// Thin wrapper around the `yt-dlp` binary.
#[derive(Debug, Clone)]
pub struct StreamResolver {
  program: Option<PathBuf>,
  timeout: Duration,
}

impl Default for StreamResolver {
  fn default() -> Self {
    Self::new(None)
  }
}

impl StreamResolver {
  /// `program` overrides the PATH lookup.
  pub fn new(program: Option<PathBuf>) -> Self {
    Self {
      program,
      timeout: RESOLVE_TIMEOUT,
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Return `url` unchanged unless it points at a page yt-dlp must resolve.
  pub async fn resolve_if_needed(&self, url: &str) -> Result<String, ResolveError> {
    if needs_resolving(url) {
      self.resolve(url).await
    } else {
      Ok(url.to_string())
    }
  }

  /// Best-audio stream URL for `url`.
  pub async fn resolve(&self, url: &str) -> Result<String, ResolveError> {
    let program = match &self.program {
      Some(path) => path.clone(),
      None => which::which("yt-dlp").map_err(|_| ResolveError::NotFound)?,
    };

    log::info!("Resolving stream URL for {}", url);
    let output = Command::new(&program)
      .args(["-f", "ba", "-g", url])
      .stdin(Stdio::null())
      .kill_on_drop(true)
      .output();

    let output = tokio::time::timeout(self.timeout, output)
      .await
      .map_err(|_| ResolveError::Timeout(self.timeout))??;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      return Err(ResolveError::Failed(stderr));
    }

    parse_stream_url(&output.stdout)
  }
}

/// yt-dlp prints one URL per selected format; take the first.
fn parse_stream_url(stdout: &[u8]) -> Result<String, ResolveError> {
  String::from_utf8_lossy(stdout)
    .lines()
    .map(str::trim)
    .find(|line| !line.is_empty())
    .map(str::to_string)
    .ok_or(ResolveError::Empty)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_needs_resolving() {
    assert!(needs_resolving("https://www.youtube.com/watch?v=abc"));
    assert!(needs_resolving("https://youtu.be/abc"));
    assert!(!needs_resolving("/music/song.flac"));
    assert!(!needs_resolving("https://radio.example.com/stream.mp3"));
  }

  #[test]
  fn test_parse_stream_url() {
    assert_eq!(
      parse_stream_url(b"\nhttps://cdn.example.com/audio?sig=1\n").unwrap(),
      "https://cdn.example.com/audio?sig=1"
    );
    assert!(matches!(parse_stream_url(b"  \n"), Err(ResolveError::Empty)));
  }

  #[tokio::test]
  async fn test_local_paths_pass_through() {
    let resolver = StreamResolver::new(Some(PathBuf::from("/nonexistent/yt-dlp")));
    assert_eq!(
      resolver.resolve_if_needed("/music/song.flac").await.unwrap(),
      "/music/song.flac"
    );
  }

  #[tokio::test]
  async fn test_missing_program_is_io_error() {
    let resolver = StreamResolver::new(Some(PathBuf::from("/nonexistent/yt-dlp")));
    let result = resolver.resolve("https://youtu.be/abc").await;
    assert!(matches!(result, Err(ResolveError::Io(_))));
  }
}
