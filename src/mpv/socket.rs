//! Control socket path ownership.

use std::io;
use std::path::{Path, PathBuf};

/// Filesystem path of the mpv IPC socket owned by one player instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketPath(PathBuf);

impl SocketPath {
  /// Per-instance path under the temp dir, derived from the pid plus a random suffix.
  pub fn unique() -> Self {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let name = format!("tunecli-mpv-{}-{}.sock", std::process::id(), &suffix[..8]);
    Self(std::env::temp_dir().join(name))
  }

  /// Use an explicitly configured path.
  pub fn fixed(path: impl Into<PathBuf>) -> Self {
    Self(path.into())
  }

  pub fn as_path(&self) -> &Path {
    &self.0
  }

  /// Remove a leftover socket file. mpv refuses to bind an existing path.
  ///
  /// A missing file is fine; any other failure is returned.
  pub fn cleanup(&self) -> io::Result<()> {
    match std::fs::remove_file(&self.0) {
      Ok(()) => {
        log::debug!("Removed stale socket {}", self.0.display());
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e),
    }
  }
}

impl std::fmt::Display for SocketPath {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0.display())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unique_paths_differ() {
    let a = SocketPath::unique();
    let b = SocketPath::unique();
    assert_ne!(a, b);
    let name = a.as_path().file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(&format!("tunecli-mpv-{}-", std::process::id())));
    assert!(name.ends_with(".sock"));
  }

  #[test]
  fn test_cleanup_missing_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let socket = SocketPath::fixed(dir.path().join("absent.sock"));
    assert!(socket.cleanup().is_ok());
  }

  #[test]
  fn test_cleanup_removes_stale_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stale.sock");
    std::fs::write(&path, b"").unwrap();
    let socket = SocketPath::fixed(&path);
    socket.cleanup().unwrap();
    assert!(!path.exists());
  }

  #[test]
  fn test_cleanup_failure_is_reported() {
    // A non-empty directory cannot be removed with remove_file.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("busy");
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("inner"), b"x").unwrap();
    let socket = SocketPath::fixed(&path);
    assert!(socket.cleanup().is_err());
  }
}
