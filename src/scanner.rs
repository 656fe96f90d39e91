//! Music library discovery.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

/// Extensions treated as playable audio (compared lowercase).
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "wav", "m4a", "aac", "wma", "opus"];

/// An audio file found under one of the music directories.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicFile {
  pub path: PathBuf,
  pub name: String,
  pub dir: PathBuf,
  pub size: u64,
  pub modified: Option<SystemTime>,
}

pub fn is_audio_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Expand a leading `~/` to the home directory. Other paths pass through.
pub fn expand_path(path: &str) -> PathBuf {
  match path.strip_prefix("~/") {
    Some(rest) => match dirs::home_dir() {
      Some(home) => home.join(rest),
      None => PathBuf::from(path),
    },
    None => PathBuf::from(path),
  }
}

/// Walk every directory recursively and collect audio files.
///
/// Missing directories and unreadable entries are skipped. Files come back
/// in directory order, sorted by name within each directory.
pub fn scan_directories<S: AsRef<str>>(dirs: &[S]) -> Vec<MusicFile> {
  let mut files = Vec::new();

  for dir in dirs {
    let root = expand_path(dir.as_ref().trim());
    if !root.is_dir() {
      log::warn!("Music directory not found: {}", root.display());
      continue;
    }

    let before = files.len();
    for entry in WalkDir::new(&root).sort_by_file_name() {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
          log::debug!("Skipping unreadable entry: {}", e);
          continue;
        }
      };
      if !entry.file_type().is_file() || !is_audio_file(entry.path()) {
        continue;
      }

      let metadata = entry.metadata().ok();
      let path = entry.path().to_path_buf();
      files.push(MusicFile {
        name: entry.file_name().to_string_lossy().into_owned(),
        dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        size: metadata.as_ref().map_or(0, |m| m.len()),
        modified: metadata.and_then(|m| m.modified().ok()),
        path,
      });
    }
    log::info!("Found {} audio file(s) in {}", files.len() - before, root.display());
  }

  files
}
