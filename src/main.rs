use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tunecli::config::{AppConfig, ConfigError};
use tunecli::resolver::StreamResolver;
use tunecli::scanner;
use tunecli::{LoadMode, PlaybackState, Player, PlayerError};

const USAGE: &str = "usage: tunecli [--config <file>] [--station <name>] [--library] [<path-or-url>...]

Options:
  -c, --config <file>   config file (default: <config dir>/tunecli/config.json)
  -s, --station <name>  play a radio station from the config
  -l, --library         queue every audio file under the configured musicDirs

Keys (followed by Enter):
  p        toggle pause
  s        stop
  + / -    volume up / down by 5
  f / b    seek forward / back 10 s
  q        quit";

#[derive(Error, Debug)]
enum CliError {
  #[error("{0}")]
  Usage(String),
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Player(#[from] PlayerError),
}

struct Args {
  config: Option<PathBuf>,
  station: Option<String>,
  library: bool,
  items: Vec<String>,
}

fn parse_args() -> Result<Args, CliError> {
  let mut config = None;
  let mut station = None;
  let mut library = false;
  let mut items = Vec::new();
  let mut args = std::env::args().skip(1);

  while let Some(arg) = args.next() {
    match arg.as_str() {
      "-h" | "--help" => return Err(CliError::Usage(USAGE.to_string())),
      "-c" | "--config" => {
        let path = args
          .next()
          .ok_or_else(|| CliError::Usage("--config needs a file path".to_string()))?;
        config = Some(PathBuf::from(path));
      }
      "-s" | "--station" => {
        let name = args
          .next()
          .ok_or_else(|| CliError::Usage("--station needs a station name".to_string()))?;
        station = Some(name);
      }
      "-l" | "--library" => library = true,
      _ => items.push(arg),
    }
  }

  Ok(Args {
    config,
    station,
    library,
    items,
  })
}

#[tokio::main]
async fn main() -> ExitCode {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  match run().await {
    Ok(()) => ExitCode::SUCCESS,
    Err(CliError::Usage(msg)) => {
      eprintln!("{}", msg);
      ExitCode::from(2)
    }
    Err(e) => {
      log::error!("{}", e);
      ExitCode::FAILURE
    }
  }
}

async fn run() -> Result<(), CliError> {
  let args = parse_args()?;
  let config = match &args.config {
    Some(path) => AppConfig::load_from(path)?,
    None => AppConfig::load()?,
  };

  let queue = build_queue(&args, &config)?;

  let cancel = CancellationToken::new();
  let player = Player::spawn(config.player_config(), cancel.clone()).await?;
  let resolver = StreamResolver::new(config.yt_dlp_path.as_ref().map(PathBuf::from));

  for (i, item) in queue.iter().enumerate() {
    let mode = if i == 0 { LoadMode::Replace } else { LoadMode::Append };
    let url = match resolver.resolve_if_needed(item).await {
      Ok(url) => url,
      Err(e) => {
        log::warn!("Skipping {}: {}", item, e);
        continue;
      }
    };
    if let Err(e) = player.load_file(&url, mode).await {
      log::warn!("Could not load {}: {}", item, e);
    }
  }

  let updates = player.subscribe();
  let mut stdin = BufReader::new(tokio::io::stdin()).lines();
  let mut stdin_open = true;
  let mut last_shown: Option<PlaybackState> = None;

  let shutdown_signal = wait_for_shutdown_signal();
  tokio::pin!(shutdown_signal);

  loop {
    tokio::select! {
      signal = &mut shutdown_signal => {
        if let Err(e) = signal {
          log::warn!("Signal handler failed: {}", e);
        }
        log::info!("Shutdown signal received");
        cancel.cancel();
        break;
      }
      update = updates.recv() => match update {
        Some(_) => {
          // Notifications may be skipped; always show the latest state.
          let state = player.get_state();
          if last_shown.as_ref().map_or(true, |prev| differs_visibly(prev, &state)) {
            log::info!("{}", describe(&state));
          }
          last_shown = Some(state);
        }
        None => {
          log::info!("Player state stream ended");
          break;
        }
      },
      line = stdin.next_line(), if stdin_open => match line {
        Ok(Some(line)) => {
          if !handle_key(&player, line.trim()).await {
            break;
          }
        }
        // stdin closed; keep playing until a signal arrives.
        Ok(None) => stdin_open = false,
        Err(e) => log::warn!("Failed to read stdin: {}", e),
      },
    }
  }

  player.shutdown().await;
  Ok(())
}

/// Station first, then explicit items, then the scanned library.
fn build_queue(args: &Args, config: &AppConfig) -> Result<Vec<String>, CliError> {
  let mut queue = Vec::new();

  if let Some(name) = &args.station {
    let station = config.station(name).ok_or_else(|| {
      let known: Vec<&str> = config.stations.iter().map(|s| s.name.as_str()).collect();
      CliError::Usage(format!("unknown station {:?} (configured: {})", name, known.join(", ")))
    })?;
    log::info!("Tuning in to {}", station.name);
    queue.push(station.url.clone());
  }

  queue.extend(args.items.iter().cloned());

  if args.library {
    if config.music_dirs.is_empty() {
      return Err(CliError::Usage("--library needs musicDirs in the config".to_string()));
    }
    let files = scanner::scan_directories(&config.music_dirs);
    if files.is_empty() {
      log::warn!("No audio files found in {:?}", config.music_dirs);
    }
    queue.extend(files.into_iter().map(|f| f.path.to_string_lossy().into_owned()));
  }

  Ok(queue)
}

/// Returns false when the user asked to quit.
async fn handle_key(player: &Player, key: &str) -> bool {
  let volume = i32::from(player.get_state().volume);
  let result = match key {
    "q" => return false,
    "p" => player.toggle_pause().await,
    "s" => player.stop().await,
    "+" => player.set_volume((volume + 5).min(100)).await,
    "-" => player.set_volume((volume - 5).max(0)).await,
    "f" => player.seek(10.0).await,
    "b" => player.seek(-10.0).await,
    "" => Ok(()),
    other => {
      println!("unknown key {:?}\n{}", other, USAGE);
      Ok(())
    }
  };
  if let Err(e) = result {
    log::warn!("{}", e);
  }
  true
}

fn differs_visibly(prev: &PlaybackState, next: &PlaybackState) -> bool {
  prev.is_playing != next.is_playing
    || prev.title != next.title
    || prev.volume != next.volume
    || prev.last_error != next.last_error
    || prev.duration != next.duration
}

fn describe(state: &PlaybackState) -> String {
  if !state.last_error.is_empty() {
    return format!("error: {}", state.last_error);
  }
  if state.is_stopped() {
    return format!("stopped [vol {}]", state.volume);
  }
  let status = if state.is_playing { "playing" } else { "paused" };
  format!(
    "{} {} [{} / {}] [vol {}]",
    status,
    state.title,
    format_time(state.position),
    format_time(state.duration),
    state.volume
  )
}

fn format_time(seconds: f64) -> String {
  let total = seconds.max(0.0) as u64;
  format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
  use tokio::signal::unix::{signal, SignalKind};

  let mut sigterm = signal(SignalKind::terminate())?;
  tokio::select! {
    result = tokio::signal::ctrl_c() => result,
    _ = sigterm.recv() => Ok(()),
  }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
  tokio::signal::ctrl_c().await
}
