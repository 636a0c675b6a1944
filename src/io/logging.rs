use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::model::config::LogConfig;

/// Build the filter: RUST_LOG wins, then the configured level.
pub fn build_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber, appending to the board's log file.
///
/// The terminal belongs to the TUI and to command output, so logs never
/// go to stderr. Failing to open the file or a subscriber that is already
/// installed leaves logging off; neither stops the program.
pub fn init(board_dir: &Path, config: &LogConfig) -> bool {
    let path = board_dir.join(&config.file);
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return false;
    };
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(config))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .is_ok()
}
