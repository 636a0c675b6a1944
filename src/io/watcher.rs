use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Events sent from the file watcher to the TUI event loop.
#[derive(Debug)]
pub enum FileEvent {
    /// The dataset or config changed on disk.
    Changed(Vec<PathBuf>),
}

/// A file system watcher for the routeboard/ directory.
pub struct BoardWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<FileEvent>,
}

impl BoardWatcher {
    /// Start watching the given `routeboard/` directory.
    /// `poll()` should be called each tick.
    pub fn start(board_dir: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let board_dir_owned = board_dir.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else {
                    return;
                };
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }
                let relevant: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|p| is_relevant(&board_dir_owned, p))
                    .collect();
                if !relevant.is_empty() {
                    let _ = tx.send(FileEvent::Changed(relevant));
                }
            },
            Config::default(),
        )?;

        watcher.watch(board_dir, RecursiveMode::NonRecursive)?;
        Ok(BoardWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking poll for pending file events.
    pub fn poll(&self) -> Vec<FileEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }
}

/// JSON and TOML files inside the board directory, minus our own state
/// and lock files
fn is_relevant(board_dir: &Path, path: &Path) -> bool {
    if !path.starts_with(board_dir) {
        return false;
    }
    if let Some(name) = path.file_name().and_then(|n| n.to_str())
        && (name == ".lock" || name == ".state.json")
    {
        return false;
    }
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("toml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_own_files() {
        let dir = Path::new("/p/routeboard");
        assert!(is_relevant(dir, &dir.join("dataset.json")));
        assert!(is_relevant(dir, &dir.join("config.toml")));
        assert!(!is_relevant(dir, &dir.join(".state.json")));
        assert!(!is_relevant(dir, &dir.join(".lock")));
        assert!(!is_relevant(dir, &dir.join("routeboard.log")));
        assert!(!is_relevant(dir, Path::new("/elsewhere/dataset.json")));
    }
}
