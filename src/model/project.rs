use std::path::PathBuf;

use super::config::BoardConfig;
use super::dataset::Dataset;

/// A loaded routeboard project
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of `routeboard/`)
    pub root: PathBuf,
    /// Path to the `routeboard/` directory
    pub board_dir: PathBuf,
    /// Parsed config.toml
    pub config: BoardConfig,
    /// Dataset as read at load time
    pub dataset: Dataset,
}

impl Project {
    /// Absolute path of the dataset file
    pub fn dataset_path(&self) -> PathBuf {
        self.board_dir.join(&self.config.data.dataset)
    }
}
