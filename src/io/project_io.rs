use std::fs;
use std::path::{Path, PathBuf};

use crate::io::dataset_io::{self, DatasetError};
use crate::model::config::BoardConfig;
use crate::model::project::Project;

pub const BOARD_DIR: &str = "routeboard";
pub const CONFIG_FILE: &str = "config.toml";

/// Error type for project I/O operations
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("not a routeboard project: no routeboard/ directory found")]
    NotAProject,
    #[error("routeboard project already exists at {0}")]
    AlreadyExists(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit config.toml: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Discover the project by walking up from the given directory, looking
/// for a `routeboard/` subdirectory holding a config.toml.
pub fn discover_project(start: &Path) -> Result<PathBuf, ProjectError> {
    let mut current = start.to_path_buf();
    loop {
        let board_dir = current.join(BOARD_DIR);
        if board_dir.is_dir() && board_dir.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ProjectError::NotAProject);
        }
    }
}

pub fn read_board_config(board_dir: &Path) -> Result<BoardConfig, ProjectError> {
    let config_path = board_dir.join(CONFIG_FILE);
    let config_text = fs::read_to_string(&config_path).map_err(|e| ProjectError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    Ok(toml::from_str(&config_text)?)
}

/// Load config and dataset from the given root directory.
/// A missing dataset file loads as an empty dataset.
pub fn load_project(root: &Path) -> Result<Project, ProjectError> {
    let board_dir = root.join(BOARD_DIR);
    if !board_dir.is_dir() {
        return Err(ProjectError::NotAProject);
    }
    let config = read_board_config(&board_dir)?;
    let dataset_path = board_dir.join(&config.data.dataset);
    let dataset = if dataset_path.exists() {
        dataset_io::read_dataset(&dataset_path)?
    } else {
        Default::default()
    };
    Ok(Project {
        root: root.to_path_buf(),
        board_dir,
        config,
        dataset,
    })
}

const CONFIG_TEMPLATE: &str = r##"[project]
name = "{name}"

[data]
dataset = "dataset.json"

[sync]
# What happens when a background write (reorder, transfer) is rejected:
#   "log"      keep the local change, show a sync-failed notice, allow retry
#   "rollback" undo the local change
# Moving a route to another day always rolls back on failure.
on_failure = "log"

[log]
level = "info"
file = "routeboard.log"

# [ui]
# show_key_hints = false
#
# [ui.colors]
# background = "#0C001B"
# text = "#A09BFE"
# highlight = "#FB4196"
"##;

/// Create `routeboard/` with a config and an empty dataset
pub fn init_project(root: &Path, name: &str) -> Result<PathBuf, ProjectError> {
    let board_dir = root.join(BOARD_DIR);
    if board_dir.join(CONFIG_FILE).exists() {
        return Err(ProjectError::AlreadyExists(board_dir));
    }
    fs::create_dir_all(&board_dir)?;
    fs::write(
        board_dir.join(CONFIG_FILE),
        CONFIG_TEMPLATE.replace("{name}", name),
    )?;
    let dataset_path = board_dir.join("dataset.json");
    if !dataset_path.exists() {
        dataset_io::write_dataset(&dataset_path, &Default::default())?;
    }
    Ok(board_dir)
}
