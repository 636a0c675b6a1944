use std::fs;
use std::path::Path;

use crate::io::project_io::{ProjectError, CONFIG_FILE};
use crate::model::config::{BoardConfig, FailurePolicy};

/// Read the config, returning both the parsed config and the raw
/// toml_edit document for round-trip-safe editing.
pub fn read_config(board_dir: &Path) -> Result<(BoardConfig, toml_edit::DocumentMut), ProjectError> {
    let config_path = board_dir.join(CONFIG_FILE);
    let config_text = fs::read_to_string(&config_path).map_err(|e| ProjectError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: BoardConfig = toml::from_str(&config_text)?;
    let doc: toml_edit::DocumentMut = config_text.parse()?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(board_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ProjectError> {
    let config_path = board_dir.join(CONFIG_FILE);
    fs::write(&config_path, doc.to_string()).map_err(|e| ProjectError::ReadError {
        path: config_path,
        source: e,
    })?;
    Ok(())
}

/// Set `[sync] on_failure`, creating the table if needed
pub fn set_failure_policy(doc: &mut toml_edit::DocumentMut, policy: FailurePolicy) {
    if !doc.contains_key("sync") {
        doc["sync"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["sync"]["on_failure"] = toml_edit::value(policy.as_str());
}

/// Set `[log] level`, creating the table if needed
pub fn set_log_level(doc: &mut toml_edit::DocumentMut, level: &str) {
    if !doc.contains_key("log") {
        doc["log"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["log"]["level"] = toml_edit::value(level);
}
