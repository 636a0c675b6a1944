use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{OrderId, RouteId};

/// Persisted TUI state (written to .state.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UiState {
    #[serde(default)]
    pub selected_route: Option<RouteId>,
    #[serde(default)]
    pub selected_order: Option<OrderId>,
    /// Keys of the panels that were open, bottom first
    #[serde(default)]
    pub open_panels: Vec<String>,
    /// First day of the month the calendar showed
    #[serde(default)]
    pub calendar_month: Option<NaiveDate>,
    /// Last search pattern
    #[serde(default)]
    pub last_search: Option<String>,
}

/// Read .state.json from the routeboard directory
pub fn read_ui_state(board_dir: &Path) -> Option<UiState> {
    let path = board_dir.join(".state.json");
    let content = fs::read_to_string(&path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Write .state.json to the routeboard directory
pub fn write_ui_state(board_dir: &Path, state: &UiState) -> Result<(), std::io::Error> {
    let path = board_dir.join(".state.json");
    let content = serde_json::to_string_pretty(state)?;
    fs::write(&path, content)
}
