use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState {
    pub id: i64,
    pub name: String,
    /// Hex color like `#44FF88`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPosition {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Read-only reference data fetched once with the dataset.
/// Keyed by id, kept in the order the server listed them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionMaps {
    #[serde(default)]
    pub item_states: IndexMap<i64, ItemState>,
    #[serde(default)]
    pub item_positions: IndexMap<i64, ItemPosition>,
    #[serde(default)]
    pub drivers: IndexMap<i64, Driver>,
}

impl OptionMaps {
    pub fn item_state(&self, id: Option<i64>) -> Option<&ItemState> {
        self.item_states.get(&id?)
    }

    pub fn item_position(&self, id: Option<i64>) -> Option<&ItemPosition> {
        self.item_positions.get(&id?)
    }

    pub fn driver(&self, id: Option<i64>) -> Option<&Driver> {
        self.drivers.get(&id?)
    }

    /// Display name of an item state, or `-` when unknown
    pub fn item_state_name(&self, id: Option<i64>) -> &str {
        self.item_state(id).map_or("-", |s| s.name.as_str())
    }

    /// Display name of a driver, or `unassigned`
    pub fn driver_name(&self, id: Option<i64>) -> &str {
        self.driver(id).map_or("unassigned", |d| d.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OptionMaps {
        let json = r#"{
            "item_states": {"1": {"id": 1, "name": "Loaded"}, "2": {"id": 2, "name": "Delivered"}},
            "drivers": {"10": {"id": 10, "name": "Kari"}}
        }"#;
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn lookups_by_id() {
        let maps = sample();
        assert_eq!(maps.item_state_name(Some(2)), "Delivered");
        assert_eq!(maps.driver_name(Some(10)), "Kari");
    }

    #[test]
    fn missing_ids_fall_back() {
        let maps = sample();
        assert!(maps.item_state(Some(99)).is_none());
        assert!(maps.item_position(Some(1)).is_none());
        assert_eq!(maps.item_state_name(None), "-");
        assert_eq!(maps.driver_name(Some(3)), "unassigned");
    }

    #[test]
    fn keeps_server_order() {
        let maps = sample();
        let names: Vec<&str> = maps.item_states.values().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Loaded", "Delivered"]);
    }
}
