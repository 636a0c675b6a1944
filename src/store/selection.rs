use serde::{Deserialize, Serialize};

/// Where a selection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionOrigin {
    List,
    Map,
    Calendar,
    Search,
    /// Picked by the store itself (first order of a freshly selected route)
    Auto,
    /// Restored from persisted UI state
    Restore,
}

/// Metadata stored alongside a selection pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionMeta {
    pub origin: SelectionOrigin,
    /// Whether the host should open the matching detail panel
    pub open_panel: bool,
}

impl SelectionMeta {
    pub fn new(origin: SelectionOrigin) -> Self {
        SelectionMeta {
            origin,
            open_panel: true,
        }
    }

    /// Meta used for the order that `select_route` picks on its own
    pub fn auto() -> Self {
        SelectionMeta::new(SelectionOrigin::Auto)
    }

    /// Select without asking for a panel
    pub fn quiet(origin: SelectionOrigin) -> Self {
        SelectionMeta {
            origin,
            open_panel: false,
        }
    }
}
