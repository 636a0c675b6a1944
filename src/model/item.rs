use serde::{Deserialize, Serialize};

pub type ItemId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

/// A piece of goods delivered at a stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Server id; `None` until persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    /// Client-only id for items created in an open form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front_end_id: Option<String>,
    #[serde(default)]
    pub name: String,
    /// Key into the item-state option map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_state_id: Option<i64>,
    /// Key into the item-position option map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_position_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub properties: Vec<String>,
}

impl Item {
    pub fn new(id: ItemId, name: impl Into<String>) -> Self {
        Item {
            id: Some(id),
            front_end_id: None,
            name: name.into(),
            item_state_id: None,
            item_position_id: None,
            weight_kg: None,
            dimensions: None,
            properties: Vec::new(),
        }
    }

    /// An unsaved item carrying a fresh client-only id
    pub fn unsaved(name: impl Into<String>) -> Self {
        Item {
            id: None,
            front_end_id: Some(uuid::Uuid::new_v4().to_string()),
            ..Item::new(0, name)
        }
    }

    /// The identity used to match drafts against existing items
    pub fn key(&self) -> ItemKey<'_> {
        match (&self.id, &self.front_end_id) {
            (Some(id), _) => ItemKey::Persisted(*id),
            (None, Some(fe)) => ItemKey::FrontEnd(fe),
            (None, None) => ItemKey::None,
        }
    }
}

/// Borrowed identity of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKey<'a> {
    Persisted(ItemId),
    FrontEnd(&'a str),
    None,
}

/// What a draft asks for when the parent order form is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftAction {
    Create,
    Update,
    Delete,
}

/// An item edit staged inside an open order form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub action: DraftAction,
    pub item: Item,
}

impl ItemDraft {
    pub fn create(item: Item) -> Self {
        ItemDraft {
            action: DraftAction::Create,
            item,
        }
    }

    pub fn update(item: Item) -> Self {
        ItemDraft {
            action: DraftAction::Update,
            item,
        }
    }

    pub fn delete(item: Item) -> Self {
        ItemDraft {
            action: DraftAction::Delete,
            item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsaved_item_has_front_end_key() {
        let item = Item::unsaved("Crate");
        assert!(item.id.is_none());
        assert!(matches!(item.key(), ItemKey::FrontEnd(_)));
    }

    #[test]
    fn persisted_id_wins_over_front_end_id() {
        let mut item = Item::unsaved("Crate");
        item.id = Some(44);
        assert_eq!(item.key(), ItemKey::Persisted(44));
    }

    #[test]
    fn draft_action_serializes_lowercase() {
        let draft = ItemDraft::delete(Item::new(1, "Box"));
        let json = serde_json::to_string(&draft).unwrap();
        assert!(json.contains(r#""action":"delete""#));
    }
}
