use tracing::debug;

use crate::model::{DraftAction, Item, ItemDraft, ItemKey};

/// Apply staged item drafts to an order's items, in draft order.
///
/// `create` appends, `update` replaces the item with the same id (or
/// front-end id), `delete` removes it. Drafts that match nothing are
/// skipped.
pub fn reconcile_items(existing: &[Item], drafts: &[ItemDraft]) -> Vec<Item> {
    let mut items = existing.to_vec();
    for draft in drafts {
        let key = draft.item.key();
        match draft.action {
            DraftAction::Create => items.push(draft.item.clone()),
            DraftAction::Update => match position(&items, key) {
                Some(idx) => items[idx] = draft.item.clone(),
                None => debug!(?key, "update draft matches no item"),
            },
            DraftAction::Delete => match position(&items, key) {
                Some(idx) => {
                    items.remove(idx);
                }
                None => debug!(?key, "delete draft matches no item"),
            },
        }
    }
    items
}

/// Stage an edit, folding it into an earlier draft for the same item.
///
/// Editing a not-yet-created item keeps it a create; deleting one drops the
/// create entirely.
pub fn stage_draft(drafts: &mut Vec<ItemDraft>, draft: ItemDraft) {
    let key = draft.item.key();
    let earlier = if key == ItemKey::None {
        None
    } else {
        drafts.iter().position(|d| d.item.key() == key)
    };
    let Some(idx) = earlier else {
        drafts.push(draft);
        return;
    };
    match (drafts[idx].action, draft.action) {
        (DraftAction::Create, DraftAction::Delete) => {
            drafts.remove(idx);
        }
        (DraftAction::Create, _) => drafts[idx].item = draft.item,
        _ => drafts[idx] = draft,
    }
}

fn position(items: &[Item], key: ItemKey<'_>) -> Option<usize> {
    if key == ItemKey::None {
        return None;
    }
    items.iter().position(|i| i.key() == key)
}
