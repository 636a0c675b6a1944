//! A small observable container pairing a dataset with named selections.
//!
//! Selections are snapshots. Changing the dataset never touches them; a
//! caller that wants a selection to follow the dataset refreshes it with
//! [`ViewDataCache::refresh_selection`], which re-resolves only when the
//! source version moved.

pub mod diff;

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::store::SelectionMeta;

pub use diff::{changed_fields, extract_changed_fields, values_equal};

pub type SubscriptionId = u64;

/// Notification delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    DatasetChanged,
    SelectionChanged(String),
    SelectionRemoved(String),
}

/// A named pointer at a denormalized snapshot of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSelection<D> {
    pub id: Option<i64>,
    pub data: Option<D>,
    pub meta: Option<SelectionMeta>,
    /// Source version the snapshot was taken at
    pub version: u64,
}

impl<D> ActiveSelection<D> {
    pub fn new(id: i64, data: D, version: u64) -> Self {
        ActiveSelection {
            id: Some(id),
            data: Some(data),
            meta: None,
            version,
        }
    }

    pub fn with_meta(mut self, meta: SelectionMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// How `find` matches candidates against the target value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKey {
    /// Compare the named field of each candidate
    Field(String),
    /// Compare the whole candidate
    Identity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindOptions {
    /// Search this selection's data instead of the dataset
    pub selection_key: Option<String>,
    /// Search inside this sub-collection of the source
    pub collection_key: Option<String>,
    pub target_key: TargetKey,
}

impl Default for FindOptions {
    fn default() -> Self {
        FindOptions {
            selection_key: None,
            collection_key: None,
            target_key: TargetKey::Field("id".to_string()),
        }
    }
}

impl FindOptions {
    pub fn in_selection(mut self, key: &str) -> Self {
        self.selection_key = Some(key.to_string());
        self
    }

    pub fn in_collection(mut self, key: &str) -> Self {
        self.collection_key = Some(key.to_string());
        self
    }

    pub fn by_field(mut self, field: &str) -> Self {
        self.target_key = TargetKey::Field(field.to_string());
        self
    }

    pub fn by_identity(mut self) -> Self {
        self.target_key = TargetKey::Identity;
        self
    }
}

type Listener = Box<dyn FnMut(&CacheEvent)>;

pub struct ViewDataCache<T, D> {
    dataset: Option<T>,
    selections: IndexMap<String, ActiveSelection<D>>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl<T, D> Default for ViewDataCache<T, D> {
    fn default() -> Self {
        ViewDataCache {
            dataset: None,
            selections: IndexMap::new(),
            listeners: Vec::new(),
            next_subscription: 1,
        }
    }
}

impl<T: fmt::Debug, D: fmt::Debug> fmt::Debug for ViewDataCache<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewDataCache")
            .field("dataset", &self.dataset)
            .field("selections", &self.selections)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<T, D> ViewDataCache<T, D> {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn subscribe(&mut self, listener: impl FnMut(&CacheEvent) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, event: CacheEvent) {
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    // -----------------------------------------------------------------------
    // Dataset
    // -----------------------------------------------------------------------

    pub fn dataset(&self) -> Option<&T> {
        self.dataset.as_ref()
    }

    pub fn set_dataset(&mut self, dataset: T) {
        self.dataset = Some(dataset);
        self.notify(CacheEvent::DatasetChanged);
    }

    pub fn clear_dataset(&mut self) {
        self.dataset = None;
        self.notify(CacheEvent::DatasetChanged);
    }

    /// Mutate the dataset in place. Does nothing (and notifies nobody) if
    /// there is no dataset yet.
    pub fn update_dataset(&mut self, mutator: impl FnOnce(&mut T)) -> bool {
        let Some(dataset) = self.dataset.as_mut() else {
            return false;
        };
        mutator(dataset);
        self.notify(CacheEvent::DatasetChanged);
        true
    }

    // -----------------------------------------------------------------------
    // Selections
    // -----------------------------------------------------------------------

    pub fn set_active_selection(&mut self, key: &str, selection: ActiveSelection<D>) {
        self.selections.insert(key.to_string(), selection);
        self.notify(CacheEvent::SelectionChanged(key.to_string()));
    }

    pub fn get_active_selection(&self, key: &str) -> Option<&ActiveSelection<D>> {
        self.selections.get(key)
    }

    pub fn remove_active_selection(&mut self, key: &str) -> Option<ActiveSelection<D>> {
        let removed = self.selections.shift_remove(key);
        if removed.is_some() {
            self.notify(CacheEvent::SelectionRemoved(key.to_string()));
        }
        removed
    }

    pub fn selection_keys(&self) -> impl Iterator<Item = &str> {
        self.selections.keys().map(String::as_str)
    }

    /// Re-resolve a selection's snapshot if its source moved past the
    /// version the snapshot was taken at. `resolve` receives the selection's
    /// id; returning `None` means the entity is gone and the selection is
    /// removed. Returns true if the selection changed.
    pub fn refresh_selection(
        &mut self,
        key: &str,
        version: u64,
        resolve: impl FnOnce(i64) -> Option<D>,
    ) -> bool {
        let Some(selection) = self.selections.get(key) else {
            return false;
        };
        if selection.version == version && selection.data.is_some() {
            return false;
        }
        let Some(id) = selection.id else {
            return false;
        };
        match resolve(id) {
            Some(data) => {
                if let Some(sel) = self.selections.get_mut(key) {
                    sel.data = Some(data);
                    sel.version = version;
                }
                self.notify(CacheEvent::SelectionChanged(key.to_string()));
            }
            None => {
                self.remove_active_selection(key);
            }
        }
        true
    }
}

impl<T: Serialize, D: Serialize> ViewDataCache<T, D> {
    /// Locate a value in the dataset, or in a selection's data when
    /// `selection_key` is set. Any miss or unserializable source yields
    /// `None`.
    pub fn find(&self, target: &Value, options: &FindOptions) -> Option<Value> {
        let source = match &options.selection_key {
            Some(key) => serde_json::to_value(self.selections.get(key)?.data.as_ref()?).ok()?,
            None => serde_json::to_value(self.dataset.as_ref()?).ok()?,
        };
        find_in_value(source, target, options)
    }

    /// [`find`](Self::find), deserialized into `R`
    pub fn find_as<R: DeserializeOwned>(&self, target: &Value, options: &FindOptions) -> Option<R> {
        serde_json::from_value(self.find(target, options)?).ok()
    }
}

/// Search `source` (optionally its `collection_key` member) for the target
pub fn find_in_value(source: Value, target: &Value, options: &FindOptions) -> Option<Value> {
    let scope = match &options.collection_key {
        Some(key) => match source {
            Value::Object(mut map) => map.remove(key)?,
            _ => return None,
        },
        None => source,
    };
    match scope {
        Value::Array(items) => items
            .into_iter()
            .find(|item| matches_target(item, target, &options.target_key)),
        Value::Object(_) if matches_target(&scope, target, &options.target_key) => Some(scope),
        _ => None,
    }
}

fn matches_target(candidate: &Value, target: &Value, key: &TargetKey) -> bool {
    match key {
        TargetKey::Identity => values_equal(candidate, target),
        TargetKey::Field(field) => candidate
            .get(field)
            .is_some_and(|v| values_equal(v, target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Marker {
        id: i64,
        label: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Layer {
        markers: Vec<Marker>,
    }

    fn cache() -> ViewDataCache<Layer, Marker> {
        let mut c = ViewDataCache::new();
        c.set_dataset(Layer {
            markers: vec![
                Marker { id: 1, label: "A".into() },
                Marker { id: 2, label: "B".into() },
            ],
        });
        c
    }

    #[test]
    fn subscribers_notified_synchronously() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut c: ViewDataCache<Layer, Marker> = ViewDataCache::new();
        let sink = Rc::clone(&seen);
        let id = c.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        c.set_dataset(Layer { markers: vec![] });
        c.update_dataset(|d| d.markers.push(Marker { id: 3, label: "C".into() }));
        c.set_active_selection("order", ActiveSelection::new(3, Marker { id: 3, label: "C".into() }, 1));
        assert_eq!(
            *seen.borrow(),
            vec![
                CacheEvent::DatasetChanged,
                CacheEvent::DatasetChanged,
                CacheEvent::SelectionChanged("order".into()),
            ]
        );
        assert!(c.unsubscribe(id));
        c.clear_dataset();
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn update_without_dataset_is_noop() {
        let mut c: ViewDataCache<Layer, Marker> = ViewDataCache::new();
        assert!(!c.update_dataset(|d| d.markers.clear()));
        assert!(c.dataset().is_none());
    }

    #[test]
    fn selections_are_not_recomputed_on_dataset_change() {
        let mut c = cache();
        c.set_active_selection("marker", ActiveSelection::new(1, Marker { id: 1, label: "A".into() }, 1));
        c.update_dataset(|d| d.markers[0].label = "A2".into());
        let sel = c.get_active_selection("marker").unwrap();
        assert_eq!(sel.data.as_ref().unwrap().label, "A");
    }

    #[test]
    fn refresh_selection_only_when_version_moves() {
        let mut c = cache();
        c.set_active_selection("marker", ActiveSelection::new(1, Marker { id: 1, label: "A".into() }, 1));
        let mut calls = 0;
        assert!(!c.refresh_selection("marker", 1, |_| {
            calls += 1;
            None
        }));
        assert_eq!(calls, 0);
        assert!(c.refresh_selection("marker", 2, |id| Some(Marker { id, label: "fresh".into() })));
        let sel = c.get_active_selection("marker").unwrap();
        assert_eq!(sel.data.as_ref().unwrap().label, "fresh");
        assert_eq!(sel.version, 2);
    }

    #[test]
    fn refresh_removes_vanished_entities() {
        let mut c = cache();
        c.set_active_selection("marker", ActiveSelection::new(1, Marker { id: 1, label: "A".into() }, 1));
        assert!(c.refresh_selection("marker", 5, |_| None));
        assert!(c.get_active_selection("marker").is_none());
        assert!(!c.refresh_selection("missing", 5, |_| None));
    }

    #[test]
    fn find_in_collection_by_id() {
        let c = cache();
        let hit = c.find(&json!(2), &FindOptions::default().in_collection("markers"));
        assert_eq!(hit.unwrap()["label"], json!("B"));
        let typed: Option<Marker> =
            c.find_as(&json!(1), &FindOptions::default().in_collection("markers"));
        assert_eq!(typed.unwrap().label, "A");
    }

    #[test]
    fn find_by_other_field_and_identity() {
        let c = cache();
        let by_label = c.find(
            &json!("B"),
            &FindOptions::default().in_collection("markers").by_field("label"),
        );
        assert_eq!(by_label.unwrap()["id"], json!(2));
        let whole = c.find(
            &json!({"label": "A", "id": 1}),
            &FindOptions::default().in_collection("markers").by_identity(),
        );
        assert!(whole.is_some());
    }

    #[test]
    fn find_in_selection_data() {
        let mut c = cache();
        c.set_active_selection("marker", ActiveSelection::new(2, Marker { id: 2, label: "B".into() }, 1));
        let hit = c.find(&json!(2), &FindOptions::default().in_selection("marker"));
        assert_eq!(hit.unwrap()["label"], json!("B"));
    }

    #[test]
    fn find_misses_return_none() {
        let c = cache();
        let opts = FindOptions::default().in_collection("markers");
        assert!(c.find(&json!(99), &opts).is_none());
        assert!(c.find(&json!(1), &FindOptions::default().in_collection("nope")).is_none());
        assert!(c.find(&json!(1), &FindOptions::default().in_selection("nope")).is_none());
        // Dataset root is an object without an id field
        assert!(c.find(&json!(1), &FindOptions::default()).is_none());
        let empty: ViewDataCache<Layer, Marker> = ViewDataCache::new();
        assert!(empty.find(&json!(1), &opts).is_none());
    }

    #[test]
    fn find_in_malformed_source_returns_none() {
        let source = json!({"markers": 5});
        let opts = FindOptions::default().in_collection("markers");
        assert!(find_in_value(source, &json!(5), &opts).is_none());
        assert!(find_in_value(json!("text"), &json!(1), &opts).is_none());
    }
}
