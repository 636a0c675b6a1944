//! Talking to the backend: the collaborator trait, patch requests, the
//! queue of in-flight background writes and the user-facing notices.

pub mod fetch;
pub mod file_backend;
pub mod memory;
pub mod notices;
pub mod queue;
pub mod server;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::model::{Dataset, Order, OrderId, Route, RouteId};

pub use fetch::{FetchGuard, FetchTicket};
pub use file_backend::FileBackend;
pub use memory::MemoryBackend;
pub use notices::{Notice, NoticeLevel, Notices};
pub use queue::{merge_partial, FlowKind, SyncOutcome, SyncQueue, Ticket};

/// Error shape returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        ApiError::new(404, format!("{} not found", what))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::new(422, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        ApiError::new(503, message)
    }
}

/// Which kind of entity a patch addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Route,
    Order,
}

/// A PATCH-style update: the entity id plus only the fields that changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchRequest {
    pub entity: EntityKind,
    pub id: i64,
    pub fields: Map<String, Value>,
}

impl PatchRequest {
    pub fn order(id: OrderId) -> Self {
        PatchRequest {
            entity: EntityKind::Order,
            id,
            fields: Map::new(),
        }
    }

    pub fn route(id: RouteId) -> Self {
        PatchRequest {
            entity: EntityKind::Route,
            id,
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Fields returned by a successful update, to be merged into current state
pub type Partial = Map<String, Value>;

/// The opaque server behind the dashboard.
///
/// Every call may fail with an [`ApiError`]. Updates may answer with a
/// partial entity worth merging.
pub trait Backend {
    fn fetch_dataset(&mut self) -> Result<Dataset, ApiError>;

    fn create_route(&mut self, route: &Route) -> Result<Route, ApiError>;
    fn update_route(&mut self, patch: &PatchRequest) -> Result<Option<Partial>, ApiError>;
    fn delete_route(&mut self, id: RouteId) -> Result<(), ApiError>;

    fn create_order(&mut self, order: &Order) -> Result<Order, ApiError>;
    fn update_order(&mut self, patch: &PatchRequest) -> Result<Option<Partial>, ApiError>;
    fn delete_order(&mut self, id: OrderId) -> Result<(), ApiError>;

    /// Send a patch to the matching update endpoint
    fn send_patch(&mut self, patch: &PatchRequest) -> Result<Option<Partial>, ApiError> {
        match patch.entity {
            EntityKind::Route => self.update_route(patch),
            EntityKind::Order => self.update_order(patch),
        }
    }
}

/// Overlay `fields` onto a typed entity through its JSON form. Keys in
/// `skip` are left alone. A merge that would not deserialize is logged and
/// leaves the entity untouched.
pub fn merge_fields<T: Serialize + DeserializeOwned>(
    entity: &mut T,
    fields: &Map<String, Value>,
    skip: &[&str],
) -> bool {
    let Ok(Value::Object(mut current)) = serde_json::to_value(&*entity) else {
        warn!("could not serialize entity for merge");
        return false;
    };
    for (key, value) in fields {
        if !skip.contains(&key.as_str()) {
            current.insert(key.clone(), value.clone());
        }
    }
    match serde_json::from_value(Value::Object(current)) {
        Ok(merged) => {
            *entity = merged;
            true
        }
        Err(e) => {
            warn!(error = %e, "discarding partial that does not fit the entity");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_error_displays_status_and_message() {
        let err = ApiError::new(409, "route is locked");
        assert_eq!(err.to_string(), "409: route is locked");
        assert_eq!(ApiError::not_found("order 4").to_string(), "404: order 4 not found");
    }

    #[test]
    fn patch_builder_collects_fields() {
        let patch = PatchRequest::order(5)
            .with("delivery_arrangement", 2usize)
            .with("route_id", 9i64);
        assert_eq!(patch.entity, EntityKind::Order);
        assert_eq!(patch.fields["delivery_arrangement"], json!(2));
        assert_eq!(patch.fields["route_id"], json!(9));
        assert!(!patch.is_empty());
        assert!(PatchRequest::route(1).is_empty());
    }

    #[test]
    fn merge_overlays_and_skips() {
        let mut order = Order::new(1, 2, "Acme");
        let partial = json!({"client_name": "Acme Ltd", "route_id": 99, "notes": "gate code 12"});
        let Value::Object(fields) = partial else { unreachable!() };
        assert!(merge_fields(&mut order, &fields, &["route_id"]));
        assert_eq!(order.client_name, "Acme Ltd");
        assert_eq!(order.notes.as_deref(), Some("gate code 12"));
        assert_eq!(order.route_id, 2);
    }

    #[test]
    fn merge_rejects_ill_typed_partial() {
        let mut order = Order::new(1, 2, "Acme");
        let Value::Object(fields) = json!({"delivery_arrangement": "first"}) else {
            unreachable!()
        };
        assert!(!merge_fields(&mut order, &fields, &[]));
        assert_eq!(order, Order::new(1, 2, "Acme"));
    }
}
