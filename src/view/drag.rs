//! Drag payloads carried between drop targets.
//!
//! A `DataTransfer` holds serialized entries keyed by MIME-like type
//! strings, the same way a platform drag carries data. Drop targets check
//! that the type is present before reading, and a payload that fails to
//! parse is ignored.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{OrderId, RouteId};

pub const ORDER_TRANSFER: &str = "application/x-order-transfer";
pub const ROUTE_TRANSFER: &str = "application/x-route-transfer";

/// An order being dragged out of its route list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTransfer {
    pub order_id: OrderId,
    pub route_id: RouteId,
}

/// A whole route being dragged (onto a calendar day)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTransfer {
    pub route_id: RouteId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPayload {
    Order(OrderTransfer),
    Route(RouteTransfer),
}

impl DragPayload {
    pub fn mime_type(&self) -> &'static str {
        match self {
            DragPayload::Order(_) => ORDER_TRANSFER,
            DragPayload::Route(_) => ROUTE_TRANSFER,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTransfer {
    entries: IndexMap<String, String>,
}

impl DataTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transfer already holding `payload`
    pub fn with_payload(payload: DragPayload) -> Self {
        let mut transfer = Self::new();
        transfer.set_payload(payload);
        transfer
    }

    pub fn set_data(&mut self, mime: &str, data: impl Into<String>) {
        self.entries.insert(mime.to_string(), data.into());
    }

    pub fn get_data(&self, mime: &str) -> Option<&str> {
        self.entries.get(mime).map(String::as_str)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn has_type(&self, mime: &str) -> bool {
        self.entries.contains_key(mime)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn set_payload(&mut self, payload: DragPayload) {
        let encoded = match payload {
            DragPayload::Order(p) => serde_json::to_string(&p),
            DragPayload::Route(p) => serde_json::to_string(&p),
        };
        match encoded {
            Ok(json) => self.set_data(payload.mime_type(), json),
            Err(e) => debug!(error = %e, "could not encode drag payload"),
        }
    }

    pub fn order_payload(&self) -> Option<OrderTransfer> {
        self.decode(ORDER_TRANSFER)
    }

    pub fn route_payload(&self) -> Option<RouteTransfer> {
        self.decode(ROUTE_TRANSFER)
    }

    /// The first payload this transfer carries, orders before routes
    pub fn payload(&self) -> Option<DragPayload> {
        self.order_payload()
            .map(DragPayload::Order)
            .or_else(|| self.route_payload().map(DragPayload::Route))
    }

    fn decode<P: for<'de> Deserialize<'de>>(&self, mime: &str) -> Option<P> {
        if !self.has_type(mime) {
            return None;
        }
        let raw = self.get_data(mime)?;
        match serde_json::from_str(raw) {
            Ok(p) => Some(p),
            Err(e) => {
                debug!(mime, error = %e, "ignoring malformed drag payload");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_payload_uses_camel_case_json() {
        let transfer = DataTransfer::with_payload(DragPayload::Order(OrderTransfer {
            order_id: 7,
            route_id: 3,
        }));
        assert!(transfer.has_type(ORDER_TRANSFER));
        assert_eq!(
            transfer.get_data(ORDER_TRANSFER),
            Some(r#"{"orderId":7,"routeId":3}"#)
        );
        assert_eq!(
            transfer.order_payload(),
            Some(OrderTransfer {
                order_id: 7,
                route_id: 3
            })
        );
        assert!(transfer.route_payload().is_none());
    }

    #[test]
    fn missing_type_is_not_parsed() {
        let mut transfer = DataTransfer::new();
        transfer.set_data("text/plain", r#"{"orderId":1,"routeId":2}"#);
        assert!(transfer.order_payload().is_none());
        assert!(transfer.payload().is_none());
    }

    #[test]
    fn malformed_payload_is_ignored() {
        let mut transfer = DataTransfer::new();
        transfer.set_data(ORDER_TRANSFER, "{not json");
        assert!(transfer.order_payload().is_none());
        transfer.set_data(ORDER_TRANSFER, r#"{"orderId":"x"}"#);
        assert!(transfer.order_payload().is_none());
    }

    #[test]
    fn route_payload_round_trips_through_types() {
        let transfer = DataTransfer::with_payload(DragPayload::Route(RouteTransfer { route_id: 9 }));
        assert_eq!(transfer.types().collect::<Vec<_>>(), vec![ROUTE_TRANSFER]);
        assert_eq!(
            transfer.payload(),
            Some(DragPayload::Route(RouteTransfer { route_id: 9 }))
        );
    }
}
