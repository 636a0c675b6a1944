use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::Item;
use super::route::RouteId;

pub type OrderId = i64;

/// Postal address of a stop
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl Address {
    /// Single-line form used in lists
    pub fn one_line(&self) -> String {
        match (self.street.is_empty(), self.city.is_empty()) {
            (false, false) => format!("{}, {}", self.street, self.city),
            (false, true) => self.street.clone(),
            (true, false) => self.city.clone(),
            (true, true) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Delivery window agreed with the customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// A customer stop on a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Denormalized; must equal the id of the route the order is nested under
    pub route_id: RouteId,
    /// Position within the route
    #[serde(default)]
    pub delivery_arrangement: usize,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub contact: Contact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_arrival_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub delivery_items: Vec<Item>,
}

impl Order {
    pub fn new(id: OrderId, route_id: RouteId, client_name: impl Into<String>) -> Self {
        Order {
            id,
            route_id,
            delivery_arrangement: 0,
            client_name: client_name.into(),
            address: Address::default(),
            contact: Contact::default(),
            time_window: None,
            expected_arrival_time: None,
            notes: None,
            delivery_items: Vec::new(),
        }
    }

    /// A new order that has not been persisted yet. The id is derived from
    /// the current time and replaced by the server id on confirmation.
    pub fn draft(route_id: RouteId, client_name: impl Into<String>) -> Self {
        Order::new(temporary_id(), route_id, client_name)
    }

    pub fn item_count(&self) -> usize {
        self.delivery_items.len()
    }
}

/// Client-side temporary id: milliseconds since the epoch
pub fn temporary_id() -> OrderId {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_gets_time_derived_id() {
        let before = Utc::now().timestamp_millis();
        let order = Order::draft(3, "Acme");
        let after = Utc::now().timestamp_millis();
        assert!(order.id >= before && order.id <= after);
        assert_eq!(order.route_id, 3);
    }

    #[test]
    fn address_one_line() {
        let mut addr = Address {
            street: "Main St 1".into(),
            city: "Oslo".into(),
            ..Default::default()
        };
        assert_eq!(addr.one_line(), "Main St 1, Oslo");
        addr.city.clear();
        assert_eq!(addr.one_line(), "Main St 1");
    }

    #[test]
    fn time_window_round_trips_as_strings() {
        let json = r#"{"id":1,"route_id":2,"time_window":{"start":"08:00:00","end":"10:30:00"}}"#;
        let order: Order = serde_json::from_str(json).unwrap();
        let window = order.time_window.unwrap();
        assert_eq!(window.start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(window.end, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    }
}
