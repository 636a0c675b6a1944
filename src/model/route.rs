use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::order::{Order, OrderId};

pub type RouteId = i64;

/// A delivery route: an ordered sequence of stops for one driver on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    #[serde(default)]
    pub name: String,
    /// Calendar day the route runs on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<i64>,
    /// Stops in delivery sequence
    #[serde(default)]
    pub delivery_orders: Vec<Order>,
    /// Denormalized `delivery_orders.len()`. `None` means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_orders: Option<usize>,
    /// Denormalized sum of item counts. `None` means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_optimizations: Option<SavedOptimizations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using_optimization_indx: Option<usize>,
}

impl Route {
    /// Create an empty route with consistent counters
    pub fn new(id: RouteId, name: impl Into<String>) -> Self {
        Route {
            id,
            name: name.into(),
            delivery_date: None,
            driver_id: None,
            delivery_orders: Vec::new(),
            total_orders: Some(0),
            total_items: Some(0),
            saved_optimizations: None,
            using_optimization_indx: None,
        }
    }

    /// Count of orders, computed from the nested array
    pub fn counted_orders(&self) -> usize {
        self.delivery_orders.len()
    }

    /// Count of items across all orders, computed from the nested arrays
    pub fn counted_items(&self) -> usize {
        self.delivery_orders
            .iter()
            .map(|o| o.delivery_items.len())
            .sum()
    }

    /// Reset both counters from the nested arrays
    pub fn recount(&mut self) {
        self.total_orders = Some(self.counted_orders());
        self.total_items = Some(self.counted_items());
    }

    /// Whether the stored counters agree with the nested arrays
    pub fn counters_consistent(&self) -> bool {
        self.total_orders == Some(self.counted_orders())
            && self.total_items == Some(self.counted_items())
    }

    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.delivery_orders.iter().find(|o| o.id == order_id)
    }

    pub fn order_mut(&mut self, order_id: OrderId) -> Option<&mut Order> {
        self.delivery_orders.iter_mut().find(|o| o.id == order_id)
    }

    pub fn order_position(&self, order_id: OrderId) -> Option<usize> {
        self.delivery_orders.iter().position(|o| o.id == order_id)
    }

    /// The plan selected by `using_optimization_indx` (index 0 when unset)
    pub fn active_plan(&self) -> Option<&RoutePlan> {
        let plans = self.saved_optimizations.as_ref()?;
        plans.get(self.using_optimization_indx.unwrap_or(0))
    }
}

/// Saved route plans arrive either as a single object or as a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SavedOptimizations {
    Many(Vec<RoutePlan>),
    One(RoutePlan),
}

impl SavedOptimizations {
    pub fn len(&self) -> usize {
        match self {
            SavedOptimizations::One(_) => 1,
            SavedOptimizations::Many(plans) => plans.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&RoutePlan> {
        match self {
            SavedOptimizations::One(plan) if index == 0 => Some(plan),
            SavedOptimizations::One(_) => None,
            SavedOptimizations::Many(plans) => plans.get(index),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoutePlan> {
        let slice: &[RoutePlan] = match self {
            SavedOptimizations::One(plan) => std::slice::from_ref(plan),
            SavedOptimizations::Many(plans) => plans,
        };
        slice.iter()
    }
}

/// A saved route-plan snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    /// Keyed by order id in its decimal string form, as the wire format has it
    #[serde(default)]
    pub order_sequence: BTreeMap<String, SequenceEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_min: Option<f64>,
}

impl RoutePlan {
    pub fn entry_for(&self, order_id: OrderId) -> Option<&SequenceEntry> {
        self.order_sequence.get(&order_id.to_string())
    }
}

/// One stop's position in a saved plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceEntry {
    pub delivery_arrangement: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_arrival_time: Option<String>,
}
