use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{Dataset, OrderId, Route, RouteId};
use crate::ops::arrangement::is_dense;

/// Structured result from `rb check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// Something that breaks an invariant the dashboard relies on
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// A stored counter disagrees with the nested arrays
    #[serde(rename = "counter_mismatch")]
    CounterMismatch {
        route_id: RouteId,
        counter: &'static str,
        stored: usize,
        counted: usize,
    },
    /// An order's `route_id` names a different route than the one holding it
    #[serde(rename = "route_id_mismatch")]
    RouteIdMismatch {
        route_id: RouteId,
        order_id: OrderId,
        found: RouteId,
    },
    #[serde(rename = "duplicate_order_id")]
    DuplicateOrderId {
        order_id: OrderId,
        route_ids: Vec<RouteId>,
    },
    #[serde(rename = "duplicate_route_id")]
    DuplicateRouteId { route_id: RouteId },
}

/// Something worth fixing that the dashboard tolerates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// Arrangements are not 0..N-1 in array order (fixed on next load)
    #[serde(rename = "non_dense_arrangement")]
    NonDenseArrangement {
        route_id: RouteId,
        arrangements: Vec<usize>,
    },
    /// Counter unset; it will be recounted
    #[serde(rename = "missing_counter")]
    MissingCounter {
        route_id: RouteId,
        counter: &'static str,
    },
    #[serde(rename = "unknown_driver")]
    UnknownDriver { route_id: RouteId, driver_id: i64 },
    #[serde(rename = "unknown_item_state")]
    UnknownItemState {
        order_id: OrderId,
        item_state_id: i64,
    },
    /// `using_optimization_indx` points past the saved plans
    #[serde(rename = "plan_index_out_of_range")]
    PlanIndexOutOfRange {
        route_id: RouteId,
        index: usize,
        plans: usize,
    },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a dataset. Read-only.
///
/// Checks performed:
/// 1. Stored counters match the nested orders and items
/// 2. Orders carry the id of the route holding them
/// 3. No order id appears twice (within or across routes), no duplicate routes
/// 4. Warnings for sparse arrangements, unknown lookups, stale plan indices
pub fn check_dataset(dataset: &Dataset) -> CheckResult {
    let mut result = CheckResult::default();

    let mut order_homes: BTreeMap<OrderId, Vec<RouteId>> = BTreeMap::new();
    let mut route_counts: BTreeMap<RouteId, usize> = BTreeMap::new();
    for route in &dataset.routes {
        *route_counts.entry(route.id).or_default() += 1;
        for order in &route.delivery_orders {
            order_homes.entry(order.id).or_default().push(route.id);
        }
    }
    for (route_id, count) in route_counts {
        if count > 1 {
            result.errors.push(CheckError::DuplicateRouteId { route_id });
        }
    }
    for (order_id, route_ids) in order_homes {
        if route_ids.len() > 1 {
            result
                .errors
                .push(CheckError::DuplicateOrderId { order_id, route_ids });
        }
    }

    for route in &dataset.routes {
        check_route(route, dataset, &mut result);
    }

    result.valid = result.errors.is_empty();
    result
}

// ---------------------------------------------------------------------------
// Per-route validation
// ---------------------------------------------------------------------------

fn check_route(route: &Route, dataset: &Dataset, result: &mut CheckResult) {
    let counters = [
        ("total_orders", route.total_orders, route.counted_orders()),
        ("total_items", route.total_items, route.counted_items()),
    ];
    for (counter, stored, counted) in counters {
        match stored {
            Some(stored) if stored != counted => result.errors.push(CheckError::CounterMismatch {
                route_id: route.id,
                counter,
                stored,
                counted,
            }),
            Some(_) => {}
            None => result.warnings.push(CheckWarning::MissingCounter {
                route_id: route.id,
                counter,
            }),
        }
    }

    for order in &route.delivery_orders {
        if order.route_id != route.id {
            result.errors.push(CheckError::RouteIdMismatch {
                route_id: route.id,
                order_id: order.id,
                found: order.route_id,
            });
        }
        for item in &order.delivery_items {
            if let Some(state_id) = item.item_state_id
                && dataset.options.item_state(Some(state_id)).is_none()
            {
                result.warnings.push(CheckWarning::UnknownItemState {
                    order_id: order.id,
                    item_state_id: state_id,
                });
            }
        }
    }

    if !is_dense(&route.delivery_orders) {
        result.warnings.push(CheckWarning::NonDenseArrangement {
            route_id: route.id,
            arrangements: route
                .delivery_orders
                .iter()
                .map(|o| o.delivery_arrangement)
                .collect(),
        });
    }

    if let Some(driver_id) = route.driver_id
        && dataset.options.driver(Some(driver_id)).is_none()
    {
        result.warnings.push(CheckWarning::UnknownDriver {
            route_id: route.id,
            driver_id,
        });
    }

    if let Some(index) = route.using_optimization_indx {
        let plans = route.saved_optimizations.as_ref().map_or(0, |p| p.len());
        if index >= plans {
            result.warnings.push(CheckWarning::PlanIndexOutOfRange {
                route_id: route.id,
                index,
                plans,
            });
        }
    }
}
