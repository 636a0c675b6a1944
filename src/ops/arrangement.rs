use std::collections::HashSet;

use tracing::debug;

use crate::model::{Order, Route, RouteId};
use crate::ops::reorder::{ReorderError, ReorderOutcome};
use crate::store::NormalizedStore;
use crate::sync::PatchRequest;

/// Set `delivery_arrangement` to each order's index, starting at 0
pub fn renumber(orders: &mut [Order]) {
    for (i, order) in orders.iter_mut().enumerate() {
        order.delivery_arrangement = i;
    }
}

/// Whether arrangements are exactly 0..N-1 in array order
pub fn is_dense(orders: &[Order]) -> bool {
    orders
        .iter()
        .enumerate()
        .all(|(i, o)| o.delivery_arrangement == i)
}

/// Sort a route's orders by their stored arrangement (stable, so ties keep
/// array order), then renumber densely and fix up counters.
pub fn normalize_route(route: &mut Route) {
    route.delivery_orders.sort_by_key(|o| o.delivery_arrangement);
    renumber(&mut route.delivery_orders);
    let route_id = route.id;
    for order in &mut route.delivery_orders {
        order.route_id = route_id;
    }
    if route.total_orders.is_none() || route.total_items.is_none() {
        route.recount();
    }
}

pub fn normalize_routes(routes: &mut [Route]) {
    for route in routes {
        normalize_route(route);
    }
}

// ---------------------------------------------------------------------------
// Reorder reconciliation
// ---------------------------------------------------------------------------

/// Write a reorder into the store and build the one background write it
/// needs.
///
/// Every order of the route is renumbered locally, but only the moved order
/// is patched. Orders that shifted as a side effect keep their new local
/// arrangement without a write of their own; the backend derives them when
/// it repositions the moved order.
pub fn apply_reorder(
    store: &mut NormalizedStore,
    route_id: RouteId,
    outcome: &ReorderOutcome,
) -> Result<PatchRequest, ReorderError> {
    let route = store
        .find_route_by_id(route_id)
        .ok_or(ReorderError::RouteNotFound(route_id))?;

    let current: HashSet<_> = route.delivery_orders.iter().map(|o| o.id).collect();
    let proposed: HashSet<_> = outcome.order_ids.iter().copied().collect();
    if current != proposed || proposed.len() != outcome.order_ids.len() {
        return Err(ReorderError::OrderMismatch(route_id));
    }
    if !current.contains(&outcome.moved_order_id) {
        return Err(ReorderError::OrderNotFound(outcome.moved_order_id));
    }

    store.update_route(route_id, |route| {
        let mut remaining = std::mem::take(&mut route.delivery_orders);
        for id in &outcome.order_ids {
            if let Some(pos) = remaining.iter().position(|o| o.id == *id) {
                route.delivery_orders.push(remaining.swap_remove(pos));
            }
        }
        renumber(&mut route.delivery_orders);
    });

    let arrangement = store
        .find_order_by_id(outcome.moved_order_id, Some(route_id))
        .map(|o| o.delivery_arrangement)
        .ok_or(ReorderError::OrderNotFound(outcome.moved_order_id))?;
    debug!(route_id, order_id = outcome.moved_order_id, arrangement, "applied reorder");

    Ok(PatchRequest::order(outcome.moved_order_id).with("delivery_arrangement", arrangement))
}
