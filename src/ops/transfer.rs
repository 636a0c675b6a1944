use serde::Serialize;
use tracing::{debug, info};

use crate::model::{OrderId, Route, RouteId};
use crate::ops::arrangement::renumber;
use crate::store::{NormalizedStore, Rollback};
use crate::sync::PatchRequest;

/// Error type for moving orders between routes
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("order {0} is already on that route")]
    SameRoute(OrderId),
    #[error("route not found: {0}")]
    RouteNotFound(RouteId),
    #[error("order {order_id} not found on route {route_id}")]
    OrderNotFound { order_id: OrderId, route_id: RouteId },
}

/// Move `order_id` from `source_route_id` to the end of `target_route_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    pub order_id: OrderId,
    pub source_route_id: RouteId,
    pub target_route_id: RouteId,
}

impl TransferRequest {
    pub fn new(order_id: OrderId, source_route_id: RouteId, target_route_id: RouteId) -> Self {
        TransferRequest {
            order_id,
            source_route_id,
            target_route_id,
        }
    }
}

/// Result of a transfer applied to the store
#[derive(Debug)]
pub struct TransferOutcome {
    /// The single background write for the moved order
    pub patch: PatchRequest,
    /// Restores the collection as it was before the move
    pub rollback: Rollback,
    /// Arrangement the order received on the target route
    pub arrangement: usize,
}

/// Move an order to another route, optimistically.
///
/// The remaining source orders are renumbered from 0, the moved order gets
/// the target's highest arrangement plus one (0 on an empty route) and both
/// routes' counters move by one order and the order's item count. The patch
/// carries the arrangement read back from the store after the move.
pub fn transfer_order(
    store: &mut NormalizedStore,
    request: TransferRequest,
) -> Result<TransferOutcome, TransferError> {
    let TransferRequest {
        order_id,
        source_route_id,
        target_route_id,
    } = request;
    if source_route_id == target_route_id {
        return Err(TransferError::SameRoute(order_id));
    }
    let source = store
        .find_route_by_id(source_route_id)
        .ok_or(TransferError::RouteNotFound(source_route_id))?;
    if source.order(order_id).is_none() {
        return Err(TransferError::OrderNotFound {
            order_id,
            route_id: source_route_id,
        });
    }
    if store.find_route_by_id(target_route_id).is_none() {
        return Err(TransferError::RouteNotFound(target_route_id));
    }

    let rollback = store.optimistic_update_routes(|routes| move_between(routes, request));

    let Some(arrangement) = store
        .find_order_by_id(order_id, Some(target_route_id))
        .map(|o| o.delivery_arrangement)
    else {
        rollback.restore(store);
        return Err(TransferError::OrderNotFound {
            order_id,
            route_id: target_route_id,
        });
    };

    info!(order_id, source_route_id, target_route_id, arrangement, "transferred order");
    let patch = PatchRequest::order(order_id)
        .with("route_id", target_route_id)
        .with("delivery_arrangement", arrangement);
    Ok(TransferOutcome {
        patch,
        rollback,
        arrangement,
    })
}

fn move_between(routes: &mut [Route], request: TransferRequest) {
    let Some(src) = routes.iter().position(|r| r.id == request.source_route_id) else {
        return;
    };
    let Some(dst) = routes.iter().position(|r| r.id == request.target_route_id) else {
        return;
    };
    let Some(pos) = routes[src].order_position(request.order_id) else {
        return;
    };

    let source = &mut routes[src];
    let mut order = source.delivery_orders.remove(pos);
    let moved_items = order.item_count();
    renumber(&mut source.delivery_orders);
    source.total_orders = Some(match source.total_orders {
        Some(total) => total.saturating_sub(1),
        None => source.counted_orders(),
    });
    source.total_items = Some(match source.total_items {
        Some(total) => total.saturating_sub(moved_items),
        None => source.counted_items(),
    });

    let target = &mut routes[dst];
    let next = target
        .delivery_orders
        .iter()
        .map(|o| o.delivery_arrangement)
        .max()
        .map_or(0, |m| m + 1);
    debug!(order_id = order.id, next, "appending to target route");
    order.route_id = target.id;
    order.delivery_arrangement = next;
    target.delivery_orders.push(order);
    target.total_orders = Some(match target.total_orders {
        Some(total) => total + 1,
        None => target.counted_orders(),
    });
    target.total_items = Some(match target.total_items {
        Some(total) => total + moved_items,
        None => target.counted_items(),
    });
}
