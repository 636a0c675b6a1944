use tracing::info;

use crate::model::{OrderId, RouteId};
use crate::ops::arrangement::renumber;
use crate::store::{NormalizedStore, Rollback};
use crate::sync::PatchRequest;

/// Error type for saved-plan operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("route not found: {0}")]
    RouteNotFound(RouteId),
    #[error("route {route_id} has no saved plan at index {index}")]
    PlanNotFound { route_id: RouteId, index: usize },
}

/// A saved plan applied to the store
#[derive(Debug)]
pub struct PlanOutcome {
    /// Route patch recording the chosen plan, then one patch per order whose
    /// position changed, in ascending target position
    pub patches: Vec<PatchRequest>,
    pub rollback: Rollback,
    pub order_ids: Vec<OrderId>,
}

/// Reorder a route's stops by saved plan `index`.
///
/// Orders named in the plan are sorted by its arrangement; orders the plan
/// does not know keep their relative order after them. Arrangements are
/// renumbered from 0, expected arrival times are copied from the plan and
/// `using_optimization_indx` records the choice.
pub fn apply_plan(
    store: &mut NormalizedStore,
    route_id: RouteId,
    index: usize,
) -> Result<PlanOutcome, PlanError> {
    let route = store
        .find_route_by_id(route_id)
        .ok_or(PlanError::RouteNotFound(route_id))?;
    let plan = route
        .saved_optimizations
        .as_ref()
        .and_then(|plans| plans.get(index))
        .cloned()
        .ok_or(PlanError::PlanNotFound { route_id, index })?;
    let before: Vec<OrderId> = route.delivery_orders.iter().map(|o| o.id).collect();

    let rollback = store.optimistic_update_route(route_id, |route| {
        let mut planned = Vec::new();
        let mut rest = Vec::new();
        for order in std::mem::take(&mut route.delivery_orders) {
            match plan.entry_for(order.id) {
                Some(entry) => planned.push((entry.delivery_arrangement, order)),
                None => rest.push(order),
            }
        }
        planned.sort_by_key(|(arr, _)| *arr);
        route.delivery_orders = planned.into_iter().map(|(_, o)| o).collect();
        route.delivery_orders.extend(rest);
        renumber(&mut route.delivery_orders);
        for order in &mut route.delivery_orders {
            if let Some(entry) = plan.entry_for(order.id)
                && entry.expected_arrival_time.is_some()
            {
                order.expected_arrival_time = entry.expected_arrival_time.clone();
            }
        }
        route.using_optimization_indx = Some(index);
    });

    let order_ids: Vec<OrderId> = store
        .find_route_by_id(route_id)
        .map(|r| r.delivery_orders.iter().map(|o| o.id).collect())
        .unwrap_or_default();

    let mut patches = vec![PatchRequest::route(route_id).with("using_optimization_indx", index)];
    for (position, id) in order_ids.iter().enumerate() {
        if before.get(position) != Some(id) {
            patches.push(PatchRequest::order(*id).with("delivery_arrangement", position));
        }
    }
    info!(route_id, index, moved = patches.len() - 1, "applied saved plan");

    Ok(PlanOutcome {
        patches,
        rollback,
        order_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Order, Route, RoutePlan, SavedOptimizations, SequenceEntry};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn plan(seq: &[(OrderId, usize, &str)]) -> RoutePlan {
        let mut order_sequence = BTreeMap::new();
        for (id, arr, eta) in seq {
            order_sequence.insert(
                id.to_string(),
                SequenceEntry {
                    delivery_arrangement: *arr,
                    expected_arrival_time: Some(eta.to_string()),
                },
            );
        }
        RoutePlan {
            order_sequence,
            total_distance_km: Some(12.5),
            total_duration_min: None,
        }
    }

    fn store(plans: SavedOptimizations) -> NormalizedStore {
        let mut r = Route::new(1, "Harbour run");
        for (i, id) in [10, 11, 12, 13].into_iter().enumerate() {
            let mut o = Order::new(id, 1, format!("C{}", id));
            o.delivery_arrangement = i;
            r.delivery_orders.push(o);
        }
        r.recount();
        r.saved_optimizations = Some(plans);
        NormalizedStore::with_routes(vec![r])
    }

    #[test]
    fn plan_reorders_and_copies_eta() {
        let mut s = store(SavedOptimizations::Many(vec![
            plan(&[(10, 0, "08:00")]),
            plan(&[(12, 0, "08:10"), (10, 1, "08:30"), (11, 2, "09:00")]),
        ]));
        let outcome = apply_plan(&mut s, 1, 1).unwrap();
        assert_eq!(outcome.order_ids, vec![12, 10, 11, 13]);

        let route = s.find_route_by_id(1).unwrap();
        assert_eq!(route.using_optimization_indx, Some(1));
        assert_eq!(route.delivery_orders[0].expected_arrival_time.as_deref(), Some("08:10"));
        assert_eq!(route.delivery_orders[3].expected_arrival_time, None);
        assert!(crate::ops::arrangement::is_dense(&route.delivery_orders));

        assert_eq!(outcome.patches[0].fields["using_optimization_indx"], json!(1));
        let moved: Vec<i64> = outcome.patches[1..].iter().map(|p| p.id).collect();
        assert_eq!(moved, vec![12, 10, 11]);
    }

    #[test]
    fn single_plan_object_is_index_zero() {
        let mut s = store(SavedOptimizations::One(plan(&[(13, 0, "07:45")])));
        let outcome = apply_plan(&mut s, 1, 0).unwrap();
        assert_eq!(outcome.order_ids, vec![13, 10, 11, 12]);
        assert!(matches!(
            apply_plan(&mut s, 1, 1),
            Err(PlanError::PlanNotFound { index: 1, .. })
        ));
    }

    #[test]
    fn unknown_route_is_an_error() {
        let mut s = store(SavedOptimizations::Many(vec![]));
        assert_eq!(apply_plan(&mut s, 5, 0).unwrap_err(), PlanError::RouteNotFound(5));
    }

    #[test]
    fn rollback_restores_previous_sequence() {
        let mut s = store(SavedOptimizations::One(plan(&[(13, 0, "07:45")])));
        let before = s.routes().to_vec();
        let outcome = apply_plan(&mut s, 1, 0).unwrap();
        outcome.rollback.restore(&mut s);
        assert_eq!(s.routes(), &before[..]);
    }
}
