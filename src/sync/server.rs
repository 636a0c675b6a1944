//! What a PATCH-style server does with a dataset.
//!
//! Shared by the backends so the file-backed one and the in-memory one
//! agree on ids, renumbering and counters.

use serde_json::{Map, Value};
use tracing::debug;

use crate::model::{Dataset, Order, OrderId, Route, RouteId};
use crate::ops::arrangement::renumber;
use crate::sync::{merge_fields, ApiError, PatchRequest, Partial};

fn route_index(dataset: &Dataset, id: RouteId) -> Result<usize, ApiError> {
    dataset
        .routes
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| ApiError::not_found(format!("route {}", id)))
}

fn order_location(dataset: &Dataset, id: OrderId) -> Result<(usize, usize), ApiError> {
    dataset
        .routes
        .iter()
        .enumerate()
        .find_map(|(ri, r)| r.order_position(id).map(|oi| (ri, oi)))
        .ok_or_else(|| ApiError::not_found(format!("order {}", id)))
}

fn to_partial<T: serde::Serialize>(entity: &T, drop: &[&str]) -> Result<Partial, ApiError> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(mut map)) => {
            for key in drop {
                map.remove(*key);
            }
            Ok(map)
        }
        _ => Err(ApiError::new(500, "could not encode response")),
    }
}

fn field_usize(fields: &Map<String, Value>, key: &str) -> Result<Option<usize>, ApiError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| ApiError::invalid(format!("{} must be a non-negative integer", key))),
    }
}

fn field_i64(fields: &Map<String, Value>, key: &str) -> Result<Option<i64>, ApiError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| ApiError::invalid(format!("{} must be an integer", key))),
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn create_route(dataset: &mut Dataset, route: &Route) -> Result<Route, ApiError> {
    if route.name.trim().is_empty() {
        return Err(ApiError::invalid("route name must not be empty"));
    }
    let id = dataset.routes.iter().map(|r| r.id).max().unwrap_or(0) + 1;
    let mut created = route.clone();
    created.id = id;
    for order in &mut created.delivery_orders {
        order.route_id = id;
    }
    renumber(&mut created.delivery_orders);
    created.recount();
    dataset.routes.push(created.clone());
    debug!(route_id = id, "server created route");
    Ok(created)
}

/// Patch route fields. Orders are not patchable through the route; the
/// response leaves them out.
pub fn update_route(dataset: &mut Dataset, patch: &PatchRequest) -> Result<Partial, ApiError> {
    let idx = route_index(dataset, patch.id)?;
    if let Some(Value::String(name)) = patch.fields.get("name")
        && name.trim().is_empty()
    {
        return Err(ApiError::invalid("route name must not be empty"));
    }
    let route = &mut dataset.routes[idx];
    if !merge_fields(
        route,
        &patch.fields,
        &["id", "delivery_orders", "total_orders", "total_items"],
    ) {
        return Err(ApiError::invalid("patch does not match route fields"));
    }
    to_partial(&*route, &["delivery_orders"])
}

pub fn delete_route(dataset: &mut Dataset, id: RouteId) -> Result<(), ApiError> {
    let idx = route_index(dataset, id)?;
    dataset.routes.remove(idx);
    Ok(())
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

fn max_item_id(dataset: &Dataset) -> i64 {
    dataset
        .routes
        .iter()
        .flat_map(|r| r.delivery_orders.iter())
        .flat_map(|o| o.delivery_items.iter().filter_map(|i| i.id))
        .max()
        .unwrap_or(0)
}

/// Give unsaved items a server id, dropping their client-only id
fn assign_item_ids(order: &mut Order, next: &mut i64) {
    for item in &mut order.delivery_items {
        if item.id.is_none() {
            *next += 1;
            item.id = Some(*next);
            item.front_end_id = None;
        }
    }
}

pub fn create_order(dataset: &mut Dataset, order: &Order) -> Result<Order, ApiError> {
    if order.client_name.trim().is_empty() {
        return Err(ApiError::invalid("client name must not be empty"));
    }
    let ri = route_index(dataset, order.route_id)?;
    let id = dataset
        .routes
        .iter()
        .flat_map(|r| r.delivery_orders.iter().map(|o| o.id))
        .max()
        .unwrap_or(0)
        + 1;
    let mut next_item = max_item_id(dataset);

    let route = &mut dataset.routes[ri];
    let mut created = order.clone();
    created.id = id;
    created.delivery_arrangement = route.delivery_orders.len();
    assign_item_ids(&mut created, &mut next_item);
    route.delivery_orders.push(created.clone());
    route.recount();
    debug!(order_id = id, route_id = route.id, "server created order");
    Ok(created)
}

/// Patch an order.
///
/// A `route_id` moves the order to the end of that route. A
/// `delivery_arrangement` moves it to that position and renumbers the whole
/// route. Other fields are merged as given.
pub fn update_order(dataset: &mut Dataset, patch: &PatchRequest) -> Result<Partial, ApiError> {
    let (mut ri, mut oi) = order_location(dataset, patch.id)?;
    let mut next_item = max_item_id(dataset);
    let target_route = field_i64(&patch.fields, "route_id")?;
    let arrangement = field_usize(&patch.fields, "delivery_arrangement")?;

    if let Some(target) = target_route
        && target != dataset.routes[ri].id
    {
        let ti = route_index(dataset, target)?;
        let mut order = dataset.routes[ri].delivery_orders.remove(oi);
        renumber(&mut dataset.routes[ri].delivery_orders);
        dataset.routes[ri].recount();
        order.route_id = target;
        let dest = &mut dataset.routes[ti];
        dest.delivery_orders.push(order);
        ri = ti;
        oi = dest.delivery_orders.len() - 1;
    }

    let route = &mut dataset.routes[ri];
    if let Some(to) = arrangement {
        let order = route.delivery_orders.remove(oi);
        let to = to.min(route.delivery_orders.len());
        route.delivery_orders.insert(to, order);
        oi = to;
    }
    renumber(&mut route.delivery_orders);

    let order = &mut route.delivery_orders[oi];
    if !merge_fields(
        order,
        &patch.fields,
        &["id", "route_id", "delivery_arrangement"],
    ) {
        return Err(ApiError::invalid("patch does not match order fields"));
    }
    assign_item_ids(order, &mut next_item);
    let partial = to_partial(&*order, &[])?;
    route.recount();
    Ok(partial)
}

pub fn delete_order(dataset: &mut Dataset, id: OrderId) -> Result<(), ApiError> {
    let (ri, oi) = order_location(dataset, id)?;
    let route = &mut dataset.routes[ri];
    route.delivery_orders.remove(oi);
    renumber(&mut route.delivery_orders);
    route.recount();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn dataset() -> Dataset {
        let mut r1 = Route::new(1, "North");
        for (i, id) in [10, 11, 12].into_iter().enumerate() {
            let mut o = Order::new(id, 1, format!("C{}", id));
            o.delivery_arrangement = i;
            r1.delivery_orders.push(o);
        }
        r1.recount();
        let mut r2 = Route::new(2, "South");
        r2.delivery_orders.push(Order::new(20, 2, "C20"));
        r2.recount();
        Dataset {
            routes: vec![r1, r2],
            ..Default::default()
        }
    }

    fn ids(ds: &Dataset, ri: usize) -> Vec<(OrderId, usize)> {
        ds.routes[ri]
            .delivery_orders
            .iter()
            .map(|o| (o.id, o.delivery_arrangement))
            .collect()
    }

    #[test]
    fn arrangement_patch_repositions_whole_route() {
        let mut ds = dataset();
        let patch = PatchRequest::order(12).with("delivery_arrangement", 0usize);
        let partial = update_order(&mut ds, &patch).unwrap();
        assert_eq!(ids(&ds, 0), vec![(12, 0), (10, 1), (11, 2)]);
        assert_eq!(partial["delivery_arrangement"], json!(0));
    }

    #[test]
    fn route_patch_moves_between_routes() {
        let mut ds = dataset();
        let patch = PatchRequest::order(10)
            .with("route_id", 2i64)
            .with("delivery_arrangement", 1usize);
        let partial = update_order(&mut ds, &patch).unwrap();
        assert_eq!(ids(&ds, 0), vec![(11, 0), (12, 1)]);
        assert_eq!(ids(&ds, 1), vec![(20, 0), (10, 1)]);
        assert_eq!(partial["route_id"], json!(2));
        assert!(ds.routes.iter().all(|r| r.counters_consistent()));
    }

    #[test]
    fn field_patch_merges() {
        let mut ds = dataset();
        let patch = PatchRequest::order(11).with("notes", "fragile");
        update_order(&mut ds, &patch).unwrap();
        assert_eq!(ds.routes[0].delivery_orders[1].notes.as_deref(), Some("fragile"));
    }

    #[test]
    fn bad_patches_are_rejected() {
        let mut ds = dataset();
        assert_eq!(
            update_order(&mut ds, &PatchRequest::order(99)).unwrap_err().status,
            404
        );
        let bad = PatchRequest::order(10).with("delivery_arrangement", "first");
        assert_eq!(update_order(&mut ds, &bad).unwrap_err().status, 422);
        let nowhere = PatchRequest::order(10).with("route_id", 9i64);
        assert_eq!(update_order(&mut ds, &nowhere).unwrap_err().status, 404);
        let unnamed = PatchRequest::route(1).with("name", " ");
        assert_eq!(update_route(&mut ds, &unnamed).unwrap_err().status, 422);
    }

    #[test]
    fn create_assigns_ids_and_position() {
        let mut ds = dataset();
        let route = create_route(&mut ds, &Route::new(0, "East")).unwrap();
        assert_eq!(route.id, 3);

        let mut draft = Order::draft(3, "New client");
        draft.delivery_items.push(crate::model::Item::unsaved("Parcel"));
        let order = create_order(&mut ds, &draft).unwrap();
        assert_eq!(order.id, 21);
        assert_eq!(order.delivery_arrangement, 0);
        assert_eq!(order.delivery_items[0].id, Some(1));
        assert!(order.delivery_items[0].front_end_id.is_none());
        assert_eq!(ds.routes[2].total_items, Some(1));
    }

    #[test]
    fn deletes_renumber() {
        let mut ds = dataset();
        delete_order(&mut ds, 10).unwrap();
        assert_eq!(ids(&ds, 0), vec![(11, 0), (12, 1)]);
        delete_route(&mut ds, 2).unwrap();
        assert_eq!(ds.routes.len(), 1);
        assert_eq!(delete_route(&mut ds, 2).unwrap_err().status, 404);
    }

    #[test]
    fn route_patch_returns_route_without_orders() {
        let mut ds = dataset();
        let partial = update_route(
            &mut ds,
            &PatchRequest::route(2).with("delivery_date", "2024-06-01"),
        )
        .unwrap();
        assert_eq!(partial["delivery_date"], json!("2024-06-01"));
        assert!(!partial.contains_key("delivery_orders"));
        assert_eq!(
            ds.routes[1].delivery_date,
            chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
        );
    }

    #[test]
    fn item_update_assigns_ids_to_new_items() {
        let mut ds = dataset();
        ds.routes[0].delivery_orders[0]
            .delivery_items
            .push(crate::model::Item::new(7, "Crate"));
        let items = json!([
            {"id": 7, "name": "Crate"},
            {"front_end_id": "tmp-1", "name": "Pallet"}
        ]);
        let patch = PatchRequest::order(10).with("delivery_items", items);
        let partial = update_order(&mut ds, &patch).unwrap();
        let saved = &ds.routes[0].delivery_orders[0].delivery_items;
        assert_eq!(saved[1].id, Some(8));
        assert_eq!(saved[1].front_end_id, None);
        assert_eq!(partial["delivery_items"][1]["id"], json!(8));
        assert_eq!(ds.routes[0].total_items, Some(2));
    }
}
