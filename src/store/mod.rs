//! The normalized route store: the single source of truth for routes, their
//! orders and items, and the two selection pointers.
//!
//! Selections hold ids only. `selected_route()` / `selected_order()` resolve
//! them against the collection on every read, so a mutation can never leave
//! a stale copy behind.

pub mod selection;

use std::collections::HashMap;

use tracing::debug;

use crate::model::{Order, OrderId, Route, RouteId};

pub use selection::{SelectionMeta, SelectionOrigin};

/// The routes an optimistic change touched, as they were before it.
///
/// Only those routes are put back, and only while nothing else has written
/// to them since the change: a rollback never overwrites a newer write.
/// Consumed on use.
#[derive(Debug, Clone)]
#[must_use = "dropping a Rollback keeps the optimistic change"]
pub struct Rollback {
    /// Touched routes that existed before, with their collection index
    before: Vec<(usize, Route)>,
    /// Touched route ids and their version right after the change
    touched: Vec<(RouteId, u64)>,
}

impl Rollback {
    /// Put the touched routes back. Returns false, changing nothing, when
    /// one of them was written to after the optimistic change.
    pub fn restore(self, store: &mut NormalizedStore) -> bool {
        if let Some((route_id, _)) = self
            .touched
            .iter()
            .find(|(id, version)| store.route_version(*id) != *version)
        {
            debug!(route_id, "route changed since the optimistic update; not rolling back");
            return false;
        }
        debug!(routes = self.touched.len(), "rolling back optimistic update");
        store.restore_routes(self.before, &self.touched);
        true
    }

    /// Ids of the routes this rollback covers
    pub fn route_ids(&self) -> impl Iterator<Item = RouteId> + '_ {
        self.touched.iter().map(|(id, _)| *id)
    }
}

/// The collection as it was before a flow mutates it through other helpers.
/// Turned into a [`Rollback`] once the flow is done.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    routes: Vec<Route>,
}

impl Checkpoint {
    /// Diff against the store's current collection
    pub fn into_rollback(self, store: &NormalizedStore) -> Rollback {
        store.rollback_from(self.routes)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedStore {
    routes: Vec<Route>,
    selected_route_id: Option<RouteId>,
    selected_route_meta: Option<SelectionMeta>,
    selected_order_id: Option<OrderId>,
    selected_order_meta: Option<SelectionMeta>,
    /// Per-route version, bumped by every mutation touching the route
    versions: HashMap<RouteId, u64>,
    clock: u64,
}

impl NormalizedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes(routes: Vec<Route>) -> Self {
        let mut store = Self::new();
        store.set_routes(routes);
        store
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Monotonic counter moved by every mutation of the collection
    pub fn version(&self) -> u64 {
        self.clock
    }

    /// Version of a route's data; 0 for unknown routes
    pub fn route_version(&self, route_id: RouteId) -> u64 {
        self.versions.get(&route_id).copied().unwrap_or(0)
    }

    fn bump(&mut self, route_id: RouteId) {
        self.clock += 1;
        self.versions.insert(route_id, self.clock);
    }

    fn replace_routes(&mut self, routes: Vec<Route>) {
        let touched: Vec<RouteId> = self
            .routes
            .iter()
            .chain(routes.iter())
            .map(|r| r.id)
            .collect();
        self.routes = routes;
        for id in touched {
            self.bump(id);
        }
    }

    /// Put `before` back for the touched ids, keeping every other route
    fn restore_routes(&mut self, before: Vec<(usize, Route)>, touched: &[(RouteId, u64)]) {
        let existed: Vec<RouteId> = before.iter().map(|(_, r)| r.id).collect();
        self.routes
            .retain(|r| existed.contains(&r.id) || !touched.iter().any(|(id, _)| *id == r.id));
        for (index, route) in before {
            match self.routes.iter().position(|r| r.id == route.id) {
                Some(idx) => self.routes[idx] = route,
                None => {
                    let at = index.min(self.routes.len());
                    self.routes.insert(at, route);
                }
            }
        }
        for (id, _) in touched {
            self.bump(*id);
        }
    }

    /// Ids of routes changed, added or removed relative to `before`
    fn changed_ids(&self, before: &[Route]) -> Vec<RouteId> {
        let mut ids: Vec<RouteId> = before
            .iter()
            .filter(|old| self.find_route_by_id(old.id) != Some(*old))
            .map(|old| old.id)
            .collect();
        ids.extend(
            self.routes
                .iter()
                .filter(|r| !before.iter().any(|old| old.id == r.id))
                .map(|r| r.id),
        );
        ids
    }

    /// Rollback for everything that differs between `before` and now
    fn rollback_from(&self, before: Vec<Route>) -> Rollback {
        let ids = self.changed_ids(&before);
        Rollback {
            before: before
                .into_iter()
                .enumerate()
                .filter(|(_, r)| ids.contains(&r.id))
                .collect(),
            touched: ids.into_iter().map(|id| (id, self.route_version(id))).collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn find_route_by_id(&self, route_id: RouteId) -> Option<&Route> {
        self.routes.iter().find(|r| r.id == route_id)
    }

    fn find_route_mut(&mut self, route_id: RouteId) -> Option<&mut Route> {
        self.routes.iter_mut().find(|r| r.id == route_id)
    }

    /// Find an order, narrowed to one route when `route_id` is given.
    /// Without a route the first match across all routes wins.
    pub fn find_order_by_id(&self, order_id: OrderId, route_id: Option<RouteId>) -> Option<&Order> {
        match route_id {
            Some(rid) => self.find_route_by_id(rid)?.order(order_id),
            None => self.routes.iter().find_map(|r| r.order(order_id)),
        }
    }

    /// The id of the route an order is nested under
    pub fn route_id_of_order(&self, order_id: OrderId) -> Option<RouteId> {
        self.routes
            .iter()
            .find(|r| r.order(order_id).is_some())
            .map(|r| r.id)
    }

    // -----------------------------------------------------------------------
    // Route mutations
    // -----------------------------------------------------------------------

    /// Replace the whole collection (full fetch)
    pub fn set_routes(&mut self, routes: Vec<Route>) {
        self.replace_routes(routes);
    }

    /// Replace a route by id, or append it
    pub fn upsert_route(&mut self, route: Route) {
        let id = route.id;
        match self.routes.iter().position(|r| r.id == id) {
            Some(idx) => self.routes[idx] = route,
            None => self.routes.push(route),
        }
        self.bump(id);
    }

    /// Apply `updater` to one route. Returns false (and changes nothing) if
    /// the route is unknown.
    pub fn update_route(&mut self, route_id: RouteId, updater: impl FnOnce(&mut Route)) -> bool {
        let Some(route) = self.find_route_mut(route_id) else {
            return false;
        };
        updater(route);
        route.id = route_id;
        self.bump(route_id);
        true
    }

    /// Remove a route and drop any selection pointing into it
    pub fn remove_route(&mut self, route_id: RouteId) -> Option<Route> {
        let idx = self.routes.iter().position(|r| r.id == route_id)?;
        let route = self.routes.remove(idx);
        if self.selected_route_id == Some(route_id) {
            self.selected_route_id = None;
            self.selected_route_meta = None;
        }
        if let Some(oid) = self.selected_order_id
            && route.order(oid).is_some()
        {
            self.clear_order_selection();
        }
        self.bump(route_id);
        Some(route)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Point the route selection at `route_id`.
    ///
    /// When a full route payload is supplied the order selection follows it:
    /// the first order is selected if there is one, otherwise the order
    /// selection is cleared. Without a payload the order selection is left
    /// alone.
    pub fn select_route(&mut self, route_id: RouteId, meta: SelectionMeta, data: Option<&Route>) {
        self.selected_route_id = Some(route_id);
        self.selected_route_meta = Some(meta);

        let Some(data) = data else {
            return;
        };
        match data.delivery_orders.first() {
            Some(first) => {
                self.selected_order_id = Some(first.id);
                self.selected_order_meta = Some(SelectionMeta::auto());
            }
            None => self.clear_order_selection(),
        }
    }

    pub fn select_order(&mut self, order_id: OrderId, meta: SelectionMeta) {
        self.selected_order_id = Some(order_id);
        self.selected_order_meta = Some(meta);
    }

    pub fn clear_order_selection(&mut self) {
        self.selected_order_id = None;
        self.selected_order_meta = None;
    }

    pub fn clear_selection(&mut self) {
        self.selected_route_id = None;
        self.selected_route_meta = None;
        self.clear_order_selection();
    }

    pub fn selected_route_id(&self) -> Option<RouteId> {
        self.selected_route_id
    }

    pub fn selected_order_id(&self) -> Option<OrderId> {
        self.selected_order_id
    }

    pub fn selected_route_meta(&self) -> Option<SelectionMeta> {
        self.selected_route_meta
    }

    pub fn selected_order_meta(&self) -> Option<SelectionMeta> {
        self.selected_order_meta
    }

    /// The selected route, resolved against the current collection
    pub fn selected_route(&self) -> Option<&Route> {
        self.find_route_by_id(self.selected_route_id?)
    }

    /// The selected order, looked up in the selected route first
    pub fn selected_order(&self) -> Option<&Order> {
        let order_id = self.selected_order_id?;
        self.find_order_by_id(order_id, self.selected_route_id)
            .or_else(|| self.find_order_by_id(order_id, None))
    }

    // -----------------------------------------------------------------------
    // Order mutations (counter-preserving)
    // -----------------------------------------------------------------------

    /// Apply `updater` to one order of one route. `total_items` moves by the
    /// difference in item count, or is recounted if it was unknown.
    pub fn update_order_in_route(
        &mut self,
        route_id: RouteId,
        order_id: OrderId,
        updater: impl FnOnce(&mut Order),
    ) -> bool {
        let Some(route) = self.find_route_mut(route_id) else {
            return false;
        };
        let Some(order) = route.order_mut(order_id) else {
            return false;
        };
        let old_count = order.item_count();
        updater(order);
        order.id = order_id;
        if order.route_id != route_id {
            debug!(order_id, route_id, "updater changed route_id; re-pinned");
            order.route_id = route_id;
        }
        let new_count = order.item_count();
        route.total_items = Some(match route.total_items {
            Some(total) => (total + new_count).saturating_sub(old_count),
            None => route.counted_items(),
        });
        self.bump(route_id);
        true
    }

    /// Replace an existing order (matched by `order.id`) inside a route
    pub fn replace_order_in_route(&mut self, route_id: RouteId, mut order: Order) -> bool {
        let Some(route) = self.find_route_mut(route_id) else {
            return false;
        };
        let Some(idx) = route.order_position(order.id) else {
            return false;
        };
        order.route_id = route_id;
        let old_count = route.delivery_orders[idx].item_count();
        let new_count = order.item_count();
        route.delivery_orders[idx] = order;
        route.total_items = Some(match route.total_items {
            Some(total) => (total + new_count).saturating_sub(old_count),
            None => route.counted_items(),
        });
        self.bump(route_id);
        true
    }

    /// Append an order to the end of a route
    pub fn append_order_to_route(&mut self, route_id: RouteId, mut order: Order) -> bool {
        let Some(route) = self.find_route_mut(route_id) else {
            return false;
        };
        order.route_id = route_id;
        let added = order.item_count();
        route.delivery_orders.push(order);
        route.total_orders = Some(match route.total_orders {
            Some(total) => total + 1,
            None => route.counted_orders(),
        });
        route.total_items = Some(match route.total_items {
            Some(total) => total + added,
            None => route.counted_items(),
        });
        self.bump(route_id);
        true
    }

    /// Remove an order from a route. Counters are clamped at zero, and the
    /// order selection is cleared if it pointed at the removed order.
    pub fn remove_order_from_route(&mut self, route_id: RouteId, order_id: OrderId) -> Option<Order> {
        let route = self.find_route_mut(route_id)?;
        let idx = route.order_position(order_id)?;
        let order = route.delivery_orders.remove(idx);
        let removed = order.item_count();
        route.total_orders = Some(match route.total_orders {
            Some(total) => total.saturating_sub(1),
            None => route.counted_orders(),
        });
        route.total_items = Some(match route.total_items {
            Some(total) => total.saturating_sub(removed),
            None => route.counted_items(),
        });
        if self.selected_order_id == Some(order_id) {
            self.clear_order_selection();
        }
        self.bump(route_id);
        Some(order)
    }

    // -----------------------------------------------------------------------
    // Optimistic updates
    // -----------------------------------------------------------------------

    /// Capture the collection without changing it, for flows that mutate
    /// through other helpers before deciding to keep the result
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            routes: self.routes.clone(),
        }
    }

    /// Apply `updater` to the whole collection now; the returned `Rollback`
    /// covers the routes the updater changed, added or removed.
    pub fn optimistic_update_routes(&mut self, updater: impl FnOnce(&mut Vec<Route>)) -> Rollback {
        let before = self.routes.clone();
        updater(&mut self.routes);
        for id in self.changed_ids(&before) {
            self.bump(id);
        }
        self.rollback_from(before)
    }

    /// Apply `updater` to one route now. An unknown route still yields a
    /// (no-op) rollback.
    pub fn optimistic_update_route(
        &mut self,
        route_id: RouteId,
        updater: impl FnOnce(&mut Route),
    ) -> Rollback {
        let checkpoint = self.checkpoint();
        self.update_route(route_id, updater);
        checkpoint.into_rollback(self)
    }
}
