//! The dashboard: one store, one backend, and the flows that connect them.
//!
//! Everything a host (the TUI, the CLI, a test) does goes through a
//! [`Dashboard`]. It owns the normalized store, the background-sync queue,
//! the panel stack, the notices and the view cache that panels read their
//! snapshots from.

pub mod forms;
pub mod panel;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{ActiveSelection, ViewDataCache};
use crate::io::state::UiState;
use crate::model::{Dataset, FailurePolicy, OptionMaps, Order, OrderId, Route, RouteId};
use crate::ops::arrangement::apply_reorder;
use crate::ops::calendar::{build_calendar, resolve_date_drop, CalendarMonth, DateDropResolution};
use crate::ops::plan::{apply_plan, PlanError};
use crate::ops::reorder::{DropOutcome, ReorderError, ReorderOutcome};
use crate::ops::transfer::{transfer_order, TransferError, TransferRequest};
use crate::store::{NormalizedStore, SelectionMeta, SelectionOrigin};
use crate::sync::{
    ApiError, Backend, FetchGuard, FetchTicket, FlowKind, Notices, PatchRequest, SyncOutcome,
    SyncQueue, Ticket,
};
use crate::view::{DataTransfer, DragPayload, OpenRequest, OrderTransfer, PanelId, ViewStack};

pub use forms::{OrderForm, PendingTransfer, RouteForm, RouteSubmit};
pub use panel::{Panel, RoutePicker};

/// Selection keys in the view cache
pub const ROUTE_SELECTION: &str = "route";
pub const ORDER_SELECTION: &str = "order";

/// Error type for dashboard flows
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("route not found: {0}")]
    RouteNotFound(RouteId),
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),
    #[error("no route picker is open")]
    NoPicker,
    #[error("route {0} is not one of the offered routes")]
    NotACandidate(RouteId),
    #[error(transparent)]
    Reorder(#[from] ReorderError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Denormalized snapshot held by a cache selection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SelectionSnapshot {
    Route(Route),
    Order(Order),
}

/// One stop as the map layer sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapStop {
    pub id: OrderId,
    pub route_id: RouteId,
    pub arrangement: usize,
    pub client_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

/// Flat list of stops across all routes, in route then arrangement order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapLayer {
    pub stops: Vec<MapStop>,
}

impl MapLayer {
    pub fn from_routes(routes: &[Route]) -> Self {
        let stops = routes
            .iter()
            .flat_map(|r| r.delivery_orders.iter())
            .map(|o| MapStop {
                id: o.id,
                route_id: o.route_id,
                arrangement: o.delivery_arrangement,
                client_name: o.client_name.clone(),
                lat: o.address.lat,
                lng: o.address.lng,
            })
            .collect();
        MapLayer { stops }
    }
}

/// What dropping something on a calendar day led to
#[derive(Debug, Clone, PartialEq)]
pub enum DateDropEffect {
    /// The order moved to the only other route that day
    Transferred(Ticket),
    /// Several routes run that day; a picker panel was opened
    PickerOpened,
    /// Nothing runs that day; a route form was opened with the move queued
    FormOpened,
    /// A route was rescheduled to the day
    RouteMoved(Ticket),
    Ignored,
}

pub struct Dashboard<B: Backend> {
    pub store: NormalizedStore,
    backend: B,
    pub sync: SyncQueue,
    pub panels: ViewStack<Panel>,
    pub notices: Notices,
    pub cache: ViewDataCache<MapLayer, SelectionSnapshot>,
    pub options: OptionMaps,
    fetch: FetchGuard,
    /// Store version the map layer was built from
    layer_version: Option<u64>,
}

impl<B: Backend> Dashboard<B> {
    pub fn new(backend: B, policy: FailurePolicy) -> Self {
        Dashboard {
            store: NormalizedStore::new(),
            backend,
            sync: SyncQueue::new(policy),
            panels: ViewStack::new(),
            notices: Notices::new(),
            cache: ViewDataCache::new(),
            options: OptionMaps::default(),
            fetch: FetchGuard::new(),
            layer_version: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Replace everything with a fetched dataset
    pub fn load(&mut self, dataset: Dataset) {
        self.store.set_routes(dataset.routes);
        self.options = dataset.options;
        self.refresh_selections();
    }

    // -----------------------------------------------------------------------
    // Fetching
    // -----------------------------------------------------------------------

    /// Start a fetch; only the latest ticket's result will be applied
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.fetch.begin()
    }

    /// Apply a fetch result. Stale tickets are dropped; failures become a
    /// notice. Returns true if the store was replaced.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, result: Result<Dataset, ApiError>) -> bool {
        if !self.fetch.is_current(ticket) {
            debug!("discarding result of superseded fetch");
            return false;
        }
        match result {
            Ok(dataset) => {
                info!(routes = dataset.routes.len(), "dataset loaded");
                self.load(dataset);
                true
            }
            Err(e) => {
                warn!(error = %e, "fetch failed");
                self.notices.api_error(&e);
                false
            }
        }
    }

    /// Ignore whatever fetch is outstanding
    pub fn cancel_fetch(&mut self) {
        self.fetch.cancel();
    }

    pub fn refetch(&mut self) -> bool {
        let ticket = self.begin_fetch();
        let result = self.backend.fetch_dataset();
        self.complete_fetch(ticket, result)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Select a route. The first order follows automatically (or the order
    /// selection clears on an empty route) and the route panel reopens when
    /// the meta asks for it.
    pub fn select_route(&mut self, route_id: RouteId, meta: SelectionMeta) -> bool {
        let Some(route) = self.store.find_route_by_id(route_id).cloned() else {
            return false;
        };
        self.store.select_route(route_id, meta, Some(&route));
        let version = self.store.route_version(route_id);
        self.cache.set_active_selection(
            ROUTE_SELECTION,
            ActiveSelection::new(route_id, SelectionSnapshot::Route(route), version).with_meta(meta),
        );
        self.sync_order_selection();
        if meta.open_panel {
            self.reopen_panel(Panel::RouteDetail { route_id });
        }
        true
    }

    /// Select an order, moving the route pointer to its route if needed
    pub fn select_order(&mut self, order_id: OrderId, meta: SelectionMeta) -> bool {
        let Some(route_id) = self.store.route_id_of_order(order_id) else {
            return false;
        };
        if self.store.selected_route_id() != Some(route_id) {
            self.store
                .select_route(route_id, SelectionMeta::quiet(meta.origin), None);
            self.refresh_route_selection();
        }
        self.store.select_order(order_id, meta);
        self.sync_order_selection();
        if meta.open_panel {
            self.reopen_panel(Panel::OrderDetail { order_id });
        }
        true
    }

    pub fn clear_selection(&mut self) {
        self.store.clear_selection();
        self.cache.remove_active_selection(ROUTE_SELECTION);
        self.cache.remove_active_selection(ORDER_SELECTION);
        self.panels
            .close_by_key(&[panel::ROUTE_DETAIL, panel::ORDER_DETAIL]);
    }

    /// Bring cache snapshots in line with the store. Snapshots whose source
    /// did not change since they were taken are left as they are.
    pub fn refresh_selections(&mut self) {
        let version = self.store.version();
        if self.layer_version != Some(version) {
            self.cache.set_dataset(MapLayer::from_routes(self.store.routes()));
            self.layer_version = Some(version);
        }
        self.refresh_route_selection();
        self.sync_order_selection();
    }

    fn refresh_route_selection(&mut self) {
        let Some(route_id) = self.store.selected_route_id() else {
            self.cache.remove_active_selection(ROUTE_SELECTION);
            return;
        };
        let store = &self.store;
        let version = store.route_version(route_id);
        let stale = self
            .cache
            .get_active_selection(ROUTE_SELECTION)
            .is_none_or(|s| s.id != Some(route_id));
        if stale {
            if let Some(route) = store.find_route_by_id(route_id).cloned() {
                let mut selection =
                    ActiveSelection::new(route_id, SelectionSnapshot::Route(route), version);
                selection.meta = store.selected_route_meta();
                self.cache.set_active_selection(ROUTE_SELECTION, selection);
            }
            return;
        }
        self.cache.refresh_selection(ROUTE_SELECTION, version, |id| {
            store
                .find_route_by_id(id)
                .cloned()
                .map(SelectionSnapshot::Route)
        });
    }

    /// Make the cached order snapshot follow the store's order pointer
    fn sync_order_selection(&mut self) {
        let store = &self.store;
        let Some(order) = store.selected_order().cloned() else {
            self.cache.remove_active_selection(ORDER_SELECTION);
            return;
        };
        let version = store.route_version(order.route_id);
        let current = self.cache.get_active_selection(ORDER_SELECTION);
        if current.is_some_and(|s| s.id == Some(order.id)) {
            self.cache.refresh_selection(ORDER_SELECTION, version, |id| {
                store
                    .find_order_by_id(id, None)
                    .cloned()
                    .map(SelectionSnapshot::Order)
            });
            return;
        }
        let mut selection = ActiveSelection::new(order.id, SelectionSnapshot::Order(order), version);
        selection.meta = store.selected_order_meta();
        self.cache.set_active_selection(ORDER_SELECTION, selection);
    }

    /// The order snapshot panels show
    pub fn active_order(&self) -> Option<&Order> {
        match self.cache.get_active_selection(ORDER_SELECTION)?.data.as_ref()? {
            SelectionSnapshot::Order(order) => Some(order),
            SelectionSnapshot::Route(_) => None,
        }
    }

    /// The route snapshot panels show
    pub fn active_route(&self) -> Option<&Route> {
        match self.cache.get_active_selection(ROUTE_SELECTION)?.data.as_ref()? {
            SelectionSnapshot::Route(route) => Some(route),
            SelectionSnapshot::Order(_) => None,
        }
    }

    /// Edit one order locally and refresh the snapshots that show it
    pub fn update_order(
        &mut self,
        route_id: RouteId,
        order_id: OrderId,
        updater: impl FnOnce(&mut Order),
    ) -> bool {
        let changed = self.store.update_order_in_route(route_id, order_id, updater);
        if changed {
            self.refresh_selections();
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Panels
    // -----------------------------------------------------------------------

    pub fn open_panel(&mut self, panel: Panel) -> PanelId {
        self.panels.open(OpenRequest::new(panel.key(), panel))
    }

    /// Replace the panel with the same key; the open may land on next tick
    pub fn reopen_panel(&mut self, panel: Panel) -> Option<PanelId> {
        self.panels.reopen(OpenRequest::new(panel.key(), panel))
    }

    pub fn close_panel(&mut self, id: PanelId) -> bool {
        self.panels.close(id)
    }

    /// Event-loop turn: run deferred panel opens
    pub fn tick(&mut self) -> Vec<PanelId> {
        self.panels.tick()
    }

    // -----------------------------------------------------------------------
    // Drag flows
    // -----------------------------------------------------------------------

    /// Apply a reorder locally and queue its single background write
    pub fn reorder(&mut self, route_id: RouteId, outcome: &ReorderOutcome) -> Result<Ticket, ReorderError> {
        let checkpoint = self.store.checkpoint();
        let patch = apply_reorder(&mut self.store, route_id, outcome)?;
        let rollback = checkpoint.into_rollback(&self.store);
        self.refresh_selections();
        Ok(self.sync.enqueue(FlowKind::Reorder, patch, Some(rollback)))
    }

    /// Act on what a list drop produced
    pub fn handle_drop(&mut self, route_id: RouteId, outcome: DropOutcome) -> Result<Option<Ticket>, BoardError> {
        match outcome {
            DropOutcome::Reorder(reorder) => Ok(Some(self.reorder(route_id, &reorder)?)),
            DropOutcome::Transfer(request) => Ok(Some(self.transfer(request)?)),
            DropOutcome::Ignored => Ok(None),
        }
    }

    /// Move an order to the end of another route, optimistically
    pub fn transfer(&mut self, request: TransferRequest) -> Result<Ticket, TransferError> {
        let outcome = transfer_order(&mut self.store, request)?;
        self.refresh_selections();
        Ok(self
            .sync
            .enqueue(FlowKind::Transfer, outcome.patch, Some(outcome.rollback)))
    }

    /// Drop a dragged order or route on a calendar day
    pub fn drop_on_date(&mut self, transfer: &DataTransfer, date: NaiveDate) -> Result<DateDropEffect, BoardError> {
        match transfer.payload() {
            Some(DragPayload::Order(OrderTransfer { order_id, route_id })) => {
                self.drop_order_on_date(order_id, route_id, date)
            }
            Some(DragPayload::Route(payload)) => Ok(self
                .move_route_to_date(payload.route_id, date)
                .map_or(DateDropEffect::Ignored, DateDropEffect::RouteMoved)),
            None => Ok(DateDropEffect::Ignored),
        }
    }

    fn drop_order_on_date(
        &mut self,
        order_id: OrderId,
        source_route_id: RouteId,
        date: NaiveDate,
    ) -> Result<DateDropEffect, BoardError> {
        match resolve_date_drop(self.store.routes(), date, source_route_id) {
            DateDropResolution::Transfer { target_route_id } => {
                let ticket =
                    self.transfer(TransferRequest::new(order_id, source_route_id, target_route_id))?;
                Ok(DateDropEffect::Transferred(ticket))
            }
            DateDropResolution::ChooseRoute { candidates } => {
                self.reopen_panel(Panel::RoutePicker(RoutePicker {
                    order_id,
                    source_route_id,
                    date,
                    candidates,
                }));
                Ok(DateDropEffect::PickerOpened)
            }
            DateDropResolution::CreateRoute { date } => {
                let form = RouteForm::for_date(date).with_on_complete(PendingTransfer {
                    order_id,
                    source_route_id,
                });
                self.reopen_panel(Panel::RouteForm(form));
                Ok(DateDropEffect::FormOpened)
            }
            DateDropResolution::Ignore => Ok(DateDropEffect::Ignored),
        }
    }

    /// Finish a route-picker choice: close the picker and run the transfer
    pub fn choose_route(&mut self, target_route_id: RouteId) -> Result<Ticket, BoardError> {
        let picker = match self.panels.find_by_key(panel::ROUTE_PICKER) {
            Some(entry) => match &entry.payload {
                Panel::RoutePicker(picker) => picker.clone(),
                _ => return Err(BoardError::NoPicker),
            },
            None => return Err(BoardError::NoPicker),
        };
        if !picker.candidates.contains(&target_route_id) {
            return Err(BoardError::NotACandidate(target_route_id));
        }
        self.panels.close_by_key(&[panel::ROUTE_PICKER]);
        Ok(self.transfer(TransferRequest::new(
            picker.order_id,
            picker.source_route_id,
            target_route_id,
        ))?)
    }

    /// Reschedule a route. Always undone if the write fails.
    pub fn move_route_to_date(&mut self, route_id: RouteId, date: NaiveDate) -> Option<Ticket> {
        let route = self.store.find_route_by_id(route_id)?;
        if route.delivery_date == Some(date) {
            return None;
        }
        let rollback = self
            .store
            .optimistic_update_route(route_id, |r| r.delivery_date = Some(date));
        self.refresh_selections();
        info!(route_id, %date, "route moved");
        let patch = PatchRequest::route(route_id).with("delivery_date", date.format("%Y-%m-%d").to_string());
        Some(self.sync.enqueue(FlowKind::RouteDate, patch, Some(rollback)))
    }

    /// Reorder a route by one of its saved plans. The first write carries
    /// the rollback for the whole plan.
    pub fn apply_plan(&mut self, route_id: RouteId, index: usize) -> Result<Vec<Ticket>, PlanError> {
        let outcome = apply_plan(&mut self.store, route_id, index)?;
        self.refresh_selections();
        let mut rollback = Some(outcome.rollback);
        Ok(outcome
            .patches
            .into_iter()
            .map(|patch| self.sync.enqueue(FlowKind::Plan, patch, rollback.take()))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Background sync
    // -----------------------------------------------------------------------

    /// Deliver every pending background write
    pub fn flush_sync(&mut self) -> Vec<SyncOutcome> {
        let outcomes = self.sync.flush(&mut self.backend, &mut self.store);
        self.after_sync(&outcomes);
        outcomes
    }

    /// Deliver one background write's response
    pub fn resolve_sync(&mut self, ticket: Ticket) -> Option<SyncOutcome> {
        let outcome = self.sync.resolve(ticket, &mut self.backend, &mut self.store)?;
        self.after_sync(std::slice::from_ref(&outcome));
        Some(outcome)
    }

    /// Send kept failures again
    pub fn retry_failed(&mut self) -> Vec<SyncOutcome> {
        self.notices.clear_sync_failures();
        let outcomes = self.sync.retry_failed(&mut self.backend, &mut self.store);
        self.after_sync(&outcomes);
        outcomes
    }

    fn after_sync(&mut self, outcomes: &[SyncOutcome]) {
        for outcome in outcomes {
            if let SyncOutcome::Failed {
                kind,
                error,
                rolled_back,
                ..
            } = outcome
            {
                let suffix = if *rolled_back { "; change undone" } else { "" };
                self.notices
                    .sync_failure(format!("{} not saved ({}){}", kind.label(), error, suffix));
            }
        }
        self.refresh_selections();
    }

    // -----------------------------------------------------------------------
    // Calendar and UI state
    // -----------------------------------------------------------------------

    pub fn calendar(&self, month: NaiveDate) -> CalendarMonth {
        build_calendar(self.store.routes(), month)
    }

    /// Snapshot of what the TUI should restore next time
    pub fn ui_state(&self) -> UiState {
        UiState {
            selected_route: self.store.selected_route_id(),
            selected_order: self.store.selected_order_id(),
            open_panels: self.panels.entries().iter().map(|e| e.key.clone()).collect(),
            calendar_month: self.panels.entries().iter().find_map(|e| match e.payload {
                Panel::Calendar { month } => Some(month),
                _ => None,
            }),
            last_search: None,
        }
    }

    /// Restore selections and detail panels. Ids that no longer resolve are
    /// skipped.
    pub fn restore_ui_state(&mut self, state: &UiState) {
        let wants = |key: &str| state.open_panels.iter().any(|k| k == key);
        if let Some(route_id) = state.selected_route {
            let meta = SelectionMeta {
                origin: SelectionOrigin::Restore,
                open_panel: wants(panel::ROUTE_DETAIL),
            };
            self.select_route(route_id, meta);
        }
        if let Some(order_id) = state.selected_order {
            let meta = SelectionMeta {
                origin: SelectionOrigin::Restore,
                open_panel: wants(panel::ORDER_DETAIL),
            };
            self.select_order(order_id, meta);
        }
        if let Some(month) = state.calendar_month
            && wants(panel::CALENDAR)
        {
            self.reopen_panel(Panel::Calendar { month });
        }
    }
}
