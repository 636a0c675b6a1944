//! Route and order forms.
//!
//! Submits are not optimistic: the backend is called first and local state
//! changes only once it answers. A rejected submit becomes an error notice
//! and leaves the store alone.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::board::panel::{ORDER_FORM, ROUTE_FORM};
use crate::board::{BoardError, Dashboard};
use crate::cache::changed_fields;
use crate::model::{
    Address, Contact, Item, ItemDraft, Order, OrderId, Route, RouteId, TimeWindow,
};
use crate::ops::drafts::{reconcile_items, stage_draft};
use crate::ops::transfer::TransferRequest;
use crate::sync::{merge_partial, ApiError, Backend, NoticeLevel, PatchRequest, Ticket};

/// Fields a route form may change
const ROUTE_FIELDS: &[&str] = &["name", "delivery_date", "driver_id"];

/// Fields an order form may change
const ORDER_FIELDS: &[&str] = &[
    "client_name",
    "address",
    "contact",
    "time_window",
    "notes",
    "delivery_items",
];

/// A transfer waiting for the route it targets to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransfer {
    pub order_id: OrderId,
    pub source_route_id: RouteId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteForm {
    /// `None` when creating
    pub route_id: Option<RouteId>,
    pub name: String,
    pub delivery_date: Option<NaiveDate>,
    pub driver_id: Option<i64>,
    /// Runs against the new route once a create succeeds
    pub on_complete: Option<PendingTransfer>,
}

impl RouteForm {
    pub fn create() -> Self {
        RouteForm {
            route_id: None,
            name: String::new(),
            delivery_date: None,
            driver_id: None,
            on_complete: None,
        }
    }

    pub fn for_date(date: NaiveDate) -> Self {
        RouteForm {
            delivery_date: Some(date),
            name: format!("Route {}", date.format("%a %d %b")),
            ..Self::create()
        }
    }

    pub fn edit(route: &Route) -> Self {
        RouteForm {
            route_id: Some(route.id),
            name: route.name.clone(),
            delivery_date: route.delivery_date,
            driver_id: route.driver_id,
            on_complete: None,
        }
    }

    pub fn with_on_complete(mut self, pending: PendingTransfer) -> Self {
        self.on_complete = Some(pending);
        self
    }

    fn apply_to(&self, route: &mut Route) {
        route.name = self.name.trim().to_string();
        route.delivery_date = self.delivery_date;
        route.driver_id = self.driver_id;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderForm {
    /// `None` when creating
    pub order_id: Option<OrderId>,
    pub route_id: RouteId,
    pub client_name: String,
    pub address: Address,
    pub contact: Contact,
    pub time_window: Option<TimeWindow>,
    pub notes: Option<String>,
    /// Item edits staged while the form is open
    pub drafts: Vec<ItemDraft>,
}

impl OrderForm {
    pub fn create(route_id: RouteId) -> Self {
        OrderForm {
            order_id: None,
            route_id,
            client_name: String::new(),
            address: Address::default(),
            contact: Contact::default(),
            time_window: None,
            notes: None,
            drafts: Vec::new(),
        }
    }

    pub fn edit(order: &Order) -> Self {
        OrderForm {
            order_id: Some(order.id),
            route_id: order.route_id,
            client_name: order.client_name.clone(),
            address: order.address.clone(),
            contact: order.contact.clone(),
            time_window: order.time_window,
            notes: order.notes.clone(),
            drafts: Vec::new(),
        }
    }

    pub fn stage(&mut self, draft: ItemDraft) {
        stage_draft(&mut self.drafts, draft);
    }

    /// The items the order would have after submit
    pub fn preview_items(&self, existing: &[Item]) -> Vec<Item> {
        reconcile_items(existing, &self.drafts)
    }

    fn apply_to(&self, order: &mut Order) {
        order.client_name = self.client_name.trim().to_string();
        order.address = self.address.clone();
        order.contact = self.contact.clone();
        order.time_window = self.time_window;
        order.notes = self.notes.clone().filter(|n| !n.trim().is_empty());
        order.delivery_items = reconcile_items(&order.delivery_items, &self.drafts);
    }
}

/// What a successful route submit did
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSubmit {
    pub route_id: RouteId,
    /// Ticket of the queued transfer that was waiting on this route
    pub transfer: Option<Ticket>,
}

impl<B: Backend> Dashboard<B> {
    // -----------------------------------------------------------------------
    // Opening forms
    // -----------------------------------------------------------------------

    pub fn open_route_form(&mut self, form: RouteForm) {
        self.open_panel(crate::board::Panel::RouteForm(form));
    }

    pub fn open_order_form(&mut self, form: OrderForm) {
        self.open_panel(crate::board::Panel::OrderForm(form));
    }

    // -----------------------------------------------------------------------
    // Route submits
    // -----------------------------------------------------------------------

    pub fn submit_route_form(&mut self, form: &RouteForm) -> Result<RouteSubmit, BoardError> {
        let result = match form.route_id {
            None => self.create_route(form),
            Some(id) => self.update_route(id, form).map(|()| RouteSubmit {
                route_id: id,
                transfer: None,
            }),
        };
        if result.is_ok() {
            self.panels.close_by_key(&[ROUTE_FORM]);
        }
        result
    }

    fn create_route(&mut self, form: &RouteForm) -> Result<RouteSubmit, BoardError> {
        let mut draft = Route::new(0, "");
        form.apply_to(&mut draft);
        let created = self.call(|b| b.create_route(&draft))?;
        let route_id = created.id;
        info!(route_id, name = %created.name, "route created");
        self.store.upsert_route(created);
        self.refresh_selections();

        // The route exists now; a failed follow-up must not fail the submit
        let transfer = form.on_complete.and_then(|pending| {
            let request = TransferRequest::new(pending.order_id, pending.source_route_id, route_id);
            match self.transfer(request) {
                Ok(ticket) => Some(ticket),
                Err(e) => {
                    warn!(route_id, order_id = pending.order_id, error = %e, "queued transfer dropped");
                    self.notices.push(
                        NoticeLevel::Error,
                        format!("route created, but order {} was not moved: {}", pending.order_id, e),
                    );
                    None
                }
            }
        });
        Ok(RouteSubmit { route_id, transfer })
    }

    fn update_route(&mut self, route_id: RouteId, form: &RouteForm) -> Result<(), BoardError> {
        let original = self
            .store
            .find_route_by_id(route_id)
            .cloned()
            .ok_or(BoardError::RouteNotFound(route_id))?;
        let mut updated = original.clone();
        form.apply_to(&mut updated);
        let fields = changed_fields(&original, &updated, Some(ROUTE_FIELDS));
        if fields.is_empty() {
            debug!(route_id, "route form unchanged; nothing to send");
            return Ok(());
        }
        let patch = PatchRequest::route(route_id).with_fields(fields);
        let partial = self.call(|b| b.update_route(&patch))?;
        match partial {
            Some(partial) => merge_partial(&mut self.store, &patch, &partial),
            None => {
                self.store.update_route(route_id, |r| form.apply_to(r));
            }
        }
        self.refresh_selections();
        Ok(())
    }

    pub fn delete_route(&mut self, route_id: RouteId) -> Result<(), BoardError> {
        self.call(|b| b.delete_route(route_id))?;
        self.store.remove_route(route_id);
        self.panels.close_by_key(&[crate::board::panel::ROUTE_DETAIL]);
        self.refresh_selections();
        info!(route_id, "route deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Order submits
    // -----------------------------------------------------------------------

    pub fn submit_order_form(&mut self, form: &OrderForm) -> Result<OrderId, BoardError> {
        let result = match form.order_id {
            None => self.create_order(form),
            Some(id) => self.update_order_from_form(id, form).map(|()| id),
        };
        if result.is_ok() {
            self.panels.close_by_key(&[ORDER_FORM]);
        }
        result
    }

    fn create_order(&mut self, form: &OrderForm) -> Result<OrderId, BoardError> {
        if self.store.find_route_by_id(form.route_id).is_none() {
            return Err(BoardError::RouteNotFound(form.route_id));
        }
        let mut draft = Order::draft(form.route_id, "");
        form.apply_to(&mut draft);
        let created = self.call(|b| b.create_order(&draft))?;
        let order_id = created.id;
        info!(order_id, route_id = form.route_id, "order created");
        self.store.append_order_to_route(form.route_id, created);
        self.refresh_selections();
        Ok(order_id)
    }

    fn update_order_from_form(&mut self, order_id: OrderId, form: &OrderForm) -> Result<(), BoardError> {
        let route_id = self
            .store
            .route_id_of_order(order_id)
            .ok_or(BoardError::OrderNotFound(order_id))?;
        let original = self
            .store
            .find_order_by_id(order_id, Some(route_id))
            .cloned()
            .ok_or(BoardError::OrderNotFound(order_id))?;
        let mut updated = original.clone();
        form.apply_to(&mut updated);
        let fields = changed_fields(&original, &updated, Some(ORDER_FIELDS));
        if fields.is_empty() {
            debug!(order_id, "order form unchanged; nothing to send");
            return Ok(());
        }
        let patch = PatchRequest::order(order_id).with_fields(fields);
        let partial = self.call(|b| b.update_order(&patch))?;
        match partial {
            Some(partial) => merge_partial(&mut self.store, &patch, &partial),
            None => {
                self.store.replace_order_in_route(route_id, updated);
            }
        }
        self.refresh_selections();
        Ok(())
    }

    pub fn delete_order(&mut self, order_id: OrderId) -> Result<(), BoardError> {
        let route_id = self
            .store
            .route_id_of_order(order_id)
            .ok_or(BoardError::OrderNotFound(order_id))?;
        self.call(|b| b.delete_order(order_id))?;
        self.store.remove_order_from_route(route_id, order_id);
        self.store.update_route(route_id, |r| {
            crate::ops::arrangement::renumber(&mut r.delivery_orders)
        });
        self.panels.close_by_key(&[crate::board::panel::ORDER_DETAIL]);
        self.refresh_selections();
        info!(order_id, route_id, "order deleted");
        Ok(())
    }

    /// Call the backend for a submit, turning a rejection into a notice
    fn call<R>(&mut self, f: impl FnOnce(&mut B) -> Result<R, ApiError>) -> Result<R, BoardError> {
        f(&mut self.backend).map_err(|e| {
            self.notices.api_error(&e);
            BoardError::Api(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::{board, seeded};
    use crate::board::Panel;
    use crate::model::{DraftAction, FailurePolicy};
    use crate::sync::memory::BackendCall;
    use pretty_assertions::assert_eq;

    #[test]
    fn route_create_runs_queued_transfer() {
        let mut dash = board(seeded(), FailurePolicy::Log);
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let form = RouteForm::for_date(date).with_on_complete(PendingTransfer {
            order_id: 11,
            source_route_id: 1,
        });
        dash.open_route_form(form.clone());
        let done = dash.submit_route_form(&form).unwrap();
        assert!(done.transfer.is_some());
        assert!(!dash.panels.has_key(ROUTE_FORM));

        let created = dash.store.find_route_by_id(done.route_id).unwrap();
        assert_eq!(created.delivery_date, Some(date));
        assert_eq!(created.delivery_orders[0].id, 11);
        assert_eq!(created.delivery_orders[0].delivery_arrangement, 0);

        dash.flush_sync();
        let server = dash.backend().dataset();
        let server_route = server.routes.iter().find(|r| r.id == done.route_id).unwrap();
        assert_eq!(server_route.delivery_orders[0].id, 11);
    }

    #[test]
    fn route_create_survives_a_failed_queued_transfer() {
        let mut dash = board(seeded(), FailurePolicy::Log);
        let form = RouteForm::for_date(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
            .with_on_complete(PendingTransfer {
                order_id: 10,
                source_route_id: 1,
            });
        dash.open_route_form(form.clone());
        dash.delete_order(10).unwrap();

        let done = dash.submit_route_form(&form).unwrap();
        assert_eq!(done.transfer, None);
        assert!(!dash.panels.has_key(ROUTE_FORM));
        assert_eq!(dash.store.routes().len(), 4);
        assert!(dash.store.find_route_by_id(done.route_id).unwrap().delivery_orders.is_empty());
        let notice = dash.notices.latest().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.text.contains("order 10 was not moved"));
        assert!(dash.sync.is_idle());
    }

    #[test]
    fn failed_create_leaves_store_and_notices_error() {
        let mut dash = board(seeded(), FailurePolicy::Log);
        let before = dash.store.routes().to_vec();
        let mut form = RouteForm::create();
        form.name = "   ".into();
        let err = dash.submit_route_form(&form).unwrap_err();
        assert!(matches!(err, BoardError::Api(ApiError { status: 422, .. })));
        assert_eq!(dash.store.routes(), &before[..]);
        assert_eq!(
            dash.notices.latest().unwrap().text,
            "422: route name must not be empty"
        );
    }

    #[test]
    fn route_update_sends_only_changed_fields() {
        let mut dash = board(seeded(), FailurePolicy::Log);
        let mut form = RouteForm::edit(dash.store.find_route_by_id(1).unwrap());
        form.name = "North loop".into();
        dash.submit_route_form(&form).unwrap();
        let patches = dash.backend().patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].fields.keys().collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(dash.store.find_route_by_id(1).unwrap().name, "North loop");
    }

    #[test]
    fn route_update_merges_server_answer_into_snapshot() {
        let mut dash = board(seeded(), FailurePolicy::Log);
        dash.select_route(1, crate::store::SelectionMeta::new(crate::store::SelectionOrigin::List));
        let mut form = RouteForm::edit(dash.store.find_route_by_id(1).unwrap());
        form.driver_id = Some(5);
        dash.submit_route_form(&form).unwrap();
        assert_eq!(dash.store.find_route_by_id(1).unwrap().driver_id, Some(5));
        assert_eq!(dash.active_route().unwrap().driver_id, Some(5));
        assert_eq!(dash.backend().dataset().routes[0].driver_id, Some(5));
    }

    #[test]
    fn unchanged_form_makes_no_call() {
        let mut dash = board(seeded(), FailurePolicy::Log);
        let form = RouteForm::edit(dash.store.find_route_by_id(1).unwrap());
        dash.submit_route_form(&form).unwrap();
        assert!(dash.backend().patches().is_empty());
    }

    #[test]
    fn order_form_reconciles_drafts_on_submit() {
        let mut dash = board(seeded(), FailurePolicy::Log);
        let order = dash.store.find_order_by_id(10, Some(1)).unwrap().clone();
        let mut form = OrderForm::edit(&order);
        let pallet = Item::unsaved("Pallet");
        form.stage(ItemDraft::create(pallet.clone()));
        let mut renamed = pallet.clone();
        renamed.name = "Euro pallet".into();
        form.stage(ItemDraft::update(renamed));
        assert_eq!(form.drafts.len(), 1);
        assert_eq!(form.drafts[0].action, DraftAction::Create);

        // nothing is applied until submit
        assert_eq!(dash.store.find_order_by_id(10, Some(1)).unwrap().item_count(), 1);

        dash.submit_order_form(&form).unwrap();
        let saved = dash.store.find_order_by_id(10, Some(1)).unwrap();
        assert_eq!(saved.item_count(), 2);
        assert_eq!(saved.delivery_items[1].name, "Euro pallet");
        assert!(saved.delivery_items[1].id.is_some());
        assert_eq!(dash.store.find_route_by_id(1).unwrap().total_items, Some(2));
    }

    #[test]
    fn order_submit_refreshes_active_snapshots() {
        let mut dash = board(seeded(), FailurePolicy::Log);
        dash.select_order(10, crate::store::SelectionMeta::new(crate::store::SelectionOrigin::List));
        let mut form = OrderForm::edit(dash.active_order().unwrap());
        form.client_name = "Acme Logistics".into();
        form.stage(ItemDraft::create(Item::unsaved("Pallet")));
        dash.submit_order_form(&form).unwrap();

        let active = dash.active_order().unwrap();
        assert_eq!(active.client_name, "Acme Logistics");
        assert_eq!(active.item_count(), 2);
        let route = dash.active_route().unwrap();
        assert_eq!(route.delivery_orders[0].client_name, "Acme Logistics");
        assert_eq!(route.total_items, Some(2));
    }

    #[test]
    fn order_create_appends_with_server_id() {
        let mut dash = board(seeded(), FailurePolicy::Log);
        let mut form = OrderForm::create(2);
        form.client_name = "Dahl".into();
        let id = dash.submit_order_form(&form).unwrap();
        let route = dash.store.find_route_by_id(2).unwrap();
        let last = route.delivery_orders.last().unwrap();
        assert_eq!(last.id, id);
        assert_eq!(last.route_id, 2);
        assert_eq!(route.total_orders, Some(route.delivery_orders.len()));
        assert!(matches!(
            dash.backend().calls().last(),
            Some(BackendCall::CreateOrder(name)) if name == "Dahl"
        ));
    }

    #[test]
    fn delete_order_goes_to_backend_first() {
        let mut dash = board(seeded(), FailurePolicy::Log);
        dash.backend_mut().fail_next(ApiError::new(409, "order is out for delivery"));
        assert!(dash.delete_order(10).is_err());
        assert!(dash.store.find_order_by_id(10, None).is_some());
        assert_eq!(dash.notices.latest().unwrap().text, "409: order is out for delivery");

        dash.delete_order(10).unwrap();
        assert!(dash.store.find_order_by_id(10, None).is_none());
        let route = dash.store.find_route_by_id(1).unwrap();
        assert_eq!(route.delivery_orders[0].delivery_arrangement, 0);
        assert_eq!(route.total_orders, Some(1));
    }

    #[test]
    fn deleting_the_selected_order_drops_its_snapshot() {
        let mut dash = board(seeded(), FailurePolicy::Log);
        dash.select_order(10, crate::store::SelectionMeta::new(crate::store::SelectionOrigin::List));
        assert!(dash.active_order().is_some());
        dash.delete_order(10).unwrap();

        assert!(dash.active_order().is_none());
        assert!(dash.cache.get_active_selection(crate::board::ORDER_SELECTION).is_none());
        let route = dash.active_route().unwrap();
        assert_eq!(route.delivery_orders.len(), 1);
        assert_eq!(route.delivery_orders[0].id, 11);
        assert_eq!(route.delivery_orders[0].delivery_arrangement, 0);
        assert_eq!(route.total_orders, Some(1));
    }

    #[test]
    fn delete_route_clears_selection() {
        let mut dash = board(seeded(), FailurePolicy::Log);
        dash.select_route(2, crate::store::SelectionMeta::new(crate::store::SelectionOrigin::List));
        dash.tick();
        dash.delete_route(2).unwrap();
        assert!(dash.store.selected_route().is_none());
        assert!(dash.cache.get_active_selection("route").is_none());
        assert!(!dash.panels.entries().iter().any(|e| matches!(e.payload, Panel::RouteDetail { .. })));
    }
}
