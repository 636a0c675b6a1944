//! Drag-to-reorder for one route's order list.
//!
//! The engine only tracks ids and pointer geometry. It does not touch the
//! store: a finished drop yields a [`DropOutcome`] that the host applies
//! (see `ops::arrangement::apply_reorder` and `ops::transfer`).

use serde::Serialize;
use tracing::debug;

use crate::model::{OrderId, RouteId};
use crate::ops::transfer::TransferRequest;
use crate::view::{DataTransfer, DragPayload, OrderTransfer};

/// Error type for applying a reorder
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error("route not found: {0}")]
    RouteNotFound(RouteId),
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),
    #[error("new order for route {0} does not match its orders")]
    OrderMismatch(RouteId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPosition {
    Before,
    After,
}

/// Where the dragged card would land if dropped now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropIndicator {
    pub target_id: OrderId,
    pub position: DropPosition,
}

/// Vertical extent of a card on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardBounds {
    pub top: f64,
    pub height: f64,
}

impl CardBounds {
    pub fn new(top: f64, height: f64) -> Self {
        CardBounds { top, height }
    }

    /// Top half means before, bottom half means after
    pub fn position_of(&self, pointer_y: f64) -> DropPosition {
        if pointer_y < self.top + self.height / 2.0 {
            DropPosition::Before
        } else {
            DropPosition::After
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging { order_id: OrderId },
}

/// The new order of a route after a drop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorderOutcome {
    pub order_ids: Vec<OrderId>,
    pub moved_order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Reorder(ReorderOutcome),
    /// An order from another route was dropped on this list
    Transfer(TransferRequest),
    Ignored,
}

#[derive(Debug, Clone)]
pub struct DragReorderEngine {
    route_id: RouteId,
    orders: Vec<OrderId>,
    phase: DragPhase,
    indicator: Option<DropIndicator>,
    /// Input that arrived mid-drag, applied once the drag is over
    pending_input: Option<Vec<OrderId>>,
}

impl DragReorderEngine {
    pub fn new(route_id: RouteId, orders: Vec<OrderId>) -> Self {
        DragReorderEngine {
            route_id,
            orders,
            phase: DragPhase::Idle,
            indicator: None,
            pending_input: None,
        }
    }

    pub fn route_id(&self) -> RouteId {
        self.route_id
    }

    pub fn orders(&self) -> &[OrderId] {
        &self.orders
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn indicator(&self) -> Option<DropIndicator> {
        self.indicator
    }

    pub fn dragging_id(&self) -> Option<OrderId> {
        match self.phase {
            DragPhase::Dragging { order_id } => Some(order_id),
            DragPhase::Idle => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging_id().is_some()
    }

    /// Reconcile with the authoritative order list. Identical input is
    /// ignored; during a drag the input is held until the drag ends.
    /// Returns true if the local list was replaced.
    pub fn sync_input(&mut self, input: &[OrderId]) -> bool {
        if self.is_dragging() {
            if input != self.orders.as_slice() {
                self.pending_input = Some(input.to_vec());
            }
            return false;
        }
        if input == self.orders.as_slice() {
            return false;
        }
        self.orders = input.to_vec();
        true
    }

    // -----------------------------------------------------------------------
    // Drag lifecycle
    // -----------------------------------------------------------------------

    /// Begin dragging `order_id` and describe it on `transfer` for drop
    /// targets outside this list. False if the order is not in the list.
    pub fn handle_drag_start(&mut self, order_id: OrderId, transfer: &mut DataTransfer) -> bool {
        if !self.orders.contains(&order_id) {
            return false;
        }
        self.phase = DragPhase::Dragging { order_id };
        self.indicator = None;
        transfer.set_payload(DragPayload::Order(OrderTransfer {
            order_id,
            route_id: self.route_id,
        }));
        debug!(order_id, route_id = self.route_id, "drag start");
        true
    }

    pub fn handle_drag_over_card(
        &mut self,
        target_id: OrderId,
        pointer_y: f64,
        bounds: CardBounds,
    ) -> Option<DropIndicator> {
        let dragged = self.dragging_id()?;
        if dragged == target_id || !self.orders.contains(&target_id) {
            self.indicator = None;
            return None;
        }
        self.indicator = Some(DropIndicator {
            target_id,
            position: bounds.position_of(pointer_y),
        });
        self.indicator
    }

    /// Drop on a card, on the side the indicator last showed for it
    /// (before, if the indicator was elsewhere)
    pub fn handle_drop_on_card(&mut self, target_id: OrderId) -> DropOutcome {
        let Some(dragged) = self.dragging_id() else {
            return DropOutcome::Ignored;
        };
        let position = match self.indicator {
            Some(ind) if ind.target_id == target_id => ind.position,
            _ => DropPosition::Before,
        };
        let outcome = if dragged == target_id {
            DropOutcome::Ignored
        } else {
            self.commit(dragged, Some((target_id, position)))
        };
        self.finish_drop();
        outcome
    }

    pub fn handle_drop_at_end(&mut self) -> DropOutcome {
        let Some(dragged) = self.dragging_id() else {
            return DropOutcome::Ignored;
        };
        let outcome = self.commit(dragged, None);
        self.finish_drop();
        outcome
    }

    /// Drop on the list itself. An order coming from another route becomes
    /// a transfer; one of ours moves to the end.
    pub fn handle_list_drop(&mut self, transfer: &DataTransfer) -> DropOutcome {
        let Some(payload) = transfer.order_payload() else {
            return self.handle_drop_at_end();
        };
        if payload.route_id != self.route_id {
            self.finish_drop();
            return DropOutcome::Transfer(TransferRequest::new(
                payload.order_id,
                payload.route_id,
                self.route_id,
            ));
        }
        let outcome = self.commit(payload.order_id, None);
        self.finish_drop();
        outcome
    }

    /// Cancel the drag. Input held back during the drag is applied now.
    pub fn handle_drag_end(&mut self) {
        self.phase = DragPhase::Idle;
        self.indicator = None;
        if let Some(input) = self.pending_input.take() {
            self.orders = input;
        }
    }

    fn finish_drop(&mut self) {
        self.phase = DragPhase::Idle;
        self.indicator = None;
        // The host re-syncs after applying the drop
        self.pending_input = None;
    }

    fn commit(&mut self, moved: OrderId, target: Option<(OrderId, DropPosition)>) -> DropOutcome {
        match move_order(&self.orders, moved, target) {
            Some(order_ids) if order_ids != self.orders => {
                self.orders = order_ids.clone();
                DropOutcome::Reorder(ReorderOutcome {
                    order_ids,
                    moved_order_id: moved,
                })
            }
            _ => DropOutcome::Ignored,
        }
    }
}

/// Remove `moved` and reinsert it next to `target` (or at the end),
/// adjusting the insertion index for the removal shift
pub fn move_order(
    orders: &[OrderId],
    moved: OrderId,
    target: Option<(OrderId, DropPosition)>,
) -> Option<Vec<OrderId>> {
    let from = orders.iter().position(|&id| id == moved)?;
    let mut next = orders.to_vec();
    next.remove(from);
    let insert_at = match target {
        None => next.len(),
        Some((target_id, position)) => {
            let to = orders.iter().position(|&id| id == target_id)?;
            let mut idx = match position {
                DropPosition::Before => to,
                DropPosition::After => to + 1,
            };
            if from < idx {
                idx -= 1;
            }
            idx.min(next.len())
        }
    };
    next.insert(insert_at, moved);
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ORDER_TRANSFER;
    use pretty_assertions::assert_eq;

    const A: OrderId = 1;
    const B: OrderId = 2;
    const C: OrderId = 3;

    fn engine() -> DragReorderEngine {
        DragReorderEngine::new(7, vec![A, B, C])
    }

    fn start(engine: &mut DragReorderEngine, id: OrderId) -> DataTransfer {
        let mut dt = DataTransfer::new();
        assert!(engine.handle_drag_start(id, &mut dt));
        dt
    }

    #[test]
    fn drag_start_writes_payload() {
        let mut e = engine();
        let dt = start(&mut e, B);
        assert_eq!(e.phase(), DragPhase::Dragging { order_id: B });
        assert!(dt.has_type(ORDER_TRANSFER));
        assert_eq!(
            dt.order_payload(),
            Some(OrderTransfer {
                order_id: B,
                route_id: 7
            })
        );
    }

    #[test]
    fn drag_start_unknown_order_is_rejected() {
        let mut e = engine();
        let mut dt = DataTransfer::new();
        assert!(!e.handle_drag_start(99, &mut dt));
        assert!(!e.is_dragging());
        assert!(dt.types().next().is_none());
    }

    #[test]
    fn pointer_half_decides_side() {
        let mut e = engine();
        start(&mut e, A);
        let bounds = CardBounds::new(100.0, 40.0);
        let ind = e.handle_drag_over_card(C, 110.0, bounds).unwrap();
        assert_eq!(ind.position, DropPosition::Before);
        let ind = e.handle_drag_over_card(C, 130.0, bounds).unwrap();
        assert_eq!(ind.position, DropPosition::After);
    }

    #[test]
    fn hovering_dragged_card_clears_indicator() {
        let mut e = engine();
        start(&mut e, A);
        e.handle_drag_over_card(B, 0.0, CardBounds::new(0.0, 10.0));
        assert!(e.indicator().is_some());
        assert!(e.handle_drag_over_card(A, 0.0, CardBounds::new(0.0, 10.0)).is_none());
        assert!(e.indicator().is_none());
    }

    #[test]
    fn drag_over_without_drag_is_noop() {
        let mut e = engine();
        assert!(e.handle_drag_over_card(B, 0.0, CardBounds::new(0.0, 10.0)).is_none());
    }

    #[test]
    fn c_before_a() {
        let mut e = engine();
        start(&mut e, C);
        e.handle_drag_over_card(A, 1.0, CardBounds::new(0.0, 10.0));
        let outcome = e.handle_drop_on_card(A);
        assert_eq!(
            outcome,
            DropOutcome::Reorder(ReorderOutcome {
                order_ids: vec![C, A, B],
                moved_order_id: C
            })
        );
        assert_eq!(e.orders(), &[C, A, B]);
        assert!(!e.is_dragging());
    }

    #[test]
    fn a_after_c_accounts_for_removal_shift() {
        let mut e = engine();
        start(&mut e, A);
        e.handle_drag_over_card(C, 9.0, CardBounds::new(0.0, 10.0));
        match e.handle_drop_on_card(C) {
            DropOutcome::Reorder(r) => assert_eq!(r.order_ids, vec![B, C, A]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn a_before_c_lands_between() {
        assert_eq!(
            move_order(&[A, B, C], A, Some((C, DropPosition::Before))),
            Some(vec![B, A, C])
        );
        assert_eq!(
            move_order(&[A, B, C], C, Some((A, DropPosition::After))),
            Some(vec![A, C, B])
        );
        assert_eq!(move_order(&[A, B, C], 9, None), None);
    }

    #[test]
    fn drop_at_end() {
        let mut e = engine();
        start(&mut e, A);
        match e.handle_drop_at_end() {
            DropOutcome::Reorder(r) => assert_eq!(r.order_ids, vec![B, C, A]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn drop_in_place_is_ignored() {
        let mut e = engine();
        start(&mut e, C);
        assert_eq!(e.handle_drop_at_end(), DropOutcome::Ignored);
        start(&mut e, B);
        assert_eq!(e.handle_drop_on_card(B), DropOutcome::Ignored);
        assert_eq!(e.orders(), &[A, B, C]);
    }

    #[test]
    fn drop_without_drag_is_ignored() {
        let mut e = engine();
        assert_eq!(e.handle_drop_on_card(A), DropOutcome::Ignored);
        assert_eq!(e.handle_drop_at_end(), DropOutcome::Ignored);
    }

    #[test]
    fn list_drop_from_other_route_is_transfer() {
        let mut other = DragReorderEngine::new(8, vec![40, 41]);
        let dt = start(&mut other, 41);
        let mut e = engine();
        assert_eq!(
            e.handle_list_drop(&dt),
            DropOutcome::Transfer(TransferRequest::new(41, 8, 7))
        );
        assert_eq!(e.orders(), &[A, B, C]);
    }

    #[test]
    fn list_drop_from_same_route_moves_to_end() {
        let mut e = engine();
        let dt = start(&mut e, B);
        match e.handle_list_drop(&dt) {
            DropOutcome::Reorder(r) => assert_eq!(r.order_ids, vec![A, C, B]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn list_drop_with_garbage_payload_falls_back() {
        let mut e = engine();
        let mut dt = DataTransfer::new();
        dt.set_data(ORDER_TRANSFER, "not json");
        assert_eq!(e.handle_list_drop(&dt), DropOutcome::Ignored);
    }

    #[test]
    fn sync_input_replaces_when_idle() {
        let mut e = engine();
        assert!(!e.sync_input(&[A, B, C]));
        assert!(e.sync_input(&[B, A]));
        assert_eq!(e.orders(), &[B, A]);
    }

    #[test]
    fn sync_input_deferred_during_drag() {
        let mut e = engine();
        start(&mut e, A);
        assert!(!e.sync_input(&[A, B, C, 4]));
        assert_eq!(e.orders(), &[A, B, C]);
        e.handle_drag_end();
        assert_eq!(e.orders(), &[A, B, C, 4]);
        assert_eq!(e.phase(), DragPhase::Idle);
    }
}
