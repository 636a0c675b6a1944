//! Background writes started by drag flows.
//!
//! Enqueuing a patch models the request going out; `resolve`/`flush`
//! model responses arriving, in whatever order the caller chooses. A
//! successful response is merged into the store as it is *now*, never into
//! the snapshot taken when the request started.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::model::FailurePolicy;
use crate::store::{NormalizedStore, Rollback};
use crate::sync::{merge_fields, ApiError, Backend, EntityKind, Partial, PatchRequest};

pub type Ticket = u64;

/// Which flow started a background write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Reorder,
    Transfer,
    RouteDate,
    Plan,
}

impl FlowKind {
    pub fn label(self) -> &'static str {
        match self {
            FlowKind::Reorder => "reorder",
            FlowKind::Transfer => "transfer",
            FlowKind::RouteDate => "route date",
            FlowKind::Plan => "route plan",
        }
    }
}

#[derive(Debug)]
struct InFlight {
    kind: FlowKind,
    patch: PatchRequest,
    rollback: Option<Rollback>,
}

/// A background write that failed and was kept (log policy)
#[derive(Debug, Clone, PartialEq)]
pub struct FailedSync {
    pub ticket: Ticket,
    pub kind: FlowKind,
    pub patch: PatchRequest,
    pub error: ApiError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Confirmed {
        ticket: Ticket,
        kind: FlowKind,
    },
    Failed {
        ticket: Ticket,
        kind: FlowKind,
        error: ApiError,
        rolled_back: bool,
    },
}

impl SyncOutcome {
    pub fn ticket(&self) -> Ticket {
        match self {
            SyncOutcome::Confirmed { ticket, .. } | SyncOutcome::Failed { ticket, .. } => *ticket,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SyncOutcome::Failed { .. })
    }
}

#[derive(Debug, Default)]
pub struct SyncQueue {
    policy: FailurePolicy,
    in_flight: IndexMap<Ticket, InFlight>,
    failed: Vec<FailedSync>,
    next_ticket: Ticket,
}

impl SyncQueue {
    pub fn new(policy: FailurePolicy) -> Self {
        SyncQueue {
            policy,
            in_flight: IndexMap::new(),
            failed: Vec::new(),
            next_ticket: 1,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: FailurePolicy) {
        self.policy = policy;
    }

    /// Start a background write. `rollback` is applied if the write fails
    /// and the policy (or the flow) asks for it.
    pub fn enqueue(&mut self, kind: FlowKind, patch: PatchRequest, rollback: Option<Rollback>) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        debug!(ticket, kind = kind.label(), id = patch.id, "sync enqueued");
        self.in_flight.insert(
            ticket,
            InFlight {
                kind,
                patch,
                rollback,
            },
        );
        ticket
    }

    pub fn pending(&self) -> impl Iterator<Item = Ticket> + '_ {
        self.in_flight.keys().copied()
    }

    pub fn pending_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn failed(&self) -> &[FailedSync] {
        &self.failed
    }

    /// Deliver the response for one request. `None` for unknown tickets.
    pub fn resolve<B: Backend>(
        &mut self,
        ticket: Ticket,
        backend: &mut B,
        store: &mut NormalizedStore,
    ) -> Option<SyncOutcome> {
        let job = self.in_flight.shift_remove(&ticket)?;
        Some(self.complete(ticket, job, backend, store))
    }

    /// Deliver every pending response in request order
    pub fn flush<B: Backend>(&mut self, backend: &mut B, store: &mut NormalizedStore) -> Vec<SyncOutcome> {
        let jobs: Vec<(Ticket, InFlight)> = self.in_flight.drain(..).collect();
        jobs.into_iter()
            .map(|(ticket, job)| self.complete(ticket, job, backend, store))
            .collect()
    }

    /// Send every kept failure again. Retries never roll back.
    pub fn retry_failed<B: Backend>(
        &mut self,
        backend: &mut B,
        store: &mut NormalizedStore,
    ) -> Vec<SyncOutcome> {
        let failed = std::mem::take(&mut self.failed);
        failed
            .into_iter()
            .map(|f| {
                let ticket = self.enqueue(f.kind, f.patch, None);
                self.resolve(ticket, backend, store).unwrap_or(SyncOutcome::Confirmed {
                    ticket,
                    kind: f.kind,
                })
            })
            .collect()
    }

    fn complete<B: Backend>(
        &mut self,
        ticket: Ticket,
        job: InFlight,
        backend: &mut B,
        store: &mut NormalizedStore,
    ) -> SyncOutcome {
        match backend.send_patch(&job.patch) {
            Ok(partial) => {
                if let Some(partial) = partial {
                    merge_partial(store, &job.patch, &partial);
                }
                debug!(ticket, kind = job.kind.label(), "sync confirmed");
                SyncOutcome::Confirmed {
                    ticket,
                    kind: job.kind,
                }
            }
            Err(error) => {
                let must_roll_back =
                    job.kind == FlowKind::RouteDate || self.policy == FailurePolicy::Rollback;
                let rolled_back = match job.rollback {
                    Some(rollback) if must_roll_back => rollback.restore(store),
                    _ => false,
                };
                if rolled_back {
                    warn!(ticket, kind = job.kind.label(), %error, "sync failed; rolled back");
                } else {
                    if must_roll_back {
                        warn!(ticket, kind = job.kind.label(), %error, "sync failed; newer writes kept, rollback skipped");
                    } else {
                        warn!(ticket, kind = job.kind.label(), %error, "sync failed; keeping local change");
                    }
                    self.failed.push(FailedSync {
                        ticket,
                        kind: job.kind,
                        patch: job.patch,
                        error: error.clone(),
                    });
                }
                SyncOutcome::Failed {
                    ticket,
                    kind: job.kind,
                    error,
                    rolled_back,
                }
            }
        }
    }
}

/// Merge a response into the current store. Position fields stay as the
/// local ordering has them.
pub fn merge_partial(store: &mut NormalizedStore, patch: &PatchRequest, partial: &Partial) {
    match patch.entity {
        EntityKind::Order => {
            let Some(route_id) = store.route_id_of_order(patch.id) else {
                debug!(order_id = patch.id, "order gone before response; dropping partial");
                return;
            };
            store.update_order_in_route(route_id, patch.id, |order| {
                merge_fields(order, partial, &["id", "route_id", "delivery_arrangement"]);
            });
        }
        EntityKind::Route => {
            store.update_route(patch.id, |route| {
                merge_fields(
                    route,
                    partial,
                    &["id", "delivery_orders", "total_orders", "total_items"],
                );
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dataset, Order, Route};
    use crate::sync::MemoryBackend;

    fn routes() -> Vec<Route> {
        let mut r = Route::new(1, "North");
        r.delivery_orders.push(Order::new(10, 1, "A"));
        r.delivery_orders.push(Order::new(11, 1, "B"));
        r.delivery_orders[1].delivery_arrangement = 1;
        r.recount();
        vec![r, Route::new(2, "South")]
    }

    fn setup(policy: FailurePolicy) -> (SyncQueue, MemoryBackend, NormalizedStore) {
        let backend = MemoryBackend::new(Dataset {
            routes: routes(),
            ..Default::default()
        });
        (SyncQueue::new(policy), backend, NormalizedStore::with_routes(routes()))
    }

    #[test]
    fn responses_merge_into_current_state() {
        let (mut queue, mut backend, mut store) = setup(FailurePolicy::Log);
        let t1 = queue.enqueue(FlowKind::Reorder, PatchRequest::order(10).with("notes", "gate"), None);
        // Local edit after the request went out
        store.update_route(2, |r| r.name = "South (renamed)".into());
        let outcome = queue.resolve(t1, &mut backend, &mut store).unwrap();
        assert_eq!(outcome, SyncOutcome::Confirmed { ticket: t1, kind: FlowKind::Reorder });
        let order = store.find_order_by_id(10, None).unwrap();
        assert_eq!(order.notes.as_deref(), Some("gate"));
        assert_eq!(store.find_route_by_id(2).unwrap().name, "South (renamed)");
    }

    #[test]
    fn out_of_order_resolution() {
        let (mut queue, mut backend, mut store) = setup(FailurePolicy::Log);
        let t1 = queue.enqueue(FlowKind::Reorder, PatchRequest::order(10).with("notes", "one"), None);
        let t2 = queue.enqueue(FlowKind::Reorder, PatchRequest::order(11).with("notes", "two"), None);
        assert_eq!(queue.pending().collect::<Vec<_>>(), vec![t1, t2]);
        queue.resolve(t2, &mut backend, &mut store).unwrap();
        queue.resolve(t1, &mut backend, &mut store).unwrap();
        assert!(queue.is_idle());
        assert_eq!(store.find_order_by_id(11, None).unwrap().notes.as_deref(), Some("two"));
        assert_eq!(store.find_order_by_id(10, None).unwrap().notes.as_deref(), Some("one"));
        assert!(queue.resolve(t1, &mut backend, &mut store).is_none());
    }

    #[test]
    fn log_policy_keeps_change_and_records_failure() {
        let (mut queue, mut backend, mut store) = setup(FailurePolicy::Log);
        let rollback = store.optimistic_update_route(1, |r| r.name = "Optimistic".into());
        queue.enqueue(FlowKind::Reorder, PatchRequest::route(1).with("name", "Optimistic"), Some(rollback));
        backend.fail_next(ApiError::unavailable("offline"));
        let outcomes = queue.flush(&mut backend, &mut store);
        assert!(matches!(
            outcomes[0],
            SyncOutcome::Failed { rolled_back: false, .. }
        ));
        assert_eq!(store.find_route_by_id(1).unwrap().name, "Optimistic");
        assert_eq!(queue.failed().len(), 1);

        let retried = queue.retry_failed(&mut backend, &mut store);
        assert!(!retried[0].is_failure());
        assert!(queue.failed().is_empty());
        assert_eq!(backend.dataset().routes[0].name, "Optimistic");
    }

    #[test]
    fn rollback_policy_restores_snapshot() {
        let (mut queue, mut backend, mut store) = setup(FailurePolicy::Rollback);
        let before = store.routes().to_vec();
        let rollback = store.optimistic_update_route(1, |r| r.name = "Optimistic".into());
        queue.enqueue(FlowKind::Transfer, PatchRequest::route(1).with("name", "Optimistic"), Some(rollback));
        backend.fail_next(ApiError::new(409, "conflict"));
        let outcomes = queue.flush(&mut backend, &mut store);
        assert!(matches!(outcomes[0], SyncOutcome::Failed { rolled_back: true, .. }));
        assert_eq!(store.routes(), &before[..]);
        assert!(queue.failed().is_empty());
    }

    #[test]
    fn route_date_always_rolls_back() {
        let (mut queue, mut backend, mut store) = setup(FailurePolicy::Log);
        let before = store.routes().to_vec();
        let rollback = store.optimistic_update_route(2, |r| {
            r.delivery_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        });
        queue.enqueue(
            FlowKind::RouteDate,
            PatchRequest::route(2).with("delivery_date", "2024-01-02"),
            Some(rollback),
        );
        backend.go_down(ApiError::unavailable("down"));
        queue.flush(&mut backend, &mut store);
        assert_eq!(store.routes(), &before[..]);
    }

    #[test]
    fn partial_for_vanished_order_is_dropped() {
        let (mut queue, mut backend, mut store) = setup(FailurePolicy::Log);
        let t = queue.enqueue(FlowKind::Reorder, PatchRequest::order(10).with("notes", "x"), None);
        store.remove_order_from_route(1, 10);
        let outcome = queue.resolve(t, &mut backend, &mut store).unwrap();
        assert!(!outcome.is_failure());
        assert!(store.find_order_by_id(10, None).is_none());
    }
}
