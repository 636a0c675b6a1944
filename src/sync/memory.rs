use std::collections::VecDeque;

use crate::model::{Dataset, Order, OrderId, Route, RouteId};
use crate::sync::{server, ApiError, Backend, PatchRequest, Partial};

/// A call the backend received
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Fetch,
    CreateRoute(String),
    UpdateRoute(PatchRequest),
    DeleteRoute(RouteId),
    CreateOrder(String),
    UpdateOrder(PatchRequest),
    DeleteOrder(OrderId),
}

/// In-process backend over a dataset value. Records every call and can be
/// told to fail, which makes it the backend of choice for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    dataset: Dataset,
    calls: Vec<BackendCall>,
    queued_failures: VecDeque<ApiError>,
    outage: Option<ApiError>,
}

impl MemoryBackend {
    pub fn new(dataset: Dataset) -> Self {
        MemoryBackend {
            dataset,
            ..Default::default()
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Update patches received, in arrival order
    pub fn patches(&self) -> Vec<&PatchRequest> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::UpdateRoute(p) | BackendCall::UpdateOrder(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Fail the next call with `error`. Queued failures are used in order.
    pub fn fail_next(&mut self, error: ApiError) {
        self.queued_failures.push_back(error);
    }

    /// Fail every call until [`recover`](Self::recover)
    pub fn go_down(&mut self, error: ApiError) {
        self.outage = Some(error);
    }

    pub fn recover(&mut self) {
        self.outage = None;
    }

    fn record(&mut self, call: BackendCall) -> Result<(), ApiError> {
        self.calls.push(call);
        if let Some(err) = &self.outage {
            return Err(err.clone());
        }
        match self.queued_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Backend for MemoryBackend {
    fn fetch_dataset(&mut self) -> Result<Dataset, ApiError> {
        self.record(BackendCall::Fetch)?;
        Ok(self.dataset.clone())
    }

    fn create_route(&mut self, route: &Route) -> Result<Route, ApiError> {
        self.record(BackendCall::CreateRoute(route.name.clone()))?;
        server::create_route(&mut self.dataset, route)
    }

    fn update_route(&mut self, patch: &PatchRequest) -> Result<Option<Partial>, ApiError> {
        self.record(BackendCall::UpdateRoute(patch.clone()))?;
        server::update_route(&mut self.dataset, patch).map(Some)
    }

    fn delete_route(&mut self, id: RouteId) -> Result<(), ApiError> {
        self.record(BackendCall::DeleteRoute(id))?;
        server::delete_route(&mut self.dataset, id)
    }

    fn create_order(&mut self, order: &Order) -> Result<Order, ApiError> {
        self.record(BackendCall::CreateOrder(order.client_name.clone()))?;
        server::create_order(&mut self.dataset, order)
    }

    fn update_order(&mut self, patch: &PatchRequest) -> Result<Option<Partial>, ApiError> {
        self.record(BackendCall::UpdateOrder(patch.clone()))?;
        server::update_order(&mut self.dataset, patch).map(Some)
    }

    fn delete_order(&mut self, id: OrderId) -> Result<(), ApiError> {
        self.record(BackendCall::DeleteOrder(id))?;
        server::delete_order(&mut self.dataset, id)
    }
}
