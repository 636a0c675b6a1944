use serde_json::Value;
use tracing::debug;

pub type PanelId = u64;

/// A request to push a panel onto the stack
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest<P> {
    pub key: String,
    pub payload: P,
    /// Extra parameters handed down from the panel that opened this one
    pub parent_params: Option<Value>,
}

impl<P> OpenRequest<P> {
    pub fn new(key: impl Into<String>, payload: P) -> Self {
        OpenRequest {
            key: key.into(),
            payload,
            parent_params: None,
        }
    }

    pub fn with_parent_params(mut self, params: Value) -> Self {
        self.parent_params = Some(params);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelEntry<P> {
    pub id: PanelId,
    pub key: String,
    pub payload: P,
    pub parent_params: Option<Value>,
}

/// Stack of open side panels.
///
/// `reopen` closes any panel with the same key and, if something was
/// closed, defers the new open to the next `tick` so the close settles
/// first.
#[derive(Debug, Clone)]
pub struct ViewStack<P> {
    entries: Vec<PanelEntry<P>>,
    deferred: Vec<OpenRequest<P>>,
    next_id: PanelId,
}

impl<P> Default for ViewStack<P> {
    fn default() -> Self {
        ViewStack {
            entries: Vec::new(),
            deferred: Vec::new(),
            next_id: 1,
        }
    }
}

impl<P> ViewStack<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, request: OpenRequest<P>) -> PanelId {
        let id = self.next_id;
        self.next_id += 1;
        debug!(id, key = %request.key, "open panel");
        self.entries.push(PanelEntry {
            id,
            key: request.key,
            payload: request.payload,
            parent_params: request.parent_params,
        });
        id
    }

    pub fn close(&mut self, id: PanelId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Close every panel whose key is listed. True if any closed.
    pub fn close_by_key(&mut self, keys: &[&str]) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !keys.contains(&e.key.as_str()));
        self.entries.len() != before
    }

    /// Close the topmost panel
    pub fn pop(&mut self) -> Option<PanelEntry<P>> {
        self.entries.pop()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn find_by_key(&self, key: &str) -> Option<&PanelEntry<P>> {
        self.entries.iter().rev().find(|e| e.key == key)
    }

    pub fn find_by_key_mut(&mut self, key: &str) -> Option<&mut PanelEntry<P>> {
        self.entries.iter_mut().rev().find(|e| e.key == key)
    }

    pub fn top(&self) -> Option<&PanelEntry<P>> {
        self.entries.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut PanelEntry<P>> {
        self.entries.last_mut()
    }

    pub fn entries(&self) -> &[PanelEntry<P>] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Replace any panel with the same key. Returns the new id when the
    /// open happened now, `None` when it was deferred to the next tick.
    pub fn reopen(&mut self, request: OpenRequest<P>) -> Option<PanelId> {
        let key = request.key.clone();
        if self.close_by_key(&[key.as_str()]) {
            debug!(key = %key, "panel closed; deferring reopen");
            self.deferred.retain(|r| r.key != key);
            self.deferred.push(request);
            None
        } else {
            Some(self.open(request))
        }
    }

    /// Run deferred opens. Returns the ids of panels opened.
    pub fn tick(&mut self) -> Vec<PanelId> {
        let deferred = std::mem::take(&mut self.deferred);
        deferred.into_iter().map(|r| self.open(r)).collect()
    }
}
