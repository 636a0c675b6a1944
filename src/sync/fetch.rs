/// Identifies one fetch; only the latest one may apply its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

/// Generation counter that discards results of superseded fetches.
///
/// The request itself is never aborted, only its result ignored.
#[derive(Debug, Clone, Default)]
pub struct FetchGuard {
    generation: u64,
}

impl FetchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fetch, superseding any in flight
    pub fn begin(&mut self) -> FetchTicket {
        self.generation += 1;
        FetchTicket {
            generation: self.generation,
        }
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Invalidate every outstanding ticket (the view went away)
    pub fn cancel(&mut self) {
        self.generation += 1;
    }
}
