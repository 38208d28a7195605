//! Supersede-not-queue ordering for refresh cycles.
//!
//! Every refresh takes a [`PollTicket`] when it starts. Only the holder of the
//! most recently issued ticket may publish its result, so a slow cycle that
//! finishes after a newer one started is discarded instead of overwriting
//! newer state.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PollTicket(u64);

impl PollTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct PollGate {
    latest: AtomicU64,
}

impl PollGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new cycle, superseding every earlier ticket.
    pub fn begin(&self) -> PollTicket {
        PollTicket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: PollTicket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_ticket_wins() {
        let gate = PollGate::new();
        let first = gate.begin();
        assert!(gate.is_current(first));

        let second = gate.begin();
        assert!(!gate.is_current(first));
        assert!(gate.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn test_generations_increase() {
        let gate = PollGate::new();
        let tickets: Vec<_> = (0..5).map(|_| gate.begin().generation()).collect();
        assert_eq!(tickets, vec![1, 2, 3, 4, 5]);
    }
}
