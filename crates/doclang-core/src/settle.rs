#![forbid(unsafe_code)]

//! Coalescing delay between a content mutation and the check it triggers.
//!
//! A single content swap can produce several mutation notifications. The
//! timer arms once for the first of them; later requests before it fires are
//! folded into the pending run, so a burst yields exactly one refresh.
//!
//! # Invariants
//!
//! Every arming gets a fresh [`SettleTicket`]. A host timer that outlives a
//! [`cancel`](SettleTimer::cancel) carries a stale ticket and is refused, so
//! a run armed later never fires before its own delay has passed.

/// Identifies one arming of a [`SettleTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleTicket {
    generation: u64,
    delay_ms: u64,
}

impl SettleTicket {
    /// Delay to arm the host timer with.
    #[must_use]
    pub const fn delay_ms(self) -> u64 {
        self.delay_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    generation: u64,
    deadline_ms: u64,
}

/// One pending deferred refresh at most.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleTimer {
    delay_ms: u64,
    generation: u64,
    pending: Option<Pending>,
    coalesced: u64,
    stale: u64,
}

impl SettleTimer {
    #[must_use]
    pub const fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            generation: 0,
            pending: None,
            coalesced: 0,
            stale: 0,
        }
    }

    #[must_use]
    pub const fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn deadline_ms(&self) -> Option<u64> {
        self.pending.map(|pending| pending.deadline_ms)
    }

    /// Requests folded into an already pending run since creation.
    #[must_use]
    pub const fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// Host timers refused because their arming was cancelled or replaced.
    #[must_use]
    pub const fn stale(&self) -> u64 {
        self.stale
    }

    /// Ask for a refresh. Returns the ticket to arm a host timer with, or
    /// `None` when a run is already pending.
    pub fn request(&mut self, now_ms: u64) -> Option<SettleTicket> {
        if self.pending.is_some() {
            self.coalesced = self.coalesced.saturating_add(1);
            return None;
        }
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some(Pending {
            generation: self.generation,
            deadline_ms: now_ms.saturating_add(self.delay_ms),
        });
        Some(SettleTicket {
            generation: self.generation,
            delay_ms: self.delay_ms,
        })
    }

    /// The host timer armed with `ticket` fired. Returns whether that arming
    /// is still the pending one and the refresh should proceed.
    pub fn fire(&mut self, ticket: SettleTicket) -> bool {
        match self.pending {
            Some(pending) if pending.generation == ticket.generation => {
                self.pending = None;
                true
            }
            _ => {
                self.stale = self.stale.saturating_add(1);
                false
            }
        }
    }

    /// Drop the pending run, e.g. because a refresh already happened.
    /// Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }
}
