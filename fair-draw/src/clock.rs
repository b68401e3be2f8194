//! Scheduling primitives shared by every engine driver.
//!
//! The engine never sleeps. Each transition that needs time to pass returns a
//! [`Wakeup`]: "call [`DrawEngine::tick`] with this ticket after `delay`". A
//! driver keeps at most one wakeup at a time. Tickets make late callbacks
//! harmless: once a wakeup is superseded or the batch is cancelled, its ticket
//! no longer matches and the tick is ignored.
//!
//! [`ManualClock`] is a driver on virtual time, for tests and simulations. The
//! tokio driver lives in [`crate::runtime`].

use std::time::Duration;

use rand::Rng;

use crate::engine::DrawEngine;
use crate::events::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub(crate) u64);

/// A request to tick the engine once `delay` has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wakeup {
    pub delay: Duration,
    pub ticket: Ticket,
}

/// Drives an engine on virtual time. Nothing actually sleeps.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Duration,
    pending: Option<(Duration, Wakeup)>,
    fired: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since the clock was created.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> Option<Wakeup> {
        self.pending.map(|(_, wakeup)| wakeup)
    }

    /// Delays of every wakeup fired so far, in order.
    pub fn fired_delays(&self) -> &[Duration] {
        &self.fired
    }

    /// Replaces the pending wakeup with whatever a transition returned.
    pub fn schedule(&mut self, wakeup: Option<Wakeup>) {
        self.pending = wakeup.map(|wakeup| (self.now + wakeup.delay, wakeup));
    }

    /// Jumps to the pending wakeup and fires it. Returns whether a tick happened.
    pub fn step<S: EventSink, R: Rng>(&mut self, engine: &mut DrawEngine<S, R>) -> bool {
        let Some((due, wakeup)) = self.pending.take() else {
            return false;
        };
        self.now = self.now.max(due);
        self.fired.push(wakeup.delay);
        let next = engine.tick(wakeup.ticket);
        self.schedule(next);
        true
    }

    /// Fires wakeups until nothing is pending. Returns the number of ticks.
    pub fn run_until_idle<S: EventSink, R: Rng>(&mut self, engine: &mut DrawEngine<S, R>) -> usize {
        let mut ticks = 0;
        while self.step(engine) {
            ticks += 1;
        }
        ticks
    }

    /// Fires every wakeup that falls due within `span` of virtual time.
    pub fn advance<S: EventSink, R: Rng>(&mut self, span: Duration, engine: &mut DrawEngine<S, R>) {
        let deadline = self.now + span;
        while matches!(self.pending, Some((due, _)) if due <= deadline) {
            self.step(engine);
        }
        self.now = deadline;
    }
}
