// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Buffered mobility notifications
//!
//! Relocation steps run on whatever thread the node scheduled them on, while
//! the unit consumes notifications on its own cycle. The [`EventBuffer`]
//! sits between the two: steps `record`, the consumer `deliver`s.
//!
//! # Locking
//!
//! The queue has its own mutex, held only to push or to take the whole
//! queue. Deliveries are serialized by a second lock held for the
//! drain-and-replay, so a second `deliver` from another thread waits for
//! the first to finish. A `deliver` made by a listener from inside a replay
//! drains nothing and returns 0; whatever it would have replayed stays
//! queued behind the events still being replayed.

use crate::domain::errors::MobilityError;
use crate::domain::events::{MobilityEvent, MobilityEventKind, MobilityListener};
use crate::domain::ticket::Ticket;
use crate::domain::unit::UnitId;
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::Cell;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventBufferError {
    #[error("Event buffer owner address cannot be empty")]
    MissingOwner,
}

pub struct EventBuffer {
    owner: UnitId,
    queue: Mutex<Vec<MobilityEvent>>,
    /// Held for a whole delivery; the flag marks a replay in progress on
    /// the holding thread.
    delivery: ReentrantMutex<Cell<bool>>,
}

/// Clears the replay flag when the delivery ends, even by unwinding.
struct Replaying<'a>(&'a Cell<bool>);

impl Drop for Replaying<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl EventBuffer {
    pub fn new(owner: UnitId) -> Result<Self, EventBufferError> {
        if owner.is_empty() {
            return Err(EventBufferError::MissingOwner);
        }
        Ok(Self {
            owner,
            queue: Mutex::new(Vec::new()),
            delivery: ReentrantMutex::new(Cell::new(false)),
        })
    }

    pub fn owner(&self) -> &UnitId {
        &self.owner
    }

    pub fn record(&self, kind: MobilityEventKind, ticket: Ticket, cause: Option<MobilityError>) {
        self.push(MobilityEvent::new(kind, ticket, cause));
    }

    pub fn push(&self, event: MobilityEvent) {
        self.queue.lock().push(event);
    }

    /// Drain the queue and replay it, oldest first, to `listener`. With no
    /// listener the events are discarded. Returns how many were drained.
    ///
    /// Called from inside a replay, it returns 0 without draining.
    pub fn deliver(&self, listener: Option<&dyn MobilityListener>) -> usize {
        let guard = self.delivery.lock();
        if guard.get() {
            debug!("Nested delivery for {} deferred", self.owner);
            return 0;
        }
        guard.set(true);
        let _replaying = Replaying(&guard);

        let drained = std::mem::take(&mut *self.queue.lock());
        let count = drained.len();

        match listener {
            Some(listener) => {
                for event in &drained {
                    event.replay(listener);
                }
            }
            None if count > 0 => {
                debug!("Discarding {} undelivered mobility events for {}", count, self.owner);
            }
            None => {}
        }

        count
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBuffer")
            .field("owner", &self.owner)
            .field("pending", &self.len())
            .finish()
    }
}
