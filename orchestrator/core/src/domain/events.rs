// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::errors::MobilityError;
use crate::domain::ticket::Ticket;
use crate::domain::unit::{NodeId, UnitId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobilityEventKind {
    Dispatch,
    Arrival,
    Failure,
}

/// Notification about one relocation attempt, buffered until the unit's
/// listener is ready to consume it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MobilityEvent {
    Dispatched { ticket: Ticket },
    Arrived { ticket: Ticket },
    Failed { ticket: Ticket, cause: MobilityError },
}

impl MobilityEvent {
    /// Build an event from its kind. A failure recorded without a cause is
    /// reported as a protocol violation so it is never silently dropped.
    pub fn new(kind: MobilityEventKind, ticket: Ticket, cause: Option<MobilityError>) -> Self {
        match kind {
            MobilityEventKind::Dispatch => MobilityEvent::Dispatched { ticket },
            MobilityEventKind::Arrival => MobilityEvent::Arrived { ticket },
            MobilityEventKind::Failure => MobilityEvent::Failed {
                ticket,
                cause: cause.unwrap_or_else(|| MobilityError::violation("failure recorded without a cause")),
            },
        }
    }

    pub fn kind(&self) -> MobilityEventKind {
        match self {
            MobilityEvent::Dispatched { .. } => MobilityEventKind::Dispatch,
            MobilityEvent::Arrived { .. } => MobilityEventKind::Arrival,
            MobilityEvent::Failed { .. } => MobilityEventKind::Failure,
        }
    }

    pub fn ticket(&self) -> &Ticket {
        match self {
            MobilityEvent::Dispatched { ticket }
            | MobilityEvent::Arrived { ticket }
            | MobilityEvent::Failed { ticket, .. } => ticket,
        }
    }
}

/// Consumer of replayed [`MobilityEvent`]s.
pub trait MobilityListener: Send + Sync {
    fn on_dispatch(&self, ticket: &Ticket);
    fn on_arrival(&self, ticket: &Ticket);
    fn on_failure(&self, ticket: &Ticket, cause: &MobilityError);
}

impl MobilityEvent {
    pub fn replay(&self, listener: &dyn MobilityListener) {
        match self {
            MobilityEvent::Dispatched { ticket } => listener.on_dispatch(ticket),
            MobilityEvent::Arrived { ticket } => listener.on_arrival(ticket),
            MobilityEvent::Failed { ticket, cause } => listener.on_failure(ticket, cause),
        }
    }
}

/// Node-level observability events published on the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelocationEvent {
    Dispatched {
        unit_id: UnitId,
        node_id: NodeId,
        ticket: Ticket,
        at: DateTime<Utc>,
    },
    Suspended {
        unit_id: UnitId,
        node_id: NodeId,
        at: DateTime<Utc>,
    },
    Resumed {
        unit_id: UnitId,
        node_id: NodeId,
        at: DateTime<Utc>,
    },
    TransferSent {
        unit_id: UnitId,
        from: NodeId,
        to: NodeId,
        bytes: usize,
        at: DateTime<Utc>,
    },
    Arrived {
        unit_id: UnitId,
        node_id: NodeId,
        ticket: Ticket,
        at: DateTime<Utc>,
    },
    Failed {
        unit_id: UnitId,
        node_id: NodeId,
        ticket: Ticket,
        reason: String,
        at: DateTime<Utc>,
    },
    Removed {
        unit_id: UnitId,
        node_id: NodeId,
        at: DateTime<Utc>,
    },
}

impl RelocationEvent {
    pub fn unit_id(&self) -> &UnitId {
        match self {
            RelocationEvent::Dispatched { unit_id, .. }
            | RelocationEvent::Suspended { unit_id, .. }
            | RelocationEvent::Resumed { unit_id, .. }
            | RelocationEvent::TransferSent { unit_id, .. }
            | RelocationEvent::Arrived { unit_id, .. }
            | RelocationEvent::Failed { unit_id, .. }
            | RelocationEvent::Removed { unit_id, .. } => unit_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ticket::MoveTicket;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<MobilityEventKind>>);

    impl MobilityListener for Recorder {
        fn on_dispatch(&self, _ticket: &Ticket) {
            self.0.lock().push(MobilityEventKind::Dispatch);
        }
        fn on_arrival(&self, _ticket: &Ticket) {
            self.0.lock().push(MobilityEventKind::Arrival);
        }
        fn on_failure(&self, _ticket: &Ticket, _cause: &MobilityError) {
            self.0.lock().push(MobilityEventKind::Failure);
        }
    }

    #[test]
    fn test_replay_dispatches_on_kind() {
        let ticket: Ticket = MoveTicket::to(UnitId::new("u1"), NodeId::new("node-b")).into();
        let recorder = Recorder::default();

        for kind in [MobilityEventKind::Failure, MobilityEventKind::Dispatch, MobilityEventKind::Arrival] {
            let event = MobilityEvent::new(kind, ticket.clone(), None);
            assert_eq!(event.kind(), kind);
            assert_eq!(event.ticket(), &ticket);
            event.replay(&recorder);
        }

        assert_eq!(
            *recorder.0.lock(),
            vec![MobilityEventKind::Failure, MobilityEventKind::Dispatch, MobilityEventKind::Arrival]
        );
    }

    #[test]
    fn test_relocation_event_serializes_tagged() {
        let event = RelocationEvent::Removed {
            unit_id: UnitId::new("u1"),
            node_id: NodeId::new("node-a"),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "removed");
        assert_eq!(event.unit_id(), &UnitId::new("u1"));
    }
}
