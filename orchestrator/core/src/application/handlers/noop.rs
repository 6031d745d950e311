// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use super::{check_assertions, check_destination_local, move_ticket, notify_arrival, notify_dispatch, notify_failure, StepOutcome};
use crate::domain::errors::MobilityError;
use crate::domain::port::{MobilityPort, RelocationContext};
use std::sync::Arc;
use tracing::debug;

/// A move that leaves the unit where it is: dispatch and arrival fire back
/// to back, the unit is never suspended.
pub struct NoopDispatch {
    ctx: RelocationContext,
    port: Arc<dyn MobilityPort>,
}

impl NoopDispatch {
    pub fn new(ctx: RelocationContext, port: Arc<dyn MobilityPort>) -> Self {
        Self { ctx, port }
    }

    fn validate(&self) -> Result<(), MobilityError> {
        let ticket = move_ticket(&self.ctx, "no-op dispatch")?;
        if ticket.force_restart() {
            return Err(MobilityError::violation("no-op dispatch cannot honour a forced restart"));
        }
        check_destination_local(&self.ctx, ticket.destination())?;
        check_assertions(&self.ctx, ticket)
    }

    pub fn run(self) -> StepOutcome {
        let _span = self.ctx.span().enter();
        let port = self.port.as_ref();

        if let Err(cause) = self.validate() {
            return notify_failure(port, &self.ctx, cause);
        }

        debug!("Unit {} stays on {}", self.ctx.unit_id(), self.ctx.node_id());
        notify_dispatch(port, &self.ctx);
        notify_arrival(port, &self.ctx, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::testing::{context, entries, journal, MockPort, MockUnit, PortFaults};
    use crate::domain::ticket::{MoveTicket, RemoveTicket};
    use crate::domain::unit::{NodeId, TicketId, UnitId};

    #[test]
    fn test_local_move_fires_dispatch_then_arrival_only() {
        let log = journal();
        let unit = Arc::new(MockUnit::new("u1", log.clone()));
        let port = Arc::new(MockPort::new(log.clone(), Some(unit)));
        let ticket = MoveTicket::to(UnitId::new("u1"), NodeId::new("node-a"));

        let outcome = NoopDispatch::new(context("u1", "node-a", ticket), port.clone()).run();

        assert_eq!(outcome, StepOutcome::Arrived { teardown: None });
        assert_eq!(entries(&log), vec!["on_dispatch", "on_arrival"]);
        assert!(port.transfers.lock().is_empty());
    }

    #[test]
    fn test_stay_ticket_without_destination() {
        let log = journal();
        let port = Arc::new(MockPort::new(log.clone(), None));
        let ticket = MoveTicket::new(None, None, None, None, false);

        let outcome = NoopDispatch::new(context("u1", "node-a", ticket), port).run();

        assert!(matches!(outcome, StepOutcome::Arrived { .. }));
        assert_eq!(entries(&log), vec!["on_dispatch", "on_arrival"]);
    }

    #[test]
    fn test_violations_fail_without_side_effects() {
        let cases = vec![
            MoveTicket::new(None, None, None, Some(NodeId::new("node-a")), true),
            MoveTicket::new(None, None, None, Some(NodeId::new("node-b")), false),
            MoveTicket::new(None, Some(UnitId::new("other")), None, None, false),
            MoveTicket::new(None, None, Some(NodeId::new("node-z")), None, false),
        ];
        for ticket in cases {
            let log = journal();
            let port = Arc::new(MockPort::new(log.clone(), None));
            let outcome = NoopDispatch::new(context("u1", "node-a", ticket), port.clone()).run();

            assert!(matches!(outcome, StepOutcome::Failed(MobilityError::ProtocolViolation(_))));
            assert_eq!(entries(&log), vec!["on_failure"]);
        }
    }

    #[test]
    fn test_rejects_non_move_ticket() {
        let log = journal();
        let port = Arc::new(MockPort::new(log.clone(), None));
        let ticket = RemoveTicket::new(TicketId::new(), UnitId::new("u1"), NodeId::new("node-a"));

        let outcome = NoopDispatch::new(context("u1", "node-a", ticket), port).run();
        assert!(matches!(outcome, StepOutcome::Failed(_)));
    }

    #[test]
    fn test_notification_errors_are_swallowed() {
        let log = journal();
        let port = Arc::new(MockPort::new(log.clone(), None).with_faults(PortFaults {
            notify: true,
            ..Default::default()
        }));
        let ticket = MoveTicket::to(UnitId::new("u1"), NodeId::new("node-a"));

        let outcome = NoopDispatch::new(context("u1", "node-a", ticket), port).run();
        assert_eq!(outcome, StepOutcome::Arrived { teardown: None });
        assert_eq!(entries(&log), vec!["on_dispatch", "on_arrival"]);
    }
}
