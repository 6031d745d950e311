// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use super::{notify_arrival, notify_failure, tear_down, StepOutcome};
use crate::domain::errors::MobilityError;
use crate::domain::port::{MobilityPort, RelocationContext};
use crate::domain::ticket::Ticket;
use std::sync::Arc;
use tracing::{error, info};

/// Origin side, after the destination confirmed reconstitution.
///
/// For a move the suspended local instance is torn down; arrival is
/// reported no matter how the teardown went, since the unit now lives
/// on the destination.
pub struct AckHandler {
    ctx: RelocationContext,
    port: Arc<dyn MobilityPort>,
}

impl AckHandler {
    pub fn new(ctx: RelocationContext, port: Arc<dyn MobilityPort>) -> Self {
        Self { ctx, port }
    }

    pub fn run(self) -> StepOutcome {
        let _span = self.ctx.span().enter();
        let ctx = &self.ctx;
        let port = self.port.as_ref();

        match ctx.ticket() {
            Ticket::Move(_) => {
                let teardown = match port.unit(ctx) {
                    Ok(unit) => tear_down(port, ctx, unit.as_ref()),
                    Err(e) => {
                        error!("Acknowledged unit {} is no longer hosted here: {}", ctx.unit_id(), e);
                        Some(e.into())
                    }
                };
                info!("Unit {} acknowledged by {}", ctx.unit_id(), ctx.requester().node);
                notify_arrival(port, ctx, teardown)
            }
            Ticket::Add(_) => {
                info!("Unit {} added on {}", ctx.unit_id(), ctx.requester().node);
                notify_arrival(port, ctx, None)
            }
            Ticket::Remove(_) => notify_failure(
                port,
                ctx,
                MobilityError::violation("acknowledgement received for a remove ticket"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::testing::{entries, journal, MockPort, MockUnit, PortFaults, UnitFaults};
    use crate::domain::errors::{ContainerError, LifecycleError};
    use crate::domain::ticket::{AddTicket, MoveTicket, RemoveTicket};
    use crate::domain::unit::{Address, NodeId, TicketId, UnitId};

    fn ack_context(ticket: impl Into<Ticket>) -> RelocationContext {
        RelocationContext::new(
            UnitId::new("u1"),
            NodeId::new("node-a"),
            Address::node(NodeId::new("node-b")),
            ticket.into(),
        )
    }

    fn move_ticket() -> MoveTicket {
        MoveTicket::to(UnitId::new("u1"), NodeId::new("node-b"))
    }

    #[test]
    fn test_ack_tears_down_then_reports_arrival() {
        let log = journal();
        let unit = Arc::new(MockUnit::new("u1", log.clone()));
        let port = Arc::new(MockPort::new(log.clone(), Some(unit)));

        let outcome = AckHandler::new(ack_context(move_ticket()), port).run();

        assert_eq!(outcome, StepOutcome::Arrived { teardown: None });
        assert_eq!(entries(&log), vec!["stop", "unload", "remove_unit", "on_arrival"]);
    }

    #[test]
    fn test_every_teardown_stage_runs_and_first_error_is_kept() {
        let log = journal();
        let unit = Arc::new(MockUnit::new("u1", log.clone()).with_faults(UnitFaults {
            unload: true,
            ..Default::default()
        }));
        let port = Arc::new(MockPort::new(log.clone(), Some(unit)).with_faults(PortFaults {
            remove: true,
            ..Default::default()
        }));

        let outcome = AckHandler::new(ack_context(move_ticket()), port).run();

        assert_eq!(
            outcome,
            StepOutcome::Arrived {
                teardown: Some(MobilityError::Lifecycle(LifecycleError::UnloadFailed(
                    "unload injected failure".to_string()
                )))
            }
        );
        assert_eq!(entries(&log), vec!["stop", "unload", "remove_unit", "on_arrival"]);
    }

    #[test]
    fn test_missing_unit_still_reports_arrival() {
        let log = journal();
        let port = Arc::new(MockPort::new(log.clone(), None));

        let outcome = AckHandler::new(ack_context(move_ticket()), port).run();

        assert_eq!(
            outcome,
            StepOutcome::Arrived {
                teardown: Some(MobilityError::Container(ContainerError::NotFound(UnitId::new("u1"))))
            }
        );
        assert_eq!(entries(&log), vec!["on_arrival"]);
    }

    #[test]
    fn test_add_ack_only_notifies() {
        let log = journal();
        let port = Arc::new(MockPort::new(log.clone(), None));
        let ticket = AddTicket::new(TicketId::new(), UnitId::new("u1"), None, NodeId::new("node-b")).unwrap();

        let outcome = AckHandler::new(ack_context(ticket), port).run();

        assert_eq!(outcome, StepOutcome::Arrived { teardown: None });
        assert_eq!(entries(&log), vec!["on_arrival"]);
    }

    #[test]
    fn test_remove_ack_is_a_violation() {
        let log = journal();
        let port = Arc::new(MockPort::new(log.clone(), None));
        let ticket = RemoveTicket::new(TicketId::new(), UnitId::new("u1"), NodeId::new("node-a"));

        let outcome = AckHandler::new(ack_context(ticket), port).run();
        assert!(matches!(outcome, StepOutcome::Failed(MobilityError::ProtocolViolation(_))));
    }
}
