// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use super::{check_assertions, consult_hook, move_ticket, notify_dispatch, notify_failure, roll_back, send_sealed, StepOutcome};
use crate::domain::errors::MobilityError;
use crate::domain::port::{MobilityPort, ProtocolStep, RelocationContext};
use crate::domain::state::StateBundle;
use crate::domain::unit::NodeId;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Origin side of a move to another node:
/// dispatch → suspend → capture → bundle → transfer.
///
/// The unit stays suspended until an ack or nack for the ticket arrives.
pub struct RemoteDispatch {
    ctx: RelocationContext,
    port: Arc<dyn MobilityPort>,
}

impl RemoteDispatch {
    pub fn new(ctx: RelocationContext, port: Arc<dyn MobilityPort>) -> Self {
        Self { ctx, port }
    }

    fn destination(&self) -> Result<NodeId, MobilityError> {
        let ticket = move_ticket(&self.ctx, "remote dispatch")?;
        let destination = match ticket.destination() {
            Some(dest) if !self.ctx.is_local(dest) => dest.clone(),
            Some(dest) => {
                return Err(MobilityError::violation(format!(
                    "remote dispatch to the local node {}",
                    dest
                )))
            }
            None => return Err(MobilityError::violation("remote dispatch without a destination")),
        };
        check_assertions(&self.ctx, ticket)?;
        Ok(destination)
    }

    pub fn run(self) -> StepOutcome {
        let _span = self.ctx.span().enter();
        let ctx = &self.ctx;
        let port = self.port.as_ref();

        let destination = match self.destination() {
            Ok(dest) => dest,
            Err(cause) => return notify_failure(port, ctx, cause),
        };

        notify_dispatch(port, ctx);

        let unit = match port.unit(ctx) {
            Ok(unit) => unit,
            Err(e) => return notify_failure(port, ctx, e.into()),
        };
        if let Err(cause) = consult_hook(unit.as_ref(), ctx.ticket()) {
            return notify_failure(port, ctx, cause);
        }

        if let Err(e) = unit.suspend() {
            return notify_failure(port, ctx, e.into());
        }
        port.on_step(ctx, ProtocolStep::Suspended);

        let state = match unit.capture_state() {
            Ok(Some(state)) => Some(state),
            Ok(None) => {
                debug!("Unit {} has no capturable state", ctx.unit_id());
                None
            }
            Err(e) => return roll_back(port, ctx, unit.as_ref(), MobilityError::Capture(e)),
        };

        let bundle = match port.codec().seal(StateBundle::new(unit.descriptor(), state)) {
            Ok(bundle) => bundle,
            Err(e) => return roll_back(port, ctx, unit.as_ref(), e.into()),
        };

        if let Err(cause) = send_sealed(port, ctx, &destination, bundle) {
            warn!(
                "Transfer of {} to {} failed, delivery uncertain: {}",
                ctx.unit_id(),
                destination,
                cause
            );
            return roll_back(port, ctx, unit.as_ref(), cause);
        }

        info!("Unit {} transferred to {}, awaiting reply", ctx.unit_id(), destination);
        StepOutcome::AwaitingReply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::testing::{
        context, entries, journal, MockPort, MockUnit, PortFaults, UnitFaults,
    };
    use crate::domain::errors::{CodecError, LifecycleError, TransportError};
    use crate::domain::state::{CapturedState, StateValue};
    use crate::domain::ticket::MoveTicket;
    use crate::domain::unit::UnitId;

    fn ticket() -> MoveTicket {
        MoveTicket::to(UnitId::new("u1"), NodeId::new("node-b"))
    }

    #[test]
    fn test_happy_path_order() {
        let log = journal();
        let unit = Arc::new(MockUnit::new("u1", log.clone()));
        let port = Arc::new(MockPort::new(log.clone(), Some(unit)));

        let outcome = RemoteDispatch::new(context("u1", "node-a", ticket()), port.clone()).run();

        assert_eq!(outcome, StepOutcome::AwaitingReply);
        assert_eq!(
            entries(&log),
            vec!["on_dispatch", "before_relocation", "suspend", "capture", "send_transfer"]
        );
        let transfers = port.transfers.lock();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].0, NodeId::new("node-b"));
        assert!(transfers[0].1.state.is_some());
    }

    #[test]
    fn test_absent_state_is_not_an_error() {
        let log = journal();
        let unit = Arc::new(MockUnit::new("u1", log.clone()).with_state(None));
        let port = Arc::new(MockPort::new(log.clone(), Some(unit)));

        let outcome = RemoteDispatch::new(context("u1", "node-a", ticket()), port.clone()).run();

        assert_eq!(outcome, StepOutcome::AwaitingReply);
        assert!(port.transfers.lock()[0].1.state.is_none());
    }

    #[test]
    fn test_capture_failure_resumes_once_and_sends_nothing() {
        let log = journal();
        let unit = Arc::new(MockUnit::new("u1", log.clone()).with_faults(UnitFaults {
            capture: true,
            ..Default::default()
        }));
        let port = Arc::new(MockPort::new(log.clone(), Some(unit)));

        let outcome = RemoteDispatch::new(context("u1", "node-a", ticket()), port.clone()).run();

        assert!(matches!(
            outcome,
            StepOutcome::Failed(MobilityError::Capture(LifecycleError::CaptureFailed(_)))
        ));
        let log = entries(&log);
        assert_eq!(
            log,
            vec!["on_dispatch", "before_relocation", "suspend", "capture", "resume", "on_failure"]
        );
        assert_eq!(log.iter().filter(|e| *e == "resume").count(), 1);
        assert!(port.transfers.lock().is_empty());
    }

    #[test]
    fn test_unserializable_state_rolls_back() {
        let log = journal();
        let state = CapturedState::new().with("conn", StateValue::Handle("tcp:9000".to_string()));
        let unit = Arc::new(MockUnit::new("u1", log.clone()).with_state(Some(state)));
        let port = Arc::new(MockPort::new(log.clone(), Some(unit)));

        let outcome = RemoteDispatch::new(context("u1", "node-a", ticket()), port.clone()).run();

        assert!(matches!(outcome, StepOutcome::Failed(MobilityError::Codec(CodecError::Encode(_)))));
        assert_eq!(entries(&log).last().map(String::as_str), Some("on_failure"));
        assert!(entries(&log).contains(&"resume".to_string()));
        assert!(!entries(&log).contains(&"send_transfer".to_string()));
    }

    #[test]
    fn test_send_failure_resumes_and_reports() {
        let log = journal();
        let unit = Arc::new(MockUnit::new("u1", log.clone()));
        let port = Arc::new(MockPort::new(log.clone(), Some(unit)).with_faults(PortFaults {
            send: true,
            ..Default::default()
        }));

        let outcome = RemoteDispatch::new(context("u1", "node-a", ticket()), port).run();

        assert_eq!(
            outcome,
            StepOutcome::Failed(MobilityError::Transport(TransportError::Closed(NodeId::new("node-b"))))
        );
        assert_eq!(
            entries(&log)[4..],
            ["send_transfer".to_string(), "resume".to_string(), "on_failure".to_string()]
        );
    }

    #[test]
    fn test_suspend_failure_does_not_resume() {
        let log = journal();
        let unit = Arc::new(MockUnit::new("u1", log.clone()).with_faults(UnitFaults {
            suspend: true,
            ..Default::default()
        }));
        let port = Arc::new(MockPort::new(log.clone(), Some(unit)));

        let outcome = RemoteDispatch::new(context("u1", "node-a", ticket()), port).run();

        assert!(matches!(outcome, StepOutcome::Failed(MobilityError::Lifecycle(_))));
        assert!(!entries(&log).contains(&"resume".to_string()));
    }

    #[test]
    fn test_hook_veto_aborts_before_suspend() {
        let log = journal();
        let unit = Arc::new(MockUnit::new("u1", log.clone()).with_faults(UnitFaults {
            veto: true,
            ..Default::default()
        }));
        let port = Arc::new(MockPort::new(log.clone(), Some(unit)));

        let outcome = RemoteDispatch::new(context("u1", "node-a", ticket()), port).run();

        assert!(matches!(
            outcome,
            StepOutcome::Failed(MobilityError::Lifecycle(LifecycleError::Refused(_)))
        ));
        assert_eq!(entries(&log), vec!["on_dispatch", "before_relocation", "on_failure"]);
    }

    #[test]
    fn test_origin_assertion_mismatch_is_rejected_up_front() {
        let log = journal();
        let unit = Arc::new(MockUnit::new("u1", log.clone()));
        let port = Arc::new(MockPort::new(log.clone(), Some(unit)));
        let ticket = ticket().with_origin(NodeId::new("node-z"));

        let outcome = RemoteDispatch::new(context("u1", "node-a", ticket), port).run();

        assert!(matches!(outcome, StepOutcome::Failed(MobilityError::ProtocolViolation(_))));
        assert_eq!(entries(&log), vec!["on_failure"]);
    }

    #[test]
    fn test_missing_destination_is_a_violation() {
        let log = journal();
        let port = Arc::new(MockPort::new(log.clone(), None));
        let ticket = MoveTicket::new(None, Some(UnitId::new("u1")), None, None, false);

        let outcome = RemoteDispatch::new(context("u1", "node-a", ticket), port).run();
        assert!(matches!(outcome, StepOutcome::Failed(MobilityError::ProtocolViolation(_))));
    }
}
