// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Relocation Protocol Handlers
//!
//! One handler per protocol step. A handler owns the [`RelocationContext`]
//! of its attempt and a shared [`MobilityPort`], performs its step
//! synchronously and is consumed by `run()`. It never waits for a reply:
//! the next step is a new handler built when the reply arrives.
//!
//! ## Step Table
//!
//! | Handler | Runs on | Trigger | Terminal? |
//! |---------|---------|---------|-----------|
//! | [`NoopDispatch`] | origin | move ticket to the local node | yes |
//! | [`RemoteDispatch`] | origin | move ticket to another node | no, awaits ack/nack |
//! | [`RestartInPlace`] | origin | move ticket with forced restart | yes |
//! | [`AddDispatch`] | origin | add ticket | local: yes, remote: awaits ack/nack |
//! | [`RemoveUnit`] | origin | remove ticket | yes |
//! | [`ArrivalHandler`] | destination | transfer received | replies ack/nack |
//! | [`AckHandler`] | origin | ack received | yes |
//! | [`NackHandler`] | origin | nack received | yes |
//!
//! ## Failure Policy
//!
//! `run()` never returns an error. Every failure ends in failure-notification
//! (preceded by a resume when the unit was suspended and nothing is committed
//! yet) or is logged and absorbed. Errors raised by the notification hooks
//! themselves are logged and swallowed.

mod ack;
mod add;
mod arrival;
mod nack;
mod noop;
mod remote;
mod remove;
mod restart;

pub use ack::AckHandler;
pub use add::AddDispatch;
pub use arrival::ArrivalHandler;
pub use nack::NackHandler;
pub use noop::NoopDispatch;
pub use remote::RemoteDispatch;
pub use remove::RemoveUnit;
pub use restart::RestartInPlace;

use crate::domain::errors::MobilityError;
use crate::domain::lifecycle::MobileUnit;
use crate::domain::port::{MobilityPort, ProtocolStep, RelocationContext};
use crate::domain::state::SealedBundle;
use crate::domain::ticket::{MoveTicket, Ticket};
use crate::domain::unit::NodeId;
use std::sync::Arc;
use tracing::{error, warn};

/// Where an attempt stands after one handler ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Transfer sent; the attempt continues when an ack or nack arrives.
    AwaitingReply,
    /// Arrival-notification fired. `teardown` holds the first error raised
    /// while tearing down the previous instance, if any.
    Arrived { teardown: Option<MobilityError> },
    /// Destination side: the unit was reconstituted and an ack sent.
    Acknowledged,
    /// Destination side: reconstitution failed and a nack was sent.
    Rejected(MobilityError),
    /// Failure-notification fired with this cause.
    Failed(MobilityError),
    /// Removal-notification fired.
    Removed,
}

impl StepOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepOutcome::AwaitingReply)
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::AwaitingReply => "awaiting_reply",
            StepOutcome::Arrived { .. } => "arrived",
            StepOutcome::Acknowledged => "acknowledged",
            StepOutcome::Rejected(_) => "rejected",
            StepOutcome::Failed(_) => "failed",
            StepOutcome::Removed => "removed",
        }
    }
}

/// Any protocol step, ready to run.
pub enum Handler {
    Noop(NoopDispatch),
    Remote(RemoteDispatch),
    Restart(RestartInPlace),
    Add(AddDispatch),
    Remove(RemoveUnit),
    Arrival(ArrivalHandler),
    Ack(AckHandler),
    Nack(NackHandler),
}

impl Handler {
    /// Pick the origin-side handler for the context's ticket.
    ///
    /// Move tickets requesting a restart get [`RestartInPlace`]; those
    /// staying on (or addressed to) the local node get [`NoopDispatch`];
    /// everything else is a [`RemoteDispatch`].
    pub fn for_ticket(ctx: RelocationContext, port: Arc<dyn MobilityPort>) -> Self {
        match ctx.ticket() {
            Ticket::Move(ticket) if ticket.force_restart() => {
                Handler::Restart(RestartInPlace::new(ctx, port))
            }
            Ticket::Move(ticket) => match ticket.destination() {
                Some(dest) if !ctx.is_local(dest) => Handler::Remote(RemoteDispatch::new(ctx, port)),
                _ => Handler::Noop(NoopDispatch::new(ctx, port)),
            },
            Ticket::Add(_) => Handler::Add(AddDispatch::new(ctx, port)),
            Ticket::Remove(_) => Handler::Remove(RemoveUnit::new(ctx, port)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Handler::Noop(_) => "noop_dispatch",
            Handler::Remote(_) => "remote_dispatch",
            Handler::Restart(_) => "restart_in_place",
            Handler::Add(_) => "add_dispatch",
            Handler::Remove(_) => "remove_unit",
            Handler::Arrival(_) => "arrival",
            Handler::Ack(_) => "ack",
            Handler::Nack(_) => "nack",
        }
    }

    pub fn run(self) -> StepOutcome {
        match self {
            Handler::Noop(h) => h.run(),
            Handler::Remote(h) => h.run(),
            Handler::Restart(h) => h.run(),
            Handler::Add(h) => h.run(),
            Handler::Remove(h) => h.run(),
            Handler::Arrival(h) => h.run(),
            Handler::Ack(h) => h.run(),
            Handler::Nack(h) => h.run(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared step helpers
// ---------------------------------------------------------------------------

fn move_ticket<'a>(ctx: &'a RelocationContext, handler: &str) -> Result<&'a MoveTicket, MobilityError> {
    match ctx.ticket() {
        Ticket::Move(ticket) => Ok(ticket),
        other => Err(MobilityError::violation(format!(
            "{} requires a move ticket, got {}",
            handler,
            other.kind()
        ))),
    }
}

/// Unit-id and origin-node assertions common to every move handler.
fn check_assertions(ctx: &RelocationContext, ticket: &MoveTicket) -> Result<(), MobilityError> {
    if let Some(unit_id) = ticket.unit_id() {
        if unit_id != ctx.unit_id() {
            return Err(MobilityError::violation(format!(
                "ticket targets unit {} but context unit is {}",
                unit_id,
                ctx.unit_id()
            )));
        }
    }
    if let Some(origin) = ticket.origin() {
        if !ctx.is_local(origin) {
            return Err(MobilityError::violation(format!(
                "ticket asserts origin {} but it executes on {}",
                origin,
                ctx.node_id()
            )));
        }
    }
    Ok(())
}

fn check_destination_local(ctx: &RelocationContext, destination: Option<&NodeId>) -> Result<(), MobilityError> {
    match destination {
        Some(dest) if !ctx.is_local(dest) => Err(MobilityError::violation(format!(
            "destination {} is not the local node {}",
            dest,
            ctx.node_id()
        ))),
        _ => Ok(()),
    }
}

fn notify_dispatch(port: &dyn MobilityPort, ctx: &RelocationContext) {
    if let Err(e) = port.on_dispatch(ctx) {
        warn!("Dispatch notification failed: {}", e);
    }
}

fn notify_arrival(port: &dyn MobilityPort, ctx: &RelocationContext, teardown: Option<MobilityError>) -> StepOutcome {
    if let Err(e) = port.on_arrival(ctx) {
        warn!("Arrival notification failed: {}", e);
    }
    StepOutcome::Arrived { teardown }
}

fn notify_failure(port: &dyn MobilityPort, ctx: &RelocationContext, cause: MobilityError) -> StepOutcome {
    warn!("Relocation failed: {}", cause);
    if let Err(e) = port.on_failure(ctx, &cause) {
        warn!("Failure notification failed: {}", e);
    }
    StepOutcome::Failed(cause)
}

/// Undo a suspension, then report `cause`.
fn roll_back(
    port: &dyn MobilityPort,
    ctx: &RelocationContext,
    unit: &dyn MobileUnit,
    cause: MobilityError,
) -> StepOutcome {
    match unit.resume() {
        Ok(()) => port.on_step(ctx, ProtocolStep::Resumed),
        Err(e) => error!("Failed to resume unit {} during rollback: {}", ctx.unit_id(), e),
    }
    notify_failure(port, ctx, cause)
}

/// Ask the unit's optional pre-relocation hook for permission.
fn consult_hook(unit: &dyn MobileUnit, ticket: &Ticket) -> Result<(), MobilityError> {
    match unit.relocation_hook() {
        Some(hook) => hook.before_relocation(ticket).map_err(MobilityError::from),
        None => Ok(()),
    }
}

/// Stop, unload and remove the local instance. Every stage is attempted;
/// the first error is returned.
fn tear_down(port: &dyn MobilityPort, ctx: &RelocationContext, unit: &dyn MobileUnit) -> Option<MobilityError> {
    let mut first: Option<MobilityError> = None;
    let mut keep = |result: Result<(), MobilityError>, stage: &str| {
        if let Err(e) = result {
            error!("Teardown of {} failed at {}: {}", ctx.unit_id(), stage, e);
            first.get_or_insert(e);
        }
    };
    keep(unit.stop().map_err(MobilityError::from), "stop");
    keep(unit.unload().map_err(MobilityError::from), "unload");
    keep(port.remove_unit(ctx).map_err(MobilityError::from), "remove");
    if first.is_none() {
        port.on_step(ctx, ProtocolStep::TornDown);
    }
    first
}

fn send_sealed(
    port: &dyn MobilityPort,
    ctx: &RelocationContext,
    destination: &NodeId,
    bundle: SealedBundle,
) -> Result<(), MobilityError> {
    let bytes = bundle.encoded_len();
    port.send_transfer(ctx, destination, bundle)?;
    port.on_step(ctx, ProtocolStep::TransferSent { bytes });
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::testing::{context, journal, MockPort};
    use crate::domain::ticket::{AddTicket, RemoveTicket};
    use crate::domain::unit::{TicketId, UnitId};

    fn select(ticket: impl Into<Ticket>) -> &'static str {
        let port = Arc::new(MockPort::new(journal(), None));
        Handler::for_ticket(context("u1", "node-a", ticket), port).name()
    }

    #[test]
    fn test_handler_selection() {
        let u1 = || UnitId::new("u1");
        assert_eq!(select(MoveTicket::restart(u1())), "restart_in_place");
        assert_eq!(select(MoveTicket::to(u1(), NodeId::new("node-b"))), "remote_dispatch");
        assert_eq!(select(MoveTicket::to(u1(), NodeId::new("node-a"))), "noop_dispatch");
        assert_eq!(select(MoveTicket::new(None, None, None, None, false)), "noop_dispatch");
        assert_eq!(
            select(AddTicket::new(TicketId::new(), u1(), None, NodeId::new("node-b")).unwrap()),
            "add_dispatch"
        );
        assert_eq!(
            select(RemoveTicket::new(TicketId::new(), u1(), NodeId::new("node-a"))),
            "remove_unit"
        );
    }

    #[test]
    fn test_forced_restart_to_remote_node_is_refused() {
        let port = Arc::new(MockPort::new(journal(), None));
        let ticket = MoveTicket::new(None, None, None, Some(NodeId::new("node-b")), true);

        let outcome = Handler::for_ticket(context("u1", "node-a", ticket), port).run();
        assert!(matches!(outcome, StepOutcome::Failed(MobilityError::ProtocolViolation(_))));
    }

    #[test]
    fn test_only_awaiting_reply_is_open() {
        assert!(!StepOutcome::AwaitingReply.is_terminal());
        assert!(StepOutcome::Removed.is_terminal());
        assert_eq!(StepOutcome::Arrived { teardown: None }.label(), "arrived");
    }
}
