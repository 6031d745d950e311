// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use super::{notify_arrival, notify_dispatch, notify_failure, send_sealed, StepOutcome};
use crate::domain::errors::MobilityError;
use crate::domain::port::{MobilityPort, RelocationContext};
use crate::domain::ticket::{AddTicket, Ticket};
use std::sync::Arc;
use tracing::info;

/// Bring a new unit into existence on the ticket's destination.
///
/// A local destination is served directly; a remote one receives the
/// bundle as a transfer and answers with an ack or nack like a move.
pub struct AddDispatch {
    ctx: RelocationContext,
    port: Arc<dyn MobilityPort>,
}

impl AddDispatch {
    pub fn new(ctx: RelocationContext, port: Arc<dyn MobilityPort>) -> Self {
        Self { ctx, port }
    }

    fn ticket(&self) -> Result<&AddTicket, MobilityError> {
        match self.ctx.ticket() {
            Ticket::Add(ticket) if ticket.unit_id() == self.ctx.unit_id() => Ok(ticket),
            Ticket::Add(ticket) => Err(MobilityError::violation(format!(
                "add ticket names unit {} but context unit is {}",
                ticket.unit_id(),
                self.ctx.unit_id()
            ))),
            other => Err(MobilityError::violation(format!(
                "add dispatch requires an add ticket, got {}",
                other.kind()
            ))),
        }
    }

    pub fn run(self) -> StepOutcome {
        let _span = self.ctx.span().enter();
        let ctx = &self.ctx;
        let port = self.port.as_ref();

        let ticket = match self.ticket() {
            Ok(ticket) => ticket,
            Err(cause) => return notify_failure(port, ctx, cause),
        };

        notify_dispatch(port, ctx);

        let bundle = ticket.bundle().clone();
        let destination = ticket.destination();
        if ctx.is_local(destination) {
            if let Err(e) = port.add_unit(ctx, &bundle.descriptor, bundle.state) {
                return notify_failure(port, ctx, e.into());
            }
            info!("Unit {} added on {}", ctx.unit_id(), destination);
            return notify_arrival(port, ctx, None);
        }

        let sealed = match port.codec().seal(bundle) {
            Ok(sealed) => sealed,
            Err(e) => return notify_failure(port, ctx, e.into()),
        };
        if let Err(cause) = send_sealed(port, ctx, destination, sealed) {
            return notify_failure(port, ctx, cause);
        }
        info!("Unit {} sent to {} for creation", ctx.unit_id(), destination);
        StepOutcome::AwaitingReply
    }
}
