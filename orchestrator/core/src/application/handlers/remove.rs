// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use super::{check_destination_local, notify_failure, tear_down, StepOutcome};
use crate::domain::errors::MobilityError;
use crate::domain::port::{MobilityPort, RelocationContext};
use crate::domain::ticket::Ticket;
use std::sync::Arc;
use tracing::{info, warn};

/// Retire a unit hosted on this node. Removal is a commit: the unit is
/// never resumed, even when a teardown stage fails.
pub struct RemoveUnit {
    ctx: RelocationContext,
    port: Arc<dyn MobilityPort>,
}

impl RemoveUnit {
    pub fn new(ctx: RelocationContext, port: Arc<dyn MobilityPort>) -> Self {
        Self { ctx, port }
    }

    fn validate(&self) -> Result<(), MobilityError> {
        match self.ctx.ticket() {
            Ticket::Remove(ticket) => {
                if ticket.unit_id() != self.ctx.unit_id() {
                    return Err(MobilityError::violation(format!(
                        "remove ticket names unit {} but context unit is {}",
                        ticket.unit_id(),
                        self.ctx.unit_id()
                    )));
                }
                check_destination_local(&self.ctx, Some(ticket.destination()))
            }
            other => Err(MobilityError::violation(format!(
                "remove requires a remove ticket, got {}",
                other.kind()
            ))),
        }
    }

    pub fn run(self) -> StepOutcome {
        let _span = self.ctx.span().enter();
        let ctx = &self.ctx;
        let port = self.port.as_ref();

        if let Err(cause) = self.validate() {
            return notify_failure(port, ctx, cause);
        }

        let unit = match port.unit(ctx) {
            Ok(unit) => unit,
            Err(e) => return notify_failure(port, ctx, e.into()),
        };
        if let Some(cause) = tear_down(port, ctx, unit.as_ref()) {
            return notify_failure(port, ctx, cause);
        }

        info!("Unit {} removed from {}", ctx.unit_id(), ctx.node_id());
        if let Err(e) = port.on_removal(ctx) {
            warn!("Removal notification failed: {}", e);
        }
        StepOutcome::Removed
    }
}
