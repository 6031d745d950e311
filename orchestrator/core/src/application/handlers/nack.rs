// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use super::{notify_failure, roll_back, StepOutcome};
use crate::domain::errors::MobilityError;
use crate::domain::port::{MobilityPort, RelocationContext};
use crate::domain::ticket::Ticket;
use std::sync::Arc;
use tracing::error;

/// Origin side, after the destination refused the transfer: resume the
/// suspended unit and report the remote cause.
pub struct NackHandler {
    ctx: RelocationContext,
    port: Arc<dyn MobilityPort>,
    cause: MobilityError,
}

impl NackHandler {
    pub fn new(ctx: RelocationContext, port: Arc<dyn MobilityPort>, cause: MobilityError) -> Self {
        Self { ctx, port, cause }
    }

    pub fn run(self) -> StepOutcome {
        let _span = self.ctx.span().enter();
        let ctx = &self.ctx;
        let port = self.port.as_ref();
        let cause = MobilityError::Remote {
            node: ctx.requester().node.clone(),
            cause: Box::new(self.cause),
        };

        match ctx.ticket() {
            Ticket::Move(_) => match port.unit(ctx) {
                Ok(unit) => roll_back(port, ctx, unit.as_ref(), cause),
                Err(e) => {
                    error!("Cannot resume {} after rejection: {}", ctx.unit_id(), e);
                    notify_failure(port, ctx, cause)
                }
            },
            Ticket::Add(_) => notify_failure(port, ctx, cause),
            Ticket::Remove(_) => notify_failure(
                port,
                ctx,
                MobilityError::violation("negative acknowledgement received for a remove ticket"),
            ),
        }
    }
}
