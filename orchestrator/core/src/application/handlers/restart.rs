// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use super::{
    check_assertions, check_destination_local, consult_hook, move_ticket, notify_arrival, notify_dispatch,
    notify_failure, roll_back, tear_down, StepOutcome,
};
use crate::domain::errors::MobilityError;
use crate::domain::port::{MobilityPort, ProtocolStep, RelocationContext};
use crate::domain::state::CapturedState;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Forced restart on the local node, used to exercise the whole capture
/// path without a second node.
///
/// The captured state goes through the codec's encode/decode cycle before
/// anything is torn down: state that only breaks once serialized is caught
/// here and the unit is resumed untouched. After the round trip the attempt
/// is committed; the old instance is stopped, unloaded and removed, and a
/// fresh one is built from the same descriptor with the decoded state.
pub struct RestartInPlace {
    ctx: RelocationContext,
    port: Arc<dyn MobilityPort>,
}

impl RestartInPlace {
    pub fn new(ctx: RelocationContext, port: Arc<dyn MobilityPort>) -> Self {
        Self { ctx, port }
    }

    fn validate(&self) -> Result<(), MobilityError> {
        let ticket = move_ticket(&self.ctx, "restart in place")?;
        if !ticket.force_restart() {
            return Err(MobilityError::violation("restart in place requires a forced-restart ticket"));
        }
        check_destination_local(&self.ctx, ticket.destination())?;
        check_assertions(&self.ctx, ticket)
    }

    pub fn run(self) -> StepOutcome {
        let _span = self.ctx.span().enter();
        let ctx = &self.ctx;
        let port = self.port.as_ref();

        if let Err(cause) = self.validate() {
            return notify_failure(port, ctx, cause);
        }

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

        let captured = match unit.capture_state() {
            Ok(state) => state,
            Err(e) => return roll_back(port, ctx, unit.as_ref(), MobilityError::Capture(e)),
        };

        let restored: Option<CapturedState> = match captured {
            Some(state) => match port.codec().round_trip(&state) {
                Ok(decoded) => Some(decoded),
                Err(e) => return roll_back(port, ctx, unit.as_ref(), e.into()),
            },
            None => {
                debug!("Unit {} has no capturable state", ctx.unit_id());
                None
            }
        };
        let descriptor = unit.descriptor();

        // Committed from here on: the old instance is going away.
        let teardown = tear_down(port, ctx, unit.as_ref());
        if let Some(e) = &teardown {
            warn!("Restart of {} continues despite teardown failure: {}", ctx.unit_id(), e);
        }
        drop(unit);

        if let Err(e) = port.add_unit(ctx, &descriptor, restored) {
            return notify_failure(port, ctx, e.into());
        }

        info!("Unit {} restarted on {}", ctx.unit_id(), ctx.node_id());
        notify_arrival(port, ctx, teardown)
    }
}
