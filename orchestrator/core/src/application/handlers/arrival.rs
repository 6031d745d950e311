// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use super::StepOutcome;
use crate::domain::errors::MobilityError;
use crate::domain::port::{MobilityPort, RelocationContext};
use crate::domain::state::SealedBundle;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Destination side of a transfer: rebuild the unit and answer the origin.
///
/// Nothing is resumed here; the only unit that could be resumed lives on
/// the origin.
pub struct ArrivalHandler {
    ctx: RelocationContext,
    port: Arc<dyn MobilityPort>,
    bundle: SealedBundle,
}

impl ArrivalHandler {
    pub fn new(ctx: RelocationContext, port: Arc<dyn MobilityPort>, bundle: SealedBundle) -> Self {
        Self { ctx, port, bundle }
    }

    pub fn run(self) -> StepOutcome {
        let Self { ctx, port, bundle } = self;
        let _span = ctx.span().enter();
        let port = port.as_ref();
        let ctx = &ctx;

        match reconstitute(port, ctx, bundle) {
            Ok(()) => {
                info!("Unit {} arrived from {}", ctx.unit_id(), ctx.requester());
                if let Err(e) = port.send_ack(ctx) {
                    error!("Failed to acknowledge arrival of {}: {}", ctx.unit_id(), e);
                }
                StepOutcome::Acknowledged
            }
            Err(cause) => {
                warn!("Rejecting arrival of {}: {}", ctx.unit_id(), cause);
                if let Err(e) = port.send_nack(ctx, &cause) {
                    error!("Failed to send negative acknowledgement for {}: {}", ctx.unit_id(), e);
                }
                StepOutcome::Rejected(cause)
            }
        }
    }
}

fn reconstitute(
    port: &dyn MobilityPort,
    ctx: &RelocationContext,
    bundle: SealedBundle,
) -> Result<(), MobilityError> {
    match bundle.descriptor.unit_id() {
        Some(id) if &id == ctx.unit_id() => {}
        other => {
            return Err(MobilityError::violation(format!(
                "bundle descriptor names {:?}, transfer is for {}",
                other.map(|id| id.0),
                ctx.unit_id()
            )))
        }
    }
    let bundle = port.codec().unseal(bundle)?;
    port.add_unit(ctx, &bundle.descriptor, bundle.state)?;
    Ok(())
}
