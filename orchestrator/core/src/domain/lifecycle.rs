// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Unit Lifecycle Capability
//!
//! What the relocation protocol needs from a relocatable unit. The protocol
//! only consumes these operations; hosting and scheduling the unit's own
//! work is the node's business.
//!
//! Optional capabilities are exposed through query methods returning
//! `Option<&dyn Trait>` rather than discovered by name at runtime.

use crate::domain::errors::{ContainerError, LifecycleError};
use crate::domain::events::MobilityListener;
use crate::domain::state::CapturedState;
use crate::domain::ticket::Ticket;
use crate::domain::unit::{UnitDescriptor, UnitId};
use std::sync::Arc;

pub trait MobileUnit: Send + Sync {
    fn id(&self) -> &UnitId;

    /// Recipe that rebuilds an equivalent unit through a [`UnitFactory`].
    fn descriptor(&self) -> UnitDescriptor;

    /// Stop performing work until [`resume`](Self::resume) or teardown.
    fn suspend(&self) -> Result<(), LifecycleError>;
    fn resume(&self) -> Result<(), LifecycleError>;
    fn stop(&self) -> Result<(), LifecycleError>;
    fn unload(&self) -> Result<(), LifecycleError>;

    /// Snapshot the unit's internal state. `Ok(None)` means the unit has
    /// nothing worth carrying.
    fn capture_state(&self) -> Result<Option<CapturedState>, LifecycleError>;

    fn relocation_hook(&self) -> Option<&dyn RelocationAware> {
        None
    }

    fn mobility_listener(&self) -> Option<&dyn MobilityListener> {
        None
    }
}

/// Implemented by units that want a say before they are moved.
pub trait RelocationAware: Send + Sync {
    /// Returning an error vetoes the relocation before the unit is suspended.
    fn before_relocation(&self, ticket: &Ticket) -> Result<(), LifecycleError>;
}

/// Builds units of one descriptor kind.
pub trait UnitFactory: Send + Sync {
    fn kind(&self) -> &str;

    fn build(
        &self,
        descriptor: &UnitDescriptor,
        state: Option<CapturedState>,
    ) -> Result<Arc<dyn MobileUnit>, ContainerError>;
}
