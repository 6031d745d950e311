// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Relocation Context and Port
//!
//! [`RelocationContext`] is the read-only identity of one relocation attempt:
//! which unit, on which node, asked for by whom, under which ticket, plus
//! the tracing span every step logs into. It is built once per attempt by
//! the hosting node and borrowed by the handler that runs the step.
//!
//! [`MobilityPort`] is everything a handler may *do*: reach the unit's
//! lifecycle capability, send protocol messages, add/remove units on the
//! local node and fire the four notification hooks. Every operation takes
//! the context explicitly, so the port itself can be shared by all attempts
//! on a node.

use crate::domain::codec::StateCodec;
use crate::domain::errors::{ContainerError, MobilityError, NotificationError, TransportError};
use crate::domain::lifecycle::MobileUnit;
use crate::domain::state::{CapturedState, SealedBundle};
use crate::domain::ticket::Ticket;
use crate::domain::unit::{Address, NodeId, UnitDescriptor, UnitId};
use std::sync::Arc;
use tracing::Span;

#[derive(Debug, Clone)]
pub struct RelocationContext {
    unit_id: UnitId,
    node_id: NodeId,
    requester: Address,
    ticket: Ticket,
    span: Span,
}

impl RelocationContext {
    pub fn new(unit_id: UnitId, node_id: NodeId, requester: Address, ticket: Ticket) -> Self {
        let span = tracing::info_span!(
            "relocation",
            unit = %unit_id,
            node = %node_id,
            ticket = %ticket.id().map(|id| id.to_string()).unwrap_or_default(),
            kind = ticket.kind(),
        );
        Self {
            unit_id,
            node_id,
            requester,
            ticket,
            span,
        }
    }

    pub fn unit_id(&self) -> &UnitId {
        &self.unit_id
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn requester(&self) -> &Address {
        &self.requester
    }

    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    /// The attempt's logger handle.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn is_local(&self, node: &NodeId) -> bool {
        &self.node_id == node
    }
}

/// Intermediate protocol milestones, reported for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStep {
    Suspended,
    Resumed,
    TransferSent { bytes: usize },
    TornDown,
}

pub trait MobilityPort: Send + Sync {
    /// Lifecycle capability of the context's unit on this node.
    fn unit(&self, ctx: &RelocationContext) -> Result<Arc<dyn MobileUnit>, ContainerError>;

    fn codec(&self) -> &dyn StateCodec;

    fn send_transfer(
        &self,
        ctx: &RelocationContext,
        destination: &NodeId,
        bundle: SealedBundle,
    ) -> Result<(), TransportError>;

    fn send_ack(&self, ctx: &RelocationContext) -> Result<(), TransportError>;

    fn send_nack(&self, ctx: &RelocationContext, cause: &MobilityError) -> Result<(), TransportError>;

    /// Build and host a unit from `descriptor`, keyed by the context's unit id.
    fn add_unit(
        &self,
        ctx: &RelocationContext,
        descriptor: &UnitDescriptor,
        state: Option<CapturedState>,
    ) -> Result<(), ContainerError>;

    fn remove_unit(&self, ctx: &RelocationContext) -> Result<(), ContainerError>;

    fn on_dispatch(&self, ctx: &RelocationContext) -> Result<(), NotificationError>;

    fn on_arrival(&self, ctx: &RelocationContext) -> Result<(), NotificationError>;

    fn on_failure(&self, ctx: &RelocationContext, cause: &MobilityError) -> Result<(), NotificationError>;

    fn on_removal(&self, ctx: &RelocationContext) -> Result<(), NotificationError>;

    fn on_step(&self, _ctx: &RelocationContext, _step: ProtocolStep) {}
}
