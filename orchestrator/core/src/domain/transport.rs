// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::errors::{MobilityError, TransportError};
use crate::domain::state::SealedBundle;
use crate::domain::ticket::Ticket;
use crate::domain::unit::{Address, NodeId, UnitId};

/// Node-to-node relocation messages. How they are encoded on the wire is
/// the transport's concern.
#[derive(Debug, Clone, PartialEq)]
pub enum MobilityMessage {
    Transfer {
        ticket: Ticket,
        unit_id: UnitId,
        origin: Address,
        bundle: SealedBundle,
    },
    Ack {
        ticket: Ticket,
        unit_id: UnitId,
        from: NodeId,
    },
    Nack {
        ticket: Ticket,
        unit_id: UnitId,
        from: NodeId,
        cause: MobilityError,
    },
}

impl MobilityMessage {
    pub fn unit_id(&self) -> &UnitId {
        match self {
            MobilityMessage::Transfer { unit_id, .. }
            | MobilityMessage::Ack { unit_id, .. }
            | MobilityMessage::Nack { unit_id, .. } => unit_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MobilityMessage::Transfer { .. } => "transfer",
            MobilityMessage::Ack { .. } => "ack",
            MobilityMessage::Nack { .. } => "nack",
        }
    }
}

/// Fire-and-forget delivery. `Ok` means the message was handed off, not
/// that the peer processed it.
pub trait Transport: Send + Sync {
    fn send(&self, to: &NodeId, message: MobilityMessage) -> Result<(), TransportError>;
}
