// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Relocation Error Taxonomy
//!
//! | Error | Raised by | Handling |
//! |-------|-----------|----------|
//! | [`MobilityError::ProtocolViolation`] | ticket/context consistency checks | fail fast, no side effects |
//! | [`MobilityError::Capture`] | state capture on the origin | resume, then failure-notification |
//! | [`MobilityError::Codec`] | bundling / round-trip check | resume, then failure-notification |
//! | [`MobilityError::Transport`] | sending a transfer | resume, then failure-notification (delivery uncertain) |
//! | [`MobilityError::Container`] | add/remove on a node | nack on arrival, logged on teardown |
//! | [`MobilityError::Remote`] | cause carried by a nack | resume, then failure-notification |
//!
//! Every variant is `Clone + Serialize` so a cause can ride inside a
//! negative acknowledgement.

use crate::domain::unit::{NodeId, UnitId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TicketError {
    #[error("state-bundle descriptor has no parameters; expected '{expected}' first")]
    EmptyDescriptor { expected: UnitId },
    #[error("state-bundle descriptor starts with '{found}', expected unit id '{expected}'")]
    DescriptorMismatch { expected: UnitId, found: UnitId },
    #[error("unit id cannot be empty")]
    EmptyUnitId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum LifecycleError {
    #[error("Failed to suspend unit: {0}")]
    SuspendFailed(String),
    #[error("Failed to resume unit: {0}")]
    ResumeFailed(String),
    #[error("Failed to stop unit: {0}")]
    StopFailed(String),
    #[error("Failed to unload unit: {0}")]
    UnloadFailed(String),
    #[error("Failed to capture unit state: {0}")]
    CaptureFailed(String),
    #[error("Failed to restore unit state: {0}")]
    RestoreFailed(String),
    #[error("Unit refused relocation: {0}")]
    Refused(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CodecError {
    #[error("Serialization error: {0}")]
    Encode(String),
    #[error("Deserialization error: {0}")]
    Decode(String),
    #[error("Captured state too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("Captured state changed across a serialization round trip")]
    Divergent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransportError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),
    #[error("Inbox of node {0} is closed")]
    Closed(NodeId),
    #[error("Inbox of node {0} is full")]
    Full(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ContainerError {
    #[error("Unit already hosted: {0}")]
    AlreadyHosted(UnitId),
    #[error("Unit not found: {0}")]
    NotFound(UnitId),
    #[error("No factory registered for unit kind '{0}'")]
    UnknownKind(String),
    #[error("Failed to build unit: {0}")]
    BuildFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Notification hook failed: {0}")]
pub struct NotificationError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MobilityError {
    #[error("Protocol consistency violation: {0}")]
    ProtocolViolation(String),
    #[error(transparent)]
    Ticket(#[from] TicketError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("State capture failed: {0}")]
    Capture(LifecycleError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("Destination node {node} reported failure: {cause}")]
    Remote { node: NodeId, cause: Box<MobilityError> },
}

impl MobilityError {
    pub fn violation(message: impl Into<String>) -> Self {
        Self::ProtocolViolation(message.into())
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation(_))
    }
}
