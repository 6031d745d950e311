// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory Transport
//!
//! Routes [`MobilityMessage`]s between nodes living in the same process,
//! one bounded `tokio::sync::mpsc` inbox per node.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements the `Transport` port

use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use transit_core::domain::errors::TransportError;
use transit_core::domain::transport::{MobilityMessage, Transport};
use transit_core::domain::unit::NodeId;

/// Default inbox capacity per node.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct InMemoryTransport {
    inboxes: RwLock<HashMap<NodeId, mpsc::Sender<MobilityMessage>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an inbox for `node`, replacing any previous one.
    pub fn register(&self, node: NodeId, capacity: usize) -> mpsc::Receiver<MobilityMessage> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        if self.inboxes.write().insert(node.clone(), tx).is_some() {
            warn!("Replaced existing inbox for node {}", node);
        }
        rx
    }

    pub fn unregister(&self, node: &NodeId) -> bool {
        self.inboxes.write().remove(node).is_some()
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.inboxes.read().keys().cloned().collect();
        nodes.sort_by(|a, b| a.0.cmp(&b.0));
        nodes
    }
}

impl Transport for InMemoryTransport {
    fn send(&self, to: &NodeId, message: MobilityMessage) -> Result<(), TransportError> {
        let sender = self
            .inboxes
            .read()
            .get(to)
            .cloned()
            .ok_or_else(|| TransportError::UnknownNode(to.clone()))?;

        debug!("Routing {} for {} to {}", message.name(), message.unit_id(), to);
        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Full(to.clone()),
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed(to.clone()),
        })
    }
}
