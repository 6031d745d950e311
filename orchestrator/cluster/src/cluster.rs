// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cluster
//!
//! A set of [`Node`]s sharing one [`InMemoryTransport`] and one event bus.
//! Each node's inbox is drained by its own tokio task, so building a
//! cluster requires a running runtime.

use crate::node::Node;
use crate::transport::{InMemoryTransport, DEFAULT_CHANNEL_CAPACITY};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use transit_core::domain::lifecycle::UnitFactory;
use transit_core::domain::node_config::{MobilityConfig, NodeConfigManifest};
use transit_core::domain::unit::{NodeId, UnitId};
use transit_core::infrastructure::event_bus::EventBus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("A cluster needs at least one node")]
    Empty,

    #[error("Node {0} declared twice")]
    DuplicateNode(NodeId),
}

pub struct Cluster {
    transport: Arc<InMemoryTransport>,
    nodes: BTreeMap<String, Arc<Node>>,
    inbound: Vec<JoinHandle<()>>,
    events: EventBus,
}

impl Cluster {
    pub fn new(
        node_ids: Vec<NodeId>,
        mobility: &MobilityConfig,
        channel_capacity: usize,
    ) -> Result<Self, ClusterError> {
        if node_ids.is_empty() {
            return Err(ClusterError::Empty);
        }

        let transport = Arc::new(InMemoryTransport::new());
        let events = EventBus::with_default_capacity();
        let mut nodes = BTreeMap::new();
        let mut inbound = Vec::with_capacity(node_ids.len());

        for id in node_ids {
            if nodes.contains_key(&id.0) {
                return Err(ClusterError::DuplicateNode(id));
            }
            let inbox = transport.register(id.clone(), channel_capacity);
            let node = Arc::new(Node::new(id.clone(), mobility, transport.clone(), events.clone()));
            inbound.push(node.spawn_inbound(inbox));
            nodes.insert(id.0, node);
        }

        info!("Cluster started with {} nodes", nodes.len());
        Ok(Self {
            transport,
            nodes,
            inbound,
            events,
        })
    }

    /// The manifest's node followed by its peers.
    pub fn from_manifest(manifest: &NodeConfigManifest) -> Result<Self, ClusterError> {
        let mut ids = vec![manifest.node_id()];
        ids.extend(manifest.peer_ids());
        Self::new(
            ids,
            &manifest.spec.mobility,
            manifest.spec.cluster.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY),
        )
    }

    /// Register `factory` on every node.
    pub fn register_factory(&self, factory: Arc<dyn UnitFactory>) {
        for node in self.nodes.values() {
            node.register_factory(factory.clone());
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<&Arc<Node>> {
        self.nodes.get(&id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.values().map(|n| n.id().clone()).collect()
    }

    /// Nodes currently hosting `unit_id`; a settled unit lives on exactly one.
    pub fn locate(&self, unit_id: &UnitId) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.hosts(unit_id))
            .map(|n| n.id().clone())
            .collect()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Close every inbox, wait for the inbound loops and drop undelivered
    /// notifications.
    pub async fn shutdown(self) {
        for id in self.nodes.values().map(|n| n.id().clone()) {
            self.transport.unregister(&id);
        }
        for handle in self.inbound {
            if let Err(e) = handle.await {
                warn!("Inbound loop ended abnormally: {}", e);
            }
        }
        for node in self.nodes.values() {
            node.shutdown();
        }
        info!("Cluster stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_empty_and_duplicate_nodes() {
        let mobility = MobilityConfig::default();
        assert_eq!(Cluster::new(vec![], &mobility, 8).err(), Some(ClusterError::Empty));
        assert_eq!(
            Cluster::new(vec![NodeId::new("a"), NodeId::new("a")], &mobility, 8).err(),
            Some(ClusterError::DuplicateNode(NodeId::new("a")))
        );
    }

    #[tokio::test]
    async fn test_from_manifest_includes_peers() {
        let mut manifest = NodeConfigManifest::default();
        manifest.spec.node.id = "node-a".to_string();
        manifest.spec.cluster.peers = vec!["node-b".to_string(), "node-c".to_string()];

        let cluster = Cluster::from_manifest(&manifest).unwrap();
        assert_eq!(
            cluster.node_ids(),
            vec![NodeId::new("node-a"), NodeId::new("node-b"), NodeId::new("node-c")]
        );
        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_survives_a_cancelled_inbound_loop() {
        let cluster = Cluster::new(
            vec![NodeId::new("a"), NodeId::new("b")],
            &MobilityConfig::default(),
            8,
        )
        .unwrap();
        let survivor = cluster.node(&NodeId::new("b")).unwrap().clone();
        cluster.inbound[0].abort();

        tokio::time::timeout(std::time::Duration::from_secs(5), cluster.shutdown())
            .await
            .expect("shutdown did not finish");
        assert!(survivor.unit_ids().is_empty());
    }
}
