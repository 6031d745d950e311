// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Descriptor kind used when a ticket carries no explicit state-bundle.
pub const DEFAULT_UNIT_KIND: &str = "generic";

/// Address of a relocatable unit (an agent). Stable across nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub Uuid);

impl TicketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who asked for a relocation: always a node, optionally a unit on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub node: NodeId,
    pub unit: Option<UnitId>,
}

impl Address {
    pub fn node(node: NodeId) -> Self {
        Self { node, unit: None }
    }

    pub fn unit(node: NodeId, unit: UnitId) -> Self {
        Self { node, unit: Some(unit) }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{}@{}", unit, self.node),
            None => write!(f, "@{}", self.node),
        }
    }
}

/// Recipe for building a unit: the factory kind plus its construction
/// parameters. By convention the first parameter is the unit's own id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub kind: String,
    pub params: Vec<String>,
}

impl UnitDescriptor {
    pub fn new(kind: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    /// Descriptor synthesized for a unit that was given no explicit recipe.
    pub fn synthesized(unit_id: &UnitId) -> Self {
        Self::new(DEFAULT_UNIT_KIND, vec![unit_id.0.clone()])
    }

    /// The unit id encoded in the first parameter, if any.
    pub fn unit_id(&self) -> Option<UnitId> {
        self.params.first().map(|p| UnitId(p.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_descriptor_carries_unit_id() {
        let id = UnitId::new("counter-1");
        let descriptor = UnitDescriptor::synthesized(&id);
        assert_eq!(descriptor.kind, DEFAULT_UNIT_KIND);
        assert_eq!(descriptor.unit_id(), Some(id));
    }

    #[test]
    fn test_address_display() {
        let addr = Address::unit(NodeId::new("node-a"), UnitId::new("u1"));
        assert_eq!(addr.to_string(), "u1@node-a");
        assert_eq!(Address::node(NodeId::new("node-b")).to_string(), "@node-b");
    }
}
