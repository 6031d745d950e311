// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Relocation Tickets
//!
//! A ticket is an immutable request to add, move or remove a unit. Tickets
//! are plain values: equality and hashing are structural over every field,
//! and `Display` is a debugging aid only.
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | [`MoveTicket`] | relocate an existing unit (or restart it in place) |
//! | [`AddTicket`] | materialize a unit from a state-bundle on a node |
//! | [`RemoveTicket`] | tear a unit down on its node |

use crate::domain::errors::TicketError;
use crate::domain::state::StateBundle;
use crate::domain::unit::{NodeId, TicketId, UnitDescriptor, UnitId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveTicket {
    id: Option<TicketId>,
    /// `None` means "the requesting unit itself".
    unit_id: Option<UnitId>,
    /// When set, must match the node the ticket executes on.
    origin: Option<NodeId>,
    /// `None` means "stay where you are".
    destination: Option<NodeId>,
    force_restart: bool,
}

impl MoveTicket {
    pub fn new(
        id: Option<TicketId>,
        unit_id: Option<UnitId>,
        origin: Option<NodeId>,
        destination: Option<NodeId>,
        force_restart: bool,
    ) -> Self {
        Self {
            id,
            unit_id,
            origin,
            destination,
            force_restart,
        }
    }

    /// Move `unit_id` to `destination` under a fresh ticket id.
    pub fn to(unit_id: UnitId, destination: NodeId) -> Self {
        Self::new(Some(TicketId::new()), Some(unit_id), None, Some(destination), false)
    }

    /// Suspend, serialize and restart `unit_id` on the node it lives on.
    pub fn restart(unit_id: UnitId) -> Self {
        Self::new(Some(TicketId::new()), Some(unit_id), None, None, true)
    }

    pub fn with_origin(mut self, origin: NodeId) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn id(&self) -> Option<TicketId> {
        self.id
    }

    pub fn unit_id(&self) -> Option<&UnitId> {
        self.unit_id.as_ref()
    }

    pub fn origin(&self) -> Option<&NodeId> {
        self.origin.as_ref()
    }

    pub fn destination(&self) -> Option<&NodeId> {
        self.destination.as_ref()
    }

    pub fn force_restart(&self) -> bool {
        self.force_restart
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddTicket {
    id: TicketId,
    unit_id: UnitId,
    bundle: StateBundle,
    destination: NodeId,
}

impl AddTicket {
    /// Build an add ticket.
    ///
    /// Without a bundle, a descriptor of the default kind is synthesized for
    /// `unit_id`. With one, its descriptor must name `unit_id` as its first
    /// parameter.
    pub fn new(
        id: TicketId,
        unit_id: UnitId,
        bundle: Option<StateBundle>,
        destination: NodeId,
    ) -> Result<Self, TicketError> {
        if unit_id.is_empty() {
            return Err(TicketError::EmptyUnitId);
        }
        let bundle = match bundle {
            Some(bundle) => {
                match bundle.descriptor.unit_id() {
                    None => {
                        return Err(TicketError::EmptyDescriptor { expected: unit_id });
                    }
                    Some(found) if found != unit_id => {
                        return Err(TicketError::DescriptorMismatch {
                            expected: unit_id,
                            found,
                        });
                    }
                    Some(_) => {}
                }
                bundle
            }
            None => StateBundle::new(UnitDescriptor::synthesized(&unit_id), None),
        };
        Ok(Self {
            id,
            unit_id,
            bundle,
            destination,
        })
    }

    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn unit_id(&self) -> &UnitId {
        &self.unit_id
    }

    pub fn bundle(&self) -> &StateBundle {
        &self.bundle
    }

    pub fn destination(&self) -> &NodeId {
        &self.destination
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoveTicket {
    id: TicketId,
    unit_id: UnitId,
    destination: NodeId,
}

impl RemoveTicket {
    pub fn new(id: TicketId, unit_id: UnitId, destination: NodeId) -> Self {
        Self {
            id,
            unit_id,
            destination,
        }
    }

    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn unit_id(&self) -> &UnitId {
        &self.unit_id
    }

    pub fn destination(&self) -> &NodeId {
        &self.destination
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ticket {
    Move(MoveTicket),
    Add(AddTicket),
    Remove(RemoveTicket),
}

impl Ticket {
    pub fn id(&self) -> Option<TicketId> {
        match self {
            Ticket::Move(t) => t.id(),
            Ticket::Add(t) => Some(t.id()),
            Ticket::Remove(t) => Some(t.id()),
        }
    }

    pub fn unit_id(&self) -> Option<&UnitId> {
        match self {
            Ticket::Move(t) => t.unit_id(),
            Ticket::Add(t) => Some(t.unit_id()),
            Ticket::Remove(t) => Some(t.unit_id()),
        }
    }

    pub fn destination(&self) -> Option<&NodeId> {
        match self {
            Ticket::Move(t) => t.destination(),
            Ticket::Add(t) => Some(t.destination()),
            Ticket::Remove(t) => Some(t.destination()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Ticket::Move(_) => "move",
            Ticket::Add(_) => "add",
            Ticket::Remove(_) => "remove",
        }
    }
}

impl From<MoveTicket> for Ticket {
    fn from(t: MoveTicket) -> Self {
        Ticket::Move(t)
    }
}

impl From<AddTicket> for Ticket {
    fn from(t: AddTicket) -> Self {
        Ticket::Add(t)
    }
}

impl From<RemoveTicket> for Ticket {
    fn from(t: RemoveTicket) -> Self {
        Ticket::Remove(t)
    }
}

fn or_dash<T: fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ticket::Move(t) => write!(
                f,
                "move[{}] {} {} -> {}{}",
                or_dash(t.id()),
                or_dash(t.unit_id()),
                or_dash(t.origin()),
                or_dash(t.destination()),
                if t.force_restart() { " (restart)" } else { "" }
            ),
            Ticket::Add(t) => write!(
                f,
                "add[{}] {} ({}) -> {}",
                t.id(),
                t.unit_id(),
                t.bundle().descriptor.kind,
                t.destination()
            ),
            Ticket::Remove(t) => {
                write!(f, "remove[{}] {} @ {}", t.id(), t.unit_id(), t.destination())
            }
        }
    }
}
