// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `transit-cluster`: In-process Node Host
//!
//! Hosts relocatable units on nodes and wires several nodes together inside
//! one process, so the relocation protocol from `transit-core` can run end
//! to end without a network.
//!
//! ## Crate Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`node`] | `Node`: unit container, `MobilityPort` implementation, step runner |
//! | [`transport`] | `InMemoryTransport`: per-node mpsc inboxes |
//! | [`cluster`] | `Cluster`: builds nodes and drives their inbound loops |
//! | [`counter`] | `CounterUnit` / `CounterFactory`: a stateful demo unit with fault injection |
//!
//! ## Metrics
//!
//! Nodes emit `transit_relocation_steps_total{step}` for every handler they
//! run and `transit_relocation_outcomes_total{outcome}` for arrivals,
//! failures and removals. No recorder is installed here.

pub mod cluster;
pub mod counter;
pub mod node;
pub mod transport;

pub use cluster::{Cluster, ClusterError};
pub use counter::{CounterFactory, CounterFaults, CounterUnit, COUNTER_KIND};
pub use node::Node;
pub use transport::InMemoryTransport;

use thiserror::Error;
use transit_core::domain::unit::UnitId;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Ticket names no unit and the requester is not a unit")]
    UnresolvedUnit,

    #[error("A relocation of {0} is already in flight on this node")]
    Busy(UnitId),

    #[error("Relocation of {0} was interrupted before a reply arrived")]
    Interrupted(UnitId),

    #[error("Step {step} did not complete: {reason}")]
    Step { step: &'static str, reason: String },
}
