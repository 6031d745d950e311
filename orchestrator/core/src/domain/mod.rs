// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Relocation Domain Layer
//!
//! Pure value types and capability traits for the relocation protocol. No I/O.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`unit`] | `UnitId`, `NodeId`, `TicketId`, `Address`, `UnitDescriptor` |
//! | [`state`] | `CapturedState`, `StateBundle`, `SealedBundle` |
//! | [`ticket`] | `Ticket`, `MoveTicket`, `AddTicket`, `RemoveTicket` |
//! | [`events`] | `MobilityEvent`, `MobilityListener`, `RelocationEvent` |
//! | [`errors`] | `MobilityError` and its component errors |
//! | [`lifecycle`] | `MobileUnit`, `RelocationAware`, `UnitFactory` |
//! | [`codec`] | `StateCodec` |
//! | [`port`] | `RelocationContext`, `MobilityPort` |
//! | [`transport`] | `MobilityMessage`, `Transport` |
//! | [`node_config`] | `NodeConfigManifest` |

pub mod unit;
pub mod state;
pub mod ticket;
pub mod events;
pub mod errors;
pub mod lifecycle;
pub mod codec;
pub mod port;
pub mod transport;
pub mod node_config;
