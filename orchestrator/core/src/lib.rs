// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Transit Core
//!
//! Live relocation of running units between nodes: tickets, the relocation
//! context and port, the per-step protocol handlers and the event buffer
//! that replays mobility notifications in order.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain types, protocol handlers, state codec and event bus

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
