// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_buffer;
pub mod handlers;

pub use event_buffer::{EventBuffer, EventBufferError};
pub use handlers::{Handler, StepOutcome};
