// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Captured Unit State
//!
//! Value types produced when a suspended unit's internal state is captured
//! and consumed once when the unit is reconstituted elsewhere.
//!
//! - [`CapturedState`]: named fields of a unit's state.
//! - [`StateBundle`]: descriptor plus optional captured state.
//! - [`SealedBundle`]: the same pairing after the state went through a
//!   [`StateCodec`](crate::domain::codec::StateCodec), ready for the transport.

use crate::domain::unit::UnitDescriptor;
use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<StateValue>),
    Map(BTreeMap<String, StateValue>),
    /// A live resource (socket, file, timer...) named for diagnostics.
    /// It cannot leave the process that owns it.
    #[serde(serialize_with = "reject_handle")]
    Handle(String),
}

fn reject_handle<S: Serializer>(name: &String, _serializer: S) -> Result<S::Ok, S::Error> {
    Err(S::Error::custom(format!(
        "live handle '{}' is not serializable",
        name
    )))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapturedState {
    fields: BTreeMap<String, StateValue>,
}

impl CapturedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: StateValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: StateValue) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.fields.get(key)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.fields.get(key) {
            Some(StateValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Descriptor + optional captured state, enough to rebuild a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateBundle {
    pub descriptor: UnitDescriptor,
    pub state: Option<CapturedState>,
}

impl StateBundle {
    pub fn new(descriptor: UnitDescriptor, state: Option<CapturedState>) -> Self {
        Self { descriptor, state }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBundle {
    pub descriptor: UnitDescriptor,
    pub state: Option<Vec<u8>>,
}

impl SealedBundle {
    pub fn encoded_len(&self) -> usize {
        self.state.as_ref().map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_state_accessors() {
        let state = CapturedState::new()
            .with("count", StateValue::Int(7))
            .with("label", StateValue::Text("x".to_string()));
        assert_eq!(state.int("count"), Some(7));
        assert_eq!(state.int("label"), None);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_handle_refuses_serialization() {
        let state = CapturedState::new().with("socket", StateValue::Handle("tcp:4000".to_string()));
        let err = serde_json::to_string(&state).unwrap_err();
        assert!(err.to_string().contains("tcp:4000"));
    }
}
