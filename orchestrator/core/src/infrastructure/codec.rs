// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Captured-state Codec
//!
//! bincode encoding of [`CapturedState`] with an upper bound on the encoded
//! size, so a unit cannot push an arbitrarily large payload through the
//! transport.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements the `StateCodec` port

use crate::domain::codec::StateCodec;
use crate::domain::errors::CodecError;
use crate::domain::state::CapturedState;

/// Default upper bound on one encoded state: 4 MiB.
pub const DEFAULT_MAX_STATE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct BincodeStateCodec {
    max_bytes: usize,
    verify: bool,
}

impl BincodeStateCodec {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            verify: false,
        }
    }

    /// When enabled, every encode is decoded again and compared with its
    /// input, so divergent state is caught on the sending side.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

impl Default for BincodeStateCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STATE_BYTES)
    }
}

impl StateCodec for BincodeStateCodec {
    /// Fails with [`CodecError::Encode`] when the state holds a live handle.
    fn encode(&self, state: &CapturedState) -> Result<Vec<u8>, CodecError> {
        let bytes = bincode::serialize(state).map_err(|e| CodecError::Encode(e.to_string()))?;

        if bytes.len() > self.max_bytes {
            return Err(CodecError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }

        if self.verify && &self.decode(&bytes)? != state {
            return Err(CodecError::Divergent);
        }

        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<CapturedState, CodecError> {
        if bytes.len() > self.max_bytes {
            return Err(CodecError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::{SealedBundle, StateBundle, StateValue};
    use crate::domain::unit::UnitDescriptor;
    use std::collections::BTreeMap;

    fn sample() -> CapturedState {
        let mut nested = BTreeMap::new();
        nested.insert("depth".to_string(), StateValue::Int(2));
        CapturedState::new()
            .with("count", StateValue::Int(-17))
            .with("name", StateValue::Text("counter".to_string()))
            .with("flags", StateValue::List(vec![StateValue::Bool(true), StateValue::Null]))
            .with("blob", StateValue::Bytes(vec![0, 1, 2, 255]))
            .with("meta", StateValue::Map(nested))
    }

    #[test]
    fn test_round_trip_preserves_every_value_kind() {
        let codec = BincodeStateCodec::default();
        let state = sample();
        assert_eq!(codec.round_trip(&state).unwrap(), state);
    }

    #[test]
    fn test_handle_is_refused() {
        let codec = BincodeStateCodec::default();
        let state = sample().with("socket", StateValue::Handle("tcp:4000".to_string()));

        assert!(matches!(codec.encode(&state), Err(CodecError::Encode(_))));
    }

    #[test]
    fn test_size_limit() {
        let codec = BincodeStateCodec::new(32);
        let state = CapturedState::new().with("blob", StateValue::Bytes(vec![0; 64]));

        match codec.encode(&state) {
            Err(CodecError::TooLarge { size, max }) => {
                assert!(size > 64);
                assert_eq!(max, 32);
            }
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_verified_encode_accepts_stable_state() {
        let codec = BincodeStateCodec::default().with_verification(true);
        let bytes = codec.encode(&sample()).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_garbage_does_not_decode() {
        let codec = BincodeStateCodec::default();
        assert!(matches!(codec.decode(&[0xff; 3]), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_seal_and_unseal_bundle() {
        let codec = BincodeStateCodec::default();
        let bundle = StateBundle::new(UnitDescriptor::new("counter", vec!["u1".to_string()]), Some(sample()));

        let sealed = codec.seal(bundle.clone()).unwrap();
        assert!(sealed.encoded_len() > 0);
        assert_eq!(codec.unseal(sealed).unwrap(), bundle);

        let empty = SealedBundle {
            descriptor: UnitDescriptor::new("counter", vec!["u2".to_string()]),
            state: None,
        };
        assert!(codec.unseal(empty).unwrap().state.is_none());
    }
}
