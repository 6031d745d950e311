// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::errors::CodecError;
use crate::domain::state::{CapturedState, SealedBundle, StateBundle};

/// Turns captured state into bytes the transport can carry and back.
pub trait StateCodec: Send + Sync {
    fn encode(&self, state: &CapturedState) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<CapturedState, CodecError>;

    /// Encode then decode `state`, failing unless the result is equal to the
    /// input.
    fn round_trip(&self, state: &CapturedState) -> Result<CapturedState, CodecError> {
        let bytes = self.encode(state)?;
        let decoded = self.decode(&bytes)?;
        if &decoded != state {
            return Err(CodecError::Divergent);
        }
        Ok(decoded)
    }

    fn seal(&self, bundle: StateBundle) -> Result<SealedBundle, CodecError> {
        let state = bundle.state.as_ref().map(|s| self.encode(s)).transpose()?;
        Ok(SealedBundle {
            descriptor: bundle.descriptor,
            state,
        })
    }

    fn unseal(&self, sealed: SealedBundle) -> Result<StateBundle, CodecError> {
        let state = sealed.state.as_deref().map(|b| self.decode(b)).transpose()?;
        Ok(StateBundle::new(sealed.descriptor, state))
    }
}
