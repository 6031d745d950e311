// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Recording doubles for handler tests. Unit and port share one journal so
//! tests can assert on the exact interleaving of lifecycle calls, messages
//! and notifications.

use crate::domain::codec::StateCodec;
use crate::domain::errors::{
    ContainerError, LifecycleError, MobilityError, NotificationError, TransportError,
};
use crate::domain::lifecycle::{MobileUnit, RelocationAware};
use crate::domain::port::{MobilityPort, RelocationContext};
use crate::domain::state::{CapturedState, SealedBundle, StateValue};
use crate::domain::ticket::Ticket;
use crate::domain::unit::{Address, NodeId, UnitDescriptor, UnitId};
use crate::infrastructure::codec::BincodeStateCodec;
use parking_lot::Mutex;
use std::sync::Arc;

pub type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Default, Clone, Copy)]
pub struct UnitFaults {
    pub suspend: bool,
    pub resume: bool,
    pub capture: bool,
    pub stop: bool,
    pub unload: bool,
    pub veto: bool,
}

pub struct MockUnit {
    id: UnitId,
    journal: Journal,
    state: Option<CapturedState>,
    faults: UnitFaults,
}

impl MockUnit {
    pub fn new(id: &str, journal: Journal) -> Self {
        Self {
            id: UnitId::new(id),
            journal,
            state: Some(CapturedState::new().with("count", StateValue::Int(41))),
            faults: UnitFaults::default(),
        }
    }

    pub fn with_state(mut self, state: Option<CapturedState>) -> Self {
        self.state = state;
        self
    }

    pub fn with_faults(mut self, faults: UnitFaults) -> Self {
        self.faults = faults;
        self
    }

    fn step(&self, name: &str, fail: bool) -> Result<(), String> {
        self.journal.lock().push(name.to_string());
        if fail {
            Err(format!("{} injected failure", name))
        } else {
            Ok(())
        }
    }
}

impl MobileUnit for MockUnit {
    fn id(&self) -> &UnitId {
        &self.id
    }

    fn descriptor(&self) -> UnitDescriptor {
        UnitDescriptor::new("mock", vec![self.id.0.clone()])
    }

    fn suspend(&self) -> Result<(), LifecycleError> {
        self.step("suspend", self.faults.suspend).map_err(LifecycleError::SuspendFailed)
    }

    fn resume(&self) -> Result<(), LifecycleError> {
        self.step("resume", self.faults.resume).map_err(LifecycleError::ResumeFailed)
    }

    fn stop(&self) -> Result<(), LifecycleError> {
        self.step("stop", self.faults.stop).map_err(LifecycleError::StopFailed)
    }

    fn unload(&self) -> Result<(), LifecycleError> {
        self.step("unload", self.faults.unload).map_err(LifecycleError::UnloadFailed)
    }

    fn capture_state(&self) -> Result<Option<CapturedState>, LifecycleError> {
        self.step("capture", self.faults.capture).map_err(LifecycleError::CaptureFailed)?;
        Ok(self.state.clone())
    }

    fn relocation_hook(&self) -> Option<&dyn RelocationAware> {
        Some(self)
    }
}

impl RelocationAware for MockUnit {
    fn before_relocation(&self, _ticket: &Ticket) -> Result<(), LifecycleError> {
        self.step("before_relocation", self.faults.veto).map_err(LifecycleError::Refused)
    }
}

#[derive(Default, Clone, Copy)]
pub struct PortFaults {
    pub send: bool,
    pub add: bool,
    pub remove: bool,
    pub notify: bool,
}

pub struct MockPort {
    pub journal: Journal,
    pub unit: Option<Arc<dyn MobileUnit>>,
    pub codec: BincodeStateCodec,
    pub faults: PortFaults,
    pub transfers: Mutex<Vec<(NodeId, SealedBundle)>>,
    pub nacks: Mutex<Vec<MobilityError>>,
    pub failures: Mutex<Vec<MobilityError>>,
    pub added: Mutex<Vec<(UnitDescriptor, Option<CapturedState>)>>,
}

impl MockPort {
    pub fn new(journal: Journal, unit: Option<Arc<dyn MobileUnit>>) -> Self {
        Self {
            journal,
            unit,
            codec: BincodeStateCodec::default(),
            faults: PortFaults::default(),
            transfers: Mutex::new(vec![]),
            nacks: Mutex::new(vec![]),
            failures: Mutex::new(vec![]),
            added: Mutex::new(vec![]),
        }
    }

    pub fn with_faults(mut self, faults: PortFaults) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_codec(mut self, codec: BincodeStateCodec) -> Self {
        self.codec = codec;
        self
    }

    fn log(&self, entry: &str) {
        self.journal.lock().push(entry.to_string());
    }

    fn notification(&self, entry: &str) -> Result<(), NotificationError> {
        self.log(entry);
        if self.faults.notify {
            Err(NotificationError(format!("{} listener crashed", entry)))
        } else {
            Ok(())
        }
    }
}

impl MobilityPort for MockPort {
    fn unit(&self, ctx: &RelocationContext) -> Result<Arc<dyn MobileUnit>, ContainerError> {
        self.unit
            .clone()
            .ok_or_else(|| ContainerError::NotFound(ctx.unit_id().clone()))
    }

    fn codec(&self) -> &dyn StateCodec {
        &self.codec
    }

    fn send_transfer(
        &self,
        _ctx: &RelocationContext,
        destination: &NodeId,
        bundle: SealedBundle,
    ) -> Result<(), TransportError> {
        self.log("send_transfer");
        if self.faults.send {
            return Err(TransportError::Closed(destination.clone()));
        }
        self.transfers.lock().push((destination.clone(), bundle));
        Ok(())
    }

    fn send_ack(&self, ctx: &RelocationContext) -> Result<(), TransportError> {
        self.log("send_ack");
        if self.faults.send {
            return Err(TransportError::Closed(ctx.requester().node.clone()));
        }
        Ok(())
    }

    fn send_nack(&self, _ctx: &RelocationContext, cause: &MobilityError) -> Result<(), TransportError> {
        self.log("send_nack");
        self.nacks.lock().push(cause.clone());
        Ok(())
    }

    fn add_unit(
        &self,
        _ctx: &RelocationContext,
        descriptor: &UnitDescriptor,
        state: Option<CapturedState>,
    ) -> Result<(), ContainerError> {
        self.log("add_unit");
        if self.faults.add {
            return Err(ContainerError::UnknownKind(descriptor.kind.clone()));
        }
        self.added.lock().push((descriptor.clone(), state));
        Ok(())
    }

    fn remove_unit(&self, ctx: &RelocationContext) -> Result<(), ContainerError> {
        self.log("remove_unit");
        if self.faults.remove {
            return Err(ContainerError::NotFound(ctx.unit_id().clone()));
        }
        Ok(())
    }

    fn on_dispatch(&self, _ctx: &RelocationContext) -> Result<(), NotificationError> {
        self.notification("on_dispatch")
    }

    fn on_arrival(&self, _ctx: &RelocationContext) -> Result<(), NotificationError> {
        self.notification("on_arrival")
    }

    fn on_failure(&self, _ctx: &RelocationContext, cause: &MobilityError) -> Result<(), NotificationError> {
        self.failures.lock().push(cause.clone());
        self.notification("on_failure")
    }

    fn on_removal(&self, _ctx: &RelocationContext) -> Result<(), NotificationError> {
        self.notification("on_removal")
    }
}

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().clone()
}

pub fn context(unit: &str, node: &str, ticket: impl Into<Ticket>) -> RelocationContext {
    RelocationContext::new(
        UnitId::new(unit),
        NodeId::new(node),
        Address::unit(NodeId::new(node), UnitId::new(unit)),
        ticket.into(),
    )
}
