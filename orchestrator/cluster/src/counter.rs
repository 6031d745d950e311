// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Counter Unit
//!
//! A minimal relocatable unit: one integer that survives every move. Used by
//! the simulation command and the cluster tests.
//!
//! Descriptor layout: `counter <unit-id> [flag...]`. Flags inject faults:
//!
//! | Flag | Effect |
//! |------|--------|
//! | `fail-suspend`, `fail-resume`, `fail-stop`, `fail-unload`, `fail-capture` | that lifecycle call errors |
//! | `veto` | the pre-relocation hook refuses every ticket |
//! | `pinned` | captured state carries a live handle and cannot be serialized |

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use transit_core::domain::errors::{ContainerError, LifecycleError, MobilityError};
use transit_core::domain::events::MobilityListener;
use transit_core::domain::lifecycle::{MobileUnit, RelocationAware, UnitFactory};
use transit_core::domain::state::{CapturedState, StateValue};
use transit_core::domain::ticket::Ticket;
use transit_core::domain::unit::{UnitDescriptor, UnitId};

pub const COUNTER_KIND: &str = "counter";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterFaults {
    pub suspend: bool,
    pub resume: bool,
    pub stop: bool,
    pub unload: bool,
    pub capture: bool,
    pub veto: bool,
    pub pinned: bool,
}

impl CounterFaults {
    fn from_flags<'a>(flags: impl Iterator<Item = &'a String>) -> Result<Self, ContainerError> {
        let mut faults = Self::default();
        for flag in flags {
            match flag.as_str() {
                "fail-suspend" => faults.suspend = true,
                "fail-resume" => faults.resume = true,
                "fail-stop" => faults.stop = true,
                "fail-unload" => faults.unload = true,
                "fail-capture" => faults.capture = true,
                "veto" => faults.veto = true,
                "pinned" => faults.pinned = true,
                other => {
                    return Err(ContainerError::BuildFailed(format!("unknown counter flag '{}'", other)))
                }
            }
        }
        Ok(faults)
    }

    fn flags(&self) -> Vec<String> {
        [
            (self.suspend, "fail-suspend"),
            (self.resume, "fail-resume"),
            (self.stop, "fail-stop"),
            (self.unload, "fail-unload"),
            (self.capture, "fail-capture"),
            (self.veto, "veto"),
            (self.pinned, "pinned"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, flag)| flag.to_string())
        .collect()
    }
}

pub struct CounterUnit {
    id: UnitId,
    count: AtomicI64,
    suspended: AtomicBool,
    stopped: AtomicBool,
    faults: CounterFaults,
    history: Mutex<Vec<String>>,
}

impl CounterUnit {
    pub fn new(id: UnitId, count: i64, faults: CounterFaults) -> Self {
        Self {
            id,
            count: AtomicI64::new(count),
            suspended: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            faults,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn descriptor_for(id: &UnitId, faults: CounterFaults) -> UnitDescriptor {
        let mut params = vec![id.0.clone()];
        params.extend(faults.flags());
        UnitDescriptor::new(COUNTER_KIND, params)
    }

    /// Count one unit of work. Returns `None` while suspended or stopped.
    pub fn increment(&self) -> Option<i64> {
        if self.is_suspended() || self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.count.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// Mobility notifications this instance received, as `dispatch`,
    /// `arrival` or `failure`.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    fn check(&self, injected: bool, stage: &str) -> Result<(), String> {
        if injected {
            Err(format!("{} refused by {}", stage, self.id))
        } else {
            Ok(())
        }
    }
}

impl MobileUnit for CounterUnit {
    fn id(&self) -> &UnitId {
        &self.id
    }

    fn descriptor(&self) -> UnitDescriptor {
        Self::descriptor_for(&self.id, self.faults)
    }

    fn suspend(&self) -> Result<(), LifecycleError> {
        self.check(self.faults.suspend, "suspend")
            .map_err(LifecycleError::SuspendFailed)?;
        self.suspended.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> Result<(), LifecycleError> {
        self.check(self.faults.resume, "resume")
            .map_err(LifecycleError::ResumeFailed)?;
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), LifecycleError> {
        self.check(self.faults.stop, "stop").map_err(LifecycleError::StopFailed)?;
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unload(&self) -> Result<(), LifecycleError> {
        self.check(self.faults.unload, "unload")
            .map_err(LifecycleError::UnloadFailed)
    }

    fn capture_state(&self) -> Result<Option<CapturedState>, LifecycleError> {
        self.check(self.faults.capture, "capture")
            .map_err(LifecycleError::CaptureFailed)?;
        let mut state = CapturedState::new().with("count", StateValue::Int(self.count()));
        if self.faults.pinned {
            state.insert("lease", StateValue::Handle(format!("lease:{}", self.id)));
        }
        Ok(Some(state))
    }

    fn relocation_hook(&self) -> Option<&dyn RelocationAware> {
        Some(self)
    }

    fn mobility_listener(&self) -> Option<&dyn MobilityListener> {
        Some(self)
    }
}

impl RelocationAware for CounterUnit {
    fn before_relocation(&self, ticket: &Ticket) -> Result<(), LifecycleError> {
        if self.faults.veto {
            return Err(LifecycleError::Refused(format!("{} stays put ({})", self.id, ticket.kind())));
        }
        Ok(())
    }
}

impl MobilityListener for CounterUnit {
    fn on_dispatch(&self, _ticket: &Ticket) {
        self.history.lock().push("dispatch".to_string());
    }

    fn on_arrival(&self, _ticket: &Ticket) {
        self.history.lock().push("arrival".to_string());
    }

    fn on_failure(&self, _ticket: &Ticket, _cause: &MobilityError) {
        self.history.lock().push("failure".to_string());
    }
}

/// Builds [`CounterUnit`]s and keeps a handle on every instance it built,
/// so callers can inspect units through their concrete type.
pub struct CounterFactory {
    kind: String,
    built: Mutex<Vec<Arc<CounterUnit>>>,
}

impl CounterFactory {
    pub fn new() -> Self {
        Self::with_kind(COUNTER_KIND)
    }

    /// Serve another descriptor kind, such as the default kind of add
    /// tickets without a bundle.
    pub fn with_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            built: Mutex::new(Vec::new()),
        }
    }

    /// The most recent instance built for `id`.
    pub fn latest(&self, id: &UnitId) -> Option<Arc<CounterUnit>> {
        self.built.lock().iter().rev().find(|u| &u.id == id).cloned()
    }
}

impl Default for CounterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitFactory for CounterFactory {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn build(
        &self,
        descriptor: &UnitDescriptor,
        state: Option<CapturedState>,
    ) -> Result<Arc<dyn MobileUnit>, ContainerError> {
        let id = descriptor
            .unit_id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ContainerError::BuildFailed("descriptor carries no unit id".to_string()))?;
        let faults = CounterFaults::from_flags(descriptor.params.iter().skip(1))?;
        let count = match state.as_ref().map(|s| s.get("count")) {
            None | Some(None) => 0,
            Some(Some(StateValue::Int(n))) => *n,
            Some(Some(other)) => {
                return Err(ContainerError::BuildFailed(format!("count is not an integer: {:?}", other)))
            }
        };

        let unit = Arc::new(CounterUnit::new(id, count, faults));
        self.built.lock().push(unit.clone());
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transit_core::domain::ticket::MoveTicket;
    use transit_core::domain::unit::NodeId;

    #[test]
    fn test_descriptor_round_trips_through_factory() {
        let faults = CounterFaults {
            veto: true,
            pinned: true,
            ..Default::default()
        };
        let descriptor = CounterUnit::descriptor_for(&UnitId::new("c1"), faults);
        assert_eq!(descriptor.params, vec!["c1", "veto", "pinned"]);

        let factory = CounterFactory::new();
        let unit = factory
            .build(&descriptor, Some(CapturedState::new().with("count", StateValue::Int(8))))
            .unwrap();
        assert_eq!(unit.descriptor(), descriptor);
        assert_eq!(factory.latest(&UnitId::new("c1")).unwrap().count(), 8);
    }

    #[test]
    fn test_suspended_counter_does_no_work() {
        let unit = CounterUnit::new(UnitId::new("c1"), 0, CounterFaults::default());
        assert_eq!(unit.increment(), Some(1));
        unit.suspend().unwrap();
        assert_eq!(unit.increment(), None);
        unit.resume().unwrap();
        assert_eq!(unit.increment(), Some(2));
    }

    #[test]
    fn test_pinned_state_carries_a_handle() {
        let unit = CounterUnit::new(
            UnitId::new("c1"),
            3,
            CounterFaults {
                pinned: true,
                ..Default::default()
            },
        );
        let state = unit.capture_state().unwrap().unwrap();
        assert!(matches!(state.get("lease"), Some(StateValue::Handle(_))));
    }

    #[test]
    fn test_veto_refuses_relocation() {
        let unit = CounterUnit::new(
            UnitId::new("c1"),
            0,
            CounterFaults {
                veto: true,
                ..Default::default()
            },
        );
        let ticket: Ticket = MoveTicket::to(UnitId::new("c1"), NodeId::new("node-b")).into();
        let hook = unit.relocation_hook().unwrap();
        assert!(matches!(hook.before_relocation(&ticket), Err(LifecycleError::Refused(_))));
    }

    #[test]
    fn test_factory_rejects_bad_input() {
        let factory = CounterFactory::new();
        assert!(matches!(
            factory.build(&UnitDescriptor::new(COUNTER_KIND, vec![]), None),
            Err(ContainerError::BuildFailed(_))
        ));
        assert!(matches!(
            factory.build(
                &UnitDescriptor::new(COUNTER_KIND, vec!["c1".to_string(), "explode".to_string()]),
                None
            ),
            Err(ContainerError::BuildFailed(_))
        ));
        let text = CapturedState::new().with("count", StateValue::Text("nine".to_string()));
        assert!(factory
            .build(&UnitDescriptor::new(COUNTER_KIND, vec!["c1".to_string()]), Some(text))
            .is_err());
    }
}
