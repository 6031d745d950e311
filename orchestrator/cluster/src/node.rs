// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Node Host
//!
//! A [`Node`] hosts units and runs the relocation protocol for them. It is
//! the [`MobilityPort`] every handler on the node talks to:
//!
//! - units live in a map keyed by id and are built by the [`UnitFactory`]
//!   registered for their descriptor kind;
//! - notifications are recorded into a per-unit [`EventBuffer`] and flushed
//!   after every step to the unit's resolved listener;
//! - protocol messages leave through the node's [`Transport`] and come back
//!   through [`Node::handle_message`].
//!
//! Handlers are synchronous, so each step runs on the tokio blocking pool.
//! A submitted ticket that goes remote stays pending until the matching
//! ack or nack has been processed; at most one attempt per unit is in
//! flight on a node.

use crate::NodeError;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use transit_core::application::event_buffer::EventBuffer;
use transit_core::application::handlers::{AckHandler, ArrivalHandler, Handler, NackHandler, StepOutcome};
use transit_core::domain::codec::StateCodec;
use transit_core::domain::errors::{ContainerError, MobilityError, NotificationError, TransportError};
use transit_core::domain::events::{MobilityEventKind, MobilityListener, RelocationEvent};
use transit_core::domain::lifecycle::{MobileUnit, UnitFactory};
use transit_core::domain::node_config::MobilityConfig;
use transit_core::domain::port::{MobilityPort, ProtocolStep, RelocationContext};
use transit_core::domain::state::{CapturedState, SealedBundle};
use transit_core::domain::ticket::Ticket;
use transit_core::domain::transport::{MobilityMessage, Transport};
use transit_core::domain::unit::{Address, NodeId, UnitDescriptor, UnitId};
use transit_core::infrastructure::codec::BincodeStateCodec;
use transit_core::infrastructure::event_bus::EventBus;

pub struct Node {
    id: NodeId,
    units: RwLock<HashMap<UnitId, Arc<dyn MobileUnit>>>,
    buffers: RwLock<HashMap<UnitId, Arc<EventBuffer>>>,
    listeners: RwLock<HashMap<UnitId, Arc<dyn MobilityListener>>>,
    factories: RwLock<HashMap<String, Arc<dyn UnitFactory>>>,
    pending: Mutex<HashMap<UnitId, oneshot::Sender<StepOutcome>>>,
    codec: BincodeStateCodec,
    transport: Arc<dyn Transport>,
    events: EventBus,
}

impl Node {
    pub fn new(id: NodeId, mobility: &MobilityConfig, transport: Arc<dyn Transport>, events: EventBus) -> Self {
        Self {
            id,
            units: RwLock::new(HashMap::new()),
            buffers: RwLock::new(HashMap::new()),
            listeners: RwLock::new(HashMap::new()),
            factories: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            codec: BincodeStateCodec::new(mobility.max_state_bytes).with_verification(mobility.verify_round_trip),
            transport,
            events,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn register_factory(&self, factory: Arc<dyn UnitFactory>) {
        let kind = factory.kind().to_string();
        if self.factories.write().insert(kind.clone(), factory).is_some() {
            warn!("Replaced unit factory for kind '{}' on {}", kind, self.id);
        }
    }

    pub fn hosts(&self, unit_id: &UnitId) -> bool {
        self.units.read().contains_key(unit_id)
    }

    pub fn unit_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.units.read().keys().cloned().collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        ids
    }

    pub fn get_unit(&self, unit_id: &UnitId) -> Option<Arc<dyn MobileUnit>> {
        self.units.read().get(unit_id).cloned()
    }

    /// Route `unit_id`'s notifications to `listener` instead of the unit's
    /// own listener capability.
    pub fn subscribe(&self, unit_id: UnitId, listener: Arc<dyn MobilityListener>) {
        self.listeners.write().insert(unit_id, listener);
    }

    pub fn unsubscribe(&self, unit_id: &UnitId) -> bool {
        self.listeners.write().remove(unit_id).is_some()
    }

    /// Notifications recorded for `unit_id` and not yet delivered.
    pub fn pending_events(&self, unit_id: &UnitId) -> usize {
        self.buffers.read().get(unit_id).map(|b| b.len()).unwrap_or(0)
    }

    /// Execute `ticket` on this node and wait for its terminal outcome.
    ///
    /// The unit is the ticket's own unit, or the requester's when the
    /// ticket names none.
    pub async fn submit(self: &Arc<Self>, ticket: Ticket, requester: Address) -> Result<StepOutcome, NodeError> {
        let unit_id = ticket
            .unit_id()
            .cloned()
            .or_else(|| requester.unit.clone())
            .ok_or(NodeError::UnresolvedUnit)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if pending.contains_key(&unit_id) {
                return Err(NodeError::Busy(unit_id));
            }
            pending.insert(unit_id.clone(), tx);
        }

        let ctx = RelocationContext::new(unit_id.clone(), self.id.clone(), requester, ticket);
        let handler = Handler::for_ticket(ctx, self.port());
        let outcome = match self.run_step(handler, &unit_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.pending.lock().remove(&unit_id);
                return Err(e);
            }
        };

        if outcome.is_terminal() {
            self.pending.lock().remove(&unit_id);
            return Ok(outcome);
        }

        debug!("Attempt for {} is awaiting a reply", unit_id);
        rx.await.map_err(|_| NodeError::Interrupted(unit_id))
    }

    /// Process one inbound protocol message.
    pub async fn handle_message(self: &Arc<Self>, message: MobilityMessage) -> Result<StepOutcome, NodeError> {
        debug!("Node {} received {} for {}", self.id, message.name(), message.unit_id());
        match message {
            MobilityMessage::Transfer {
                ticket,
                unit_id,
                origin,
                bundle,
            } => {
                let ctx = RelocationContext::new(unit_id.clone(), self.id.clone(), origin, ticket);
                let handler = Handler::Arrival(ArrivalHandler::new(ctx, self.port(), bundle));
                self.run_step(handler, &unit_id).await
            }
            MobilityMessage::Ack { ticket, unit_id, from } => {
                let ctx = RelocationContext::new(unit_id.clone(), self.id.clone(), Address::node(from), ticket);
                let outcome = self.run_step(Handler::Ack(AckHandler::new(ctx, self.port())), &unit_id).await?;
                self.complete(&unit_id, outcome.clone());
                Ok(outcome)
            }
            MobilityMessage::Nack {
                ticket,
                unit_id,
                from,
                cause,
            } => {
                let ctx = RelocationContext::new(unit_id.clone(), self.id.clone(), Address::node(from), ticket);
                let handler = Handler::Nack(NackHandler::new(ctx, self.port(), cause));
                let outcome = self.run_step(handler, &unit_id).await?;
                self.complete(&unit_id, outcome.clone());
                Ok(outcome)
            }
        }
    }

    /// Consume `inbox` until it closes, one message at a time.
    pub fn spawn_inbound(self: &Arc<Self>, mut inbox: mpsc::Receiver<MobilityMessage>) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                if let Err(e) = node.handle_message(message).await {
                    warn!("Node {} failed to process message: {}", node.id, e);
                }
            }
            debug!("Inbox of {} closed", node.id);
        })
    }

    /// Drop every undelivered notification and release pending submitters.
    pub fn shutdown(&self) {
        let buffers: Vec<Arc<EventBuffer>> = self.buffers.write().drain().map(|(_, b)| b).collect();
        for buffer in buffers {
            buffer.deliver(None);
        }
        self.pending.lock().clear();
        info!("Node {} shut down", self.id);
    }

    fn port(self: &Arc<Self>) -> Arc<dyn MobilityPort> {
        self.clone()
    }

    async fn run_step(self: &Arc<Self>, handler: Handler, unit_id: &UnitId) -> Result<StepOutcome, NodeError> {
        let name = handler.name();
        let before = self.get_unit(unit_id);
        metrics::counter!("transit_relocation_steps_total", "step" => name).increment(1);

        let outcome = tokio::task::spawn_blocking(move || handler.run())
            .await
            .map_err(|e| NodeError::Step {
                step: name,
                reason: e.to_string(),
            })?;

        if matches!(
            outcome,
            StepOutcome::Arrived { .. } | StepOutcome::Failed(_) | StepOutcome::Removed
        ) {
            metrics::counter!("transit_relocation_outcomes_total", "outcome" => outcome.label()).increment(1);
        }

        self.flush(unit_id, before);
        Ok(outcome)
    }

    fn complete(&self, unit_id: &UnitId, outcome: StepOutcome) {
        match self.pending.lock().remove(unit_id) {
            Some(waiter) => {
                let _ = waiter.send(outcome);
            }
            None => debug!("No submitter waiting on {}", unit_id),
        }
    }

    /// Deliver `unit_id`'s buffered notifications to the subscribed listener,
    /// else to the listener capability of the unit hosted now, else to that
    /// of `before` (the instance hosted when the step started, gone after a
    /// move or removal), else discard them.
    fn flush(&self, unit_id: &UnitId, before: Option<Arc<dyn MobileUnit>>) {
        let Some(buffer) = self.buffers.read().get(unit_id).cloned() else {
            return;
        };

        let subscribed = self.listeners.read().get(unit_id).cloned();
        let unit = self.get_unit(unit_id);
        let listener: Option<&dyn MobilityListener> = match (&subscribed, &unit, &before) {
            (Some(listener), _, _) => Some(listener.as_ref()),
            (None, Some(unit), _) => unit.mobility_listener(),
            (None, None, Some(previous)) => previous.mobility_listener(),
            (None, None, None) => None,
        };
        buffer.deliver(listener);

        if unit.is_none() && buffer.is_empty() {
            self.buffers.write().remove(unit_id);
        }
    }

    fn buffer(&self, unit_id: &UnitId) -> Result<Arc<EventBuffer>, NotificationError> {
        if let Some(buffer) = self.buffers.read().get(unit_id) {
            return Ok(buffer.clone());
        }
        let buffer = Arc::new(EventBuffer::new(unit_id.clone()).map_err(|e| NotificationError(e.to_string()))?);
        Ok(self
            .buffers
            .write()
            .entry(unit_id.clone())
            .or_insert(buffer)
            .clone())
    }

    fn record(
        &self,
        ctx: &RelocationContext,
        kind: MobilityEventKind,
        cause: Option<MobilityError>,
    ) -> Result<(), NotificationError> {
        self.buffer(ctx.unit_id())?.record(kind, ctx.ticket().clone(), cause);
        Ok(())
    }

    fn message_origin(&self, ctx: &RelocationContext) -> Address {
        Address::unit(self.id.clone(), ctx.unit_id().clone())
    }
}

impl MobilityPort for Node {
    fn unit(&self, ctx: &RelocationContext) -> Result<Arc<dyn MobileUnit>, ContainerError> {
        self.get_unit(ctx.unit_id())
            .ok_or_else(|| ContainerError::NotFound(ctx.unit_id().clone()))
    }

    fn codec(&self) -> &dyn StateCodec {
        &self.codec
    }

    fn send_transfer(
        &self,
        ctx: &RelocationContext,
        destination: &NodeId,
        bundle: SealedBundle,
    ) -> Result<(), TransportError> {
        self.transport.send(
            destination,
            MobilityMessage::Transfer {
                ticket: ctx.ticket().clone(),
                unit_id: ctx.unit_id().clone(),
                origin: self.message_origin(ctx),
                bundle,
            },
        )
    }

    fn send_ack(&self, ctx: &RelocationContext) -> Result<(), TransportError> {
        self.transport.send(
            &ctx.requester().node,
            MobilityMessage::Ack {
                ticket: ctx.ticket().clone(),
                unit_id: ctx.unit_id().clone(),
                from: self.id.clone(),
            },
        )
    }

    fn send_nack(&self, ctx: &RelocationContext, cause: &MobilityError) -> Result<(), TransportError> {
        self.transport.send(
            &ctx.requester().node,
            MobilityMessage::Nack {
                ticket: ctx.ticket().clone(),
                unit_id: ctx.unit_id().clone(),
                from: self.id.clone(),
                cause: cause.clone(),
            },
        )
    }

    fn add_unit(
        &self,
        ctx: &RelocationContext,
        descriptor: &UnitDescriptor,
        state: Option<CapturedState>,
    ) -> Result<(), ContainerError> {
        let unit_id = ctx.unit_id();
        if self.hosts(unit_id) {
            return Err(ContainerError::AlreadyHosted(unit_id.clone()));
        }
        let factory = self
            .factories
            .read()
            .get(&descriptor.kind)
            .cloned()
            .ok_or_else(|| ContainerError::UnknownKind(descriptor.kind.clone()))?;

        let unit = factory.build(descriptor, state)?;
        if unit.id() != unit_id {
            return Err(ContainerError::BuildFailed(format!(
                "factory '{}' built {} for {}",
                descriptor.kind,
                unit.id(),
                unit_id
            )));
        }

        match self.units.write().entry(unit_id.clone()) {
            Entry::Occupied(_) => return Err(ContainerError::AlreadyHosted(unit_id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(unit);
            }
        }
        info!("Unit {} ({}) now hosted on {}", unit_id, descriptor.kind, self.id);
        Ok(())
    }

    fn remove_unit(&self, ctx: &RelocationContext) -> Result<(), ContainerError> {
        self.units
            .write()
            .remove(ctx.unit_id())
            .map(|_| ())
            .ok_or_else(|| ContainerError::NotFound(ctx.unit_id().clone()))
    }

    fn on_dispatch(&self, ctx: &RelocationContext) -> Result<(), NotificationError> {
        self.events.publish(RelocationEvent::Dispatched {
            unit_id: ctx.unit_id().clone(),
            node_id: self.id.clone(),
            ticket: ctx.ticket().clone(),
            at: Utc::now(),
        });
        self.record(ctx, MobilityEventKind::Dispatch, None)
    }

    fn on_arrival(&self, ctx: &RelocationContext) -> Result<(), NotificationError> {
        self.events.publish(RelocationEvent::Arrived {
            unit_id: ctx.unit_id().clone(),
            node_id: self.id.clone(),
            ticket: ctx.ticket().clone(),
            at: Utc::now(),
        });
        self.record(ctx, MobilityEventKind::Arrival, None)
    }

    fn on_failure(&self, ctx: &RelocationContext, cause: &MobilityError) -> Result<(), NotificationError> {
        self.events.publish(RelocationEvent::Failed {
            unit_id: ctx.unit_id().clone(),
            node_id: self.id.clone(),
            ticket: ctx.ticket().clone(),
            reason: cause.to_string(),
            at: Utc::now(),
        });
        self.record(ctx, MobilityEventKind::Failure, Some(cause.clone()))
    }

    fn on_removal(&self, ctx: &RelocationContext) -> Result<(), NotificationError> {
        self.events.publish(RelocationEvent::Removed {
            unit_id: ctx.unit_id().clone(),
            node_id: self.id.clone(),
            at: Utc::now(),
        });
        Ok(())
    }

    fn on_step(&self, ctx: &RelocationContext, step: ProtocolStep) {
        let unit_id = ctx.unit_id().clone();
        let node_id = self.id.clone();
        let at = Utc::now();
        let event = match step {
            ProtocolStep::Suspended => RelocationEvent::Suspended { unit_id, node_id, at },
            ProtocolStep::Resumed => RelocationEvent::Resumed { unit_id, node_id, at },
            ProtocolStep::TransferSent { bytes } => {
                let to = match ctx.ticket().destination() {
                    Some(dest) => dest.clone(),
                    None => return,
                };
                RelocationEvent::TransferSent {
                    unit_id,
                    from: node_id,
                    to,
                    bytes,
                    at,
                }
            }
            ProtocolStep::TornDown => {
                debug!("Shell of {} torn down on {}", unit_id, node_id);
                return;
            }
        };
        self.events.publish(event);
    }
}
