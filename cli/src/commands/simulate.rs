// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Relocation simulation
//!
//! Deploys a counter unit on the first node of an in-process cluster, does
//! some work between moves, and relocates it round-robin across the nodes
//! (or restarts it in place). Every relocation event is printed as it
//! settles.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use transit_cluster::{Cluster, CounterFactory, COUNTER_KIND};
use transit_core::application::handlers::StepOutcome;
use transit_core::domain::events::RelocationEvent;
use transit_core::domain::node_config::NodeConfigManifest;
use transit_core::domain::state::{CapturedState, StateBundle, StateValue};
use transit_core::domain::ticket::{AddTicket, MoveTicket};
use transit_core::domain::unit::{Address, NodeId, TicketId, UnitDescriptor, UnitId};
use transit_core::infrastructure::event_bus::{EventBusError, EventReceiver};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Args, Clone)]
pub struct SimulateCommand {
    /// Number of nodes to start when the configuration lists no peers
    #[arg(short, long, default_value_t = 3)]
    pub nodes: usize,

    /// Number of relocations to perform
    #[arg(short, long, default_value_t = 5)]
    pub moves: usize,

    /// Restart the unit in place instead of moving it
    #[arg(long)]
    pub force_restart: bool,

    /// Id of the simulated unit
    #[arg(long, default_value = "counter-1")]
    pub unit: String,

    /// Increments performed between two relocations
    #[arg(long, default_value_t = 1)]
    pub work: u32,

    /// Counter fault flag (fail-suspend, fail-resume, fail-stop, fail-unload,
    /// fail-capture, veto, pinned); repeatable
    #[arg(long = "fault", value_name = "FLAG")]
    pub faults: Vec<String>,
}

impl Default for SimulateCommand {
    fn default() -> Self {
        Self {
            nodes: 3,
            moves: 5,
            force_restart: false,
            unit: "counter-1".to_string(),
            work: 1,
            faults: Vec::new(),
        }
    }
}

/// One relocation and the events it produced.
#[derive(Debug)]
pub struct MoveRecord {
    pub from: NodeId,
    pub to: NodeId,
    pub outcome: StepOutcome,
    pub events: Vec<RelocationEvent>,
}

#[derive(Debug)]
pub struct SimulationReport {
    pub moves: Vec<MoveRecord>,
    pub final_node: Option<NodeId>,
    pub final_count: Option<i64>,
}

impl SimulationReport {
    pub fn arrivals(&self) -> usize {
        self.moves
            .iter()
            .filter(|m| matches!(m.outcome, StepOutcome::Arrived { .. }))
            .count()
    }
}

pub async fn handle_command(
    command: SimulateCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let manifest = NodeConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    manifest
        .validate()
        .context("Configuration validation failed")?;

    let cluster = build_cluster(&manifest, command.nodes)?;
    let factory = Arc::new(CounterFactory::new());
    cluster.register_factory(factory.clone());

    println!(
        "{}",
        format!(
            "Cluster: {}",
            cluster
                .node_ids()
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
        .bold()
    );

    let mut events = cluster.events().subscribe();
    let result = run_simulation(&cluster, &factory, &command, &mut events).await;
    cluster.shutdown().await;
    let report = result?;

    for (i, record) in report.moves.iter().enumerate() {
        println!();
        println!(
            "{} {} -> {}",
            format!("Move {}:", i + 1).bold(),
            record.from,
            record.to
        );
        for event in &record.events {
            println!("  {}", describe(event));
        }
        println!("  {}", describe_outcome(&record.outcome));
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  Arrivals: {}/{}", report.arrivals(), report.moves.len());
    match (&report.final_node, report.final_count) {
        (Some(node), Some(count)) => println!("  {} on {} with count {}", command.unit, node, count),
        _ => println!("  {}", format!("{} is no longer hosted", command.unit).yellow()),
    }

    Ok(())
}

/// The configured node and its peers, or `node-1..node-N` when the
/// configuration names no peers.
pub fn build_cluster(manifest: &NodeConfigManifest, nodes: usize) -> Result<Cluster> {
    if !manifest.spec.cluster.peers.is_empty() {
        return Cluster::from_manifest(manifest).context("Failed to start cluster");
    }
    if nodes == 0 {
        bail!("--nodes must be at least 1");
    }
    let ids = (1..=nodes).map(|i| NodeId::new(format!("node-{}", i))).collect();
    Cluster::new(
        ids,
        &manifest.spec.mobility,
        manifest
            .spec
            .cluster
            .channel_capacity
            .unwrap_or(transit_cluster::transport::DEFAULT_CHANNEL_CAPACITY),
    )
    .context("Failed to start cluster")
}

pub async fn run_simulation(
    cluster: &Cluster,
    factory: &CounterFactory,
    command: &SimulateCommand,
    events: &mut EventReceiver,
) -> Result<SimulationReport> {
    let ids = cluster.node_ids();
    let first = ids.first().cloned().context("Cluster has no nodes")?;
    let unit = UnitId::new(command.unit.clone());

    let mut params = vec![command.unit.clone()];
    params.extend(command.faults.iter().cloned());
    let bundle = StateBundle::new(
        UnitDescriptor::new(COUNTER_KIND, params),
        Some(CapturedState::new().with("count", StateValue::Int(0))),
    );
    let add = AddTicket::new(TicketId::new(), unit.clone(), Some(bundle), first.clone())?;
    let node = cluster.node(&first).context("First node vanished")?.clone();
    match node.submit(add.into(), Address::node(first.clone())).await? {
        StepOutcome::Arrived { .. } => info!("Deployed {} on {}", unit, first),
        other => bail!("Failed to deploy {}: {:?}", unit, other),
    }
    drain(events);

    let mut moves = Vec::with_capacity(command.moves);
    for _ in 0..command.moves {
        let here = cluster
            .locate(&unit)
            .into_iter()
            .next()
            .with_context(|| format!("{} is not hosted anywhere", unit))?;

        if let Some(counter) = factory.latest(&unit) {
            for _ in 0..command.work {
                counter.increment();
            }
        }

        let (ticket, to) = if command.force_restart {
            (MoveTicket::restart(unit.clone()), here.clone())
        } else {
            let next = ids.iter().position(|n| n == &here).map_or(0, |p| p + 1) % ids.len();
            let to = ids[next].clone();
            (MoveTicket::to(unit.clone(), to.clone()), to)
        };

        let node = cluster
            .node(&here)
            .with_context(|| format!("Node {} vanished", here))?
            .clone();
        let outcome = tokio::time::timeout(
            SETTLE_TIMEOUT,
            node.submit(ticket.into(), Address::unit(here.clone(), unit.clone())),
        )
        .await
        .with_context(|| format!("Relocation of {} did not settle", unit))??;

        if let StepOutcome::Failed(cause) = &outcome {
            warn!("Relocation of {} from {} failed: {}", unit, here, cause);
        }
        moves.push(MoveRecord {
            from: here,
            to,
            outcome,
            events: drain(events),
        });
    }

    Ok(SimulationReport {
        moves,
        final_node: cluster.locate(&unit).into_iter().next(),
        final_count: factory.latest(&unit).map(|c| c.count()),
    })
}

/// Events published so far. Every handler publishes before its step
/// settles, so this is complete once `submit` has returned.
fn drain(events: &mut EventReceiver) -> Vec<RelocationEvent> {
    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => seen.push(event),
            Err(EventBusError::Lagged(_)) => continue,
            Err(EventBusError::Empty) | Err(EventBusError::Closed) => return seen,
        }
    }
}

fn describe(event: &RelocationEvent) -> String {
    match event {
        RelocationEvent::Dispatched { node_id, ticket, .. } => {
            format!("{} {} {}", "dispatched".cyan(), node_id, ticket)
        }
        RelocationEvent::Suspended { node_id, .. } => format!("{} on {}", "suspended".dimmed(), node_id),
        RelocationEvent::Resumed { node_id, .. } => format!("{} on {}", "resumed".dimmed(), node_id),
        RelocationEvent::TransferSent { from, to, bytes, .. } => {
            format!("{} {} -> {} ({} bytes)", "transfer".blue(), from, to, bytes)
        }
        RelocationEvent::Arrived { node_id, .. } => format!("{} at {}", "arrived".green(), node_id),
        RelocationEvent::Failed { node_id, reason, .. } => {
            format!("{} at {}: {}", "failed".red(), node_id, reason)
        }
        RelocationEvent::Removed { node_id, .. } => format!("{} from {}", "removed".yellow(), node_id),
    }
}

fn describe_outcome(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Arrived { teardown: None } => format!("{}", "✓ arrived".green()),
        StepOutcome::Arrived {
            teardown: Some(cause),
        } => format!("{} (teardown: {})", "✓ arrived".green(), cause),
        StepOutcome::Failed(cause) => format!("{} {}", "✗ failed:".red(), cause),
        other => other.label().to_string(),
    }
}
