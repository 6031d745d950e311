// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Defines the configuration schema for Transit nodes, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Node identity
// - Mobility limits (captured state size, round-trip verification)
// - Cluster peers
// - Observability settings

use crate::domain::unit::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "transit.dev/v1";
pub const KIND: &str = "NodeConfig";

/// Top-level Kubernetes-style node configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfigManifest {
    /// API version (must be "transit.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "NodeConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: NodeConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfigSpec {
    pub node: NodeIdentity,

    #[serde(default)]
    pub mobility: MobilityConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Unique stable node identifier; units are addressed to nodes by it
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl NodeIdentity {
    pub fn node_id(&self) -> NodeId {
        NodeId::new(self.id.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobilityConfig {
    /// Largest encoded captured state accepted for transfer, in bytes
    #[serde(default = "default_max_state_bytes")]
    pub max_state_bytes: usize,

    /// Verify that decoded state equals the captured state on every round trip
    #[serde(default = "default_true")]
    pub verify_round_trip: bool,
}

impl Default for MobilityConfig {
    fn default() -> Self {
        Self {
            max_state_bytes: default_max_state_bytes(),
            verify_round_trip: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Ids of the other nodes this node may relocate units to
    #[serde(default)]
    pub peers: Vec<String>,

    /// Bound on a node's inbound message queue (256 when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_max_state_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for NodeConfigSpec {
    fn default() -> Self {
        Self {
            node: NodeIdentity {
                id: default_node_id(),
                region: None,
                tags: vec![],
            },
            mobility: MobilityConfig::default(),
            cluster: ClusterConfig::default(),
            observability: None,
        }
    }
}

fn default_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "transit-node".to_string())
}

impl Default for NodeConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: default_node_id(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: NodeConfigSpec::default(),
        }
    }
}

impl NodeConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. TRANSIT_CONFIG_PATH environment variable
    /// 2. ./transit-config.yaml (working directory)
    /// 3. ~/.transit/config.yaml (user home)
    /// 4. /etc/transit/config.yaml (system, Unix) or C:\ProgramData\Transit\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("TRANSIT_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./transit-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".transit").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/transit/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Transit\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TRANSIT_NODE_ID") {
            if !val.is_empty() {
                tracing::info!("Environment override: TRANSIT_NODE_ID={}", val);
                self.spec.node.id = val;
            }
        }

        if let Ok(val) = std::env::var("TRANSIT_MAX_STATE_BYTES") {
            match val.parse::<usize>() {
                Ok(bytes) => {
                    tracing::info!("Environment override: TRANSIT_MAX_STATE_BYTES={}", bytes);
                    self.spec.mobility.max_state_bytes = bytes;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for TRANSIT_MAX_STATE_BYTES: '{}'. Expected a byte count. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.node.id.is_empty() {
            anyhow::bail!("spec.node.id cannot be empty");
        }

        if self.spec.mobility.max_state_bytes == 0 {
            anyhow::bail!("spec.mobility.max_state_bytes must be greater than zero");
        }

        if self.spec.cluster.channel_capacity == Some(0) {
            anyhow::bail!("spec.cluster.channel_capacity must be greater than zero");
        }

        let mut seen = HashSet::new();
        for peer in &self.spec.cluster.peers {
            if peer.is_empty() {
                anyhow::bail!("Cluster peer id cannot be empty");
            }
            if peer == &self.spec.node.id {
                anyhow::bail!("Node '{}' cannot list itself as a peer", peer);
            }
            if !seen.insert(peer) {
                anyhow::bail!("Duplicate cluster peer: {}", peer);
            }
        }

        Ok(())
    }

    pub fn node_id(&self) -> NodeId {
        self.spec.node.node_id()
    }

    pub fn peer_ids(&self) -> Vec<NodeId> {
        self.spec.cluster.peers.iter().cloned().map(NodeId::new).collect()
    }
}
