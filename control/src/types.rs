use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ============================================================================
// Node Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Unconfigured,
    Online,
    Offline,
    Unknown,
}

/// A remote host running the node agent, as persisted under `<id>_node`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub ram: u64,
    pub disk: u64,
    pub processor: u64,
    pub address: String,
    pub port: u16,
    /// `null` until the agent has been configured.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configure_key: Option<String>,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_family: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_release: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<Value>,
}

impl Node {
    /// Base URL of the agent running on this node.
    pub fn agent_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }

    /// The node as shown after creation: the configure key stays in storage.
    pub fn without_configure_key(self) -> Self {
        Self {
            configure_key: None,
            ..self
        }
    }
}

/// Validated field set shared by the create and update forms.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub name: String,
    pub tags: Vec<String>,
    pub ram: u64,
    pub disk: u64,
    pub processor: u64,
    pub address: String,
    pub port: u16,
}

/// Body of the agent's `GET /` status endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub version_family: u32,
    pub version_release: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub remote: Option<Value>,
    #[serde(default)]
    pub docker: Option<Value>,
}

// ============================================================================
// Instance Types
// ============================================================================

/// Workload record owned by the deployment side of the panel.
///
/// Only `Id`, `User` and `Node.id` are interpreted here; every other field
/// is carried through untouched when the `instances` list is rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Node")]
    pub node: InstanceNode,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceNode {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// A loosely typed form value: browsers post strings, API clients post JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    Integer(u64),
    List(Vec<String>),
}

/// Raw create/update form; validated into a [`NodeSpec`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeForm {
    pub name: Option<FormValue>,
    pub tags: Option<FormValue>,
    pub ram: Option<FormValue>,
    pub disk: Option<FormValue>,
    pub processor: Option<FormValue>,
    pub address: Option<FormValue>,
    pub port: Option<FormValue>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteNodeRequest {
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteNodeQuery {
    #[serde(default)]
    pub deleteinstances: Option<String>,
}

impl DeleteNodeQuery {
    pub fn cascade(&self) -> bool {
        self.deleteinstances.as_deref() == Some("true")
    }
}

/// Branding values shown alongside the node views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelInfo {
    pub name: String,
    pub logo: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNodesResponse {
    pub nodes: Vec<Node>,
    pub instance_counts: BTreeMap<String, usize>,
    pub panel: PanelInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDetailResponse {
    pub node: Node,
    pub panel: PanelInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurgeOutcome {
    Skipped,
    Purged,
    Failed,
}

/// What a node deletion actually did, step by step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    pub instances_removed: Vec<String>,
    pub user_indexes_updated: Vec<String>,
    pub purge: PurgeOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteNodeResponse {
    pub success: bool,
    pub cascade: DeletionReport,
}

/// The admin performing a request, as reported by the fronting auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub username: String,
    pub ip: String,
}

/// Entry appended to the `audits` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub user_id: String,
    pub username: String,
    pub action: String,
    pub ip: String,
    pub timestamp: String,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
