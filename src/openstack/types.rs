//! `OpenStack` API resource types.
//!
//! Only the fields the installer reads or writes are modelled.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Credentials for Keystone v3 password authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Identity endpoint, with or without the `/v3` suffix.
    pub auth_url: String,
    /// User name.
    pub username: String,
    /// User password.
    pub password: String,
    /// Project to scope the token to.
    pub project_name: String,
}

/// One service in the token's catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    /// Service type, e.g. `compute`.
    #[serde(rename = "type")]
    pub service_type: String,
    /// Endpoints of the service.
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

/// One endpoint of a catalog entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    /// `public`, `internal` or `admin`.
    pub interface: String,
    /// Endpoint URL.
    pub url: String,
}

/// A compute flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    /// Flavor id.
    pub id: String,
    /// Flavor name.
    pub name: String,
    /// Memory in MB.
    #[serde(default)]
    pub ram: u64,
    /// Virtual CPUs.
    #[serde(default)]
    pub vcpus: u32,
    /// Root disk in GB.
    #[serde(default)]
    pub disk: u64,
}

/// Flavor extra specs.
pub type ExtraSpecs = BTreeMap<String, String>;

/// A compute keypair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    /// Keypair name.
    pub name: String,
    /// Public key material.
    #[serde(default)]
    pub public_key: String,
}

/// A network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Network id.
    pub id: String,
    /// Network name.
    pub name: String,
    /// MTU, when reported.
    #[serde(default)]
    pub mtu: Option<u32>,
}

/// A network segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment id.
    pub id: String,
    /// Segment name.
    #[serde(default)]
    pub name: Option<String>,
    /// Owning network.
    pub network_id: String,
    /// Physical network the segment maps to.
    #[serde(default)]
    pub physical_network: Option<String>,
}

/// A subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    /// Subnet id.
    pub id: String,
    /// Subnet name.
    #[serde(default)]
    pub name: Option<String>,
    /// Subnet CIDR.
    pub cidr: String,
    /// Owning network.
    pub network_id: String,
    /// Segment the subnet is bound to, if any.
    #[serde(default)]
    pub segment_id: Option<String>,
}

/// A DHCP allocation pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPool {
    /// First address.
    pub start: String,
    /// Last address.
    pub end: String,
}

/// A static host route pushed to DHCP clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRoute {
    /// Destination CIDR.
    pub destination: String,
    /// Next hop address.
    pub nexthop: String,
}

/// Body of a subnet create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetRequest {
    /// Subnet name.
    pub name: String,
    /// Subnet CIDR.
    pub cidr: String,
    /// Gateway address.
    pub gateway_ip: String,
    /// Host routes.
    pub host_routes: Vec<HostRoute>,
    /// Always true for provisioning subnets.
    pub enable_dhcp: bool,
    /// 4 or 6.
    pub ip_version: u8,
    /// IPv6 address mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_address_mode: Option<String>,
    /// IPv6 router advertisement mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_ra_mode: Option<String>,
    /// DHCP pools.
    pub allocation_pools: Vec<AllocationPool>,
    /// Owning network.
    pub network_id: String,
    /// Segment to bind to; `None` leaves the subnet unbound.
    pub segment_id: Option<String>,
}

/// Body of a subnet update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetUpdate {
    /// Subnet name.
    pub name: String,
    /// Gateway address.
    pub gateway_ip: String,
    /// Host routes.
    pub host_routes: Vec<HostRoute>,
    /// DHCP pools.
    pub allocation_pools: Vec<AllocationPool>,
}

/// A router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    /// Router id.
    pub id: String,
    /// Router name.
    #[serde(default)]
    pub name: String,
}

/// A bare-metal node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node uuid.
    pub uuid: String,
    /// Resource class, when set.
    #[serde(default)]
    pub resource_class: Option<String>,
}

/// An object storage container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Container name.
    pub name: String,
}

/// A workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Execution id.
    pub id: String,
    /// Workflow that was started.
    #[serde(default)]
    pub workflow_name: Option<String>,
    /// `RUNNING`, `SUCCESS`, `ERROR`, ...
    pub state: String,
    /// Creation time as `YYYY-MM-DD HH:MM:SS`.
    #[serde(default)]
    pub created_at: String,
}

/// An action execution within a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionExecution {
    /// Action execution id.
    pub id: String,
    /// Name of the task that ran the action.
    #[serde(default)]
    pub task_name: Option<String>,
    /// Task execution the action belongs to.
    #[serde(default)]
    pub task_execution_id: Option<String>,
    /// Action state.
    pub state: String,
    /// Creation time as `YYYY-MM-DD HH:MM:SS`.
    #[serde(default)]
    pub created_at: String,
}

/// A task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task id.
    pub id: String,
    /// Task result, when reported.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl Task {
    /// The result rendered as text.
    #[must_use]
    pub fn result_text(&self) -> String {
        match &self.result {
            Some(serde_json::Value::String(text)) => text.clone(),
            Some(value) => value.to_string(),
            None => "None".to_string(),
        }
    }
}

/// A workflow environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEnvironment {
    /// Environment name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Variables, either inline JSON or a JSON-encoded string.
    #[serde(default)]
    pub variables: serde_json::Value,
}

impl WorkflowEnvironment {
    /// Variables as a map, decoding string-encoded JSON.
    #[must_use]
    pub fn variables_map(&self) -> serde_json::Map<String, serde_json::Value> {
        let value = match &self.variables {
            serde_json::Value::String(text) => serde_json::from_str(text).unwrap_or_default(),
            other => other.clone(),
        };
        match value {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        }
    }
}

/// A workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    /// Workbook name.
    pub name: String,
}

/// A workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow name.
    pub name: String,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A cron trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronTrigger {
    /// Trigger name.
    pub name: String,
    /// Workflow the trigger starts.
    pub workflow_name: String,
}

/// A Keystone role, project or user reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRef {
    /// Resource id.
    pub id: String,
    /// Resource name.
    pub name: String,
}

/// An orchestration stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    /// Stack id.
    pub id: String,
    /// Stack name.
    pub stack_name: String,
    /// Combined action and status, e.g. `UPDATE_COMPLETE`.
    pub stack_status: String,
}

impl Stack {
    /// Status without the action prefix, e.g. `COMPLETE` or `IN_PROGRESS`.
    #[must_use]
    pub fn status(&self) -> &str {
        self.stack_status
            .split_once('_')
            .map_or(self.stack_status.as_str(), |(_, status)| status)
    }
}
