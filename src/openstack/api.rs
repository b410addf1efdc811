//! Service traits.
//!
//! The reconciler only sees these traits, so it can run against the HTTP
//! client or an in-memory fake.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::types::{
    ActionExecution, Container, Credentials, CronTrigger, Execution, ExtraSpecs, Flavor, IdentityRef, Keypair,
    Network, Node, Router, Segment, Stack, Subnet, SubnetRequest, SubnetUpdate, Task, Workbook,
    Workflow, WorkflowEnvironment,
};
use crate::error::Result;

/// Compute service: flavors and keypairs.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Lists all flavors.
    async fn list_flavors(&self) -> Result<Vec<Flavor>>;
    /// Creates a flavor.
    async fn create_flavor(&self, name: &str, ram: u64, vcpus: u32, disk: u64) -> Result<Flavor>;
    /// Reads a flavor's extra specs.
    async fn get_flavor_keys(&self, flavor_id: &str) -> Result<ExtraSpecs>;
    /// Sets extra specs on a flavor.
    async fn set_flavor_keys(&self, flavor_id: &str, keys: &ExtraSpecs) -> Result<()>;
    /// Deletes a flavor.
    async fn delete_flavor(&self, flavor_id: &str) -> Result<()>;
    /// Looks up a keypair by name.
    async fn get_keypair(&self, name: &str) -> Result<Option<Keypair>>;
    /// Imports a public key.
    async fn create_keypair(&self, name: &str, public_key: &str) -> Result<Keypair>;
}

/// Network service: networks, segments, subnets and routers.
#[async_trait]
pub trait NetworkApi: Send + Sync {
    /// Networks with the given name.
    async fn find_networks(&self, name: &str) -> Result<Vec<Network>>;
    /// Creates a flat provider network.
    async fn create_network(&self, name: &str, physical_network: &str, mtu: i64) -> Result<Network>;
    /// Segments of a network, optionally filtered by physical network.
    async fn list_segments(&self, network_id: &str, physical_network: Option<&str>) -> Result<Vec<Segment>>;
    /// Creates a flat segment.
    async fn create_segment(&self, name: &str, network_id: &str, physical_network: &str) -> Result<Segment>;
    /// Renames a segment.
    async fn update_segment(&self, segment_id: &str, name: &str) -> Result<()>;
    /// Deletes a segment.
    async fn delete_segment(&self, segment_id: &str) -> Result<()>;
    /// Subnets of a network with the given CIDR.
    async fn find_subnets(&self, cidr: &str, network_id: &str) -> Result<Vec<Subnet>>;
    /// Creates a subnet.
    async fn create_subnet(&self, request: &SubnetRequest) -> Result<Subnet>;
    /// Updates a subnet.
    async fn update_subnet(&self, subnet_id: &str, update: &SubnetUpdate) -> Result<()>;
    /// Routers with the given name.
    async fn find_routers(&self, name: &str) -> Result<Vec<Router>>;
    /// Creates a router.
    async fn create_router(&self, name: &str) -> Result<Router>;
    /// Attaches a subnet to a router.
    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> Result<()>;
}

/// Bare-metal service.
#[async_trait]
pub trait BareMetalApi: Send + Sync {
    /// Lists nodes with their resource classes.
    async fn list_nodes(&self) -> Result<Vec<Node>>;
    /// Sets a node's resource class.
    async fn set_resource_class(&self, node_uuid: &str, resource_class: &str) -> Result<()>;
}

/// Object storage service.
#[async_trait]
pub trait ObjectStoreApi: Send + Sync {
    /// Containers of the account.
    async fn list_containers(&self) -> Result<Vec<Container>>;
}

/// Workflow service.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Starts a workflow.
    async fn create_execution(&self, workflow: &str, input: Value) -> Result<Execution>;
    /// Reads an execution.
    async fn get_execution(&self, execution_id: &str) -> Result<Execution>;
    /// Lists all action executions.
    async fn list_action_executions(&self) -> Result<Vec<ActionExecution>>;
    /// Reads a task execution.
    async fn get_task(&self, task_id: &str) -> Result<Task>;
    /// Reads an environment, `None` when it does not exist.
    async fn get_environment(&self, name: &str) -> Result<Option<WorkflowEnvironment>>;
    /// Creates an environment from JSON-encoded variables.
    async fn create_environment(&self, name: &str, description: &str, variables: &str) -> Result<()>;
    /// Replaces an environment's variables.
    async fn update_environment(&self, name: &str, description: &str, variables: &str) -> Result<()>;
    /// Lists workbooks.
    async fn list_workbooks(&self) -> Result<Vec<Workbook>>;
    /// Deletes a workbook.
    async fn delete_workbook(&self, name: &str) -> Result<()>;
    /// Creates a workbook from its YAML definition.
    async fn create_workbook(&self, definition: &str) -> Result<Workbook>;
    /// Lists workflows.
    async fn list_workflows(&self) -> Result<Vec<Workflow>>;
    /// Deletes a workflow.
    async fn delete_workflow(&self, name: &str) -> Result<()>;
    /// Lists cron triggers.
    async fn list_cron_triggers(&self) -> Result<Vec<CronTrigger>>;
    /// Deletes a cron trigger.
    async fn delete_cron_trigger(&self, name: &str) -> Result<()>;
    /// Creates a cron trigger.
    async fn create_cron_trigger(&self, name: &str, workflow: &str, pattern: &str) -> Result<()>;
}

/// Identity service.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Role with the given name.
    async fn find_role(&self, name: &str) -> Result<Option<IdentityRef>>;
    /// Project with the given name.
    async fn find_project(&self, name: &str) -> Result<Option<IdentityRef>>;
    /// User with the given name.
    async fn find_user(&self, name: &str) -> Result<Option<IdentityRef>>;
    /// Grants a role on a project. An existing grant is a conflict error.
    async fn grant_project_role(&self, project_id: &str, user_id: &str, role_id: &str) -> Result<()>;
}

/// Orchestration service.
#[async_trait]
pub trait OrchestrationApi: Send + Sync {
    /// Lists stacks.
    async fn list_stacks(&self) -> Result<Vec<Stack>>;
}

/// Every service the installer configures.
pub trait CloudApi:
    ComputeApi + NetworkApi + BareMetalApi + ObjectStoreApi + WorkflowApi + IdentityApi + OrchestrationApi
{
}

impl<T> CloudApi for T where
    T: ComputeApi
        + NetworkApi
        + BareMetalApi
        + ObjectStoreApi
        + WorkflowApi
        + IdentityApi
        + OrchestrationApi
{
}

/// Opens an authenticated session to the cloud.
#[async_trait]
pub trait CloudConnector: Send + Sync {
    /// Authenticates with the credentials. A workflow endpoint, when given,
    /// replaces the catalog entry for that service.
    async fn connect(
        &self,
        credentials: &Credentials,
        workflow_endpoint: Option<&str>,
    ) -> Result<Arc<dyn CloudApi>>;
}
