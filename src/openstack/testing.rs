//! In-memory cloud for reconciler tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::api::{
    BareMetalApi, CloudApi, CloudConnector, ComputeApi, IdentityApi, NetworkApi, ObjectStoreApi, OrchestrationApi,
    WorkflowApi,
};
use super::types::{
    ActionExecution, Container, Credentials, CronTrigger, Execution, ExtraSpecs, Flavor, IdentityRef, Keypair,
    Network, Node, Router, Segment, Stack, Subnet, SubnetRequest, SubnetUpdate, Task, Workbook,
    Workflow, WorkflowEnvironment,
};
use crate::error::{OpenStackError, Result};

/// Mutable state of a [`FakeCloud`].
#[derive(Debug, Default)]
pub struct CloudState {
    /// Flavors, in creation order.
    pub flavors: Vec<Flavor>,
    /// Extra specs keyed by flavor id.
    pub extra_specs: BTreeMap<String, ExtraSpecs>,
    /// Uploaded keypairs.
    pub keypairs: Vec<Keypair>,
    /// Networks.
    pub networks: Vec<Network>,
    /// Network segments.
    pub segments: Vec<Segment>,
    /// Subnets.
    pub subnets: Vec<Subnet>,
    /// Every subnet creation request.
    pub subnet_requests: Vec<SubnetRequest>,
    /// Every subnet update, with the subnet id.
    pub subnet_updates: Vec<(String, SubnetUpdate)>,
    /// Routers.
    pub routers: Vec<Router>,
    /// Router id and subnet id of each attached interface.
    pub router_interfaces: Vec<(String, String)>,
    /// Bare-metal nodes.
    pub nodes: Vec<Node>,
    /// Object store containers.
    pub containers: Vec<Container>,
    /// Workflow name and input of every execution started.
    pub executions: Vec<(String, Value)>,
    /// States returned by successive `get_execution` calls; `SUCCESS` once drained.
    pub execution_states: VecDeque<String>,
    /// Creation time reported for executions.
    pub execution_created_at: String,
    /// Action executions returned for diagnostics.
    pub action_executions: Vec<ActionExecution>,
    /// Tasks keyed by execution id.
    pub tasks: BTreeMap<String, Task>,
    /// Workflow environments keyed by name.
    pub environments: BTreeMap<String, WorkflowEnvironment>,
    /// Workbook names.
    pub workbooks: Vec<String>,
    /// Definitions of the workbooks created.
    pub workbook_definitions: Vec<String>,
    /// Workflows.
    pub workflows: Vec<Workflow>,
    /// Cron triggers.
    pub cron_triggers: Vec<CronTrigger>,
    /// Identity roles.
    pub roles: Vec<IdentityRef>,
    /// Identity projects.
    pub projects: Vec<IdentityRef>,
    /// Identity users.
    pub users: Vec<IdentityRef>,
    /// Role grants as project, user and role ids.
    pub grants: Vec<(String, String, String)>,
    /// Orchestration stacks.
    pub stacks: Vec<Stack>,
    /// Mutating calls in order.
    pub log: Vec<String>,
    next_id: u32,
}

impl CloudState {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// Cloud double implementing every service trait.
#[derive(Debug, Default)]
pub struct FakeCloud {
    state: Mutex<CloudState>,
}

impl FakeCloud {
    /// An empty cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state for inspection or seeding.
    pub fn state(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap()
    }
}

/// Connector handing out one shared [`FakeCloud`].
#[derive(Debug, Default)]
pub struct FakeConnector {
    /// Cloud returned by every connection.
    pub cloud: Arc<FakeCloud>,
    /// Credentials and workflow endpoint of every connection.
    pub connections: Mutex<Vec<(Credentials, Option<String>)>>,
}

impl FakeConnector {
    /// A connector for `cloud`.
    pub fn new(cloud: Arc<FakeCloud>) -> Self {
        Self {
            cloud,
            connections: Mutex::default(),
        }
    }
}

#[async_trait]
impl CloudConnector for FakeConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
        workflow_endpoint: Option<&str>,
    ) -> Result<Arc<dyn CloudApi>> {
        self.connections
            .lock()
            .unwrap()
            .push((credentials.clone(), workflow_endpoint.map(str::to_string)));
        let cloud: Arc<dyn CloudApi> = self.cloud.clone();
        Ok(cloud)
    }
}

fn identity_named(items: &[IdentityRef], name: &str) -> Option<IdentityRef> {
    items.iter().find(|item| item.name == name).cloned()
}

#[async_trait]
impl ComputeApi for FakeCloud {
    async fn list_flavors(&self) -> Result<Vec<Flavor>> {
        Ok(self.state().flavors.clone())
    }

    async fn create_flavor(&self, name: &str, ram: u64, vcpus: u32, disk: u64) -> Result<Flavor> {
        let mut state = self.state();
        let flavor = Flavor {
            id: state.id("flavor"),
            name: name.to_string(),
            ram,
            vcpus,
            disk,
        };
        state.log.push(format!("create_flavor {name}"));
        state.flavors.push(flavor.clone());
        Ok(flavor)
    }

    async fn get_flavor_keys(&self, flavor_id: &str) -> Result<ExtraSpecs> {
        Ok(self.state().extra_specs.get(flavor_id).cloned().unwrap_or_default())
    }

    async fn set_flavor_keys(&self, flavor_id: &str, keys: &ExtraSpecs) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("set_flavor_keys {flavor_id}"));
        state
            .extra_specs
            .entry(flavor_id.to_string())
            .or_default()
            .extend(keys.clone());
        Ok(())
    }

    async fn delete_flavor(&self, flavor_id: &str) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("delete_flavor {flavor_id}"));
        state.flavors.retain(|flavor| flavor.id != flavor_id);
        Ok(())
    }

    async fn get_keypair(&self, name: &str) -> Result<Option<Keypair>> {
        Ok(self.state().keypairs.iter().find(|k| k.name == name).cloned())
    }

    async fn create_keypair(&self, name: &str, public_key: &str) -> Result<Keypair> {
        let mut state = self.state();
        let keypair = Keypair {
            name: name.to_string(),
            public_key: public_key.to_string(),
        };
        state.log.push(format!("create_keypair {name}"));
        state.keypairs.push(keypair.clone());
        Ok(keypair)
    }
}

#[async_trait]
impl NetworkApi for FakeCloud {
    async fn find_networks(&self, name: &str) -> Result<Vec<Network>> {
        Ok(self
            .state()
            .networks
            .iter()
            .filter(|n| n.name == name)
            .cloned()
            .collect())
    }

    async fn create_network(&self, name: &str, physical_network: &str, mtu: i64) -> Result<Network> {
        let mut state = self.state();
        let network = Network {
            id: state.id("net"),
            name: name.to_string(),
            mtu: u32::try_from(mtu).ok(),
        };
        let segment = Segment {
            id: state.id("segment"),
            name: None,
            network_id: network.id.clone(),
            physical_network: Some(physical_network.to_string()),
        };
        state.log.push(format!("create_network {name} {physical_network} {mtu}"));
        state.networks.push(network.clone());
        state.segments.push(segment);
        Ok(network)
    }

    async fn list_segments(&self, network_id: &str, physical_network: Option<&str>) -> Result<Vec<Segment>> {
        Ok(self
            .state()
            .segments
            .iter()
            .filter(|s| s.network_id == network_id)
            .filter(|s| physical_network.is_none() || s.physical_network.as_deref() == physical_network)
            .cloned()
            .collect())
    }

    async fn create_segment(&self, name: &str, network_id: &str, physical_network: &str) -> Result<Segment> {
        let mut state = self.state();
        let segment = Segment {
            id: state.id("segment"),
            name: Some(name.to_string()),
            network_id: network_id.to_string(),
            physical_network: Some(physical_network.to_string()),
        };
        state.log.push(format!("create_segment {name}"));
        state.segments.push(segment.clone());
        Ok(segment)
    }

    async fn update_segment(&self, segment_id: &str, name: &str) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("update_segment {segment_id} {name}"));
        for segment in &mut state.segments {
            if segment.id == segment_id {
                segment.name = Some(name.to_string());
            }
        }
        Ok(())
    }

    async fn delete_segment(&self, segment_id: &str) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("delete_segment {segment_id}"));
        state.segments.retain(|s| s.id != segment_id);
        Ok(())
    }

    async fn find_subnets(&self, cidr: &str, network_id: &str) -> Result<Vec<Subnet>> {
        Ok(self
            .state()
            .subnets
            .iter()
            .filter(|s| s.cidr == cidr && s.network_id == network_id)
            .cloned()
            .collect())
    }

    async fn create_subnet(&self, request: &SubnetRequest) -> Result<Subnet> {
        let mut state = self.state();
        let subnet = Subnet {
            id: state.id("subnet"),
            name: Some(request.name.clone()),
            cidr: request.cidr.clone(),
            network_id: request.network_id.clone(),
            segment_id: request.segment_id.clone(),
        };
        state.log.push(format!("create_subnet {}", request.name));
        state.subnet_requests.push(request.clone());
        state.subnets.push(subnet.clone());
        Ok(subnet)
    }

    async fn update_subnet(&self, subnet_id: &str, update: &SubnetUpdate) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("update_subnet {subnet_id}"));
        state.subnet_updates.push((subnet_id.to_string(), update.clone()));
        Ok(())
    }

    async fn find_routers(&self, name: &str) -> Result<Vec<Router>> {
        Ok(self
            .state()
            .routers
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect())
    }

    async fn create_router(&self, name: &str) -> Result<Router> {
        let mut state = self.state();
        let router = Router {
            id: state.id("router"),
            name: name.to_string(),
        };
        state.log.push(format!("create_router {name}"));
        state.routers.push(router.clone());
        Ok(router)
    }

    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("add_router_interface {router_id} {subnet_id}"));
        state
            .router_interfaces
            .push((router_id.to_string(), subnet_id.to_string()));
        Ok(())
    }
}

#[async_trait]
impl BareMetalApi for FakeCloud {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.state().nodes.clone())
    }

    async fn set_resource_class(&self, node_uuid: &str, resource_class: &str) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("set_resource_class {node_uuid} {resource_class}"));
        for node in &mut state.nodes {
            if node.uuid == node_uuid {
                node.resource_class = Some(resource_class.to_string());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStoreApi for FakeCloud {
    async fn list_containers(&self) -> Result<Vec<Container>> {
        Ok(self.state().containers.clone())
    }
}

#[async_trait]
impl WorkflowApi for FakeCloud {
    async fn create_execution(&self, workflow: &str, input: Value) -> Result<Execution> {
        let mut state = self.state();
        let id = state.id("execution");
        state.log.push(format!("create_execution {workflow}"));
        state.executions.push((workflow.to_string(), input));
        Ok(Execution {
            id,
            workflow_name: Some(workflow.to_string()),
            state: "RUNNING".to_string(),
            created_at: state.execution_created_at.clone(),
        })
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Execution> {
        let mut state = self.state();
        let next = state
            .execution_states
            .pop_front()
            .unwrap_or_else(|| "SUCCESS".to_string());
        Ok(Execution {
            id: execution_id.to_string(),
            workflow_name: None,
            state: next,
            created_at: state.execution_created_at.clone(),
        })
    }

    async fn list_action_executions(&self) -> Result<Vec<ActionExecution>> {
        Ok(self.state().action_executions.clone())
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.state().tasks.get(task_id).cloned().ok_or_else(|| {
            OpenStackError::NotFound {
                resource: "Task".to_string(),
                name: task_id.to_string(),
            }
            .into()
        })
    }

    async fn get_environment(&self, name: &str) -> Result<Option<WorkflowEnvironment>> {
        Ok(self.state().environments.get(name).cloned())
    }

    async fn create_environment(&self, name: &str, description: &str, variables: &str) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("create_environment {name}"));
        state.environments.insert(
            name.to_string(),
            WorkflowEnvironment {
                name: name.to_string(),
                description: Some(description.to_string()),
                variables: Value::String(variables.to_string()),
            },
        );
        Ok(())
    }

    async fn update_environment(&self, name: &str, description: &str, variables: &str) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("update_environment {name}"));
        state.environments.insert(
            name.to_string(),
            WorkflowEnvironment {
                name: name.to_string(),
                description: Some(description.to_string()),
                variables: Value::String(variables.to_string()),
            },
        );
        Ok(())
    }

    async fn list_workbooks(&self) -> Result<Vec<Workbook>> {
        Ok(self
            .state()
            .workbooks
            .iter()
            .map(|name| Workbook { name: name.clone() })
            .collect())
    }

    async fn delete_workbook(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("delete_workbook {name}"));
        state.workbooks.retain(|w| w != name);
        Ok(())
    }

    async fn create_workbook(&self, definition: &str) -> Result<Workbook> {
        let parsed: serde_yaml::Value = serde_yaml::from_str(definition)
            .map_err(|e| OpenStackError::api_error(400, e.to_string()))?;
        let name = parsed
            .get("name")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut state = self.state();
        state.log.push(format!("create_workbook {name}"));
        state.workbooks.push(name.clone());
        state.workbook_definitions.push(definition.to_string());
        Ok(Workbook { name })
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        Ok(self.state().workflows.clone())
    }

    async fn delete_workflow(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("delete_workflow {name}"));
        state.workflows.retain(|w| w.name != name);
        Ok(())
    }

    async fn list_cron_triggers(&self) -> Result<Vec<CronTrigger>> {
        Ok(self.state().cron_triggers.clone())
    }

    async fn delete_cron_trigger(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("delete_cron_trigger {name}"));
        state.cron_triggers.retain(|t| t.name != name);
        Ok(())
    }

    async fn create_cron_trigger(&self, name: &str, workflow: &str, pattern: &str) -> Result<()> {
        let mut state = self.state();
        state.log.push(format!("create_cron_trigger {name} {pattern}"));
        state.cron_triggers.push(CronTrigger {
            name: name.to_string(),
            workflow_name: workflow.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl IdentityApi for FakeCloud {
    async fn find_role(&self, name: &str) -> Result<Option<IdentityRef>> {
        Ok(identity_named(&self.state().roles, name))
    }

    async fn find_project(&self, name: &str) -> Result<Option<IdentityRef>> {
        Ok(identity_named(&self.state().projects, name))
    }

    async fn find_user(&self, name: &str) -> Result<Option<IdentityRef>> {
        Ok(identity_named(&self.state().users, name))
    }

    async fn grant_project_role(&self, project_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        let mut state = self.state();
        let grant = (project_id.to_string(), user_id.to_string(), role_id.to_string());
        if state.grants.contains(&grant) {
            return Err(OpenStackError::Conflict {
                message: "role already granted".to_string(),
            }
            .into());
        }
        state.log.push(format!("grant {project_id} {user_id} {role_id}"));
        state.grants.push(grant);
        Ok(())
    }
}

#[async_trait]
impl OrchestrationApi for FakeCloud {
    async fn list_stacks(&self) -> Result<Vec<Stack>> {
        Ok(self.state().stacks.clone())
    }
}
