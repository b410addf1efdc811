//! Service trait implementations for [`OpenStackClient`].

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};

use super::api::{
    BareMetalApi, ComputeApi, IdentityApi, NetworkApi, ObjectStoreApi, OrchestrationApi,
    WorkflowApi,
};
use super::client::{Body, OpenStackClient, parse, versioned, with_query};
use super::types::{
    ActionExecution, Container, CronTrigger, Execution, ExtraSpecs, Flavor, IdentityRef, Keypair,
    Network, Node, Router, Segment, Stack, Subnet, SubnetRequest, SubnetUpdate, Task, Workbook,
    Workflow, WorkflowEnvironment,
};
use crate::error::{OpenStackError, Result, UndercloudError};

/// Bare-metal API microversion that exposes resource classes.
const IRONIC_VERSION: (&str, &str) = ("X-OpenStack-Ironic-API-Version", "1.21");

/// Maps a not-found error to `None`.
fn found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(UndercloudError::OpenStack(OpenStackError::NotFound { .. })) => Ok(None),
        Err(e) => Err(e),
    }
}

impl OpenStackClient {
    fn compute(&self, suffix: &str) -> Result<String> {
        Ok(format!("{}/{suffix}", self.endpoint("compute")?))
    }

    fn network(&self, suffix: &str) -> Result<String> {
        Ok(format!("{}/{suffix}", versioned(&self.endpoint("network")?, "v2.0")))
    }

    fn baremetal(&self, suffix: &str) -> Result<String> {
        Ok(format!("{}/{suffix}", versioned(&self.endpoint("baremetal")?, "v1")))
    }

    fn workflow(&self, suffix: &str) -> Result<String> {
        Ok(format!("{}/{suffix}", self.endpoint("workflowv2")?))
    }

    fn identity(&self, suffix: &str) -> String {
        format!("{}/{suffix}", self.identity_url())
    }

    async fn find_identity(&self, collection: &str, name: &str) -> Result<Option<IdentityRef>> {
        let url = with_query(&self.identity(collection), &[("name", name)])?;
        let mut response: serde_json::Map<String, Value> = self.get_json(&url, &[]).await?;
        let items = response.remove(collection).unwrap_or(Value::Array(Vec::new()));
        let items: Vec<IdentityRef> = serde_json::from_value(items)
            .map_err(|e| OpenStackError::invalid_response(format!("Failed to parse {collection}: {e}")))?;
        Ok(items.into_iter().next())
    }
}

#[async_trait]
impl ComputeApi for OpenStackClient {
    async fn list_flavors(&self) -> Result<Vec<Flavor>> {
        #[derive(Deserialize)]
        struct Response {
            flavors: Vec<Flavor>,
        }
        let response: Response = self.get_json(&self.compute("flavors/detail")?, &[]).await?;
        Ok(response.flavors)
    }

    async fn create_flavor(&self, name: &str, ram: u64, vcpus: u32, disk: u64) -> Result<Flavor> {
        #[derive(Deserialize)]
        struct Response {
            flavor: Flavor,
        }
        let body = json!({"flavor": {"name": name, "ram": ram, "vcpus": vcpus, "disk": disk}});
        let response: Response = self
            .send_json(Method::POST, &self.compute("flavors")?, body)
            .await?;
        Ok(response.flavor)
    }

    async fn get_flavor_keys(&self, flavor_id: &str) -> Result<ExtraSpecs> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            extra_specs: ExtraSpecs,
        }
        let url = self.compute(&format!("flavors/{flavor_id}/os-extra_specs"))?;
        let response: Response = self.get_json(&url, &[]).await?;
        Ok(response.extra_specs)
    }

    async fn set_flavor_keys(&self, flavor_id: &str, keys: &ExtraSpecs) -> Result<()> {
        let url = self.compute(&format!("flavors/{flavor_id}/os-extra_specs"))?;
        self.request(Method::POST, &url, Body::Json(json!({"extra_specs": keys})), &[])
            .await?;
        Ok(())
    }

    async fn delete_flavor(&self, flavor_id: &str) -> Result<()> {
        let url = self.compute(&format!("flavors/{flavor_id}"))?;
        self.request(Method::DELETE, &url, Body::Empty, &[]).await?;
        Ok(())
    }

    async fn get_keypair(&self, name: &str) -> Result<Option<Keypair>> {
        #[derive(Deserialize)]
        struct Response {
            keypair: Keypair,
        }
        let url = self.compute(&format!("os-keypairs/{name}"))?;
        let response = found(self.get_json::<Response>(&url, &[]).await)?;
        Ok(response.map(|r| r.keypair))
    }

    async fn create_keypair(&self, name: &str, public_key: &str) -> Result<Keypair> {
        #[derive(Deserialize)]
        struct Response {
            keypair: Keypair,
        }
        let body = json!({"keypair": {"name": name, "public_key": public_key}});
        let response: Response = self
            .send_json(Method::POST, &self.compute("os-keypairs")?, body)
            .await?;
        Ok(response.keypair)
    }
}

#[async_trait]
impl NetworkApi for OpenStackClient {
    async fn find_networks(&self, name: &str) -> Result<Vec<Network>> {
        #[derive(Deserialize)]
        struct Response {
            networks: Vec<Network>,
        }
        let url = with_query(&self.network("networks")?, &[("name", name)])?;
        let response: Response = self.get_json(&url, &[]).await?;
        Ok(response.networks)
    }

    async fn create_network(&self, name: &str, physical_network: &str, mtu: i64) -> Result<Network> {
        #[derive(Deserialize)]
        struct Response {
            network: Network,
        }
        let body = json!({"network": {
            "name": name,
            "admin_state_up": true,
            "provider:network_type": "flat",
            "provider:physical_network": physical_network,
            "mtu": mtu,
        }});
        let response: Response = self
            .send_json(Method::POST, &self.network("networks")?, body)
            .await?;
        Ok(response.network)
    }

    async fn list_segments(&self, network_id: &str, physical_network: Option<&str>) -> Result<Vec<Segment>> {
        #[derive(Deserialize)]
        struct Response {
            segments: Vec<Segment>,
        }
        let mut query = vec![("network_id", network_id)];
        if let Some(physical_network) = physical_network {
            query.push(("physical_network", physical_network));
        }
        let url = with_query(&self.network("segments")?, &query)?;
        let response: Response = self.get_json(&url, &[]).await?;
        Ok(response.segments)
    }

    async fn create_segment(&self, name: &str, network_id: &str, physical_network: &str) -> Result<Segment> {
        #[derive(Deserialize)]
        struct Response {
            segment: Segment,
        }
        let body = json!({"segment": {
            "name": name,
            "network_id": network_id,
            "physical_network": physical_network,
            "network_type": "flat",
        }});
        let response: Response = self
            .send_json(Method::POST, &self.network("segments")?, body)
            .await?;
        Ok(response.segment)
    }

    async fn update_segment(&self, segment_id: &str, name: &str) -> Result<()> {
        let url = self.network(&format!("segments/{segment_id}"))?;
        self.request(Method::PUT, &url, Body::Json(json!({"segment": {"name": name}})), &[])
            .await?;
        Ok(())
    }

    async fn delete_segment(&self, segment_id: &str) -> Result<()> {
        let url = self.network(&format!("segments/{segment_id}"))?;
        self.request(Method::DELETE, &url, Body::Empty, &[]).await?;
        Ok(())
    }

    async fn find_subnets(&self, cidr: &str, network_id: &str) -> Result<Vec<Subnet>> {
        #[derive(Deserialize)]
        struct Response {
            subnets: Vec<Subnet>,
        }
        let url = with_query(
            &self.network("subnets")?,
            &[("cidr", cidr), ("network_id", network_id)],
        )?;
        let response: Response = self.get_json(&url, &[]).await?;
        Ok(response.subnets)
    }

    async fn create_subnet(&self, request: &SubnetRequest) -> Result<Subnet> {
        #[derive(Deserialize)]
        struct Response {
            subnet: Subnet,
        }
        let response: Response = self
            .send_json(Method::POST, &self.network("subnets")?, json!({"subnet": request}))
            .await?;
        Ok(response.subnet)
    }

    async fn update_subnet(&self, subnet_id: &str, update: &SubnetUpdate) -> Result<()> {
        let url = self.network(&format!("subnets/{subnet_id}"))?;
        self.request(Method::PUT, &url, Body::Json(json!({"subnet": update})), &[])
            .await?;
        Ok(())
    }

    async fn find_routers(&self, name: &str) -> Result<Vec<Router>> {
        #[derive(Deserialize)]
        struct Response {
            routers: Vec<Router>,
        }
        let url = with_query(&self.network("routers")?, &[("name", name)])?;
        let response: Response = self.get_json(&url, &[]).await?;
        Ok(response.routers)
    }

    async fn create_router(&self, name: &str) -> Result<Router> {
        #[derive(Deserialize)]
        struct Response {
            router: Router,
        }
        let body = json!({"router": {"name": name, "admin_state_up": true}});
        let response: Response = self
            .send_json(Method::POST, &self.network("routers")?, body)
            .await?;
        Ok(response.router)
    }

    async fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> Result<()> {
        let url = self.network(&format!("routers/{router_id}/add_router_interface"))?;
        self.request(Method::PUT, &url, Body::Json(json!({"subnet_id": subnet_id})), &[])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BareMetalApi for OpenStackClient {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        #[derive(Deserialize)]
        struct Response {
            nodes: Vec<Node>,
        }
        let url = with_query(&self.baremetal("nodes")?, &[("fields", "uuid,resource_class")])?;
        let response: Response = self.get_json(&url, &[IRONIC_VERSION]).await?;
        Ok(response.nodes)
    }

    async fn set_resource_class(&self, node_uuid: &str, resource_class: &str) -> Result<()> {
        let url = self.baremetal(&format!("nodes/{node_uuid}"))?;
        let patch = json!([{"path": "/resource_class", "op": "add", "value": resource_class}]);
        self.request(Method::PATCH, &url, Body::Json(patch), &[IRONIC_VERSION])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStoreApi for OpenStackClient {
    async fn list_containers(&self) -> Result<Vec<Container>> {
        let url = with_query(&self.endpoint("object-store")?, &[("format", "json")])?;
        let text = self.request(Method::GET, &url, Body::Empty, &[]).await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse(&text)
    }
}

#[async_trait]
impl WorkflowApi for OpenStackClient {
    async fn create_execution(&self, workflow: &str, input: Value) -> Result<Execution> {
        let body = json!({"workflow_name": workflow, "input": input.to_string()});
        self.send_json(Method::POST, &self.workflow("executions")?, body)
            .await
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Execution> {
        self.get_json(&self.workflow(&format!("executions/{execution_id}"))?, &[])
            .await
    }

    async fn list_action_executions(&self) -> Result<Vec<ActionExecution>> {
        #[derive(Deserialize)]
        struct Response {
            action_executions: Vec<ActionExecution>,
        }
        let response: Response = self
            .get_json(&self.workflow("action_executions")?, &[])
            .await?;
        Ok(response.action_executions)
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.get_json(&self.workflow(&format!("tasks/{task_id}"))?, &[])
            .await
    }

    async fn get_environment(&self, name: &str) -> Result<Option<WorkflowEnvironment>> {
        let url = self.workflow(&format!("environments/{name}"))?;
        found(self.get_json(&url, &[]).await)
    }

    async fn create_environment(&self, name: &str, description: &str, variables: &str) -> Result<()> {
        let body = json!({"name": name, "description": description, "variables": variables});
        self.request(Method::POST, &self.workflow("environments")?, Body::Json(body), &[])
            .await?;
        Ok(())
    }

    async fn update_environment(&self, name: &str, description: &str, variables: &str) -> Result<()> {
        let body = json!({"name": name, "description": description, "variables": variables});
        self.request(Method::PUT, &self.workflow("environments")?, Body::Json(body), &[])
            .await?;
        Ok(())
    }

    async fn list_workbooks(&self) -> Result<Vec<Workbook>> {
        #[derive(Deserialize)]
        struct Response {
            workbooks: Vec<Workbook>,
        }
        let response: Response = self.get_json(&self.workflow("workbooks")?, &[]).await?;
        Ok(response.workbooks)
    }

    async fn delete_workbook(&self, name: &str) -> Result<()> {
        let url = self.workflow(&format!("workbooks/{name}"))?;
        self.request(Method::DELETE, &url, Body::Empty, &[]).await?;
        Ok(())
    }

    async fn create_workbook(&self, definition: &str) -> Result<Workbook> {
        let text = self
            .request(
                Method::POST,
                &self.workflow("workbooks")?,
                Body::Text(definition.to_string()),
                &[],
            )
            .await?;
        parse(&text)
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        #[derive(Deserialize)]
        struct Response {
            workflows: Vec<Workflow>,
        }
        let response: Response = self.get_json(&self.workflow("workflows")?, &[]).await?;
        Ok(response.workflows)
    }

    async fn delete_workflow(&self, name: &str) -> Result<()> {
        let url = self.workflow(&format!("workflows/{name}"))?;
        self.request(Method::DELETE, &url, Body::Empty, &[]).await?;
        Ok(())
    }

    async fn list_cron_triggers(&self) -> Result<Vec<CronTrigger>> {
        #[derive(Deserialize)]
        struct Response {
            cron_triggers: Vec<CronTrigger>,
        }
        let response: Response = self.get_json(&self.workflow("cron_triggers")?, &[]).await?;
        Ok(response.cron_triggers)
    }

    async fn delete_cron_trigger(&self, name: &str) -> Result<()> {
        let url = self.workflow(&format!("cron_triggers/{name}"))?;
        self.request(Method::DELETE, &url, Body::Empty, &[]).await?;
        Ok(())
    }

    async fn create_cron_trigger(&self, name: &str, workflow: &str, pattern: &str) -> Result<()> {
        let body = json!({"name": name, "workflow_name": workflow, "pattern": pattern});
        self.request(Method::POST, &self.workflow("cron_triggers")?, Body::Json(body), &[])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityApi for OpenStackClient {
    async fn find_role(&self, name: &str) -> Result<Option<IdentityRef>> {
        self.find_identity("roles", name).await
    }

    async fn find_project(&self, name: &str) -> Result<Option<IdentityRef>> {
        self.find_identity("projects", name).await
    }

    async fn find_user(&self, name: &str) -> Result<Option<IdentityRef>> {
        self.find_identity("users", name).await
    }

    async fn grant_project_role(&self, project_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        let url = self.identity(&format!("projects/{project_id}/users/{user_id}/roles/{role_id}"));
        self.request(Method::PUT, &url, Body::Empty, &[]).await?;
        Ok(())
    }
}

#[async_trait]
impl OrchestrationApi for OpenStackClient {
    async fn list_stacks(&self) -> Result<Vec<Stack>> {
        #[derive(Deserialize)]
        struct Response {
            stacks: Vec<Stack>,
        }
        let url = format!("{}/stacks", self.endpoint("orchestration")?);
        let response: Response = self.get_json(&url, &[]).await?;
        Ok(response.stacks)
    }
}
