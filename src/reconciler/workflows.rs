//! Workflow service configuration.
//!
//! Workbooks shipped on disk replace the managed ones in the service, the
//! undercloud's secrets are published in a workflow environment, and the
//! default deployment plan is created.

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::poll::{Clock, WaitPolicy, wait_for_execution};
use crate::environment::Environment;
use crate::error::Result;
use crate::openstack::types::Workflow;
use crate::openstack::{ObjectStoreApi, WorkflowApi};

/// Tag carried by workflows the installer owns.
pub const MANAGED_TAG: &str = "tripleo-common-managed";

/// Name prefix of installer-owned workbooks, and of workflows before tagging.
const MANAGED_PREFIX: &str = "tripleo";

/// Environment holding undercloud secrets for workflow actions.
pub const CONFIG_ENVIRONMENT: &str = "tripleo.undercloud-config";

/// Description of [`CONFIG_ENVIRONMENT`].
const CONFIG_ENVIRONMENT_DESCRIPTION: &str = "Undercloud configuration parameters";

/// Name of the default deployment plan.
pub const DEFAULT_PLAN: &str = "overcloud";

/// Deadline for creating the default plan.
const PLAN_TIMEOUT: Duration = Duration::from_secs(360);

/// Deadline for a validation group run.
pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(540);

/// Environment keys published to [`CONFIG_ENVIRONMENT`].
const PUBLISHED_SECRETS: [(&str, &str); 2] = [
    ("undercloud_ceilometer_snmpd_password", "UNDERCLOUD_CEILOMETER_SNMPD_PASSWORD"),
    ("undercloud_db_password", "UNDERCLOUD_DB_PASSWORD"),
];

/// Changes made to the workflow service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowChanges {
    /// Workbooks deleted before re-creation.
    pub workbooks_deleted: Vec<String>,
    /// Workflows deleted.
    pub workflows_deleted: Vec<String>,
    /// Cron triggers deleted because their workflow was.
    pub triggers_deleted: Vec<String>,
    /// Workbooks created from disk.
    pub workbooks_created: Vec<String>,
    /// True when the config environment was created rather than updated.
    pub environment_created: bool,
    /// True when the default plan was created.
    pub plan_created: bool,
}

/// Names of the workflows to delete.
///
/// Once any workflow carries [`MANAGED_TAG`] only tagged ones are managed;
/// before that every `tripleo*` workflow is.
#[must_use]
pub fn managed_workflows(workflows: &[Workflow]) -> Vec<String> {
    let tagged = workflows
        .iter()
        .any(|workflow| workflow.tags.iter().any(|tag| tag == MANAGED_TAG));
    workflows
        .iter()
        .filter(|workflow| {
            if tagged {
                workflow.tags.iter().any(|tag| tag == MANAGED_TAG)
            } else {
                workflow.name.starts_with(MANAGED_PREFIX)
            }
        })
        .map(|workflow| workflow.name.clone())
        .collect()
}

/// Replaces the managed workbooks and workflows with the definitions in
/// `workbook_dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be read, or any API error.
pub async fn sync_workbooks<W: WorkflowApi + ?Sized>(
    workflow: &W,
    workbook_dir: &Path,
    changes: &mut WorkflowChanges,
) -> Result<()> {
    info!("Configuring Mistral workbooks");

    for workbook in workflow.list_workbooks().await? {
        if workbook.name.starts_with(MANAGED_PREFIX) {
            workflow.delete_workbook(&workbook.name).await?;
            changes.workbooks_deleted.push(workbook.name);
        }
    }

    let to_delete = managed_workflows(&workflow.list_workflows().await?);
    let doomed: BTreeSet<&str> = to_delete.iter().map(String::as_str).collect();
    for trigger in workflow.list_cron_triggers().await? {
        if doomed.contains(trigger.workflow_name.as_str()) {
            workflow.delete_cron_trigger(&trigger.name).await?;
            changes.triggers_deleted.push(trigger.name);
        }
    }
    for name in to_delete {
        workflow.delete_workflow(&name).await?;
        changes.workflows_deleted.push(name);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(workbook_dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    for path in files {
        let definition = std::fs::read_to_string(&path)?;
        let workbook = workflow.create_workbook(&definition).await?;
        changes.workbooks_created.push(workbook.name);
    }
    info!("Mistral workbooks configured successfully");
    Ok(())
}

/// Publishes the undercloud secrets the workflow actions need.
///
/// Returns true when the environment was created.
///
/// # Errors
///
/// Returns any API error.
pub async fn ensure_config_environment<W: WorkflowApi + ?Sized>(
    workflow: &W,
    env: &Environment,
) -> Result<bool> {
    let published: Map<String, Value> = PUBLISHED_SECRETS
        .iter()
        .map(|(variable, key)| {
            (
                (*variable).to_string(),
                Value::String(env.get(key).unwrap_or_default().to_string()),
            )
        })
        .collect();

    match workflow.get_environment(CONFIG_ENVIRONMENT).await? {
        None => {
            let variables = Value::Object(published).to_string();
            workflow
                .create_environment(CONFIG_ENVIRONMENT, CONFIG_ENVIRONMENT_DESCRIPTION, &variables)
                .await?;
            Ok(true)
        }
        Some(existing) => {
            let mut variables = existing.variables_map();
            variables.extend(published);
            let variables = Value::Object(variables).to_string();
            workflow
                .update_environment(CONFIG_ENVIRONMENT, CONFIG_ENVIRONMENT_DESCRIPTION, &variables)
                .await?;
            Ok(false)
        }
    }
}

/// Creates the default deployment plan unless a container of that name
/// exists, waiting for the creation to finish.
///
/// # Errors
///
/// Returns a workflow error if plan creation fails or times out.
pub async fn create_default_plan<W: WorkflowApi + ?Sized>(
    workflow: &W,
    clock: &dyn Clock,
    plans: &[String],
) -> Result<bool> {
    if plans.iter().any(|plan| plan == DEFAULT_PLAN) {
        info!("Not creating default plan \"{DEFAULT_PLAN}\" because it already exists.");
        return Ok(false);
    }

    let input = json!({
        "container": DEFAULT_PLAN,
        "queue_name": Uuid::new_v4().to_string(),
        "use_default_templates": true,
    });
    let execution = workflow
        .create_execution("tripleo.plan_management.v1.create_deployment_plan", input)
        .await?;
    let message = format!(
        "error creating the default Deployment Plan {DEFAULT_PLAN} Check the \
         create_default_deployment_plan execution in Mistral with openstack workflow \
         execution list "
    );
    wait_for_execution(
        workflow,
        clock,
        &execution,
        WaitPolicy {
            timeout: PLAN_TIMEOUT,
            message: &message,
            fail_on_error: true,
        },
    )
    .await?;
    Ok(true)
}

/// Schedules the hourly UI log publication.
///
/// # Errors
///
/// Returns any API error.
pub async fn create_logging_cron<W: WorkflowApi + ?Sized>(workflow: &W) -> Result<()> {
    info!("Configuring an hourly cron trigger for tripleo-ui logging");
    workflow
        .create_cron_trigger(
            "publish-ui-logs-hourly",
            "tripleo.plan_management.v1.publish_ui_logs_to_swift",
            "0 * * * *",
        )
        .await
}

/// Starts distribution of the validation SSH key.
///
/// # Errors
///
/// Returns any API error.
pub async fn prepare_ssh_environment<W: WorkflowApi + ?Sized>(workflow: &W) -> Result<()> {
    workflow
        .create_execution("tripleo.validations.v1.copy_ssh_key", json!({}))
        .await?;
    Ok(())
}

/// Renders group names as a bracketed, quoted list.
fn group_list(groups: &[&str]) -> String {
    let quoted: Vec<String> = groups.iter().map(|group| format!("'{group}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// Runs validation groups and waits for them.
///
/// # Errors
///
/// Returns a workflow error on failure when `fail_on_error` is set, or any
/// API error.
pub async fn run_validation_groups<W: WorkflowApi + ?Sized>(
    workflow: &W,
    clock: &dyn Clock,
    groups: &[&str],
    timeout: Duration,
    fail_on_error: bool,
) -> Result<()> {
    let names = group_list(groups);
    info!("Starting and waiting for validation groups {names} ");
    let execution = workflow
        .create_execution(
            "tripleo.validations.v1.run_groups",
            json!({"group_names": groups}),
        )
        .await?;
    let message = format!("error running the validation groups {names} ");
    wait_for_execution(
        workflow,
        clock,
        &execution,
        WaitPolicy {
            timeout,
            message: &message,
            fail_on_error,
        },
    )
    .await
}

/// Full workflow service configuration.
///
/// # Errors
///
/// Returns the first failing step's error.
pub async fn configure_workflows<C: WorkflowApi + ObjectStoreApi + ?Sized>(
    cloud: &C,
    clock: &dyn Clock,
    env: &Environment,
    workbook_dir: &Path,
    enable_validations: bool,
) -> Result<WorkflowChanges> {
    let mut changes = WorkflowChanges::default();
    sync_workbooks(cloud, workbook_dir, &mut changes).await?;

    let plans: Vec<String> = cloud
        .list_containers()
        .await?
        .into_iter()
        .map(|container| container.name)
        .collect();

    changes.environment_created = ensure_config_environment(cloud, env).await?;
    changes.plan_created = create_default_plan(cloud, clock, &plans).await?;
    create_logging_cron(cloud).await?;
    if enable_validations {
        prepare_ssh_environment(cloud).await?;
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openstack::testing::FakeCloud;
    use crate::openstack::types::{Container, CronTrigger, WorkflowEnvironment};
    use crate::reconciler::poll::testing::FakeClock;
    use tempfile::TempDir;

    fn workflow(name: &str, tags: &[&str]) -> Workflow {
        Workflow {
            name: name.to_string(),
            tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
        }
    }

    fn secrets() -> Environment {
        let mut env = Environment::new();
        env.set("UNDERCLOUD_DB_PASSWORD", "db").unwrap();
        env.set("UNDERCLOUD_CEILOMETER_SNMPD_PASSWORD", "snmp").unwrap();
        env
    }

    #[test]
    fn test_managed_workflows_by_prefix_then_tag() {
        let untagged = [workflow("tripleo.a", &[]), workflow("custom", &[])];
        assert_eq!(managed_workflows(&untagged), vec!["tripleo.a"]);

        let tagged = [
            workflow("tripleo.a", &[MANAGED_TAG]),
            workflow("tripleo.legacy", &[]),
            workflow("other", &[MANAGED_TAG]),
        ];
        assert_eq!(managed_workflows(&tagged), vec!["tripleo.a", "other"]);
    }

    #[tokio::test]
    async fn test_sync_workbooks() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "name: tripleo.b\n").unwrap();
        std::fs::write(dir.path().join("a.yaml"), "name: tripleo.a\n").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let cloud = FakeCloud::new();
        {
            let mut state = cloud.state();
            state.workbooks = vec!["tripleo.a".to_string(), "mine".to_string()];
            state.workflows = vec![workflow("tripleo.a.run", &[]), workflow("mine.run", &[])];
            state.cron_triggers = vec![
                CronTrigger {
                    name: "hourly".to_string(),
                    workflow_name: "tripleo.a.run".to_string(),
                },
                CronTrigger {
                    name: "keep".to_string(),
                    workflow_name: "mine.run".to_string(),
                },
            ];
        }

        let mut changes = WorkflowChanges::default();
        sync_workbooks(&cloud, dir.path(), &mut changes).await.unwrap();
        assert_eq!(changes.workbooks_deleted, vec!["tripleo.a"]);
        assert_eq!(changes.triggers_deleted, vec!["hourly"]);
        assert_eq!(changes.workflows_deleted, vec!["tripleo.a.run"]);
        assert_eq!(changes.workbooks_created, vec!["tripleo.a", "tripleo.b"]);

        let state = cloud.state();
        let trigger_delete = state.log.iter().position(|l| l == "delete_cron_trigger hourly");
        let workflow_delete = state.log.iter().position(|l| l == "delete_workflow tripleo.a.run");
        assert!(trigger_delete < workflow_delete);
        assert_eq!(state.cron_triggers.len(), 1);
    }

    #[tokio::test]
    async fn test_config_environment_created_then_merged() {
        let cloud = FakeCloud::new();
        assert!(ensure_config_environment(&cloud, &secrets()).await.unwrap());
        let created = cloud.state().environments[CONFIG_ENVIRONMENT].variables_map();
        assert_eq!(created["undercloud_db_password"], "db");

        cloud.state().environments.insert(
            CONFIG_ENVIRONMENT.to_string(),
            WorkflowEnvironment {
                name: CONFIG_ENVIRONMENT.to_string(),
                description: None,
                variables: json!({"undercloud_db_password": "old", "extra": "kept"}),
            },
        );
        assert!(!ensure_config_environment(&cloud, &secrets()).await.unwrap());
        let merged = cloud.state().environments[CONFIG_ENVIRONMENT].variables_map();
        assert_eq!(merged["undercloud_db_password"], "db");
        assert_eq!(merged["undercloud_ceilometer_snmpd_password"], "snmp");
        assert_eq!(merged["extra"], "kept");
    }

    #[tokio::test]
    async fn test_default_plan_skipped_when_present() {
        let cloud = FakeCloud::new();
        let clock = FakeClock::new();
        let created = create_default_plan(&cloud, &clock, &["overcloud".to_string()])
            .await
            .unwrap();
        assert!(!created);
        assert!(cloud.state().executions.is_empty());
    }

    #[tokio::test]
    async fn test_default_plan_failure_is_fatal() {
        let cloud = FakeCloud::new();
        cloud.state().execution_states.push_back("ERROR".to_string());
        let clock = FakeClock::new();
        let err = create_default_plan(&cloud, &clock, &[]).await.unwrap_err();
        assert!(err.to_string().contains("error creating the default Deployment Plan overcloud"));

        let state = cloud.state();
        let (name, input) = &state.executions[0];
        assert_eq!(name, "tripleo.plan_management.v1.create_deployment_plan");
        assert_eq!(input["container"], "overcloud");
        assert_eq!(input["use_default_templates"], true);
        assert_eq!(input["queue_name"].as_str().map(str::len), Some(36));
    }

    #[tokio::test]
    async fn test_configure_workflows() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("plan.yaml"), "name: tripleo.plan\n").unwrap();
        let cloud = FakeCloud::new();
        cloud.state().containers = vec![Container {
            name: "overcloud".to_string(),
        }];
        let clock = FakeClock::new();

        let changes = configure_workflows(&cloud, &clock, &secrets(), dir.path(), true)
            .await
            .unwrap();
        assert!(changes.environment_created);
        assert!(!changes.plan_created);

        let state = cloud.state();
        assert!(state.log.contains(&"create_cron_trigger publish-ui-logs-hourly 0 * * * *".to_string()));
        assert_eq!(state.executions.len(), 1);
        assert_eq!(state.executions[0].0, "tripleo.validations.v1.copy_ssh_key");
    }

    #[tokio::test]
    async fn test_validation_groups_input() {
        let cloud = FakeCloud::new();
        let clock = FakeClock::new();
        run_validation_groups(&cloud, &clock, &["post-upgrade"], VALIDATION_TIMEOUT, false)
            .await
            .unwrap();
        let state = cloud.state();
        assert_eq!(state.executions[0].0, "tripleo.validations.v1.run_groups");
        assert_eq!(state.executions[0].1, json!({"group_names": ["post-upgrade"]}));
    }
}
