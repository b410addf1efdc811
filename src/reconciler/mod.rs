//! Post-install reconciliation.
//!
//! Once the services are up, the cloud is brought to the state an
//! undercloud needs: provisioning network and subnets, SSH keypair,
//! flavors, node resource classes, workflow definitions and the default
//! plan. Every step is idempotent so re-running an install converges.

pub mod flavors;
pub mod identity;
pub mod network;
pub mod nodes;
pub mod poll;
pub mod ssh;
pub mod workflows;

pub use flavors::{FlavorOutcome, delete_default_flavors, ensure_flavor, ensure_flavors};
pub use identity::ensure_member_role;
pub use network::{PHYSICAL_NETWORK, SubnetChanges, ensure_network, reconcile_subnets};
pub use nodes::{DEFAULT_NODE_RESOURCE_CLASS, ensure_node_resource_classes};
pub use poll::{Clock, POLL_INTERVAL, TokioClock, WaitPolicy, wait_for_execution};
pub use ssh::{configure_ssh_keys, ensure_ssh_selinux_permission};
pub use workflows::{
    VALIDATION_TIMEOUT, WorkflowChanges, configure_workflows, run_validation_groups,
};

use serde::Serialize;
use tracing::info;

use crate::config::{Paths, UndercloudConfig};
use crate::environment::Environment;
use crate::error::Result;
use crate::openstack::{CloudApi, OrchestrationApi};
use crate::process::{CommandRunner, RunOptions, argv};

/// Outcome of a post-install reconciliation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationReport {
    /// Id of the `ctlplane` network.
    pub network_id: String,
    /// Subnet and segment changes.
    pub subnets: SubnetChanges,
    /// True when the `default` keypair was uploaded.
    pub keypair_created: bool,
    /// True when `~/.ssh` was relabelled.
    pub selinux_relabelled: bool,
    /// Number of stock flavors deleted.
    pub flavors_deleted: usize,
    /// Per-flavor outcome.
    pub flavors: Vec<(String, FlavorOutcome)>,
    /// Nodes given the default resource class.
    pub nodes_updated: usize,
    /// Workflow service changes.
    pub workflows: WorkflowChanges,
    /// True when `_member_` was granted to admin.
    pub member_role_granted: bool,
    /// Stacks migrated to the convergence engine.
    pub stacks_migrated: Vec<String>,
}

/// Post-install reconciler.
pub struct Reconciler<'a, C: CloudApi + ?Sized> {
    /// Configuration.
    config: &'a UndercloudConfig,
    /// Cloud services.
    cloud: &'a C,
    /// Command runner for local steps.
    runner: &'a dyn CommandRunner,
    /// Generated install environment.
    env: &'a Environment,
    /// Filesystem layout.
    paths: &'a Paths,
    /// Clock for execution polling.
    clock: &'a dyn Clock,
}

impl<'a, C: CloudApi + ?Sized> Reconciler<'a, C> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(
        config: &'a UndercloudConfig,
        cloud: &'a C,
        runner: &'a dyn CommandRunner,
        env: &'a Environment,
        paths: &'a Paths,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            config,
            cloud,
            runner,
            env,
            paths,
            clock,
        }
    }

    /// Runs every reconciliation step in order.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error. Steps already applied stay
    /// applied; re-running converges.
    pub async fn reconcile(&self, upgrade: bool) -> Result<ReconciliationReport> {
        let mut report = ReconciliationReport::default();

        let network = ensure_network(self.cloud, self.config.integer("local_mtu")).await?;
        report.subnets = reconcile_subnets(self.cloud, self.config, &network.id).await?;
        report.network_id = network.id;

        report.keypair_created = configure_ssh_keys(self.cloud, self.runner, self.paths).await?;
        report.selinux_relabelled = ensure_ssh_selinux_permission(self.runner, self.paths).await?;
        report.flavors_deleted = delete_default_flavors(self.cloud).await?;
        report.nodes_updated = ensure_node_resource_classes(self.cloud).await?;
        report.flavors = ensure_flavors(self.cloud)
            .await?
            .into_iter()
            .map(|(name, outcome)| (name.to_string(), outcome))
            .collect();

        report.workflows = configure_workflows(
            self.cloud,
            self.clock,
            self.env,
            &self.paths.workbook_dir,
            self.config.flag("enable_validations"),
        )
        .await?;
        report.member_role_granted = ensure_member_role(self.cloud).await?;

        if upgrade {
            report.stacks_migrated = migrate_to_convergence(self.cloud, self.runner).await?;
        }

        info!(
            "Reconciliation complete: {} subnets created, {} updated, {} flavors ensured",
            report.subnets.created.len(),
            report.subnets.updated.len(),
            report.flavors.len()
        );
        Ok(report)
    }
}

/// Migrates every stack to the convergence engine.
///
/// Already migrated stacks are unaffected.
///
/// # Errors
///
/// Returns an error if listing stacks or a migration command fails.
pub async fn migrate_to_convergence<O: OrchestrationApi + ?Sized>(
    orchestration: &O,
    runner: &dyn CommandRunner,
) -> Result<Vec<String>> {
    let mut migrated = Vec::new();
    for stack in orchestration.list_stacks().await? {
        info!("Migrating stack \"{}\" to convergence engine", stack.id);
        runner
            .run(
                &argv(&["sudo", "-E", "heat-manage", "migrate_convergence_1", &stack.id]),
                RunOptions::named("heat-manage"),
            )
            .await?;
        info!("Finished migrating stack \"{}\"", stack.id);
        migrated.push(stack.id);
    }
    Ok(migrated)
}
