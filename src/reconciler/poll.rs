//! Waiting for workflow executions.
//!
//! Executions are polled every [`POLL_INTERVAL`] until they leave the
//! `RUNNING` state or the deadline passes. The clock is injected so tests
//! never sleep.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{Result, WorkflowError};
use crate::openstack::WorkflowApi;
use crate::openstack::types::Execution;

/// Interval between execution state checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Timestamp format of workflow records.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Time source for polling.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;

    /// Waits for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    /// A clock starting now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How to treat an execution that does not succeed.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy<'a> {
    /// Deadline relative to the start of the wait.
    pub timeout: Duration,
    /// Prefix of the failure message.
    pub message: &'a str,
    /// Return an error instead of only logging.
    pub fail_on_error: bool,
}

/// Waits for an execution to finish.
///
/// A terminal state other than `SUCCESS` is logged together with the
/// results of failed `run_validation` tasks started after the execution.
///
/// # Errors
///
/// Returns [`WorkflowError::Failed`] or [`WorkflowError::Timeout`] when
/// `fail_on_error` is set, or any API error.
pub async fn wait_for_execution<W: WorkflowApi + ?Sized>(
    workflow: &W,
    clock: &dyn Clock,
    execution: &Execution,
    policy: WaitPolicy<'_>,
) -> Result<()> {
    let deadline = clock.now() + policy.timeout;

    while clock.now() < deadline {
        let current = workflow.get_execution(&execution.id).await?;
        match current.state.as_str() {
            "RUNNING" => {
                debug!("Execution {} still running", execution.id);
                clock.sleep(POLL_INTERVAL).await;
            }
            "SUCCESS" => return Ok(()),
            _ => {
                let diagnostics = collect_diagnostics(workflow, &current).await?;
                let message = format!(
                    "ERROR {} {diagnostics} Mistral execution ID: {}",
                    policy.message, execution.id
                );
                error!("{message}");
                if policy.fail_on_error {
                    return Err(WorkflowError::Failed {
                        execution_id: execution.id.clone(),
                        message,
                    }
                    .into());
                }
                return Ok(());
            }
        }
    }

    let current = workflow.get_execution(&execution.id).await?;
    let timeout = WorkflowError::Timeout {
        execution_id: current.id,
        state: current.state,
    };
    error!("{timeout}");
    if policy.fail_on_error {
        return Err(timeout.into());
    }
    Ok(())
}

/// Results of failed validation tasks created after the execution, each
/// prefixed with a space.
async fn collect_diagnostics<W: WorkflowApi + ?Sized>(
    workflow: &W,
    execution: &Execution,
) -> Result<String> {
    let Some(started) = parse_timestamp(&execution.created_at) else {
        return Ok(String::new());
    };

    let mut output = String::new();
    for action in workflow.list_action_executions().await? {
        if action.task_name.as_deref() != Some("run_validation") || action.state != "ERROR" {
            continue;
        }
        let after = parse_timestamp(&action.created_at).is_some_and(|created| created > started);
        if !after {
            continue;
        }
        if let Some(task_id) = &action.task_execution_id {
            let task = workflow.get_task(task_id).await?;
            output.push(' ');
            output.push_str(&task.result_text());
        }
    }
    Ok(output)
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Clock that advances only when slept on.
    #[derive(Debug, Default)]
    pub struct FakeClock {
        now: Mutex<Duration>,
    }

    impl FakeClock {
        /// A clock at zero.
        pub fn new() -> Self {
            Self::default()
        }

        /// Total time slept.
        pub fn elapsed(&self) -> Duration {
            *self.now.lock().unwrap()
        }
    }

    #[async_trait]
    impl Clock for FakeClock {
        fn now(&self) -> Duration {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            *self.now.lock().unwrap() += duration;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeClock;
    use super::*;
    use crate::error::UndercloudError;
    use crate::openstack::testing::FakeCloud;
    use crate::openstack::types::{ActionExecution, Task};

    fn execution() -> Execution {
        Execution {
            id: "exec-1".to_string(),
            workflow_name: None,
            state: "RUNNING".to_string(),
            created_at: "2024-01-01 10:00:00".to_string(),
        }
    }

    fn policy(fail_on_error: bool) -> WaitPolicy<'static> {
        WaitPolicy {
            timeout: Duration::from_secs(60),
            message: "error running the validation groups [\"pre\"] ",
            fail_on_error,
        }
    }

    #[tokio::test]
    async fn test_waits_until_success() {
        let cloud = FakeCloud::new();
        cloud
            .state()
            .execution_states
            .extend(["RUNNING", "RUNNING", "SUCCESS"].map(String::from));
        let clock = FakeClock::new();

        wait_for_execution(&cloud, &clock, &execution(), policy(true))
            .await
            .unwrap();
        assert_eq!(clock.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_failure_collects_validation_results() {
        let cloud = FakeCloud::new();
        {
            let mut state = cloud.state();
            state.execution_states.push_back("ERROR".to_string());
            state.execution_created_at = "2024-01-01 10:00:00".to_string();
            state.action_executions = vec![
                ActionExecution {
                    id: "a1".to_string(),
                    task_name: Some("run_validation".to_string()),
                    task_execution_id: Some("t1".to_string()),
                    state: "ERROR".to_string(),
                    created_at: "2024-01-01 10:00:05".to_string(),
                },
                ActionExecution {
                    id: "a2".to_string(),
                    task_name: Some("run_validation".to_string()),
                    task_execution_id: Some("t2".to_string()),
                    state: "ERROR".to_string(),
                    created_at: "2024-01-01 09:59:00".to_string(),
                },
                ActionExecution {
                    id: "a3".to_string(),
                    task_name: Some("notify".to_string()),
                    task_execution_id: Some("t3".to_string()),
                    state: "ERROR".to_string(),
                    created_at: "2024-01-01 10:00:05".to_string(),
                },
            ];
            state.tasks.insert(
                "t1".to_string(),
                Task {
                    id: "t1".to_string(),
                    result: Some(serde_json::json!("disk too small")),
                },
            );
        }
        let clock = FakeClock::new();

        let err = wait_for_execution(&cloud, &clock, &execution(), policy(true))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Workflow error: ERROR error running the validation groups [\"pre\"]   disk too small \
             Mistral execution ID: exec-1"
        );
    }

    #[tokio::test]
    async fn test_failure_only_logged_without_fail_on_error() {
        let cloud = FakeCloud::new();
        cloud.state().execution_states.push_back("ERROR".to_string());
        let clock = FakeClock::new();

        wait_for_execution(&cloud, &clock, &execution(), policy(false))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_timeout_reports_state() {
        let cloud = FakeCloud::new();
        cloud
            .state()
            .execution_states
            .extend(std::iter::repeat_n("RUNNING".to_string(), 20));
        let clock = FakeClock::new();

        let err = wait_for_execution(&cloud, &clock, &execution(), policy(true))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UndercloudError::Workflow(WorkflowError::Timeout { ref state, .. }) if state == "RUNNING"
        ));
        assert_eq!(clock.elapsed(), Duration::from_secs(60));
    }
}
