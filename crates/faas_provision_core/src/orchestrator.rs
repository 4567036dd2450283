//! Create and Delete workflows over the role, repository and function managers.
//!
//! Each workflow is a fixed sequence of steps run one at a time. A step either
//! advances to the next one or ends the run in `Failed` / `Aborted`. Nothing
//! already done is rolled back; the report lists what exists remotely so an
//! operator can clean up by hand.
//!
//! Delete has one exception to stop-on-first-error: a failed function
//! deletion is recorded and teardown still continues with the role and the
//! repository. The run then ends failed at `function_deleting`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::catalog::RuntimeDescriptor;
use crate::config::ProvisionConfig;
use crate::contract::{FunctionSpec, FunctionSummary};
use crate::error::{ErrorKind, ProvisionError, ResourceKind};
use crate::function::{FunctionDefaults, FunctionLifecycleManager};
use crate::naming::{role_name_for, validate_function_name};
use crate::ports::{ComputePlatform, IdentityService, Pause, RepositoryRpc};
use crate::repository::RepositoryProvisioner;
use crate::role::RoleLifecycleManager;

const COMPONENT: &str = "orchestrator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Create,
    Delete,
}

impl WorkflowKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }

    pub const fn steps(self) -> &'static [WorkflowStep] {
        match self {
            Self::Create => &CREATE_STEPS,
            Self::Delete => &DELETE_STEPS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Validating,
    RoleCreating,
    RepoProvisioning,
    FunctionCreating,
    PolicyDetaching,
    FunctionDeleting,
    RoleDeleting,
    RepoDeprovisioning,
}

pub const CREATE_STEPS: [WorkflowStep; 4] = [
    WorkflowStep::Validating,
    WorkflowStep::RoleCreating,
    WorkflowStep::RepoProvisioning,
    WorkflowStep::FunctionCreating,
];

pub const DELETE_STEPS: [WorkflowStep; 5] = [
    WorkflowStep::Validating,
    WorkflowStep::PolicyDetaching,
    WorkflowStep::FunctionDeleting,
    WorkflowStep::RoleDeleting,
    WorkflowStep::RepoDeprovisioning,
];

impl WorkflowStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::RoleCreating => "role_creating",
            Self::RepoProvisioning => "repo_provisioning",
            Self::FunctionCreating => "function_creating",
            Self::PolicyDetaching => "policy_detaching",
            Self::FunctionDeleting => "function_deleting",
            Self::RoleDeleting => "role_deleting",
            Self::RepoDeprovisioning => "repo_deprovisioning",
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Running { step: WorkflowStep },
    Done,
    Failed {
        step: WorkflowStep,
        error: ProvisionError,
    },
    Aborted { step: WorkflowStep },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. } | Self::Aborted { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failed { error, .. } => Some(error.kind()),
            Self::Aborted { .. } => Some(ErrorKind::Aborted),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running { step } => write!(f, "running ({step})"),
            Self::Done => f.write_str("done"),
            Self::Failed { step, error } => write!(f, "failed at {step}: {error}"),
            Self::Aborted { step } => write!(f, "aborted at {step}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: WorkflowStep,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProvisionError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceChange {
    Created,
    Deleted,
}

/// A remote resource the run created or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteResource {
    pub kind: ResourceKind,
    pub identifier: String,
    pub change: ResourceChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowReport {
    pub workflow: WorkflowKind,
    pub function_name: String,
    #[serde(flatten)]
    pub state: WorkflowState,
    pub steps: Vec<StepRecord>,
    pub resources: Vec<RemoteResource>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowReport {
    pub fn is_done(&self) -> bool {
        self.state == WorkflowState::Done
    }

    pub fn invoked_steps(&self) -> Vec<WorkflowStep> {
        self.steps.iter().map(|record| record.step).collect()
    }

    pub fn errors(&self) -> Vec<&ProvisionError> {
        self.steps
            .iter()
            .filter_map(|record| record.error.as_ref())
            .collect()
    }

    pub fn resources_with(&self, change: ResourceChange) -> Vec<&RemoteResource> {
        self.resources
            .iter()
            .filter(|resource| resource.change == change)
            .collect()
    }

    /// Manual cleanup needed after a failed or aborted create.
    pub fn cleanup_hints(&self) -> Vec<String> {
        if self.workflow != WorkflowKind::Create || self.is_done() {
            return Vec::new();
        }
        self.resources_with(ResourceChange::Created)
            .into_iter()
            .map(|resource| match resource.kind {
                ResourceKind::Role => format!(
                    "role {} was created; detach its policy and delete it manually",
                    resource.identifier
                ),
                ResourceKind::Repository => format!(
                    "repository {} was created; delete it manually",
                    resource.identifier
                ),
                ResourceKind::Function => format!(
                    "function {} was created; delete it manually",
                    resource.identifier
                ),
            })
            .collect()
    }
}

struct WorkflowRun {
    report: WorkflowReport,
    current: Option<WorkflowStep>,
}

impl WorkflowRun {
    fn start(workflow: WorkflowKind, function_name: &str) -> Self {
        info!(
            component = COMPONENT,
            workflow = workflow.as_str(),
            function_name,
            "workflow_started"
        );
        Self {
            report: WorkflowReport {
                workflow,
                function_name: function_name.to_string(),
                state: WorkflowState::Idle,
                steps: Vec::new(),
                resources: Vec::new(),
                started_at: Utc::now(),
                finished_at: None,
            },
            current: None,
        }
    }

    /// Moves to `step`, or aborts the run if cancellation was requested.
    fn enter(&mut self, step: WorkflowStep, cancel: &CancellationToken) -> bool {
        self.current = Some(step);
        if cancel.is_cancelled() {
            self.report.state = WorkflowState::Aborted { step };
            return false;
        }
        self.report.state = WorkflowState::Running { step };
        info!(
            component = COMPONENT,
            workflow = self.report.workflow.as_str(),
            function_name = %self.report.function_name,
            step = step.as_str(),
            "step_started"
        );
        true
    }

    fn step(&self) -> WorkflowStep {
        self.current.unwrap_or(WorkflowStep::Validating)
    }

    fn complete(&mut self, attempts: Option<u32>) {
        let step = self.step();
        self.report.steps.push(StepRecord {
            step,
            status: StepStatus::Completed,
            attempts,
            error: None,
        });
        info!(
            component = COMPONENT,
            workflow = self.report.workflow.as_str(),
            function_name = %self.report.function_name,
            step = step.as_str(),
            "step_completed"
        );
    }

    /// Records a failed step without ending the run.
    fn record_failure(&mut self, error: &ProvisionError, attempts: Option<u32>) {
        let step = self.step();
        self.report.steps.push(StepRecord {
            step,
            status: StepStatus::Failed,
            attempts,
            error: Some(error.clone()),
        });
        error!(
            component = COMPONENT,
            workflow = self.report.workflow.as_str(),
            function_name = %self.report.function_name,
            step = step.as_str(),
            error_type = error.error_type(),
            error = %error,
            "step_failed"
        );
    }

    fn resource(&mut self, kind: ResourceKind, identifier: impl Into<String>, change: ResourceChange) {
        self.report.resources.push(RemoteResource {
            kind,
            identifier: identifier.into(),
            change,
        });
    }

    fn fail(mut self, error: ProvisionError, attempts: Option<u32>) -> WorkflowReport {
        self.record_failure(&error, attempts);
        let step = self.step();
        self.report.state = if error.kind() == ErrorKind::Aborted {
            WorkflowState::Aborted { step }
        } else {
            WorkflowState::Failed { step, error }
        };
        self.finish()
    }

    fn finish(mut self) -> WorkflowReport {
        if !self.report.state.is_terminal() {
            self.report.state = WorkflowState::Done;
        }
        self.report.finished_at = Some(Utc::now());

        let state = self.report.state.to_string();
        if self.report.is_done() {
            info!(
                component = COMPONENT,
                workflow = self.report.workflow.as_str(),
                function_name = %self.report.function_name,
                state = %state,
                "workflow_finished"
            );
        } else {
            warn!(
                component = COMPONENT,
                workflow = self.report.workflow.as_str(),
                function_name = %self.report.function_name,
                state = %state,
                "workflow_finished"
            );
        }
        self.report
    }
}

pub struct Orchestrator<'a> {
    config: &'a ProvisionConfig,
    identity: &'a dyn IdentityService,
    compute: &'a dyn ComputePlatform,
    rpc: &'a dyn RepositoryRpc,
    pause: &'a dyn Pause,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a ProvisionConfig,
        identity: &'a dyn IdentityService,
        compute: &'a dyn ComputePlatform,
        rpc: &'a dyn RepositoryRpc,
        pause: &'a dyn Pause,
    ) -> Self {
        Self {
            config,
            identity,
            compute,
            rpc,
            pause,
        }
    }

    fn roles(&self) -> RoleLifecycleManager<'a> {
        RoleLifecycleManager::new(self.identity)
    }

    fn functions(&self) -> FunctionLifecycleManager<'a> {
        FunctionLifecycleManager::new(
            self.compute,
            self.pause,
            self.config.retry.clone(),
            FunctionDefaults::from(self.config),
        )
    }

    fn repositories(&self) -> RepositoryProvisioner<'a> {
        RepositoryProvisioner::new(
            self.rpc,
            &self.config.repository.provision_function,
            &self.config.repository.deprovision_function,
        )
    }

    /// Validate, create the role, provision the repository, create the function.
    pub fn create(
        &self,
        function_name: &str,
        runtime: &'static RuntimeDescriptor,
        cancel: &CancellationToken,
    ) -> WorkflowReport {
        let mut run = WorkflowRun::start(WorkflowKind::Create, function_name);

        if !run.enter(WorkflowStep::Validating, cancel) {
            return run.finish();
        }
        let spec = match FunctionSpec::new(function_name, runtime) {
            Ok(spec) => spec,
            Err(error) => return run.fail(error.into(), None),
        };
        run.complete(None);

        if !run.enter(WorkflowStep::RoleCreating, cancel) {
            return run.finish();
        }
        let role = match self.roles().create_role(&spec.role_name()) {
            Ok(role) => role,
            Err(failure) => {
                if let Some(arn) = failure.created_role_arn {
                    run.resource(ResourceKind::Role, arn, ResourceChange::Created);
                }
                return run.fail(failure.error, None);
            }
        };
        run.resource(ResourceKind::Role, role.arn.clone(), ResourceChange::Created);
        run.complete(None);

        if !run.enter(WorkflowStep::RepoProvisioning, cancel) {
            return run.finish();
        }
        let payload = self.config.repository.provision_payload(&spec);
        if let Err(error) = self.repositories().provision(&payload) {
            return run.fail(error, None);
        }
        run.resource(
            ResourceKind::Repository,
            format!("{}/{}", payload.owner, payload.repository_name),
            ResourceChange::Created,
        );
        run.complete(None);

        if !run.enter(WorkflowStep::FunctionCreating, cancel) {
            return run.finish();
        }
        let outcome = self.functions().create_function(&spec, &role.arn, cancel);
        let attempts = Some(outcome.attempts_used);
        if let Err(error) = outcome.into_result() {
            return run.fail(error, attempts);
        }
        run.resource(ResourceKind::Function, spec.name(), ResourceChange::Created);
        run.complete(attempts);

        run.finish()
    }

    /// Detach the policy, delete the function, delete the role, deprovision
    /// the repository.
    pub fn delete(&self, function_name: &str, cancel: &CancellationToken) -> WorkflowReport {
        let mut run = WorkflowRun::start(WorkflowKind::Delete, function_name);
        let role_name = role_name_for(function_name);

        if !run.enter(WorkflowStep::Validating, cancel) {
            return run.finish();
        }
        if let Err(error) = validate_function_name(function_name) {
            return run.fail(error.into(), None);
        }
        run.complete(None);

        if !run.enter(WorkflowStep::PolicyDetaching, cancel) {
            return run.finish();
        }
        if let Err(error) = self.roles().detach_policy(&role_name) {
            return run.fail(error, None);
        }
        run.complete(None);

        if !run.enter(WorkflowStep::FunctionDeleting, cancel) {
            return run.finish();
        }
        let function_failure = match self.functions().delete_function(function_name) {
            Ok(()) => {
                run.resource(ResourceKind::Function, function_name, ResourceChange::Deleted);
                run.complete(None);
                None
            }
            Err(error) => {
                run.record_failure(&error, None);
                Some(error)
            }
        };

        if !run.enter(WorkflowStep::RoleDeleting, cancel) {
            return run.finish();
        }
        if let Err(error) = self.roles().delete_role(&role_name) {
            return run.fail(error, None);
        }
        run.resource(ResourceKind::Role, role_name.as_str(), ResourceChange::Deleted);
        run.complete(None);

        if !run.enter(WorkflowStep::RepoDeprovisioning, cancel) {
            return run.finish();
        }
        let settings = &self.config.repository;
        let repository_name = settings.repository_name(function_name);
        if let Err(error) = self
            .repositories()
            .deprovision(&settings.owner, &repository_name)
        {
            return run.fail(error, None);
        }
        run.resource(
            ResourceKind::Repository,
            format!("{}/{}", settings.owner, repository_name),
            ResourceChange::Deleted,
        );
        run.complete(None);

        if let Some(error) = function_failure {
            run.report.state = WorkflowState::Failed {
                step: WorkflowStep::FunctionDeleting,
                error,
            };
        }
        run.finish()
    }

    /// Read-only listing; not part of either workflow.
    pub fn list(&self) -> Result<Vec<FunctionSummary>, ProvisionError> {
        self.functions().list_functions()
    }
}
