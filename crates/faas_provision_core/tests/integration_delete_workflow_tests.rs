mod support;

use faas_provision_core::contract::RpcResponse;
use faas_provision_core::error::ErrorKind;
use faas_provision_core::orchestrator::{ResourceChange, StepStatus};
use faas_provision_core::testing::{FakeCloud, RemoteCall};
use faas_provision_core::{ProvisionError, WorkflowState, WorkflowStep};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use support::{config, provisioned_cloud, python};

fn failed_step(state: &WorkflowState) -> Option<WorkflowStep> {
    match state {
        WorkflowState::Failed { step, .. } => Some(*step),
        _ => None,
    }
}

#[test]
fn delete_tears_down_in_dependency_order() {
    let cloud = provisioned_cloud("my-fn");
    let config = config();

    let report = cloud
        .orchestrator(&config)
        .delete("my-fn", &CancellationToken::new());

    assert_eq!(report.state, WorkflowState::Done);
    assert_eq!(
        cloud.journal.calls(),
        vec![
            RemoteCall::DetachPolicy("my-fn-IamRole".to_string()),
            RemoteCall::DeleteFunction("my-fn".to_string()),
            RemoteCall::DeleteRole("my-fn-IamRole".to_string()),
            RemoteCall::Invoke {
                function_name: "delete-lambda-repository".to_string()
            },
        ]
    );
    assert!(!cloud.identity.role_exists("my-fn-IamRole"));
    assert!(!cloud.compute.function_exists("my-fn"));
    assert_eq!(
        cloud.rpc.json_payloads("delete-lambda-repository"),
        vec![json!({"repositoryOwner": "obscurelyme", "repositoryName": "my-fn.lambda"})]
    );
    assert_eq!(report.resources_with(ResourceChange::Deleted).len(), 3);
    assert!(report.cleanup_hints().is_empty());
}

#[test]
fn detach_failure_stops_before_anything_is_deleted() {
    let cloud = provisioned_cloud("my-fn");
    cloud
        .identity
        .fail_detach_with(ProvisionError::Permission("iam:DetachRolePolicy denied".to_string()));
    let config = config();

    let report = cloud
        .orchestrator(&config)
        .delete("my-fn", &CancellationToken::new());

    assert_eq!(failed_step(&report.state), Some(WorkflowStep::PolicyDetaching));
    assert_eq!(report.state.error_kind(), Some(ErrorKind::Permission));
    assert_eq!(
        cloud.journal.calls(),
        vec![RemoteCall::DetachPolicy("my-fn-IamRole".to_string())]
    );
    assert!(cloud.compute.function_exists("my-fn"));
    assert!(cloud.identity.role_exists("my-fn-IamRole"));
}

#[test]
fn deleting_twice_surfaces_not_found() {
    let cloud = provisioned_cloud("my-fn");
    let config = config();
    let orchestrator = cloud.orchestrator(&config);

    let first = orchestrator.delete("my-fn", &CancellationToken::new());
    let second = orchestrator.delete("my-fn", &CancellationToken::new());

    assert!(first.is_done());
    assert_eq!(failed_step(&second.state), Some(WorkflowStep::PolicyDetaching));
    assert_eq!(second.state.error_kind(), Some(ErrorKind::NotFound));
    assert_eq!(second.errors().len(), 1);
    assert!(second.errors()[0].is_not_found());
}

#[test]
fn function_delete_failure_still_removes_role_and_repository() {
    let cloud = provisioned_cloud("my-fn");
    cloud
        .compute
        .fail_delete_with(ProvisionError::ComputePlatform("ServiceException".to_string()));
    let config = config();

    let report = cloud
        .orchestrator(&config)
        .delete("my-fn", &CancellationToken::new());

    match &report.state {
        WorkflowState::Failed { step, error } => {
            assert_eq!(*step, WorkflowStep::FunctionDeleting);
            assert_eq!(
                *error,
                ProvisionError::ComputePlatform("ServiceException".to_string())
            );
        }
        other => panic!("unexpected state {other:?}"),
    }
    assert!(!cloud.identity.role_exists("my-fn-IamRole"));
    assert_eq!(cloud.rpc.invocations().len(), 1);
    assert!(cloud.compute.function_exists("my-fn"));

    let statuses: Vec<(WorkflowStep, StepStatus)> = report
        .steps
        .iter()
        .map(|record| (record.step, record.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (WorkflowStep::Validating, StepStatus::Completed),
            (WorkflowStep::PolicyDetaching, StepStatus::Completed),
            (WorkflowStep::FunctionDeleting, StepStatus::Failed),
            (WorkflowStep::RoleDeleting, StepStatus::Completed),
            (WorkflowStep::RepoDeprovisioning, StepStatus::Completed),
        ]
    );
}

#[test]
fn missing_function_does_not_strand_the_role() {
    let cloud = FakeCloud::new();
    cloud.identity.seed_role(
        "orphan-IamRole",
        &[faas_provision_core::contract::BASIC_EXECUTION_POLICY_ARN],
    );
    let config = config();

    let report = cloud
        .orchestrator(&config)
        .delete("orphan", &CancellationToken::new());

    assert_eq!(failed_step(&report.state), Some(WorkflowStep::FunctionDeleting));
    assert_eq!(report.state.error_kind(), Some(ErrorKind::NotFound));
    assert!(!cloud.identity.role_exists("orphan-IamRole"));
}

#[test]
fn role_delete_failure_skips_repository_deprovisioning() {
    let cloud = provisioned_cloud("my-fn");
    cloud
        .identity
        .fail_delete_with(ProvisionError::IdentityService("ServiceFailure".to_string()));
    let config = config();

    let report = cloud
        .orchestrator(&config)
        .delete("my-fn", &CancellationToken::new());

    assert_eq!(failed_step(&report.state), Some(WorkflowStep::RoleDeleting));
    assert!(!cloud.compute.function_exists("my-fn"));
    assert!(cloud.rpc.invocations().is_empty());
}

#[test]
fn repository_function_error_fails_the_last_step() {
    let cloud = provisioned_cloud("my-fn");
    cloud.rpc.respond_with(RpcResponse {
        status_code: 200,
        function_error: Some("Unhandled".to_string()),
        body: Some("{\"errorMessage\":\"Not Found\"}".to_string()),
    });
    let config = config();

    let report = cloud
        .orchestrator(&config)
        .delete("my-fn", &CancellationToken::new());

    assert_eq!(failed_step(&report.state), Some(WorkflowStep::RepoDeprovisioning));
    assert_eq!(report.state.error_kind(), Some(ErrorKind::Provisioning));
    assert!(!cloud.identity.role_exists("my-fn-IamRole"));
    assert!(!cloud.compute.function_exists("my-fn"));
}

#[test]
fn invalid_name_is_rejected_before_teardown() {
    let cloud = provisioned_cloud("my-fn");
    let config = config();

    let report = cloud
        .orchestrator(&config)
        .delete("my_fn", &CancellationToken::new());

    assert_eq!(failed_step(&report.state), Some(WorkflowStep::Validating));
    assert_eq!(report.state.error_kind(), Some(ErrorKind::Validation));
    assert!(cloud.journal.calls().is_empty());
}

#[test]
fn cancelled_delete_touches_nothing() {
    let cloud = provisioned_cloud("my-fn");
    let config = config();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = cloud.orchestrator(&config).delete("my-fn", &cancel);

    assert_eq!(
        report.state,
        WorkflowState::Aborted {
            step: WorkflowStep::Validating
        }
    );
    assert!(cloud.journal.calls().is_empty());
}

#[test]
fn create_then_delete_leaves_nothing_behind() {
    let cloud = FakeCloud::new();
    let config = config();
    let orchestrator = cloud.orchestrator(&config);

    let created = orchestrator.create("round-trip", python(), &CancellationToken::new());
    let deleted = orchestrator.delete("round-trip", &CancellationToken::new());

    assert!(created.is_done());
    assert!(deleted.is_done());
    assert!(!cloud.identity.role_exists("round-trip-IamRole"));
    assert!(!cloud.compute.function_exists("round-trip"));
    assert!(orchestrator.list().expect("list").is_empty());
}
