use serde::Serialize;
use tracing::{info, warn};

use crate::contract::{RepositoryDeprovisionPayload, RepositoryProvisionPayload, RpcResponse};
use crate::error::ProvisionError;
use crate::ports::RepositoryRpc;

const COMPONENT: &str = "repository_provisioner";

/// Creates and deletes function repositories through a remote provisioning
/// function. One attempt per call.
pub struct RepositoryProvisioner<'a> {
    rpc: &'a dyn RepositoryRpc,
    provision_function: &'a str,
    deprovision_function: &'a str,
}

impl<'a> RepositoryProvisioner<'a> {
    pub fn new(
        rpc: &'a dyn RepositoryRpc,
        provision_function: &'a str,
        deprovision_function: &'a str,
    ) -> Self {
        Self {
            rpc,
            provision_function,
            deprovision_function,
        }
    }

    pub fn provision(&self, payload: &RepositoryProvisionPayload) -> Result<(), ProvisionError> {
        self.call(self.provision_function, payload)?;
        info!(
            component = COMPONENT,
            repository_name = %payload.repository_name,
            owner = %payload.owner,
            template_repo = %payload.template_repo,
            "repository_provisioned"
        );
        Ok(())
    }

    pub fn deprovision(&self, owner: &str, repository_name: &str) -> Result<(), ProvisionError> {
        let payload = RepositoryDeprovisionPayload {
            repository_owner: owner.to_string(),
            repository_name: repository_name.to_string(),
        };
        self.call(self.deprovision_function, &payload)?;
        info!(
            component = COMPONENT,
            repository_name,
            owner,
            "repository_deprovisioned"
        );
        Ok(())
    }

    fn call(&self, function_name: &str, payload: &impl Serialize) -> Result<(), ProvisionError> {
        let body = serde_json::to_vec(payload).map_err(|error| ProvisionError::Provisioning {
            status_code: None,
            message: format!("failed to serialize payload: {error}"),
        })?;

        let response = self
            .rpc
            .invoke(function_name, &body)
            .map_err(|error| match error {
                ProvisionError::Permission(_) | ProvisionError::Provisioning { .. } => error,
                other => ProvisionError::Provisioning {
                    status_code: None,
                    message: other.to_string(),
                },
            })?;

        if response.is_success() {
            return Ok(());
        }

        warn!(
            component = COMPONENT,
            function_name,
            status_code = response.status_code,
            function_error = response.function_error.as_deref().unwrap_or(""),
            "rpc_rejected"
        );
        Err(rejection(function_name, &response))
    }
}

fn rejection(function_name: &str, response: &RpcResponse) -> ProvisionError {
    let mut message = format!("{function_name} failed with status code {}", response.status_code);
    if let Some(kind) = &response.function_error {
        message.push_str(&format!(" ({kind})"));
    }
    if let Some(body) = response.body.as_deref().filter(|body| !body.is_empty()) {
        message.push_str(&format!(": {body}"));
    }
    ProvisionError::Provisioning {
        status_code: Some(response.status_code),
        message,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::contract::RPC_STATUS_OK;
    use crate::testing::FakeRepositoryRpc;

    fn payload() -> RepositoryProvisionPayload {
        RepositoryProvisionPayload {
            template_repo: "python-lambda".to_string(),
            template_owner: "acme".to_string(),
            owner: "acme".to_string(),
            repository_name: "my-fn.lambda".to_string(),
            repository_description: String::new(),
            visibility: "public".to_string(),
        }
    }

    #[test]
    fn provision_sends_json_payload_to_provision_function() {
        let rpc = FakeRepositoryRpc::new();
        let provisioner = RepositoryProvisioner::new(&rpc, "create-repo", "delete-repo");

        provisioner.provision(&payload()).expect("provision should succeed");

        let invocations = rpc.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].function_name, "create-repo");
        let body: Value = serde_json::from_slice(&invocations[0].payload).expect("json");
        assert_eq!(body["repositoryName"], "my-fn.lambda");
        assert_eq!(body["templateRepo"], "python-lambda");
    }

    #[test]
    fn deprovision_sends_owner_and_name() {
        let rpc = FakeRepositoryRpc::new();
        let provisioner = RepositoryProvisioner::new(&rpc, "create-repo", "delete-repo");

        provisioner
            .deprovision("acme", "my-fn.lambda")
            .expect("deprovision should succeed");

        let invocations = rpc.invocations();
        assert_eq!(invocations[0].function_name, "delete-repo");
        let body: Value = serde_json::from_slice(&invocations[0].payload).expect("json");
        assert_eq!(
            body,
            json!({"repositoryOwner": "acme", "repositoryName": "my-fn.lambda"})
        );
    }

    #[test]
    fn non_ok_status_is_a_provisioning_error_with_the_code() {
        let rpc = FakeRepositoryRpc::new();
        rpc.respond_with(RpcResponse {
            status_code: 500,
            function_error: None,
            body: None,
        });
        let provisioner = RepositoryProvisioner::new(&rpc, "create-repo", "delete-repo");

        let error = provisioner.provision(&payload()).expect_err("non-ok status");

        assert!(matches!(
            error,
            ProvisionError::Provisioning {
                status_code: Some(500),
                ..
            }
        ));
        assert_eq!(rpc.invocations().len(), 1);
    }

    #[test]
    fn function_error_fails_even_with_ok_status() {
        let rpc = FakeRepositoryRpc::new();
        rpc.respond_with(RpcResponse {
            status_code: RPC_STATUS_OK,
            function_error: Some("Unhandled".to_string()),
            body: Some("{\"errorMessage\":\"repo exists\"}".to_string()),
        });
        let provisioner = RepositoryProvisioner::new(&rpc, "create-repo", "delete-repo");

        let error = provisioner.provision(&payload()).expect_err("function error");

        assert!(error.to_string().contains("Unhandled"));
        assert!(error.to_string().contains("repo exists"));
    }

    #[test]
    fn transport_failure_is_reported_without_status_code() {
        let rpc = FakeRepositoryRpc::new();
        rpc.fail_with(ProvisionError::ComputePlatform("connection reset".to_string()));
        let provisioner = RepositoryProvisioner::new(&rpc, "create-repo", "delete-repo");

        let error = provisioner.provision(&payload()).expect_err("transport failure");

        assert_eq!(
            error,
            ProvisionError::Provisioning {
                status_code: None,
                message: "Compute platform error: connection reset".to_string(),
            }
        );
    }
}
