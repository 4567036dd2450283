use serde::{Deserialize, Serialize};

use crate::catalog::RuntimeDescriptor;
use crate::error::ValidationError;
use crate::naming::{repository_name_for, role_name_for, validate_function_name};

/// Basic execution policy every provisioned function role receives.
pub const BASIC_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Trust policy letting the compute platform assume the function role.
pub const TRUST_POLICY_DOCUMENT: &str = r#"{
  "Version": "2012-10-17",
  "Statement": [
    {
      "Effect": "Allow",
      "Principal": {
        "Service": "lambda.amazonaws.com"
      },
      "Action": "sts:AssumeRole"
    }
  ]
}"#;

pub const DEFAULT_TIMEOUT_SECONDS: i32 = 30;

/// Status code the repository RPC target answers with on success.
pub const RPC_STATUS_OK: i32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[default]
    Arm64,
    X86_64,
}

impl Architecture {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X86_64 => "x86_64",
        }
    }
}

/// A validated function name paired with its runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    name: String,
    runtime: &'static RuntimeDescriptor,
}

impl FunctionSpec {
    pub fn new(
        name: impl Into<String>,
        runtime: &'static RuntimeDescriptor,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_function_name(&name)?;
        Ok(Self { name, runtime })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runtime(&self) -> &'static RuntimeDescriptor {
        self.runtime
    }

    pub fn role_name(&self) -> String {
        role_name_for(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDescriptor {
    pub name: String,
    pub arn: String,
    pub policy_arn: &'static str,
}

impl RoleDescriptor {
    pub fn new(name: impl Into<String>, arn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arn: arn.into(),
            policy_arn: BASIC_EXECUTION_POLICY_ARN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryProvisionPayload {
    pub template_repo: String,
    pub template_owner: String,
    pub owner: String,
    pub repository_name: String,
    pub repository_description: String,
    pub visibility: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryDeprovisionPayload {
    pub repository_owner: String,
    pub repository_name: String,
}

/// Repository naming and ownership settings used to build payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositorySettings {
    pub template_owner: String,
    pub owner: String,
    pub name_suffix: String,
    pub description: String,
    pub visibility: String,
    pub provision_function: String,
    pub deprovision_function: String,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            template_owner: "obscurelyme".to_string(),
            owner: "obscurelyme".to_string(),
            name_suffix: "lambda".to_string(),
            description: String::new(),
            visibility: "public".to_string(),
            provision_function: "create-lambda-repository".to_string(),
            deprovision_function: "delete-lambda-repository".to_string(),
        }
    }
}

impl RepositorySettings {
    pub fn repository_name(&self, function_name: &str) -> String {
        repository_name_for(function_name, &self.name_suffix)
    }

    pub fn provision_payload(&self, spec: &FunctionSpec) -> RepositoryProvisionPayload {
        RepositoryProvisionPayload {
            template_repo: spec.runtime().template_repo_id.to_string(),
            template_owner: self.template_owner.clone(),
            owner: self.owner.clone(),
            repository_name: self.repository_name(spec.name()),
            repository_description: self.description.clone(),
            visibility: self.visibility.clone(),
        }
    }

    pub fn deprovision_payload(&self, function_name: &str) -> RepositoryDeprovisionPayload {
        RepositoryDeprovisionPayload {
            repository_owner: self.owner.clone(),
            repository_name: self.repository_name(function_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeRef {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionCreateRequest {
    pub name: String,
    pub code_ref: CodeRef,
    pub role_arn: String,
    pub runtime_id: String,
    pub handler: String,
    pub timeout_seconds: i32,
    pub architecture: Architecture,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSummary {
    pub name: String,
    pub runtime_id: Option<String>,
    pub handler: Option<String>,
    pub last_modified: Option<String>,
}

/// What the repository RPC target answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse {
    pub status_code: i32,
    /// Set by the platform when the invoked function itself raised.
    pub function_error: Option<String>,
    pub body: Option<String>,
}

impl RpcResponse {
    pub fn ok() -> Self {
        Self {
            status_code: RPC_STATUS_OK,
            function_error: None,
            body: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == RPC_STATUS_OK && self.function_error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::catalog::{lookup, Language};

    #[test]
    fn function_spec_rejects_invalid_names() {
        let error = FunctionSpec::new("bad name", lookup(Language::Java)).expect_err("invalid");
        assert!(error.message().contains("not allowed"));
    }

    #[test]
    fn provision_payload_uses_camel_case_wire_keys() {
        let spec = FunctionSpec::new("my-fn", lookup(Language::NodeJs)).expect("valid spec");
        let payload = RepositorySettings::default().provision_payload(&spec);

        let value = serde_json::to_value(&payload).expect("payload should serialize");
        assert_eq!(
            value,
            json!({
                "templateRepo": "nodejs-lambda",
                "templateOwner": "obscurelyme",
                "owner": "obscurelyme",
                "repositoryName": "my-fn.lambda",
                "repositoryDescription": "",
                "visibility": "public",
            })
        );
    }

    #[test]
    fn deprovision_payload_names_owner_and_repository() {
        let settings = RepositorySettings {
            owner: "acme".to_string(),
            name_suffix: "fn".to_string(),
            ..RepositorySettings::default()
        };

        let value: Value = serde_json::to_value(settings.deprovision_payload("billing"))
            .expect("payload should serialize");
        assert_eq!(
            value,
            json!({"repositoryOwner": "acme", "repositoryName": "billing.fn"})
        );
    }

    #[test]
    fn rpc_response_requires_ok_status_and_no_function_error() {
        assert!(RpcResponse::ok().is_success());
        assert!(!RpcResponse {
            status_code: 202,
            ..RpcResponse::ok()
        }
        .is_success());
        assert!(!RpcResponse {
            function_error: Some("Unhandled".to_string()),
            ..RpcResponse::ok()
        }
        .is_success());
    }

    #[test]
    fn role_descriptor_carries_basic_execution_policy() {
        let role = RoleDescriptor::new("my-fn-IamRole", "arn:aws:iam::123:role/my-fn-IamRole");
        assert_eq!(role.policy_arn, BASIC_EXECUTION_POLICY_ARN);
    }

    #[test]
    fn trust_policy_is_valid_json_for_the_lambda_principal() {
        let value: Value = serde_json::from_str(TRUST_POLICY_DOCUMENT).expect("valid json");
        assert_eq!(
            value["Statement"][0]["Principal"]["Service"],
            "lambda.amazonaws.com"
        );
    }
}
