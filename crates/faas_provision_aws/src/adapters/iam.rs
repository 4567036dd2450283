use aws_config::SdkConfig;
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata};
use faas_provision_core::error::classify_identity_error;
use faas_provision_core::ports::IdentityService;
use faas_provision_core::ProvisionError;
use tracing::debug;

use super::block_on;

const COMPONENT: &str = "iam_adapter";

#[derive(Clone)]
pub struct AwsIdentityService {
    client: aws_sdk_iam::Client,
}

impl AwsIdentityService {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_iam::Client::new(config),
        }
    }
}

impl IdentityService for AwsIdentityService {
    fn create_role(
        &self,
        role_name: &str,
        trust_policy_json: &str,
    ) -> Result<String, ProvisionError> {
        debug!(component = COMPONENT, role_name, "create_role");
        let output = block_on(
            self.client
                .create_role()
                .role_name(role_name)
                .assume_role_policy_document(trust_policy_json)
                .send(),
        )
        .map_err(|error| identity_error(&error, role_name))?;

        output
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| {
                ProvisionError::IdentityService(format!(
                    "create-role response for {role_name} carried no role"
                ))
            })
    }

    fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProvisionError> {
        debug!(component = COMPONENT, role_name, policy_arn, "attach_role_policy");
        block_on(
            self.client
                .attach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send(),
        )
        .map(|_| ())
        .map_err(|error| identity_error(&error, role_name))
    }

    fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProvisionError> {
        debug!(component = COMPONENT, role_name, policy_arn, "detach_role_policy");
        block_on(
            self.client
                .detach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send(),
        )
        .map(|_| ())
        .map_err(|error| identity_error(&error, role_name))
    }

    fn delete_role(&self, role_name: &str) -> Result<(), ProvisionError> {
        debug!(component = COMPONENT, role_name, "delete_role");
        block_on(self.client.delete_role().role_name(role_name).send())
            .map(|_| ())
            .map_err(|error| identity_error(&error, role_name))
    }
}

fn identity_error<E>(error: &E, role_name: &str) -> ProvisionError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let context = DisplayErrorContext(error).to_string();
    classify_identity_error(
        error.code(),
        Some(error.message().unwrap_or(&context)),
        role_name,
    )
}
