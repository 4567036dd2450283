use tracing::{info, warn};

use crate::contract::{RoleDescriptor, BASIC_EXECUTION_POLICY_ARN, TRUST_POLICY_DOCUMENT};
use crate::error::ProvisionError;
use crate::ports::IdentityService;

const COMPONENT: &str = "role_manager";

/// Role creation failed, possibly after the role itself already existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCreateFailure {
    pub error: ProvisionError,
    /// Set when the role was created but the policy attachment failed.
    pub created_role_arn: Option<String>,
}

pub struct RoleLifecycleManager<'a> {
    identity: &'a dyn IdentityService,
}

impl<'a> RoleLifecycleManager<'a> {
    pub fn new(identity: &'a dyn IdentityService) -> Self {
        Self { identity }
    }

    /// Creates the role and attaches the basic execution policy.
    ///
    /// A failed attachment leaves the role in place; the failure names its ARN
    /// so it can be cleaned up by hand.
    pub fn create_role(&self, role_name: &str) -> Result<RoleDescriptor, RoleCreateFailure> {
        let arn = self
            .identity
            .create_role(role_name, TRUST_POLICY_DOCUMENT)
            .map_err(|error| RoleCreateFailure {
                error,
                created_role_arn: None,
            })?;
        info!(component = COMPONENT, role_name, role_arn = %arn, "role_created");

        if let Err(error) = self
            .identity
            .attach_policy(role_name, BASIC_EXECUTION_POLICY_ARN)
        {
            warn!(
                component = COMPONENT,
                role_name,
                role_arn = %arn,
                error = %error,
                "policy_attach_failed"
            );
            return Err(RoleCreateFailure {
                error,
                created_role_arn: Some(arn),
            });
        }
        info!(
            component = COMPONENT,
            role_name,
            policy_arn = BASIC_EXECUTION_POLICY_ARN,
            "policy_attached"
        );

        Ok(RoleDescriptor::new(role_name, arn))
    }

    pub fn detach_policy(&self, role_name: &str) -> Result<(), ProvisionError> {
        self.identity
            .detach_policy(role_name, BASIC_EXECUTION_POLICY_ARN)?;
        info!(component = COMPONENT, role_name, "policy_detached");
        Ok(())
    }

    /// Only valid once the function is gone and the policy is detached.
    pub fn delete_role(&self, role_name: &str) -> Result<(), ProvisionError> {
        self.identity.delete_role(role_name)?;
        info!(component = COMPONENT, role_name, "role_deleted");
        Ok(())
    }
}
