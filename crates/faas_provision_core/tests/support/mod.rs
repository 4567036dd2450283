#![allow(dead_code)]

use faas_provision_core::catalog::{lookup, Language, RuntimeDescriptor};
use faas_provision_core::contract::BASIC_EXECUTION_POLICY_ARN;
use faas_provision_core::testing::FakeCloud;
use faas_provision_core::{ProvisionConfig, ProvisionError};

pub fn config() -> ProvisionConfig {
    ProvisionConfig::default()
}

pub fn python() -> &'static RuntimeDescriptor {
    lookup(Language::Python)
}

pub fn role_not_usable() -> ProvisionError {
    ProvisionError::RoleNotYetUsable(
        "The role defined for the function cannot be assumed by Lambda.".to_string(),
    )
}

/// A cloud where `name` has been fully provisioned: role with policy and function.
pub fn provisioned_cloud(name: &str) -> FakeCloud {
    let cloud = FakeCloud::new();
    cloud
        .identity
        .seed_role(&format!("{name}-IamRole"), &[BASIC_EXECUTION_POLICY_ARN]);
    cloud.compute.seed_function(name);
    cloud
}
