//! SDK-backed implementations of the core capability traits.
//!
//! The workflows are blocking, so every adapter drives its async SDK call to
//! completion on the ambient Tokio runtime. Callers must run the orchestrator
//! from a blocking context (`spawn_blocking`) inside that runtime.

pub mod iam;
pub mod lambda;

use std::future::Future;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use faas_provision_core::ProvisionConfig;

pub use iam::AwsIdentityService;
pub use lambda::{AwsComputePlatform, AwsRepositoryRpc};

/// Resolves credentials and region, honouring the configured profile/region
/// before the SDK's own environment chain.
pub async fn load_sdk_config(config: &ProvisionConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(profile) = &config.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    loader.load().await
}

pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
