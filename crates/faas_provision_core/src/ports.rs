//! Capability traits for the remote collaborators the workflows drive.
//!
//! Every call is blocking from the caller's point of view; adapters own any
//! async runtime they need. Implementations classify provider failures into
//! [`ProvisionError`] before returning.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::contract::{FunctionCreateRequest, FunctionSummary, RpcResponse};
use crate::error::ProvisionError;

pub trait IdentityService {
    /// Creates the role and returns its ARN.
    fn create_role(&self, role_name: &str, trust_policy_json: &str)
        -> Result<String, ProvisionError>;
    fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProvisionError>;
    fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProvisionError>;
    fn delete_role(&self, role_name: &str) -> Result<(), ProvisionError>;
}

pub trait ComputePlatform {
    /// Fails with [`ProvisionError::RoleNotYetUsable`] while the execution
    /// role has not propagated yet.
    fn create_function(&self, request: &FunctionCreateRequest) -> Result<(), ProvisionError>;
    fn delete_function(&self, name: &str) -> Result<(), ProvisionError>;
    fn list_functions(&self) -> Result<Vec<FunctionSummary>, ProvisionError>;
}

pub trait RepositoryRpc {
    /// Transport failures are errors; a non-OK answer is still a response.
    fn invoke(&self, function_name: &str, payload: &[u8]) -> Result<RpcResponse, ProvisionError>;
}

pub trait Pause {
    /// Returns `false` when `cancel` fired before the duration elapsed.
    fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool;
}

/// Blocks the calling thread, checking for cancellation in short slices.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        const SLICE: Duration = Duration::from_millis(100);
        let mut remaining = duration;
        while !remaining.is_zero() {
            if cancel.is_cancelled() {
                return false;
            }
            let step = remaining.min(SLICE);
            std::thread::sleep(step);
            remaining -= step;
        }
        !cancel.is_cancelled()
    }
}
