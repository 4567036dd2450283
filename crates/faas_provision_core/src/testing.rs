//! In-memory stand-ins for the remote collaborators.
//!
//! The fakes keep just enough remote state to honour the provider's own
//! integrity rules (a role with attached policies cannot be deleted, deleting
//! something twice is a not-found error). Every call is appended to a shared
//! [`Journal`] so tests can assert on cross-service ordering.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::ProvisionConfig;
use crate::contract::{FunctionCreateRequest, FunctionSummary, RpcResponse};
use crate::error::{ProvisionError, ResourceKind};
use crate::orchestrator::Orchestrator;
use crate::ports::{ComputePlatform, IdentityService, Pause, RepositoryRpc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    CreateRole(String),
    AttachPolicy(String),
    DetachPolicy(String),
    DeleteRole(String),
    CreateFunction { name: String, role_arn: String },
    DeleteFunction(String),
    ListFunctions,
    Invoke { function_name: String },
}

impl RemoteCall {
    fn is_identity(&self) -> bool {
        matches!(
            self,
            Self::CreateRole(_) | Self::AttachPolicy(_) | Self::DetachPolicy(_) | Self::DeleteRole(_)
        )
    }

    fn is_compute(&self) -> bool {
        matches!(
            self,
            Self::CreateFunction { .. } | Self::DeleteFunction(_) | Self::ListFunctions
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<RemoteCall>>>,
}

impl Journal {
    fn push(&self, call: RemoteCall) {
        self.calls.lock().expect("poisoned mutex").push(call);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().expect("poisoned mutex").clone()
    }

    pub fn position(&self, predicate: impl Fn(&RemoteCall) -> bool) -> Option<usize> {
        self.calls().iter().position(predicate)
    }
}

#[derive(Debug, Default)]
struct IdentityState {
    roles: BTreeMap<String, BTreeSet<String>>,
    fail_create: Option<ProvisionError>,
    fail_attach: Option<ProvisionError>,
    fail_detach: Option<ProvisionError>,
    fail_delete: Option<ProvisionError>,
}

#[derive(Debug, Default)]
pub struct FakeIdentityService {
    state: Mutex<IdentityState>,
    journal: Journal,
}

impl FakeIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Mutex::default(),
            journal,
        }
    }

    pub fn arn_for(role_name: &str) -> String {
        format!("arn:aws:iam::000000000000:role/{role_name}")
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.journal
            .calls()
            .into_iter()
            .filter(RemoteCall::is_identity)
            .collect()
    }

    /// Adds a role with the given policies already attached.
    pub fn seed_role(&self, role_name: &str, policies: &[&str]) {
        self.lock().roles.insert(
            role_name.to_string(),
            policies.iter().map(|policy| policy.to_string()).collect(),
        );
    }

    pub fn role_exists(&self, role_name: &str) -> bool {
        self.lock().roles.contains_key(role_name)
    }

    pub fn has_attached_policy(&self, role_name: &str) -> bool {
        self.lock()
            .roles
            .get(role_name)
            .map(|policies| !policies.is_empty())
            .unwrap_or(false)
    }

    pub fn fail_create_with(&self, error: ProvisionError) {
        self.lock().fail_create = Some(error);
    }

    pub fn fail_attach_with(&self, error: ProvisionError) {
        self.lock().fail_attach = Some(error);
    }

    pub fn fail_detach_with(&self, error: ProvisionError) {
        self.lock().fail_detach = Some(error);
    }

    pub fn fail_delete_with(&self, error: ProvisionError) {
        self.lock().fail_delete = Some(error);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IdentityState> {
        self.state.lock().expect("poisoned mutex")
    }
}

impl IdentityService for FakeIdentityService {
    fn create_role(
        &self,
        role_name: &str,
        _trust_policy_json: &str,
    ) -> Result<String, ProvisionError> {
        self.journal.push(RemoteCall::CreateRole(role_name.to_string()));
        let mut state = self.lock();
        if let Some(error) = state.fail_create.clone() {
            return Err(error);
        }
        if state.roles.contains_key(role_name) {
            return Err(ProvisionError::IdentityService(format!(
                "EntityAlreadyExists: Role with name {role_name} already exists."
            )));
        }
        state.roles.insert(role_name.to_string(), BTreeSet::new());
        Ok(Self::arn_for(role_name))
    }

    fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProvisionError> {
        self.journal.push(RemoteCall::AttachPolicy(role_name.to_string()));
        let mut state = self.lock();
        if let Some(error) = state.fail_attach.clone() {
            return Err(error);
        }
        let policies = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| ProvisionError::not_found(ResourceKind::Role, role_name))?;
        policies.insert(policy_arn.to_string());
        Ok(())
    }

    fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProvisionError> {
        self.journal.push(RemoteCall::DetachPolicy(role_name.to_string()));
        let mut state = self.lock();
        if let Some(error) = state.fail_detach.clone() {
            return Err(error);
        }
        let policies = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| ProvisionError::not_found(ResourceKind::Role, role_name))?;
        if !policies.remove(policy_arn) {
            return Err(ProvisionError::not_found(ResourceKind::Role, role_name));
        }
        Ok(())
    }

    fn delete_role(&self, role_name: &str) -> Result<(), ProvisionError> {
        self.journal.push(RemoteCall::DeleteRole(role_name.to_string()));
        let mut state = self.lock();
        if let Some(error) = state.fail_delete.clone() {
            return Err(error);
        }
        let has_policies = match state.roles.get(role_name) {
            None => return Err(ProvisionError::not_found(ResourceKind::Role, role_name)),
            Some(policies) => !policies.is_empty(),
        };
        if has_policies {
            return Err(ProvisionError::IdentityService(
                "DeleteConflict: Cannot delete entity, must detach all policies first."
                    .to_string(),
            ));
        }
        state.roles.remove(role_name);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ComputeState {
    functions: BTreeMap<String, FunctionCreateRequest>,
    queued_create_errors: VecDeque<ProvisionError>,
    always_fail_create: Option<ProvisionError>,
    fail_delete: Option<ProvisionError>,
    create_attempts: u32,
}

#[derive(Debug, Default)]
pub struct FakeComputePlatform {
    state: Mutex<ComputeState>,
    journal: Journal,
}

impl FakeComputePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Mutex::default(),
            journal,
        }
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.journal
            .calls()
            .into_iter()
            .filter(RemoteCall::is_compute)
            .collect()
    }

    /// Errors returned, in order, by the next create-function calls.
    pub fn queue_create_errors(&self, errors: impl IntoIterator<Item = ProvisionError>) {
        self.lock().queued_create_errors.extend(errors);
    }

    pub fn always_fail_create_with(&self, error: ProvisionError) {
        self.lock().always_fail_create = Some(error);
    }

    pub fn fail_delete_with(&self, error: ProvisionError) {
        self.lock().fail_delete = Some(error);
    }

    pub fn seed_function(&self, name: &str) {
        let request = FunctionCreateRequest {
            name: name.to_string(),
            code_ref: crate::contract::CodeRef {
                bucket: "seeded".to_string(),
                key: "seeded.zip".to_string(),
            },
            role_arn: FakeIdentityService::arn_for(&crate::naming::role_name_for(name)),
            runtime_id: "nodejs20.x".to_string(),
            handler: "index.handler".to_string(),
            timeout_seconds: 30,
            architecture: crate::contract::Architecture::Arm64,
        };
        self.lock().functions.insert(name.to_string(), request);
    }

    pub fn function_exists(&self, name: &str) -> bool {
        self.lock().functions.contains_key(name)
    }

    pub fn created_request(&self, name: &str) -> Option<FunctionCreateRequest> {
        self.lock().functions.get(name).cloned()
    }

    pub fn create_attempts(&self) -> u32 {
        self.lock().create_attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ComputeState> {
        self.state.lock().expect("poisoned mutex")
    }
}

impl ComputePlatform for FakeComputePlatform {
    fn create_function(&self, request: &FunctionCreateRequest) -> Result<(), ProvisionError> {
        self.journal.push(RemoteCall::CreateFunction {
            name: request.name.clone(),
            role_arn: request.role_arn.clone(),
        });
        let mut state = self.lock();
        state.create_attempts += 1;
        if let Some(error) = state.queued_create_errors.pop_front() {
            return Err(error);
        }
        if let Some(error) = state.always_fail_create.clone() {
            return Err(error);
        }
        if state.functions.contains_key(&request.name) {
            return Err(ProvisionError::ComputePlatform(format!(
                "ResourceConflictException: Function already exist: {}",
                request.name
            )));
        }
        state.functions.insert(request.name.clone(), request.clone());
        Ok(())
    }

    fn delete_function(&self, name: &str) -> Result<(), ProvisionError> {
        self.journal.push(RemoteCall::DeleteFunction(name.to_string()));
        let mut state = self.lock();
        if let Some(error) = state.fail_delete.clone() {
            return Err(error);
        }
        state
            .functions
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ProvisionError::not_found(ResourceKind::Function, name))
    }

    fn list_functions(&self) -> Result<Vec<FunctionSummary>, ProvisionError> {
        self.journal.push(RemoteCall::ListFunctions);
        Ok(self
            .lock()
            .functions
            .values()
            .map(|request| FunctionSummary {
                name: request.name.clone(),
                runtime_id: Some(request.runtime_id.clone()),
                handler: Some(request.handler.clone()),
                last_modified: None,
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcInvocation {
    pub function_name: String,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct RpcState {
    invocations: Vec<RpcInvocation>,
    response: RpcResponse,
    fail: Option<ProvisionError>,
}

#[derive(Debug)]
pub struct FakeRepositoryRpc {
    state: Mutex<RpcState>,
    journal: Journal,
}

impl Default for FakeRepositoryRpc {
    fn default() -> Self {
        Self::with_journal(Journal::default())
    }
}

impl FakeRepositoryRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Mutex::new(RpcState {
                invocations: Vec::new(),
                response: RpcResponse::ok(),
                fail: None,
            }),
            journal,
        }
    }

    pub fn respond_with(&self, response: RpcResponse) {
        self.lock().response = response;
    }

    pub fn fail_with(&self, error: ProvisionError) {
        self.lock().fail = Some(error);
    }

    pub fn invocations(&self) -> Vec<RpcInvocation> {
        self.lock().invocations.clone()
    }

    /// Payloads sent to `function_name`, parsed as JSON.
    pub fn json_payloads(&self, function_name: &str) -> Vec<serde_json::Value> {
        self.invocations()
            .into_iter()
            .filter(|invocation| invocation.function_name == function_name)
            .map(|invocation| {
                serde_json::from_slice(&invocation.payload).expect("payload should be json")
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RpcState> {
        self.state.lock().expect("poisoned mutex")
    }
}

impl RepositoryRpc for FakeRepositoryRpc {
    fn invoke(&self, function_name: &str, payload: &[u8]) -> Result<RpcResponse, ProvisionError> {
        self.journal.push(RemoteCall::Invoke {
            function_name: function_name.to_string(),
        });
        let mut state = self.lock();
        state.invocations.push(RpcInvocation {
            function_name: function_name.to_string(),
            payload: payload.to_vec(),
        });
        if let Some(error) = state.fail.clone() {
            return Err(error);
        }
        Ok(state.response.clone())
    }
}

/// Records requested pauses instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingPause {
    pauses: Mutex<Vec<Duration>>,
    cancel_on: Option<usize>,
}

impl RecordingPause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token during the `n`-th pause (1-based).
    pub fn cancelling_after(n: usize) -> Self {
        Self {
            pauses: Mutex::default(),
            cancel_on: Some(n),
        }
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().expect("poisoned mutex").clone()
    }

    pub fn total(&self) -> Duration {
        self.pauses().into_iter().sum()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        let mut pauses = self.pauses.lock().expect("poisoned mutex");
        pauses.push(duration);
        if self.cancel_on == Some(pauses.len()) {
            cancel.cancel();
        }
        !cancel.is_cancelled()
    }
}

/// All fakes wired to one journal.
#[derive(Debug)]
pub struct FakeCloud {
    pub journal: Journal,
    pub identity: FakeIdentityService,
    pub compute: FakeComputePlatform,
    pub rpc: FakeRepositoryRpc,
    pub pause: RecordingPause,
}

impl FakeCloud {
    pub fn new() -> Self {
        let journal = Journal::default();
        Self {
            identity: FakeIdentityService::with_journal(journal.clone()),
            compute: FakeComputePlatform::with_journal(journal.clone()),
            rpc: FakeRepositoryRpc::with_journal(journal.clone()),
            pause: RecordingPause::new(),
            journal,
        }
    }

    pub fn with_pause(mut self, pause: RecordingPause) -> Self {
        self.pause = pause;
        self
    }

    pub fn orchestrator<'a>(&'a self, config: &'a ProvisionConfig) -> Orchestrator<'a> {
        Orchestrator::new(config, &self.identity, &self.compute, &self.rpc, &self.pause)
    }
}
