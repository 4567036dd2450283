use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{ProvisionConfig, RetryPolicy};
use crate::contract::{Architecture, CodeRef, FunctionCreateRequest, FunctionSpec, FunctionSummary};
use crate::error::{ErrorKind, ProvisionError};
use crate::ports::{ComputePlatform, Pause};

const COMPONENT: &str = "function_manager";

/// Result of the retrying create-function call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub success: bool,
    pub last_error: Option<ProvisionError>,
    pub attempts_used: u32,
}

impl ProvisionOutcome {
    fn succeeded(attempts_used: u32) -> Self {
        Self {
            success: true,
            last_error: None,
            attempts_used,
        }
    }

    fn failed(error: ProvisionError, attempts_used: u32) -> Self {
        Self {
            success: false,
            last_error: Some(error),
            attempts_used,
        }
    }

    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        self.last_error.as_ref().map(ProvisionError::kind)
    }

    pub fn into_result(self) -> Result<u32, ProvisionError> {
        match self.last_error {
            None if self.success => Ok(self.attempts_used),
            Some(error) => Err(error),
            None => Err(ProvisionError::ComputePlatform(
                "function creation did not complete".to_string(),
            )),
        }
    }
}

/// Settings the manager stamps onto every create-function request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDefaults {
    pub artifact_bucket: String,
    pub timeout_seconds: i32,
    pub architecture: Architecture,
}

impl From<&ProvisionConfig> for FunctionDefaults {
    fn from(config: &ProvisionConfig) -> Self {
        Self {
            artifact_bucket: config.artifact_bucket.clone(),
            timeout_seconds: config.timeout_seconds,
            architecture: config.architecture,
        }
    }
}

pub struct FunctionLifecycleManager<'a> {
    compute: &'a dyn ComputePlatform,
    pause: &'a dyn Pause,
    retry: RetryPolicy,
    defaults: FunctionDefaults,
}

impl<'a> FunctionLifecycleManager<'a> {
    pub fn new(
        compute: &'a dyn ComputePlatform,
        pause: &'a dyn Pause,
        retry: RetryPolicy,
        defaults: FunctionDefaults,
    ) -> Self {
        Self {
            compute,
            pause,
            retry,
            defaults,
        }
    }

    pub fn build_request(&self, spec: &FunctionSpec, role_arn: &str) -> FunctionCreateRequest {
        let runtime = spec.runtime();
        FunctionCreateRequest {
            name: spec.name().to_string(),
            code_ref: CodeRef {
                bucket: self.defaults.artifact_bucket.clone(),
                key: runtime.example_artifact_key.to_string(),
            },
            role_arn: role_arn.to_string(),
            runtime_id: runtime.platform_runtime_id.to_string(),
            handler: runtime.default_handler.to_string(),
            timeout_seconds: self.defaults.timeout_seconds,
            architecture: self.defaults.architecture,
        }
    }

    /// Creates the function, waiting out role propagation.
    ///
    /// Only [`ProvisionError::RoleNotYetUsable`] is retried, at most
    /// `max_retries` times after the first attempt. Any other error ends the
    /// loop immediately without pausing.
    pub fn create_function(
        &self,
        spec: &FunctionSpec,
        role_arn: &str,
        cancel: &CancellationToken,
    ) -> ProvisionOutcome {
        let request = self.build_request(spec, role_arn);
        let max_attempts = self.retry.max_attempts();
        let mut attempts = 0u32;
        let mut last_error = None;

        while attempts < max_attempts {
            if cancel.is_cancelled() {
                return ProvisionOutcome::failed(aborted("before create-function attempt"), attempts);
            }

            attempts += 1;
            match self.compute.create_function(&request) {
                Ok(()) => {
                    info!(
                        component = COMPONENT,
                        function_name = %request.name,
                        attempts,
                        "function_created"
                    );
                    return ProvisionOutcome::succeeded(attempts);
                }
                Err(error) if error.is_retryable() && attempts < max_attempts => {
                    let delay = self.retry.delay_for(attempts);
                    info!(
                        component = COMPONENT,
                        function_name = %request.name,
                        attempt = attempts,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "create_function_retry"
                    );
                    last_error = Some(error);
                    if !self.pause.pause(delay, cancel) {
                        return ProvisionOutcome::failed(
                            aborted("while waiting for role propagation"),
                            attempts,
                        );
                    }
                }
                Err(error) => {
                    warn!(
                        component = COMPONENT,
                        function_name = %request.name,
                        attempts,
                        error_type = error.error_type(),
                        error = %error,
                        "function_create_failed"
                    );
                    return ProvisionOutcome::failed(error, attempts);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| {
            ProvisionError::ComputePlatform("no create-function attempt was made".to_string())
        });
        ProvisionOutcome::failed(error, attempts)
    }

    pub fn delete_function(&self, name: &str) -> Result<(), ProvisionError> {
        self.compute.delete_function(name)?;
        info!(component = COMPONENT, function_name = name, "function_deleted");
        Ok(())
    }

    pub fn list_functions(&self) -> Result<Vec<FunctionSummary>, ProvisionError> {
        let mut functions = self.compute.list_functions()?;
        functions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(functions)
    }
}

fn aborted(when: &str) -> ProvisionError {
    ProvisionError::Aborted(format!("cancelled {when}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::catalog::{lookup, Language};
    use crate::testing::{FakeComputePlatform, RecordingPause};

    fn spec() -> FunctionSpec {
        FunctionSpec::new("my-fn", lookup(Language::Java)).expect("valid spec")
    }

    fn manager<'a>(
        compute: &'a FakeComputePlatform,
        pause: &'a RecordingPause,
    ) -> FunctionLifecycleManager<'a> {
        FunctionLifecycleManager::new(
            compute,
            pause,
            RetryPolicy::default(),
            FunctionDefaults::from(&ProvisionConfig::default()),
        )
    }

    fn not_usable() -> ProvisionError {
        ProvisionError::RoleNotYetUsable("cannot be assumed".to_string())
    }

    #[test]
    fn request_carries_runtime_role_and_fixed_settings() {
        let compute = FakeComputePlatform::new();
        let pause = RecordingPause::new();

        let request = manager(&compute, &pause).build_request(&spec(), "arn:role");

        assert_eq!(request.runtime_id, "java21");
        assert_eq!(request.handler, "com.example.app.Function::Handler");
        assert_eq!(request.code_ref.bucket, "example-lambda-apps");
        assert_eq!(request.code_ref.key, "java-function.zip");
        assert_eq!(request.role_arn, "arn:role");
        assert_eq!(request.timeout_seconds, 30);
        assert_eq!(request.architecture, Architecture::Arm64);
    }

    #[test]
    fn succeeds_on_third_attempt_after_propagation_delay() {
        let compute = FakeComputePlatform::new();
        compute.queue_create_errors([not_usable(), not_usable()]);
        let pause = RecordingPause::new();

        let outcome = manager(&compute, &pause).create_function(
            &spec(),
            "arn:role",
            &CancellationToken::new(),
        );

        assert!(outcome.success);
        assert_eq!(outcome.attempts_used, 3);
        assert_eq!(outcome.last_error, None);
        assert_eq!(pause.pauses(), vec![Duration::from_secs(5); 2]);
        assert!(compute.function_exists("my-fn"));
    }

    #[test]
    fn gives_up_after_initial_attempt_plus_three_retries() {
        let compute = FakeComputePlatform::new();
        compute.always_fail_create_with(not_usable());
        let pause = RecordingPause::new();

        let outcome = manager(&compute, &pause).create_function(
            &spec(),
            "arn:role",
            &CancellationToken::new(),
        );

        assert!(!outcome.success);
        assert_eq!(outcome.attempts_used, 4);
        assert_eq!(outcome.last_error, Some(not_usable()));
        assert_eq!(compute.create_attempts(), 4);
        assert_eq!(pause.pauses().len(), 3);
        assert_eq!(pause.total(), Duration::from_secs(15));
    }

    #[test]
    fn non_retryable_error_fails_immediately_without_pausing() {
        let compute = FakeComputePlatform::new();
        compute.queue_create_errors([ProvisionError::ComputePlatform(
            "CodeStorageExceededException".to_string(),
        )]);
        let pause = RecordingPause::new();

        let outcome = manager(&compute, &pause).create_function(
            &spec(),
            "arn:role",
            &CancellationToken::new(),
        );

        assert!(!outcome.success);
        assert_eq!(outcome.attempts_used, 1);
        assert_eq!(outcome.last_error_kind(), Some(ErrorKind::ComputePlatform));
        assert!(pause.pauses().is_empty());
    }

    #[test]
    fn cancellation_during_pause_aborts() {
        let compute = FakeComputePlatform::new();
        compute.always_fail_create_with(not_usable());
        let pause = RecordingPause::cancelling_after(1);
        let cancel = CancellationToken::new();

        let outcome = manager(&compute, &pause).create_function(&spec(), "arn:role", &cancel);

        assert!(cancel.is_cancelled());
        assert!(!outcome.success);
        assert_eq!(outcome.attempts_used, 1);
        assert_eq!(outcome.last_error_kind(), Some(ErrorKind::Aborted));
    }

    #[test]
    fn cancelled_before_start_makes_no_attempt() {
        let compute = FakeComputePlatform::new();
        let pause = RecordingPause::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = manager(&compute, &pause).create_function(&spec(), "arn:role", &cancel);

        assert_eq!(outcome.attempts_used, 0);
        assert_eq!(compute.create_attempts(), 0);
        assert_eq!(outcome.last_error_kind(), Some(ErrorKind::Aborted));
    }

    #[test]
    fn into_result_exposes_attempts_or_error() {
        assert_eq!(ProvisionOutcome::succeeded(2).into_result(), Ok(2));
        assert_eq!(
            ProvisionOutcome::failed(not_usable(), 4).into_result(),
            Err(not_usable())
        );
    }

    #[test]
    fn list_is_sorted_by_name() {
        let compute = FakeComputePlatform::new();
        compute.seed_function("zeta");
        compute.seed_function("alpha");
        let pause = RecordingPause::new();

        let names: Vec<String> = manager(&compute, &pause)
            .list_functions()
            .expect("list")
            .into_iter()
            .map(|summary| summary.name)
            .collect();

        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
