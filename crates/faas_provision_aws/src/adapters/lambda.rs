use aws_config::SdkConfig;
use aws_sdk_lambda::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_lambda::types::{Architecture, FunctionCode, Runtime};
use faas_provision_core::contract::{FunctionCreateRequest, FunctionSummary, RpcResponse};
use faas_provision_core::error::classify_compute_error;
use faas_provision_core::ports::{ComputePlatform, RepositoryRpc};
use faas_provision_core::ProvisionError;
use tracing::debug;

use super::block_on;

const COMPONENT: &str = "lambda_adapter";

#[derive(Clone)]
pub struct AwsComputePlatform {
    client: aws_sdk_lambda::Client,
}

impl AwsComputePlatform {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_lambda::Client::new(config),
        }
    }
}

impl ComputePlatform for AwsComputePlatform {
    fn create_function(&self, request: &FunctionCreateRequest) -> Result<(), ProvisionError> {
        debug!(
            component = COMPONENT,
            function_name = %request.name,
            runtime = %request.runtime_id,
            "create_function"
        );
        let code = FunctionCode::builder()
            .s3_bucket(&request.code_ref.bucket)
            .s3_key(&request.code_ref.key)
            .build();

        block_on(
            self.client
                .create_function()
                .function_name(&request.name)
                .role(&request.role_arn)
                .runtime(Runtime::from(request.runtime_id.as_str()))
                .handler(&request.handler)
                .timeout(request.timeout_seconds)
                .architectures(Architecture::from(request.architecture.as_str()))
                .code(code)
                .send(),
        )
        .map(|_| ())
        .map_err(|error| compute_error(&error, &request.name))
    }

    fn delete_function(&self, name: &str) -> Result<(), ProvisionError> {
        debug!(component = COMPONENT, function_name = name, "delete_function");
        block_on(self.client.delete_function().function_name(name).send())
            .map(|_| ())
            .map_err(|error| compute_error(&error, name))
    }

    fn list_functions(&self) -> Result<Vec<FunctionSummary>, ProvisionError> {
        let mut functions = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let page = block_on(self.client.list_functions().set_marker(marker.take()).send())
                .map_err(|error| compute_error(&error, "*"))?;

            functions.extend(page.functions().iter().map(|function| FunctionSummary {
                name: function.function_name().unwrap_or_default().to_string(),
                runtime_id: function.runtime().map(|runtime| runtime.as_str().to_string()),
                handler: function.handler().map(str::to_string),
                last_modified: function.last_modified().map(str::to_string),
            }));

            match page.next_marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        debug!(component = COMPONENT, count = functions.len(), "list_functions");
        Ok(functions)
    }
}

/// Synchronous function invocation used for repository provisioning.
#[derive(Clone)]
pub struct AwsRepositoryRpc {
    client: aws_sdk_lambda::Client,
}

impl AwsRepositoryRpc {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_lambda::Client::new(config),
        }
    }
}

impl RepositoryRpc for AwsRepositoryRpc {
    fn invoke(&self, function_name: &str, payload: &[u8]) -> Result<RpcResponse, ProvisionError> {
        debug!(
            component = COMPONENT,
            function_name,
            payload_bytes = payload.len(),
            "invoke"
        );
        let output = block_on(
            self.client
                .invoke()
                .function_name(function_name)
                .set_payload(Some(payload.to_vec().into()))
                .send(),
        )
        .map_err(|error| compute_error(&error, function_name))?;

        Ok(RpcResponse {
            status_code: output.status_code(),
            function_error: output.function_error().map(str::to_string),
            body: output
                .payload()
                .map(|blob| String::from_utf8_lossy(blob.as_ref()).into_owned()),
        })
    }
}

fn compute_error<E>(error: &E, function_name: &str) -> ProvisionError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let context = DisplayErrorContext(error).to_string();
    classify_compute_error(
        error.code(),
        Some(error.message().unwrap_or(&context)),
        function_name,
    )
}
