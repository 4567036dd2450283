use std::process::ExitCode;

use clap::Parser;
use faas_provision_aws::adapters::{
    load_sdk_config, AwsComputePlatform, AwsIdentityService, AwsRepositoryRpc,
};
use faas_provision_aws::cli::{execute, render_runtimes, Cli, Exit};
use faas_provision_aws::logging;
use faas_provision_core::ports::ThreadPause;
use faas_provision_core::Orchestrator;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = logging::init(cli.log_format, cli.verbose) {
        eprintln!("failed to initialise logging: {error}");
    }

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(error) => {
            error!(component = "cli", error = %error, "config_invalid");
            eprintln!("error: {error}");
            return Exit::Usage.into();
        }
    };
    info!(
        component = "cli",
        profile = config.profile.as_deref().unwrap_or("default"),
        region = config.region.as_deref().unwrap_or("default"),
        max_retries = config.retry.max_retries,
        "config_loaded"
    );

    if !cli.command.is_remote() {
        return match render_runtimes(cli.report) {
            Ok(text) => {
                println!("{text}");
                Exit::Success.into()
            }
            Err(error) => {
                eprintln!("error: {error}");
                Exit::Failed.into()
            }
        };
    }
    let sdk_config = load_sdk_config(&config).await;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(component = "cli", "interrupt_received");
            signal_token.cancel();
        }
    });

    let command = cli.command.clone();
    let report_format = cli.report;
    let joined = tokio::task::spawn_blocking(move || {
        let identity = AwsIdentityService::new(&sdk_config);
        let compute = AwsComputePlatform::new(&sdk_config);
        let rpc = AwsRepositoryRpc::new(&sdk_config);
        let orchestrator = Orchestrator::new(&config, &identity, &compute, &rpc, &ThreadPause);
        execute(&command, &orchestrator, report_format, &cancel)
    })
    .await;

    match joined {
        Ok(output) => {
            println!("{}", output.stdout);
            output.exit.into()
        }
        Err(join_error) => {
            error!(component = "cli", error = %join_error, "command_panicked");
            Exit::Failed.into()
        }
    }
}
