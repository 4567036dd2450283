//! Subscriber setup for the `faas` binary. Events go to stderr so reports on
//! stdout stay machine-readable.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Filter used when `RUST_LOG` is unset. The SDK crates are chatty at info.
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "debug,aws_config=info,aws_smithy_runtime=info,hyper=info"
    } else {
        "info,aws_config=warn,aws_smithy_runtime=warn"
    }
}

pub fn init(
    format: LogFormat,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    }
}
