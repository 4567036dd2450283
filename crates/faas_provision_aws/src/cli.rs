//! Command-line surface of the `faas` binary.
//!
//! Parsing and rendering live here so they can be exercised against the
//! in-memory fakes; `src/bin/faas.rs` only wires the AWS adapters in.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::SecondsFormat;
use clap::{Parser, Subcommand, ValueEnum};
use faas_provision_core::catalog::{self, lookup};
use faas_provision_core::contract::FunctionSummary;
use faas_provision_core::orchestrator::{ResourceChange, StepStatus};
use faas_provision_core::{
    ConfigError, Language, Orchestrator, ProvisionConfig, ProvisionError, WorkflowReport,
    WorkflowState,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "faas")]
#[command(about = "Provision and tear down serverless functions with their role and repository")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Shared-config profile used for credentials.
    #[arg(long, global = true, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    #[arg(long, global = true, env = "AWS_REGION")]
    pub region: Option<String>,

    /// YAML configuration file.
    #[arg(long, global = true, env = "FAAS_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Output format of workflow reports and listings.
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Defaults, then the YAML file, then profile/region flags.
    pub fn load_config(&self) -> Result<ProvisionConfig, ConfigError> {
        let config = ProvisionConfig::load(self.config.as_deref())?
            .with_profile(self.profile.clone())
            .with_region(self.region.clone());
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the role, the repository and the function
    Create {
        name: String,

        /// nodejs, golang, java or python
        #[arg(short, long)]
        runtime: Language,
    },
    /// Detach the policy, delete the function and role, remove the repository
    Delete { name: String },
    /// List deployed functions
    List,
    /// Show the supported runtimes
    Runtimes,
}

impl Command {
    /// Whether the command talks to the remote services at all.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Runtimes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Process outcome, mapped onto the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success,
    Failed,
    Usage,
    Aborted,
}

impl Exit {
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failed => 1,
            Self::Usage => 2,
            Self::Aborted => 130,
        }
    }

    pub fn for_state(state: &WorkflowState) -> Self {
        match state {
            WorkflowState::Done => Self::Success,
            WorkflowState::Aborted { .. } => Self::Aborted,
            WorkflowState::Failed {
                error: ProvisionError::Validation(_),
                ..
            } => Self::Usage,
            _ => Self::Failed,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub exit: Exit,
}

impl CommandOutput {
    fn new(stdout: String, exit: Exit) -> Self {
        Self { stdout, exit }
    }
}

/// Runs one command to completion against the given orchestrator.
pub fn execute(
    command: &Command,
    orchestrator: &Orchestrator<'_>,
    format: ReportFormat,
    cancel: &CancellationToken,
) -> CommandOutput {
    match command {
        Command::Create { name, runtime } => {
            let report = orchestrator.create(name, lookup(*runtime), cancel);
            workflow_output(&report, format)
        }
        Command::Delete { name } => {
            let report = orchestrator.delete(name, cancel);
            workflow_output(&report, format)
        }
        Command::List => match orchestrator.list() {
            Ok(functions) => rendered(render_functions(&functions, format), Exit::Success),
            Err(error) => rendered(render_error(&error, format), Exit::Failed),
        },
        Command::Runtimes => rendered(render_runtimes(format), Exit::Success),
    }
}

fn workflow_output(report: &WorkflowReport, format: ReportFormat) -> CommandOutput {
    rendered(render_report(report, format), Exit::for_state(&report.state))
}

fn rendered(result: Result<String, serde_json::Error>, exit: Exit) -> CommandOutput {
    match result {
        Ok(stdout) => CommandOutput::new(stdout, exit),
        Err(error) => CommandOutput::new(format!("failed to render output: {error}"), Exit::Failed),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

pub fn render_report(
    report: &WorkflowReport,
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    if format == ReportFormat::Json {
        return to_json(report);
    }

    let mut lines = vec![format!(
        "{} {}: {}",
        report.workflow.as_str(),
        report.function_name,
        report.state
    )];
    for record in &report.steps {
        let status = match record.status {
            StepStatus::Completed => "ok",
            StepStatus::Failed => "FAILED",
        };
        let mut line = format!("  {:<20} {status}", record.step.as_str());
        if let Some(attempts) = record.attempts.filter(|attempts| *attempts > 1) {
            line.push_str(&format!(" ({attempts} attempts)"));
        }
        if let Some(error) = &record.error {
            line.push_str(&format!(": {error}"));
        }
        lines.push(line);
    }
    for resource in &report.resources {
        let verb = match resource.change {
            ResourceChange::Created => "created",
            ResourceChange::Deleted => "deleted",
        };
        lines.push(format!("{verb} {} {}", resource.kind, resource.identifier));
    }
    for hint in report.cleanup_hints() {
        lines.push(format!("cleanup: {hint}"));
    }
    let started = report.started_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    match report.finished_at {
        Some(finished) => lines.push(format!(
            "started {started}, took {} ms",
            (finished - report.started_at).num_milliseconds()
        )),
        None => lines.push(format!("started {started}")),
    }
    Ok(lines.join("\n"))
}

pub fn render_functions(
    functions: &[FunctionSummary],
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    if format == ReportFormat::Json {
        return to_json(functions);
    }
    if functions.is_empty() {
        return Ok("no functions deployed".to_string());
    }
    Ok(functions
        .iter()
        .map(|function| {
            format!(
                "{:<40} {:<16} {}",
                function.name,
                function.runtime_id.as_deref().unwrap_or("-"),
                function.last_modified.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn render_runtimes(format: ReportFormat) -> Result<String, serde_json::Error> {
    if format == ReportFormat::Json {
        return to_json(catalog::all());
    }
    Ok(catalog::all()
        .iter()
        .map(|runtime| {
            format!(
                "{:<8} {:<16} {:<36} {}",
                runtime.language.as_str(),
                runtime.platform_runtime_id,
                runtime.default_handler,
                runtime.template_repo_id
            )
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn render_error(
    error: &ProvisionError,
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    if format == ReportFormat::Json {
        return to_json(&serde_json::json!({ "error": error }));
    }
    Ok(format!("error: {error}"))
}
