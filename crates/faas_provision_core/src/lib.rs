//! Provisioning domain for serverless functions and their dependent resources.
//!
//! This crate owns the ordered create/delete workflows, the propagation-aware
//! retry loop, and the request/payload contracts. It intentionally excludes AWS
//! SDK and CLI concerns; those live in `faas_provision_aws` behind the
//! capability traits in [`ports`].

pub mod catalog;
pub mod config;
pub mod contract;
pub mod error;
pub mod function;
pub mod naming;
pub mod orchestrator;
pub mod ports;
pub mod repository;
pub mod role;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use catalog::{Language, RuntimeDescriptor};
pub use config::{ConfigError, ProvisionConfig, RetryPolicy};
pub use contract::FunctionSpec;
pub use error::{ErrorKind, ProvisionError, ValidationError};
pub use orchestrator::{Orchestrator, WorkflowKind, WorkflowReport, WorkflowState, WorkflowStep};
