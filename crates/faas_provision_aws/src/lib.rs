//! AWS-backed adapters and the `faas` command-line surface.
//!
//! This crate owns SDK integration (IAM, Lambda, synchronous invoke for the
//! repository provisioner), subscriber setup and CLI rendering. Workflow
//! semantics stay in `faas_provision_core`.

pub mod adapters;
pub mod cli;
pub mod logging;
