//! Shared types and policy configuration for Precept.
//!
//! This crate holds the data model used across all Precept crates:
//! constraint templates and constraint instances, review responses and
//! violations, the typed asset wrapper, and the `Configuration` loader
//! that reads policy YAML from disk or from in-memory contents and
//! splits it per target domain.

pub mod config;
pub mod multierror;
mod types;

pub use config::{ConfigError, Configuration, PolicyFile, TargetPolicies};
pub use multierror::Errors;
pub use types::{
    Asset, CheckOp, Constraint, ConstraintResult, ConstraintTemplate, MatchSpec, ReviewResponse,
    Rule, Severity, Target, Violation,
};
