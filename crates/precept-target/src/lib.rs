//! Target domains for Precept.
//!
//! Each target domain (GCP asset, Kubernetes object, Terraform resource
//! change) has one handler implementing [`TargetHandler`]: it adapts a
//! generic resource representation into the shape that domain's
//! evaluation client reviews, and extracts the keys constraint matching
//! runs against. The domain set is closed; handlers are plain values, not
//! a registry.

pub mod ancestry;
pub mod asset;
pub mod gcp;
pub mod k8s;
pub mod terraform;

use precept_core::Target;
use serde_json::{Map, Value};
use thiserror::Error;

pub use gcp::GcpTarget;
pub use k8s::K8sTarget;
pub use terraform::TerraformTarget;

/// Errors raised while sanitizing, validating, or adapting a resource.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("asset missing ancestry information: '{name}'")]
    MissingAncestry { name: String },
    #[error("asset field '{field}' is missing or empty")]
    MissingField { field: &'static str },
    #[error("asset field '{field}' must be a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("failed to convert asset to a Kubernetes object: {reason}")]
    ConversionFailed { reason: String },
}

/// Keys constraint matching runs against for one reviewed resource.
#[derive(Debug, Clone, Default)]
pub struct MatchKeys {
    /// Canonical ancestry path, when the target carries one.
    pub ancestry_path: Option<String>,
    /// Target-specific reference (the Terraform resource address).
    pub reference: Option<String>,
}

/// Adaptation and match-key extraction for one target domain.
pub trait TargetHandler: Send + Sync {
    fn target(&self) -> Target;

    /// Adapt a generic resource representation into the shape this
    /// target's evaluation client reviews. `Ok(None)` means the resource
    /// is not recognized by this target; callers treat that as a hard
    /// failure for their entry point.
    fn handle_review(
        &self,
        resource: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, TargetError>;

    /// Extract matching keys from an already-adapted resource.
    fn match_keys(&self, reviewed: &Map<String, Value>) -> MatchKeys;
}
