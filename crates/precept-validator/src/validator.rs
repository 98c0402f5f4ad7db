//! The review orchestrator.

use crate::result::ReviewResult;
use precept_core::{Asset, ConfigError, Configuration, PolicyFile, Target, Violation};
use precept_engine::{Client, EngineError, EngineOptions};
use precept_target::asset::{
    ANCESTOR_SLICE_KEY, ANCESTRY_PATH_KEY, sanitize_ancestry_path, validate_asset,
};
use precept_target::ancestry::{ancestry_path, normalize_ancestry};
use precept_target::{GcpTarget, K8sTarget, TargetError, TargetHandler, TerraformTarget, k8s, terraform};
use serde_json::{Map, Value, json};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Construction-time failures. Fatal; never retried.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to set up '{target}' evaluation client: {source}")]
    Bootstrap {
        target: Target,
        #[source]
        source: EngineError,
    },
}

/// Per-call review failures. The first failure short-circuits the
/// pipeline; there is no partial result.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("failed to unmarshal json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("input is not a JSON object")]
    NotAnObject,
    /// Ancestry resolution or asset shape validation failed.
    #[error(transparent)]
    InvalidAsset(#[from] TargetError),
    #[error("failed to convert asset to a reviewable object: {source}")]
    Conversion {
        #[source]
        source: TargetError,
    },
    #[error("failed to extract display identifier: {source}")]
    Identifier {
        #[source]
        source: TargetError,
    },
    #[error("'{target}' evaluation client review call failed: {source}")]
    Review {
        target: Target,
        #[source]
        source: EngineError,
    },
    #[error("unhandled resource: {reason}")]
    Unhandled { reason: String },
}

/// Checks resource representations for policy violations.
///
/// Owns one long-lived evaluation client per target domain. Clients are
/// fully loaded before the validator is shared and are read-only
/// afterwards, so concurrent review calls need no locking.
pub struct Validator {
    gcp: Client,
    k8s: Client,
    terraform: Client,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("gcp", &self.gcp)
            .field("k8s", &self.k8s)
            .field("terraform", &self.terraform)
            .finish()
    }
}

impl Validator {
    /// Bootstrap all three evaluation clients from parsed configuration.
    /// One-shot: any per-target failure aborts construction naming the
    /// target.
    pub fn new(config: &Configuration, options: &EngineOptions) -> Result<Self, ValidatorError> {
        let build = |target: Target,
                     handler: Arc<dyn TargetHandler>|
         -> Result<Client, ValidatorError> {
            let policies = config.policies(target);
            Client::build(handler, &policies.templates, &policies.constraints, options)
                .map_err(|source| ValidatorError::Bootstrap { target, source })
        };
        Ok(Self {
            gcp: build(Target::Gcp, Arc::new(GcpTarget::new()))?,
            k8s: build(Target::K8s, Arc::new(K8sTarget::new()))?,
            terraform: build(Target::Terraform, Arc::new(TerraformTarget::new()))?,
        })
    }

    /// Load policy configuration from disk and bootstrap.
    pub fn from_paths(
        policy_paths: &[PathBuf],
        library_path: &Path,
        options: &EngineOptions,
    ) -> Result<Self, ValidatorError> {
        let config = Configuration::load(policy_paths, library_path)?;
        Self::new(&config, options)
    }

    /// Build from in-memory policy and library contents.
    pub fn from_contents(
        policy_files: Vec<PolicyFile>,
        library: Vec<String>,
        options: &EngineOptions,
    ) -> Result<Self, ValidatorError> {
        let config = Configuration::from_contents(policy_files, library)?;
        Self::new(&config, options)
    }

    /// Review a single typed asset and materialize its violations.
    pub async fn review_asset(&self, asset: &Asset) -> Result<Vec<Violation>, ReviewError> {
        // Sanitize the ancestry path first, so an asset that only
        // provides ancestors still passes validation.
        let mut asset = asset.clone();
        sanitize_ancestry_path(&mut asset)?;
        validate_asset(&asset)?;

        let value = serde_json::to_value(&asset)?;
        let Value::Object(map) = value else {
            return Err(ReviewError::NotAnObject);
        };
        let result = self.review_unmarshalled(map).await?;
        Ok(result.to_violations())
    }

    /// Review the content of a JSON string.
    pub async fn review_json(&self, data: &str) -> Result<ReviewResult, ReviewError> {
        let value: Value = serde_json::from_str(data)?;
        let Value::Object(map) = value else {
            return Err(ReviewError::NotAnObject);
        };
        self.review_unmarshalled(map).await
    }

    /// Shared review core: resolve ancestry, classify, adapt, dispatch.
    ///
    /// Stops at the [`ReviewResult`] so callers that do not need the
    /// violation list can defer materializing it.
    pub async fn review_unmarshalled(
        &self,
        mut asset: Map<String, Value>,
    ) -> Result<ReviewResult, ReviewError> {
        fix_ancestry(&mut asset)?;

        if k8s::is_k8s(&asset) {
            self.review_k8s_resource(asset).await
        } else {
            self.review_gcp_resource(asset).await
        }
    }

    /// Review a single Terraform planned resource change.
    ///
    /// Terraform inputs carry no ancestry; the input must instead be a
    /// recognized planned-change shape before any evaluation-client call.
    pub async fn review_tf_resource_change(
        &self,
        resource: Map<String, Value>,
    ) -> Result<Vec<Violation>, ReviewError> {
        let reviewed = TerraformTarget::new()
            .handle_review(&resource)?
            .ok_or_else(|| ReviewError::Unhandled {
                reason: "not a recognized Terraform planned resource change".to_string(),
            })?;
        let address = terraform::address(&reviewed)
            .map_err(|source| ReviewError::Identifier { source })?
            .to_string();

        tracing::debug!(target = %Target::Terraform, %address, "reviewing resource change");
        let response = self
            .terraform
            .review(&reviewed)
            .await
            .map_err(|source| ReviewError::Review {
                target: Target::Terraform,
                source,
            })?;

        let result =
            ReviewResult::new(Target::Terraform, address, resource, reviewed, vec![response]);
        Ok(result.to_violations())
    }

    /// Convert a Kubernetes-shaped asset and dispatch it to the K8s
    /// client, using the object's display name as the identifier.
    async fn review_k8s_resource(
        &self,
        asset: Map<String, Value>,
    ) -> Result<ReviewResult, ReviewError> {
        let object =
            k8s::convert_to_k8s(&asset).map_err(|source| ReviewError::Conversion { source })?;
        let name = k8s::object_name(&object)
            .map_err(|source| ReviewError::Identifier { source })?
            .to_string();

        tracing::debug!(target = %Target::K8s, %name, "reviewing object");
        let response = self
            .k8s
            .review(&object)
            .await
            .map_err(|source| ReviewError::Review {
                target: Target::K8s,
                source,
            })?;
        Ok(ReviewResult::new(
            Target::K8s,
            name,
            asset,
            object,
            vec![response],
        ))
    }

    /// Dispatch a GCP asset verbatim; pre- and post-adaptation data are
    /// identical.
    async fn review_gcp_resource(
        &self,
        asset: Map<String, Value>,
    ) -> Result<ReviewResult, ReviewError> {
        let name = match asset.get("name") {
            Some(Value::String(name)) => name.clone(),
            Some(_) => {
                return Err(ReviewError::Identifier {
                    source: TargetError::WrongType {
                        field: "name",
                        expected: "string",
                    },
                });
            }
            None => {
                return Err(ReviewError::Identifier {
                    source: TargetError::MissingField { field: "name" },
                });
            }
        };

        tracing::debug!(target = %Target::Gcp, %name, "reviewing asset");
        let response = self
            .gcp
            .review(&asset)
            .await
            .map_err(|source| ReviewError::Review {
                target: Target::Gcp,
                source,
            })?;
        Ok(ReviewResult::new(
            Target::Gcp,
            name,
            asset.clone(),
            asset,
            vec![response],
        ))
    }
}

/// Collapse the map's hierarchy metadata into the canonical
/// `ancestry_path` field. The well-typed `ancestors` list wins; an
/// existing path string is re-normalized in place; neither present is a
/// per-call input error. An empty list or path counts as absent, so the
/// canonical field is never left empty.
fn fix_ancestry(asset: &mut Map<String, Value>) -> Result<(), ReviewError> {
    if let Some(ancestors) = asset.get(ANCESTOR_SLICE_KEY).and_then(as_string_vec) {
        let path = ancestry_path(&ancestors);
        if !path.is_empty() {
            asset.insert(ANCESTRY_PATH_KEY.to_string(), json!(path));
            return Ok(());
        }
    }

    if let Some(Value::String(path)) = asset.get(ANCESTRY_PATH_KEY) {
        let normalized = normalize_ancestry(path);
        if !normalized.is_empty() {
            asset.insert(ANCESTRY_PATH_KEY.to_string(), json!(normalized));
            return Ok(());
        }
    }

    let name = asset
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();
    Err(ReviewError::InvalidAsset(TargetError::MissingAncestry {
        name,
    }))
}

/// A well-typed string array, or `None`.
fn as_string_vec(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}
