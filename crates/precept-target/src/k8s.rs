//! Kubernetes object target: classification marker and asset conversion.
//!
//! Assets whose type belongs to the `k8s.io` service family are converted
//! from the generic asset shape into the Kubernetes object held in
//! `resource.data`, with the ancestry path carried as an annotation.

use crate::asset::ANCESTRY_PATH_KEY;
use crate::{MatchKeys, TargetError, TargetHandler};
use precept_core::Target;
use serde_json::{Map, Value, json};

/// Annotation carrying the asset's ancestry path on converted objects.
pub const ANCESTRY_ANNOTATION: &str = "validator.precept.dev/ancestry-path";

/// Whether an asset map is Kubernetes-shaped: its asset type's service
/// component equals or ends with `k8s.io`.
pub fn is_k8s(resource: &Map<String, Value>) -> bool {
    let Some(asset_type) = resource.get("asset_type").and_then(Value::as_str) else {
        return false;
    };
    let service = asset_type.split('/').next().unwrap_or("");
    service == "k8s.io" || service.ends_with(".k8s.io")
}

/// Convert a Kubernetes-shaped asset into the object its evaluation
/// client reviews: the `resource.data` object, annotated with the
/// ancestry path.
pub fn convert_to_k8s(resource: &Map<String, Value>) -> Result<Map<String, Value>, TargetError> {
    let data = resource
        .get("resource")
        .and_then(|r| r.get("data"))
        .and_then(Value::as_object)
        .ok_or_else(|| TargetError::ConversionFailed {
            reason: "resource.data is missing or not an object".to_string(),
        })?;
    let mut object = data.clone();

    if let Some(ancestry) = resource.get(ANCESTRY_PATH_KEY).and_then(Value::as_str) {
        let metadata = object
            .entry("metadata".to_string())
            .or_insert_with(|| json!({}));
        let meta_obj = metadata
            .as_object_mut()
            .ok_or_else(|| TargetError::ConversionFailed {
                reason: "metadata is not an object".to_string(),
            })?;
        let annotations = meta_obj
            .entry("annotations".to_string())
            .or_insert_with(|| json!({}));
        let ann_obj = annotations
            .as_object_mut()
            .ok_or_else(|| TargetError::ConversionFailed {
                reason: "metadata.annotations is not an object".to_string(),
            })?;
        ann_obj.insert(ANCESTRY_ANNOTATION.to_string(), json!(ancestry));
    }

    Ok(object)
}

/// The display name of a converted Kubernetes object. Missing or
/// non-string `metadata.name` is a typed input error, never an empty
/// fallback.
pub fn object_name(object: &Map<String, Value>) -> Result<&str, TargetError> {
    let name = object
        .get("metadata")
        .and_then(|m| m.get("name"))
        .ok_or(TargetError::MissingField {
            field: "metadata.name",
        })?;
    name.as_str().ok_or(TargetError::WrongType {
        field: "metadata.name",
        expected: "string",
    })
}

/// Handler for the Kubernetes object domain.
#[derive(Debug, Default, Clone, Copy)]
pub struct K8sTarget;

impl K8sTarget {
    pub fn new() -> Self {
        Self
    }
}

impl TargetHandler for K8sTarget {
    fn target(&self) -> Target {
        Target::K8s
    }

    fn handle_review(
        &self,
        resource: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, TargetError> {
        if !is_k8s(resource) {
            return Ok(None);
        }
        convert_to_k8s(resource).map(Some)
    }

    fn match_keys(&self, reviewed: &Map<String, Value>) -> MatchKeys {
        MatchKeys {
            ancestry_path: reviewed
                .get("metadata")
                .and_then(|m| m.get("annotations"))
                .and_then(|a| a.get(ANCESTRY_ANNOTATION))
                .and_then(Value::as_str)
                .map(str::to_string),
            reference: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_asset() -> Map<String, Value> {
        json!({
            "name": "//container.googleapis.com/pods/nginx",
            "asset_type": "k8s.io/Pod",
            "ancestry_path": "organization/1/project/2",
            "resource": {
                "data": {
                    "apiVersion": "v1",
                    "kind": "Pod",
                    "metadata": {"name": "nginx", "namespace": "default"},
                    "spec": {"containers": []},
                }
            }
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_is_k8s_matches_service_family() {
        assert!(is_k8s(&pod_asset()));
        let mut apps = pod_asset();
        apps.insert("asset_type".to_string(), json!("apps.k8s.io/Deployment"));
        assert!(is_k8s(&apps));
        let mut gcp = pod_asset();
        gcp.insert(
            "asset_type".to_string(),
            json!("storage.googleapis.com/Bucket"),
        );
        assert!(!is_k8s(&gcp));
    }

    #[test]
    fn test_is_k8s_requires_asset_type() {
        let mut asset = pod_asset();
        asset.remove("asset_type");
        assert!(!is_k8s(&asset));
    }

    #[test]
    fn test_convert_carries_ancestry_annotation() {
        let object = convert_to_k8s(&pod_asset()).unwrap();
        assert_eq!(object.get("kind"), Some(&json!("Pod")));
        let annotation = object
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.get(ANCESTRY_ANNOTATION));
        assert_eq!(annotation, Some(&json!("organization/1/project/2")));
    }

    #[test]
    fn test_convert_fails_without_data() {
        let mut asset = pod_asset();
        asset.remove("resource");
        let err = convert_to_k8s(&asset).unwrap_err();
        assert!(matches!(err, TargetError::ConversionFailed { .. }));
    }

    #[test]
    fn test_object_name_missing_is_typed_error() {
        let mut object = convert_to_k8s(&pod_asset()).unwrap();
        object
            .get_mut("metadata")
            .and_then(Value::as_object_mut)
            .unwrap()
            .remove("name");
        let err = object_name(&object).unwrap_err();
        assert!(matches!(
            err,
            TargetError::MissingField {
                field: "metadata.name"
            }
        ));
    }

    #[test]
    fn test_object_name_wrong_type_is_typed_error() {
        let mut object = convert_to_k8s(&pod_asset()).unwrap();
        object
            .get_mut("metadata")
            .and_then(Value::as_object_mut)
            .unwrap()
            .insert("name".to_string(), json!(42));
        let err = object_name(&object).unwrap_err();
        assert!(matches!(err, TargetError::WrongType { .. }));
    }

    #[test]
    fn test_handler_rejects_non_k8s() {
        let mut asset = pod_asset();
        asset.insert(
            "asset_type".to_string(),
            json!("storage.googleapis.com/Bucket"),
        );
        assert!(K8sTarget::new().handle_review(&asset).unwrap().is_none());
    }

    #[test]
    fn test_match_keys_reads_annotation() {
        let object = convert_to_k8s(&pod_asset()).unwrap();
        let keys = K8sTarget::new().match_keys(&object);
        assert_eq!(keys.ancestry_path.as_deref(), Some("organization/1/project/2"));
    }
}
