//! Typed-asset sanitization and shape validation.

use crate::TargetError;
use crate::ancestry::{ancestry_path, normalize_ancestry};
use precept_core::Asset;

/// JSON object key for the canonical ancestry path.
pub const ANCESTRY_PATH_KEY: &str = "ancestry_path";
/// JSON object key for the ancestor list.
pub const ANCESTOR_SLICE_KEY: &str = "ancestors";

/// Collapse an asset's hierarchy metadata into the canonical
/// `ancestry_path` field.
///
/// The structured ancestor list wins when present, overwriting any
/// existing path; otherwise an existing path is re-encoded in place.
/// Fails when neither representation is present.
pub fn sanitize_ancestry_path(asset: &mut Asset) -> Result<(), TargetError> {
    if !asset.ancestors.is_empty() {
        asset.ancestry_path = ancestry_path(&asset.ancestors);
        return Ok(());
    }
    if !asset.ancestry_path.is_empty() {
        asset.ancestry_path = normalize_ancestry(&asset.ancestry_path);
        return Ok(());
    }
    Err(TargetError::MissingAncestry {
        name: asset.name.clone(),
    })
}

/// Validate that an asset carries the fields every review needs. Run
/// after [`sanitize_ancestry_path`] so ancestor-only assets pass.
pub fn validate_asset(asset: &Asset) -> Result<(), TargetError> {
    if asset.name.is_empty() {
        return Err(TargetError::MissingField { field: "name" });
    }
    if asset.asset_type.is_empty() {
        return Err(TargetError::MissingField { field: "asset_type" });
    }
    if asset.ancestry_path.is_empty() {
        return Err(TargetError::MissingField {
            field: "ancestry_path",
        });
    }
    if asset.resource.is_none() && asset.iam_policy.is_none() {
        return Err(TargetError::MissingField { field: "resource" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bucket_asset() -> Asset {
        Asset {
            name: "//storage.googleapis.com/my-bucket".to_string(),
            asset_type: "storage.googleapis.com/Bucket".to_string(),
            ancestry_path: String::new(),
            ancestors: vec!["organizations/1".to_string(), "projects/2".to_string()],
            resource: Some(json!({"data": {"name": "my-bucket"}})),
            iam_policy: None,
        }
    }

    #[test]
    fn test_sanitize_prefers_ancestors() {
        let mut asset = bucket_asset();
        asset.ancestry_path = "organization/9".to_string();
        sanitize_ancestry_path(&mut asset).unwrap();
        assert_eq!(asset.ancestry_path, "organization/1/project/2");
    }

    #[test]
    fn test_sanitize_normalizes_existing_path() {
        let mut asset = bucket_asset();
        asset.ancestors.clear();
        asset.ancestry_path = "organizations/1/projects/2".to_string();
        sanitize_ancestry_path(&mut asset).unwrap();
        assert_eq!(asset.ancestry_path, "organization/1/project/2");
    }

    #[test]
    fn test_sanitize_fails_without_ancestry() {
        let mut asset = bucket_asset();
        asset.ancestors.clear();
        let err = sanitize_ancestry_path(&mut asset).unwrap_err();
        assert!(matches!(err, TargetError::MissingAncestry { .. }));
    }

    #[test]
    fn test_validate_requires_name() {
        let mut asset = bucket_asset();
        sanitize_ancestry_path(&mut asset).unwrap();
        asset.name.clear();
        let err = validate_asset(&asset).unwrap_err();
        assert!(matches!(err, TargetError::MissingField { field: "name" }));
    }

    #[test]
    fn test_validate_requires_payload() {
        let mut asset = bucket_asset();
        sanitize_ancestry_path(&mut asset).unwrap();
        asset.resource = None;
        let err = validate_asset(&asset).unwrap_err();
        assert!(matches!(
            err,
            TargetError::MissingField { field: "resource" }
        ));
    }

    #[test]
    fn test_validate_accepts_iam_policy_only() {
        let mut asset = bucket_asset();
        sanitize_ancestry_path(&mut asset).unwrap();
        asset.resource = None;
        asset.iam_policy = Some(json!({"bindings": []}));
        validate_asset(&asset).unwrap();
    }
}
