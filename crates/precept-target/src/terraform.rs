//! Terraform resource-change target.
//!
//! Terraform inputs have no ancestry concept; recognition is purely a
//! shape check on the planned-change fields.

use crate::{MatchKeys, TargetError, TargetHandler};
use precept_core::Target;
use serde_json::{Map, Value};

/// Whether a map looks like a Terraform planned resource change: a
/// non-empty string `address`, a string `type`, and a `change` object.
pub fn is_resource_change(resource: &Map<String, Value>) -> bool {
    let address_ok = resource
        .get("address")
        .and_then(Value::as_str)
        .is_some_and(|a| !a.is_empty());
    let type_ok = resource.get("type").and_then(Value::as_str).is_some();
    let change_ok = resource.get("change").is_some_and(Value::is_object);
    address_ok && type_ok && change_ok
}

/// The resource address, the display identifier of the Terraform domain.
pub fn address(resource: &Map<String, Value>) -> Result<&str, TargetError> {
    let address = resource
        .get("address")
        .ok_or(TargetError::MissingField { field: "address" })?;
    address.as_str().ok_or(TargetError::WrongType {
        field: "address",
        expected: "string",
    })
}

/// Handler for the Terraform resource-change domain.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerraformTarget;

impl TerraformTarget {
    pub fn new() -> Self {
        Self
    }
}

impl TargetHandler for TerraformTarget {
    fn target(&self) -> Target {
        Target::Terraform
    }

    fn handle_review(
        &self,
        resource: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, TargetError> {
        if !is_resource_change(resource) {
            return Ok(None);
        }
        Ok(Some(resource.clone()))
    }

    fn match_keys(&self, reviewed: &Map<String, Value>) -> MatchKeys {
        MatchKeys {
            ancestry_path: None,
            reference: reviewed
                .get("address")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change() -> Map<String, Value> {
        json!({
            "address": "google_storage_bucket.logs",
            "mode": "managed",
            "type": "google_storage_bucket",
            "name": "logs",
            "change": {"actions": ["create"], "after": {"location": "US"}},
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_recognizes_planned_change() {
        assert!(is_resource_change(&change()));
        let reviewed = TerraformTarget::new().handle_review(&change()).unwrap();
        assert!(reviewed.is_some());
    }

    #[test]
    fn test_missing_address_is_not_handled() {
        let mut resource = change();
        resource.remove("address");
        assert!(!is_resource_change(&resource));
        assert!(
            TerraformTarget::new()
                .handle_review(&resource)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_missing_change_block_is_not_handled() {
        let mut resource = change();
        resource.remove("change");
        assert!(!is_resource_change(&resource));
    }

    #[test]
    fn test_address_extraction() {
        assert_eq!(address(&change()).unwrap(), "google_storage_bucket.logs");
        let mut resource = change();
        resource.insert("address".to_string(), json!(7));
        assert!(matches!(
            address(&resource).unwrap_err(),
            TargetError::WrongType { .. }
        ));
    }

    #[test]
    fn test_match_keys_uses_address() {
        let keys = TerraformTarget::new().match_keys(&change());
        assert_eq!(keys.reference.as_deref(), Some("google_storage_bucket.logs"));
        assert!(keys.ancestry_path.is_none());
    }
}
