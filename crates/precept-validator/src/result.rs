//! Translation of raw evaluation responses into violations.

use precept_core::{ReviewResponse, Target, Violation};
use serde_json::{Map, Value};

/// The translated outcome of one review call.
///
/// Holds the resource both before and after format adaptation (identical
/// for the GCP domain) plus the raw per-constraint responses. Violations
/// are materialized on demand, never eagerly.
#[derive(Debug, Clone)]
pub struct ReviewResult {
    pub target: Target,
    /// Display identifier of the reviewed resource.
    pub name: String,
    /// Pre-adaptation resource representation.
    pub asset: Map<String, Value>,
    /// Post-adaptation representation the engine reviewed.
    pub reviewed: Map<String, Value>,
    pub responses: Vec<ReviewResponse>,
}

impl ReviewResult {
    pub fn new(
        target: Target,
        name: impl Into<String>,
        asset: Map<String, Value>,
        reviewed: Map<String, Value>,
        responses: Vec<ReviewResponse>,
    ) -> Self {
        Self {
            target,
            name: name.into(),
            asset,
            reviewed,
            responses,
        }
    }

    /// Materialize the violation list. Pure and deterministic: ordering
    /// follows the input order of the raw responses, and calling twice
    /// yields equal sequences. Never re-invokes evaluation.
    pub fn to_violations(&self) -> Vec<Violation> {
        self.responses
            .iter()
            .flat_map(|response| response.results.iter())
            .map(|result| Violation {
                constraint: result.constraint.clone(),
                constraint_kind: result.kind.clone(),
                resource: self.name.clone(),
                message: result.message.clone(),
                severity: result.severity,
                metadata: result.metadata.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use precept_core::{ConstraintResult, Severity};
    use serde_json::json;

    fn result_fixture() -> ReviewResult {
        let responses = vec![ReviewResponse {
            target: Target::Gcp,
            results: vec![
                ConstraintResult {
                    constraint: "require-logging".to_string(),
                    kind: "GCPLoggingConstraintV1".to_string(),
                    rule_id: "logging.required".to_string(),
                    message: "logging must be configured".to_string(),
                    severity: Severity::Error,
                    metadata: json!({"path": "resource.data.logging"}),
                },
                ConstraintResult {
                    constraint: "require-labels".to_string(),
                    kind: "GCPLabelsConstraintV1".to_string(),
                    rule_id: "labels.required".to_string(),
                    message: "labels must be set".to_string(),
                    severity: Severity::Warning,
                    metadata: Value::Null,
                },
            ],
        }];
        ReviewResult::new(
            Target::Gcp,
            "//storage.googleapis.com/my-bucket",
            Map::new(),
            Map::new(),
            responses,
        )
    }

    #[test]
    fn test_violations_carry_resource_identifier() {
        let violations = result_fixture().to_violations();
        assert_eq!(violations.len(), 2);
        assert!(
            violations
                .iter()
                .all(|v| v.resource == "//storage.googleapis.com/my-bucket")
        );
        assert_eq!(violations[0].constraint, "require-logging");
        assert_eq!(violations[1].severity, Severity::Warning);
    }

    #[test]
    fn test_to_violations_is_deterministic() {
        let result = result_fixture();
        assert_eq!(result.to_violations(), result.to_violations());
    }
}
