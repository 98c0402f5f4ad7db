//! Core data model: targets, templates, constraints, review outcomes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The closed set of policy-evaluation domains.
///
/// Each target owns one evaluation client, one format adaptation, and one
/// display-identifier convention. The set is fixed at compile time; targets
/// are never registered at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Gcp,
    K8s,
    Terraform,
}

impl Target {
    pub const ALL: [Target; 3] = [Target::Gcp, Target::K8s, Target::Terraform];

    /// Canonical target name as it appears in constraint templates.
    pub fn name(&self) -> &'static str {
        match self {
            Target::Gcp => "validation.gcp.precept.dev",
            Target::K8s => "admission.k8s.precept.dev",
            Target::Terraform => "validation.resourcechange.terraform.precept.dev",
        }
    }

    /// Resolve a canonical target name back to the enum.
    pub fn from_name(name: &str) -> Option<Target> {
        Target::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Severity attached to a constraint and carried into its violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    #[default]
    Error,
}

/// Built-in check operations the evaluation engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOp {
    /// The path must resolve to a value.
    Required,
    /// The path must not resolve to a value.
    Forbidden,
    /// The value at the path must equal the comparison value.
    Equals,
    /// The value at the path must not equal the comparison value.
    NotEquals,
    /// The string at the path must match the comparison regex.
    Pattern,
    /// The number at the path must be >= the comparison number.
    Min,
    /// The number at the path must be <= the comparison number.
    Max,
    /// The value at the path must be one of the comparison array's items.
    OneOf,
}

impl CheckOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOp::Required => "required",
            CheckOp::Forbidden => "forbidden",
            CheckOp::Equals => "equals",
            CheckOp::NotEquals => "not_equals",
            CheckOp::Pattern => "pattern",
            CheckOp::Min => "min",
            CheckOp::Max => "max",
            CheckOp::OneOf => "one_of",
        }
    }

    /// Whether this op compares against a value (inline or from parameters).
    pub fn needs_value(&self) -> bool {
        !matches!(self, CheckOp::Required | CheckOp::Forbidden)
    }
}

impl fmt::Display for CheckOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declarative rule inside a constraint template or a rule library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    /// Dotted field path into the reviewed resource.
    pub path: String,
    pub op: CheckOp,
    /// Inline comparison value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Key in the constraint's `spec.parameters` providing the comparison
    /// value. Takes precedence over `value` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

/// A parsed constraint template: declares the constraint kind it
/// introduces, the target it applies to, and its rule list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintTemplate {
    pub name: String,
    /// The constraint kind instances of this template carry.
    pub kind: String,
    pub target: Target,
    pub rules: Vec<Rule>,
}

/// Resource-matching block of a constraint instance.
///
/// Ancestry patterns are path globs: `*` matches exactly one segment,
/// `**` matches any (possibly empty) suffix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchSpec {
    #[serde(default)]
    pub ancestries: Vec<String>,
    #[serde(default)]
    pub excluded_ancestries: Vec<String>,
    /// Terraform-only: address globs (`.`-separated segments).
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// A parsed constraint instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, rename = "match")]
    pub match_spec: MatchSpec,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// One failed rule check for one constraint, as returned by the
/// evaluation engine. Never exposed raw; always wrapped in a review
/// result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintResult {
    pub constraint: String,
    pub kind: String,
    pub rule_id: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default)]
    pub metadata: Value,
}

/// The raw outcome of one engine review call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub target: Target,
    pub results: Vec<ConstraintResult>,
}

/// One policy breach on one resource. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub constraint: String,
    pub constraint_kind: String,
    /// Display identifier of the offending resource.
    pub resource: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default)]
    pub metadata: Value,
}

/// Typed wrapper for a cloud asset, the input of `review_asset`.
///
/// Hierarchy metadata may arrive as the `ancestors` list, as an encoded
/// `ancestry_path`, or both; ancestry resolution collapses them into the
/// canonical `ancestry_path` before dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub asset_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ancestry_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_policy: Option<Value>,
}
