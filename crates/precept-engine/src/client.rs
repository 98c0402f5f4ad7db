//! Per-target evaluation client: bootstrap loading and review.

use crate::eval;
use async_trait::async_trait;
use precept_core::{
    CheckOp, Constraint, ConstraintResult, ConstraintTemplate, Errors, MatchSpec, ReviewResponse,
    Severity, Target,
};
use precept_target::ancestry::{matches_address, matches_pattern, normalize_ancestry};
use precept_target::{MatchKeys, TargetHandler};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Construction options shared by all evaluation clients.
///
/// An explicit config value instead of variadic option closures; all
/// fields default to off.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Check ops removed from the engine. Adding a template whose rules
    /// use one fails that template's load.
    pub disabled_checks: Vec<String>,
    /// Emit a debug log per failed rule check during review.
    pub tracing: bool,
}

/// Errors raised while loading templates/constraints or reviewing.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to add template '{name}': {reason}")]
    MalformedTemplate { name: String, reason: String },
    #[error("template '{name}' rule '{rule}' uses disabled check '{op}'")]
    DisabledCheck {
        name: String,
        rule: String,
        op: String,
    },
    #[error("template '{name}' targets '{expected}' but this client reviews '{actual}'")]
    TargetMismatch {
        name: String,
        expected: Target,
        actual: Target,
    },
    #[error("constraint '{name}' has kind '{kind}' with no loaded template")]
    UnknownConstraintKind { name: String, kind: String },
    #[error("constraint '{name}' rule '{rule}' is missing parameter '{parameter}'")]
    MissingParameter {
        name: String,
        rule: String,
        parameter: String,
    },
    #[error("failed to add constraint '{name}': {reason}")]
    MalformedConstraint { name: String, reason: String },
    #[error("'{name}' rule '{rule}' has an invalid pattern: {source}")]
    InvalidPattern {
        name: String,
        rule: String,
        #[source]
        source: regex::Error,
    },
    #[error(transparent)]
    Load(#[from] Errors),
}

/// The evaluation-engine client contract consumed by the orchestrator.
#[async_trait]
pub trait EngineClient: Send + Sync {
    fn add_template(&mut self, template: ConstraintTemplate) -> Result<(), EngineError>;
    fn add_constraint(&mut self, constraint: Constraint) -> Result<(), EngineError>;
    async fn review(&self, resource: &Map<String, Value>) -> Result<ReviewResponse, EngineError>;
}

struct ResolvedRule {
    id: String,
    path: String,
    op: CheckOp,
    message: String,
    severity: Severity,
    value: Option<Value>,
    pattern: Option<Regex>,
}

struct LoadedConstraint {
    constraint: Constraint,
    rules: Vec<ResolvedRule>,
}

/// One target domain's evaluation client.
///
/// Loading happens at bootstrap only; after [`Client::build`] returns,
/// the handle is read-only and safe for concurrent review.
pub struct Client {
    handler: Arc<dyn TargetHandler>,
    options: EngineOptions,
    /// Loaded templates by the constraint kind they declare.
    templates: BTreeMap<String, ConstraintTemplate>,
    /// Loaded constraints in load order.
    constraints: Vec<LoadedConstraint>,
}

impl Client {
    pub fn new(handler: Arc<dyn TargetHandler>, options: EngineOptions) -> Self {
        Self {
            handler,
            options,
            templates: BTreeMap::new(),
            constraints: Vec::new(),
        }
    }

    /// Build a fully-loaded client for one target domain.
    ///
    /// All-or-nothing: every template is attempted and individual
    /// failures are collected; if any template failed, constraints are
    /// never attempted and the aggregated error names every failure.
    /// Constraints load the same way.
    pub fn build(
        handler: Arc<dyn TargetHandler>,
        templates: &[ConstraintTemplate],
        constraints: &[Constraint],
        options: &EngineOptions,
    ) -> Result<Client, EngineError> {
        let mut client = Client::new(handler, options.clone());

        let mut errs = Errors::new();
        for template in templates {
            if let Err(err) = client.add_template(template.clone()) {
                errs.add(err);
            }
        }
        errs.into_result().map_err(EngineError::Load)?;

        let mut errs = Errors::new();
        for constraint in constraints {
            if let Err(err) = client.add_constraint(constraint.clone()) {
                errs.add(err);
            }
        }
        errs.into_result().map_err(EngineError::Load)?;

        tracing::debug!(
            target = %client.target(),
            templates = client.templates.len(),
            constraints = client.constraints.len(),
            "evaluation client ready"
        );
        Ok(client)
    }

    pub fn target(&self) -> Target {
        self.handler.target()
    }

    pub fn add_template(&mut self, template: ConstraintTemplate) -> Result<(), EngineError> {
        if template.target != self.target() {
            return Err(EngineError::TargetMismatch {
                name: template.name,
                expected: template.target,
                actual: self.target(),
            });
        }
        if self.templates.contains_key(&template.kind) {
            return Err(EngineError::MalformedTemplate {
                name: template.name,
                reason: format!("constraint kind '{}' is already loaded", template.kind),
            });
        }
        for rule in &template.rules {
            if self
                .options
                .disabled_checks
                .iter()
                .any(|d| d == rule.op.as_str())
            {
                return Err(EngineError::DisabledCheck {
                    name: template.name.clone(),
                    rule: rule.id.clone(),
                    op: rule.op.as_str().to_string(),
                });
            }
            if rule.op == CheckOp::Pattern
                && let Some(Value::String(pattern)) = &rule.value
            {
                Regex::new(pattern).map_err(|source| EngineError::InvalidPattern {
                    name: template.name.clone(),
                    rule: rule.id.clone(),
                    source,
                })?;
            }
        }
        self.templates.insert(template.kind.clone(), template);
        Ok(())
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), EngineError> {
        let template = self.templates.get(&constraint.kind).ok_or_else(|| {
            EngineError::UnknownConstraintKind {
                name: constraint.name.clone(),
                kind: constraint.kind.clone(),
            }
        })?;

        let mut rules = Vec::with_capacity(template.rules.len());
        for rule in &template.rules {
            let value = match &rule.value_from {
                Some(key) => constraint
                    .parameters
                    .get(key)
                    .cloned()
                    .or_else(|| rule.value.clone()),
                None => rule.value.clone(),
            };
            if rule.op.needs_value() && value.is_none() {
                return Err(EngineError::MissingParameter {
                    name: constraint.name.clone(),
                    rule: rule.id.clone(),
                    parameter: rule.value_from.clone().unwrap_or_else(|| "value".to_string()),
                });
            }

            let pattern = if rule.op == CheckOp::Pattern {
                let raw = value.as_ref().and_then(Value::as_str).ok_or_else(|| {
                    EngineError::MalformedConstraint {
                        name: constraint.name.clone(),
                        reason: format!("rule '{}' pattern value must be a string", rule.id),
                    }
                })?;
                Some(Regex::new(raw).map_err(|source| EngineError::InvalidPattern {
                    name: constraint.name.clone(),
                    rule: rule.id.clone(),
                    source,
                })?)
            } else {
                None
            };

            rules.push(ResolvedRule {
                id: rule.id.clone(),
                path: rule.path.clone(),
                op: rule.op,
                message: rule
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("{} check failed at '{}'", rule.op, rule.path)),
                severity: rule.severity.unwrap_or(constraint.severity),
                value,
                pattern,
            });
        }

        self.constraints.push(LoadedConstraint { constraint, rules });
        Ok(())
    }

    /// Review one (already adapted) resource against every applicable
    /// constraint, in load order. Read-only; never mutates loaded state.
    pub async fn review(
        &self,
        resource: &Map<String, Value>,
    ) -> Result<ReviewResponse, EngineError> {
        let keys = self.handler.match_keys(resource);
        let mut results = Vec::new();

        for loaded in &self.constraints {
            if !constraint_applies(&loaded.constraint.match_spec, &keys) {
                continue;
            }
            for rule in &loaded.rules {
                let found = eval::field_path(resource, &rule.path);
                if eval::passes(rule.op, found, rule.value.as_ref(), rule.pattern.as_ref()) {
                    continue;
                }
                if self.options.tracing {
                    tracing::debug!(
                        constraint = %loaded.constraint.name,
                        rule = %rule.id,
                        path = %rule.path,
                        "rule check failed"
                    );
                }
                results.push(ConstraintResult {
                    constraint: loaded.constraint.name.clone(),
                    kind: loaded.constraint.kind.clone(),
                    rule_id: rule.id.clone(),
                    message: rule.message.clone(),
                    severity: rule.severity,
                    metadata: json!({
                        "path": rule.path,
                        "found": found.cloned().unwrap_or(Value::Null),
                        "expected": rule.value.clone().unwrap_or(Value::Null),
                    }),
                });
            }
        }

        tracing::debug!(target = %self.target(), results = results.len(), "review complete");
        Ok(ReviewResponse {
            target: self.target(),
            results,
        })
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("target", &self.target())
            .field("options", &self.options)
            .field("templates", &self.templates.len())
            .field("constraints", &self.constraints.len())
            .finish()
    }
}

#[async_trait]
impl EngineClient for Client {
    fn add_template(&mut self, template: ConstraintTemplate) -> Result<(), EngineError> {
        Client::add_template(self, template)
    }

    fn add_constraint(&mut self, constraint: Constraint) -> Result<(), EngineError> {
        Client::add_constraint(self, constraint)
    }

    async fn review(&self, resource: &Map<String, Value>) -> Result<ReviewResponse, EngineError> {
        Client::review(self, resource).await
    }
}

/// Whether a constraint's match block accepts a resource's match keys.
/// Constraints scoped to ancestries or addresses never match resources
/// lacking those keys.
fn constraint_applies(spec: &MatchSpec, keys: &MatchKeys) -> bool {
    if !spec.ancestries.is_empty() {
        let Some(ancestry) = keys.ancestry_path.as_deref() else {
            return false;
        };
        if !spec
            .ancestries
            .iter()
            .any(|p| matches_pattern(&normalize_ancestry(p), ancestry))
        {
            return false;
        }
    }
    if let Some(ancestry) = keys.ancestry_path.as_deref()
        && spec
            .excluded_ancestries
            .iter()
            .any(|p| matches_pattern(&normalize_ancestry(p), ancestry))
    {
        return false;
    }
    if !spec.addresses.is_empty() {
        let Some(address) = keys.reference.as_deref() else {
            return false;
        };
        if !spec.addresses.iter().any(|p| matches_address(p, address)) {
            return false;
        }
    }
    true
}
