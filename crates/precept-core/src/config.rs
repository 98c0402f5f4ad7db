//! Policy configuration loading.
//!
//! A `Configuration` is built from one or more policy locations (YAML
//! files or directories holding constraint templates and constraint
//! instances) plus a shared rule-library location, and splits the parsed
//! documents per target domain. Templates are routed by the target they
//! name; constraints are routed by the kind map the templates establish.
//!
//! Loading is all-or-nothing: any unreadable file, malformed document,
//! unknown target, or constraint without a matching template fails the
//! whole configuration.

use crate::types::{CheckOp, Constraint, ConstraintTemplate, MatchSpec, Rule, Severity, Target};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One policy file given by contents instead of by path.
#[derive(Debug, Clone)]
pub struct PolicyFile {
    /// Display name used in error messages.
    pub path: String,
    pub content: String,
}

impl PolicyFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Errors raised while loading policy configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no policy path set, provide at least one policy path")]
    NoPolicyPaths,
    #[error("no policy library set")]
    NoPolicyLibrary,
    #[error("no policy files provided")]
    NoPolicyFiles,
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("constraint template '{name}' names unknown target '{target}'")]
    UnknownTarget { name: String, target: String },
    #[error("constraint '{name}' has kind '{kind}' with no matching constraint template")]
    UnknownConstraintKind { name: String, kind: String },
    #[error("malformed constraint template '{name}': {reason}")]
    MalformedTemplate { name: String, reason: String },
    #[error("malformed constraint '{name}': {reason}")]
    MalformedConstraint { name: String, reason: String },
    #[error("malformed rule library '{name}': {reason}")]
    MalformedLibrary { name: String, reason: String },
}

/// Templates and constraints routed to one target domain.
#[derive(Debug, Clone, Default)]
pub struct TargetPolicies {
    pub templates: Vec<ConstraintTemplate>,
    pub constraints: Vec<Constraint>,
}

/// Parsed policy configuration, split per target domain.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    gcp: TargetPolicies,
    k8s: TargetPolicies,
    terraform: TargetPolicies,
}

impl Configuration {
    /// Load configuration from policy paths and a rule-library path.
    ///
    /// Each policy path may be a YAML file or a directory, walked
    /// recursively in name order. Fails if no policy path is given, if
    /// the library path is empty or yields no files, or if any document
    /// fails to parse or route.
    pub fn load(policy_paths: &[PathBuf], library_path: &Path) -> Result<Self, ConfigError> {
        if policy_paths.is_empty() {
            return Err(ConfigError::NoPolicyPaths);
        }
        if library_path.as_os_str().is_empty() {
            return Err(ConfigError::NoPolicyLibrary);
        }
        tracing::debug!(?policy_paths, ?library_path, "loading policy configuration");

        let mut policy_files = Vec::new();
        for path in policy_paths {
            for file in collect_yaml_files(path)? {
                policy_files.push(read_policy_file(&file)?);
            }
        }

        let mut library = Vec::new();
        for file in collect_yaml_files(library_path)? {
            library.push(read_policy_file(&file)?.content);
        }

        Self::from_contents(policy_files, library)
    }

    /// Build configuration from in-memory file contents.
    ///
    /// Fails if either input is empty; the library must hold at least one
    /// `RuleLibrary` document.
    pub fn from_contents(
        policy_files: Vec<PolicyFile>,
        library: Vec<String>,
    ) -> Result<Self, ConfigError> {
        if policy_files.is_empty() {
            return Err(ConfigError::NoPolicyFiles);
        }
        if library.is_empty() {
            return Err(ConfigError::NoPolicyLibrary);
        }

        let library_rules = parse_library(&library)?;

        // First pass: templates establish the constraint-kind routing map.
        let mut config = Configuration::default();
        let mut kind_targets: BTreeMap<String, Target> = BTreeMap::new();
        let mut constraint_docs: Vec<(String, Value)> = Vec::new();

        for file in &policy_files {
            for doc in parse_documents(&file.path, &file.content)? {
                match document_kind(&doc) {
                    Some("ConstraintTemplate") => {
                        let template = parse_template(&doc, &library_rules)?;
                        if kind_targets.contains_key(&template.kind) {
                            return Err(ConfigError::MalformedTemplate {
                                name: template.name,
                                reason: format!(
                                    "constraint kind '{}' is declared by more than one template",
                                    template.kind
                                ),
                            });
                        }
                        kind_targets.insert(template.kind.clone(), template.target);
                        config.policies_mut(template.target).templates.push(template);
                    }
                    Some("RuleLibrary") => {
                        return Err(ConfigError::MalformedConstraint {
                            name: file.path.clone(),
                            reason: "rule libraries belong in the policy library path".to_string(),
                        });
                    }
                    _ => constraint_docs.push((file.path.clone(), doc)),
                }
            }
        }

        // Second pass: route constraints through the kind map.
        for (path, doc) in constraint_docs {
            let constraint = parse_constraint(&path, &doc)?;
            let Some(target) = kind_targets.get(&constraint.kind) else {
                return Err(ConfigError::UnknownConstraintKind {
                    name: constraint.name,
                    kind: constraint.kind,
                });
            };
            config.policies_mut(*target).constraints.push(constraint);
        }

        for target in Target::ALL {
            let policies = config.policies(target);
            tracing::debug!(
                target = %target,
                templates = policies.templates.len(),
                constraints = policies.constraints.len(),
                "routed policies"
            );
        }
        Ok(config)
    }

    /// Templates and constraints routed to the given target.
    pub fn policies(&self, target: Target) -> &TargetPolicies {
        match target {
            Target::Gcp => &self.gcp,
            Target::K8s => &self.k8s,
            Target::Terraform => &self.terraform,
        }
    }

    fn policies_mut(&mut self, target: Target) -> &mut TargetPolicies {
        match target {
            Target::Gcp => &mut self.gcp,
            Target::K8s => &mut self.k8s,
            Target::Terraform => &mut self.terraform,
        }
    }
}

/// Collect `.yaml`/`.yml` files under a path, recursing into directories
/// in name order so load order is deterministic.
fn collect_yaml_files(path: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let mut out = Vec::new();
    collect_into(path, &mut out)?;
    Ok(out)
}

fn collect_into(path: &Path, out: &mut Vec<PathBuf>) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    };
    let meta = fs::metadata(path).map_err(io_err)?;
    if meta.is_file() {
        out.push(path.to_path_buf());
        return Ok(());
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(path)
        .map_err(io_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?
        .into_iter()
        .map(|e| e.path())
        .collect();
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            collect_into(&entry, out)?;
        } else if matches!(
            entry.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        ) {
            out.push(entry);
        }
    }
    Ok(())
}

fn read_policy_file(path: &Path) -> Result<PolicyFile, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(PolicyFile::new(path.display().to_string(), content))
}

/// Parse one file's content into its non-empty YAML documents.
fn parse_documents(path: &str, content: &str) -> Result<Vec<Value>, ConfigError> {
    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let doc = Value::deserialize(document).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })?;
        if !doc.is_null() {
            docs.push(doc);
        }
    }
    Ok(docs)
}

fn document_kind(doc: &Value) -> Option<&str> {
    doc.get("kind").and_then(Value::as_str)
}

fn metadata_name(doc: &Value) -> Option<&str> {
    doc.get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
}

/// Parse the rule library: every document must be a `RuleLibrary`, and
/// rule ids must be unique across the whole library.
fn parse_library(library: &[String]) -> Result<BTreeMap<String, Rule>, ConfigError> {
    let mut rules = BTreeMap::new();
    for (idx, content) in library.iter().enumerate() {
        let source = format!("library[{idx}]");
        for doc in parse_documents(&source, content)? {
            let name = metadata_name(&doc).unwrap_or(&source).to_string();
            if document_kind(&doc) != Some("RuleLibrary") {
                return Err(ConfigError::MalformedLibrary {
                    name,
                    reason: "library documents must have kind RuleLibrary".to_string(),
                });
            }
            let raw = doc.get("rules").and_then(Value::as_array).ok_or_else(|| {
                ConfigError::MalformedLibrary {
                    name: name.clone(),
                    reason: "missing rules list".to_string(),
                }
            })?;
            for entry in raw {
                let rule = parse_rule(entry).map_err(|reason| ConfigError::MalformedLibrary {
                    name: name.clone(),
                    reason,
                })?;
                if rules.contains_key(&rule.id) {
                    return Err(ConfigError::MalformedLibrary {
                        name,
                        reason: format!("duplicate rule id '{}'", rule.id),
                    });
                }
                rules.insert(rule.id.clone(), rule);
            }
        }
    }
    Ok(rules)
}

fn parse_template(
    doc: &Value,
    library: &BTreeMap<String, Rule>,
) -> Result<ConstraintTemplate, ConfigError> {
    let name = metadata_name(doc).unwrap_or("<unnamed>").to_string();
    let malformed = |reason: String| ConfigError::MalformedTemplate {
        name: name.clone(),
        reason,
    };

    let kind = doc
        .pointer("/spec/crd/spec/names/kind")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing spec.crd.spec.names.kind".to_string()))?
        .to_string();

    let targets = doc
        .pointer("/spec/targets")
        .and_then(Value::as_array)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| malformed("missing spec.targets".to_string()))?;
    let target_spec = &targets[0];
    let target_name = target_spec
        .get("target")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing spec.targets[0].target".to_string()))?;
    let target = Target::from_name(target_name).ok_or_else(|| ConfigError::UnknownTarget {
        name: name.clone(),
        target: target_name.to_string(),
    })?;

    let mut rules = Vec::new();
    if let Some(raw_rules) = target_spec.get("rules").and_then(Value::as_array) {
        for entry in raw_rules {
            let rule = if let Some(use_id) = entry.get("use").and_then(Value::as_str) {
                library
                    .get(use_id)
                    .cloned()
                    .ok_or_else(|| malformed(format!("unknown library rule '{use_id}'")))?
            } else {
                parse_rule(entry).map_err(malformed)?
            };
            rules.push(rule);
        }
    }

    Ok(ConstraintTemplate {
        name,
        kind,
        target,
        rules,
    })
}

fn parse_rule(entry: &Value) -> Result<Rule, String> {
    let rule: Rule = serde_json::from_value(entry.clone()).map_err(|e| e.to_string())?;
    if rule.op.needs_value() && rule.value.is_none() && rule.value_from.is_none() {
        return Err(format!(
            "rule '{}' uses op '{}' but sets neither value nor value_from",
            rule.id, rule.op
        ));
    }
    if matches!(rule.op, CheckOp::Pattern)
        && rule.value.as_ref().is_some_and(|v| !v.is_string())
    {
        return Err(format!("rule '{}' pattern value must be a string", rule.id));
    }
    Ok(rule)
}

fn parse_constraint(path: &str, doc: &Value) -> Result<Constraint, ConfigError> {
    let kind = document_kind(doc)
        .ok_or_else(|| ConfigError::MalformedConstraint {
            name: path.to_string(),
            reason: "missing kind".to_string(),
        })?
        .to_string();
    let name = metadata_name(doc)
        .ok_or_else(|| ConfigError::MalformedConstraint {
            name: format!("{path} ({kind})"),
            reason: "missing metadata.name".to_string(),
        })?
        .to_string();

    #[derive(Default, Deserialize)]
    struct RawSpec {
        #[serde(default)]
        severity: Severity,
        #[serde(default, rename = "match")]
        match_spec: MatchSpec,
        #[serde(default)]
        parameters: Map<String, Value>,
    }

    let spec: RawSpec = match doc.get("spec") {
        Some(spec) => serde_json::from_value(spec.clone()).map_err(|e| {
            ConfigError::MalformedConstraint {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?,
        None => RawSpec::default(),
    };

    Ok(Constraint {
        name,
        kind,
        severity: spec.severity,
        match_spec: spec.match_spec,
        parameters: spec.parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"
kind: RuleLibrary
metadata:
  name: base
rules:
  - id: lib.labels.required
    path: resource.data.labels
    op: required
"#;

    const TEMPLATE: &str = r#"
apiVersion: templates.precept.dev/v1
kind: ConstraintTemplate
metadata:
  name: gcp-storage-logging
spec:
  crd:
    spec:
      names:
        kind: GCPStorageLoggingConstraintV1
  targets:
    - target: validation.gcp.precept.dev
      rules:
        - id: logging.required
          path: resource.data.logging
          op: required
          message: storage buckets must configure logging
"#;

    const CONSTRAINT: &str = r#"
apiVersion: constraints.precept.dev/v1
kind: GCPStorageLoggingConstraintV1
metadata:
  name: require-storage-logging
spec:
  severity: warning
  match:
    ancestries: ["organization/1/**"]
"#;

    fn files(contents: &[&str]) -> Vec<PolicyFile> {
        contents
            .iter()
            .enumerate()
            .map(|(i, c)| PolicyFile::new(format!("policy-{i}.yaml"), *c))
            .collect()
    }

    #[test]
    fn test_from_contents_routes_by_target_and_kind() {
        let config =
            Configuration::from_contents(files(&[TEMPLATE, CONSTRAINT]), vec![LIBRARY.into()])
                .unwrap();
        let gcp = config.policies(Target::Gcp);
        assert_eq!(gcp.templates.len(), 1);
        assert_eq!(gcp.templates[0].kind, "GCPStorageLoggingConstraintV1");
        assert_eq!(gcp.constraints.len(), 1);
        assert_eq!(gcp.constraints[0].severity, Severity::Warning);
        assert!(config.policies(Target::K8s).templates.is_empty());
        assert!(config.policies(Target::Terraform).templates.is_empty());
    }

    #[test]
    fn test_empty_policy_files_fails() {
        let err = Configuration::from_contents(vec![], vec![LIBRARY.into()]).unwrap_err();
        assert!(matches!(err, ConfigError::NoPolicyFiles));
    }

    #[test]
    fn test_empty_library_fails() {
        let err = Configuration::from_contents(files(&[TEMPLATE]), vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::NoPolicyLibrary));
    }

    #[test]
    fn test_constraint_without_template_fails() {
        let err = Configuration::from_contents(files(&[CONSTRAINT]), vec![LIBRARY.into()])
            .unwrap_err();
        match err {
            ConfigError::UnknownConstraintKind { kind, .. } => {
                assert_eq!(kind, "GCPStorageLoggingConstraintV1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_target_fails() {
        let template = TEMPLATE.replace(
            "validation.gcp.precept.dev",
            "validation.azure.precept.dev",
        );
        let err = Configuration::from_contents(files(&[&template]), vec![LIBRARY.into()])
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTarget { .. }));
    }

    #[test]
    fn test_duplicate_template_kind_fails() {
        let err =
            Configuration::from_contents(files(&[TEMPLATE, TEMPLATE]), vec![LIBRARY.into()])
                .unwrap_err();
        assert!(matches!(err, ConfigError::MalformedTemplate { .. }));
    }

    #[test]
    fn test_library_rule_reference_resolves() {
        let template = r#"
kind: ConstraintTemplate
metadata:
  name: gcp-labels
spec:
  crd:
    spec:
      names:
        kind: GCPLabelsConstraintV1
  targets:
    - target: validation.gcp.precept.dev
      rules:
        - use: lib.labels.required
"#;
        let config = Configuration::from_contents(files(&[template]), vec![LIBRARY.into()])
            .unwrap();
        let rules = &config.policies(Target::Gcp).templates[0].rules;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "lib.labels.required");
        assert_eq!(rules[0].op, CheckOp::Required);
    }

    #[test]
    fn test_unknown_library_rule_fails() {
        let template = TEMPLATE.replace(
            "- id: logging.required\n          path: resource.data.logging\n          op: required\n          message: storage buckets must configure logging",
            "- use: lib.missing",
        );
        let err = Configuration::from_contents(files(&[&template]), vec![LIBRARY.into()])
            .unwrap_err();
        match err {
            ConfigError::MalformedTemplate { reason, .. } => {
                assert!(reason.contains("lib.missing"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rule_missing_comparison_value_fails() {
        let template = TEMPLATE.replace("op: required", "op: equals");
        let err = Configuration::from_contents(files(&[&template]), vec![LIBRARY.into()])
            .unwrap_err();
        match err {
            ConfigError::MalformedTemplate { reason, .. } => {
                assert!(reason.contains("value"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rule_library_in_policy_path_fails() {
        let err = Configuration::from_contents(
            files(&[TEMPLATE, LIBRARY]),
            vec![LIBRARY.into()],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MalformedConstraint { .. }));
    }

    #[test]
    fn test_multi_document_file() {
        let combined = format!("{TEMPLATE}\n---\n{CONSTRAINT}");
        let config =
            Configuration::from_contents(files(&[&combined]), vec![LIBRARY.into()]).unwrap();
        assert_eq!(config.policies(Target::Gcp).constraints.len(), 1);
    }

    #[test]
    fn test_load_from_directories() {
        let policy_dir = tempfile::tempdir().unwrap();
        let library_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(policy_dir.path().join("storage")).unwrap();
        std::fs::write(policy_dir.path().join("storage/template.yaml"), TEMPLATE).unwrap();
        std::fs::write(policy_dir.path().join("constraint.yml"), CONSTRAINT).unwrap();
        std::fs::write(policy_dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(library_dir.path().join("base.yaml"), LIBRARY).unwrap();

        let config = Configuration::load(
            &[policy_dir.path().to_path_buf()],
            library_dir.path(),
        )
        .unwrap();
        let gcp = config.policies(Target::Gcp);
        assert_eq!(gcp.templates.len(), 1);
        assert_eq!(gcp.constraints.len(), 1);
    }

    #[test]
    fn test_load_requires_policy_paths() {
        let err = Configuration::load(&[], Path::new("lib")).unwrap_err();
        assert!(matches!(err, ConfigError::NoPolicyPaths));
    }

    #[test]
    fn test_load_requires_library_path() {
        let err =
            Configuration::load(&[PathBuf::from("policies")], Path::new("")).unwrap_err();
        assert!(matches!(err, ConfigError::NoPolicyLibrary));
    }
}
