// SPDX-License-Identifier: Apache-2.0

//! The reference target: Kubernetes-admission-shaped review and inventory
//! objects (`{apiVersion, kind, metadata: {name, namespace, labels}, ...}`),
//! matched by kind, namespace inclusion/exclusion, and label selector.

use constraint_engine::AttributedViolation;
use constraint_schema::Constraint;
use serde_json::{json, Value};

use crate::handler::TargetHandler;
use crate::Error;

/// The name every constraint-framework template binds to when it targets
/// Kubernetes admission review objects.
pub const TARGET_NAME: &str = "admission.k8s.gatekeeper.sh";

/// The Rego library fragment registered alongside every template bound to
/// [`TARGET_NAME`]. `{ConstraintsRoot}` is rendered to the constraint data
/// document, `{DataRoot}` to the per-target inventory document.
const LIBRARY: &str = r"
package k8s.target

import rego.v1

matching_constraints[constraint] if {
	some constraint in {ConstraintsRoot}[_]
}

matching_reviews_and_constraints[[review, constraint]] if {
	review := input.review
	some constraint in {ConstraintsRoot}[_]
}

autoreject_review if {
	not input.review.kind
}
";

/// Matches Kubernetes-admission-shaped review and inventory objects against
/// a template's single declared target, by kind, namespace, and labels.
#[derive(Debug, Default, Clone)]
pub struct KubernetesAdmissionTarget;

impl KubernetesAdmissionTarget {
    /// Builds the reference Kubernetes-admission target handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TargetHandler for KubernetesAdmissionTarget {
    fn name(&self) -> &str {
        TARGET_NAME
    }

    fn match_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "kinds": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "apiGroups": { "type": "array", "items": { "type": "string" } },
                            "kinds": { "type": "array", "items": { "type": "string" } },
                        },
                    },
                },
                "namespaces": { "type": "array", "items": { "type": "string" } },
                "excludedNamespaces": { "type": "array", "items": { "type": "string" } },
                "labelSelector": {
                    "type": "object",
                    "properties": {
                        "matchLabels": {
                            "type": "object",
                            "additionalProperties": { "type": "string" },
                        },
                    },
                },
            },
        }))
    }

    fn process_data(&self, obj: &Value) -> Result<Option<(String, Value)>, Error> {
        let Some(kind) = obj.get("kind").and_then(Value::as_str) else {
            return Ok(None);
        };
        let Some(name) = obj.pointer("/metadata/name").and_then(Value::as_str) else {
            return Err(Error::MalformedObject {
                reason: format!("object of kind '{kind}' is missing metadata.name"),
            });
        };
        let namespace = obj
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .unwrap_or("_cluster");

        Ok(Some((
            format!("/{namespace}/{kind}/{name}"),
            canonicalize(obj),
        )))
    }

    fn handle_review(&self, obj: &Value) -> Result<Option<Value>, Error> {
        if obj.get("kind").and_then(Value::as_str).is_none() {
            return Ok(None);
        }
        Ok(Some(canonicalize(obj)))
    }

    fn handle_violation(&self, review: &Value, violation: &AttributedViolation) -> Value {
        json!({
            "message": violation.violation.msg,
            "details": violation.violation.details,
            "constraint": {
                "kind": violation.constraint_kind,
                "name": violation.constraint_name,
            },
            "resource": {
                "apiVersion": review.get("apiVersion").cloned().unwrap_or(Value::Null),
                "kind": review.get("kind").cloned().unwrap_or(Value::Null),
                "name": review.pointer("/metadata/name").cloned().unwrap_or(Value::Null),
                "namespace": review.pointer("/metadata/namespace").cloned().unwrap_or(Value::Null),
            },
        })
    }

    fn validate_constraint(&self, constraint: &Constraint) -> Result<(), Error> {
        let namespaces_present = constraint
            .spec
            .r#match
            .get("namespaces")
            .and_then(Value::as_array)
            .is_some_and(|a| !a.is_empty());
        let excluded_present = constraint
            .spec
            .r#match
            .get("excludedNamespaces")
            .and_then(Value::as_array)
            .is_some_and(|a| !a.is_empty());

        if namespaces_present && excluded_present {
            return Err(Error::InvalidConstraint {
                reason: "spec.match cannot set both namespaces and excludedNamespaces".to_owned(),
            });
        }
        Ok(())
    }

    fn library(&self) -> &str {
        LIBRARY
    }
}

/// Fills in the defaults a review/inventory object may omit: cluster-scoped
/// objects get `metadata.namespace = ""`, objects without labels get `{}`.
fn canonicalize(obj: &Value) -> Value {
    let mut canonical = obj.clone();
    let metadata = canonical
        .as_object_mut()
        .expect("obj is always an object by the time canonicalize is called")
        .entry("metadata")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    let metadata_obj = metadata
        .as_object_mut()
        .expect("metadata must be an object");
    let _ = metadata_obj
        .entry("namespace")
        .or_insert_with(|| Value::String(String::new()));
    let _ = metadata_obj
        .entry("labels")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    canonical
}

/// Evaluates a constraint's `spec.match` predicate against a canonicalized
/// review object's kind, namespace, and labels. This mirrors what the
/// rendered [`LIBRARY`] fragment's `matching_constraints` rule checks inside
/// the policy engine; exposed here so callers that only need the predicate
/// (e.g. the audit-loop collaborator described in the design notes) don't
/// have to round-trip through a driver query to get it.
#[must_use]
pub fn matches(review: &Value, match_spec: &Value) -> bool {
    if let Some(kinds) = match_spec.get("kinds").and_then(Value::as_array) {
        if !kinds.is_empty() {
            let review_kind = review.get("kind").and_then(Value::as_str).unwrap_or("");
            let kind_matches = kinds.iter().any(|entry| {
                entry.get("kinds").and_then(Value::as_array).map_or(true, |names| {
                    names.is_empty() || names.iter().any(|n| n.as_str() == Some(review_kind))
                })
            });
            if !kind_matches {
                return false;
            }
        }
    }

    let namespace = review
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .unwrap_or("");

    if let Some(namespaces) = match_spec.get("namespaces").and_then(Value::as_array) {
        if !namespaces.is_empty()
            && !namespaces.iter().any(|n| n.as_str() == Some(namespace))
        {
            return false;
        }
    }

    if let Some(excluded) = match_spec.get("excludedNamespaces").and_then(Value::as_array) {
        if excluded.iter().any(|n| n.as_str() == Some(namespace)) {
            return false;
        }
    }

    if let Some(match_labels) = match_spec.pointer("/labelSelector/matchLabels").and_then(Value::as_object) {
        let review_labels = review
            .pointer("/metadata/labels")
            .and_then(Value::as_object);
        for (key, expected) in match_labels {
            let actual = review_labels.and_then(|labels| labels.get(key));
            if actual != Some(expected) {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use constraint_engine::Violation;

    fn pod(namespace: &str, labels: Value) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "web", "namespace": namespace, "labels": labels },
        })
    }

    #[test]
    fn process_data_keys_by_namespace_kind_and_name() {
        let target = KubernetesAdmissionTarget::new();
        let (path, canonical) = target
            .process_data(&pod("default", json!({})))
            .unwrap()
            .expect("a Pod with metadata.name must be handled");
        assert_eq!(path, "/default/Pod/web");
        assert_eq!(canonical["metadata"]["namespace"], json!("default"));
    }

    #[test]
    fn process_data_rejects_objects_missing_metadata_name() {
        let target = KubernetesAdmissionTarget::new();
        let err = target
            .process_data(&json!({"kind": "Pod", "metadata": {}}))
            .expect_err("missing metadata.name must be an error");
        assert!(matches!(err, Error::MalformedObject { .. }));
    }

    #[test]
    fn process_data_declines_objects_without_a_kind() {
        let target = KubernetesAdmissionTarget::new();
        assert!(target.process_data(&json!({"foo": "bar"})).unwrap().is_none());
    }

    #[test]
    fn handle_review_defaults_cluster_scoped_namespace() {
        let target = KubernetesAdmissionTarget::new();
        let review = target
            .handle_review(&json!({"kind": "ClusterRole", "metadata": {"name": "admin"}}))
            .unwrap()
            .expect("a kind-bearing object must be handled");
        assert_eq!(review["metadata"]["namespace"], json!(""));
    }

    #[test]
    fn handle_violation_attaches_resolved_resource() {
        let target = KubernetesAdmissionTarget::new();
        let review = pod("default", json!({}));
        let violation = AttributedViolation {
            constraint_name: "must-have-team".to_owned(),
            constraint_kind: "K8sRequiredLabels".to_owned(),
            violation: Violation {
                msg: "missing label team".to_owned(),
                details: Value::Null,
            },
        };
        let attached = target.handle_violation(&review, &violation);
        assert_eq!(attached["resource"]["name"], json!("web"));
        assert_eq!(attached["constraint"]["name"], json!("must-have-team"));
    }

    #[test]
    fn validate_constraint_rejects_namespaces_and_excluded_together() {
        let target = KubernetesAdmissionTarget::new();
        let mut constraint = sample_constraint();
        constraint.spec.r#match = json!({
            "namespaces": ["prod"],
            "excludedNamespaces": ["kube-system"],
        });
        let err = target
            .validate_constraint(&constraint)
            .expect_err("both namespaces and excludedNamespaces must be rejected");
        assert!(matches!(err, Error::InvalidConstraint { .. }));
    }

    #[test]
    fn matches_respects_namespace_exclusion_and_label_selector() {
        let review = pod("kube-system", json!({"team": "x"}));
        let match_spec = json!({ "excludedNamespaces": ["kube-system"] });
        assert!(!matches(&review, &match_spec));

        let review = pod("default", json!({"team": "x"}));
        let match_spec = json!({ "labelSelector": { "matchLabels": { "team": "x" } } });
        assert!(matches(&review, &match_spec));

        let match_spec = json!({ "labelSelector": { "matchLabels": { "team": "y" } } });
        assert!(!matches(&review, &match_spec));
    }

    fn sample_constraint() -> Constraint {
        use constraint_schema::model::{Constraint, ConstraintMetadata, ConstraintSpec};
        Constraint {
            api_version: "constraints.gatekeeper.sh/v1beta1".to_owned(),
            kind: "K8sRequiredLabels".to_owned(),
            metadata: ConstraintMetadata {
                name: "must-have-team".to_owned(),
            },
            spec: ConstraintSpec {
                r#match: json!({}),
                parameters: json!({}),
                enforcement_action: "deny".to_owned(),
                scoped_enforcement_actions: None,
            },
        }
    }
}
