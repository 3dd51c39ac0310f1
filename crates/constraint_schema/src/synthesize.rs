// SPDX-License-Identifier: Apache-2.0

//! Dynamic schema synthesis (C2): turns a [`ConstraintTemplate`] plus a
//! target's match-schema into a structural JSON Schema document that every
//! constraint instance of that template must satisfy.

use serde_json::{json, Value};

use crate::model::ConstraintTemplate;
use crate::Error;

/// A schema that preserves unknown fields, used as the default for
/// `spec.match` and `spec.parameters` when a template/target does not
/// narrow them further.
fn preserve_unknown_fields_object() -> Value {
    json!({
        "type": "object",
        "additionalProperties": true,
    })
}

/// Builds the structural schema every instance of `template` must satisfy,
/// given the match-schema contributed by the single target it is bound to.
///
/// Returns [`Error::InvalidConstraintTemplate`] if `crd_kind` is empty or not
/// alphanumeric-ish, or if `template.targets` does not contain exactly one
/// entry.
pub fn synthesize_schema(template: &ConstraintTemplate, match_schema: Option<&Value>) -> Result<Value, Error> {
    if template.crd_kind.trim().is_empty() {
        return Err(Error::InvalidConstraintTemplate {
            reason: "crdKind must be non-empty".to_owned(),
        });
    }
    if !template
        .crd_kind
        .chars()
        .all(|c| c.is_ascii_alphanumeric())
    {
        return Err(Error::InvalidConstraintTemplate {
            reason: format!("crdKind '{}' must be alphanumeric", template.crd_kind),
        });
    }
    if template.targets.len() != 1 {
        return Err(Error::InvalidConstraintTemplate {
            reason: format!(
                "exactly one target is required, got {}",
                template.targets.len()
            ),
        });
    }

    let match_schema = match_schema
        .cloned()
        .unwrap_or_else(preserve_unknown_fields_object);
    let parameter_schema = template
        .parameter_schema
        .clone()
        .unwrap_or_else(preserve_unknown_fields_object);

    Ok(json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["apiVersion", "kind", "metadata", "spec"],
        "properties": {
            "apiVersion": { "type": "string" },
            "kind": { "type": "string" },
            "metadata": {
                "type": "object",
                "additionalProperties": true,
                "required": ["name"],
                "properties": {
                    "name": { "type": "string", "maxLength": 63 },
                },
            },
            "status": {
                "type": "object",
                "additionalProperties": true,
            },
            "spec": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "match": match_schema,
                    "parameters": parameter_schema,
                    "enforcementAction": {
                        "type": "string",
                        "default": "deny",
                    },
                    "scopedEnforcementActions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "additionalProperties": false,
                            "required": ["action", "enforcementPoints"],
                            "properties": {
                                "action": { "type": "string" },
                                "enforcementPoints": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "additionalProperties": false,
                                        "required": ["name"],
                                        "properties": {
                                            "name": { "type": "string" },
                                        },
                                    },
                                },
                            },
                        },
                    },
                },
            },
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TargetEntry;

    fn one_target() -> Vec<TargetEntry> {
        vec![TargetEntry {
            target: "test.target".to_owned(),
            code: String::new(),
            libs: vec![],
            operations: vec![],
        }]
    }

    #[test]
    fn rejects_empty_crd_kind() {
        let template = ConstraintTemplate {
            name: "t".to_owned(),
            crd_kind: String::new(),
            parameter_schema: None,
            targets: one_target(),
            labels: Default::default(),
        };
        assert!(matches!(
            synthesize_schema(&template, None),
            Err(Error::InvalidConstraintTemplate { .. })
        ));
    }

    #[test]
    fn rejects_wrong_target_count() {
        let template = ConstraintTemplate {
            name: "t".to_owned(),
            crd_kind: "K8sRequiredLabels".to_owned(),
            parameter_schema: None,
            targets: vec![],
            labels: Default::default(),
        };
        assert!(matches!(
            synthesize_schema(&template, None),
            Err(Error::InvalidConstraintTemplate { .. })
        ));

        let mut two = one_target();
        two.push(two[0].clone());
        let template = ConstraintTemplate {
            targets: two,
            ..template
        };
        assert!(matches!(
            synthesize_schema(&template, None),
            Err(Error::InvalidConstraintTemplate { .. })
        ));
    }

    #[test]
    fn synthesizes_metadata_name_max_length() {
        let template = ConstraintTemplate {
            name: "t".to_owned(),
            crd_kind: "K8sRequiredLabels".to_owned(),
            parameter_schema: None,
            targets: one_target(),
            labels: Default::default(),
        };
        let schema = synthesize_schema(&template, None).expect("schema synthesis should succeed");
        assert_eq!(
            schema["properties"]["metadata"]["properties"]["name"]["maxLength"],
            63
        );
    }
}
