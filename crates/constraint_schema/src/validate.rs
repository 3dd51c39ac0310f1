// SPDX-License-Identifier: Apache-2.0

//! Constraint instance validation (C3): group/version/kind checks plus
//! structural-schema validation, delegated to the `jsonschema` crate.

use jsonschema::{Draft, JSONSchema};
use serde_json::{to_value, Value};

use crate::model::{Constraint, CONSTRAINT_GROUP};
use crate::Error;

/// Known constraint `version` strings accepted when a template does not
/// declare its own version list.
const DEFAULT_KNOWN_VERSIONS: &[&str] = &["v1beta1", "v1"];

/// Compiles `schema` (as produced by [`crate::synthesize_schema`]) into a
/// reusable validator.
///
/// # Errors
/// Returns [`Error::SchemaValidation`] if `schema` is not itself a valid
/// JSON Schema document.
pub fn compile(schema: &Value) -> Result<JSONSchema, Error> {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|e| Error::SchemaValidation {
            reason: format!("invalid synthesized schema: {e}"),
        })
}

/// Validates `constraint` against `compiled_schema` and the group/version/kind
/// identity rules: group must be [`CONSTRAINT_GROUP`], version must be one of
/// `known_versions` (or [`DEFAULT_KNOWN_VERSIONS`] when empty), and `kind`
/// must equal `expected_kind`.
///
/// Callers that already hold a typed [`Constraint`] (built in memory rather
/// than parsed from a wire object) should use this. A constraint parsed
/// from raw JSON should go through [`validate_constraint_value`] instead:
/// once an object has been deserialized into [`Constraint`], fields with no
/// typed representation are already gone, so this function cannot detect an
/// unknown top-level `spec` field the way the synthesized schema's
/// `additionalProperties: false` demands.
pub fn validate_constraint(
    constraint: &Constraint,
    expected_kind: &str,
    known_versions: &[String],
    compiled_schema: &JSONSchema,
) -> Result<(), Error> {
    check_identity(constraint, expected_kind, known_versions)?;

    let value = to_value(constraint).map_err(|e| Error::InvalidConstraint {
        reason: format!("constraint is not representable as JSON: {e}"),
    })?;
    validate_schema(&value, compiled_schema)
}

/// Validates a raw constraint object against `compiled_schema` and the
/// group/version/kind identity rules, then deserializes it into a
/// [`Constraint`].
///
/// This is the entry point that honors the synthesized schema's structural
/// strictness (`additionalProperties: false`): the schema check runs
/// against `value` itself, before any unknown field has had a chance to be
/// dropped by [`Constraint`]'s typed deserialization. Use this when
/// admitting a constraint object from the wire (a CRD apply, a CLI file,
/// ...); use [`validate_constraint`] for a [`Constraint`] already built in
/// memory.
///
/// # Errors
/// [`Error::SchemaValidation`] if `value` fails the synthesized schema (an
/// unknown field under a strict schema, a wrong-typed field, ...);
/// [`Error::InvalidConstraint`] if `value` does not parse into a
/// [`Constraint`], or if group/version/kind do not match expectations.
pub fn validate_constraint_value(
    value: &Value,
    expected_kind: &str,
    known_versions: &[String],
    compiled_schema: &JSONSchema,
) -> Result<Constraint, Error> {
    validate_schema(value, compiled_schema)?;

    let constraint: Constraint =
        serde_json::from_value(value.clone()).map_err(|e| Error::InvalidConstraint {
            reason: format!("constraint does not match the expected shape: {e}"),
        })?;

    check_identity(&constraint, expected_kind, known_versions)?;
    Ok(constraint)
}

fn check_identity(
    constraint: &Constraint,
    expected_kind: &str,
    known_versions: &[String],
) -> Result<(), Error> {
    if constraint.group() != CONSTRAINT_GROUP {
        return Err(Error::InvalidConstraint {
            reason: format!(
                "group '{}' must be '{CONSTRAINT_GROUP}'",
                constraint.group()
            ),
        });
    }

    let versions: Vec<&str> = if known_versions.is_empty() {
        DEFAULT_KNOWN_VERSIONS.to_vec()
    } else {
        known_versions.iter().map(std::string::String::as_str).collect()
    };
    if !versions.contains(&constraint.version()) {
        return Err(Error::InvalidConstraint {
            reason: format!("version '{}' is not recognized", constraint.version()),
        });
    }

    if constraint.kind != expected_kind {
        return Err(Error::InvalidConstraint {
            reason: format!(
                "kind '{}' does not match template kind '{expected_kind}'",
                constraint.kind
            ),
        });
    }

    Ok(())
}

fn validate_schema(value: &Value, compiled_schema: &JSONSchema) -> Result<(), Error> {
    let result = compiled_schema.validate(value);
    if let Err(errors) = result {
        let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(Error::SchemaValidation {
            reason: messages.join("; "),
        });
    }
    Ok(())
}
