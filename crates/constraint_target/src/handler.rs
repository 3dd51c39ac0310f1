// SPDX-License-Identifier: Apache-2.0

//! The target handler contract (C6): the capability set an orchestrator
//! dispatches to by name, never by dynamic type introspection.

use constraint_engine::AttributedViolation;
use constraint_schema::Constraint;
use serde_json::Value;

use crate::Error;

/// A domain-specific adapter describing how review and inventory objects
/// in one target look, and how a violation maps back to the resource it
/// came from.
///
/// Implementations are registered with an orchestrator by [`TargetHandler::name`]
/// and are expected to be cheap to call: the orchestrator may call
/// `process_data`/`handle_review` once per object per registered target.
pub trait TargetHandler: Send + Sync {
    /// Stable identifier referenced from a template's `spec.targets[].target`.
    fn name(&self) -> &str;

    /// The structural schema constraining a constraint's `spec.match` for
    /// this target. `None` defaults to "preserve unknown fields" at schema
    /// synthesis time.
    fn match_schema(&self) -> Option<Value> {
        None
    }

    /// Normalizes an inventory object, returning `Some((path, canonical))`
    /// when this target handles it, or `None` when the object is outside
    /// this target's domain (so the caller tries the next target).
    ///
    /// # Errors
    /// Returns [`Error::MalformedObject`] if the object looks like it
    /// belongs to this target but is missing fields this target requires.
    fn process_data(&self, obj: &Value) -> Result<Option<(String, Value)>, Error>;

    /// Normalizes a review object into the form policies expect, or
    /// returns `None` when this target does not handle it.
    ///
    /// # Errors
    /// Returns [`Error::MalformedObject`] if the object looks like it
    /// belongs to this target but is missing fields this target requires.
    fn handle_review(&self, obj: &Value) -> Result<Option<Value>, Error>;

    /// Attaches the resource a violation was raised against, for reporting.
    fn handle_violation(&self, review: &Value, violation: &AttributedViolation) -> Value;

    /// An optional business-rule check run after schema validation
    /// succeeds. The default accepts every constraint.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConstraint`] if the target-specific rule is
    /// violated.
    fn validate_constraint(&self, constraint: &Constraint) -> Result<(), Error> {
        let _ = constraint;
        Ok(())
    }

    /// A Rego library fragment parameterized by `{ConstraintsRoot}` and
    /// `{DataRoot}` placeholders (see [`render_library`]), providing
    /// `matching_constraints`, `matching_reviews_and_constraints`, and
    /// optionally `autoreject_review` rules that other policies import.
    fn library(&self) -> &str;
}

/// Renders a [`TargetHandler::library`] fragment by substituting its
/// `{ConstraintsRoot}`/`{DataRoot}` placeholders.
///
/// `constraints_root` and `data_root` are dotted Rego references, e.g.
/// `"data.constraints"` and `"data.inventory"`.
#[must_use]
pub fn render_library(fragment: &str, constraints_root: &str, data_root: &str) -> String {
    fragment
        .replace("{ConstraintsRoot}", constraints_root)
        .replace("{DataRoot}", data_root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_library_substitutes_both_placeholders() {
        let fragment = "matching_constraints[c] { c := {ConstraintsRoot}[_]; {DataRoot}.ok }";
        let rendered = render_library(fragment, "data.constraints", "data.inventory");
        assert_eq!(
            rendered,
            "matching_constraints[c] { c := data.constraints[_]; data.inventory.ok }"
        );
    }
}
