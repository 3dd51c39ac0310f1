// SPDX-License-Identifier: Apache-2.0

//! The shape of a single constraint violation as produced by a driver's
//! `violation` rule and consumed by `Target::HandleViolation`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// One violation returned by evaluating a constraint's `violation` rule.
///
/// Mirrors the `{msg, details}` convention policies in this family use:
/// a human-readable message plus an open-ended `details` bag the target
/// handler can attach to the resource it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    /// Human-readable violation message.
    pub msg: String,
    /// Arbitrary additional context from the policy, preserved verbatim.
    #[serde(default)]
    pub details: Value,
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

/// A violation attributed to the constraint that produced it, ready for
/// enforcement-action resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributedViolation {
    /// `metadata.name` of the constraint that produced this violation.
    pub constraint_name: String,
    /// The constraint's `kind` (its template's `crdKind`).
    pub constraint_kind: String,
    /// The violation itself.
    pub violation: Violation,
}
