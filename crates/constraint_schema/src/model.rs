// SPDX-License-Identifier: Apache-2.0

//! The wire-shaped data model shared by every crate in the constraint
//! framework: templates, constraint instances, target bindings and
//! enforcement-point scoping.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only `group` value a constraint's `apiVersion` may carry.
pub const CONSTRAINT_GROUP: &str = "constraints.gatekeeper.sh";

/// The constraint `version` assumed when a constraint omits one.
pub const DEFAULT_CONSTRAINT_VERSION: &str = "v1beta1";

/// The `enforcementAction` assumed when a constraint omits one.
pub const DEFAULT_ENFORCEMENT_ACTION: &str = "deny";

/// The distinguished `enforcementAction` value that enables per-enforcement-point
/// scoped actions.
pub const SCOPED_ENFORCEMENT_ACTION: &str = "scoped";

/// The wildcard enforcement-point name: matches every point requested by a
/// caller of [`crate::enforcement`].
pub const WILDCARD_ENFORCEMENT_POINT: &str = "*";

/// One entry of a template's `spec.targets` list.
///
/// A template must declare exactly one target entry; this is validated at
/// `AddTemplate` time, not encoded in the type, because the framework still
/// needs to deserialize (and reject) zero- or multi-target templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEntry {
    /// The name of a registered [`crate::TargetHandler`]-like target.
    pub target: String,
    /// The policy source for this target, in the driver's source language
    /// (e.g. Rego).
    pub code: String,
    /// Library fragments the policy source may import.
    #[serde(default)]
    pub libs: Vec<String>,
    /// Admission operations this template applies to (`CREATE`, `UPDATE`, ...).
    /// Empty or absent means "all operations"; `"*"` is an explicit wildcard.
    #[serde(default)]
    pub operations: Vec<String>,
}

/// A reusable policy template.
///
/// Immutable after `AddTemplate` succeeds: the synthesized schema computed
/// from a template is not recomputed until the template is replaced by a
/// subsequent `AddTemplate` call with the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintTemplate {
    /// Globally unique template name.
    pub name: String,
    /// The `kind` constraint instances of this template must carry.
    pub crd_kind: String,
    /// The structural schema constraining `spec.parameters`. `None` defaults
    /// to "object with unknown fields".
    #[serde(default)]
    pub parameter_schema: Option<Value>,
    /// Exactly one target entry is valid; validation happens at `AddTemplate`.
    pub targets: Vec<TargetEntry>,
    /// Opaque labels; system labels may override entries with the same key.
    #[serde(default)]
    pub labels: std::collections::BTreeMap<String, String>,
}

/// One `{action, enforcementPoints}` entry of `spec.scopedEnforcementActions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopedEnforcementAction {
    /// The action this entry contributes, e.g. `"deny"`, `"warn"`.
    pub action: String,
    /// The enforcement points this action applies to. `"*"` is the wildcard.
    pub enforcement_points: Vec<EnforcementPointRef>,
}

/// A single `{name}` entry inside `enforcementPoints`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementPointRef {
    /// The enforcement-point name, or `"*"` for the wildcard.
    pub name: String,
}

/// `metadata` of a constraint object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintMetadata {
    /// The constraint's name, unique within its kind.
    pub name: String,
}

/// `spec` of a constraint object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintSpec {
    /// Free-form object validated against the target's match-schema.
    #[serde(default = "default_match")]
    pub r#match: Value,
    /// Object validated against the template's `parameterSchema`.
    #[serde(default = "default_parameters")]
    pub parameters: Value,
    /// Defaults to `"deny"` when absent.
    #[serde(default = "default_enforcement_action")]
    pub enforcement_action: String,
    /// Present only when `enforcementAction == "scoped"` is meaningful.
    #[serde(default)]
    pub scoped_enforcement_actions: Option<Vec<ScopedEnforcementAction>>,
}

fn default_match() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_parameters() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_enforcement_action() -> String {
    DEFAULT_ENFORCEMENT_ACTION.to_owned()
}

/// A parameterized instance of a [`ConstraintTemplate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    /// Must equal [`CONSTRAINT_GROUP`].
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Must match the referenced template's `crdKind`.
    pub kind: String,
    /// Constraint metadata.
    pub metadata: ConstraintMetadata,
    /// Constraint spec.
    pub spec: ConstraintSpec,
}

impl Constraint {
    /// The constraint's `group`, parsed from `apiVersion` (`"group/version"`).
    #[must_use]
    pub fn group(&self) -> &str {
        self.api_version
            .split_once('/')
            .map_or(self.api_version.as_str(), |(group, _)| group)
    }

    /// The constraint's `version`, parsed from `apiVersion`, defaulting to
    /// [`DEFAULT_CONSTRAINT_VERSION`] when absent.
    #[must_use]
    pub fn version(&self) -> &str {
        self.api_version
            .split_once('/')
            .map_or(DEFAULT_CONSTRAINT_VERSION, |(_, version)| version)
    }

    /// The constraint's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns `spec.enforcementAction`, defaulting to `"deny"`.
    #[must_use]
    pub fn enforcement_action(&self) -> &str {
        &self.spec.enforcement_action
    }
}
