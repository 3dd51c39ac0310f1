// SPDX-License-Identifier: Apache-2.0

//! The shapes [`crate::Client::review`] accepts and returns: caller options,
//! per-target responses, and enforcement-action-resolved violations.

use std::collections::{BTreeMap, BTreeSet};

use constraint_engine::AttributedViolation;
use constraint_schema::enforcement::{get_enforcement_actions_for_ep, is_scoped};
use constraint_schema::Constraint;
use serde_json::Value;

use crate::Error;

/// Caller-supplied context for a [`crate::Client::review`] call.
#[derive(Debug, Clone, Default)]
pub struct ReviewOptions {
    /// The enforcement point consulting this review, e.g.
    /// `"validation.gatekeeper.sh"`. Required to resolve a `"scoped"`
    /// constraint's action; ignored otherwise. The core does not hard-code
    /// any enforcement-point name (see the design notes' open question on
    /// `WebhookEnforcementPoint`).
    pub enforcement_point: Option<String>,
    /// The admission operation this review represents, e.g. `"CREATE"`.
    /// Used to apply a template's per-target `operations` filter (§4.7).
    /// `None` behaves like an operation every template's filter accepts.
    pub operation: Option<String>,
}

/// One violation, enriched with the resource a target resolved it against
/// and the action set that applies at the caller's enforcement point.
#[derive(Debug, Clone)]
pub struct ResolvedViolation {
    /// The raw violation and the constraint that produced it.
    pub violation: AttributedViolation,
    /// The resource [`constraint_target::TargetHandler::handle_violation`]
    /// attached, for reporting.
    pub resource: Value,
    /// The action set that applies at the caller's enforcement point. Empty
    /// when a `"scoped"` constraint had no entry for that point.
    pub actions: BTreeSet<String>,
    /// Set when resolving `actions` failed (e.g. a `"scoped"` constraint but
    /// no enforcement point was supplied); `actions` is empty in that case.
    pub action_error: Option<String>,
}

/// One target's contribution to a [`Responses`].
#[derive(Debug, Clone, Default)]
pub struct TargetResponse {
    /// Whether this target produced a decision. `false` when the target
    /// declined the review object entirely, or when its query failed.
    pub handled: bool,
    /// Violations this target's constraints raised against the review.
    pub violations: Vec<ResolvedViolation>,
    /// Set when the target's query failed; `violations` is empty in that
    /// case. A failing target never aborts the whole review (§7).
    pub error: Option<String>,
}

/// The merged result of a [`crate::Client::review`] call: one
/// [`TargetResponse`] per target that was asked to evaluate the review.
#[derive(Debug, Clone, Default)]
pub struct Responses {
    /// Responses keyed by target name.
    pub by_target: BTreeMap<String, TargetResponse>,
}

impl Responses {
    /// The set of targets that produced a decision (§4.7's "Handled" set):
    /// those whose [`TargetResponse::handled`] is `true`.
    #[must_use]
    pub fn handled(&self) -> BTreeSet<String> {
        self.by_target
            .iter()
            .filter(|(_, response)| response.handled)
            .map(|(target, _)| target.clone())
            .collect()
    }

    /// All violations across every target, flattened.
    #[must_use]
    pub fn violations(&self) -> Vec<&ResolvedViolation> {
        self.by_target
            .values()
            .flat_map(|response| response.violations.iter())
            .collect()
    }
}

/// Resolves the action set a constraint's violation triggers at the
/// caller-supplied enforcement point (§4.1, §4.7).
///
/// A non-`"scoped"` `enforcementAction` always resolves to the singleton
/// set containing that action, regardless of `enforcement_point`. A
/// `"scoped"` action requires an enforcement point; its absence surfaces as
/// `action_error` rather than aborting the whole review, since one
/// violation's unresolved action must not hide the rest.
pub(crate) fn resolve_actions(
    constraint: &Constraint,
    enforcement_point: Option<&str>,
) -> (BTreeSet<String>, Option<String>) {
    let action = constraint.enforcement_action();
    if !is_scoped(action) {
        return (BTreeSet::from([action.to_owned()]), None);
    }

    let Some(ep) = enforcement_point else {
        return (
            BTreeSet::new(),
            Some(Error::MissingRequiredField {
                field: "enforcementPoint".to_owned(),
            }
            .to_string()),
        );
    };

    let eps = vec![ep.to_owned()];
    match get_enforcement_actions_for_ep(constraint, &eps) {
        Ok(mut map) => (map.remove(ep).unwrap_or_default(), None),
        Err(e) => (BTreeSet::new(), Some(e.to_string())),
    }
}

/// Whether a template's declared `operations` list accepts `operation`.
///
/// Empty/absent means every operation is accepted; `"*"` is an explicit
/// wildcard; `operation = None` (the caller did not say) is accepted by
/// every template regardless of what it declares.
pub(crate) fn operation_allowed(declared: &[String], operation: Option<&str>) -> bool {
    if declared.is_empty() {
        return true;
    }
    let Some(operation) = operation else {
        return true;
    };
    declared.iter().any(|op| op == "*" || op == operation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use constraint_schema::model::{
        Constraint, ConstraintMetadata, ConstraintSpec, EnforcementPointRef,
        ScopedEnforcementAction,
    };
    use serde_json::json;

    fn constraint(action: &str, scoped: Option<Vec<ScopedEnforcementAction>>) -> Constraint {
        Constraint {
            api_version: "constraints.gatekeeper.sh/v1beta1".to_owned(),
            kind: "K8sRequiredLabels".to_owned(),
            metadata: ConstraintMetadata {
                name: "must-have-team".to_owned(),
            },
            spec: ConstraintSpec {
                r#match: json!({}),
                parameters: json!({}),
                enforcement_action: action.to_owned(),
                scoped_enforcement_actions: scoped,
            },
        }
    }

    #[test]
    fn non_scoped_action_ignores_enforcement_point() {
        let c = constraint("deny", None);
        let (actions, err) = resolve_actions(&c, None);
        assert_eq!(actions, BTreeSet::from(["deny".to_owned()]));
        assert!(err.is_none());
    }

    #[test]
    fn scoped_action_without_enforcement_point_is_an_error() {
        let c = constraint("scoped", Some(vec![]));
        let (actions, err) = resolve_actions(&c, None);
        assert!(actions.is_empty());
        assert!(err.is_some());
    }

    #[test]
    fn scoped_action_resolves_against_the_given_point() {
        let c = constraint(
            "scoped",
            Some(vec![ScopedEnforcementAction {
                action: "warn".to_owned(),
                enforcement_points: vec![EnforcementPointRef {
                    name: "audit.gatekeeper.sh".to_owned(),
                }],
            }]),
        );
        let (actions, err) = resolve_actions(&c, Some("audit.gatekeeper.sh"));
        assert_eq!(actions, BTreeSet::from(["warn".to_owned()]));
        assert!(err.is_none());
    }

    #[test]
    fn empty_operations_list_allows_everything() {
        assert!(operation_allowed(&[], Some("CREATE")));
        assert!(operation_allowed(&[], None));
    }

    #[test]
    fn wildcard_operation_allows_everything() {
        assert!(operation_allowed(&["*".to_owned()], Some("DELETE")));
    }

    #[test]
    fn declared_operations_only_allow_listed_ones() {
        let declared = vec!["CREATE".to_owned()];
        assert!(operation_allowed(&declared, Some("CREATE")));
        assert!(!operation_allowed(&declared, Some("UPDATE")));
    }
}
