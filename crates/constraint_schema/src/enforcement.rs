// SPDX-License-Identifier: Apache-2.0

//! The enforcement-action resolver (C1): given a constraint and a list of
//! enforcement-point names, compute the set of actions that apply at each
//! point.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Constraint, WILDCARD_ENFORCEMENT_POINT};
use crate::Error;

/// Returns `true` iff `action == "scoped"`.
#[must_use]
pub fn is_scoped(action: &str) -> bool {
    action == crate::model::SCOPED_ENFORCEMENT_ACTION
}

/// Returns `constraint.spec.enforcementAction`, defaulting to `"deny"` when
/// absent (the type already applies that default on deserialization, so
/// this simply forwards it).
#[must_use]
pub fn get_enforcement_action(constraint: &Constraint) -> &str {
    constraint.enforcement_action()
}

/// Computes, for each requested enforcement point, the set of actions that
/// apply there.
///
/// Comparisons are case-sensitive: an enforcement-point name or action
/// string that differs only in case from what the constraint declares does
/// not match. The wildcard point `"*"` inside a `scopedEnforcementActions`
/// entry applies its action to every requested point regardless of what the
/// constraint's own `enforcementAction` is; entries naming a point outside
/// `eps` are ignored.
pub fn get_enforcement_actions_for_ep(
    constraint: &Constraint,
    eps: &[String],
) -> Result<BTreeMap<String, BTreeSet<String>>, Error> {
    let mut out: BTreeMap<String, BTreeSet<String>> =
        eps.iter().map(|ep| (ep.clone(), BTreeSet::new())).collect();

    let Some(scoped) = &constraint.spec.scoped_enforcement_actions else {
        return Err(Error::MissingRequiredField {
            field: "spec.scopedEnforcementActions".to_owned(),
        });
    };

    for entry in scoped {
        for point in &entry.enforcement_points {
            if point.name == WILDCARD_ENFORCEMENT_POINT {
                for actions in out.values_mut() {
                    let _ = actions.insert(entry.action.clone());
                }
            } else if let Some(actions) = out.get_mut(&point.name) {
                let _ = actions.insert(entry.action.clone());
            }
        }
    }

    Ok(out)
}
