// SPDX-License-Identifier: Apache-2.0

//! The client/orchestrator: the registry of templates, constraints, and
//! targets that every other component in this workspace is built to serve.
//! [`Client`] is the one type most callers construct directly; everything
//! else (schema synthesis, the driver, target handlers, the external-data
//! gateway) is a collaborator it calls into.
//!
//! Concurrency discipline: a single reader/writer lock guards the
//! template and constraint registries. [`Client::review`], [`Client::add_data`]
//! and [`Client::remove_data`] are readers; [`Client::add_template`],
//! [`Client::remove_template`], [`Client::add_constraint`],
//! [`Client::add_constraint_value`] and [`Client::remove_constraint`] are
//! writers that hold the lock for their whole operation so a concurrent
//! reader only ever observes the pre- or post-write snapshot, never a
//! partial one.

pub mod error;
pub mod review;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use constraint_common::error::handle_errors;
use constraint_engine::Driver;
use constraint_schema::{compile, synthesize_schema, validate_constraint, Constraint, ConstraintTemplate};
use constraint_target::TargetHandler;
use jsonschema::JSONSchema;
use serde_json::Value;

pub use error::Error;
pub use review::{ResolvedViolation, Responses, ReviewOptions, TargetResponse};

/// A template plus the bookkeeping [`Client`] derives from it once
/// [`Client::add_template`] has accepted it: the target it is bound to, its
/// per-target operation filter, and the compiled structural schema every
/// instance of it must satisfy.
///
/// Kept immutable for as long as the template is registered: the only way
/// to change any of this is to call `add_template` again with the same
/// name, which replaces the entry wholesale.
struct StoredTemplate {
    crd_kind: String,
    target_name: String,
    operations: Vec<String>,
    compiled_schema: JSONSchema,
}

/// The mutable state a single reader/writer lock protects.
#[derive(Default)]
struct Registries {
    /// Keyed by template name (globally unique).
    templates: HashMap<String, StoredTemplate>,
    /// `constraints[kind][name]`.
    constraints: HashMap<String, HashMap<String, Constraint>>,
}

/// Registry of templates, constraints, and targets; routes reviews to
/// target handlers and merges their responses (C7).
///
/// `Client` does not own a driver implementation: it is handed one
/// (typically a [`constraint_engine::RegorusDriver`] wrapped in an `Arc`)
/// and a fixed set of [`TargetHandler`]s at construction. Targets are not
/// registered dynamically after that — the orchestrator dispatches to them
/// by name lookup, never by type introspection (§9's "target
/// polymorphism" design note).
pub struct Client {
    driver: Arc<dyn Driver>,
    targets: HashMap<String, Arc<dyn TargetHandler>>,
    known_constraint_versions: Vec<String>,
    registries: RwLock<Registries>,
}

impl Client {
    /// Builds a client with the driver's and every target's defaults:
    /// known constraint versions fall back to the driver-neutral defaults
    /// documented on [`constraint_schema::validate::compile`]'s caller,
    /// `v1beta1` and `v1`.
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, targets: Vec<Arc<dyn TargetHandler>>) -> Self {
        Self::with_known_versions(driver, targets, Vec::new())
    }

    /// Builds a client that additionally recognizes `known_versions` as
    /// valid constraint `apiVersion` versions, on top of the built-in
    /// defaults used when this list is empty.
    #[must_use]
    pub fn with_known_versions(
        driver: Arc<dyn Driver>,
        targets: Vec<Arc<dyn TargetHandler>>,
        known_versions: Vec<String>,
    ) -> Self {
        let targets = targets
            .into_iter()
            .map(|handler| (handler.name().to_owned(), handler))
            .collect();
        Self {
            driver,
            targets,
            known_constraint_versions: known_versions,
            registries: RwLock::new(Registries::default()),
        }
    }

    /// The names of every target registered with this client.
    #[must_use]
    pub fn target_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.targets.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a template of this name is currently registered.
    #[must_use]
    pub fn has_template(&self, name: &str) -> bool {
        self.registries
            .read()
            .expect("registries lock poisoned")
            .templates
            .contains_key(name)
    }

    /// Whether a constraint of `(kind, name)` is currently registered.
    #[must_use]
    pub fn has_constraint(&self, kind: &str, name: &str) -> bool {
        self.registries
            .read()
            .expect("registries lock poisoned")
            .constraints
            .get(kind)
            .is_some_and(|byname| byname.contains_key(name))
    }

    /// Registers or replaces `template` (C7's `AddTemplate`).
    ///
    /// Validates it has exactly one target naming a registered
    /// [`TargetHandler`], synthesizes its structural schema (C2) from that
    /// target's match-schema, seeds the driver (C4), and only then makes
    /// the template visible to readers. Re-adding a name already
    /// registered is an update: it is fully re-validated and re-seeded,
    /// but any constraints already stored under its `crdKind` are left in
    /// place (they are only dropped by an explicit `remove_template`).
    ///
    /// # Errors
    /// [`Error::InvalidConstraintTemplate`] if `template.targets` does not
    /// have exactly one entry or schema synthesis otherwise rejects it;
    /// [`Error::UnknownTarget`] if its target names no registered handler;
    /// [`Error::Driver`] if the driver fails to compile it.
    pub fn add_template(&self, template: ConstraintTemplate) -> Result<(), Error> {
        if template.targets.len() != 1 {
            return Err(Error::InvalidConstraintTemplate {
                name: template.crd_kind.clone(),
                reason: format!(
                    "exactly one target is required, got {}",
                    template.targets.len()
                ),
            });
        }
        let target_entry = template.targets[0].clone();
        let handler = self
            .targets
            .get(&target_entry.target)
            .cloned()
            .ok_or_else(|| Error::UnknownTarget {
                target: target_entry.target.clone(),
            })?;

        let match_schema = handler.match_schema();
        let schema = synthesize_schema(&template, match_schema.as_ref())
            .map_err(|e| invalid_template(template.crd_kind.clone(), e))?;
        let compiled_schema =
            compile(&schema).map_err(|e| invalid_template(template.crd_kind.clone(), e))?;

        self.driver.add_template(&template).map_err(Error::Driver)?;

        let mut registries = self.registries.write().expect("registries lock poisoned");
        let _ = registries.templates.insert(
            template.name.clone(),
            StoredTemplate {
                crd_kind: template.crd_kind,
                target_name: target_entry.target,
                operations: target_entry.operations,
                compiled_schema,
            },
        );
        Ok(())
    }

    /// Removes the template named `name`, dropping every constraint stored
    /// under its `crdKind` first, since a constraint cannot outlive its
    /// template. A no-op if no template of that name is registered.
    ///
    /// Holds the write lock across the whole operation, so a concurrent
    /// `review` call never observes a constraint whose template has
    /// already been removed from the driver but not yet from the registry,
    /// or vice versa.
    pub fn remove_template(&self, name: &str) {
        let mut registries = self.registries.write().expect("registries lock poisoned");
        let Some(stored) = registries.templates.remove(name) else {
            return;
        };
        let _ = registries.constraints.remove(&stored.crd_kind);
        self.driver.remove_template(&stored.crd_kind);
    }

    /// Adds or replaces `constraint` (C7's `AddConstraint`).
    ///
    /// Looks up the template owning `constraint.kind`, validates the
    /// constraint against its synthesized schema and the target's own
    /// `validate_constraint` business rule, seeds the driver, and only then
    /// stores it. Held as a single write-locked operation so a concurrent
    /// `remove_template` cannot remove the owning template in the middle of
    /// it.
    ///
    /// # Errors
    /// [`Error::UnknownKind`] if no template declares `constraint.kind` as
    /// its `crdKind`; [`Error::InvalidConstraint`] if schema or
    /// target-level validation rejects it; [`Error::Driver`] if the driver
    /// refuses to store it.
    pub fn add_constraint(&self, constraint: Constraint) -> Result<(), Error> {
        let mut registries = self.registries.write().expect("registries lock poisoned");

        let stored = registries
            .templates
            .values()
            .find(|t| t.crd_kind == constraint.kind)
            .ok_or_else(|| Error::UnknownKind {
                kind: constraint.kind.clone(),
            })?;

        validate_constraint(
            &constraint,
            &stored.crd_kind,
            &self.known_constraint_versions,
            &stored.compiled_schema,
        )
        .map_err(|e| invalid_constraint(constraint.name().to_owned(), e))?;

        self.store_validated_constraint(&mut registries, constraint)
    }

    /// Adds or replaces a constraint parsed from a raw JSON object (C7's
    /// `AddConstraint`, admitting a wire-shaped object rather than an
    /// already-typed [`Constraint`]).
    ///
    /// Unlike [`Client::add_constraint`], this validates `value` against the
    /// synthesized schema *before* deserializing it into a [`Constraint`],
    /// so an unknown top-level field under `spec` is caught by the schema's
    /// `additionalProperties: false` strictness rather than silently dropped
    /// by typed deserialization. Use this for constraints coming from the
    /// wire (a CRD apply, a CLI file, an admission request); use
    /// [`Client::add_constraint`] for one already built in memory.
    ///
    /// # Errors
    /// [`Error::InvalidConstraint`] if `value.kind` is missing or not a
    /// string; [`Error::UnknownKind`] if no template declares that kind as
    /// its `crdKind`; [`Error::InvalidConstraint`] if schema or
    /// target-level validation rejects it; [`Error::Driver`] if the driver
    /// refuses to store it.
    pub fn add_constraint_value(&self, value: Value) -> Result<(), Error> {
        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidConstraint {
                name: String::new(),
                reason: "constraint object is missing a string 'kind' field".to_owned(),
            })?
            .to_owned();

        let mut registries = self.registries.write().expect("registries lock poisoned");

        let stored = registries
            .templates
            .values()
            .find(|t| t.crd_kind == kind)
            .ok_or_else(|| Error::UnknownKind { kind: kind.clone() })?;

        let constraint = constraint_schema::validate_constraint_value(
            &value,
            &stored.crd_kind,
            &self.known_constraint_versions,
            &stored.compiled_schema,
        )
        .map_err(|e| invalid_constraint(String::new(), e))?;

        self.store_validated_constraint(&mut registries, constraint)
    }

    /// Runs the target business-rule check, seeds the driver, and stores
    /// `constraint`, which has already passed schema and identity
    /// validation against its owning template.
    fn store_validated_constraint(
        &self,
        registries: &mut Registries,
        constraint: Constraint,
    ) -> Result<(), Error> {
        let stored = registries
            .templates
            .values()
            .find(|t| t.crd_kind == constraint.kind)
            .ok_or_else(|| Error::UnknownKind {
                kind: constraint.kind.clone(),
            })?;
        let crd_kind = stored.crd_kind.clone();
        let target_name = stored.target_name.clone();

        let handler = self
            .targets
            .get(&target_name)
            .expect("a stored template's target was resolved at add_template time")
            .clone();
        handler
            .validate_constraint(&constraint)
            .map_err(|e| invalid_constraint_from_target(constraint.name().to_owned(), e))?;

        self.driver
            .add_constraint(&crd_kind, constraint.name(), constraint.spec.parameters.clone())
            .map_err(Error::Driver)?;

        let _ = registries
            .constraints
            .entry(crd_kind)
            .or_default()
            .insert(constraint.name().to_owned(), constraint);
        Ok(())
    }

    /// Removes the constraint `(kind, name)`. A no-op if it was never
    /// added, matching the driver's own `RemoveConstraint` contract.
    pub fn remove_constraint(&self, kind: &str, name: &str) {
        self.driver.remove_constraint(kind, name);
        let mut registries = self.registries.write().expect("registries lock poisoned");
        if let Some(by_name) = registries.constraints.get_mut(kind) {
            let _ = by_name.remove(name);
        }
    }

    /// Feeds `obj` through every target's [`TargetHandler::process_data`],
    /// writing whatever each target recognizes into the driver's
    /// per-target inventory store. Targets that decline `obj` are silently
    /// skipped; a target that recognizes it but fails to normalize it, or
    /// whose driver write fails, contributes an error to the returned
    /// compound without blocking the other targets (§7).
    ///
    /// A reader per §5: it never touches the template/constraint
    /// registries, only the driver's per-target storage, which has its own
    /// locking discipline (C8).
    ///
    /// # Errors
    /// A [`Error::CompoundError`] of every per-target failure, if any.
    pub fn add_data(&self, obj: &Value) -> Result<(), Error> {
        let mut errors = Vec::new();
        for handler in self.targets.values() {
            match handler.process_data(obj) {
                Ok(Some((path, canonical))) => {
                    if let Err(e) = self.driver.add_data(handler.name(), &path, canonical) {
                        errors.push(Error::Driver(e));
                    }
                }
                Ok(None) => {}
                Err(e) => errors.push(Error::from(e)),
            }
        }
        handle_errors(errors)
    }

    /// Deletes the subtree at `path` from `target`'s inventory store. A
    /// missing path is a no-op, per the driver's own contract.
    ///
    /// # Errors
    /// [`Error::UnknownTarget`] if `target` names no registered handler;
    /// [`Error::Driver`] if the storage backend itself fails.
    pub fn remove_data(&self, target: &str, path: &str) -> Result<(), Error> {
        if !self.targets.contains_key(target) {
            return Err(Error::UnknownTarget {
                target: target.to_owned(),
            });
        }
        self.driver.remove_data(target, path).map_err(Error::Driver)
    }

    /// Runs `obj` through every registered target (C7's `Review`).
    ///
    /// For each target whose [`TargetHandler::handle_review`] recognizes
    /// `obj`, collects the constraints of every template bound to that
    /// target (honoring each template's per-target `operations` filter,
    /// §4.7), queries the driver once per matching template `crdKind`, and
    /// resolves each returned violation's enforcement-action set against
    /// `options.enforcement_point` (§4.1). A target that declines `obj`, or
    /// whose query fails, contributes `handled = false` to its response
    /// slot; other targets proceed regardless (§7 — `review` never panics
    /// on a single target's failure).
    ///
    /// A reader per §5: concurrent `review` calls proceed without blocking
    /// each other, and never observe a half-applied template or constraint
    /// mutation.
    #[must_use]
    pub fn review(&self, obj: &Value, options: &ReviewOptions) -> Responses {
        let registries = self.registries.read().expect("registries lock poisoned");
        let mut responses = Responses::default();

        let mut target_names: Vec<&String> = self.targets.keys().collect();
        target_names.sort();

        for target_name in target_names {
            let handler = &self.targets[target_name];

            let review_value = match handler.handle_review(obj) {
                Ok(Some(value)) => value,
                Ok(None) => {
                    let _ = responses
                        .by_target
                        .insert(target_name.clone(), TargetResponse::default());
                    continue;
                }
                Err(e) => {
                    let _ = responses.by_target.insert(
                        target_name.clone(),
                        TargetResponse {
                            handled: false,
                            violations: Vec::new(),
                            error: Some(e.to_string()),
                        },
                    );
                    continue;
                }
            };

            let mut target_response = TargetResponse {
                handled: true,
                violations: Vec::new(),
                error: None,
            };

            for stored in registries.templates.values() {
                if stored.target_name != *target_name {
                    continue;
                }
                if !review::operation_allowed(&stored.operations, options.operation.as_deref()) {
                    continue;
                }
                let Some(by_name) = registries.constraints.get(&stored.crd_kind) else {
                    continue;
                };
                if by_name.is_empty() {
                    continue;
                }
                let constraint_names: Vec<String> = by_name.keys().cloned().collect();

                match self
                    .driver
                    .query(target_name, &stored.crd_kind, &constraint_names, &review_value)
                {
                    Ok(outcome) => {
                        for violation in outcome.violations {
                            let Some(constraint) = by_name.get(&violation.constraint_name) else {
                                continue;
                            };
                            let resource = handler.handle_violation(&review_value, &violation);
                            let (actions, action_error) =
                                review::resolve_actions(constraint, options.enforcement_point.as_deref());
                            target_response.violations.push(ResolvedViolation {
                                violation,
                                resource,
                                actions,
                                action_error,
                            });
                        }
                    }
                    Err(e) => {
                        target_response.handled = false;
                        target_response.error = Some(e.to_string());
                        break;
                    }
                }
            }

            let _ = responses
                .by_target
                .insert(target_name.clone(), target_response);
        }

        responses
    }
}

fn invalid_template(name: String, error: constraint_schema::Error) -> Error {
    match error {
        constraint_schema::Error::InvalidConstraintTemplate { reason }
        | constraint_schema::Error::SchemaValidation { reason } => {
            Error::InvalidConstraintTemplate { name, reason }
        }
        constraint_schema::Error::InvalidConstraint { reason } => {
            Error::InvalidConstraintTemplate { name, reason }
        }
        constraint_schema::Error::MissingRequiredField { field } => {
            Error::MissingRequiredField { field }
        }
        constraint_schema::Error::CompoundError(errors) => Error::CompoundError(
            errors
                .into_iter()
                .map(|e| invalid_template(name.clone(), e))
                .collect(),
        ),
    }
}

fn invalid_constraint(name: String, error: constraint_schema::Error) -> Error {
    match error {
        constraint_schema::Error::InvalidConstraint { reason }
        | constraint_schema::Error::SchemaValidation { reason } => {
            Error::InvalidConstraint { name, reason }
        }
        constraint_schema::Error::InvalidConstraintTemplate { reason } => {
            Error::InvalidConstraint { name, reason }
        }
        constraint_schema::Error::MissingRequiredField { field } => {
            Error::MissingRequiredField { field }
        }
        constraint_schema::Error::CompoundError(errors) => Error::CompoundError(
            errors
                .into_iter()
                .map(|e| invalid_constraint(name.clone(), e))
                .collect(),
        ),
    }
}

fn invalid_constraint_from_target(name: String, error: constraint_target::Error) -> Error {
    match error {
        constraint_target::Error::InvalidConstraint { reason }
        | constraint_target::Error::MalformedObject { reason } => {
            Error::InvalidConstraint { name, reason }
        }
        constraint_target::Error::CompoundError(errors) => Error::CompoundError(
            errors
                .into_iter()
                .map(|e| invalid_constraint_from_target(name.clone(), e))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constraint_engine::RegorusDriver;
    use constraint_schema::model::TargetEntry;
    use constraint_target::KubernetesAdmissionTarget;
    use serde_json::json;

    fn client() -> Client {
        let driver = Arc::new(RegorusDriver::new());
        let target = Arc::new(KubernetesAdmissionTarget::new());
        Client::new(driver, vec![target])
    }

    fn template(crd_kind: &str, code: &str, operations: Vec<String>) -> ConstraintTemplate {
        ConstraintTemplate {
            name: crd_kind.to_lowercase(),
            crd_kind: crd_kind.to_owned(),
            parameter_schema: Some(json!({
                "type": "object",
                "properties": { "labels": { "type": "array", "items": { "type": "string" } } },
            })),
            targets: vec![TargetEntry {
                target: constraint_target::kubernetes::TARGET_NAME.to_owned(),
                code: code.to_owned(),
                libs: Vec::new(),
                operations,
            }],
            labels: Default::default(),
        }
    }

    fn required_labels_template(operations: Vec<String>) -> ConstraintTemplate {
        template(
            "K8sRequiredLabels",
            r#"violation[{"msg": msg}] {
	required := input.parameters.labels[_]
	provided := {label | input.review.metadata.labels[label]}
	not provided[required]
	msg := sprintf("missing required label %v", [required])
}
"#,
            operations,
        )
    }

    fn constraint(name: &str, kind: &str, labels: Vec<&str>) -> Constraint {
        use constraint_schema::model::{ConstraintMetadata, ConstraintSpec};
        Constraint {
            api_version: "constraints.gatekeeper.sh/v1beta1".to_owned(),
            kind: kind.to_owned(),
            metadata: ConstraintMetadata {
                name: name.to_owned(),
            },
            spec: ConstraintSpec {
                r#match: json!({}),
                parameters: json!({ "labels": labels }),
                enforcement_action: "deny".to_owned(),
                scoped_enforcement_actions: None,
            },
        }
    }

    #[test]
    fn add_template_rejects_unknown_target() {
        let client = client();
        let mut t = required_labels_template(vec![]);
        t.targets[0].target = "no.such.target".to_owned();
        let err = client
            .add_template(t)
            .expect_err("unknown target must be rejected");
        assert!(matches!(err, Error::UnknownTarget { .. }));
    }

    #[test]
    fn add_constraint_rejects_unknown_kind() {
        let client = client();
        let err = client
            .add_constraint(constraint("must-have-team", "K8sRequiredLabels", vec!["team"]))
            .expect_err("constraint for an unregistered kind must be rejected");
        assert!(matches!(err, Error::UnknownKind { .. }));
    }

    #[test]
    fn full_lifecycle_produces_a_violation_on_review() {
        let client = client();
        client
            .add_template(required_labels_template(vec![]))
            .expect("template should be accepted");
        client
            .add_constraint(constraint("must-have-team", "K8sRequiredLabels", vec!["team"]))
            .expect("constraint should validate");

        let pod = json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "web", "namespace": "default" },
        });
        let responses = client.review(&pod, &ReviewOptions::default());
        let target_response = &responses.by_target[constraint_target::kubernetes::TARGET_NAME];
        assert!(target_response.handled);
        assert_eq!(target_response.violations.len(), 1);
        assert_eq!(
            target_response.violations[0].actions,
            std::collections::BTreeSet::from(["deny".to_owned()])
        );
    }

    #[test]
    fn remove_template_drops_its_constraints_so_review_stops_reporting_them() {
        let client = client();
        client
            .add_template(required_labels_template(vec![]))
            .unwrap();
        client
            .add_constraint(constraint("must-have-team", "K8sRequiredLabels", vec!["team"]))
            .unwrap();
        client.remove_template("k8srequiredlabels");

        assert!(!client.has_template("k8srequiredlabels"));
        assert!(!client.has_constraint("K8sRequiredLabels", "must-have-team"));

        let pod = json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "web", "namespace": "default" },
        });
        let responses = client.review(&pod, &ReviewOptions::default());
        let target_response = &responses.by_target[constraint_target::kubernetes::TARGET_NAME];
        assert!(target_response.violations.is_empty());
    }

    #[test]
    fn operations_filter_skips_non_matching_admission_operations() {
        let client = client();
        client
            .add_template(required_labels_template(vec!["CREATE".to_owned()]))
            .unwrap();
        client
            .add_constraint(constraint("must-have-team", "K8sRequiredLabels", vec!["team"]))
            .unwrap();

        let pod = json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "web", "namespace": "default" },
        });

        let update_options = ReviewOptions {
            enforcement_point: None,
            operation: Some("UPDATE".to_owned()),
        };
        let responses = client.review(&pod, &update_options);
        assert!(responses.by_target[constraint_target::kubernetes::TARGET_NAME]
            .violations
            .is_empty());

        let create_options = ReviewOptions {
            enforcement_point: None,
            operation: Some("CREATE".to_owned()),
        };
        let responses = client.review(&pod, &create_options);
        assert_eq!(
            responses.by_target[constraint_target::kubernetes::TARGET_NAME]
                .violations
                .len(),
            1
        );
    }

    #[test]
    fn schema_rejection_refuses_add_constraint() {
        let client = client();
        client
            .add_template(required_labels_template(vec![]))
            .unwrap();

        // `metadata.name` carries a synthesized `maxLength: 63`; 64 'a's trips it.
        let mut bad = constraint("must-have-team", "K8sRequiredLabels", vec!["team"]);
        bad.metadata.name = "a".repeat(64);

        let err = client
            .add_constraint(bad)
            .expect_err("an over-length name must be rejected by the synthesized schema");
        assert!(matches!(err, Error::InvalidConstraint { .. }));
        assert!(!client.has_constraint("K8sRequiredLabels", &"a".repeat(64)));
    }

    #[test]
    fn add_constraint_value_rejects_unknown_spec_field_a_typed_constraint_would_hide() {
        let client = client();
        client
            .add_template(required_labels_template(vec![]))
            .unwrap();

        let mut value = serde_json::to_value(constraint(
            "must-have-team",
            "K8sRequiredLabels",
            vec!["team"],
        ))
        .unwrap();
        value["spec"]["randomField"] = json!("oops");

        let err = client
            .add_constraint_value(value)
            .expect_err("an unknown spec field must be rejected through the raw-value entry point");
        assert!(matches!(err, Error::InvalidConstraint { .. }));
        assert!(!client.has_constraint("K8sRequiredLabels", "must-have-team"));
    }

    #[test]
    fn add_constraint_value_accepts_a_well_formed_constraint() {
        let client = client();
        client
            .add_template(required_labels_template(vec![]))
            .unwrap();

        let value = serde_json::to_value(constraint(
            "must-have-team",
            "K8sRequiredLabels",
            vec!["team"],
        ))
        .unwrap();

        client
            .add_constraint_value(value)
            .expect("a well-formed constraint must be accepted");
        assert!(client.has_constraint("K8sRequiredLabels", "must-have-team"));
    }

    #[test]
    fn add_constraint_value_rejects_missing_kind_field() {
        let client = client();
        client
            .add_template(required_labels_template(vec![]))
            .unwrap();

        let err = client
            .add_constraint_value(json!({ "metadata": { "name": "x" } }))
            .expect_err("a constraint object with no 'kind' field must be rejected");
        assert!(matches!(err, Error::InvalidConstraint { .. }));
    }

    #[test]
    fn add_data_rejects_unhandled_objects_silently_and_errors_on_malformed_ones() {
        let client = client();
        // No `kind` at all: every target declines, no error.
        assert!(client.add_data(&json!({"foo": "bar"})).is_ok());

        // Looks k8s-shaped but missing metadata.name: the target errors.
        let err = client
            .add_data(&json!({"kind": "Pod", "metadata": {}}))
            .expect_err("malformed object must surface an error");
        assert!(matches!(err, Error::CompoundError(_)));
    }
}
