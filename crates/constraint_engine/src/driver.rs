// SPDX-License-Identifier: Apache-2.0

//! The driver capability (C4): a backend-neutral abstraction over a
//! policy-engine implementation, plus the reference `regorus`-backed
//! driver.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use constraint_external_data::{Gateway, ProviderResponseEnvelope};
use constraint_schema::ConstraintTemplate;
use serde_json::Value;

use crate::storage::InventoryStore;
use crate::violation::{AttributedViolation, Violation};
use crate::Error;

/// The result of querying a single constraint.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Violations attributed to the constraints that produced them.
    pub violations: Vec<AttributedViolation>,
    /// An engine-specific trace, for debugging; empty unless the driver
    /// supports tracing.
    pub trace: Vec<String>,
}

/// A policy-engine backend: compiles templates, holds constraint
/// parameters, and evaluates queries against a target's inventory.
///
/// Every operation is backend-neutral: policies travel as opaque source
/// plus the target's declared language, so a driver can self-select
/// whether it recognizes them.
pub trait Driver: Send + Sync {
    /// Compiles `template`'s policy source. Fails with
    /// `InvalidConstraintTemplate` on a compile error, a forbidden external
    /// data reference (unless allow-listed via `externs`), or a missing
    /// `violation` entry point.
    fn add_template(&self, template: &ConstraintTemplate) -> Result<(), Error>;

    /// Drops compiled artifacts and all constraint parameters stored under
    /// `kind`.
    fn remove_template(&self, kind: &str);

    /// Stores `parameters` under `constraints[kind][name]`. `parameters`
    /// must already have been validated against the template's schema by
    /// the caller; this only enforces that an object (possibly empty) is
    /// what gets stored.
    fn add_constraint(&self, kind: &str, name: &str, parameters: Value) -> Result<(), Error>;

    /// Drops a stored constraint. A no-op if it was never added.
    fn remove_constraint(&self, kind: &str, name: &str);

    /// Writes `value` at `inventory/<path>` for `target`.
    fn add_data(&self, target: &str, path: &str, value: Value) -> Result<(), Error>;

    /// Deletes the subtree at `path` for `target`. A missing path is a
    /// no-op.
    fn remove_data(&self, target: &str, path: &str) -> Result<(), Error>;

    /// Evaluates every named constraint of `kind` against `review`, with
    /// `data.inventory` bound to `target`'s store.
    fn query(
        &self,
        target: &str,
        kind: &str,
        constraint_names: &[String],
        review: &Value,
    ) -> Result<QueryOutcome, Error>;
}

struct CompiledTemplate {
    engine: regorus::Engine,
    /// The fully qualified rule path to evaluate for this template:
    /// `data.<package>.violation` when the source declares a `package`,
    /// `data.violation` otherwise.
    violation_rule: String,
}

/// The reference driver: one `regorus::Engine` per compiled template kind,
/// an in-memory parameter store per `(kind, name)`, and one transactional
/// [`InventoryStore`] per target.
pub struct RegorusDriver {
    compiled: RwLock<HashMap<String, CompiledTemplate>>,
    constraints: RwLock<HashMap<(String, String), Value>>,
    stores: RwLock<HashMap<String, Arc<InventoryStore>>>,
    external_data: Option<Arc<Gateway>>,
    allowed_externs: HashSet<String>,
}

impl RegorusDriver {
    /// Builds a driver with no external-data gateway wired in and an empty
    /// externs allow-list; any template calling the `external_data` built-in
    /// fails `AddTemplate` with `InvalidConstraintTemplate`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            compiled: RwLock::new(HashMap::new()),
            constraints: RwLock::new(HashMap::new()),
            stores: RwLock::new(HashMap::new()),
            external_data: None,
            allowed_externs: HashSet::new(),
        }
    }

    /// Builds a driver whose policies may call out to `gateway` for
    /// external data, still subject to an empty externs allow-list. Use
    /// [`RegorusDriver::with_config`] to allow specific providers.
    #[must_use]
    pub fn with_external_data(gateway: Arc<Gateway>) -> Self {
        Self {
            compiled: RwLock::new(HashMap::new()),
            constraints: RwLock::new(HashMap::new()),
            stores: RwLock::new(HashMap::new()),
            external_data: Some(gateway),
            allowed_externs: HashSet::new(),
        }
    }

    /// Builds a fully configured driver: an optional external-data gateway
    /// plus the set of provider names templates are allowed to reference
    /// via the `external_data` built-in.
    ///
    /// # Errors
    /// Returns [`Error::CreatingDriver`] if `allowed_externs` contains an
    /// empty provider name.
    pub fn with_config(
        gateway: Option<Arc<Gateway>>,
        allowed_externs: HashSet<String>,
    ) -> Result<Self, Error> {
        if allowed_externs.iter().any(|name| name.trim().is_empty()) {
            return Err(Error::CreatingDriver {
                reason: "externs allow-list entries must not be empty".to_owned(),
            });
        }
        Ok(Self {
            compiled: RwLock::new(HashMap::new()),
            constraints: RwLock::new(HashMap::new()),
            stores: RwLock::new(HashMap::new()),
            external_data: gateway,
            allowed_externs,
        })
    }

    /// The external-data gateway configured via
    /// [`RegorusDriver::with_external_data`] or [`RegorusDriver::with_config`],
    /// if any.
    ///
    /// Every compiled template's engine has `external_data` registered as a
    /// live built-in (see [`external_data_extension`]) that calls through to
    /// this gateway mid-evaluation; this accessor exists for callers that
    /// want to drive the gateway directly (for example, to pre-warm its
    /// cache via `add_data` before a query runs).
    #[must_use]
    pub fn external_data(&self) -> Option<&Arc<Gateway>> {
        self.external_data.as_ref()
    }

    /// Builds the `data.constraints[<kind>][<name>]` document from the
    /// current constraint registry.
    fn constraints_tree(&self) -> Value {
        let constraints = self.constraints.read().expect("constraint registry lock poisoned");
        let mut by_kind: serde_json::Map<String, Value> = serde_json::Map::new();
        for ((kind, name), parameters) in constraints.iter() {
            by_kind
                .entry(kind.clone())
                .or_insert_with(|| Value::Object(serde_json::Map::new()))
                .as_object_mut()
                .expect("inserted as object above")
                .insert(name.clone(), parameters.clone());
        }
        Value::Object(by_kind)
    }

    fn store_for(&self, target: &str) -> Arc<InventoryStore> {
        if let Some(store) = self.stores.read().expect("store registry lock poisoned").get(target)
        {
            return Arc::clone(store);
        }
        let mut stores = self.stores.write().expect("store registry lock poisoned");
        Arc::clone(
            stores
                .entry(target.to_owned())
                .or_insert_with(|| Arc::new(InventoryStore::new())),
        )
    }

    fn build_engine(
        template: &ConstraintTemplate,
        allowed_externs: &HashSet<String>,
        external_data: Option<Arc<Gateway>>,
    ) -> Result<CompiledTemplate, Error> {
        let Some(target) = template.targets.first() else {
            return Err(Error::InvalidConstraintTemplate {
                name: template.crd_kind.clone(),
                reason: "template must declare exactly one target".to_owned(),
            });
        };

        if !has_violation_rule(&target.code) {
            return Err(Error::InvalidConstraintTemplate {
                name: template.crd_kind.clone(),
                reason: "policy source has no `violation` entry point".to_owned(),
            });
        }

        validate_externs(&target.code, allowed_externs).map_err(|reason| {
            Error::InvalidConstraintTemplate {
                name: template.crd_kind.clone(),
                reason,
            }
        })?;

        let mut engine = regorus::Engine::new();
        engine
            .add_extension(
                "external_data".to_owned(),
                1,
                external_data_extension(external_data),
            )
            .map_err(|e| Error::InvalidConstraintTemplate {
                name: template.crd_kind.clone(),
                reason: format!("failed to register external_data built-in: {e}"),
            })?;
        engine
            .add_policy(format!("{}.rego", template.name), target.code.clone())
            .map_err(|e| Error::InvalidConstraintTemplate {
                name: template.crd_kind.clone(),
                reason: e.to_string(),
            })?;
        for (i, lib) in target.libs.iter().enumerate() {
            engine
                .add_policy(format!("{}.lib{i}.rego", template.name), lib.clone())
                .map_err(|e| Error::InvalidConstraintTemplate {
                    name: template.crd_kind.clone(),
                    reason: e.to_string(),
                })?;
        }

        Ok(CompiledTemplate {
            engine,
            violation_rule: violation_rule_path(&target.code),
        })
    }
}

/// Builds the `external_data` built-in body: it decodes its single object
/// argument into `{provider, keys}`, calls `gateway.fetch`, and converts the
/// resulting envelope back into a `regorus::Value` so its `system_error` or
/// per-item `error` fields are visible to the calling policy rather than
/// aborting evaluation. With no gateway configured, every call resolves to a
/// system-error envelope instead of failing the query.
fn external_data_extension(
    gateway: Option<Arc<Gateway>>,
) -> Box<dyn Fn(Vec<regorus::Value>) -> anyhow::Result<regorus::Value> + Send + Sync> {
    Box::new(move |params: Vec<regorus::Value>| -> anyhow::Result<regorus::Value> {
        let request = params
            .first()
            .ok_or_else(|| anyhow::anyhow!("external_data expects a single object argument"))?;
        let request: Value = serde_json::to_value(request).map_err(|e| {
            anyhow::anyhow!("external_data argument is not representable as JSON: {e}")
        })?;

        let provider = request
            .get("provider")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("external_data argument must have a string 'provider' key"))?;
        let keys: Vec<String> = request
            .get("keys")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(|k| k.as_str().map(str::to_owned)).collect())
            .unwrap_or_default();

        let envelope = match &gateway {
            Some(gateway) => gateway.fetch(provider, &keys),
            None => ProviderResponseEnvelope::system_error(
                "no external-data gateway is configured on this driver".to_owned(),
            ),
        };

        let envelope = serde_json::to_value(&envelope)
            .map_err(|e| anyhow::anyhow!("failed to encode external_data response: {e}"))?;
        serde_json::from_value(envelope).map_err(|e| {
            anyhow::anyhow!("failed to convert external_data response for policy evaluation: {e}")
        })
    })
}

impl Default for RegorusDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// A template's policy source must define a `violation` rule; `regorus`'s
/// own compiler rejects unresolvable references, so this is a cheap
/// textual pre-check rather than a full parse.
fn has_violation_rule(rego_source: &str) -> bool {
    rego_source
        .lines()
        .map(str::trim_start)
        .any(|line| line.starts_with("violation"))
}

/// Extracts the name declared by a `package <name>` line, if any. A cheap
/// textual scan, same rationale as [`has_violation_rule`].
fn extract_package(rego_source: &str) -> Option<String> {
    rego_source
        .lines()
        .map(str::trim_start)
        .find_map(|line| line.strip_prefix("package "))
        .map(|rest| rest.trim().to_owned())
}

/// The rule path `query` must evaluate for this source: `data.violation`
/// when it declares no package, `data.<package>.violation` when it does.
/// Getting this wrong silently produces zero violations for any packaged
/// template, since `eval_rule` on an undefined path just evaluates to
/// `Undefined` rather than failing.
fn violation_rule_path(rego_source: &str) -> String {
    match extract_package(rego_source) {
        Some(package) => format!("data.{package}.violation"),
        None => "data.violation".to_owned(),
    }
}

/// Rejects policy source that calls the `external_data` built-in for a
/// provider outside `allowed_externs`. Provider names are pulled out with a
/// cheap textual scan for `"provider": "<name>"` rather than a full parse,
/// since a template with a forbidden extern is rejected outright anyway.
fn validate_externs(rego_source: &str, allowed_externs: &HashSet<String>) -> Result<(), String> {
    if !rego_source.contains("external_data(") {
        return Ok(());
    }

    let providers = referenced_providers(rego_source);
    if providers.is_empty() {
        return Err(
            "template calls external_data but no provider name could be determined".to_owned(),
        );
    }
    for provider in &providers {
        if !allowed_externs.contains(provider) {
            return Err(format!(
                "template references external data provider '{provider}' which is not in the externs allow-list"
            ));
        }
    }
    Ok(())
}

/// Extracts `"provider": "<name>"` string literals from Rego source.
fn referenced_providers(rego_source: &str) -> Vec<String> {
    const MARKER: &str = "\"provider\"";
    let mut out = Vec::new();
    let mut rest = rego_source;
    while let Some(marker_idx) = rest.find(MARKER) {
        rest = &rest[marker_idx + MARKER.len()..];
        let Some(colon_idx) = rest.find(':') else {
            break;
        };
        let after_colon = &rest[colon_idx + 1..];
        let Some(open_quote) = after_colon.find('"') else {
            continue;
        };
        let after_open = &after_colon[open_quote + 1..];
        let Some(close_quote) = after_open.find('"') else {
            continue;
        };
        out.push(after_open[..close_quote].to_owned());
        rest = &after_open[close_quote + 1..];
    }
    out
}

impl Driver for RegorusDriver {
    fn add_template(&self, template: &ConstraintTemplate) -> Result<(), Error> {
        let compiled =
            Self::build_engine(template, &self.allowed_externs, self.external_data.clone())?;
        let mut compiled_templates = self.compiled.write().expect("compiled registry lock poisoned");
        let _ = compiled_templates.insert(template.crd_kind.clone(), compiled);
        Ok(())
    }

    fn remove_template(&self, kind: &str) {
        let mut compiled = self.compiled.write().expect("compiled registry lock poisoned");
        let _ = compiled.remove(kind);
        let mut constraints = self.constraints.write().expect("constraint registry lock poisoned");
        constraints.retain(|(k, _), _| k != kind);
    }

    fn add_constraint(&self, kind: &str, name: &str, parameters: Value) -> Result<(), Error> {
        if !parameters.is_object() {
            return Err(Error::InvalidConstraint {
                name: name.to_owned(),
                reason: "spec.parameters must be an object".to_owned(),
            });
        }
        let mut constraints = self.constraints.write().expect("constraint registry lock poisoned");
        let _ = constraints.insert((kind.to_owned(), name.to_owned()), parameters);
        Ok(())
    }

    fn remove_constraint(&self, kind: &str, name: &str) {
        let mut constraints = self.constraints.write().expect("constraint registry lock poisoned");
        let _ = constraints.remove(&(kind.to_owned(), name.to_owned()));
    }

    fn add_data(&self, target: &str, path: &str, value: Value) -> Result<(), Error> {
        self.store_for(target).add_data(target, path, value)
    }

    fn remove_data(&self, target: &str, path: &str) -> Result<(), Error> {
        self.store_for(target).remove_data(target, path)
    }

    fn query(
        &self,
        target: &str,
        kind: &str,
        constraint_names: &[String],
        review: &Value,
    ) -> Result<QueryOutcome, Error> {
        let inventory = self.store_for(target).snapshot(target)?;

        let mut outcome = QueryOutcome {
            violations: Vec::new(),
            trace: Vec::new(),
        };

        for name in constraint_names {
            let parameters = {
                let constraints = self.constraints.read().expect("constraint registry lock poisoned");
                match constraints.get(&(kind.to_owned(), name.clone())) {
                    Some(parameters) => parameters.clone(),
                    None => continue,
                }
            };

            let mut compiled = self.compiled.write().expect("compiled registry lock poisoned");
            let Some(compiled_template) = compiled.get_mut(kind) else {
                return Err(Error::InvalidConstraintTemplate {
                    name: kind.to_owned(),
                    reason: "no compiled template for kind".to_owned(),
                });
            };

            let input = serde_json::json!({ "review": review, "parameters": parameters });
            let input_value: regorus::Value =
                serde_json::from_value(input).map_err(|e| Error::Read {
                    target: target.to_owned(),
                    reason: format!("failed to build policy input: {e}"),
                })?;
            compiled_template.engine.set_input(input_value);

            let data = serde_json::json!({
                "inventory": inventory,
                "constraints": self.constraints_tree(),
            });
            let data_value: regorus::Value = serde_json::from_value(data).map_err(|e| Error::Read {
                target: target.to_owned(),
                reason: format!("failed to bind inventory and constraint data: {e}"),
            })?;
            compiled_template.engine.add_data(data_value).map_err(|e| Error::Read {
                target: target.to_owned(),
                reason: e.to_string(),
            })?;

            let result = compiled_template
                .engine
                .eval_rule(compiled_template.violation_rule.clone())
                .map_err(|e| Error::Read {
                    target: target.to_owned(),
                    reason: format!("policy evaluation failed: {e}"),
                })?;

            compiled_template.engine.clear_data();

            let json_result = serde_json::to_value(&result).map_err(|e| Error::Read {
                target: target.to_owned(),
                reason: format!("failed to decode policy result: {e}"),
            })?;

            let violations: Vec<Violation> = match json_result {
                Value::Null => Vec::new(),
                other => serde_json::from_value(other).map_err(|e| Error::Read {
                    target: target.to_owned(),
                    reason: format!("violation rule produced an unexpected shape: {e}"),
                })?,
            };

            outcome
                .violations
                .extend(violations.into_iter().map(|violation| AttributedViolation {
                    constraint_name: name.clone(),
                    constraint_kind: kind.to_owned(),
                    violation,
                }));
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constraint_schema::model::TargetEntry;

    fn template(code: &str) -> ConstraintTemplate {
        ConstraintTemplate {
            name: "k8srequiredlabels".to_owned(),
            crd_kind: "K8sRequiredLabels".to_owned(),
            parameter_schema: None,
            targets: vec![TargetEntry {
                target: "admission.k8s.gatekeeper.sh".to_owned(),
                code: code.to_owned(),
                libs: Vec::new(),
                operations: Vec::new(),
            }],
            labels: Default::default(),
        }
    }

    #[test]
    fn add_template_rejects_missing_violation_entry_point() {
        let driver = RegorusDriver::new();
        let err = driver
            .add_template(&template("package play\nallow { true }"))
            .expect_err("template without violation rule must be rejected");
        assert!(matches!(err, Error::InvalidConstraintTemplate { .. }));
    }

    #[test]
    fn add_template_rejects_wrong_target_count() {
        let driver = RegorusDriver::new();
        let mut t = template("violation[{\"msg\": \"no\"}] { false }");
        t.targets.clear();
        let err = driver
            .add_template(&t)
            .expect_err("zero targets must be rejected");
        assert!(matches!(err, Error::InvalidConstraintTemplate { .. }));
    }

    #[test]
    fn add_constraint_rejects_non_object_parameters() {
        let driver = RegorusDriver::new();
        let err = driver
            .add_constraint("K8sRequiredLabels", "must-have-team", serde_json::json!("oops"))
            .expect_err("non-object parameters must be rejected");
        assert!(matches!(err, Error::InvalidConstraint { .. }));
    }

    #[test]
    fn remove_template_drops_its_constraints() {
        let driver = RegorusDriver::new();
        driver
            .add_template(&template("violation[{\"msg\": \"no\"}] { false }"))
            .unwrap();
        driver
            .add_constraint("K8sRequiredLabels", "must-have-team", serde_json::json!({}))
            .unwrap();
        driver.remove_template("K8sRequiredLabels");
        assert!(driver
            .constraints
            .read()
            .unwrap()
            .get(&("K8sRequiredLabels".to_owned(), "must-have-team".to_owned()))
            .is_none());
    }

    #[test]
    fn with_config_rejects_empty_extern_names() {
        let err = RegorusDriver::with_config(None, HashSet::from(["".to_owned()]))
            .expect_err("empty extern name must be rejected");
        assert!(matches!(err, Error::CreatingDriver { .. }));
    }

    #[test]
    fn add_template_rejects_extern_outside_allow_list() {
        let driver = RegorusDriver::with_config(None, HashSet::new()).unwrap();
        let code = "violation[{\"msg\": msg}] {\n  resp := external_data({\"provider\": \"sizes\", \"keys\": [input.review.name]})\n  msg := resp\n}";
        let err = driver
            .add_template(&template(code))
            .expect_err("extern outside the allow-list must be rejected");
        assert!(matches!(err, Error::InvalidConstraintTemplate { .. }));
    }

    #[test]
    fn add_template_allows_extern_inside_allow_list() {
        let driver =
            RegorusDriver::with_config(None, HashSet::from(["sizes".to_owned()])).unwrap();
        let code = "violation[{\"msg\": msg}] {\n  resp := external_data({\"provider\": \"sizes\", \"keys\": [input.review.name]})\n  msg := resp\n}";
        assert!(driver.add_template(&template(code)).is_ok());
    }

    #[test]
    fn query_resolves_violations_under_a_declared_package() {
        let driver = RegorusDriver::new();
        let code = "package play\n\nviolation[{\"msg\": \"always fails\"}] { true }";
        driver.add_template(&template(code)).unwrap();
        driver
            .add_constraint("K8sRequiredLabels", "always-fails", serde_json::json!({}))
            .unwrap();

        let outcome = driver
            .query(
                "admission.k8s.gatekeeper.sh",
                "K8sRequiredLabels",
                &["always-fails".to_owned()],
                &serde_json::json!({}),
            )
            .unwrap();

        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].violation.msg, "always fails");
    }

    #[test]
    fn query_resolves_external_data_mid_evaluation() {
        use constraint_common::NullLogger;
        use constraint_external_data::{ExternalDataProvider, Gateway};

        let gateway = Arc::new(Gateway::new(Box::new(NullLogger::default())));
        gateway.add_provider(ExternalDataProvider {
            name: "sizes".to_owned(),
            url: "https://127.0.0.1:0/resolve".to_owned(),
            timeout_seconds: 1,
            ca_bundle_base64: String::new(),
            client_cert_base64: None,
        });

        let driver =
            RegorusDriver::with_config(Some(gateway), HashSet::from(["sizes".to_owned()]))
                .unwrap();
        let code = "package team_sizes\n\nviolation[{\"msg\": msg}] {\n  resp := external_data({\"provider\": \"sizes\", \"keys\": [input.review.name]})\n  msg := resp.response.system_error\n}";
        driver.add_template(&template(code)).unwrap();
        driver
            .add_constraint("K8sRequiredLabels", "team-sizes", serde_json::json!({}))
            .unwrap();

        // The provider is unreachable, so the built-in must still resolve
        // (not fail the query) and surface the gateway's system error into
        // the violation produced by the policy.
        let outcome = driver
            .query(
                "admission.k8s.gatekeeper.sh",
                "K8sRequiredLabels",
                &["team-sizes".to_owned()],
                &serde_json::json!({"name": "web"}),
            )
            .unwrap();

        assert_eq!(outcome.violations.len(), 1);
        assert!(!outcome.violations[0].violation.msg.is_empty());
    }

    #[test]
    fn query_against_an_uncompiled_kind_fails_cleanly() {
        let driver = RegorusDriver::new();
        driver
            .add_data(
                "admission.k8s.gatekeeper.sh",
                "/pods/default/web",
                serde_json::json!({"labels": {"team": "x"}}),
            )
            .unwrap();
        driver
            .add_constraint("K8sRequiredLabels", "must-have-team", serde_json::json!({}))
            .unwrap();

        // A store is created lazily and is queryable even with no compiled
        // template for the kind used in the query — the driver should
        // surface that as an `InvalidConstraintTemplate`, not panic.
        let err = driver
            .query(
                "admission.k8s.gatekeeper.sh",
                "K8sRequiredLabels",
                &["must-have-team".to_owned()],
                &serde_json::json!({}),
            )
            .expect_err("querying an uncompiled kind must fail cleanly");
        assert!(matches!(err, Error::InvalidConstraintTemplate { .. }));
    }
}
