// SPDX-License-Identifier: Apache-2.0

//! Dynamic schema synthesis and constraint validation (C2, C3).
//!
//! A [`model::ConstraintTemplate`] is only known at `AddTemplate` time, so
//! the structural schema constraining its instances has to be built
//! in-memory rather than generated ahead of time. [`synthesize_schema`]
//! builds that schema; [`validate::validate_constraint`] checks a constraint
//! instance against it using the `jsonschema` crate as the structural-schema
//! collaborator referenced in the constraint framework's design.

pub mod enforcement;
pub mod error;
pub mod model;
pub mod synthesize;
pub mod validate;

pub use enforcement::{get_enforcement_action, get_enforcement_actions_for_ep, is_scoped};
pub use error::Error;
pub use model::{Constraint, ConstraintTemplate, TargetEntry};
pub use synthesize::synthesize_schema;
pub use validate::{compile, validate_constraint, validate_constraint_value};
