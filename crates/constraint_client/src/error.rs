// SPDX-License-Identifier: Apache-2.0

//! Errors raised by the orchestrator: every error from its collaborators
//! bubbles up wrapped once with a context string, plus a handful of
//! registry-consistency errors of its own.

use constraint_common::error::{format_errors, WeaverError};

/// Error kinds raised by [`crate::Client`].
#[derive(thiserror::Error, Debug, Clone)]
#[must_use]
#[non_exhaustive]
pub enum Error {
    /// `AddConstraint`/`RemoveConstraint` named a `kind` with no registered
    /// template (violates invariant I1: every constraint has exactly one
    /// owning template).
    #[error("no template registered for kind '{kind}'")]
    UnknownKind {
        /// The constraint's `kind`.
        kind: String,
    },

    /// A template named a target with no registered [`constraint_target::TargetHandler`].
    #[error("no target handler registered for '{target}'")]
    UnknownTarget {
        /// The target name the template declared.
        target: String,
    },

    /// Schema synthesis, compilation, or driver seeding failed while adding
    /// or updating a template.
    #[error("invalid constraint template '{name}': {reason}")]
    InvalidConstraintTemplate {
        /// The template's `crdKind`.
        name: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Schema validation, group/version/kind checks, or a target's
    /// business-rule check rejected a constraint.
    #[error("invalid constraint '{name}': {reason}")]
    InvalidConstraint {
        /// The constraint's `metadata.name`.
        name: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A field required to resolve enforcement actions was absent.
    #[error("missing required field '{field}'")]
    MissingRequiredField {
        /// The missing field's path.
        field: String,
    },

    /// The underlying driver reported a failure compiling, storing, or
    /// querying.
    #[error("driver error: {0}")]
    Driver(#[from] constraint_engine::Error),

    /// A container for multiple errors.
    #[error("{}", format_errors(.0))]
    CompoundError(Vec<Error>),
}

impl WeaverError<Error> for Error {
    fn compound(errors: Vec<Error>) -> Error {
        Error::CompoundError(
            errors
                .into_iter()
                .flat_map(|e| match e {
                    Error::CompoundError(errors) => errors,
                    e => vec![e],
                })
                .collect(),
        )
    }
}

impl From<constraint_schema::Error> for Error {
    fn from(error: constraint_schema::Error) -> Self {
        match error {
            constraint_schema::Error::InvalidConstraintTemplate { reason } => {
                Error::InvalidConstraintTemplate {
                    name: String::new(),
                    reason,
                }
            }
            constraint_schema::Error::InvalidConstraint { reason }
            | constraint_schema::Error::SchemaValidation { reason } => Error::InvalidConstraint {
                name: String::new(),
                reason,
            },
            constraint_schema::Error::MissingRequiredField { field } => {
                Error::MissingRequiredField { field }
            }
            constraint_schema::Error::CompoundError(errors) => {
                Error::CompoundError(errors.into_iter().map(Error::from).collect())
            }
        }
    }
}

impl From<constraint_target::Error> for Error {
    fn from(error: constraint_target::Error) -> Self {
        match error {
            constraint_target::Error::MalformedObject { reason } => Error::InvalidConstraint {
                name: String::new(),
                reason,
            },
            constraint_target::Error::InvalidConstraint { reason } => Error::InvalidConstraint {
                name: String::new(),
                reason,
            },
            constraint_target::Error::CompoundError(errors) => {
                Error::CompoundError(errors.into_iter().map(Error::from).collect())
            }
        }
    }
}
