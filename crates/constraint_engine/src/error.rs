// SPDX-License-Identifier: Apache-2.0

//! The stable error kinds raised by the driver and its storage layer.

use constraint_common::error::{format_errors, WeaverError};
use constraint_common::diagnostic::{DiagnosticMessage, DiagnosticMessages};
use miette::Diagnostic;
use serde::Serialize;

/// Error kinds raised while compiling templates, evaluating constraints, or
/// operating on a target's inventory store.
#[derive(thiserror::Error, Debug, Serialize, Diagnostic, Clone)]
#[must_use]
#[non_exhaustive]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Error {
    /// Schema, compilation, forbidden externs, or wrong target count.
    #[error("invalid constraint template '{name}': {reason}")]
    InvalidConstraintTemplate {
        /// The template's `crdKind`.
        name: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Schema violation, wrong group/version/kind, or `spec` not an object.
    #[error("invalid constraint '{name}': {reason}")]
    InvalidConstraint {
        /// The constraint's `metadata.name`.
        name: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A field required to perform the requested operation was absent, e.g.
    /// `scopedEnforcementActions` when resolving enforcement actions.
    #[error("missing required field '{field}'")]
    MissingRequiredField {
        /// The missing field's path.
        field: String,
    },

    /// Structural-schema rejection, e.g. an unknown field under a strict
    /// schema.
    #[error("schema validation failed: {reason}")]
    SchemaValidation {
        /// Combined validator error messages.
        reason: String,
    },

    /// A storage transaction could not be started, committed, or aborted.
    #[error("storage transaction failed for target '{target}': {reason}")]
    Transaction {
        /// The target whose store was affected.
        target: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A read against a target's inventory store failed.
    #[error("storage read failed for target '{target}': {reason}")]
    Read {
        /// The target whose store was affected.
        target: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A write against a target's inventory store failed, e.g. writing
    /// through a non-object intermediate node.
    #[error("storage write failed for target '{target}' at '{path}': {reason}")]
    Write {
        /// The target whose store was affected.
        target: String,
        /// The path the write was attempted at.
        path: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The driver could not be constructed from its `externs` configuration.
    #[error("failed to create driver: {reason}")]
    CreatingDriver {
        /// Human-readable reason.
        reason: String,
    },

    /// A provider lookup, TLS misconfiguration, or HTTP failure while
    /// resolving external data during policy evaluation.
    #[error("external data error: {reason}")]
    ExternalData {
        /// Human-readable reason.
        reason: String,
    },

    /// A container for multiple errors.
    #[error("{}", format_errors(.0))]
    CompoundError(Vec<Error>),
}

impl WeaverError<Error> for Error {
    fn compound(errors: Vec<Error>) -> Error {
        Self::CompoundError(
            errors
                .into_iter()
                .flat_map(|e| match e {
                    Self::CompoundError(errors) => errors,
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
            constraint_schema::Error::InvalidConstraint { reason } => Error::InvalidConstraint {
                name: String::new(),
                reason,
            },
            constraint_schema::Error::SchemaValidation { reason } => {
                Error::SchemaValidation { reason }
            }
            constraint_schema::Error::MissingRequiredField { field } => {
                Error::MissingRequiredField { field }
            }
            constraint_schema::Error::CompoundError(errors) => {
                Error::CompoundError(errors.into_iter().map(Error::from).collect())
            }
        }
    }
}

impl From<constraint_external_data::Error> for Error {
    fn from(error: constraint_external_data::Error) -> Self {
        Error::ExternalData {
            reason: error.to_string(),
        }
    }
}

impl From<Error> for DiagnosticMessages {
    fn from(error: Error) -> Self {
        DiagnosticMessages::new(match error {
            Error::CompoundError(errors) => errors
                .into_iter()
                .flat_map(|e| {
                    let diag_msgs: DiagnosticMessages = e.into();
                    diag_msgs.into_inner()
                })
                .collect(),
            _ => vec![DiagnosticMessage::new(error)],
        })
    }
}
