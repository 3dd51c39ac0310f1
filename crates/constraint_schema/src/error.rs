// SPDX-License-Identifier: Apache-2.0

//! Errors raised while synthesizing or validating structural schemas.

use constraint_common::error::{format_errors, WeaverError};

/// Error kinds raised by schema synthesis and constraint validation.
#[derive(thiserror::Error, Debug, Clone)]
#[must_use]
#[non_exhaustive]
pub enum Error {
    /// The template itself is malformed: wrong target count, empty/invalid
    /// `crdKind`, or an otherwise uncompilable template.
    #[error("invalid constraint template: {reason}")]
    InvalidConstraintTemplate {
        /// Human-readable reason.
        reason: String,
    },

    /// The constraint's group/version/kind does not match the expectations
    /// of the framework or its template.
    #[error("invalid constraint: {reason}")]
    InvalidConstraint {
        /// Human-readable reason.
        reason: String,
    },

    /// Structural-schema rejection, e.g. an unknown field under a strict
    /// (`additionalProperties: false`) schema.
    #[error("schema validation failed: {reason}")]
    SchemaValidation {
        /// Combined validator error messages.
        reason: String,
    },

    /// A field required to perform the requested operation was absent.
    #[error("missing required field '{field}'")]
    MissingRequiredField {
        /// The missing field's path.
        field: String,
    },

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
