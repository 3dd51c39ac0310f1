// SPDX-License-Identifier: Apache-2.0

//! Errors raised while a target handler processes inventory objects,
//! reviews, or constraint instances.

use constraint_common::error::{format_errors, WeaverError};

/// Error kinds raised by a [`crate::TargetHandler`] implementation.
#[derive(thiserror::Error, Debug, Clone)]
#[must_use]
#[non_exhaustive]
pub enum Error {
    /// The object handed to `process_data` or `handle_review` could not be
    /// interpreted as this target's review/inventory shape.
    #[error("malformed object for target: {reason}")]
    MalformedObject {
        /// Human-readable reason.
        reason: String,
    },

    /// A target-specific business rule rejected a constraint's `spec.match`
    /// beyond what the schema already checked.
    #[error("invalid constraint: {reason}")]
    InvalidConstraint {
        /// Human-readable reason.
        reason: String,
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
