// SPDX-License-Identifier: Apache-2.0

//! Errors raised while discovering or parsing project configuration.

use constraint_common::error::{format_errors, WeaverError};

/// Error kinds raised by [`crate::load`] and [`crate::discover`].
#[derive(thiserror::Error, Debug, Clone)]
#[must_use]
#[non_exhaustive]
pub enum Error {
    /// The configuration file could not be read from disk.
    #[error("failed to read config file '{path}': {reason}")]
    Read {
        /// The path that could not be read.
        path: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The configuration file's contents are not valid YAML for
    /// [`crate::ClientConfig`].
    #[error("failed to parse config file '{path}': {reason}")]
    Parse {
        /// The path whose contents failed to parse.
        path: String,
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
