// SPDX-License-Identifier: Apache-2.0

//! Errors raised while resolving providers or talking to them over TLS.

use constraint_common::error::{format_errors, WeaverError};

/// Error kinds raised by the external-data gateway.
#[derive(thiserror::Error, Debug, Clone)]
#[must_use]
#[non_exhaustive]
pub enum Error {
    /// No provider is registered under the requested name.
    #[error("unknown external data provider: {name}")]
    UnknownProvider {
        /// The name the caller asked for.
        name: String,
    },

    /// The provider's `url` is not `https://`, or the CA bundle / client
    /// certificate could not be decoded or parsed.
    #[error("invalid TLS configuration for provider {provider}: {reason}")]
    InvalidTlsConfig {
        /// The provider this configuration belongs to.
        provider: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The HTTPS request to the provider failed (connect, timeout, non-2xx,
    /// or undecodable body).
    #[error("request to provider {provider} failed: {reason}")]
    Transport {
        /// The provider this request targeted.
        provider: String,
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
