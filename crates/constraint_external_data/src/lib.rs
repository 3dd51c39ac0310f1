// SPDX-License-Identifier: Apache-2.0

//! The external-data gateway (C5): provider registration, a TTL-bounded
//! response cache, and per-provider HTTPS client construction over
//! `rustls`, so that policy evaluation can resolve `externalData` lookups
//! without re-establishing TLS trust on every call.

pub mod cache;
pub mod error;
pub mod gateway;
pub mod model;
pub mod transport;

pub use error::Error;
pub use gateway::{Gateway, DEFAULT_CACHE_TTL};
pub use model::{
    ClientCertificate, ExternalDataProvider, ProviderItem, ProviderResponseBody,
    ProviderResponseEnvelope,
};
