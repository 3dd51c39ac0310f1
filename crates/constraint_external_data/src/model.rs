// SPDX-License-Identifier: Apache-2.0

//! Wire types for the external-data provider protocol (§6 of the design):
//! the provider registration record, the response envelope policies see,
//! and the cache entry shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `apiVersion` carried by every [`ProviderResponseEnvelope`].
pub const PROVIDER_RESPONSE_API_VERSION: &str = "externaldata.gatekeeper.sh/v1beta1";

/// `kind` carried by every [`ProviderResponseEnvelope`].
pub const PROVIDER_RESPONSE_KIND: &str = "ProviderResponse";

/// A registered external-data provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalDataProvider {
    /// Unique provider name, referenced from policy as `providerName`.
    pub name: String,
    /// Must be an `https://` URL.
    pub url: String,
    /// Request timeout, in seconds.
    pub timeout_seconds: u64,
    /// Base64-encoded PEM CA bundle trusted for this provider's TLS chain.
    pub ca_bundle_base64: String,
    /// Optional base64-encoded PEM client certificate + key, presented to
    /// the provider for mutual TLS.
    #[serde(default)]
    pub client_cert_base64: Option<ClientCertificate>,
}

/// A PEM-encoded client certificate and private key, base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCertificate {
    /// Base64-encoded PEM certificate chain.
    pub cert_base64: String,
    /// Base64-encoded PEM private key.
    pub key_base64: String,
}

/// One item in a provider response: either a resolved `value` or an `error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderItem {
    /// The key this item answers.
    pub key: String,
    /// The resolved value, when the provider could answer the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// A per-item error message, when the provider could not answer the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The `response` body of a [`ProviderResponseEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderResponseBody {
    /// True only when every contributing response (cached and remote) was
    /// idempotent.
    pub idempotent: bool,
    /// The collected items, cache hits and fresh fetches merged.
    pub items: Vec<ProviderItem>,
    /// Set when the gateway itself failed (unknown provider, TLS
    /// misconfiguration, transport failure) rather than the provider
    /// answering per-item errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_error: Option<String>,
}

/// The envelope returned to policy evaluation by the external-data gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponseEnvelope {
    /// Always [`PROVIDER_RESPONSE_API_VERSION`].
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Always [`PROVIDER_RESPONSE_KIND`].
    pub kind: String,
    /// The response body.
    pub response: ProviderResponseBody,
}

impl ProviderResponseEnvelope {
    /// Builds an envelope carrying a gateway-level system error (provider
    /// not found, TLS misconfiguration, ...). Never idempotent.
    #[must_use]
    pub fn system_error(message: impl Into<String>) -> Self {
        Self {
            api_version: PROVIDER_RESPONSE_API_VERSION.to_owned(),
            kind: PROVIDER_RESPONSE_KIND.to_owned(),
            response: ProviderResponseBody {
                idempotent: false,
                items: Vec::new(),
                system_error: Some(message.into()),
            },
        }
    }

    /// Builds a successful envelope from collected items and the aggregate
    /// idempotency bit.
    #[must_use]
    pub fn ok(items: Vec<ProviderItem>, idempotent: bool) -> Self {
        Self {
            api_version: PROVIDER_RESPONSE_API_VERSION.to_owned(),
            kind: PROVIDER_RESPONSE_KIND.to_owned(),
            response: ProviderResponseBody {
                idempotent,
                items,
                system_error: None,
            },
        }
    }
}

/// A cached answer for `(provider, key)`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The resolved value, if any.
    pub value: Option<Value>,
    /// The per-item error, if any.
    pub error: Option<String>,
    /// Wall-clock time the entry was written, used against the cache TTL.
    pub received_at: std::time::Instant,
    /// Whether the response this entry came from was idempotent.
    pub idempotent: bool,
}
