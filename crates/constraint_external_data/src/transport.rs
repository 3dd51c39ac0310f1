// SPDX-License-Identifier: Apache-2.0

//! Per-provider HTTPS client construction.
//!
//! Every provider carries its own CA bundle (and, optionally, its own
//! client certificate for mutual TLS), so the `rustls::ClientConfig` is
//! built fresh per request rather than shared across providers. This
//! follows the certificate-loading shape in `knhk-sidecar`'s TLS module,
//! adapted from file paths to the base64-encoded PEM blobs a provider
//! registration carries, and narrowed to the client side.

use std::collections::HashMap;
use std::io::BufReader;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};

use crate::error::Error;
use crate::model::ExternalDataProvider;

/// Per-host cap on pooled idle keep-alive connections, matching §4.5's
/// `maxIdleConnsPerHost`.
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 100;

/// How long a built agent (and the connections it has pooled) may sit idle
/// before it is discarded and rebuilt, matching §4.5's `idleConnTimeout`.
const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(90);

/// Builds a `ureq::Agent` configured for TLS 1.3-only, with the provider's
/// CA bundle as the sole trust root and, if configured, a client
/// certificate presented for mutual TLS.
pub fn build_agent(provider: &ExternalDataProvider) -> Result<ureq::Agent, Error> {
    if !provider.url.starts_with("https://") {
        return Err(Error::InvalidTlsConfig {
            provider: provider.name.clone(),
            reason: "provider url must use https".to_owned(),
        });
    }

    let client_config = build_client_config(provider)?;

    let agent = ureq::AgentBuilder::new()
        .tls_config(Arc::new(client_config))
        .timeout(Duration::from_secs(provider.timeout_seconds))
        .max_idle_connections_per_host(MAX_IDLE_CONNECTIONS_PER_HOST)
        .build();
    Ok(agent)
}

/// Caches one [`ureq::Agent`] per provider so its pooled connections survive
/// across calls instead of being torn down and rebuilt on every request;
/// an entry is rebuilt once it has sat idle longer than
/// [`IDLE_CONNECTION_TIMEOUT`].
pub struct AgentPool {
    agents: RwLock<HashMap<String, (ureq::Agent, Instant)>>,
}

impl AgentPool {
    /// Builds an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached agent for `provider` if it was built within
    /// [`IDLE_CONNECTION_TIMEOUT`], building and caching a fresh one
    /// otherwise.
    pub fn get_or_build(&self, provider: &ExternalDataProvider) -> Result<ureq::Agent, Error> {
        {
            let agents = self.agents.read().expect("agent pool lock poisoned");
            if let Some((agent, built_at)) = agents.get(&provider.name) {
                if built_at.elapsed() < IDLE_CONNECTION_TIMEOUT {
                    return Ok(agent.clone());
                }
            }
        }

        let agent = build_agent(provider)?;
        let mut agents = self.agents.write().expect("agent pool lock poisoned");
        let _ = agents.insert(provider.name.clone(), (agent.clone(), Instant::now()));
        Ok(agent)
    }
}

impl Default for AgentPool {
    fn default() -> Self {
        Self::new()
    }
}

fn build_client_config(provider: &ExternalDataProvider) -> Result<ClientConfig, Error> {
    let ca_pem = BASE64
        .decode(&provider.ca_bundle_base64)
        .map_err(|e| Error::InvalidTlsConfig {
            provider: provider.name.clone(),
            reason: format!("ca bundle is not valid base64: {e}"),
        })?;

    let mut root_store = RootCertStore::empty();
    let mut ca_reader = BufReader::new(ca_pem.as_slice());
    let ca_certs: Vec<CertificateDer> = rustls_pemfile::certs(&mut ca_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::InvalidTlsConfig {
            provider: provider.name.clone(),
            reason: format!("ca bundle is not valid PEM: {e}"),
        })?;
    for cert in ca_certs {
        root_store
            .add(cert)
            .map_err(|e| Error::InvalidTlsConfig {
                provider: provider.name.clone(),
                reason: format!("failed to trust ca certificate: {e}"),
            })?;
    }

    let builder = ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
        .with_root_certificates(root_store);

    let client_config = match &provider.client_cert_base64 {
        Some(client_cert) => {
            let (cert_chain, key) = load_client_identity(&provider.name, client_cert)?;
            builder
                .with_client_auth_cert(cert_chain, key)
                .map_err(|e| Error::InvalidTlsConfig {
                    provider: provider.name.clone(),
                    reason: format!("failed to attach client certificate: {e}"),
                })?
        }
        None => builder.with_no_client_auth(),
    };

    Ok(client_config)
}

fn load_client_identity(
    provider_name: &str,
    client_cert: &crate::model::ClientCertificate,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), Error> {
    let cert_pem = BASE64
        .decode(&client_cert.cert_base64)
        .map_err(|e| Error::InvalidTlsConfig {
            provider: provider_name.to_owned(),
            reason: format!("client cert is not valid base64: {e}"),
        })?;
    let key_pem = BASE64
        .decode(&client_cert.key_base64)
        .map_err(|e| Error::InvalidTlsConfig {
            provider: provider_name.to_owned(),
            reason: format!("client key is not valid base64: {e}"),
        })?;

    let mut cert_reader = BufReader::new(cert_pem.as_slice());
    let cert_chain: Vec<CertificateDer> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::InvalidTlsConfig {
            provider: provider_name.to_owned(),
            reason: format!("client cert is not valid PEM: {e}"),
        })?;

    let mut key_reader = BufReader::new(key_pem.as_slice());
    let mut keys: Vec<PrivateKeyDer> = rustls_pemfile::pkcs8_private_keys(&mut key_reader)
        .map(|key| key.map(PrivateKeyDer::Pkcs8))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::InvalidTlsConfig {
            provider: provider_name.to_owned(),
            reason: format!("client key is not valid PEM: {e}"),
        })?;

    if keys.is_empty() {
        return Err(Error::InvalidTlsConfig {
            provider: provider_name.to_owned(),
            reason: "no private key found for client certificate".to_owned(),
        });
    }

    Ok((cert_chain, keys.remove(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExternalDataProvider;

    #[test]
    fn rejects_non_https_url() {
        let provider = ExternalDataProvider {
            name: "p".to_owned(),
            url: "http://example.com".to_owned(),
            timeout_seconds: 5,
            ca_bundle_base64: String::new(),
            client_cert_base64: None,
        };
        let err = build_agent(&provider).expect_err("non-https url must be rejected");
        assert!(matches!(err, Error::InvalidTlsConfig { .. }));
    }

    #[test]
    fn rejects_invalid_ca_bundle() {
        let provider = ExternalDataProvider {
            name: "p".to_owned(),
            url: "https://example.com".to_owned(),
            timeout_seconds: 5,
            ca_bundle_base64: "not-base64!!!".to_owned(),
            client_cert_base64: None,
        };
        let err = build_agent(&provider).expect_err("invalid ca bundle must be rejected");
        assert!(matches!(err, Error::InvalidTlsConfig { .. }));
    }
}
