// SPDX-License-Identifier: Apache-2.0

//! The external-data gateway: the collaborator policy evaluation calls out
//! to in order to resolve `externalData` lookups against a registered
//! provider, with caching and idempotency aggregation in front of the
//! network call.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use constraint_common::Logger;

use crate::cache::ResponseCache;
use crate::error::Error;
use crate::model::{
    CacheEntry, ExternalDataProvider, ProviderItem, ProviderResponseEnvelope,
};
use crate::transport::AgentPool;

/// Default time-to-live for cached provider responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Resolves `externalData` lookups against registered providers, caching
/// responses for [`DEFAULT_CACHE_TTL`] and aggregating idempotency across
/// cache hits and fresh fetches.
pub struct Gateway {
    providers: RwLock<HashMap<String, ExternalDataProvider>>,
    cache: ResponseCache,
    agents: AgentPool,
    logger: Box<dyn Logger>,
}

impl Gateway {
    /// Builds a gateway with no registered providers and the default cache
    /// TTL.
    #[must_use]
    pub fn new(logger: Box<dyn Logger>) -> Self {
        Self::with_ttl(logger, DEFAULT_CACHE_TTL)
    }

    /// Builds a gateway with an explicit cache TTL, for tests that need to
    /// observe expiry quickly.
    #[must_use]
    pub fn with_ttl(logger: Box<dyn Logger>, ttl: Duration) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            cache: ResponseCache::new(ttl),
            agents: AgentPool::new(),
            logger,
        }
    }

    /// Registers or replaces a provider.
    pub fn add_provider(&self, provider: ExternalDataProvider) {
        let mut providers = self.providers.write().expect("provider registry lock poisoned");
        let _ = providers.insert(provider.name.clone(), provider);
    }

    /// Removes a provider registration. A no-op if the name is unknown.
    pub fn remove_provider(&self, name: &str) {
        let mut providers = self.providers.write().expect("provider registry lock poisoned");
        let _ = providers.remove(name);
    }

    /// Resolves `keys` against `provider_name`, serving cache hits and
    /// calling the provider only for misses.
    ///
    /// Idempotency on the returned envelope is the logical AND across every
    /// contributing response, cached or fresh: a single non-idempotent
    /// contributor makes the whole batch non-idempotent, since policy
    /// evaluation cannot tell which item a cache hit came from.
    pub fn fetch(&self, provider_name: &str, keys: &[String]) -> ProviderResponseEnvelope {
        let provider = {
            let providers = self.providers.read().expect("provider registry lock poisoned");
            providers.get(provider_name).cloned()
        };
        let Some(provider) = provider else {
            return ProviderResponseEnvelope::system_error(format!(
                "unknown external data provider: {provider_name}"
            ));
        };

        let (hits, misses) = self.cache.partition(provider_name, keys);

        let mut items: Vec<ProviderItem> = Vec::with_capacity(keys.len());
        let mut idempotent = true;

        for (key, entry) in &hits {
            idempotent &= entry.idempotent;
            items.push(ProviderItem {
                key: (*key).to_owned(),
                value: entry.value.clone(),
                error: entry.error.clone(),
            });
        }

        if !misses.is_empty() {
            match self.call_provider(&provider, &misses) {
                Ok((fresh_items, fresh_idempotent)) => {
                    idempotent &= fresh_idempotent;
                    for item in fresh_items {
                        self.cache.put(
                            provider_name,
                            &item.key,
                            CacheEntry {
                                value: item.value.clone(),
                                error: item.error.clone(),
                                received_at: Instant::now(),
                                idempotent: fresh_idempotent,
                            },
                        );
                        items.push(item);
                    }
                }
                Err(err) => {
                    self.logger.error(&format!(
                        "external data provider {provider_name} request failed: {err}"
                    ));
                    return ProviderResponseEnvelope::system_error(err.to_string());
                }
            }
        }

        ProviderResponseEnvelope::ok(items, idempotent)
    }

    fn call_provider(
        &self,
        provider: &ExternalDataProvider,
        keys: &[&str],
    ) -> Result<(Vec<ProviderItem>, bool), Error> {
        let agent = self.agents.get_or_build(provider)?;

        #[derive(serde::Serialize)]
        struct RequestBody<'a> {
            #[serde(rename = "apiVersion")]
            api_version: &'static str,
            kind: &'static str,
            request: RequestEnvelope<'a>,
        }

        #[derive(serde::Serialize)]
        struct RequestEnvelope<'a> {
            keys: &'a [&'a str],
        }

        let body = RequestBody {
            api_version: crate::model::PROVIDER_RESPONSE_API_VERSION,
            kind: "ProviderRequest",
            request: RequestEnvelope { keys },
        };

        let response = agent
            .post(&provider.url)
            .send_json(serde_json::to_value(&body).map_err(|e| Error::Transport {
                provider: provider.name.clone(),
                reason: format!("failed to encode request: {e}"),
            })?)
            .map_err(|e| Error::Transport {
                provider: provider.name.clone(),
                reason: e.to_string(),
            })?;

        let envelope: ProviderResponseEnvelope =
            response.into_json().map_err(|e| Error::Transport {
                provider: provider.name.clone(),
                reason: format!("failed to decode response: {e}"),
            })?;

        if let Some(system_error) = envelope.response.system_error {
            return Err(Error::Transport {
                provider: provider.name.clone(),
                reason: system_error,
            });
        }

        Ok((envelope.response.items, envelope.response.idempotent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constraint_common::NullLogger;

    fn provider(name: &str) -> ExternalDataProvider {
        ExternalDataProvider {
            name: name.to_owned(),
            url: "https://127.0.0.1:0/resolve".to_owned(),
            timeout_seconds: 1,
            ca_bundle_base64: String::new(),
            client_cert_base64: None,
        }
    }

    #[test]
    fn unknown_provider_is_a_system_error() {
        let gateway = Gateway::new(Box::new(NullLogger::default()));
        let envelope = gateway.fetch("missing", &["k1".to_owned()]);
        assert!(envelope.response.system_error.is_some());
        assert!(!envelope.response.idempotent);
    }

    #[test]
    fn cache_hits_are_served_without_calling_the_provider() {
        let gateway = Gateway::new(Box::new(NullLogger::default()));
        gateway.add_provider(provider("p"));
        gateway.cache.put(
            "p",
            "k1",
            CacheEntry {
                value: Some(serde_json::json!("cached")),
                error: None,
                received_at: Instant::now(),
                idempotent: true,
            },
        );

        let envelope = gateway.fetch("p", &["k1".to_owned()]);
        assert!(envelope.response.system_error.is_none());
        assert_eq!(envelope.response.items.len(), 1);
        assert_eq!(envelope.response.items[0].value, Some(serde_json::json!("cached")));
        assert!(envelope.response.idempotent);
    }

    #[test]
    fn a_single_non_idempotent_hit_makes_the_batch_non_idempotent() {
        let gateway = Gateway::new(Box::new(NullLogger::default()));
        gateway.add_provider(provider("p"));
        gateway.cache.put(
            "p",
            "k1",
            CacheEntry {
                value: Some(serde_json::json!("v1")),
                error: None,
                received_at: Instant::now(),
                idempotent: true,
            },
        );
        gateway.cache.put(
            "p",
            "k2",
            CacheEntry {
                value: Some(serde_json::json!("v2")),
                error: None,
                received_at: Instant::now(),
                idempotent: false,
            },
        );

        let envelope = gateway.fetch("p", &["k1".to_owned(), "k2".to_owned()]);
        assert!(!envelope.response.idempotent);
    }

    #[test]
    fn remove_provider_forgets_registration() {
        let gateway = Gateway::new(Box::new(NullLogger::default()));
        gateway.add_provider(provider("p"));
        gateway.remove_provider("p");
        let envelope = gateway.fetch("p", &["k1".to_owned()]);
        assert!(envelope.response.system_error.is_some());
    }
}
