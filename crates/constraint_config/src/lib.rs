// SPDX-License-Identifier: Apache-2.0

//! Project-level configuration for the constraint framework, discovered via
//! `.constraint-framework.yaml`.
//!
//! Discovery walks up from a starting directory, the way Weaver's own
//! `.weaver.toml` discovery does, but in YAML rather than TOML since the
//! constraint framework already carries `serde_yaml` for policy-adjacent
//! assets. Callers are free to skip discovery entirely and build a
//! [`ClientConfig`] in code.

pub mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use constraint_external_data::ExternalDataProvider;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use error::Error;

/// The filename discovery searches for.
pub const CONFIG_FILENAME: &str = ".constraint-framework.yaml";

/// Top-level configuration for a constraint-framework [`Client`](https://docs.rs/constraint_client)
/// and its driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ClientConfig {
    /// Provider names templates are allowed to reference via the
    /// `external_data` Rego built-in. A template referencing a provider
    /// outside this list fails `AddTemplate`.
    pub externs: Vec<String>,
    /// `version` strings a constraint's `apiVersion` may carry. Empty means
    /// the driver's built-in defaults (`v1beta1`, `v1`).
    pub known_constraint_versions: Vec<String>,
    /// External-data gateway configuration.
    pub external_data: ExternalDataConfig,
}

/// Configuration for the external-data gateway: its cache TTL and the
/// providers it should register at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ExternalDataConfig {
    /// How long a cached provider response stays fresh.
    pub cache_ttl_seconds: u64,
    /// Providers to register with the gateway at startup.
    pub providers: Vec<ProviderConfig>,
}

impl Default for ExternalDataConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 5 * 60,
            providers: Vec::new(),
        }
    }
}

impl ExternalDataConfig {
    /// The configured cache TTL as a [`Duration`].
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

/// The YAML-shaped counterpart of [`ExternalDataProvider`].
///
/// Kept as a distinct type (rather than deriving `JsonSchema` directly on
/// the wire type in `constraint_external_data`) so that crate stays free of
/// a `schemars` dependency it otherwise has no use for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ProviderConfig {
    /// Unique provider name, referenced from policy as `providerName`.
    pub name: String,
    /// Must be an `https://` URL.
    pub url: String,
    /// Request timeout, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Base64-encoded PEM CA bundle trusted for this provider's TLS chain.
    pub ca_bundle_base64: String,
}

fn default_timeout_seconds() -> u64 {
    10
}

impl From<ProviderConfig> for ExternalDataProvider {
    fn from(config: ProviderConfig) -> Self {
        ExternalDataProvider {
            name: config.name,
            url: config.url,
            timeout_seconds: config.timeout_seconds,
            ca_bundle_base64: config.ca_bundle_base64,
            client_cert_base64: None,
        }
    }
}

/// Discovers a [`CONFIG_FILENAME`] file by walking up from `start`.
///
/// Returns `None` if no config file is found before reaching the
/// filesystem root.
#[must_use]
pub fn discover(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILENAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Loads a [`ClientConfig`] from `path`.
///
/// # Errors
/// Returns [`Error::Read`] if `path` cannot be read, or [`Error::Parse`] if
/// its contents are not valid YAML for [`ClientConfig`].
pub fn load(path: &Path) -> Result<ClientConfig, Error> {
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_yaml::from_str(&contents).map_err(|e| Error::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_providers_and_default_ttl() {
        let config = ClientConfig::default();
        assert!(config.external_data.providers.is_empty());
        assert_eq!(config.external_data.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn parses_a_minimal_yaml_document() {
        let yaml = r#"
externs:
  - sizes
external_data:
  cache_ttl_seconds: 60
  providers:
    - name: sizes
      url: https://sizes.internal/resolve
      ca_bundle_base64: ZmFrZQ==
"#;
        let config: ClientConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.externs, vec!["sizes".to_owned()]);
        assert_eq!(config.external_data.cache_ttl_seconds, 60);
        assert_eq!(config.external_data.providers.len(), 1);
        assert_eq!(config.external_data.providers[0].timeout_seconds, 10);
    }

    #[test]
    fn discover_finds_config_in_an_ancestor_directory() {
        let dir = tempdir();
        std::fs::write(dir.join(CONFIG_FILENAME), "externs: []\n").unwrap();
        let nested = dir.join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        let found = discover(&nested).expect("config should be discovered");
        assert_eq!(found, dir.join(CONFIG_FILENAME));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn discover_returns_none_when_absent() {
        let dir = tempdir();
        std::fs::create_dir_all(&dir).unwrap();
        assert!(discover(&dir).is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    fn tempdir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "constraint_config_test_{:?}",
            std::thread::current().id()
        ));
        let _ = std::fs::create_dir_all(&dir);
        dir
    }
}
