//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::{Error, Result};
use crate::retry::RetryConfig;
use crate::security::KEY_SIZE;

/// Client configuration. Immutable once the client is constructed.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API key for authenticated operations. Empty means unauthenticated;
    /// the raw key is only ever used to derive per-request HMAC labels.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub api_key: String,
    /// Namespace for multi-tenant operations; empty maps to "public".
    #[serde(default)]
    pub namespace: String,
    /// Protocol version label.
    pub version: String,
    /// TLD terminating the query names.
    pub tld: String,
    /// DoH endpoint base URL for the default transport.
    pub base_url: String,
    /// Per-operation timeout. Zero disables the deadline.
    pub timeout: Duration,
    /// Retry behavior.
    pub retry: RetryConfig,
    /// Response caching.
    pub cache: CacheConfig,
    /// AES-256-GCM key for encrypted operations.
    #[serde(skip)]
    pub encryption_key: Option<[u8; KEY_SIZE]>,
    /// Tenant signing key for namespace-bound signatures.
    #[serde(skip)]
    pub tenant_query_key: Option<Vec<u8>>,
    /// Refuse authenticated dispatch over unencrypted transports.
    pub enforce_security: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_key: String::new(),
            namespace: String::new(),
            version: "v1".to_string(),
            tld: "net".to_string(),
            base_url: "https://api.resolvedb.io".to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            encryption_key: None,
            tenant_query_key: None,
            enforce_security: true,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    /// Key material never appears in debug output.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field(
                "api_key",
                &if self.api_key.is_empty() { "<none>" } else { "<set>" },
            )
            .field("namespace", &self.namespace)
            .field("version", &self.version)
            .field("tld", &self.tld)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("cache", &self.cache)
            .field("encryption_key", &self.encryption_key.map(|_| "<set>"))
            .field(
                "tenant_query_key",
                &self.tenant_query_key.as_ref().map(|_| "<set>"),
            )
            .field("enforce_security", &self.enforce_security)
            .finish()
    }
}

impl ClientConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(Error::Config("version cannot be empty".into()));
        }
        if self.tld.is_empty() {
            return Err(Error::Config("TLD cannot be empty".into()));
        }
        Ok(())
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// TTL hint for write operations. Carried but not interpreted by the
    /// library; servers may honor it.
    pub ttl: Option<Duration>,
    /// Force blob storage, bypassing TXT record limits. Carried but not
    /// interpreted by the library.
    pub force_blob: bool,
    /// Bypass the cache for this request.
    pub skip_cache: bool,
    /// Request encryption handling for this request.
    pub encrypt: bool,
    /// Anonymous device token to attach.
    pub bdt_token: Option<String>,
    /// Cohort token to attach.
    pub ctp_token: Option<String>,
    /// Namespace-bound signature to attach.
    pub nba_token: Option<String>,
}

impl RequestOptions {
    /// Options with every field defaulted.
    pub fn new() -> RequestOptions {
        RequestOptions::default()
    }

    /// Set the TTL hint for a write operation.
    pub fn with_ttl(mut self, ttl: Duration) -> RequestOptions {
        self.ttl = Some(ttl);
        self
    }

    /// Force data to be stored as a blob.
    pub fn with_force_blob(mut self, force: bool) -> RequestOptions {
        self.force_blob = force;
        self
    }

    /// Bypass the cache for this request.
    pub fn skip_cache(mut self) -> RequestOptions {
        self.skip_cache = true;
        self
    }

    /// Enable encryption for this request.
    pub fn with_encrypt(mut self) -> RequestOptions {
        self.encrypt = true;
        self
    }

    /// Attach an anonymous device token.
    pub fn with_bdt(mut self, token: impl Into<String>) -> RequestOptions {
        self.bdt_token = Some(token.into());
        self
    }

    /// Attach a cohort token.
    pub fn with_ctp(mut self, token: impl Into<String>) -> RequestOptions {
        self.ctp_token = Some(token.into());
        self
    }

    /// Attach a namespace-bound signature.
    pub fn with_nba(mut self, signature: impl Into<String>) -> RequestOptions {
        self.nba_token = Some(signature.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.version, "v1");
        assert_eq!(config.tld, "net");
        assert_eq!(config.base_url, "https://api.resolvedb.io");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.enforce_security);
        assert!(config.cache.enabled);
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = ClientConfig::default();
        config.version = String::new();
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.tld = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_hides_keys() {
        let mut config = ClientConfig::default();
        config.api_key = "super-secret".into();
        config.encryption_key = Some([7u8; 32]);
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<set>"));
    }

    #[test]
    fn test_request_options_chain() {
        let opts = RequestOptions::new()
            .with_ttl(Duration::from_secs(60))
            .skip_cache()
            .with_encrypt()
            .with_bdt("bdt-00")
            .with_ctp("ctp-xx")
            .with_nba("sig-yy");
        assert_eq!(opts.ttl, Some(Duration::from_secs(60)));
        assert!(opts.skip_cache);
        assert!(opts.encrypt);
        assert_eq!(opts.bdt_token.as_deref(), Some("bdt-00"));
        assert_eq!(opts.ctp_token.as_deref(), Some("ctp-xx"));
        assert_eq!(opts.nba_token.as_deref(), Some("sig-yy"));
    }
}
