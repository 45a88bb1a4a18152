//! The ResolveDB client: composes the label codec, transports, cache,
//! retry engine, and auth primitives into the public operations.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{build_cache_key, Cache, MemoryCache, NoopCache};
use crate::config::{ClientConfig, RequestOptions};
use crate::encoding::{
    encode_base64, encode_json, sanitize_label, MAX_LABEL_LEN, MAX_NAME_LEN, PREFIX_AUTH,
    PREFIX_BASE64,
};
use crate::error::{Error, ErrorCode, Result};
use crate::response::Response;
use crate::retry::retry;
use crate::security::hmac_tag_hex;
use crate::transport::{Doh, Multi, Request, Transport};

/// A ResolveDB client.
///
/// Safe for concurrent use from multiple tasks; no operation holds a lock
/// across I/O.
pub struct Client {
    config: ClientConfig,
    transport: Box<dyn Transport>,
    cache: Box<dyn Cache>,
}

/// Builds a [`Client`].
///
/// ```no_run
/// use resolvedb::Client;
///
/// # fn main() -> Result<(), resolvedb::Error> {
/// // Zero-config client for public data.
/// let client = Client::new()?;
///
/// // Authenticated client.
/// let client = Client::builder()
///     .api_key("your-api-key")
///     .namespace("myapp")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
    transports: Vec<Box<dyn Transport>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        ClientBuilder::new()
    }
}

impl ClientBuilder {
    /// Start from the default configuration.
    pub fn new() -> ClientBuilder {
        ClientBuilder {
            config: ClientConfig::default(),
            transports: Vec::new(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            transports: Vec::new(),
        }
    }

    /// Set the API key for authenticated operations.
    pub fn api_key(mut self, key: impl Into<String>) -> ClientBuilder {
        self.config.api_key = key.into();
        self
    }

    /// Set the namespace for multi-tenant operations.
    pub fn namespace(mut self, ns: impl Into<String>) -> ClientBuilder {
        self.config.namespace = ns.into();
        self
    }

    /// Set the protocol version (default: "v1").
    pub fn version(mut self, version: impl Into<String>) -> ClientBuilder {
        self.config.version = version.into();
        self
    }

    /// Set the TLD for queries (default: "net").
    pub fn tld(mut self, tld: impl Into<String>) -> ClientBuilder {
        self.config.tld = tld.into();
        self
    }

    /// Set the DoH endpoint base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> ClientBuilder {
        self.config.base_url = url.into();
        self
    }

    /// Set the per-operation timeout (default: 30 s; zero disables).
    pub fn timeout(mut self, timeout: Duration) -> ClientBuilder {
        self.config.timeout = timeout;
        self
    }

    /// Configure retry behavior.
    pub fn retry(mut self, retry: crate::retry::RetryConfig) -> ClientBuilder {
        self.config.retry = retry;
        self
    }

    /// Configure response caching.
    pub fn cache(mut self, cache: crate::cache::CacheConfig) -> ClientBuilder {
        self.config.cache = cache;
        self
    }

    /// Set the AES-256-GCM key for encrypted operations.
    pub fn encryption_key(mut self, key: [u8; 32]) -> ClientBuilder {
        self.config.encryption_key = Some(key);
        self
    }

    /// Set the tenant key for namespace-bound signatures.
    pub fn tenant_query_key(mut self, key: Vec<u8>) -> ClientBuilder {
        self.config.tenant_query_key = Some(key);
        self
    }

    /// Add a transport. Transports are tried in the order added, with
    /// automatic fallback.
    pub fn transport(mut self, transport: Box<dyn Transport>) -> ClientBuilder {
        self.transports.push(transport);
        self
    }

    /// Disable security enforcement (NOT RECOMMENDED). By default,
    /// authenticated requests are blocked on unencrypted transports.
    pub fn without_security_enforcement(mut self) -> ClientBuilder {
        self.config.enforce_security = false;
        self
    }

    /// Build the client.
    pub fn build(mut self) -> Result<Client> {
        self.config.validate()?;

        let transport: Box<dyn Transport> = match self.transports.len() {
            0 => {
                let mut http = reqwest::Client::builder();
                if !self.config.timeout.is_zero() {
                    http = http.timeout(self.config.timeout);
                }
                let http = http
                    .build()
                    .map_err(|e| Error::Config(format!("http client: {e}")))?;
                Box::new(
                    Doh::new()
                        .with_url(format!("{}/dns-query", self.config.base_url))
                        .with_client(http),
                )
            }
            1 => self.transports.remove(0),
            _ => Box::new(Multi::new(self.transports)),
        };

        let cache: Box<dyn Cache> = if self.config.cache.enabled {
            Box::new(MemoryCache::new(&self.config.cache))
        } else {
            Box::new(NoopCache)
        };

        Ok(Client {
            config: self.config,
            transport,
            cache,
        })
    }
}

impl Client {
    /// Create a client with the default configuration.
    pub fn new() -> Result<Client> {
        ClientBuilder::new().build()
    }

    /// Start building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Retrieve data for a resource and key, decoding into `T`.
    pub async fn get<T: DeserializeOwned>(&self, resource: &str, key: &str) -> Result<T> {
        self.get_with(resource, key, &RequestOptions::default()).await
    }

    /// [`Client::get`] with per-request options.
    pub async fn get_with<T: DeserializeOwned>(
        &self,
        resource: &str,
        key: &str,
        opts: &RequestOptions,
    ) -> Result<T> {
        let resp = self.get_raw_with(resource, key, opts).await?;
        resp.unmarshal()
    }

    /// Retrieve the raw parsed response for a resource and key.
    pub async fn get_raw(&self, resource: &str, key: &str) -> Result<Response> {
        self.get_raw_with(resource, key, &RequestOptions::default())
            .await
    }

    /// [`Client::get_raw`] with per-request options.
    pub async fn get_raw_with(
        &self,
        resource: &str,
        key: &str,
        opts: &RequestOptions,
    ) -> Result<Response> {
        let cache_key = self.fingerprint("get", resource, key);
        if !opts.skip_cache {
            if let Some(cached) = self.cache.get(&cache_key) {
                log::debug!("cache hit for {cache_key}");
                return Ok(cached);
            }
        }

        let query_name = self.build_query_name("get", resource, key, None, opts)?;
        let resp = self.dispatch(&query_name).await?;

        // Cache successful responses only.
        if resp.is_success() && !opts.skip_cache {
            self.cache.set(&cache_key, resp.clone(), resp.ttl);
        }

        Ok(resp)
    }

    /// Store data for a resource and key. Requires an API key and, under
    /// security enforcement, an encrypted transport.
    pub async fn set<T: Serialize>(&self, resource: &str, key: &str, data: &T) -> Result<()> {
        self.set_with(resource, key, data, &RequestOptions::default())
            .await
    }

    /// [`Client::set`] with per-request options.
    pub async fn set_with<T: Serialize>(
        &self,
        resource: &str,
        key: &str,
        data: &T,
        opts: &RequestOptions,
    ) -> Result<()> {
        self.require_write_auth()?;

        let encoded = encode_json(data)?;
        let query_name = self.build_query_name("put", resource, key, Some(&encoded), opts)?;

        let resp = self.dispatch(&query_name).await?;
        resp.to_error()?;

        self.cache.delete(&self.fingerprint("get", resource, key));
        Ok(())
    }

    /// Remove data for a resource and key. Same preconditions as
    /// [`Client::set`].
    pub async fn delete(&self, resource: &str, key: &str) -> Result<()> {
        self.delete_with(resource, key, &RequestOptions::default())
            .await
    }

    /// [`Client::delete`] with per-request options.
    pub async fn delete_with(
        &self,
        resource: &str,
        key: &str,
        opts: &RequestOptions,
    ) -> Result<()> {
        self.require_write_auth()?;

        let query_name = self.build_query_name("delete", resource, key, None, opts)?;
        let resp = self.dispatch(&query_name).await?;
        resp.to_error()?;

        self.cache.delete(&self.fingerprint("get", resource, key));
        Ok(())
    }

    /// Retrieve the list of keys for a resource.
    pub async fn list(&self, resource: &str) -> Result<Vec<String>> {
        self.list_with(resource, &RequestOptions::default()).await
    }

    /// [`Client::list`] with per-request options.
    pub async fn list_with(&self, resource: &str, opts: &RequestOptions) -> Result<Vec<String>> {
        let query_name = self.build_query_name("list", resource, "", None, opts)?;
        let resp = self.dispatch(&query_name).await?;
        resp.to_error()?;
        resp.unmarshal()
    }

    /// Retrieve and decrypt data sealed with the configured encryption key.
    pub async fn get_encrypted<T: DeserializeOwned>(
        &self,
        resource: &str,
        key: &str,
    ) -> Result<T> {
        self.get_encrypted_with(resource, key, &RequestOptions::default())
            .await
    }

    /// [`Client::get_encrypted`] with per-request options.
    pub async fn get_encrypted_with<T: DeserializeOwned>(
        &self,
        resource: &str,
        key: &str,
        opts: &RequestOptions,
    ) -> Result<T> {
        let Some(enc_key) = &self.config.encryption_key else {
            return Err(Error::Config("encryption key not configured".into()));
        };

        let opts = opts.clone().with_encrypt();
        let resp = self.get_raw_with(resource, key, &opts).await?;

        let Some(data) = &resp.data else {
            resp.to_error()?;
            return Err(Error::protocol(ErrorCode::NotFound, ""));
        };
        let decrypted = crate::security::decrypt(data, enc_key)?;

        let mut clear = resp.clone();
        clear.data = Some(decrypted);
        clear.unmarshal()
    }

    /// Encrypt and store data with the configured encryption key.
    pub async fn set_encrypted<T: Serialize>(
        &self,
        resource: &str,
        key: &str,
        data: &T,
    ) -> Result<()> {
        self.set_encrypted_with(resource, key, data, &RequestOptions::default())
            .await
    }

    /// [`Client::set_encrypted`] with per-request options.
    pub async fn set_encrypted_with<T: Serialize>(
        &self,
        resource: &str,
        key: &str,
        data: &T,
        opts: &RequestOptions,
    ) -> Result<()> {
        let Some(enc_key) = &self.config.encryption_key else {
            return Err(Error::Config("encryption key not configured".into()));
        };
        self.require_write_auth()?;

        let plain = serde_json::to_vec(data)?;
        let encrypted = crate::security::encrypt(&plain, enc_key)?;

        let opts = opts.clone().with_encrypt();
        let query_name =
            self.build_query_name("put", resource, key, Some(&encode_base64(&encrypted)), &opts)?;

        let resp = self.dispatch(&query_name).await?;
        resp.to_error()?;

        self.cache.delete(&self.fingerprint("get", resource, key));
        Ok(())
    }

    /// Release resources held by the client's transport.
    pub async fn close(&self) -> Result<()> {
        self.transport.close().await
    }

    /// Writes need an API key and, under enforcement, an encrypted path.
    fn require_write_auth(&self) -> Result<()> {
        if self.config.api_key.is_empty() {
            return Err(Error::protocol(ErrorCode::Unauthorized, ""));
        }
        if self.config.enforce_security && !self.transport.is_encrypted() {
            return Err(Error::EncryptedTransportRequired);
        }
        Ok(())
    }

    fn fingerprint(&self, operation: &str, resource: &str, key: &str) -> String {
        build_cache_key(
            operation,
            resource,
            key,
            &self.config.namespace,
            &self.config.version,
        )
    }

    /// Build the FQDN for a query.
    ///
    /// Slot order: `[nba] [ctp] [bdt] <op> [auth] [b64-data] [key]
    /// <resource> <namespace|public> <version> resolvedb <tld>`. Security
    /// tokens take the left-most (outermost) positions; the auth label sits
    /// immediately after the operation.
    fn build_query_name(
        &self,
        operation: &str,
        resource: &str,
        key: &str,
        data: Option<&str>,
        opts: &RequestOptions,
    ) -> Result<String> {
        let mut parts: Vec<String> = Vec::with_capacity(12);

        if let Some(token) = &opts.nba_token {
            parts.push(token.clone());
        }
        if let Some(token) = &opts.ctp_token {
            parts.push(token.clone());
        }
        if let Some(token) = &opts.bdt_token {
            parts.push(token.clone());
        }

        parts.push(operation.to_string());

        // Signed auth label instead of the raw API key.
        if !self.config.api_key.is_empty() {
            parts.push(self.generate_auth_token(operation, resource, key));
        }

        if let Some(data) = data {
            let label = format!("{PREFIX_BASE64}{data}");
            if label.len() > MAX_LABEL_LEN {
                return Err(Error::protocol(
                    ErrorCode::PayloadTooLarge,
                    "payload exceeds the DNS label size limit",
                ));
            }
            parts.push(label);
        }

        if !key.is_empty() {
            parts.push(sanitize_label(key));
        }
        parts.push(sanitize_label(resource));

        if self.config.namespace.is_empty() {
            parts.push("public".to_string());
        } else {
            parts.push(sanitize_label(&self.config.namespace));
        }

        parts.push(self.config.version.clone());
        parts.push("resolvedb".to_string());
        parts.push(self.config.tld.clone());

        let name = parts.join(".");
        if parts.iter().any(|p| p.len() > MAX_LABEL_LEN) || name.len() > MAX_NAME_LEN {
            if data.is_some() {
                return Err(Error::protocol(
                    ErrorCode::PayloadTooLarge,
                    "query name exceeds DNS limits",
                ));
            }
            return Err(Error::protocol(
                ErrorCode::BadRequest,
                "query name exceeds DNS limits",
            ));
        }

        Ok(name)
    }

    /// Create the time-limited HMAC auth label for one request.
    ///
    /// Format: `auth-<16-byte-hmac-hex>-t-<unix>`, signing
    /// `operation|resource|key|namespace|timestamp` with the API key. The
    /// raw key never appears in a query.
    fn generate_auth_token(&self, operation: &str, resource: &str, key: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let message = format!(
            "{operation}|{resource}|{key}|{}|{timestamp}",
            self.config.namespace
        );
        let sig = hmac_tag_hex(self.config.api_key.as_bytes(), &message);

        format!("{PREFIX_AUTH}{sig}-t-{timestamp}")
    }

    /// Send one query through retry and the operation deadline, parsing the
    /// answer records into a response.
    async fn dispatch(&self, query_name: &str) -> Result<Response> {
        self.with_deadline(retry(&self.config.retry, || self.execute(query_name)))
            .await
    }

    async fn with_deadline<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        if self.config.timeout.is_zero() {
            return fut.await;
        }
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::protocol(
                ErrorCode::Timeout,
                "operation deadline exceeded",
            )),
        }
    }

    async fn execute(&self, query_name: &str) -> Result<Response> {
        let req = Request::txt(query_name);

        log::debug!("query {} via {}", req.name, self.transport.name());
        let answer = self.transport.query(&req).await?;

        let mut resp = Response::parse_records(&answer.records)?;

        // Fall back to the DNS TTL when the response carries none.
        if resp.ttl.is_zero() && answer.ttl > 0 {
            resp.ttl = Duration::from_secs(u64::from(answer.ttl));
        }

        // Transient server statuses become errors here so the retry engine
        // can act on them; permanent failures pass through as responses for
        // the caller to inspect.
        if let Err(err) = resp.to_error() {
            if err.retryable() {
                return Err(err);
            }
        }

        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::builder().build().unwrap()
    }

    fn authed_client() -> Client {
        Client::builder()
            .api_key("K")
            .namespace("myapp")
            .build()
            .unwrap()
    }

    #[test]
    fn test_query_name_public() {
        let client = Client::builder().namespace("myapp").build().unwrap();
        let name = client
            .build_query_name("get", "weather", "new york", None, &RequestOptions::default())
            .unwrap();
        assert_eq!(name, "get.new-york.weather.myapp.v1.resolvedb.net");
    }

    #[test]
    fn test_query_name_default_namespace() {
        let name = client()
            .build_query_name("get", "weather", "quebec", None, &RequestOptions::default())
            .unwrap();
        assert_eq!(name, "get.quebec.weather.public.v1.resolvedb.net");
    }

    #[test]
    fn test_query_name_list_has_no_key() {
        let name = client()
            .build_query_name("list", "weather", "", None, &RequestOptions::default())
            .unwrap();
        assert_eq!(name, "list.weather.public.v1.resolvedb.net");
    }

    #[test]
    fn test_auth_label_inserted_after_operation() {
        let client = authed_client();
        let name = client
            .build_query_name("get", "weather", "new york", None, &RequestOptions::default())
            .unwrap();

        let labels: Vec<&str> = name.split('.').collect();
        assert_eq!(labels[0], "get");
        assert!(labels[1].starts_with(PREFIX_AUTH), "{name}");
        assert!(labels[1].contains("-t-"));
        assert_eq!(&labels[2..], &["new-york", "weather", "myapp", "v1", "resolvedb", "net"]);

        // The auth label is hmac + timestamp: auth-<32 hex>-t-<unix>.
        let body = labels[1].strip_prefix(PREFIX_AUTH).unwrap();
        let (sig, ts) = body.split_once("-t-").unwrap();
        assert_eq!(sig.len(), 32);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(ts.parse::<i64>().is_ok());

        // The raw API key never appears.
        assert!(!name.contains(".K."));
    }

    #[test]
    fn test_security_token_order() {
        let opts = RequestOptions::new()
            .with_bdt("bdt-aa")
            .with_ctp("ctp-bb")
            .with_nba("sig-cc");
        let name = client()
            .build_query_name("get", "flags", "feature", None, &opts)
            .unwrap();

        // NBA, CTP, BDT occupy the outermost positions, in that order.
        assert!(name.starts_with("sig-cc.ctp-bb.bdt-aa.get."), "{name}");
    }

    #[test]
    fn test_payload_label_position() {
        let client = Client::builder()
            .api_key("K")
            .without_security_enforcement()
            .build()
            .unwrap();
        let name = client
            .build_query_name("put", "config", "settings", Some("eyJhIjoxfQ"), &RequestOptions::default())
            .unwrap();

        let labels: Vec<&str> = name.split('.').collect();
        assert_eq!(labels[0], "put");
        assert!(labels[1].starts_with(PREFIX_AUTH));
        assert_eq!(labels[2], "b64-eyJhIjoxfQ");
        assert_eq!(labels[3], "settings");
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let big = "A".repeat(80);
        let err = client()
            .build_query_name("put", "config", "settings", Some(&big), &RequestOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::PayloadTooLarge));
    }

    #[test]
    fn test_fingerprint_determinism() {
        let client = authed_client();
        let a = client.fingerprint("get", "Weather", "Quebec");
        let b = client.fingerprint("get", "weather", "quebec");
        assert_eq!(a, b);
        assert_eq!(a, "get.weather.quebec.myapp.v1");
    }

    #[tokio::test]
    async fn test_set_requires_api_key() {
        let err = client()
            .set("config", "settings", &serde_json::json!({"a": 1}))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_encrypted_requires_key() {
        let client = authed_client();
        let err = client
            .get_encrypted::<serde_json::Value>("vault", "item")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
