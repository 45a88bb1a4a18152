//! Client for ResolveDB, a DNS-based data storage system.
//!
//! ResolveDB stores and retrieves data through DNS queries using the
//! Universal Query Response Protocol (UQRP): each request is encoded as a
//! DNS query name whose labels carry the operation, parameters, and
//! authentication, and the answer's text records carry the typed response.
//! This gives ubiquitous accessibility, built-in caching through DNS TTLs,
//! and firewall-friendly communication.
//!
//! # Quick Start
//!
//! ```no_run
//! use resolvedb::Client;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Weather {
//!     location: String,
//!     temp_c: f64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), resolvedb::Error> {
//!     // Zero-config client for public data.
//!     let client = Client::new()?;
//!
//!     let weather: Weather = client.get("weather", "quebec").await?;
//!     println!("{}: {:.1}°C", weather.location, weather.temp_c);
//!     Ok(())
//! }
//! ```
//!
//! # Transports
//!
//! Four transports are supported, with automatic fallback when more than
//! one is configured:
//!
//! - [`Doh`](transport::Doh) - DNS-over-HTTPS wire format (default)
//! - [`DohJson`](transport::DohJson) - Google-style DNS JSON API
//! - [`Dot`](transport::Dot) - DNS-over-TLS
//! - [`Dns`](transport::Dns) - traditional DNS over UDP/TCP
//!
//! ```no_run
//! use resolvedb::transport::{Doh, Dot, Dns};
//! use resolvedb::Client;
//!
//! # fn main() -> Result<(), resolvedb::Error> {
//! let client = Client::builder()
//!     .transport(Box::new(Doh::new()))
//!     .transport(Box::new(Dot::new()))
//!     .transport(Box::new(Dns::new()))
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! - API-key authentication for write operations, carried as a per-request
//!   HMAC label - the raw key never appears in a query.
//! - AES-256-GCM encryption for sensitive data.
//! - BDT (anonymous device tokens) for IoT devices.
//! - CTP (cohort tokens) for user targeting.
//! - NBA (namespace-bound signatures) for multi-tenant apps.
//!
//! By default, authenticated requests refuse to travel over unencrypted
//! transports.
//!
//! # Error Handling
//!
//! Errors are typed; protocol failures carry one of the closed wire codes:
//!
//! ```no_run
//! # async fn example(client: resolvedb::Client) {
//! match client.get::<serde_json::Value>("data", "key").await {
//!     Err(err) if err.is_not_found() => { /* handle missing data */ }
//!     Err(err) if err.is_rate_limited() => { /* back off */ }
//!     other => { let _ = other; }
//! }
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The [`Client`] is safe for concurrent use from multiple tasks.

pub mod cache;
pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod response;
pub mod retry;
pub mod security;
pub mod transport;

pub use cache::{Cache, CacheConfig, MemoryCache, NoopCache};
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, RequestOptions};
pub use error::{Error, ErrorCode, Result};
pub use response::Response;
pub use retry::RetryConfig;
pub use security::{generate_key as generate_encryption_key, Bdt, Ctp, CtpPayload, Nba};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Read operations.
#[async_trait]
pub trait Querier {
    /// Retrieve data for a resource and key, decoding into `T`.
    async fn get<T: DeserializeOwned + Send>(
        &self,
        resource: &str,
        key: &str,
        opts: &RequestOptions,
    ) -> Result<T>;

    /// Retrieve the raw parsed response for a resource and key.
    async fn get_raw(&self, resource: &str, key: &str, opts: &RequestOptions)
        -> Result<Response>;

    /// Retrieve the list of keys for a resource.
    async fn list(&self, resource: &str, opts: &RequestOptions) -> Result<Vec<String>>;
}

/// Write operations.
#[async_trait]
pub trait Writer {
    /// Store data for a resource and key.
    async fn set<T: Serialize + Sync>(
        &self,
        resource: &str,
        key: &str,
        data: &T,
        opts: &RequestOptions,
    ) -> Result<()>;

    /// Remove data for a resource and key.
    async fn delete(&self, resource: &str, key: &str, opts: &RequestOptions) -> Result<()>;
}

/// Combined read and write operations.
pub trait ReadWriter: Querier + Writer {}
impl<T: Querier + Writer> ReadWriter for T {}

/// Encrypted read operations.
#[async_trait]
pub trait EncryptedQuerier {
    /// Retrieve and decrypt data.
    async fn get_encrypted<T: DeserializeOwned + Send>(
        &self,
        resource: &str,
        key: &str,
        opts: &RequestOptions,
    ) -> Result<T>;
}

/// Encrypted write operations.
#[async_trait]
pub trait EncryptedWriter {
    /// Encrypt and store data.
    async fn set_encrypted<T: Serialize + Sync>(
        &self,
        resource: &str,
        key: &str,
        data: &T,
        opts: &RequestOptions,
    ) -> Result<()>;
}

/// All secure operations.
pub trait SecureClient: ReadWriter + EncryptedQuerier + EncryptedWriter {}
impl<T: ReadWriter + EncryptedQuerier + EncryptedWriter> SecureClient for T {}

#[async_trait]
impl Querier for Client {
    async fn get<T: DeserializeOwned + Send>(
        &self,
        resource: &str,
        key: &str,
        opts: &RequestOptions,
    ) -> Result<T> {
        Client::get_with(self, resource, key, opts).await
    }

    async fn get_raw(
        &self,
        resource: &str,
        key: &str,
        opts: &RequestOptions,
    ) -> Result<Response> {
        Client::get_raw_with(self, resource, key, opts).await
    }

    async fn list(&self, resource: &str, opts: &RequestOptions) -> Result<Vec<String>> {
        Client::list_with(self, resource, opts).await
    }
}

#[async_trait]
impl Writer for Client {
    async fn set<T: Serialize + Sync>(
        &self,
        resource: &str,
        key: &str,
        data: &T,
        opts: &RequestOptions,
    ) -> Result<()> {
        Client::set_with(self, resource, key, data, opts).await
    }

    async fn delete(&self, resource: &str, key: &str, opts: &RequestOptions) -> Result<()> {
        Client::delete_with(self, resource, key, opts).await
    }
}

#[async_trait]
impl EncryptedQuerier for Client {
    async fn get_encrypted<T: DeserializeOwned + Send>(
        &self,
        resource: &str,
        key: &str,
        opts: &RequestOptions,
    ) -> Result<T> {
        Client::get_encrypted_with(self, resource, key, opts).await
    }
}

#[async_trait]
impl EncryptedWriter for Client {
    async fn set_encrypted<T: Serialize + Sync>(
        &self,
        resource: &str,
        key: &str,
        data: &T,
        opts: &RequestOptions,
    ) -> Result<()> {
        Client::set_encrypted_with(self, resource, key, data, opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_implements_interfaces() {
        fn assert_querier<T: Querier>() {}
        fn assert_writer<T: Writer>() {}
        fn assert_read_writer<T: ReadWriter>() {}
        fn assert_secure<T: SecureClient>() {}

        assert_querier::<Client>();
        assert_writer::<Client>();
        assert_read_writer::<Client>();
        assert_secure::<Client>();
    }
}
