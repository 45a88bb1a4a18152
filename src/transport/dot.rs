//! DNS-over-TLS transport (RFC 7858).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result};
use crate::transport::dns::exchange_framed;
use crate::transport::{wire, Request, Response, Transport};

/// DNS-over-TLS transport.
pub struct Dot {
    servers: Vec<String>,
    timeout: Duration,
    tls_config: Arc<rustls::ClientConfig>,
}

impl Default for Dot {
    fn default() -> Self {
        Dot::new()
    }
}

impl Dot {
    /// Create a transport against the default public DoT resolvers.
    pub fn new() -> Dot {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Dot {
            servers: vec!["1.1.1.1:853".to_string(), "8.8.8.8:853".to_string()],
            timeout: Duration::from_secs(10),
            tls_config: Arc::new(tls_config),
        }
    }

    /// Set the DoT servers to use, in priority order.
    pub fn with_servers(mut self, servers: Vec<String>) -> Dot {
        self.servers = servers;
        self
    }

    /// Set the per-server query timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Dot {
        self.timeout = timeout;
        self
    }

    /// Use a custom TLS configuration (e.g. pinned roots).
    pub fn with_tls_config(mut self, config: Arc<rustls::ClientConfig>) -> Dot {
        self.tls_config = config;
        self
    }

    async fn query_server(&self, server: &str, msg: &[u8]) -> Result<Response> {
        let host = server.rsplit_once(':').map_or(server, |(h, _)| h);
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| Error::Transport(format!("invalid server name {host}: {e}")))?;

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(server))
            .await
            .map_err(|_| Error::Transport(format!("dial {server}: timed out")))?
            .map_err(|e| Error::Transport(format!("dial {server}: {e}")))?;

        let connector = TlsConnector::from(Arc::clone(&self.tls_config));
        let tls_stream = tokio::time::timeout(self.timeout, connector.connect(server_name, stream))
            .await
            .map_err(|_| Error::Transport(format!("tls handshake {server}: timed out")))?
            .map_err(|e| Error::Transport(format!("tls handshake {server}: {e}")))?;

        let data = tokio::time::timeout(self.timeout, exchange_framed(tls_stream, msg))
            .await
            .map_err(|_| Error::Transport(format!("query {server}: timed out")))??;

        wire::parse_response(&data)
    }
}

#[async_trait]
impl Transport for Dot {
    fn name(&self) -> &str {
        "dot"
    }

    fn is_encrypted(&self) -> bool {
        true
    }

    async fn query(&self, req: &Request) -> Result<Response> {
        let msg = wire::build_query(&req.name, req.qtype);

        let mut last_err = Error::Transport("no DoT servers configured".into());
        for server in &self.servers {
            match self.query_server(server, &msg).await {
                Ok(resp) => return Ok(resp),
                Err(err) => {
                    log::debug!("dot server {server} failed: {err}");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let dot = Dot::new();
        assert_eq!(dot.name(), "dot");
        assert!(dot.is_encrypted());
        assert_eq!(dot.servers, vec!["1.1.1.1:853", "8.8.8.8:853"]);
    }

    #[tokio::test]
    async fn test_unreachable_server_errors() {
        let dot = Dot::new()
            .with_servers(vec!["127.0.0.1:1".to_string()])
            .with_timeout(Duration::from_millis(100));
        let err = dot.query(&Request::txt("x.net")).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
