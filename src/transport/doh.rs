//! DNS-over-HTTPS transport (RFC 8484, wire format).

use async_trait::async_trait;

use crate::encoding::encode_base64;
use crate::error::{Error, Result};
use crate::transport::{wire, Request, Response, Transport};

const CONTENT_TYPE: &str = "application/dns-message";

/// DNS-over-HTTPS transport.
pub struct Doh {
    base_url: String,
    client: reqwest::Client,
}

impl Default for Doh {
    fn default() -> Self {
        Doh::new()
    }
}

impl Doh {
    /// Create a transport against the default ResolveDB endpoint.
    pub fn new() -> Doh {
        Doh {
            base_url: "https://api.resolvedb.io/dns-query".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Set the DoH endpoint URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Doh {
        self.base_url = url.into();
        self
    }

    /// Use a custom HTTP client (timeouts, proxies, pinning).
    pub fn with_client(mut self, client: reqwest::Client) -> Doh {
        self.client = client;
        self
    }

    /// Send the query with the GET method: `?dns=<base64url(wire)>`.
    pub async fn query_get(&self, req: &Request) -> Result<Response> {
        let msg = wire::build_query(&req.name, req.qtype);
        let url = format!("{}?dns={}", self.base_url, encode_base64(&msg));

        let resp = self
            .client
            .get(&url)
            .header("Accept", CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("http request: {e}")))?;

        read_wire_response(resp).await
    }
}

async fn read_wire_response(resp: reqwest::Response) -> Result<Response> {
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Transport(format!("http status {}", status.as_u16())));
    }
    let body = resp
        .bytes()
        .await
        .map_err(|e| Error::Transport(format!("read response: {e}")))?;
    wire::parse_response(&body)
}

#[async_trait]
impl Transport for Doh {
    fn name(&self) -> &str {
        "doh"
    }

    fn is_encrypted(&self) -> bool {
        true
    }

    /// Send the query with the POST method (RFC 8484 preferred form).
    async fn query(&self, req: &Request) -> Result<Response> {
        let msg = wire::build_query(&req.name, req.qtype);

        let resp = self
            .client
            .post(&self.base_url)
            .header("Content-Type", CONTENT_TYPE)
            .header("Accept", CONTENT_TYPE)
            .body(msg)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("http request: {e}")))?;

        read_wire_response(resp).await
    }
}
