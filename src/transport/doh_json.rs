//! DNS-over-HTTPS transport using the JSON API (Google/Cloudflare style).

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::transport::{Request, Response, Transport};

/// DNS-over-HTTPS JSON API transport.
pub struct DohJson {
    base_url: String,
    client: reqwest::Client,
}

impl Default for DohJson {
    fn default() -> Self {
        DohJson::new()
    }
}

impl DohJson {
    /// Create a transport against the default ResolveDB JSON endpoint.
    pub fn new() -> DohJson {
        DohJson {
            base_url: "https://api.resolvedb.io/resolve".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Set the JSON API endpoint URL.
    pub fn with_url(mut self, url: impl Into<String>) -> DohJson {
        self.base_url = url.into();
        self
    }

    /// Use a custom HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> DohJson {
        self.client = client;
        self
    }
}

/// The subset of the DNS-JSON response we consume.
#[derive(Debug, Deserialize)]
struct JsonDnsResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<JsonAnswer>,
}

#[derive(Debug, Deserialize)]
struct JsonAnswer {
    #[serde(rename = "TTL", default)]
    ttl: u32,
    #[serde(default)]
    data: String,
}

fn parse_json_response(body: &[u8]) -> Result<Response> {
    let json_resp: JsonDnsResponse =
        serde_json::from_slice(body).map_err(|e| Error::Transport(format!("json parse: {e}")))?;

    let mut resp = Response::default();
    for answer in json_resp.answer {
        // TXT data arrives with surrounding quotes.
        let data = answer
            .data
            .strip_prefix('"')
            .and_then(|d| d.strip_suffix('"'))
            .unwrap_or(&answer.data);

        resp.records.push(data.as_bytes().to_vec());
        if answer.ttl > 0 && (resp.ttl == 0 || answer.ttl < resp.ttl) {
            resp.ttl = answer.ttl;
        }
    }

    for record in &resp.records {
        resp.data.extend_from_slice(record);
    }

    Ok(resp)
}

#[async_trait]
impl Transport for DohJson {
    fn name(&self) -> &str {
        "doh-json"
    }

    fn is_encrypted(&self) -> bool {
        true
    }

    async fn query(&self, req: &Request) -> Result<Response> {
        let qtype = req.qtype.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("name", req.name.as_str()), ("type", qtype.as_str())])
            .header("Accept", "application/dns-json")
            .send()
            .await
            .map_err(|e| Error::Transport(format!("http request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("http status {}", status.as_u16())));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("read response: {e}")))?;
        parse_json_response(&body)
    }
}
