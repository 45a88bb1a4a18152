//! DNS transport implementations.
//!
//! A [`Transport`] carries one DNS query and returns the text-record
//! payload. Four implementations exist: DNS-over-HTTPS in wire format
//! ([`Doh`]), DNS-over-HTTPS with the JSON API ([`DohJson`]),
//! DNS-over-TLS ([`Dot`]), and traditional DNS over UDP/TCP ([`Dns`]).
//! [`Multi`] chains transports for fallback.

mod dns;
mod doh;
mod doh_json;
mod dot;
pub(crate) mod wire;

pub use dns::Dns;
pub use doh::Doh;
pub use doh_json::DohJson;
pub use dot::Dot;

use async_trait::async_trait;

use crate::error::Result;

/// Common DNS record types.
pub const TYPE_A: u16 = 1;
pub const TYPE_NS: u16 = 2;
pub const TYPE_CNAME: u16 = 5;
pub const TYPE_SOA: u16 = 6;
pub const TYPE_NULL: u16 = 10;
pub const TYPE_PTR: u16 = 12;
pub const TYPE_MX: u16 = 15;
pub const TYPE_TXT: u16 = 16;
pub const TYPE_AAAA: u16 = 28;
pub const TYPE_SRV: u16 = 33;

/// A DNS query request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Query name (FQDN).
    pub name: String,
    /// Query type (TXT, NULL, ...).
    pub qtype: u16,
}

impl Request {
    /// Build a TXT query for the given name.
    pub fn txt(name: impl Into<String>) -> Request {
        Request {
            name: name.into(),
            qtype: TYPE_TXT,
        }
    }
}

/// A DNS query response.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// All text records combined.
    pub data: Vec<u8>,
    /// Smallest non-zero TTL observed across the answers.
    pub ttl: u32,
    /// Individual text records, in answer order.
    pub records: Vec<Vec<u8>>,
}

/// Interface for DNS query transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name (e.g. "doh", "dot", "dns").
    fn name(&self) -> &str;

    /// Send a DNS query and return the response.
    async fn query(&self, req: &Request) -> Result<Response>;

    /// True if the transport uses encryption (TLS/HTTPS).
    fn is_encrypted(&self) -> bool;

    /// Release any resources held by the transport.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Multiple transports with automatic fallback.
///
/// Transports are tried in priority order; each failure advances to the
/// next, and only the last error is reported when all fail.
pub struct Multi {
    transports: Vec<Box<dyn Transport>>,
    name: String,
}

impl Multi {
    /// Compose transports in priority order.
    pub fn new(transports: Vec<Box<dyn Transport>>) -> Multi {
        let name = match transports.first() {
            Some(first) => format!("multi({}+fallback)", first.name()),
            None => "multi".to_string(),
        };
        Multi { transports, name }
    }

    /// The underlying transports.
    pub fn transports(&self) -> &[Box<dyn Transport>] {
        &self.transports
    }
}

#[async_trait]
impl Transport for Multi {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, req: &Request) -> Result<Response> {
        let mut last_err = crate::error::Error::Transport("no transports configured".into());
        for transport in &self.transports {
            match transport.query(req).await {
                Ok(resp) => return Ok(resp),
                Err(err) => {
                    log::debug!(
                        "transport {} failed, trying next: {err}",
                        transport.name()
                    );
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    /// Encrypted only if every member is: a cleartext leg anywhere makes
    /// the whole compound unsafe for authenticated dispatch.
    fn is_encrypted(&self) -> bool {
        !self.transports.is_empty() && self.transports.iter().all(|t| t.is_encrypted())
    }

    async fn close(&self) -> Result<()> {
        let mut first_err = None;
        for transport in &self.transports {
            if let Err(err) = transport.close().await {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeTransport {
        name: &'static str,
        encrypted: bool,
        fail: bool,
        calls: AtomicU32,
    }

    impl FakeTransport {
        fn new(name: &'static str, encrypted: bool, fail: bool) -> FakeTransport {
            FakeTransport {
                name,
                encrypted,
                fail,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        fn name(&self) -> &str {
            self.name
        }

        async fn query(&self, _req: &Request) -> Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Transport(format!("{} is down", self.name)))
            } else {
                Ok(Response {
                    data: self.name.as_bytes().to_vec(),
                    ttl: 60,
                    records: vec![self.name.as_bytes().to_vec()],
                })
            }
        }

        fn is_encrypted(&self) -> bool {
            self.encrypted
        }
    }

    #[tokio::test]
    async fn test_multi_first_success_wins() {
        let multi = Multi::new(vec![
            Box::new(FakeTransport::new("a", true, false)),
            Box::new(FakeTransport::new("b", true, false)),
        ]);
        let resp = multi.query(&Request::txt("q.example.net")).await.unwrap();
        assert_eq!(resp.data, b"a");
    }

    #[tokio::test]
    async fn test_multi_falls_back() {
        let multi = Multi::new(vec![
            Box::new(FakeTransport::new("a", true, true)),
            Box::new(FakeTransport::new("b", true, false)),
        ]);
        let resp = multi.query(&Request::txt("q.example.net")).await.unwrap();
        assert_eq!(resp.data, b"b");
    }

    #[tokio::test]
    async fn test_multi_reports_last_error() {
        let multi = Multi::new(vec![
            Box::new(FakeTransport::new("a", true, true)),
            Box::new(FakeTransport::new("b", true, true)),
        ]);
        let err = multi.query(&Request::txt("q.example.net")).await.unwrap_err();
        assert!(err.to_string().contains("b is down"));
    }

    #[test]
    fn test_multi_encrypted_requires_all() {
        let all = Multi::new(vec![
            Box::new(FakeTransport::new("a", true, false)),
            Box::new(FakeTransport::new("b", true, false)),
        ]);
        assert!(all.is_encrypted());

        let mixed = Multi::new(vec![
            Box::new(FakeTransport::new("a", true, false)),
            Box::new(FakeTransport::new("b", false, false)),
        ]);
        assert!(!mixed.is_encrypted());

        let empty = Multi::new(vec![]);
        assert!(!empty.is_encrypted());
    }

    #[test]
    fn test_multi_name() {
        let multi = Multi::new(vec![Box::new(FakeTransport::new("doh", true, false))]);
        assert_eq!(multi.name(), "multi(doh+fallback)");
    }
}
