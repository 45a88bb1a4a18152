//! Traditional DNS transport over UDP, with a TCP path for large responses.
//!
//! Not encrypted: authenticated requests must not travel over this
//! transport unless security enforcement has been explicitly disabled.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

use crate::error::{Error, Result};
use crate::transport::{wire, Request, Response, Transport};

/// Maximum response size accepted over length-prefixed transports.
pub(crate) const MAX_TCP_RESPONSE: usize = 65535;

/// Plain DNS transport.
pub struct Dns {
    servers: Vec<String>,
    timeout: Duration,
}

impl Default for Dns {
    fn default() -> Self {
        Dns::new()
    }
}

impl Dns {
    /// Create a transport against the default public resolvers.
    pub fn new() -> Dns {
        Dns {
            servers: vec!["8.8.8.8:53".to_string(), "8.8.4.4:53".to_string()],
            timeout: Duration::from_secs(5),
        }
    }

    /// Set the DNS servers to use, in priority order.
    pub fn with_servers(mut self, servers: Vec<String>) -> Dns {
        self.servers = servers;
        self
    }

    /// Set the per-server query timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Dns {
        self.timeout = timeout;
        self
    }

    async fn query_server(&self, server: &str, msg: &[u8]) -> Result<Response> {
        let bind_addr = if server.contains('[') || server.matches(':').count() > 1 {
            "[::]:0"
        } else {
            "0.0.0.0:0"
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| Error::Transport(format!("bind: {e}")))?;
        socket
            .connect(server)
            .await
            .map_err(|e| Error::Transport(format!("connect {server}: {e}")))?;

        socket
            .send(msg)
            .await
            .map_err(|e| Error::Transport(format!("send: {e}")))?;

        let mut buf = vec![0u8; MAX_TCP_RESPONSE];
        let n = tokio::time::timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| Error::Transport(format!("recv from {server}: timed out")))?
            .map_err(|e| Error::Transport(format!("recv: {e}")))?;

        wire::parse_response(&buf[..n])
    }

    /// Send a DNS query over TCP. Used for responses too large for UDP.
    pub async fn query_tcp(&self, req: &Request) -> Result<Response> {
        let msg = wire::build_query(&req.name, req.qtype);

        let mut last_err = Error::Transport("no DNS servers configured".into());
        for server in &self.servers {
            match self.query_server_tcp(server, &msg).await {
                Ok(resp) => return Ok(resp),
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }

    async fn query_server_tcp(&self, server: &str, msg: &[u8]) -> Result<Response> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(server))
            .await
            .map_err(|_| Error::Transport(format!("dial {server}: timed out")))?
            .map_err(|e| Error::Transport(format!("dial {server}: {e}")))?;

        let data = tokio::time::timeout(self.timeout, exchange_framed(stream, msg))
            .await
            .map_err(|_| Error::Transport(format!("query {server}: timed out")))??;

        wire::parse_response(&data)
    }
}

/// Write a length-prefixed DNS message and read back the full response.
///
/// Used by both plain TCP and TLS transports; reads exactly the declared
/// length and caps it at 64 KiB.
pub(crate) async fn exchange_framed<S>(mut stream: S, msg: &[u8]) -> Result<Vec<u8>>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut framed = Vec::with_capacity(msg.len() + 2);
    framed.extend_from_slice(&(msg.len() as u16).to_be_bytes());
    framed.extend_from_slice(msg);
    stream
        .write_all(&framed)
        .await
        .map_err(|e| Error::Transport(format!("write: {e}")))?;

    let mut len_buf = [0u8; 2];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| Error::Transport(format!("read length: {e}")))?;
    let length = u16::from_be_bytes(len_buf) as usize;
    if length > MAX_TCP_RESPONSE {
        return Err(Error::Transport(format!("response too large: {length} bytes")));
    }

    let mut buf = vec![0u8; length];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|e| Error::Transport(format!("read: {e}")))?;
    Ok(buf)
}

#[async_trait]
impl Transport for Dns {
    fn name(&self) -> &str {
        "dns"
    }

    /// Always false: traditional DNS travels in cleartext.
    fn is_encrypted(&self) -> bool {
        false
    }

    async fn query(&self, req: &Request) -> Result<Response> {
        let msg = wire::build_query(&req.name, req.qtype);

        let mut last_err = Error::Transport("no DNS servers configured".into());
        for server in &self.servers {
            match self.query_server(server, &msg).await {
                Ok(resp) => return Ok(resp),
                Err(err) => {
                    log::debug!("dns server {server} failed: {err}");
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
        let dns = Dns::new();
        assert_eq!(dns.name(), "dns");
        assert!(!dns.is_encrypted());
        assert_eq!(dns.servers.len(), 2);
    }

    #[tokio::test]
    async fn test_udp_query_against_local_responder() {
        // Minimal one-shot DNS responder on a loopback socket.
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 1024];
            let (n, peer) = server.recv_from(&mut buf).await.unwrap();
            let query = &buf[..n];

            // Header echoing the TXID, one question, one TXT answer.
            let mut resp = Vec::new();
            resp.extend_from_slice(&query[..2]);
            resp.extend_from_slice(&[0x81, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
            resp.extend_from_slice(&query[12..]); // echo question
            resp.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x10, 0x00, 0x01]);
            resp.extend_from_slice(&60u32.to_be_bytes());
            let txt = b"v=rdb1;s=ok";
            resp.extend_from_slice(&((txt.len() + 1) as u16).to_be_bytes());
            resp.push(txt.len() as u8);
            resp.extend_from_slice(txt);

            server.send_to(&resp, peer).await.unwrap();
        });

        let dns = Dns::new().with_servers(vec![addr.to_string()]);
        let resp = dns.query(&Request::txt("get.x.public.v1.resolvedb.net")).await.unwrap();
        assert_eq!(resp.data, b"v=rdb1;s=ok");
        assert_eq!(resp.ttl, 60);
    }

    #[tokio::test]
    async fn test_all_servers_failing_reports_last_error() {
        let dns = Dns::new()
            .with_servers(vec!["127.0.0.1:1".to_string()])
            .with_timeout(Duration::from_millis(100));
        let err = dns.query(&Request::txt("x.net")).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
