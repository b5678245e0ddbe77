//! Network probes used by the self-test. Every probe is bounded by its own
//! timeout and drops its socket on expiry.

use std::fs::File;
use std::io::{self, BufReader};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use simple_dns::{CLASS, Name, Packet, PacketFlag, Question, RCODE, TYPE};
use thiserror::Error;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

pub const TLS_TIMEOUT: Duration = Duration::from_secs(5);
pub const TCP_TIMEOUT: Duration = Duration::from_secs(3);
pub const DNS_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connect failed: {0}")]
    Connect(io::Error),

    #[error("TLS handshake failed: {0}")]
    Handshake(io::Error),

    #[error("invalid TLS server name {0:?}")]
    ServerName(String),

    #[error("failed to load CA bundle {path}: {reason}")]
    CaBundle { path: PathBuf, reason: String },

    #[error("DNS query failed: {0}")]
    Dns(String),
}

/// Client config trusting the roots in a PEM bundle.
pub fn client_config(ca_bundle: &Path) -> Result<Arc<ClientConfig>, ProbeError> {
    let ca_err = |reason: String| ProbeError::CaBundle {
        path: ca_bundle.to_path_buf(),
        reason,
    };

    let file = File::open(ca_bundle).map_err(|e| ca_err(e.to_string()))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ca_err(e.to_string()))?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(ca_err("no usable certificates".into()));
    }
    if ignored > 0 {
        tracing::debug!(added, ignored, "Skipped unparsable CA certificates");
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Full TLS handshake with certificate verification against `server_name`.
pub async fn tls_handshake(
    addr: SocketAddr,
    server_name: &str,
    config: Arc<ClientConfig>,
    limit: Duration,
) -> Result<Duration, ProbeError> {
    let name = ServerName::try_from(server_name.to_string())
        .map_err(|_| ProbeError::ServerName(server_name.to_string()))?;
    let started = Instant::now();

    let handshake = async {
        let stream = TcpStream::connect(addr).await.map_err(ProbeError::Connect)?;
        TlsConnector::from(config)
            .connect(name, stream)
            .await
            .map_err(ProbeError::Handshake)
    };
    timeout(limit, handshake)
        .await
        .map_err(|_| ProbeError::Timeout(limit))??;

    Ok(started.elapsed())
}

pub async fn tcp_connect(addr: SocketAddr, limit: Duration) -> Result<Duration, ProbeError> {
    let started = Instant::now();
    timeout(limit, TcpStream::connect(addr))
        .await
        .map_err(|_| ProbeError::Timeout(limit))?
        .map_err(ProbeError::Connect)?;
    Ok(started.elapsed())
}

/// Send one recursive A query and return the number of answers. Any rcode
/// other than NOERROR is an error.
pub async fn dns_query(
    resolver: SocketAddr,
    domain: &str,
    limit: Duration,
) -> Result<usize, ProbeError> {
    let id = query_id();
    let mut packet = Packet::new_query(id);
    packet.set_flags(PacketFlag::RECURSION_DESIRED);
    let name = Name::new(domain).map_err(|e| ProbeError::Dns(format!("bad name {domain:?}: {e}")))?;
    packet
        .questions
        .push(Question::new(name, TYPE::A.into(), CLASS::IN.into(), false));
    let query = packet
        .build_bytes_vec()
        .map_err(|e| ProbeError::Dns(e.to_string()))?;

    let exchange = async {
        let local: SocketAddr = if resolver.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await.map_err(ProbeError::Connect)?;
        socket.connect(resolver).await.map_err(ProbeError::Connect)?;
        socket.send(&query).await.map_err(ProbeError::Connect)?;

        let mut buf = [0u8; 4096];
        loop {
            let len = socket.recv(&mut buf).await.map_err(ProbeError::Connect)?;
            let reply = Packet::parse(&buf[..len]).map_err(|e| ProbeError::Dns(e.to_string()))?;
            // Stray datagrams for other queries are ignored.
            if reply.id() != id {
                continue;
            }
            if reply.rcode() != RCODE::NoError {
                return Err(ProbeError::Dns(format!("rcode {:?}", reply.rcode())));
            }
            return Ok(reply.answers.len());
        }
    };

    timeout(limit, exchange)
        .await
        .map_err(|_| ProbeError::Timeout(limit))?
}

fn query_id() -> u16 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos ^ std::process::id()) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_dns::ResourceRecord;
    use simple_dns::rdata::{A, RData};
    use tokio::net::TcpListener;

    /// Answers every query with one A record, or with `rcode` if given.
    async fn spawn_resolver(rcode: Option<RCODE>) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
                let query = Packet::parse(&buf[..len]).unwrap();
                let mut reply = Packet::new_reply(query.id());
                reply.set_flags(PacketFlag::RESPONSE | PacketFlag::RECURSION_AVAILABLE);
                match rcode {
                    Some(code) => *reply.rcode_mut() = code,
                    None => {
                        let question = &query.questions[0];
                        reply.answers.push(ResourceRecord::new(
                            question.qname.clone(),
                            CLASS::IN,
                            60,
                            RData::A(A::from(Ipv4Addr::new(93, 184, 216, 34))),
                        ));
                    }
                }
                let bytes = reply.build_bytes_vec().unwrap();
                socket.send_to(&bytes, peer).await.unwrap();
            }
        });
        addr
    }

    async fn closed_port() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn test_dns_query_counts_answers() {
        let resolver = spawn_resolver(None).await;
        let answers = dns_query(resolver, "example.com", DNS_TIMEOUT).await.unwrap();
        assert_eq!(answers, 1);
    }

    #[tokio::test]
    async fn test_dns_query_servfail_is_error() {
        let resolver = spawn_resolver(Some(RCODE::ServerFailure)).await;
        let err = dns_query(resolver, "example.com", DNS_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Dns(_)));
    }

    #[tokio::test]
    async fn test_dns_query_times_out_without_server() {
        // Bound but never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();

        let err = dns_query(addr, "example.com", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_tcp_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap();
        assert!(tcp_connect(open, TCP_TIMEOUT).await.is_ok());

        let closed = closed_port().await;
        assert!(matches!(
            tcp_connect(closed, TCP_TIMEOUT).await,
            Err(ProbeError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_tls_handshake_against_plain_tcp_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hang up without speaking TLS.
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let config = Arc::new(
            ClientConfig::builder()
                .with_root_certificates(RootCertStore::empty())
                .with_no_client_auth(),
        );
        let err = tls_handshake(addr, "dns.example", config, TLS_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Handshake(_)));
    }

    #[test]
    fn test_missing_ca_bundle() {
        let err = client_config(Path::new("/nonexistent/ca.pem")).unwrap_err();
        assert!(matches!(err, ProbeError::CaBundle { .. }));
    }

    #[test]
    fn test_ca_bundle_without_certificates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pem");
        std::fs::write(&path, "not a certificate\n").unwrap();

        assert!(matches!(
            client_config(&path),
            Err(ProbeError::CaBundle { .. })
        ));
    }
}
